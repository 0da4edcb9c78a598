//! Integration tests for the task routes: creation, ownership scoping, and
//! the filter/sort/pagination query engine. They need a reachable PostgreSQL
//! instance (`DATABASE_URL`), so they are ignored by default; run them with
//! `cargo test -- --ignored`.

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{rt, test, web, App, HttpServer};
use dotenv::dotenv;
use serde_json::json;
use sqlx::PgPool;
use std::net::TcpListener;
use taskhub::auth::{AuthMiddleware, AuthResponse, TokenCodec};
use taskhub::error;
use taskhub::models::Task;
use taskhub::routes;

async fn setup_pool() -> PgPool {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn test_codec() -> TokenCodec {
    TokenCodec::new("integration-test-secret", 24)
}

async fn cleanup_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query(
        "DELETE FROM tasks WHERE author IN (SELECT id FROM users WHERE email = $1)",
    )
    .bind(email)
    .execute(pool)
    .await;
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}

macro_rules! build_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(test_codec()))
                .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
                .wrap(AuthMiddleware)
                .wrap(Logger::default())
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .configure(routes::config),
        )
    };
}

async fn register_user<S, B>(app: &S, name: &str, email: &str, password: &str) -> AuthResponse
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({
            "name": name,
            "email": email,
            "password": password
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Registration failed. Body: {:?}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).expect("Failed to parse registration response")
}

async fn create_task<S, B>(app: &S, token: &str, payload: serde_json::Value) -> Task
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/tasks")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Task creation failed. Body: {:?}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).expect("Failed to parse task response")
}

// Requires a configured Postgres database.
#[ignore]
#[actix_rt::test]
async fn test_create_task() {
    let pool = setup_pool().await;
    let email = "tasks_create@example.com";
    cleanup_user(&pool, email).await;

    let app = build_app!(pool).await;
    let user = register_user(&app, "Create User", email, "MyPass777!").await;

    // Description is trimmed, completed defaults to false, author is set
    // from the session rather than the body.
    let task = create_task(&app, &user.token, json!({ "description": "  From my test  " })).await;
    assert_eq!(task.description, "From my test");
    assert!(!task.completed);
    assert_eq!(task.author, user.user.id);

    // Blank description
    let req = test::TestRequest::post()
        .uri("/tasks")
        .append_header(("Authorization", format!("Bearer {}", user.token)))
        .set_json(json!({ "description": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Unknown field
    let req = test::TestRequest::post()
        .uri("/tasks")
        .append_header(("Authorization", format!("Bearer {}", user.token)))
        .set_json(json!({ "description": "ok", "priority": "high" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    cleanup_user(&pool, email).await;
}

// Requires a configured Postgres database.
#[ignore]
#[actix_rt::test]
async fn test_create_task_unauthorized() {
    let pool = setup_pool().await;

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener); // Drop the listener so the server can bind to it

    let server_pool = pool.clone();
    let server_handle = rt::spawn(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(server_pool.clone()))
                .app_data(web::Data::new(test_codec()))
                .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
                .wrap(AuthMiddleware)
                .wrap(Logger::default())
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .configure(routes::config)
        })
        .bind(("127.0.0.1", port))
        .unwrap_or_else(|_| panic!("Failed to bind to port {}", port))
        .run()
        .await
    });

    // Give the server a moment to start
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let client = reqwest::Client::new();
    let request_url = format!("http://127.0.0.1:{}/tasks", port);

    let resp = client
        .post(&request_url)
        .json(&json!({ "description": "Unauthorized Task" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.expect("Failed to read body");
    assert_eq!(body, json!({"error": "Authentication failed"}));

    server_handle.abort();
}

// Requires a configured Postgres database.
#[ignore]
#[actix_rt::test]
async fn test_list_filter_sort_paginate() {
    let pool = setup_pool().await;
    let email = "tasks_list@example.com";
    cleanup_user(&pool, email).await;

    let app = build_app!(pool).await;
    let user = register_user(&app, "List User", email, "MyPass777!").await;
    let token = user.token;

    create_task(&app, &token, json!({ "description": "First task" })).await;
    create_task(&app, &token, json!({ "description": "Second task", "completed": true })).await;

    // Default order is insertion order
    let req = test::TestRequest::get()
        .uri("/tasks")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].description, "First task");
    assert_eq!(tasks[1].description, "Second task");

    // completed=true
    let req = test::TestRequest::get()
        .uri("/tasks?completed=true")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].completed);

    // completed=false
    let req = test::TestRequest::get()
        .uri("/tasks?completed=false")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].completed);

    // Descending sort on description
    let req = test::TestRequest::get()
        .uri("/tasks?sortBy=description:desc")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert_eq!(tasks[0].description, "Second task");
    assert_eq!(tasks[1].description, "First task");

    // Pagination applies after filter and sort: the second page of size one
    // is exactly the second item of the default order.
    let req = test::TestRequest::get()
        .uri("/tasks?limit=1&skip=1")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "Second task");

    // Unsupported sort field and malformed sort expression are rejected
    let req = test::TestRequest::get()
        .uri("/tasks?sortBy=priority:asc")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/tasks?sortBy=description")
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    cleanup_user(&pool, email).await;
}

// Requires a configured Postgres database.
#[ignore]
#[actix_rt::test]
async fn test_task_ownership() {
    let pool = setup_pool().await;
    let email_a = "tasks_owner_a@example.com";
    let email_b = "tasks_owner_b@example.com";
    cleanup_user(&pool, email_a).await;
    cleanup_user(&pool, email_b).await;

    let app = build_app!(pool).await;
    let user_a = register_user(&app, "Owner A", email_a, "MyPass777!").await;
    let user_b = register_user(&app, "Owner B", email_b, "MyPass777!").await;

    let task_a = create_task(&app, &user_a.token, json!({ "description": "A's task" })).await;

    // B's list does not contain A's task
    let req = test::TestRequest::get()
        .uri("/tasks")
        .append_header(("Authorization", format!("Bearer {}", user_b.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert!(!tasks.iter().any(|t| t.id == task_a.id));

    // Fetch, update, and delete through B's token all answer 404
    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", task_a.id))
        .append_header(("Authorization", format!("Bearer {}", user_b.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", task_a.id))
        .append_header(("Authorization", format!("Bearer {}", user_b.token)))
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/tasks/{}", task_a.id))
        .append_header(("Authorization", format!("Bearer {}", user_b.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    // A still owns and reaches the task
    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", task_a.id))
        .append_header(("Authorization", format!("Bearer {}", user_a.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    cleanup_user(&pool, email_a).await;
    cleanup_user(&pool, email_b).await;
}

// Requires a configured Postgres database.
#[ignore]
#[actix_rt::test]
async fn test_update_and_delete_task() {
    let pool = setup_pool().await;
    let email = "tasks_update@example.com";
    cleanup_user(&pool, email).await;

    let app = build_app!(pool).await;
    let user = register_user(&app, "Update User", email, "MyPass777!").await;
    let token = user.token;

    let task = create_task(&app, &token, json!({ "description": "First task" })).await;

    // Patch completed
    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", task.id))
        .append_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let updated: Task = test::read_body_json(resp).await;
    assert!(updated.completed);
    assert!(updated.updated_at > task.updated_at);

    // Patch outside {description, completed}
    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", task.id))
        .append_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({ "location": "New York" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Delete returns the deleted task; a second fetch is a 404
    let req = test::TestRequest::delete()
        .uri(&format!("/tasks/{}", task.id))
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let deleted: Task = test::read_body_json(resp).await;
    assert_eq!(deleted.id, task.id);

    let req = test::TestRequest::get()
        .uri(&format!("/tasks/{}", task.id))
        .append_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    cleanup_user(&pool, email).await;
}
