use crate::{
    auth::AuthSession,
    error::AppError,
    models::{Task, TaskFilter, TaskInput, TaskUpdate},
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;

/// Retrieves the authenticated user's tasks.
///
/// The list is always scoped to the requester; the query string can narrow
/// it, never widen it.
///
/// ## Query Parameters:
/// - `completed` (optional): keep only tasks with this completion state.
/// - `sortBy` (optional): `field:asc` or `field:desc` over `description`,
///   `completed`, `createdAt`, `updatedAt`. Anything else is rejected with a
///   400 rather than ignored. Without it, tasks come back oldest first.
/// - `limit` / `skip` (optional): pagination, applied after filter and sort.
///
/// ## Responses:
/// - `200 OK`: JSON array of tasks.
/// - `400 Bad Request`: unsupported sort expression or negative pagination.
/// - `401 Unauthorized`: no valid session.
#[get("")]
pub async fn get_tasks(
    pool: web::Data<PgPool>,
    query_params: web::Query<TaskFilter>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let tasks = Task::list(pool.get_ref(), session.user.id, &query_params).await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// ## Request Body:
/// - `description`: required, trimmed of surrounding whitespace.
/// - `completed` (optional): defaults to `false`.
///
/// ## Responses:
/// - `201 Created`: the created task.
/// - `400 Bad Request`: blank description or an unknown field in the body.
/// - `401 Unauthorized`: no valid session.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    input: web::Json<TaskInput>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let task = Task::create(pool.get_ref(), session.user.id, input.into_inner()).await?;

    Ok(HttpResponse::Created().json(task))
}

/// Retrieves one of the authenticated user's tasks by id.
///
/// ## Responses:
/// - `200 OK`: the task.
/// - `404 Not Found`: the id does not exist *or* belongs to another user;
///   the two cases are indistinguishable on purpose.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let task = Task::find_owned(pool.get_ref(), session.user.id, task_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(task))
}

/// Updates one of the authenticated user's tasks.
///
/// Only `description` and `completed` may change; a body naming any other
/// field is rejected with a 400 before the task is even looked up.
///
/// ## Responses:
/// - `200 OK`: the updated task.
/// - `400 Bad Request`: invalid patch.
/// - `404 Not Found`: not found or not owned.
#[patch("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    update: web::Json<TaskUpdate>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let mut task =
        Task::find_owned(pool.get_ref(), session.user.id, task_id.into_inner()).await?;
    task.apply_update(pool.get_ref(), update.into_inner()).await?;

    Ok(HttpResponse::Ok().json(task))
}

/// Deletes one of the authenticated user's tasks, returning the deleted task.
///
/// ## Responses:
/// - `200 OK`: the deleted task.
/// - `404 Not Found`: not found or not owned.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let task =
        Task::delete_owned(pool.get_ref(), session.user.id, task_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(task))
}
