use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;

use taskhub::auth::{AuthMiddleware, TokenCodec};
use taskhub::config::Config;
use taskhub::error;
use taskhub::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let codec = TokenCodec::new(config.jwt_secret.clone(), config.token_ttl_hours);

    log::info!("Starting TaskHub server at {}", config.server_url());

    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(codec.clone()))
            .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
            // Registration order is inside-out: the gate runs after CORS has
            // already answered preflight requests.
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
    .bind(bind_addr)?
    .run()
    .await
}
