use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use bookshelf::application::auth_service::AuthService;
use bookshelf::application::book_service::BookService;
use bookshelf::data::book_repository::InMemoryBookRepository;
use bookshelf::data::cover_storage::FsCoverStorage;
use bookshelf::data::user_repository::InMemoryUserRepository;
use bookshelf::infrastructure::config::AppConfig;
use bookshelf::infrastructure::logging::init_logging;
use bookshelf::presentation::handlers::AppState;
use bookshelf::presentation::middleware::{JwtAuthMiddleware, RequestIdMiddleware, TimingMiddleware};
use bookshelf::presentation::routes;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config.log_level);
    info!(cover_dir = %config.cover_dir.display(), "Configuration loaded");

    let auth_service = AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        config.jwt_secret.clone(),
    )
    .with_token_ttl(config.token_ttl_secs);

    if let Some(admin) = &config.admin {
        auth_service.ensure_admin(&admin.email, &admin.password).await?;
    }

    let books = BookService::new(
        Arc::new(InMemoryBookRepository::new()),
        Arc::new(FsCoverStorage::new(config.cover_dir.clone())),
    )
    .with_max_cover_bytes(config.max_cover_bytes);

    let state = web::Data::new(AppState {
        books,
        auth_service: Arc::new(auth_service),
    });

    let jwt_secret = config.jwt_secret.clone();
    let cors_origin = config.cors_origin.clone();
    let json_limit = config.json_limit();

    let server = HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .expose_headers(["location", "x-request-id"]),
            None => Cors::permissive(),
        };

        App::new()
            .app_data(state.clone())
            .wrap(JwtAuthMiddleware::new(jwt_secret.clone()))
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(cors)
            .configure(routes::configure(json_limit))
    });

    let bind_addr = config.bind_address();
    let server = server.bind(&bind_addr)?;
    info!(address = %bind_addr, "Starting HTTP server");
    server.run().await?;
    Ok(())
}
