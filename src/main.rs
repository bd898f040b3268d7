use actix_web::{web, App, HttpServer};
use chat_relay::{build_cors, init_tracing, routes, AppError, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::info;

#[actix_web::main]
async fn main() -> chat_relay::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing("info");

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);

    let state = web::Data::new(AppState::new(config.clone()));

    // Create and bind TCP listener
    let listener = TcpListener::bind(config.bind_address())?;
    info!("Server is running on port {}", config.server.port);
    info!("Relay accepting connections at ws://{}/ws", config.bind_address());

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .app_data(state.clone())
            .configure(routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
