pub mod client;
pub mod config;
pub mod error;
pub mod relay;
pub mod websocket;

use std::sync::Arc;
use actix_cors::Cors;
use actix_web::{web, HttpResponse};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use client::{ChatClient, MemoryChannel, MessageChannel, MessageStore, WsChannel};
pub use relay::{RelayServer, RoomRegistry};

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub relay: Arc<RelayServer>,
}

impl AppState {
    pub fn new(config: Settings) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(RelayServer::new()),
        }
    }
}

/// Health check endpoint handler
/// Returns a JSON response with server status, timestamp and relay load
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let registry = state.relay.registry();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "connections": registry.connection_count().await,
        "rooms": registry.room_count().await,
    }))
}

/// CORS policy for the chat UI origin.
pub fn build_cors(config: &config::CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allowed_origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        Cors::default().allowed_origin(&config.allowed_origin)
    };

    cors.allowed_methods(config.allowed_methods.iter().map(String::as_str))
        .allow_any_header()
        .max_age(config.max_age as usize)
}

/// Registers the relay routes on an actix `App`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ws", web::get().to(websocket::websocket_route));
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_app_state_creation() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config);
        assert_eq!(state.config.environment, "test");
        assert_eq!(state.relay.registry().connection_count().await, 0);
    }

    #[actix_web::test]
    async fn test_websocket_route_requires_upgrade() {
        let state = AppState::new(Settings::new_for_test().unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes)
        ).await;

        let req = test::TestRequest::get().uri("/ws").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }
}
