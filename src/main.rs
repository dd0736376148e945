use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use dotenvy::dotenv;
use sea_orm::Database;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use freshadmin::auth::JwtService;
use freshadmin::backend::{Backend, MemoryBackend, SeaOrmBackend};
use freshadmin::config::AppConfig;
use freshadmin::{demo, http, AdminService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshadmin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!("🚀 Starting FreshAdmin in {} environment", config.environment);

    let backend: Arc<dyn Backend> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db = Database::connect(database_url).await?;
            info!("Database connected successfully");
            Arc::new(SeaOrmBackend::new(db))
        }
        None => {
            let memory = MemoryBackend::new();
            demo::seed(&memory).await?;
            Arc::new(memory)
        }
    };

    // Invalid admin configuration stops the process here.
    let registry = demo::registry()?;

    let admin = AdminService::new(registry, backend)
        .with_roles(demo::roles())
        .with_settings(config.admin_settings());
    let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiration_hours);

    let cors = if config.cors_origins.trim() == "*" {
        warn!("🚨 CORS set to accept ANY origin (*) - only use in development!");
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::PUT, Method::DELETE])
            .allow_headers([
                ACCEPT,
                CONTENT_TYPE,
                AUTHORIZATION,
                HeaderName::from_static("x-requested-with"),
            ])
            .allow_credentials(true)
    };

    let app = http::router(admin, jwt_service, &config.admin_prefix).layer(cors);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Server starting on http://{}", addr);
    info!("🗂️ Admin available at http://{}{}", addr, config.admin_prefix);
    info!("🏥 Health check available at http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
