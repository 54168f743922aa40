//! Leave approval server - multi-level approval workflow engine

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leave_approvals::config::ServerConfig;
use leave_approvals::store::{self, Store};
use leave_approvals::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leave_approvals=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    let templates = config.load_templates()?;

    // Database connection
    let pool = store::connect(&config.database_url, config.max_connections).await?;

    // Run migrations
    Store::new(pool.clone()).migrate().await?;

    let state = AppState::new(pool, templates);
    state.service.seed_users().await?;
    tracing::info!(
        request_types = state.service.templates().request_types.len(),
        "Loaded workflow templates"
    );

    // Build router
    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
