use dotenvy::dotenv;
use tokio::net::TcpListener;
use tour_booking_engine::{
    api::{self, AppState},
    config::{database, server::ServerSettings, settings},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    // 3. Server settings, refund policy and payment account
    let server = ServerSettings::from_env()?;
    let config = settings::load_config(&server.config_path)
        .inspect_err(|e| error!("Failed to load {}: {}", server.config_path, e))?;
    let policy = config.refund_policy()?;
    info!(
        "Loaded refund policy with {} tier(s) from {}",
        config.refund_tiers.len(),
        server.config_path
    );

    // 4. Database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    if server.webhook_api_key.is_none() {
        info!("WEBHOOK_API_KEY not set; payment webhook accepts unauthenticated deliveries");
    }

    // 5. Serve
    let state = AppState::new(db, policy, config.payment, server.webhook_api_key);
    let listener = TcpListener::bind(server.bind_address).await?;
    info!("Listening on {}", server.bind_address);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
