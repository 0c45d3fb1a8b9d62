use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unical_api::{build_router, state::AppState};
use unical_config::Settings;
use unical_db::{connect, indexes::ensure_indexes};
use unical_services::sweeper::spawn_invitation_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "unical_api=debug,unical_services=debug,unical_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting Unical API on {}:{}", settings.app.host, settings.app.port);

    let db = connect(&settings.database).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone())?;
    let sweeper = spawn_invitation_sweeper(
        app_state.invitations.clone(),
        settings.invitation.sweep_interval_secs,
    );

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
