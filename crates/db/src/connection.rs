use std::time::Duration;

use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;
use unical_config::DatabaseSettings;

const APP_NAME: &str = "unical-api";

/// Driver options for the configured deployment: pool bounds, server
/// selection timeout and the application name reported to the server.
pub async fn client_options(
    settings: &DatabaseSettings,
) -> Result<ClientOptions, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&settings.url).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout =
        Some(Duration::from_secs(settings.server_selection_timeout_secs));
    if settings.max_pool_size.is_some() {
        options.max_pool_size = settings.max_pool_size;
    }
    if settings.min_pool_size.is_some() {
        options.min_pool_size = settings.min_pool_size;
    }
    Ok(options)
}

/// Opens the process-wide connection pool and pings the deployment. The
/// returned handle is cloned into application state; dropping the last
/// clone closes the pool.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let options = client_options(settings).await?;
    let max_pool = options.max_pool_size;
    let min_pool = options.min_pool_size;
    let client = Client::with_options(options)?;

    client
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(
        db = %settings.name,
        ?max_pool,
        ?min_pool,
        selection_timeout_secs = settings.server_selection_timeout_secs,
        "Connected to MongoDB"
    );
    Ok(client.database(&settings.name))
}
