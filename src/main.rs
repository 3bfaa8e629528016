use anyhow::Context;
use payhook::{App, ConfigBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .context("Failed to read configuration from environment")?
        .build()
        .context("Invalid configuration")?;

    payhook::init_tracing_with_config(&config);

    tracing::info!(
        environment = ?config.environment,
        store = ?config.store.backend,
        mailer = ?config.notification.mailer,
        verified = config.webhook.signing_secret.is_some(),
        "Starting payhook"
    );

    let app = App::from_config(config)
        .await
        .context("Failed to initialize services")?;

    app.serve().await?;
    Ok(())
}
