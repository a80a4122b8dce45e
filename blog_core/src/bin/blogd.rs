use blog_core::{config, telemetry, BlogCore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_or_init().await?;
    telemetry::init(&config.log_filter);

    let core = BlogCore::start(config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    core.shutdown().await
}
