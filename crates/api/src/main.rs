use anyhow::Context;

use courier_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    courier_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let services = courier_api::app::services::AppServices::from_config(&config)
        .await
        .context("failed to initialise services")?;
    let app = courier_api::app::build_app_with(services, config.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
