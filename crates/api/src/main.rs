use std::sync::Arc;

use anyhow::Context;

use usergroup_infra::{AppConfig, PostgresStore, schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    usergroup_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let store = PostgresStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to the database")?;
    schema::migrate(store.pool())
        .await
        .context("failed to create the schema")?;
    schema::ensure_admin(store.pool(), &config.admin)
        .await
        .context("failed to set up the bootstrap administrator")?;

    let app = usergroup_api::app::build_app(Arc::new(store), &config.jwt_secret, config.jwt_validity)
        .context("failed to build the router")?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
