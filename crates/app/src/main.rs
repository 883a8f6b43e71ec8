use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "agrifin={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    if let Some(server) = settings.server {
        tracing::info!("Found server settings...");
        let db = parse_database(&server.database).await?;
        let engine = Arc::new(engine::Engine::builder().database(db).build().await?);

        if let Some(sweep) = settings.sweep {
            let engine = Arc::clone(&engine);
            tasks.spawn(async move {
                let period = std::time::Duration::from_secs(sweep.interval_minutes * 60);
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    match engine.reconcile_overdue(chrono::Utc::now()).await {
                        Ok(0) => {}
                        Ok(flipped) => tracing::info!("overdue sweep flagged {flipped} installments"),
                        Err(err) => tracing::error!("overdue sweep failed: {err}"),
                    }
                }
            });
        }

        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{}:{}", bind, server.port);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tasks.spawn(async move {
            if let Err(err) = server::run_with_listener(engine, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
