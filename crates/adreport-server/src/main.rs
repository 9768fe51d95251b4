mod api;
mod middleware;
mod scheduler;
mod worker;

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(adreport_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, "starting adreport-server");

    let pool_config = adreport_db::PoolConfig::from_app_config(&config);
    let pool = adreport_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = adreport_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations applied");

    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&config)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = match worker::build_consumer(pool.clone(), &config)? {
        Some(consumer) => Some(tokio::spawn(async move { consumer.run(shutdown_rx).await })),
        None => {
            tracing::warn!("ADZERK_API_KEY not set; report consumer disabled");
            None
        }
    };

    let app = build_app(AppState { pool });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The consumer finishes its in-flight message before exiting.
    shutdown_tx.send_replace(true);
    if let Some(handle) = consumer {
        handle.await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
