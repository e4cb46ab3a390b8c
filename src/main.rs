mod app;
mod auth;
mod basket;
mod config;
mod order;
mod product;
mod session;
mod state;
mod utils;

use std::time::Duration;

use anyhow::Context;
use listenfd::ListenFd;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("axum_store=debug,info")),
        )
        .init();

    let config = Config::load().context("invalid configuration")?;

    if config.run_migrations {
        let applied = axum_store::run_migrations(&config.database_url)
            .await
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
        info!(applied, "migrations up to date");
    }

    let pool = axum_store::pool::get_pool(&config.database_url, config.db_pool_size)
        .await
        .map_err(anyhow::Error::msg)?;

    if let Some(account) = &config.staff_account {
        if let Err(e) = auth::handlers::seed_staff_user(&pool, account).await {
            warn!(error = %e, "could not create the staff account");
        }
    }

    let state = AppState::new(pool, config);
    state
        .sessions
        .spawn_cleanup(Duration::from_secs(state.config.session_cleanup_secs.max(1)));

    let address = state.config.address();
    let app = app::router(state);

    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // if we are given a tcp listener on listen fd 0, we use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // otherwise fall back to local listening
        None => TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?,
    };

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
