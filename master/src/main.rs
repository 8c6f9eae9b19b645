mod config;
mod failover;
mod handlers;
mod monitor;
mod state;

#[cfg(test)]
mod scenarios;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::state::{AppState, Coordinator};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let coordinator = Arc::new(Coordinator::new(args.job_config()?)?);

    let state = AppState {
        coordinator: coordinator.clone(),
        work_dir: args.work_dir.clone(),
    };

    // router HTTP
    let app = handlers::build_router(state);

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", args.bind))?;
    info!("master escuchando en {}", listener.local_addr()?);

    // se apaga solo cuando el job termina (más el margen para los workers)
    axum::serve(listener, app)
        .with_graceful_shutdown(monitor::wait_until_done(coordinator, args.exit_grace()))
        .await?;

    info!("master terminado");
    Ok(())
}
