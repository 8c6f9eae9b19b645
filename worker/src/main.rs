mod worker;

use anyhow::{anyhow, Result};
use clap::Parser;
use common::workload;
use std::{path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::worker::{run_loop, HttpCoordinator};

/// Worker MapReduce: pide tareas al master hasta recibir `exit`.
#[derive(Parser, Debug)]
#[command(name = "worker", version)]
struct Args {
    /// URL base del master.
    /// - En Docker usaremos: MASTER_URL=http://master:8080
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    master_url: String,

    /// Carpeta compartida donde viven intermedios y salidas
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Workload a ejecutar (wc, indexer)
    #[arg(long, env = "WORKLOAD", default_value = "wc")]
    workload: String,

    /// Espera entre reintentos cuando el master responde `wait`
    #[arg(long, default_value_t = 1000)]
    wait_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let args = Args::parse();

    let workload = workload::try_named(&args.workload).ok_or_else(|| {
        anyhow!(
            "workload desconocido '{}' (disponibles: {})",
            args.workload,
            workload::available().join(", ")
        )
    })?;

    // Nombre de host (solo para logs del master)
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let label = format!("{}-{}", hostname, std::process::id());

    info!(
        "worker {} usando workload {} contra {} (work_dir={})",
        label,
        workload.name,
        args.master_url,
        args.work_dir.display()
    );

    let coord = HttpCoordinator::new(args.master_url, label);
    run_loop(
        &coord,
        workload,
        args.work_dir,
        Duration::from_millis(args.wait_ms),
    )
    .await
}
