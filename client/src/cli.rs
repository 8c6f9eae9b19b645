use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use common::{
    protocol::{ROUTE_JOB, ROUTE_JOB_RESULTS},
    sequential, workload, JobResults, JobStatusReport, TaskCounts,
};
use reqwest::Client;
use std::{fmt::Write as _, path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el master")]
struct Cli {
    /// Igual que en el worker:
    /// - En Docker: MASTER_URL=http://master:8080
    /// - Local: default http://localhost:8080
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080", global = true)]
    master_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consulta el estado del job
    Status,

    /// Lista los archivos de salida ya publicados
    Results,

    /// Espera (consultando cada tanto) hasta que el job termine
    Wait {
        /// Intervalo entre consultas, en milisegundos
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Corre el job completo localmente, sin master ni workers
    Sequential {
        /// Workload (wc, indexer)
        #[arg(long, default_value = "wc")]
        workload: String,

        /// Archivo de salida
        #[arg(long, default_value = "mr-correct.txt")]
        output: PathBuf,

        /// Archivos de entrada
        #[arg(value_name = "ENTRADAS", required = true)]
        inputs: Vec<String>,
    },
}

async fn fetch_status(client: &Client, base_url: &str) -> Result<JobStatusReport> {
    let url = format!("{}{}", base_url, ROUTE_JOB);
    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("no se pudo contactar al master en {}", url))?
        .error_for_status()?;
    Ok(resp.json().await?)
}

fn format_counts(label: &str, c: &TaskCounts) -> String {
    format!(
        "  {:<7}: total={}, idle={}, en curso={}, completadas={}",
        label, c.total, c.idle, c.in_progress, c.completed
    )
}

fn format_status(job: &JobStatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job:");
    let _ = writeln!(out, "  fase: {:?}", job.phase);
    let _ = writeln!(out, "  terminado: {}", job.done);
    let _ = writeln!(out, "  n_reduce: {}  lease: {}s", job.n_reduce, job.lease_secs);
    let _ = writeln!(out, "{}", format_counts("map", &job.map_tasks));
    let _ = writeln!(out, "{}", format_counts("reduce", &job.reduce_tasks));
    let _ = writeln!(out, "  reasignaciones: {}", job.reassignments);
    let _ = writeln!(out, "  progreso: {:.1}%", job.progress_pct());
    let _ = writeln!(out, "  creado: {}", job.created_at);
    if let Some(ref t) = job.reducing_at {
        let _ = writeln!(out, "  inicio reduce: {}", t);
    }
    if let Some(ref t) = job.finished_at {
        let _ = writeln!(out, "  finalizado: {}", t);
    }
    out
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.master_url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Status => {
            let job = fetch_status(&client, &base_url).await?;
            print!("{}", format_status(&job));
        }

        Commands::Results => {
            let url = format!("{}{}", base_url, ROUTE_JOB_RESULTS);
            let resp = client.get(&url).send().await?;

            if resp.status().is_success() {
                let results: JobResults = resp.json().await?;
                println!("Resultados del job:");
                println!("  directorio de trabajo: {}", results.work_dir);
                if results.files.is_empty() {
                    println!("  (sin archivos de salida)");
                } else {
                    println!("  archivos:");
                    for f in results.files {
                        println!("    - {}", f);
                    }
                }
            } else {
                println!("Error consultando resultados (status {})", resp.status());
            }
        }

        Commands::Wait { interval_ms } => {
            let interval = Duration::from_millis(interval_ms.max(1));
            loop {
                let job = fetch_status(&client, &base_url).await?;
                if job.done {
                    println!("Job terminado.");
                    print!("{}", format_status(&job));
                    break;
                }
                println!("fase {:?}, progreso {:.1}%", job.phase, job.progress_pct());
                tokio::time::sleep(interval).await;
            }
        }

        Commands::Sequential {
            workload: name,
            output,
            inputs,
        } => {
            let wl = workload::try_named(&name).ok_or_else(|| {
                anyhow!(
                    "workload desconocido '{}' (disponibles: {})",
                    name,
                    workload::available().join(", ")
                )
            })?;

            sequential::run_sequential(&wl, &inputs, &output)
                .with_context(|| format!("falló la ejecución secuencial de {}", wl.name))?;
            println!(
                "Secuencial ({}) completado. Archivo de salida: {}",
                wl.name,
                output.display()
            );
        }
    }

    Ok(())
}
