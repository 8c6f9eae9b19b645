use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::glob;

use crate::state::JobConfig;

#[derive(Parser, Debug)]
#[command(name = "master")]
#[command(about = "Coordinador MapReduce: reparte tareas map/reduce a los workers")]
pub struct Args {
    /// Dirección donde escucha el servidor HTTP
    #[arg(long, env = "MASTER_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Cantidad de particiones de reduce (R)
    #[arg(long, env = "N_REDUCE", default_value_t = 10)]
    pub n_reduce: u32,

    /// Duración del lease de cada tarea, en segundos (L)
    #[arg(long, env = "LEASE_SECS", default_value_t = 10)]
    pub lease_secs: u64,

    /// Directorio donde los workers publican mr-out-*
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Segundos que se sigue sirviendo `exit` después de terminar el job
    #[arg(long, default_value_t = 3)]
    pub exit_grace_secs: u64,

    /// Archivos de entrada (una tarea map por archivo). Acepta patrones glob.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,
}

impl Args {
    pub fn job_config(&self) -> Result<JobConfig> {
        Ok(JobConfig {
            inputs: expand_inputs(&self.inputs)?,
            n_reduce: self.n_reduce,
            lease: Duration::from_secs(self.lease_secs),
        })
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }
}

fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expande los patrones glob manteniendo el orden de los argumentos.
/// Los nombres sin comodines se usan tal cual.
pub fn expand_inputs(args: &[String]) -> Result<Vec<String>> {
    let mut out = Vec::new();

    for arg in args {
        if !is_pattern(arg) {
            out.push(arg.clone());
            continue;
        }

        let mut matched = 0;
        for entry in glob(arg).with_context(|| format!("patrón de entrada inválido: {}", arg))? {
            let path = entry?;
            if path.is_file() {
                out.push(path.to_string_lossy().to_string());
                matched += 1;
            }
        }

        if matched == 0 {
            bail!("el patrón {} no coincide con ningún archivo", arg);
        }
    }

    Ok(out)
}
