use anyhow::{Context, Result};
use common::{
    engine,
    protocol::{ROUTE_MAP_DONE, ROUTE_NEXT_TASK, ROUTE_REDUCE_DONE},
    LeaseToken, MapDoneRequest, ReduceDoneRequest, ReportAck, TaskAssignment, TaskKind,
    TaskRequest, Workload,
};
use reqwest::Client;
use std::{path::PathBuf, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Lo que el worker necesita del coordinador.
pub trait CoordinatorApi {
    async fn request_task(&self) -> Result<TaskAssignment>;
    async fn report_map_done(&self, filename: &str, token: LeaseToken) -> Result<bool>;
    async fn report_reduce_done(&self, partition: u32, token: LeaseToken) -> Result<bool>;
}

/// Cliente HTTP/JSON contra el master.
pub struct HttpCoordinator {
    client: Client,
    base_url: String,
    worker: String,
}

impl HttpCoordinator {
    pub fn new(base_url: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            worker: worker.into(),
        }
    }

    async fn post<B, R>(&self, route: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, route);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("no se pudo contactar al master en {}", url))?
            .error_for_status()
            .with_context(|| format!("el master rechazó {}", route))?;

        resp.json()
            .await
            .with_context(|| format!("respuesta inválida de {}", route))
    }
}

impl CoordinatorApi for HttpCoordinator {
    async fn request_task(&self) -> Result<TaskAssignment> {
        self.post(
            ROUTE_NEXT_TASK,
            &TaskRequest {
                worker: self.worker.clone(),
            },
        )
        .await
    }

    async fn report_map_done(&self, filename: &str, token: LeaseToken) -> Result<bool> {
        let ack: ReportAck = self
            .post(
                ROUTE_MAP_DONE,
                &MapDoneRequest {
                    filename: filename.to_string(),
                    lease_token: token,
                },
            )
            .await?;
        Ok(ack.accepted)
    }

    async fn report_reduce_done(&self, partition: u32, token: LeaseToken) -> Result<bool> {
        let ack: ReportAck = self
            .post(
                ROUTE_REDUCE_DONE,
                &ReduceDoneRequest {
                    partition,
                    lease_token: token,
                },
            )
            .await?;
        Ok(ack.accepted)
    }
}

/// Loop principal del worker.
/// - Pide tarea; `wait` duerme y reintenta, `exit` termina con Ok.
/// - Map y reduce corren en un hilo de bloqueo.
/// - Cualquier error (I/O local o transporte) corta el loop: no se reporta
///   nada y el lease del master se encarga de reasignar.
pub async fn run_loop<C: CoordinatorApi>(
    coord: &C,
    workload: Workload,
    work_dir: PathBuf,
    wait: Duration,
) -> Result<()> {
    let mut done = 0usize;

    loop {
        let assignment = coord.request_task().await?;

        if let (Some(kind), Some(token)) = (assignment.kind(), assignment.lease_token()) {
            debug!("recibí {} con lease {}", kind, token);
        }

        match assignment {
            TaskAssignment::Exit => {
                info!("master indicó exit, {} tareas hechas por este worker", done);
                return Ok(());
            }
            TaskAssignment::Wait => {
                debug!("no hay tareas libres, esperando {:?}", wait);
                sleep(wait).await;
            }
            TaskAssignment::Map {
                lease_token,
                filename,
                map_index,
                n_reduce,
            } => {
                info!("tengo map {} ({})", map_index, filename);

                let dir = work_dir.clone();
                let input = filename.clone();
                let map_fn = workload.map_fn;
                let files = tokio::task::spawn_blocking(move || {
                    engine::run_map_task(map_fn, &input, map_index, n_reduce, &dir)
                })
                .await
                .context("la tarea map entró en panic")?
                .with_context(|| format!("map {} sobre {} falló", map_index, filename))?;

                debug!("map {} publicó {} archivos intermedios", map_index, files.len());

                let accepted = coord.report_map_done(&filename, lease_token).await?;
                log_ack(TaskKind::Map, map_index as u64, accepted);
                done += 1;
            }
            TaskAssignment::Reduce {
                lease_token,
                partition,
                n_map,
            } => {
                info!("tengo reduce {} (n_map={})", partition, n_map);

                let dir = work_dir.clone();
                let reduce_fn = workload.reduce_fn;
                let out = tokio::task::spawn_blocking(move || {
                    engine::run_reduce_task(reduce_fn, partition, n_map, &dir)
                })
                .await
                .context("la tarea reduce entró en panic")?
                .with_context(|| format!("reduce {} falló", partition))?;

                debug!("reduce {} publicó {}", partition, out.display());

                let accepted = coord.report_reduce_done(partition, lease_token).await?;
                log_ack(TaskKind::Reduce, partition as u64, accepted);
                done += 1;
            }
        }
    }
}

fn log_ack(kind: TaskKind, index: u64, accepted: bool) {
    if accepted {
        info!("{} {} aceptado por el master", kind, index);
    } else {
        // lease vencido y tarea reasignada: nuestro resultado es redundante
        warn!("{} {} ignorado por el master (token viejo)", kind, index);
    }
}
