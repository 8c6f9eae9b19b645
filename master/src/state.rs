// master/src/state.rs

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use common::{
    output_file_name, JobPhase, JobStatusReport, LeaseToken, TaskAssignment, TaskCounts, TaskKind,
};

use crate::failover;

/// Configuración fija del job: no cambia mientras vive.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub inputs: Vec<String>,
    pub n_reduce: u32,
    pub lease: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    // dónde buscan los workers/cliente los mr-out-*
    pub work_dir: PathBuf,
}

/// Estado de una tarea. El token sólo existe mientras está InProgress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InProgress { token: LeaseToken },
    Completed,
}

/// Lease recién entregado; el timer de vencimiento lo revalida al disparar.
#[derive(Debug, Clone, Copy)]
pub struct LeaseTicket {
    pub kind: TaskKind,
    pub index: usize,
    pub token: LeaseToken,
    pub deadline: Instant,
}

/// Todo el estado del job. Sólo se toca a través de `Coordinator`, bajo su lock.
#[derive(Debug)]
pub struct JobState {
    phase: JobPhase,
    n_reduce: u32,
    lease: Duration,

    inputs: Vec<String>,
    // filename -> índice en `map_tasks`
    map_index: HashMap<String, usize>,

    map_tasks: Vec<TaskState>,
    reduce_tasks: Vec<TaskState>,
    maps_completed: usize,
    reduces_completed: usize,

    reassignments: u32,

    created_at: DateTime<Utc>,
    reducing_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

fn first_idle(tasks: &[TaskState]) -> Option<usize> {
    tasks.iter().position(|t| matches!(t, TaskState::Idle))
}

fn count(tasks: &[TaskState]) -> TaskCounts {
    let mut c = TaskCounts {
        total: tasks.len() as u32,
        ..TaskCounts::default()
    };
    for t in tasks {
        match t {
            TaskState::Idle => c.idle += 1,
            TaskState::InProgress { .. } => c.in_progress += 1,
            TaskState::Completed => c.completed += 1,
        }
    }
    c
}

impl JobState {
    fn new(config: JobConfig) -> Self {
        let map_index = config
            .inputs
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i))
            .collect();

        Self {
            phase: JobPhase::Mapping,
            n_reduce: config.n_reduce,
            lease: config.lease,
            map_tasks: vec![TaskState::Idle; config.inputs.len()],
            reduce_tasks: vec![TaskState::Idle; config.n_reduce as usize],
            inputs: config.inputs,
            map_index,
            maps_completed: 0,
            reduces_completed: 0,
            reassignments: 0,
            created_at: Utc::now(),
            reducing_at: None,
            finished_at: None,
        }
    }

    /// Avanza de fase mientras la fase actual esté completa.
    /// Devuelve las fases a las que se entró (para loguear fuera del lock).
    fn advance_phase(&mut self) -> Vec<JobPhase> {
        let mut entered = Vec::new();
        loop {
            match self.phase {
                JobPhase::Mapping if self.maps_completed == self.map_tasks.len() => {
                    self.phase = JobPhase::Reducing;
                    self.reducing_at = Some(Utc::now());
                }
                JobPhase::Reducing if self.reduces_completed == self.reduce_tasks.len() => {
                    self.phase = JobPhase::Done;
                    self.finished_at = Some(Utc::now());
                }
                _ => return entered,
            }
            entered.push(self.phase);
        }
    }

    /// Busca la primera tarea Idle de la fase actual y la pasa a InProgress
    /// con un token nuevo, todo bajo el mismo lock.
    fn assign(&mut self, now: Instant) -> (TaskAssignment, Option<LeaseTicket>) {
        let deadline = now + self.lease;

        match self.phase {
            JobPhase::Mapping => match first_idle(&self.map_tasks) {
                Some(index) => {
                    let token = LeaseToken::mint();
                    self.map_tasks[index] = TaskState::InProgress { token };
                    let assignment = TaskAssignment::Map {
                        lease_token: token,
                        filename: self.inputs[index].clone(),
                        map_index: index,
                        n_reduce: self.n_reduce,
                    };
                    let ticket = LeaseTicket {
                        kind: TaskKind::Map,
                        index,
                        token,
                        deadline,
                    };
                    (assignment, Some(ticket))
                }
                // quedan maps InProgress: no se pasa a reduce todavía
                None => (TaskAssignment::Wait, None),
            },
            JobPhase::Reducing => match first_idle(&self.reduce_tasks) {
                Some(index) => {
                    let token = LeaseToken::mint();
                    self.reduce_tasks[index] = TaskState::InProgress { token };
                    let assignment = TaskAssignment::Reduce {
                        lease_token: token,
                        partition: index as u32,
                        n_map: self.map_tasks.len(),
                    };
                    let ticket = LeaseTicket {
                        kind: TaskKind::Reduce,
                        index,
                        token,
                        deadline,
                    };
                    (assignment, Some(ticket))
                }
                None => (TaskAssignment::Wait, None),
            },
            JobPhase::Done => (TaskAssignment::Exit, None),
        }
    }

    fn tasks_mut(&mut self, kind: TaskKind) -> &mut Vec<TaskState> {
        match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        }
    }

    /// InProgress con el mismo token -> Completed. Cualquier otro caso es no-op.
    fn complete(&mut self, kind: TaskKind, index: usize, token: LeaseToken) -> bool {
        let Some(task) = self.tasks_mut(kind).get_mut(index) else {
            return false;
        };

        match *task {
            TaskState::InProgress { token: current, .. } if current == token => {
                *task = TaskState::Completed;
            }
            _ => return false,
        }

        match kind {
            TaskKind::Map => self.maps_completed += 1,
            TaskKind::Reduce => self.reduces_completed += 1,
        }
        true
    }

    /// InProgress con el mismo token -> Idle. Si ya se completó o se
    /// reasignó (otro token), no hace nada.
    fn expire(&mut self, kind: TaskKind, index: usize, token: LeaseToken) -> bool {
        let Some(task) = self.tasks_mut(kind).get_mut(index) else {
            return false;
        };

        match *task {
            TaskState::InProgress { token: current, .. } if current == token => {
                *task = TaskState::Idle;
                self.reassignments += 1;
                true
            }
            _ => false,
        }
    }

    fn status(&self) -> JobStatusReport {
        JobStatusReport {
            phase: self.phase,
            done: self.phase == JobPhase::Done,
            n_reduce: self.n_reduce,
            lease_secs: self.lease.as_secs(),
            map_tasks: count(&self.map_tasks),
            reduce_tasks: count(&self.reduce_tasks),
            reassignments: self.reassignments,
            created_at: self.created_at,
            reducing_at: self.reducing_at,
            finished_at: self.finished_at,
        }
    }
}

/// Coordinador: un único lock sobre todo el estado del job.
/// Ninguna operación hace I/O con el lock tomado.
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<JobState>,
}

impl Coordinator {
    /// Crea el job: una tarea map por archivo y una reduce por partición.
    pub fn new(config: JobConfig) -> Result<Self> {
        if config.n_reduce == 0 {
            bail!("n_reduce debe ser al menos 1");
        }
        if config.lease.is_zero() {
            bail!("la duración del lease debe ser mayor que cero");
        }

        let mut seen = std::collections::HashSet::new();
        for f in &config.inputs {
            if !seen.insert(f.as_str()) {
                bail!("archivo de entrada repetido: {}", f);
            }
        }

        info!(
            "job creado: {} tareas map, {} tareas reduce, lease={:?}",
            config.inputs.len(),
            config.n_reduce,
            config.lease
        );

        Ok(Self {
            state: Mutex::new(JobState::new(config)),
        })
    }

    // El estado es un valor plano que cada operación deja consistente,
    // así que un lock envenenado se puede seguir usando.
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// RequestTask: entrega la siguiente tarea Idle (agendando su vencimiento),
    /// o Wait / Exit. Necesita correr dentro de un runtime de tokio.
    pub fn request_task(self: &Arc<Self>, worker: &str) -> TaskAssignment {
        let (assignment, ticket, entered) = {
            let mut state = self.lock();
            let entered = state.advance_phase();
            let (assignment, ticket) = state.assign(Instant::now());
            (assignment, ticket, entered)
        };

        log_phases(&entered);

        if let Some(ticket) = ticket {
            match &assignment {
                TaskAssignment::Map { filename, .. } => info!(
                    "asignando map {} (idx={}) a {} con lease {}",
                    filename, ticket.index, worker, ticket.token
                ),
                _ => info!(
                    "asignando reduce {} a {} con lease {}",
                    ticket.index, worker, ticket.token
                ),
            }
            failover::schedule_lease_expiry(Arc::downgrade(self), ticket);
        } else {
            debug!("{} pidió tarea: {:?}", worker, assignment);
        }

        assignment
    }

    /// ReportMapDone: sólo cuenta si el token es el vigente.
    pub fn report_map_done(&self, filename: &str, token: LeaseToken) -> bool {
        let (accepted, entered) = {
            let mut state = self.lock();
            let index = state.map_index.get(filename).copied();
            let Some(index) = index else {
                drop(state);
                warn!("reporte map para archivo desconocido {}", filename);
                return false;
            };
            let accepted = state.complete(TaskKind::Map, index, token);
            let entered = if accepted { state.advance_phase() } else { Vec::new() };
            (accepted, entered)
        };

        if accepted {
            info!("map {} completada", filename);
        } else {
            debug!("reporte map {} con lease {} ignorado", filename, token);
        }
        log_phases(&entered);
        accepted
    }

    /// ReportReduceDone: simétrico a `report_map_done`, sobre las tareas reduce.
    pub fn report_reduce_done(&self, partition: u32, token: LeaseToken) -> bool {
        let (accepted, entered) = {
            let mut state = self.lock();
            let accepted = state.complete(TaskKind::Reduce, partition as usize, token);
            let entered = if accepted { state.advance_phase() } else { Vec::new() };
            (accepted, entered)
        };

        if accepted {
            info!("reduce {} completada", partition);
        } else {
            debug!("reporte reduce {} con lease {} ignorado", partition, token);
        }
        log_phases(&entered);
        accepted
    }

    /// Callback del timer de lease.
    pub fn expire_lease(&self, kind: TaskKind, index: usize, token: LeaseToken) -> bool {
        let expired = self.lock().expire(kind, index, token);
        if expired {
            warn!(
                "lease {} de la tarea {} {} venció, vuelve a Idle",
                token, kind, index
            );
        }
        expired
    }

    pub fn is_done(&self) -> bool {
        self.lock().phase == JobPhase::Done
    }

    pub fn status(&self) -> JobStatusReport {
        self.lock().status()
    }

    /// Nombres de salida de las particiones reduce ya completadas.
    pub fn completed_outputs(&self) -> Vec<String> {
        let state = self.lock();
        state
            .reduce_tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, TaskState::Completed))
            .map(|(i, _)| output_file_name(i as u32))
            .collect()
    }

    #[cfg(test)]
    pub fn task_state(&self, kind: TaskKind, index: usize) -> TaskState {
        let mut state = self.lock();
        state.tasks_mut(kind)[index]
    }
}

fn log_phases(entered: &[JobPhase]) {
    for phase in entered {
        match phase {
            JobPhase::Reducing => info!("todas las tareas map completas, comienza la fase reduce"),
            JobPhase::Done => info!("todas las tareas reduce completas, job terminado"),
            JobPhase::Mapping => {}
        }
    }
}
