use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fase global del job. Define qué tipo de tarea se puede asignar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Mapping,
    Reducing,
    Done,
}

/// Contadores de un tipo de tarea (map o reduce).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: u32,
    pub idle: u32,
    pub in_progress: u32,
    pub completed: u32,
}

/// Estado del job tal como lo expone el coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub phase: JobPhase,
    pub done: bool,
    pub n_reduce: u32,
    pub lease_secs: u64,

    pub map_tasks: TaskCounts,
    pub reduce_tasks: TaskCounts,

    /// Leases vencidos que devolvieron una tarea a Idle
    pub reassignments: u32,

    /// -------- Tiempos del job --------
    pub created_at: DateTime<Utc>,
    pub reducing_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    /// Porcentaje de tareas completadas (map + reduce).
    pub fn progress_pct(&self) -> f64 {
        let total = self.map_tasks.total + self.reduce_tasks.total;
        if total == 0 {
            return 100.0;
        }
        let done = self.map_tasks.completed + self.reduce_tasks.completed;
        (done as f64 / total as f64) * 100.0
    }
}
