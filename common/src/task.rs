use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tipo de tarea que el coordinador puede asignar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Token opaco que identifica una asignación concreta (un "lease").
/// Se genera uno nuevo en cada asignación; los reportes con un token
/// distinto al vigente se ignoran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseToken(Uuid);

impl LeaseToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Respuesta a RequestTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TaskAssignment {
    Map {
        lease_token: LeaseToken,
        /// Archivo de entrada (identificador de la tarea map)
        filename: String,
        /// Posición del archivo en la lista de entrada, se usa en `mr-X-Y`
        map_index: usize,
        n_reduce: u32,
    },
    Reduce {
        lease_token: LeaseToken,
        partition: u32,
        /// Cantidad de tareas map, para enumerar los intermedios
        n_map: usize,
    },
    /// No hay tarea libre ahora mismo; reintentar más tarde.
    Wait,
    /// El job terminó; el worker debe salir.
    Exit,
}

impl TaskAssignment {
    pub fn kind(&self) -> Option<TaskKind> {
        match self {
            TaskAssignment::Map { .. } => Some(TaskKind::Map),
            TaskAssignment::Reduce { .. } => Some(TaskKind::Reduce),
            TaskAssignment::Wait | TaskAssignment::Exit => None,
        }
    }

    pub fn lease_token(&self) -> Option<LeaseToken> {
        match self {
            TaskAssignment::Map { lease_token, .. } | TaskAssignment::Reduce { lease_token, .. } => {
                Some(*lease_token)
            }
            TaskAssignment::Wait | TaskAssignment::Exit => None,
        }
    }
}
