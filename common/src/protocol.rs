use serde::{Deserialize, Serialize};

use crate::task::LeaseToken;

/* --------- Mensajes worker -> coordinador --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Sólo para logs: el coordinador no distingue workers al asignar.
    pub worker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDoneRequest {
    pub filename: String,
    pub lease_token: LeaseToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceDoneRequest {
    pub partition: u32,
    pub lease_token: LeaseToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAck {
    /// true sólo si el reporte pasó la tarea a Completed
    pub accepted: bool,
}

/* --------- Rutas HTTP del coordinador --------- */

pub const ROUTE_HEALTH: &str = "/health";
pub const ROUTE_NEXT_TASK: &str = "/api/v1/tasks/next";
pub const ROUTE_MAP_DONE: &str = "/api/v1/tasks/map/complete";
pub const ROUTE_REDUCE_DONE: &str = "/api/v1/tasks/reduce/complete";
pub const ROUTE_JOB: &str = "/api/v1/job";
pub const ROUTE_JOB_RESULTS: &str = "/api/v1/job/results";
