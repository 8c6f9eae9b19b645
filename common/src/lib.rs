//! Tipos y lógica compartida entre coordinador, workers y cliente:
//! mensajes del protocolo, convención de nombres de archivos, el pipeline
//! de ejecución map/reduce y los workloads incluidos.

use serde::{Deserialize, Serialize};
use std::hash::Hasher;

pub mod engine;
pub mod job;
pub mod protocol;
pub mod results;
pub mod sequential;
pub mod task;
pub mod workload;

pub use job::{JobPhase, JobStatusReport, TaskCounts};
pub use protocol::{MapDoneRequest, ReduceDoneRequest, ReportAck, TaskRequest};
pub use results::JobResults;
pub use task::{LeaseToken, TaskAssignment, TaskKind};
pub use workload::{MapFn, ReduceFn, Workload};

/// Un par clave/valor emitido por una función map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Hash de una clave intermedia. El bucket de reduce de una clave es
/// `ihash(key) % n_reduce`. FNV es estable entre builds y plataformas,
/// así que workers compilados por separado particionan igual.
pub fn ihash(key: &str) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key.as_bytes());
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Bucket de reduce para una clave.
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce.max(1)
}

/// Nombre del archivo intermedio de la tarea map `map_index` para el bucket `partition`.
pub fn intermediate_file_name(map_index: usize, partition: u32) -> String {
    format!("mr-{}-{}", map_index, partition)
}

/// Nombre del archivo de salida de la partición de reduce `partition`.
pub fn output_file_name(partition: u32) -> String {
    format!("mr-out-{}", partition)
}
