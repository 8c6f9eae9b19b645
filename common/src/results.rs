use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    /// Directorio donde quedaron los outputs del job
    pub work_dir: String,
    /// Nombres de archivos de salida (`mr-out-Y`) de las particiones completadas
    pub files: Vec<String>,
}
