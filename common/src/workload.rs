use std::collections::BTreeSet;

use crate::KeyValue;

/// Función map: recibe (nombre de archivo, contenido) y emite pares clave/valor.
pub type MapFn = fn(filename: &str, contents: &str) -> Vec<KeyValue>;

/// Función reduce: recibe una clave y todos sus valores, devuelve el resultado.
pub type ReduceFn = fn(key: &str, values: &[String]) -> String;

/// Una aplicación map/reduce que se inyecta en el worker.
#[derive(Clone, Copy)]
pub struct Workload {
    pub name: &'static str,
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

impl std::fmt::Debug for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workload").field("name", &self.name).finish()
    }
}

/// Workloads incluidos, por nombre.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" | "wordcount" => Some(word_count()),
        "indexer" => Some(indexer()),
        _ => None,
    }
}

pub fn available() -> &'static [&'static str] {
    &["wc", "indexer"]
}

/* =========================
   WordCount
   ========================= */

pub fn word_count() -> Workload {
    Workload {
        name: "wc",
        map_fn: wc_map,
        reduce_fn: wc_reduce,
    }
}

/// Cada token separado por espacios -> (token, "1")
fn wc_map(_filename: &str, contents: &str) -> Vec<KeyValue> {
    contents
        .split_whitespace()
        .map(|token| KeyValue::new(token, "1"))
        .collect()
}

fn wc_reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}

/* =========================
   Índice invertido
   ========================= */

pub fn indexer() -> Workload {
    Workload {
        name: "indexer",
        map_fn: indexer_map,
        reduce_fn: indexer_reduce,
    }
}

/// Cada palabra distinta del documento -> (palabra, documento)
fn indexer_map(filename: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<&str> = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    words
        .into_iter()
        .map(|w| KeyValue::new(w, filename))
        .collect()
}

/// "<cantidad> <doc1,doc2,...>" con documentos ordenados
fn indexer_reduce(_key: &str, values: &[String]) -> String {
    let mut docs: Vec<&str> = values.iter().map(String::as_str).collect();
    docs.sort_unstable();
    docs.dedup();
    format!("{} {}", docs.len(), docs.join(","))
}
