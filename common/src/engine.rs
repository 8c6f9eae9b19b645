use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    intermediate_file_name, output_file_name, partition_for, KeyValue, MapFn, ReduceFn,
};

/* =========================
   Publicación atómica
   ========================= */

/// Archivo temporal que se borra al salir de scope salvo que se publique.
struct TempGuard {
    path: Option<PathBuf>,
}

impl TempGuard {
    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}

/// Escribe `dir/name` de forma atómica:
///   - escribe todo en `dir/.<name>.tmp-<uuid>`
///   - hace flush + sync
///   - renombra sobre el nombre final
/// Un lector concurrente ve el archivo viejo, el nuevo completo o ninguno,
/// nunca uno a medio escribir. Si algo falla, el temporal se borra.
pub fn publish_atomically<F>(dir: &Path, name: &str, write: F) -> io::Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    fs::create_dir_all(dir)?;

    let final_path = dir.join(name);
    let tmp_path = dir.join(format!(".{}.tmp-{}", name, uuid::Uuid::new_v4()));
    let mut guard = TempGuard {
        path: Some(tmp_path.clone()),
    };

    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, &final_path)?;
    guard.disarm();

    debug!("publicado {}", final_path.display());
    Ok(final_path)
}

/* =========================
   Intermedios (JSONL)
   ========================= */

/// Reparte los pares en `n_reduce` buckets según `ihash(key) % n_reduce`.
pub fn partition_pairs(pairs: Vec<KeyValue>, n_reduce: u32) -> Vec<Vec<KeyValue>> {
    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce.max(1) as usize];
    for kv in pairs {
        let pid = partition_for(&kv.key, n_reduce) as usize;
        buckets[pid].push(kv);
    }
    buckets
}

/// Publica un bucket como `mr-X-Y`, un objeto JSON por línea.
pub fn write_intermediate(
    work_dir: &Path,
    map_index: usize,
    partition: u32,
    pairs: &[KeyValue],
) -> io::Result<PathBuf> {
    let name = intermediate_file_name(map_index, partition);
    publish_atomically(work_dir, &name, |w| {
        for kv in pairs {
            serde_json::to_writer(&mut *w, kv)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Lee un archivo intermedio (JSONL).
pub fn read_intermediate(path: &Path) -> io::Result<Vec<KeyValue>> {
    let reader = BufReader::new(File::open(path)?);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

/* =========================
   Tarea map
   ========================= */

/// Lee un archivo de entrada completo. Los bytes que no son UTF-8 válido
/// se reemplazan por U+FFFD en vez de fallar.
pub fn read_input(input_path: &str) -> io::Result<String> {
    let bytes = fs::read(input_path).map_err(|e| {
        io::Error::new(e.kind(), format!("no se pudo leer {}: {}", input_path, e))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn remove_stale_intermediate(work_dir: &Path, map_index: usize, partition: u32) -> io::Result<()> {
    let path = work_dir.join(intermediate_file_name(map_index, partition));
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!("borrado intermedio viejo {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Ejecuta una tarea map completa:
/// 1. lee el archivo de entrada entero
/// 2. aplica la función map
/// 3. particiona por hash de la clave
/// 4. publica cada bucket no vacío como `mr-<map_index>-<bucket>` y borra
///    el `mr-<map_index>-<bucket>` de los vacíos si quedó de antes
///
/// Devuelve las rutas publicadas.
pub fn run_map_task(
    map_fn: MapFn,
    input_path: &str,
    map_index: usize,
    n_reduce: u32,
    work_dir: &Path,
) -> io::Result<Vec<PathBuf>> {
    let contents = read_input(input_path)?;

    let pairs = map_fn(input_path, &contents);
    debug!("map {} emitió {} pares", input_path, pairs.len());

    let mut published = Vec::new();
    for (pid, bucket) in partition_pairs(pairs, n_reduce).into_iter().enumerate() {
        if bucket.is_empty() {
            // un mr-X-Y de un job anterior se leería como dato vigente
            remove_stale_intermediate(work_dir, map_index, pid as u32)?;
            continue;
        }
        published.push(write_intermediate(work_dir, map_index, pid as u32, &bucket)?);
    }
    Ok(published)
}

/* =========================
   Tarea reduce
   ========================= */

/// Junta todos los pares de la partición `partition` de las `n_map` tareas map.
/// Un `mr-X-Y` inexistente es un bucket vacío (la tarea map no lo escribió).
pub fn load_partition(work_dir: &Path, partition: u32, n_map: usize) -> io::Result<Vec<KeyValue>> {
    let mut all = Vec::new();
    for map_index in 0..n_map {
        let path = work_dir.join(intermediate_file_name(map_index, partition));
        match read_intermediate(&path) {
            Ok(mut pairs) => all.append(&mut pairs),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!("no se pudo leer {}: {}", path.display(), e),
                ))
            }
        }
    }
    Ok(all)
}

/// Ordena (estable) por clave y llama a reduce una vez por cada clave distinta.
/// Devuelve (clave, resultado) en orden ascendente de clave.
pub fn group_and_reduce(mut pairs: Vec<KeyValue>, reduce_fn: ReduceFn) -> Vec<(String, String)> {
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = Vec::new();
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i + 1;
        while j < pairs.len() && pairs[j].key == pairs[i].key {
            j += 1;
        }
        let values: Vec<String> = pairs[i..j].iter().map(|kv| kv.value.clone()).collect();
        let result = reduce_fn(&pairs[i].key, &values);
        out.push((pairs[i].key.clone(), result));
        i = j;
    }
    out
}

/// Escribe líneas `<clave> <resultado>\n`.
pub fn write_output_lines<W: Write>(w: &mut W, lines: &[(String, String)]) -> io::Result<()> {
    for (key, result) in lines {
        writeln!(w, "{} {}", key, result)?;
    }
    Ok(())
}

/// Ejecuta una tarea reduce completa y publica `mr-out-<partition>`.
pub fn run_reduce_task(
    reduce_fn: ReduceFn,
    partition: u32,
    n_map: usize,
    work_dir: &Path,
) -> io::Result<PathBuf> {
    let pairs = load_partition(work_dir, partition, n_map)?;
    debug!("reduce {} leyó {} pares", partition, pairs.len());

    let lines = group_and_reduce(pairs, reduce_fn);
    publish_atomically(work_dir, &output_file_name(partition), |w| {
        write_output_lines(w, &lines)
    })
}
