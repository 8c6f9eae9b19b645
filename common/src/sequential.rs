use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use crate::{engine, Workload};

/// Corre el job completo en un solo proceso: map de cada entrada,
/// sort estable por clave, reduce por clave y escritura de
/// "<clave> <resultado>" en `output_path`.
///
/// Sirve como referencia para comparar la salida distribuida.
pub fn run_sequential<P: AsRef<Path>>(
    workload: &Workload,
    inputs: &[String],
    output_path: P,
) -> io::Result<()> {
    let mut intermediate = Vec::new();
    for input in inputs {
        let contents = engine::read_input(input)?;
        intermediate.extend((workload.map_fn)(input, &contents));
    }

    let lines = engine::group_and_reduce(intermediate, workload.reduce_fn);

    // Crear carpeta de salida si hace falta
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = io::BufWriter::new(fs::File::create(output_path)?);
    engine::write_output_lines(&mut writer, &lines)?;
    writer.flush()?;
    Ok(())
}
