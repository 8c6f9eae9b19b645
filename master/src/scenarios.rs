//! Escenarios de punta a punta: coordinador real + pipeline de `common::engine`
//! ejecutado en el mismo proceso, sin HTTP.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use common::{
    engine, partition_for, sequential, workload, JobPhase, TaskAssignment, Workload,
};

use crate::state::{Coordinator, JobConfig};

const LEASE: Duration = Duration::from_secs(10);

fn temp_dir(sub: &str) -> PathBuf {
    let base = std::env::temp_dir().join("scenario_tests").join(sub);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(&base).unwrap();
    base
}

fn write_inputs(dir: &Path, contents: &[&str]) -> Vec<String> {
    contents
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let p = dir.join(format!("pg-{}.txt", i));
            fs::write(&p, c).unwrap();
            p.to_string_lossy().to_string()
        })
        .collect()
}

fn coordinator(inputs: Vec<String>, n_reduce: u32) -> Arc<Coordinator> {
    Arc::new(
        Coordinator::new(JobConfig {
            inputs,
            n_reduce,
            lease: LEASE,
        })
        .unwrap(),
    )
}

/// Ejecuta la tarea y la reporta, como haría un worker.
fn execute_and_report(c: &Coordinator, a: &TaskAssignment, wl: &Workload, work_dir: &Path) -> bool {
    match a {
        TaskAssignment::Map {
            lease_token,
            filename,
            map_index,
            n_reduce,
        } => {
            engine::run_map_task(wl.map_fn, filename, *map_index, *n_reduce, work_dir).unwrap();
            c.report_map_done(filename, *lease_token)
        }
        TaskAssignment::Reduce {
            lease_token,
            partition,
            n_map,
        } => {
            engine::run_reduce_task(wl.reduce_fn, *partition, *n_map, work_dir).unwrap();
            c.report_reduce_done(*partition, *lease_token)
        }
        TaskAssignment::Wait | TaskAssignment::Exit => false,
    }
}

/// Un worker que pide, ejecuta y reporta hasta recibir `exit`.
fn drive_to_completion(c: &Arc<Coordinator>, wl: &Workload, work_dir: &Path) {
    loop {
        match c.request_task("w") {
            TaskAssignment::Exit => return,
            TaskAssignment::Wait => panic!("un solo worker nunca debería recibir wait"),
            a => assert!(execute_and_report(c, &a, wl, work_dir)),
        }
    }
}

/// Todas las líneas de todos los mr-out-*, ordenadas.
fn merged_output(work_dir: &Path, n_reduce: u32) -> Vec<String> {
    let mut lines = Vec::new();
    for p in 0..n_reduce {
        let content = fs::read_to_string(work_dir.join(format!("mr-out-{}", p))).unwrap();
        lines.extend(content.lines().map(str::to_string));
    }
    lines.sort();
    lines
}

fn sequential_output(inputs: &[String], wl: &Workload, dir: &Path) -> Vec<String> {
    let out = dir.join("mr-correct.txt");
    sequential::run_sequential(wl, inputs, &out).unwrap();
    let mut lines: Vec<String> = fs::read_to_string(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

#[tokio::test]
async fn wordcount_dos_archivos_dos_particiones() {
    let tmp = temp_dir("wc_2x2");
    let inputs = write_inputs(&tmp, &["a b c a", "b a d"]);
    let wl = workload::word_count();
    let c = coordinator(inputs, 2);

    drive_to_completion(&c, &wl, &tmp);

    assert!(c.is_done());
    assert_eq!(
        merged_output(&tmp, 2),
        vec!["a 3", "b 2", "c 1", "d 1"]
    );

    // cada clave vive en la partición que indica su hash, con claves ordenadas
    for p in 0..2u32 {
        let content = fs::read_to_string(tmp.join(format!("mr-out-{}", p))).unwrap();
        let keys: Vec<&str> = content.lines().map(|l| l.split(' ').next().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        for k in keys {
            assert_eq!(partition_for(k, 2), p);
        }
    }
}

#[tokio::test]
async fn salida_no_depende_del_orden_de_ejecucion() {
    let contents = [
        "el gato come pescado",
        "el perro come carne y el gato duerme",
        "pescado pescado carne",
        "",
    ];
    let wl = workload::word_count();

    // orden 1: un solo worker, en orden
    let dir1 = temp_dir("order_seq");
    let inputs1 = write_inputs(&dir1, &contents);
    let c1 = coordinator(inputs1.clone(), 3);
    drive_to_completion(&c1, &wl, &dir1);

    // orden 2: se reparten todas las tareas de una fase y se ejecutan al revés
    let dir2 = temp_dir("order_rev");
    let inputs2 = write_inputs(&dir2, &contents);
    let c2 = coordinator(inputs2, 3);
    for _phase in 0..2 {
        let mut batch = Vec::new();
        loop {
            match c2.request_task("w") {
                TaskAssignment::Wait => break,
                TaskAssignment::Exit => panic!("exit antes de tiempo"),
                a => batch.push(a),
            }
        }
        for a in batch.iter().rev() {
            assert!(execute_and_report(&c2, a, &wl, &dir2));
        }
    }
    assert!(c2.is_done());

    let expected = sequential_output(&inputs1, &wl, &dir1);
    assert_eq!(merged_output(&dir1, 3), expected);
    assert_eq!(merged_output(&dir2, 3), expected);
}

#[tokio::test]
async fn indexer_coincide_con_la_version_secuencial() {
    let tmp = temp_dir("indexer");
    let inputs = write_inputs(&tmp, &["uno dos tres", "dos tres", "tres"]);
    let wl = workload::indexer();
    let c = coordinator(inputs.clone(), 4);

    drive_to_completion(&c, &wl, &tmp);

    assert_eq!(merged_output(&tmp, 4), sequential_output(&inputs, &wl, &tmp));
}

#[tokio::test(start_paused = true)]
async fn worker_caido_tras_recibir_map_se_reasigna_tras_el_lease() {
    let tmp = temp_dir("crash");
    let inputs = write_inputs(&tmp, &["x y", "y z"]);
    let wl = workload::word_count();
    let c = coordinator(inputs, 2);

    // el worker 1 recibe una tarea y "muere" sin reportar
    let lost = c.request_task("w1");
    let TaskAssignment::Map { filename: lost_file, .. } = &lost else {
        panic!("esperaba map");
    };

    // el worker 2 hace la otra y luego sólo puede esperar
    let other = c.request_task("w2");
    assert!(execute_and_report(&c, &other, &wl, &tmp));
    assert_eq!(c.request_task("w2"), TaskAssignment::Wait);

    tokio::time::sleep(LEASE + Duration::from_millis(1)).await;

    // tras L, otro worker recibe exactamente esa tarea
    let again = c.request_task("w2");
    match &again {
        TaskAssignment::Map { filename, .. } => assert_eq!(filename, lost_file),
        other => panic!("esperaba la misma tarea map, llegó {:?}", other),
    }
    assert!(execute_and_report(&c, &again, &wl, &tmp));

    // el reporte tardío del worker caído no cambia nada
    assert!(!execute_and_report(&c, &lost, &wl, &tmp));

    drive_to_completion(&c, &wl, &tmp);
    assert_eq!(merged_output(&tmp, 2), vec!["x 1", "y 2", "z 1"]);
    assert_eq!(c.status().reassignments, 1);
}

#[tokio::test]
async fn con_todo_completo_siempre_exit() {
    let tmp = temp_dir("all_done");
    let inputs = write_inputs(&tmp, &["a"]);
    let wl = workload::word_count();
    let c = coordinator(inputs, 1);

    drive_to_completion(&c, &wl, &tmp);

    for w in ["w1", "w2", "w3"] {
        assert_eq!(c.request_task(w), TaskAssignment::Exit);
    }
    assert!(c.is_done());
    assert_eq!(c.status().phase, JobPhase::Done);
}

#[tokio::test]
async fn is_done_es_monotono() {
    let tmp = temp_dir("monotonic");
    let inputs = write_inputs(&tmp, &["a b", "c"]);
    let wl = workload::word_count();
    let c = coordinator(inputs, 2);

    let mut history = Vec::new();
    loop {
        history.push(c.is_done());
        match c.request_task("w") {
            TaskAssignment::Exit => break,
            a => {
                assert!(!c.is_done());
                execute_and_report(&c, &a, &wl, &tmp);
            }
        }
    }
    history.push(c.is_done());

    // false ... false true, nunca vuelve a false
    let first_true = history.iter().position(|d| *d).unwrap();
    assert!(history[first_true..].iter().all(|d| *d));
    assert!(history[..first_true].iter().all(|d| !*d));
}
