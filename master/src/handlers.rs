use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    protocol::{
        ROUTE_HEALTH, ROUTE_JOB, ROUTE_JOB_RESULTS, ROUTE_MAP_DONE, ROUTE_NEXT_TASK,
        ROUTE_REDUCE_DONE,
    },
    JobResults, JobStatusReport, MapDoneRequest, ReduceDoneRequest, ReportAck, TaskAssignment,
    TaskRequest,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(ROUTE_HEALTH, get(health))
        .route(ROUTE_NEXT_TASK, post(next_task))
        .route(ROUTE_MAP_DONE, post(map_done))
        .route(ROUTE_REDUCE_DONE, post(reduce_done))
        .route(ROUTE_JOB, get(job_status))
        .route(ROUTE_JOB_RESULTS, get(job_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// RequestTask: map, reduce, wait o exit
async fn next_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskAssignment> {
    Json(state.coordinator.request_task(&req.worker))
}

// ReportMapDone. Un token viejo no es error: se responde accepted=false.
async fn map_done(
    State(state): State<AppState>,
    Json(req): Json<MapDoneRequest>,
) -> Json<ReportAck> {
    let accepted = state
        .coordinator
        .report_map_done(&req.filename, req.lease_token);
    Json(ReportAck { accepted })
}

// ReportReduceDone, ruta separada de la de map
async fn reduce_done(
    State(state): State<AppState>,
    Json(req): Json<ReduceDoneRequest>,
) -> Json<ReportAck> {
    let accepted = state
        .coordinator
        .report_reduce_done(req.partition, req.lease_token);
    Json(ReportAck { accepted })
}

// IsDone + métricas del job
async fn job_status(State(state): State<AppState>) -> Json<JobStatusReport> {
    Json(state.coordinator.status())
}

// Lista archivos de salida de las particiones ya completadas
async fn job_results(State(state): State<AppState>) -> Json<JobResults> {
    let files = state
        .coordinator
        .completed_outputs()
        .into_iter()
        .filter(|name| state.work_dir.join(name).is_file())
        .collect();

    Json(JobResults {
        work_dir: state.work_dir.to_string_lossy().to_string(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Coordinator, JobConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use common::{JobPhase, LeaseToken};
    use serde::{de::DeserializeOwned, Serialize};
    use std::{fs, path::PathBuf, sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("handlers_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn app(inputs: &[&str], n_reduce: u32, work_dir: PathBuf) -> Router {
        let coordinator = Coordinator::new(JobConfig {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            n_reduce,
            lease: Duration::from_secs(10),
        })
        .unwrap();

        build_router(AppState {
            coordinator: Arc::new(coordinator),
            work_dir,
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(app: &Router, uri: &str, body: &B) -> R {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();

        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get_json<R: DeserializeOwned>(app: &Router, uri: &str) -> R {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn worker(name: &str) -> TaskRequest {
        TaskRequest {
            worker: name.to_string(),
        }
    }

    #[tokio::test]
    async fn health_responde_ok() {
        let app = app(&["a"], 1, temp_dir("health"));
        let req = Request::builder().uri(ROUTE_HEALTH).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn protocolo_completo_por_http() {
        let dir = temp_dir("protocol");
        let app = app(&["a.txt"], 1, dir.clone());

        let a: TaskAssignment = post(&app, ROUTE_NEXT_TASK, &worker("w1")).await;
        let TaskAssignment::Map { filename, lease_token, .. } = a else {
            panic!("esperaba map");
        };

        let w: TaskAssignment = post(&app, ROUTE_NEXT_TASK, &worker("w2")).await;
        assert_eq!(w, TaskAssignment::Wait);

        // token equivocado: 200 con accepted=false
        let ack: ReportAck = post(
            &app,
            ROUTE_MAP_DONE,
            &MapDoneRequest {
                filename: filename.clone(),
                lease_token: LeaseToken::mint(),
            },
        )
        .await;
        assert!(!ack.accepted);

        let ack: ReportAck = post(&app, ROUTE_MAP_DONE, &MapDoneRequest { filename, lease_token }).await;
        assert!(ack.accepted);

        let r: TaskAssignment = post(&app, ROUTE_NEXT_TASK, &worker("w2")).await;
        let TaskAssignment::Reduce { partition, lease_token, n_map } = r else {
            panic!("esperaba reduce");
        };
        assert_eq!((partition, n_map), (0, 1));

        fs::write(dir.join("mr-out-0"), "a 1\n").unwrap();
        let ack: ReportAck = post(
            &app,
            ROUTE_REDUCE_DONE,
            &ReduceDoneRequest {
                partition,
                lease_token,
            },
        )
        .await;
        assert!(ack.accepted);

        let status: JobStatusReport = get_json(&app, ROUTE_JOB).await;
        assert!(status.done);
        assert_eq!(status.phase, JobPhase::Done);
        assert!(status.finished_at.is_some());

        let e: TaskAssignment = post(&app, ROUTE_NEXT_TASK, &worker("w3")).await;
        assert_eq!(e, TaskAssignment::Exit);

        let results: JobResults = get_json(&app, ROUTE_JOB_RESULTS).await;
        assert_eq!(results.files, vec!["mr-out-0".to_string()]);
    }

    #[tokio::test]
    async fn results_omite_particiones_sin_completar() {
        let app = app(&[], 2, temp_dir("results_partial"));
        let results: JobResults = get_json(&app, ROUTE_JOB_RESULTS).await;
        assert!(results.files.is_empty());
    }

    #[tokio::test]
    async fn body_invalido_devuelve_error_de_cliente() {
        let app = app(&["a"], 1, temp_dir("bad_body"));
        let req = Request::builder()
            .method(Method::POST)
            .uri(ROUTE_MAP_DONE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"filename\": 3}"))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
