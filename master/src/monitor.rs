use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::info;

use crate::state::Coordinator;

pub const DONE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Espera a que el job termine (sondeando `is_done`) y después deja
/// `grace` de margen para que los workers que siguen pidiendo tareas
/// reciban `exit` antes de apagar el servidor.
pub async fn wait_until_done(coordinator: Arc<Coordinator>, grace: Duration) {
    while !coordinator.is_done() {
        sleep(DONE_POLL_INTERVAL).await;
    }

    let status = coordinator.status();
    info!(
        "job terminado: {} maps, {} reduces, {} reasignaciones; apagando en {:?}",
        status.map_tasks.total, status.reduce_tasks.total, status.reassignments, grace
    );
    sleep(grace).await;
}
