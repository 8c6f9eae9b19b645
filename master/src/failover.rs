use std::sync::Weak;

use tokio::time::sleep_until;
use tracing::debug;

use crate::state::{Coordinator, LeaseTicket};

/// Tolerancia a fallos por lease:
/// - cada asignación agenda exactamente un chequeo en su deadline
/// - el chequeo lleva el token con el que se asignó la tarea y sólo
///   devuelve la tarea a Idle si ese token sigue vigente
/// - si la tarea ya se completó o se reasignó, no hace nada
///
/// Usa un `Weak` para no mantener vivo al coordinador por timers pendientes.
pub fn schedule_lease_expiry(coordinator: Weak<Coordinator>, ticket: LeaseTicket) {
    tokio::spawn(async move {
        sleep_until(ticket.deadline).await;

        let Some(coordinator) = coordinator.upgrade() else {
            return;
        };

        if !coordinator.expire_lease(ticket.kind, ticket.index, ticket.token) {
            debug!(
                "lease {} de {} {} ya no estaba vigente",
                ticket.token, ticket.kind, ticket.index
            );
        }
    });
}
