//! ReconcileEventsHandler - Command handler for reconciliation passes.
//!
//! Thin wrapper that hands the request to the reconciliation driver
//! together with the deployment's shutdown signal, so an in-flight pass
//! stops between events when the process is asked to wind down.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::foundation::DomainError;
use crate::domain::payments::{ReconcileRequest, Reconciler, ReconciliationResult};

/// Handler driving reconciliation passes.
pub struct ReconcileEventsHandler {
    reconciler: Arc<Reconciler>,
    shutdown: watch::Receiver<bool>,
}

impl ReconcileEventsHandler {
    pub fn new(reconciler: Arc<Reconciler>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            reconciler,
            shutdown,
        }
    }

    pub async fn handle(
        &self,
        request: ReconcileRequest,
    ) -> Result<ReconciliationResult, DomainError> {
        self.reconciler
            .reconcile(request, self.shutdown.clone())
            .await
    }
}
