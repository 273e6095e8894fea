use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether bouts are being persisted, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.bout_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let bout_id = state.snapshot().await.id.to_string();
    if state.is_degraded() {
        HealthResponse::degraded(bout_id)
    } else {
        HealthResponse::ok(bout_id)
    }
}
