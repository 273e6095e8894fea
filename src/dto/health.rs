use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Identifier of the bout currently loaded.
    pub bout_id: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(bout_id: String) -> Self {
        Self {
            status: "ok".to_string(),
            bout_id,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(bout_id: String) -> Self {
        Self {
            status: "degraded".to_string(),
            bout_id,
        }
    }
}
