use serde::Serialize;
use utoipa::ToSchema;

const OK: &str = "ok";
const DEGRADED: &str = "degraded";

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
}

impl HealthResponse {
    /// Storage backend installed and answering.
    pub fn ok() -> Self {
        Self {
            status: OK.to_string(),
        }
    }

    /// No storage backend is installed or the installed one is failing.
    pub fn degraded() -> Self {
        Self {
            status: DEGRADED.to_string(),
        }
    }

    /// Whether the status is `ok`.
    pub fn is_ok(&self) -> bool {
        self.status == OK
    }
}
