use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document.
pub mod docs;
/// Health check endpoint.
pub mod health;
/// Caller identity extractors.
pub mod identity;
/// Room, host and ledger endpoints.
pub mod rooms;
/// Room projection streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(rooms::router())
        .merge(docs::router())
        .with_state(state)
}
