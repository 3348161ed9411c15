/// Health check payloads.
pub mod health;
/// Room command bodies.
pub mod room;
/// Server-sent event payloads.
pub mod sse;
/// End-of-game statistics.
pub mod stats;
/// Custom validators.
pub mod validation;
/// Per-viewer room projection.
pub mod view;
