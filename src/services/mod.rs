/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player writes to the round ledger.
pub mod ledger_service;
/// Room creation, profiles and host-driven phase transitions.
pub mod room_service;
/// Spotify link normalization.
pub mod song_link;
/// Per-room projection streams.
pub mod sse_service;
/// Storage backend selection and connection supervision.
pub mod storage_supervisor;
/// Read models: room views and game statistics.
pub mod view_service;
