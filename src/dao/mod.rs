/// Paths, field writes and atomic batches shared by every backend.
pub mod document;
/// Storage backends and the handle services commit through.
pub mod document_store;
/// Persisted document shapes.
pub mod models;
/// Path builders for the room schema.
pub mod paths;
/// Typed reads and commits scoped to one room.
pub mod room_repository;
/// Backend-agnostic storage errors.
pub mod storage;
