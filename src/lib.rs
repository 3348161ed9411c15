//! Library crate for the Whose Song? backend, exposing modules for binaries and tests.

/// JSON application configuration.
pub mod config;
/// Document storage: paths, backends and the room repository.
pub mod dao;
/// Request, response and stream payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum route trees.
pub mod routes;
/// Use cases driven by the routes.
pub mod services;
/// Shared application state and the pure game rules.
pub mod state;
