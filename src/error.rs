use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        ledger::LedgerError,
        state_machine::{AbortError, ApplyError, PlanError, RoomEvent},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed or is unreachable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No storage backend is installed.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Rejected by validation before anything was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Wrong phase or a guard that is not met yet.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The room or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transition work exceeded its deadline; the room was left unchanged.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { path } => {
                ServiceError::InvalidState(format!("concurrent update on `{path}`, retry"))
            }
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected input or an action not allowed in the current phase.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The room or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A concurrent change won; the client may retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Storage is down or the transition timed out.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("another host command is in progress".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(format!(
                    "cannot {} while the room is in {}",
                    describe_event(invalid.event),
                    invalid.from
                ))
            }
        }
    }
}

fn describe_event(event: RoomEvent) -> &'static str {
    match event {
        RoomEvent::StartGame => "start the game",
        RoomEvent::StartRound => "start the round",
        RoomEvent::Reveal => "reveal the song",
        RoomEvent::NextSong => "play the next song",
        RoomEvent::OpenBanger => "open banger voting",
        RoomEvent::CloseRound => "close the round",
        RoomEvent::NextRound => "start the next round",
        RoomEvent::FinishGame => "finish the game",
        RoomEvent::Restart => "restart",
    }
}

/// Apply and abort failures mean the gate was bypassed; surface the machine's own message.
impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{InvalidTransition, RoomPhase};

    fn status(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn maps_service_errors_to_http_statuses() {
        assert_eq!(status(LedgerError::SelfGuess.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(
                PlanError::InvalidTransition(InvalidTransition {
                    from: RoomPhase::RoundReveal,
                    event: RoomEvent::CloseRound,
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(status(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(ServiceError::NotFound("room not found".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(StorageError::Conflict { path: "rooms/A".into() }.into()),
            StatusCode::CONFLICT
        );
    }
}
