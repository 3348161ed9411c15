use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the caller's opaque player id.
pub const PLAYER_ID_HEADER: &str = "x-player-id";
const MAX_PLAYER_ID_LENGTH: usize = 64;

/// Player id presented by the caller; required.
#[derive(Debug, Clone)]
pub struct PlayerId(pub String);

/// Player id presented by the caller, when any.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<String>);

/// Ids become document path segments, so only a conservative alphabet is accepted.
pub fn parse_player_id(raw: &str) -> Result<String, AppError> {
    let id = raw.trim();
    if id.is_empty() || id.len() > MAX_PLAYER_ID_LENGTH {
        return Err(AppError::BadRequest(format!(
            "player id must be between 1 and {MAX_PLAYER_ID_LENGTH} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(
            "player id may only contain letters, digits, '-' and '_'".into(),
        ));
    }
    Ok(id.to_owned())
}

fn header_value(parts: &Parts) -> Result<Option<String>, AppError> {
    match parts.headers.get(PLAYER_ID_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                AppError::BadRequest(format!("`{PLAYER_ID_HEADER}` must be valid ASCII"))
            })?;
            parse_player_id(raw).map(Some)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PlayerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts)?
            .map(PlayerId)
            .ok_or_else(|| AppError::BadRequest(format!("missing `{PLAYER_ID_HEADER}` header")))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts).map(Viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_browser_generated_ids() {
        assert_eq!(
            parse_player_id(" 3f2a9c1e-77b0-4c55-9a7e-1d2c3b4a5f60 ").unwrap(),
            "3f2a9c1e-77b0-4c55-9a7e-1d2c3b4a5f60"
        );
        assert!(parse_player_id("").is_err());
        assert!(parse_player_id("a/b").is_err());
        assert!(parse_player_id(&"x".repeat(65)).is_err());
    }
}
