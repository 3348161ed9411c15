//! Validation helpers for DTOs.

use validator::ValidationError;

/// Characters used in room codes (no 0/O/1/I to avoid confusion).
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;
const MIN_NAME_CHARS: usize = 2;
const RESERVED_NAME: &str = "host";

/// Validates a display name: at least 2 characters after trimming and not "host".
///
/// ```ignore
/// validate_player_name("Ada")   // Ok
/// validate_player_name(" A ")   // Err - too short
/// validate_player_name("HOST")  // Err - reserved
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_NAME_CHARS {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at least {MIN_NAME_CHARS} characters").into(),
        );
        return Err(err);
    }

    if trimmed.eq_ignore_ascii_case(RESERVED_NAME) {
        let mut err = ValidationError::new("name_reserved");
        err.message = Some("Name \"host\" is reserved".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a room code: exactly 6 characters from [`ROOM_CODE_ALPHABET`] (case-insensitive).
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().count() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LENGTH} characters (got {})",
                code.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| ROOM_CODE_ALPHABET.contains(c.to_ascii_uppercase()))
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains unsupported characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("  Bo  ").is_ok());
        assert!(validate_player_name("Hostess").is_ok());
        assert!(validate_player_name("A").is_err());
        assert!(validate_player_name("   A   ").is_err());
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name(" HoSt ").is_err());
    }

    #[test]
    fn test_validate_room_code() {
        assert!(validate_room_code("ABC234").is_ok());
        assert!(validate_room_code("abc234").is_ok());
        assert!(validate_room_code("ABC23").is_err()); // too short
        assert!(validate_room_code("ABC2345").is_err()); // too long
        assert!(validate_room_code("ABC230").is_err()); // zero is excluded
        assert!(validate_room_code("ABCI23").is_err()); // I is excluded
    }
}
