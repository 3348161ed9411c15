//! Request and response bodies of the room command endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_player_name,
    state::{room::Player, state_machine::RoomPhase},
};

/// Options chosen when opening a new room. Missing values use the defaults
/// (1 round, banger voting on).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Clamped into 1..=10.
    #[serde(default)]
    pub total_rounds: Option<u32>,
    /// Whether rounds end with a banger vote.
    #[serde(default)]
    pub banger_enabled: Option<bool>,
}

/// Identifiers handed to the creator of a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    /// Code other players join with.
    pub code: String,
    /// Player id the creator must present to drive the game.
    pub host_id: String,
}

/// Name and colour saved when joining or editing a profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProfileRequest {
    /// Display name, unique per room ignoring case.
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
    /// Palette colour; when omitted the first colour nobody uses yet is picked.
    #[serde(default)]
    pub color: Option<String>,
}

/// Lobby settings; only the provided fields change.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SettingsRequest {
    /// Clamped into 1..=10.
    #[serde(default)]
    pub total_rounds: Option<u32>,
    /// Turn banger voting on or off.
    #[serde(default)]
    pub banger_enabled: Option<bool>,
}

/// Song link for the current round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmissionRequest {
    /// Spotify link or `spotify:` URI.
    #[validate(length(min = 1, max = 512))]
    pub url: String,
}

/// Guess of who owns the song playing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VoteRequest {
    /// Player believed to own the song.
    #[validate(length(min = 1))]
    pub guessed_player_id: String,
}

/// Vote for the best song of the round.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BangerVoteRequest {
    /// Position of the song in this round's play order.
    pub song_index: usize,
}

/// Public roster entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Player id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Palette colour.
    pub color: String,
    /// Total points so far.
    pub score: i64,
    /// Whether the player created the room.
    pub is_host: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            color: player.color.clone(),
            score: player.score,
            is_host: player.is_host,
        }
    }
}

/// Outcome of a host command. Commands from anyone but the host are ignored
/// and reported with `applied: false`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Whether the command changed the room.
    pub applied: bool,
    /// Phase after the command.
    pub phase: RoomPhase,
}

impl ActionResponse {
    /// Command accepted; the room is now in `phase`.
    pub fn applied(phase: RoomPhase) -> Self {
        Self {
            applied: true,
            phase,
        }
    }

    /// Command dropped; the room stays in `phase`.
    pub fn ignored(phase: RoomPhase) -> Self {
        Self {
            applied: false,
            phase,
        }
    }
}

/// Submission as stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionResponse {
    /// Canonical form of the submitted link.
    pub url: String,
    /// Round the submission belongs to.
    pub round_number: u32,
}

/// Guess as stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    /// Song the guess applies to.
    pub song_index: usize,
    /// Player guessed as owner.
    pub guessed_player_id: String,
}

/// Banger vote as stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct BangerVoteResponse {
    /// `None` once the vote has been withdrawn.
    pub song_index: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_name_is_validated() {
        let ok = ProfileRequest {
            name: "Ada".into(),
            color: None,
        };
        assert!(ok.validate().is_ok());

        let reserved = ProfileRequest {
            name: "Host".into(),
            color: None,
        };
        let errors = reserved.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn create_request_accepts_empty_body() {
        let request: CreateRoomRequest = serde_json::from_str("{}").unwrap();
        assert!(request.total_rounds.is_none());
        assert!(request.banger_enabled.is_none());
    }
}
