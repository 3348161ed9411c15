use serde::{Deserialize, Serialize};

use crate::{dao::document::Millis, state::state_machine::RoomPhase};

/// Room document stored at `rooms/{code}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntity {
    /// Persisted phase; the machine resumes from it.
    #[serde(default)]
    pub phase: RoomPhase,
    /// Creator of the room.
    pub host_id: String,
    /// Rounds in the game.
    #[serde(default = "default_total_rounds")]
    pub total_rounds: u32,
    /// Current round, 0 in the lobby.
    #[serde(default)]
    pub round_number: u32,
    /// Position of the current song in `song_order`.
    #[serde(default)]
    pub index_in_round: usize,
    /// Player ids, one per submitted song, in play order.
    #[serde(default)]
    pub song_order: Vec<String>,
    /// Empty when no song is playing.
    #[serde(default)]
    pub current_song_url: String,
    /// Empty when no song is playing.
    #[serde(default)]
    pub current_song_owner_id: String,
    /// Whether rounds end with a banger vote.
    #[serde(default = "default_banger_enabled")]
    pub banger_enabled: bool,
    /// Store-assigned creation time.
    #[serde(default)]
    pub created_at: Option<Millis>,
}

fn default_total_rounds() -> u32 {
    1
}

fn default_banger_enabled() -> bool {
    true
}

/// Participant document stored at `rooms/{code}/players/{playerId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Player id, repeated from the document path.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Palette colour.
    #[serde(default)]
    pub color: String,
    /// Total points.
    #[serde(default)]
    pub score: i64,
    /// Whether the player created the room.
    #[serde(default)]
    pub is_host: bool,
    /// Store-assigned join time.
    #[serde(default)]
    pub joined_at: Option<Millis>,
}

/// `rooms/{code}/rounds/{n}/submissions/{playerId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntity {
    /// Normalized song link.
    pub url: String,
    /// Store-assigned submission time.
    #[serde(default)]
    pub created_at: Option<Millis>,
}

/// `rooms/{code}/rounds/{n}/songs/{index}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SongMetaEntity {
    /// Submitter of the song.
    pub owner_id: String,
    /// Song link.
    #[serde(default)]
    pub url: String,
    /// Store-assigned write time.
    #[serde(default)]
    pub created_at: Option<Millis>,
    /// When the song started playing.
    #[serde(default)]
    pub song_started_at: Option<Millis>,
}

/// `rooms/{code}/rounds/{n}/songs/{index}/votes/{voterId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteEntity {
    /// Player the voter believes owns the song.
    pub guessed_player_id: String,
    /// Store-assigned time of the latest change.
    #[serde(default)]
    pub created_at: Option<Millis>,
}

/// `rooms/{code}/rounds/{n}/bangerVotes/{playerId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BangerVoteEntity {
    /// Song picked, as an index into the song order.
    pub song_index: usize,
    /// Store-assigned vote time.
    #[serde(default)]
    pub created_at: Option<Millis>,
}

/// `rooms/{code}/rounds/{n}/meta/state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundStateEntity {
    /// When the round opened for submissions.
    #[serde(default)]
    pub collect_started_at: Option<Millis>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_uses_store_field_names() {
        let room: RoomEntity = serde_json::from_value(json!({
            "phase": "roundreveal",
            "hostId": "h1",
            "totalRounds": 3,
            "roundNumber": 2,
            "indexInRound": 1,
            "songOrder": ["a", "b"],
            "currentSongUrl": "",
            "currentSongOwnerId": "",
            "bangerEnabled": false,
            "createdAt": 17
        }))
        .unwrap();

        assert_eq!(room.phase, RoomPhase::RoundReveal);
        assert_eq!(room.song_order, vec!["a", "b"]);
        assert!(!room.banger_enabled);
        assert_eq!(room.created_at, Some(17));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let room: RoomEntity = serde_json::from_value(json!({ "hostId": "h1" })).unwrap();
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert_eq!(room.total_rounds, 1);
        assert!(room.banger_enabled);

        let player: PlayerEntity = serde_json::from_value(json!({ "id": "p1" })).unwrap();
        assert_eq!(player.score, 0);
        assert!(player.joined_at.is_none());
    }
}
