use std::cmp::Ordering;

use crate::{
    dao::{
        document::Millis,
        models::{PlayerEntity, RoomEntity},
    },
    state::{ledger::RoundLedger, state_machine::RoomPhase},
};

/// Fewest rounds a game can have.
pub const MIN_ROUNDS: u32 = 1;
/// Most rounds a game can have.
pub const MAX_ROUNDS: u32 = 10;

/// Opaque per-browser identifier presented by clients.
pub type PlayerId = String;

/// Clamp a requested round count into the supported range.
pub fn clamp_total_rounds(requested: u32) -> u32 {
    requested.clamp(MIN_ROUNDS, MAX_ROUNDS)
}

/// Runtime view of a room document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Six-character room code, uppercase.
    pub code: String,
    /// Phase persisted with the room.
    pub phase: RoomPhase,
    /// Fixed at creation; the only id allowed to drive transitions.
    pub host_id: PlayerId,
    /// Rounds in the game, clamped to [`MIN_ROUNDS`]..=[`MAX_ROUNDS`].
    pub total_rounds: u32,
    /// 0 before the game starts.
    pub round_number: u32,
    /// Position of the current song in `song_order`.
    pub index_in_round: usize,
    /// Frozen once guessing starts.
    pub song_order: Vec<PlayerId>,
    /// Link of the song playing; hidden from players by the views.
    pub current_song_url: Option<String>,
    /// Owner of the song playing; hidden from players by the views.
    pub current_song_owner_id: Option<PlayerId>,
    /// Whether rounds end with a banger vote.
    pub banger_enabled: bool,
    /// Store time of creation.
    pub created_at: Option<Millis>,
}

impl Room {
    /// Whether `player_id` is the room host.
    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id == player_id
    }

    /// Owner of the song currently playing, when resolved.
    pub fn current_owner(&self) -> Option<&str> {
        if !self.phase.has_current_song() {
            return None;
        }
        self.current_song_owner_id
            .as_deref()
            .or_else(|| self.song_order.get(self.index_in_round).map(String::as_str))
    }

    /// Whether a song follows the current one in this round.
    pub fn has_more_songs(&self) -> bool {
        self.index_in_round + 1 < self.song_order.len()
    }

    /// Whether another round follows the current one.
    pub fn has_next_round(&self) -> bool {
        self.round_number < self.total_rounds
    }

    /// Songs a banger vote may currently reference: every song during the banger phase,
    /// songs already played while guessing is in progress, none otherwise.
    pub fn banger_votable_songs(&self) -> usize {
        match self.phase {
            RoomPhase::Banger => self.song_order.len(),
            RoomPhase::Guessing | RoomPhase::Reveal => {
                (self.index_in_round + 1).min(self.song_order.len())
            }
            _ => 0,
        }
    }
}

/// Runtime view of a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Client-chosen identifier.
    pub id: PlayerId,
    /// Display name, unique per room ignoring case.
    pub name: String,
    /// Palette colour, unique per room.
    pub color: String,
    /// Total points so far.
    pub score: i64,
    /// Whether this player created the room.
    pub is_host: bool,
    /// Store time of joining.
    pub joined_at: Option<Millis>,
}

/// Order players by join time (unknown last) then id, for stable display.
pub fn sort_by_join_order(players: &mut [Player]) {
    players.sort_by(|a, b| match (a.joined_at, b.joined_at) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// Point-in-time read of a room with its roster and the ledger of its current round.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Room document.
    pub room: Room,
    /// Roster in join order.
    pub players: Vec<Player>,
    /// Submissions and votes of `room.round_number`.
    pub ledger: RoundLedger,
}

impl RoomSnapshot {
    /// Roster entry for `player_id`.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }

    /// Whether `player_id` joined the room.
    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

impl From<(String, RoomEntity)> for Room {
    fn from((code, entity): (String, RoomEntity)) -> Self {
        Self {
            code,
            phase: entity.phase,
            host_id: entity.host_id,
            total_rounds: entity.total_rounds,
            round_number: entity.round_number,
            index_in_round: entity.index_in_round,
            song_order: entity.song_order,
            current_song_url: non_empty(entity.current_song_url),
            current_song_owner_id: non_empty(entity.current_song_owner_id),
            banger_enabled: entity.banger_enabled,
            created_at: entity.created_at,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            color: entity.color,
            score: entity.score,
            is_host: entity.is_host,
            joined_at: entity.joined_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn player(id: &str, joined_at: Millis) -> Player {
        Player {
            id: id.into(),
            name: format!("Player {id}"),
            color: "#F6E6A8".into(),
            score: 0,
            is_host: false,
            joined_at: Some(joined_at),
        }
    }

    pub fn room(phase: RoomPhase, song_order: &[&str], index_in_round: usize) -> Room {
        Room {
            code: "ABC234".into(),
            phase,
            host_id: "host".into(),
            total_rounds: 1,
            round_number: 1,
            index_in_round,
            song_order: song_order.iter().map(|id| id.to_string()).collect(),
            current_song_url: None,
            current_song_owner_id: song_order.get(index_in_round).map(|id| id.to_string()),
            banger_enabled: true,
            created_at: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};

    #[test]
    fn clamps_round_count() {
        assert_eq!(clamp_total_rounds(0), 1);
        assert_eq!(clamp_total_rounds(4), 4);
        assert_eq!(clamp_total_rounds(42), 10);
    }

    #[test]
    fn owner_is_hidden_outside_song_phases() {
        let guessing = room(RoomPhase::Guessing, &["a", "b"], 1);
        assert_eq!(guessing.current_owner(), Some("b"));

        let banger = room(RoomPhase::Banger, &["a", "b"], 1);
        assert_eq!(banger.current_owner(), None);
    }

    #[test]
    fn banger_window_grows_with_played_songs() {
        assert_eq!(room(RoomPhase::Guessing, &["a", "b", "c"], 0).banger_votable_songs(), 1);
        assert_eq!(room(RoomPhase::Reveal, &["a", "b", "c"], 1).banger_votable_songs(), 2);
        assert_eq!(room(RoomPhase::Banger, &["a", "b", "c"], 2).banger_votable_songs(), 3);
        assert_eq!(room(RoomPhase::Collect, &[], 0).banger_votable_songs(), 0);
    }

    #[test]
    fn join_order_sorting() {
        let mut players = vec![player("c", 30), player("a", 10), player("b", 10)];
        players.push(Player {
            joined_at: None,
            ..player("z", 0)
        });
        sort_by_join_order(&mut players);
        let ids: Vec<_> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "z"]);
    }
}
