//! Builders for the store schema. Every path of a room lives under `rooms/{code}`.

use crate::dao::{document::DocPath, storage::StorageResult};

/// Top-level collection of rooms.
pub const ROOMS: &str = "rooms";
const PLAYERS: &str = "players";
const ROUNDS: &str = "rounds";
const SUBMISSIONS: &str = "submissions";
const SONGS: &str = "songs";
const VOTES: &str = "votes";
const BANGER_VOTES: &str = "bangerVotes";
const META: &str = "meta";
const ROUND_STATE: &str = "state";

/// `rooms/{code}`
pub fn room(code: &str) -> StorageResult<DocPath> {
    DocPath::from_segments([ROOMS, code])
}

/// `rooms/{code}/players`
pub fn players(code: &str) -> StorageResult<DocPath> {
    room(code)?.child(PLAYERS)
}

/// `rooms/{code}/players/{playerId}`
pub fn player(code: &str, player_id: &str) -> StorageResult<DocPath> {
    players(code)?.child(player_id)
}

fn round(code: &str, round_number: u32) -> StorageResult<DocPath> {
    room(code)?.child(ROUNDS)?.child(round_number.to_string())
}

/// `rooms/{code}/rounds/{n}/submissions`
pub fn submissions(code: &str, round_number: u32) -> StorageResult<DocPath> {
    round(code, round_number)?.child(SUBMISSIONS)
}

/// `rooms/{code}/rounds/{n}/submissions/{playerId}`
pub fn submission(code: &str, round_number: u32, player_id: &str) -> StorageResult<DocPath> {
    submissions(code, round_number)?.child(player_id)
}

/// `rooms/{code}/rounds/{n}/songs`
pub fn songs(code: &str, round_number: u32) -> StorageResult<DocPath> {
    round(code, round_number)?.child(SONGS)
}

/// `rooms/{code}/rounds/{n}/songs/{index}`
pub fn song(code: &str, round_number: u32, index: usize) -> StorageResult<DocPath> {
    songs(code, round_number)?.child(index.to_string())
}

/// `rooms/{code}/rounds/{n}/songs/{index}/votes`
pub fn votes(code: &str, round_number: u32, index: usize) -> StorageResult<DocPath> {
    song(code, round_number, index)?.child(VOTES)
}

/// `rooms/{code}/rounds/{n}/songs/{index}/votes/{voterId}`
pub fn vote(code: &str, round_number: u32, index: usize, voter_id: &str) -> StorageResult<DocPath> {
    votes(code, round_number, index)?.child(voter_id)
}

/// `rooms/{code}/rounds/{n}/bangerVotes`
pub fn banger_votes(code: &str, round_number: u32) -> StorageResult<DocPath> {
    round(code, round_number)?.child(BANGER_VOTES)
}

/// `rooms/{code}/rounds/{n}/bangerVotes/{playerId}`
pub fn banger_vote(code: &str, round_number: u32, player_id: &str) -> StorageResult<DocPath> {
    banger_votes(code, round_number)?.child(player_id)
}

/// `rooms/{code}/rounds/{n}/meta/state`, holding the collect start time.
pub fn round_state(code: &str, round_number: u32) -> StorageResult<DocPath> {
    round(code, round_number)?.child(META)?.child(ROUND_STATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_paths() {
        assert_eq!(room("ABC234").unwrap().as_str(), "rooms/ABC234");
        assert_eq!(
            vote("ABC234", 2, 0, "p1").unwrap().as_str(),
            "rooms/ABC234/rounds/2/songs/0/votes/p1"
        );
        assert_eq!(
            banger_vote("ABC234", 1, "p1").unwrap().as_str(),
            "rooms/ABC234/rounds/1/bangerVotes/p1"
        );
        assert_eq!(
            round_state("ABC234", 3).unwrap().as_str(),
            "rooms/ABC234/rounds/3/meta/state"
        );
    }

    #[test]
    fn rejects_ids_with_slashes() {
        assert!(player("ABC234", "a/b").is_err());
        assert!(room("").is_err());
    }
}
