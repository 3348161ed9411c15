//! Per-round submissions, guesses and banger votes, plus the completion predicates
//! derived from them. Everything here is a pure function of a snapshot.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

use crate::{
    dao::{
        document::Millis,
        models::{BangerVoteEntity, SongMetaEntity, SubmissionEntity, VoteEntity},
    },
    state::room::{Player, PlayerId, Room},
};

/// One player's song link for the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Submitter.
    pub player_id: PlayerId,
    /// Normalized link.
    pub url: String,
    /// Store time of the submission.
    pub created_at: Option<Millis>,
}

/// Song written lazily when it becomes current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongMeta {
    /// Position in the round's song order.
    pub index: usize,
    /// Player who submitted the song.
    pub owner_id: PlayerId,
    /// Normalized link.
    pub url: String,
    /// Store time the document was written.
    pub created_at: Option<Millis>,
    /// When the song started playing; base of guess latencies.
    pub song_started_at: Option<Millis>,
}

/// A guess of who owns a song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Player who cast the guess.
    pub voter_id: PlayerId,
    /// Player the voter believes owns the song.
    pub guessed_player_id: PlayerId,
    /// Store time of the latest change of mind.
    pub created_at: Option<Millis>,
}

/// A vote for the best song of the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BangerVote {
    /// Player who cast the vote.
    pub voter_id: PlayerId,
    /// Song picked, as an index into the song order.
    pub song_index: usize,
    /// Store time of the vote.
    pub created_at: Option<Millis>,
}

/// Everything recorded for one round of a room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundLedger {
    /// Round the ledger belongs to, starting at 1.
    pub round_number: u32,
    /// When the round opened for submissions; base of submission latencies.
    pub collect_started_at: Option<Millis>,
    /// Submissions keyed by player, in submission order.
    pub submissions: IndexMap<PlayerId, Submission>,
    /// Song metas written so far, keyed by index.
    pub songs: BTreeMap<usize, SongMeta>,
    /// Guesses keyed by song index, then by voter.
    pub votes: BTreeMap<usize, IndexMap<PlayerId, Vote>>,
    /// Banger votes keyed by voter.
    pub banger_votes: IndexMap<PlayerId, BangerVote>,
}

impl RoundLedger {
    /// Ledger of a round with nothing recorded yet.
    pub fn empty(round_number: u32) -> Self {
        Self {
            round_number,
            ..Self::default()
        }
    }

    /// Guesses on the song at `index`.
    pub fn votes_for(&self, index: usize) -> impl Iterator<Item = &Vote> {
        self.votes.get(&index).into_iter().flat_map(|votes| votes.values())
    }

    /// Guess of `voter_id` on the song at `index`.
    pub fn vote_of(&self, index: usize, voter_id: &str) -> Option<&Vote> {
        self.votes.get(&index).and_then(|votes| votes.get(voter_id))
    }

    /// Owner of the song at `index`, taken from its meta document or else the song order.
    pub fn song_owner<'a>(&'a self, index: usize, song_order: &'a [PlayerId]) -> Option<&'a str> {
        self.songs
            .get(&index)
            .map(|song| song.owner_id.as_str())
            .or_else(|| song_order.get(index).map(String::as_str))
    }
}

/// Rejections raised before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The player is not in the roster.
    #[error("player `{0}` is not part of this room")]
    UnknownPlayer(PlayerId),
    /// Someone else already submitted the same normalized link.
    #[error("this song was already submitted by another player")]
    DuplicateSong,
    /// No song is playing.
    #[error("no song is currently being guessed")]
    NoCurrentSong,
    /// Owners do not vote on their own song.
    #[error("the owner of a song cannot vote on it")]
    OwnerCannotVote,
    /// A voter named themselves as owner.
    #[error("you cannot guess yourself")]
    SelfGuess,
    /// The room was created without banger voting.
    #[error("banger voting is disabled for this room")]
    BangerDisabled,
    /// Index past the songs that can receive a banger now.
    #[error("song {0} cannot receive banger votes right now")]
    SongNotVotable(usize),
    /// A banger for one's own song.
    #[error("you cannot give a banger to your own song")]
    OwnBanger,
}

/// `true` once every current player has a submission (and there is at least one player).
pub fn everyone_submitted(players: usize, submitted: usize) -> bool {
    players > 0 && submitted >= players
}

/// Votes needed before the current song can be revealed.
pub fn required_votes(players: usize, owner_resolved: bool) -> usize {
    if owner_resolved {
        players.saturating_sub(1)
    } else {
        players
    }
}

/// Votes that count toward the reveal guard: every vote not cast by the owner.
pub fn counted_votes<'a>(votes: impl Iterator<Item = &'a Vote>, owner: Option<&str>) -> usize {
    votes
        .filter(|vote| Some(vote.voter_id.as_str()) != owner)
        .count()
}

/// Whether the current song has every vote the reveal guard requires.
pub fn all_votes_in(ledger: &RoundLedger, room: &Room, players: usize) -> bool {
    let owner = room.current_owner();
    counted_votes(ledger.votes_for(room.index_in_round), owner)
        >= required_votes(players, owner.is_some())
}

/// Whether the round holds at least one song `player_id` may give a banger to.
pub fn banger_eligible(player_id: &str, song_order: &[PlayerId]) -> bool {
    song_order.iter().any(|owner| owner != player_id)
}

/// Players still expected to cast a banger vote.
pub fn pending_banger_voters<'a>(
    players: &'a [Player],
    song_order: &[PlayerId],
    ledger: &RoundLedger,
) -> Vec<&'a Player> {
    players
        .iter()
        .filter(|player| banger_eligible(&player.id, song_order))
        .filter(|player| !ledger.banger_votes.contains_key(&player.id))
        .collect()
}

/// Whether every eligible player cast a banger vote.
pub fn everyone_banger_voted(players: &[Player], song_order: &[PlayerId], ledger: &RoundLedger) -> bool {
    !players.is_empty() && pending_banger_voters(players, song_order, ledger).is_empty()
}

fn ensure_member(roster: &[Player], player_id: &str) -> Result<(), LedgerError> {
    if roster.iter().any(|player| player.id == player_id) {
        Ok(())
    } else {
        Err(LedgerError::UnknownPlayer(player_id.to_owned()))
    }
}

/// Reject a normalized link already submitted by someone else this round.
pub fn check_submission(
    roster: &[Player],
    submissions: &IndexMap<PlayerId, Submission>,
    player_id: &str,
    url: &str,
) -> Result<(), LedgerError> {
    ensure_member(roster, player_id)?;
    let taken = submissions
        .values()
        .any(|submission| submission.player_id != player_id && submission.url == url);
    if taken {
        return Err(LedgerError::DuplicateSong);
    }
    Ok(())
}

/// Validate a guess on the current song, owned by `owner`.
pub fn check_vote(
    roster: &[Player],
    owner: Option<&str>,
    voter_id: &str,
    guessed_player_id: &str,
) -> Result<(), LedgerError> {
    ensure_member(roster, voter_id)?;
    let owner = owner.ok_or(LedgerError::NoCurrentSong)?;
    if owner == voter_id {
        return Err(LedgerError::OwnerCannotVote);
    }
    if guessed_player_id == voter_id {
        return Err(LedgerError::SelfGuess);
    }
    ensure_member(roster, guessed_player_id)
}

/// Validate a banger vote against the room settings and phase.
pub fn check_banger_vote(
    room: &Room,
    roster: &[Player],
    voter_id: &str,
    song_index: usize,
) -> Result<(), LedgerError> {
    ensure_member(roster, voter_id)?;
    if !room.banger_enabled {
        return Err(LedgerError::BangerDisabled);
    }
    if song_index >= room.banger_votable_songs() {
        return Err(LedgerError::SongNotVotable(song_index));
    }
    if room.song_order.get(song_index).map(String::as_str) == Some(voter_id) {
        return Err(LedgerError::OwnBanger);
    }
    Ok(())
}

/// Uniformly random play order of the round's submitters (Fisher–Yates).
pub fn shuffle_song_order<R: Rng + ?Sized>(
    mut submitters: Vec<PlayerId>,
    rng: &mut R,
) -> Vec<PlayerId> {
    submitters.shuffle(rng);
    submitters
}

impl From<(PlayerId, SubmissionEntity)> for Submission {
    fn from((player_id, entity): (PlayerId, SubmissionEntity)) -> Self {
        Self {
            player_id,
            url: entity.url,
            created_at: entity.created_at,
        }
    }
}

impl From<(usize, SongMetaEntity)> for SongMeta {
    fn from((index, entity): (usize, SongMetaEntity)) -> Self {
        Self {
            index,
            owner_id: entity.owner_id,
            url: entity.url,
            created_at: entity.created_at,
            song_started_at: entity.song_started_at,
        }
    }
}

impl From<(PlayerId, VoteEntity)> for Vote {
    fn from((voter_id, entity): (PlayerId, VoteEntity)) -> Self {
        Self {
            voter_id,
            guessed_player_id: entity.guessed_player_id,
            created_at: entity.created_at,
        }
    }
}

impl From<(PlayerId, BangerVoteEntity)> for BangerVote {
    fn from((voter_id, entity): (PlayerId, BangerVoteEntity)) -> Self {
        Self {
            voter_id,
            song_index: entity.song_index,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn submission(player_id: &str, url: &str, created_at: Millis) -> Submission {
        Submission {
            player_id: player_id.into(),
            url: url.into(),
            created_at: Some(created_at),
        }
    }

    pub fn song(index: usize, owner_id: &str, started_at: Millis) -> SongMeta {
        SongMeta {
            index,
            owner_id: owner_id.into(),
            url: format!("https://open.spotify.com/track/{owner_id}"),
            created_at: Some(started_at),
            song_started_at: Some(started_at),
        }
    }

    pub fn vote(voter_id: &str, guessed: &str, created_at: Millis) -> Vote {
        Vote {
            voter_id: voter_id.into(),
            guessed_player_id: guessed.into(),
            created_at: Some(created_at),
        }
    }

    pub fn banger(voter_id: &str, song_index: usize) -> BangerVote {
        BangerVote {
            voter_id: voter_id.into(),
            song_index,
            created_at: Some(1),
        }
    }

    pub fn with_votes(ledger: &mut RoundLedger, index: usize, votes: Vec<Vote>) {
        ledger.votes.insert(
            index,
            votes
                .into_iter()
                .map(|vote| (vote.voter_id.clone(), vote))
                .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};
    use crate::state::{
        room::fixtures::{player, room},
        state_machine::RoomPhase,
    };
    use rand::{SeedableRng, rngs::StdRng};

    fn roster(ids: &[&str]) -> Vec<Player> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| player(id, i as Millis))
            .collect()
    }

    #[test]
    fn everyone_submitted_tracks_roster_size() {
        assert!(!everyone_submitted(0, 0));
        assert!(!everyone_submitted(3, 2));
        assert!(everyone_submitted(3, 3));
        // late join
        assert!(!everyone_submitted(4, 3));
    }

    #[test]
    fn required_votes_excludes_resolved_owner() {
        assert_eq!(required_votes(4, true), 3);
        assert_eq!(required_votes(4, false), 4);
        assert_eq!(required_votes(0, true), 0);
    }

    #[test]
    fn owner_votes_are_not_counted() {
        let room = room(RoomPhase::Guessing, &["a", "b", "c"], 0);
        let mut ledger = RoundLedger::empty(1);
        with_votes(&mut ledger, 0, vec![vote("a", "b", 1), vote("b", "a", 2)]);
        assert!(!all_votes_in(&ledger, &room, 3));

        with_votes(
            &mut ledger,
            0,
            vec![vote("a", "b", 1), vote("b", "a", 2), vote("c", "a", 3)],
        );
        assert!(all_votes_in(&ledger, &room, 3));
    }

    #[test]
    fn duplicate_song_from_other_player_is_rejected() {
        let players = roster(&["a", "b"]);
        let mut submissions = IndexMap::new();
        submissions.insert("a".to_string(), submission("a", "https://open.spotify.com/track/x", 1));

        assert_eq!(
            check_submission(&players, &submissions, "b", "https://open.spotify.com/track/x"),
            Err(LedgerError::DuplicateSong)
        );
        // resubmitting the same link yourself is an overwrite
        assert!(check_submission(&players, &submissions, "a", "https://open.spotify.com/track/x").is_ok());
        assert_eq!(
            check_submission(&players, &submissions, "zz", "https://open.spotify.com/track/y"),
            Err(LedgerError::UnknownPlayer("zz".into()))
        );
    }

    #[test]
    fn vote_validation() {
        let players = roster(&["a", "b", "c"]);
        assert_eq!(
            check_vote(&players, Some("a"), "a", "b"),
            Err(LedgerError::OwnerCannotVote)
        );
        assert_eq!(
            check_vote(&players, Some("a"), "b", "b"),
            Err(LedgerError::SelfGuess)
        );
        assert_eq!(
            check_vote(&players, Some("a"), "b", "ghost"),
            Err(LedgerError::UnknownPlayer("ghost".into()))
        );
        assert_eq!(
            check_vote(&players, None, "b", "a"),
            Err(LedgerError::NoCurrentSong)
        );
        assert!(check_vote(&players, Some("a"), "b", "c").is_ok());
    }

    #[test]
    fn banger_validation() {
        let players = roster(&["a", "b", "c"]);
        let guessing = room(RoomPhase::Guessing, &["a", "b", "c"], 1);

        assert_eq!(
            check_banger_vote(&guessing, &players, "a", 0),
            Err(LedgerError::OwnBanger)
        );
        assert!(check_banger_vote(&guessing, &players, "b", 0).is_ok());
        assert_eq!(
            check_banger_vote(&guessing, &players, "b", 2),
            Err(LedgerError::SongNotVotable(2))
        );

        let mut disabled = room(RoomPhase::Banger, &["a", "b", "c"], 2);
        assert!(check_banger_vote(&disabled, &players, "a", 2).is_ok());
        disabled.banger_enabled = false;
        assert_eq!(
            check_banger_vote(&disabled, &players, "a", 2),
            Err(LedgerError::BangerDisabled)
        );
    }

    #[test]
    fn banger_guard_skips_players_without_eligible_song() {
        let players = roster(&["a", "b"]);
        let mut ledger = RoundLedger::empty(1);
        ledger.banger_votes.insert("a".into(), banger("a", 1));
        assert!(!everyone_banger_voted(&players, &["a".into(), "b".into()], &ledger));

        ledger.banger_votes.insert("b".into(), banger("b", 0));
        assert!(everyone_banger_voted(&players, &["a".into(), "b".into()], &ledger));

        // a lone player's only song is their own
        let solo = roster(&["a"]);
        assert!(everyone_banger_voted(&solo, &["a".into()], &RoundLedger::empty(1)));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let ids: Vec<PlayerId> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut shuffled = shuffle_song_order(ids.clone(), &mut rng);
        shuffled.sort();
        assert_eq!(shuffled, ids);
    }

    #[test]
    fn song_owner_prefers_meta() {
        let mut ledger = RoundLedger::empty(1);
        ledger.songs.insert(0, song(0, "b", 10));
        let order = vec!["a".to_string(), "c".to_string()];
        assert_eq!(ledger.song_owner(0, &order), Some("b"));
        assert_eq!(ledger.song_owner(1, &order), Some("c"));
        assert_eq!(ledger.song_owner(2, &order), None);
    }
}
