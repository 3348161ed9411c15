//! Caller-specific projection of a room snapshot, sent over HTTP and SSE.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::room::PlayerSummary,
    state::{
        ledger::{
            all_votes_in, counted_votes, everyone_banger_voted, everyone_submitted,
            pending_banger_voters, required_votes,
        },
        room::{Player, RoomSnapshot},
        scoring::{RoundScore, score_round},
        state_machine::RoomPhase,
    },
};

/// Everything a client renders for one room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomView {
    /// Room code.
    pub code: String,
    /// Current phase.
    pub phase: RoomPhase,
    /// Player allowed to drive transitions.
    pub host_id: String,
    /// Rounds in the game.
    pub total_rounds: u32,
    /// Current round, 0 in the lobby.
    pub round_number: u32,
    /// Whether rounds end with a banger vote.
    pub banger_enabled: bool,
    /// Ordered by score, ties keep join order.
    pub scoreboard: Vec<PlayerSummary>,
    /// Completion counters of the current phase.
    pub progress: ProgressView,
    /// Song playing, during guessing and reveal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_song: Option<CurrentSongView>,
    /// Correctness of the guesses, during reveal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_reveal: Option<SoftRevealView>,
    /// Owners and points of the round, once disclosed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_results: Option<RoundResultsView>,
    /// Present when the request identified a player.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me: Option<ViewerFlags>,
}

/// Counters the host uses to decide when to move on.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressView {
    /// Players in the roster.
    pub players: usize,
    /// Submissions for the current round.
    pub submitted: usize,
    /// Whether every player submitted.
    pub everyone_submitted: bool,
    /// Guesses counted for the current song.
    pub votes: usize,
    /// Guesses needed before the reveal.
    pub required_votes: usize,
    /// Whether the reveal guard is met.
    pub all_votes_in: bool,
    /// Banger votes cast this round.
    pub banger_votes: usize,
    /// Ids of eligible players that have not cast a banger vote yet.
    pub banger_pending: Vec<String>,
    /// Whether every eligible player cast a banger vote.
    pub everyone_banger_voted: bool,
}

/// Song playing now.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentSongView {
    /// Position in the round's play order.
    pub index: usize,
    /// Songs in the round.
    pub total: usize,
    /// Link to play.
    pub url: Option<String>,
    /// Only filled in for the owner of the song.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Aggregate shown once a song is revealed, without naming its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SoftRevealView {
    /// Guesses naming the right owner.
    pub correct_guesses: usize,
    /// Guesses cast by players other than the owner.
    pub total_guesses: usize,
}

/// Owner and correct voters of one song.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SongResultView {
    /// Position in the round's play order.
    pub index: usize,
    /// Player who submitted the song.
    pub owner_id: String,
    /// Song link, when known.
    pub url: Option<String>,
    /// Players who guessed the owner.
    pub correct_voters: Vec<String>,
}

/// Banger votes received by one owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BangerTallyView {
    /// Song owner.
    pub player_id: String,
    /// Banger votes received.
    pub votes: usize,
}

/// Points one player earned in the round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsView {
    /// Player credited.
    pub player_id: String,
    /// Points added to the score.
    pub points: i64,
}

/// Disclosed outcome of a round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundResultsView {
    /// Per-song results, in play order.
    pub songs: Vec<SongResultView>,
    /// Banger votes per song owner.
    pub banger_tally: Vec<BangerTallyView>,
    /// Owner with strictly the most banger votes.
    pub banger_winner: Option<String>,
    /// Points earned this round.
    pub points: Vec<PointsView>,
}

/// What the requesting player has done in the current phase.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewerFlags {
    /// Viewer id as presented.
    pub player_id: String,
    /// Whether the viewer is in the roster.
    pub joined: bool,
    /// Whether the viewer created the room.
    pub is_host: bool,
    /// Whether the viewer submitted this round.
    pub has_submitted: bool,
    /// Viewer's guess on the current song.
    pub my_vote: Option<String>,
    /// Song the viewer gave a banger to.
    pub my_banger: Option<usize>,
    /// Whether the song playing is the viewer's.
    pub is_owner_now: bool,
}

impl From<RoundScore> for RoundResultsView {
    fn from(score: RoundScore) -> Self {
        Self {
            songs: score
                .songs
                .into_iter()
                .map(|song| SongResultView {
                    index: song.index,
                    owner_id: song.owner_id,
                    url: song.url,
                    correct_voters: song.correct_voters,
                })
                .collect(),
            banger_tally: score
                .banger_tally
                .into_iter()
                .map(|(player_id, votes)| BangerTallyView { player_id, votes })
                .collect(),
            banger_winner: score.banger_winner,
            points: score
                .deltas
                .into_iter()
                .map(|(player_id, points)| PointsView { player_id, points })
                .collect(),
        }
    }
}

fn scoreboard(players: &[Player]) -> Vec<PlayerSummary> {
    let mut board: Vec<PlayerSummary> = players.iter().map(PlayerSummary::from).collect();
    // stable: ties stay in join order
    board.sort_by(|a, b| b.score.cmp(&a.score));
    board
}

impl RoomView {
    /// Project `snapshot` for `viewer`. Owners stay hidden until the round reveal,
    /// except from the owner themself.
    pub fn project(snapshot: &RoomSnapshot, viewer: Option<&str>) -> Self {
        let RoomSnapshot {
            room,
            players,
            ledger,
        } = snapshot;
        let roster_size = players.len();
        let in_song = room.phase.has_current_song();
        let owner = room.current_owner();

        let (votes, required) = if in_song {
            (
                counted_votes(ledger.votes_for(room.index_in_round), owner),
                required_votes(roster_size, owner.is_some()),
            )
        } else {
            (0, 0)
        };

        let progress = ProgressView {
            players: roster_size,
            submitted: ledger.submissions.len(),
            everyone_submitted: everyone_submitted(roster_size, ledger.submissions.len()),
            votes,
            required_votes: required,
            all_votes_in: in_song && all_votes_in(ledger, room, roster_size),
            banger_votes: ledger.banger_votes.len(),
            banger_pending: pending_banger_voters(players, &room.song_order, ledger)
                .into_iter()
                .map(|player| player.id.clone())
                .collect(),
            everyone_banger_voted: everyone_banger_voted(players, &room.song_order, ledger),
        };

        let current_song = in_song.then(|| CurrentSongView {
            index: room.index_in_round,
            total: room.song_order.len(),
            url: room.current_song_url.clone(),
            owner_id: owner
                .filter(|owner| viewer == Some(*owner))
                .map(str::to_owned),
        });

        let soft_reveal = (room.phase == RoomPhase::Reveal).then(|| {
            let guesses: Vec<_> = ledger
                .votes_for(room.index_in_round)
                .filter(|vote| Some(vote.voter_id.as_str()) != owner)
                .collect();
            SoftRevealView {
                correct_guesses: guesses
                    .iter()
                    .filter(|vote| Some(vote.guessed_player_id.as_str()) == owner)
                    .count(),
                total_guesses: guesses.len(),
            }
        });

        let round_results = matches!(room.phase, RoomPhase::RoundReveal | RoomPhase::Finished)
            .then(|| score_round(ledger, &room.song_order, room.banger_enabled))
            .filter(|score| !score.songs.is_empty())
            .map(RoundResultsView::from);

        let me = viewer.map(|viewer| ViewerFlags {
            player_id: viewer.to_owned(),
            joined: snapshot.has_player(viewer),
            is_host: room.is_host(viewer),
            has_submitted: ledger.submissions.contains_key(viewer),
            my_vote: in_song
                .then(|| ledger.vote_of(room.index_in_round, viewer))
                .flatten()
                .map(|vote| vote.guessed_player_id.clone()),
            my_banger: ledger.banger_votes.get(viewer).map(|vote| vote.song_index),
            is_owner_now: owner == Some(viewer),
        });

        Self {
            code: room.code.clone(),
            phase: room.phase,
            host_id: room.host_id.clone(),
            total_rounds: room.total_rounds,
            round_number: room.round_number,
            banger_enabled: room.banger_enabled,
            scoreboard: scoreboard(players),
            progress,
            current_song,
            soft_reveal,
            round_results,
            me,
        }
    }
}
