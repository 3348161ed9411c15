use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    room::{Player, PlayerId},
    stats::{GameStats, TimingRecord},
};

/// End-of-game statistics, with player names resolved.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Rounds whose owners are disclosed, all of them counted below.
    pub rounds_played: u32,
    /// Correct owner guesses per voter, highest first.
    pub correct_guesses: Vec<LeaderboardEntry>,
    /// How often each player's songs were identified, highest first.
    pub times_identified: Vec<LeaderboardEntry>,
    /// Banger votes received per song owner, highest first.
    pub bangers_received: Vec<LeaderboardEntry>,
    /// Banger votes cast per voter, highest first.
    pub bangers_given: Vec<LeaderboardEntry>,
    /// Quickest submission after a round opened.
    pub fastest_submission: Option<TimingView>,
    /// Slowest submission after a round opened.
    pub slowest_submission: Option<TimingView>,
    /// Quickest guess after a song started.
    pub fastest_guess: Option<TimingView>,
    /// Slowest guess after a song started.
    pub slowest_guess: Option<TimingView>,
}

/// Count attributed to one player.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Player the count belongs to.
    pub player_id: String,
    /// Display name; `None` when the player left the roster.
    pub name: Option<String>,
    /// Number of occurrences.
    pub count: usize,
}

/// Latency record attributed to one player.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimingView {
    /// Player the measurement belongs to.
    pub player_id: String,
    /// Display name; `None` when the player left the roster.
    pub name: Option<String>,
    /// Round the measurement was taken in.
    pub round_number: u32,
    /// Song guessed, for guess latencies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_index: Option<usize>,
    /// Latency in milliseconds.
    pub millis: i64,
}

struct Names<'a>(&'a [Player]);

impl Names<'_> {
    fn of(&self, player_id: &str) -> Option<String> {
        self.0
            .iter()
            .find(|player| player.id == player_id)
            .map(|player| player.name.clone())
    }

    fn leaderboard(&self, counts: BTreeMap<PlayerId, usize>) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = counts
            .into_iter()
            .map(|(player_id, count)| LeaderboardEntry {
                name: self.of(&player_id),
                player_id,
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    }

    fn timing(&self, record: Option<TimingRecord>) -> Option<TimingView> {
        record.map(|record| TimingView {
            name: self.of(&record.player_id),
            player_id: record.player_id,
            round_number: record.round_number,
            song_index: record.song_index,
            millis: record.millis,
        })
    }
}

impl StatsResponse {
    /// Resolve player names in `stats` computed over `rounds_played` rounds.
    pub fn new(rounds_played: u32, stats: GameStats, players: &[Player]) -> Self {
        let names = Names(players);
        Self {
            rounds_played,
            correct_guesses: names.leaderboard(stats.correct_guesses),
            times_identified: names.leaderboard(stats.times_identified),
            bangers_received: names.leaderboard(stats.bangers_received),
            bangers_given: names.leaderboard(stats.bangers_given),
            fastest_submission: names.timing(stats.fastest_submission),
            slowest_submission: names.timing(stats.slowest_submission),
            fastest_guess: names.timing(stats.fastest_guess),
            slowest_guess: names.timing(stats.slowest_guess),
        }
    }
}
