use std::collections::BTreeMap;

use crate::{
    dao::document::Millis,
    state::{ledger::RoundLedger, room::PlayerId},
};

/// One latency measurement, attributed to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord {
    /// Player the measurement belongs to.
    pub player_id: PlayerId,
    /// Round the measurement was taken in.
    pub round_number: u32,
    /// Set for guess latencies.
    pub song_index: Option<usize>,
    /// Latency in milliseconds.
    pub millis: Millis,
}

/// Aggregates over a set of rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    /// Correct owner guesses per voter.
    pub correct_guesses: BTreeMap<PlayerId, usize>,
    /// How often each player's songs were identified by others.
    pub times_identified: BTreeMap<PlayerId, usize>,
    /// Banger votes received per song owner.
    pub bangers_received: BTreeMap<PlayerId, usize>,
    /// Banger votes cast per voter.
    pub bangers_given: BTreeMap<PlayerId, usize>,
    /// Shortest time from collect start to a submission.
    pub fastest_submission: Option<TimingRecord>,
    /// Longest time from collect start to a submission.
    pub slowest_submission: Option<TimingRecord>,
    /// Shortest time from song start to a vote.
    pub fastest_guess: Option<TimingRecord>,
    /// Longest time from song start to a vote.
    pub slowest_guess: Option<TimingRecord>,
}

#[derive(Default)]
struct Extremes {
    fastest: Option<TimingRecord>,
    slowest: Option<TimingRecord>,
}

impl Extremes {
    fn observe(&mut self, record: TimingRecord) {
        if self
            .fastest
            .as_ref()
            .is_none_or(|fastest| record.millis < fastest.millis)
        {
            self.fastest = Some(record.clone());
        }
        if self
            .slowest
            .as_ref()
            .is_none_or(|slowest| record.millis > slowest.millis)
        {
            self.slowest = Some(record);
        }
    }
}

/// Elapsed time between two stamps; missing stamps and negative spans are discarded.
fn latency(start: Option<Millis>, end: Option<Millis>) -> Option<Millis> {
    let elapsed = end? - start?;
    (elapsed >= 0).then_some(elapsed)
}

/// Aggregate statistics over every round played so far. Read-only.
pub fn compute(rounds: &[RoundLedger]) -> GameStats {
    let mut stats = GameStats::default();
    let mut submissions = Extremes::default();
    let mut guesses = Extremes::default();

    for ledger in rounds {
        for submission in ledger.submissions.values() {
            if let Some(millis) = latency(ledger.collect_started_at, submission.created_at) {
                submissions.observe(TimingRecord {
                    player_id: submission.player_id.clone(),
                    round_number: ledger.round_number,
                    song_index: None,
                    millis,
                });
            }
        }

        for (index, song) in &ledger.songs {
            for vote in ledger.votes_for(*index) {
                if vote.voter_id == song.owner_id {
                    continue;
                }
                if vote.guessed_player_id == song.owner_id {
                    *stats.correct_guesses.entry(vote.voter_id.clone()).or_insert(0) += 1;
                    *stats
                        .times_identified
                        .entry(song.owner_id.clone())
                        .or_insert(0) += 1;
                }
                if let Some(millis) = latency(song.song_started_at, vote.created_at) {
                    guesses.observe(TimingRecord {
                        player_id: vote.voter_id.clone(),
                        round_number: ledger.round_number,
                        song_index: Some(*index),
                        millis,
                    });
                }
            }
        }

        for vote in ledger.banger_votes.values() {
            let Some(owner) = ledger.song_owner(vote.song_index, &[]) else {
                continue;
            };
            if owner == vote.voter_id {
                continue;
            }
            *stats.bangers_received.entry(owner.to_owned()).or_insert(0) += 1;
            *stats.bangers_given.entry(vote.voter_id.clone()).or_insert(0) += 1;
        }
    }

    stats.fastest_submission = submissions.fastest;
    stats.slowest_submission = submissions.slowest;
    stats.fastest_guess = guesses.fastest;
    stats.slowest_guess = guesses.slowest;
    stats
}
