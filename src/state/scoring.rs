use std::collections::BTreeMap;

use crate::state::{
    ledger::RoundLedger,
    room::PlayerId,
};

/// Awarded to each voter who guessed the owner.
pub const CORRECT_GUESS_POINTS: i64 = 10;
/// Awarded to the owner per correct guess on their song.
pub const OWNER_POINTS_PER_CORRECT_GUESS: i64 = 5;
/// Awarded to the unique banger winner of a round.
pub const BANGER_BONUS_POINTS: i64 = 5;

/// Who owned a song and who identified them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongResult {
    /// Position in the round's play order.
    pub index: usize,
    /// Player who submitted the song.
    pub owner_id: PlayerId,
    /// Song link, when known.
    pub url: Option<String>,
    /// Voters other than the owner who guessed the owner.
    pub correct_voters: Vec<PlayerId>,
}

/// Outcome of scoring one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundScore {
    /// Per-song results, in play order.
    pub songs: Vec<SongResult>,
    /// Banger votes received per song owner.
    pub banger_tally: BTreeMap<PlayerId, usize>,
    /// Owner with strictly the most banger votes, if any.
    pub banger_winner: Option<PlayerId>,
    /// Points to add per player; players without points are absent.
    pub deltas: BTreeMap<PlayerId, i64>,
}

/// Per-song results of the round, in play order.
pub fn song_results(ledger: &RoundLedger, song_order: &[PlayerId]) -> Vec<SongResult> {
    (0..song_order.len())
        .filter_map(|index| {
            let owner = ledger.song_owner(index, song_order)?;
            let correct_voters = ledger
                .votes_for(index)
                .filter(|vote| vote.voter_id != owner && vote.guessed_player_id == owner)
                .map(|vote| vote.voter_id.clone())
                .collect();
            let url = ledger
                .songs
                .get(&index)
                .map(|song| song.url.clone())
                .or_else(|| ledger.submissions.get(owner).map(|s| s.url.clone()));
            Some(SongResult {
                index,
                owner_id: owner.to_owned(),
                url,
                correct_voters,
            })
        })
        .collect()
}

/// Banger votes per song owner, ignoring votes for one's own song.
pub fn banger_tally(ledger: &RoundLedger, song_order: &[PlayerId]) -> BTreeMap<PlayerId, usize> {
    let mut tally = BTreeMap::new();
    for vote in ledger.banger_votes.values() {
        match ledger.song_owner(vote.song_index, song_order) {
            Some(owner) if owner != vote.voter_id => {
                *tally.entry(owner.to_owned()).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    tally
}

/// The player holding the strictly highest positive tally, if unique.
pub fn banger_winner(tally: &BTreeMap<PlayerId, usize>) -> Option<PlayerId> {
    let max = tally.values().copied().max().filter(|max| *max > 0)?;
    let mut leaders = tally.iter().filter(|(_, count)| **count == max);
    let (winner, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(winner.clone())
}

/// Score a completed round in one pass over all of its songs.
pub fn score_round(ledger: &RoundLedger, song_order: &[PlayerId], with_banger: bool) -> RoundScore {
    let songs = song_results(ledger, song_order);
    let mut deltas: BTreeMap<PlayerId, i64> = BTreeMap::new();

    for song in &songs {
        for voter in &song.correct_voters {
            *deltas.entry(voter.clone()).or_insert(0) += CORRECT_GUESS_POINTS;
        }
        if !song.correct_voters.is_empty() {
            *deltas.entry(song.owner_id.clone()).or_insert(0) +=
                OWNER_POINTS_PER_CORRECT_GUESS * song.correct_voters.len() as i64;
        }
    }

    let (banger_tally, banger_winner) = if with_banger {
        let tally = banger_tally(ledger, song_order);
        let winner = banger_winner(&tally);
        if let Some(winner) = &winner {
            *deltas.entry(winner.clone()).or_insert(0) += BANGER_BONUS_POINTS;
        }
        (tally, winner)
    } else {
        (BTreeMap::new(), None)
    };

    RoundScore {
        songs,
        banger_tally,
        banger_winner,
        deltas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ledger::fixtures::*;

    fn order(ids: &[&str]) -> Vec<PlayerId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn tally(entries: &[(&str, usize)]) -> BTreeMap<PlayerId, usize> {
        entries.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    #[test]
    fn two_of_three_correct() {
        let song_order = order(&["a", "b", "c", "d"]);
        let mut ledger = RoundLedger::empty(1);
        ledger.songs.insert(0, song(0, "a", 1));
        with_votes(
            &mut ledger,
            0,
            vec![vote("b", "a", 2), vote("c", "a", 3), vote("d", "b", 4)],
        );

        let score = score_round(&ledger, &song_order[..1], false);
        assert_eq!(score.deltas.get("b"), Some(&10));
        assert_eq!(score.deltas.get("c"), Some(&10));
        assert_eq!(score.deltas.get("a"), Some(&10));
        assert_eq!(score.deltas.get("d"), None);
        assert_eq!(score.songs[0].correct_voters, vec!["b", "c"]);
    }

    #[test]
    fn bonus_sums_match_correct_guesses() {
        let song_order = order(&["a", "b", "c"]);
        let mut ledger = RoundLedger::empty(1);
        for (index, owner) in song_order.iter().enumerate() {
            ledger.songs.insert(index, song(index, owner, 1));
        }
        with_votes(&mut ledger, 0, vec![vote("b", "a", 1), vote("c", "a", 1)]);
        with_votes(&mut ledger, 1, vec![vote("a", "c", 1), vote("c", "b", 1)]);
        with_votes(&mut ledger, 2, vec![vote("a", "b", 1), vote("b", "a", 1)]);

        let score = score_round(&ledger, &song_order, false);
        let correct: usize = score.songs.iter().map(|s| s.correct_voters.len()).sum();
        assert_eq!(correct, 3);
        let total: i64 = score.deltas.values().sum();
        assert_eq!(
            total,
            (CORRECT_GUESS_POINTS + OWNER_POINTS_PER_CORRECT_GUESS) * correct as i64
        );
    }

    #[test]
    fn owner_guessing_own_song_is_ignored() {
        let song_order = order(&["a", "b"]);
        let mut ledger = RoundLedger::empty(1);
        with_votes(&mut ledger, 0, vec![vote("a", "a", 1)]);
        let score = score_round(&ledger, &song_order, false);
        assert!(score.deltas.is_empty());
    }

    #[test]
    fn banger_bonus_requires_unique_positive_max() {
        assert_eq!(banger_winner(&tally(&[("a", 2), ("b", 2)])), None);
        assert_eq!(banger_winner(&tally(&[("a", 3), ("b", 1)])), Some("a".into()));
        assert_eq!(banger_winner(&tally(&[("a", 0)])), None);
        assert_eq!(banger_winner(&BTreeMap::new()), None);
    }

    #[test]
    fn banger_bonus_joins_round_deltas() {
        let song_order = order(&["a", "b", "c"]);
        let mut ledger = RoundLedger::empty(1);
        ledger.banger_votes.insert("b".into(), banger("b", 0));
        ledger.banger_votes.insert("c".into(), banger("c", 0));
        ledger.banger_votes.insert("a".into(), banger("a", 1));

        let score = score_round(&ledger, &song_order, true);
        assert_eq!(score.banger_tally, tally(&[("a", 2), ("b", 1)]));
        assert_eq!(score.banger_winner.as_deref(), Some("a"));
        assert_eq!(score.deltas.get("a"), Some(&BANGER_BONUS_POINTS));

        let without = score_round(&ledger, &song_order, false);
        assert!(without.deltas.is_empty());
        assert!(without.banger_winner.is_none());
    }
}
