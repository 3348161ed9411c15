use crate::{
    dto::{stats::StatsResponse, view::RoomView},
    error::ServiceError,
    services::room_service::{load_snapshot, repository},
    state::{SharedState, room::Room, state_machine::RoomPhase, stats},
};

/// Current projection of the room for `viewer`.
pub async fn room_view(
    state: &SharedState,
    code: &str,
    viewer: Option<&str>,
) -> Result<RoomView, ServiceError> {
    let repo = repository(state, code).await?;
    let snapshot = load_snapshot(&repo).await?;
    Ok(RoomView::project(&snapshot, viewer))
}

/// Statistics over every round whose owners have been disclosed. Never writes.
pub async fn game_stats(state: &SharedState, code: &str) -> Result<StatsResponse, ServiceError> {
    let repo = repository(state, code).await?;
    let snapshot = load_snapshot(&repo).await?;
    let revealed = revealed_rounds(&snapshot.room);
    let rounds = repo.round_ledgers(revealed).await?;
    let computed = stats::compute(&rounds);
    Ok(StatsResponse::new(revealed, computed, &snapshot.players))
}

/// Rounds whose owners are public. The live round only counts from `roundreveal` on.
fn revealed_rounds(room: &Room) -> u32 {
    match room.phase {
        RoomPhase::RoundReveal | RoomPhase::Finished => room.round_number,
        RoomPhase::Lobby => 0,
        RoomPhase::Collect | RoomPhase::Guessing | RoomPhase::Reveal | RoomPhase::Banger => {
            room.round_number.saturating_sub(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::{SubmissionRequest, VoteRequest},
        services::{
            ledger_service,
            room_service::{self, testing::*},
        },
    };

    #[tokio::test]
    async fn view_and_stats_follow_the_game() {
        let state = memory_state().await;
        let ids = ["h", "a"];
        let code = room_with_players(&state, &ids, false).await;

        let view = room_view(&state, &code, None).await.unwrap();
        assert_eq!(view.phase, RoomPhase::Lobby);
        assert_eq!(view.scoreboard.len(), 2);

        room_service::start_game(&state, &code, "h").await.unwrap();
        for id in ids {
            ledger_service::submit_song(
                &state,
                &code,
                id,
                SubmissionRequest {
                    url: format!("spotify:track:{id}"),
                },
            )
            .await
            .unwrap();
        }
        room_service::start_round(&state, &code, "h").await.unwrap();
        let owner = snapshot(&state, &code).await.room.song_order[0].clone();
        let voter = ids.iter().copied().find(|id| *id != owner).unwrap();
        ledger_service::cast_vote(
            &state,
            &code,
            voter,
            VoteRequest {
                guessed_player_id: owner.clone(),
            },
        )
        .await
        .unwrap();

        let as_voter = room_view(&state, &code, Some(voter)).await.unwrap();
        assert!(as_voter.current_song.unwrap().owner_id.is_none());
        assert_eq!(as_voter.me.unwrap().my_vote.as_deref(), Some(owner.as_str()));

        let live = game_stats(&state, &code).await.unwrap();
        assert_eq!(live.rounds_played, 0);
        assert!(live.times_identified.is_empty());
        assert!(live.correct_guesses.is_empty());
        assert!(live.fastest_guess.is_none());

        room_service::reveal_song(&state, &code, "h").await.unwrap();
        room_service::continue_round(&state, &code, "h").await.unwrap();
        let second = snapshot(&state, &code).await.room.song_order[1].clone();
        let second_voter = ids.iter().copied().find(|id| *id != second).unwrap();
        ledger_service::cast_vote(
            &state,
            &code,
            second_voter,
            VoteRequest {
                guessed_player_id: second.clone(),
            },
        )
        .await
        .unwrap();
        room_service::reveal_song(&state, &code, "h").await.unwrap();
        room_service::continue_round(&state, &code, "h").await.unwrap();
        assert_eq!(snapshot(&state, &code).await.room.phase, RoomPhase::RoundReveal);

        let stats = game_stats(&state, &code).await.unwrap();
        assert_eq!(stats.rounds_played, 1);
        assert_eq!(stats.correct_guesses.len(), 2);
        assert!(stats.times_identified.iter().any(|entry| entry.player_id == owner));
        assert!(stats.fastest_submission.is_some());
        assert!(stats.fastest_guess.is_some());
    }

    #[test]
    fn live_round_is_excluded_until_round_reveal() {
        use crate::state::room::fixtures;

        let mut room = fixtures::room(RoomPhase::Guessing, &["a", "b"], 0);
        room.round_number = 2;
        assert_eq!(revealed_rounds(&room), 1);
        room.phase = RoomPhase::Reveal;
        assert_eq!(revealed_rounds(&room), 1);
        room.phase = RoomPhase::RoundReveal;
        assert_eq!(revealed_rounds(&room), 2);
        room.phase = RoomPhase::Lobby;
        assert_eq!(revealed_rounds(&room), 0);
    }

    #[tokio::test]
    async fn unknown_room_has_no_view() {
        let state = memory_state().await;
        let err = room_view(&state, "ZZZ999", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
