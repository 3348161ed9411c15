//! Player-driven writes of the round ledger: submissions, guesses and banger votes.
//! Each write is validated against a fresh snapshot taken under the room gate.

use tracing::{debug, info};

use crate::{
    dao::{
        document::{Fields, WriteBatch},
        paths,
    },
    dto::room::{
        BangerVoteRequest, BangerVoteResponse, SubmissionRequest, SubmissionResponse,
        VoteRequest, VoteResponse,
    },
    error::ServiceError,
    services::{
        room_service::{load_snapshot, repository, room_not_found},
        song_link,
    },
    state::{
        SharedState,
        ledger::{LedgerError, check_banger_vote, check_submission, check_vote},
        room::Room,
        state_machine::RoomPhase,
    },
};

fn wrong_phase(action: &str, phase: RoomPhase) -> ServiceError {
    ServiceError::InvalidState(format!("cannot {action} while the room is in {phase}"))
}

/// Submit (or replace) the caller's song for the collecting round.
pub async fn submit_song(
    state: &SharedState,
    code: &str,
    player_id: &str,
    request: SubmissionRequest,
) -> Result<SubmissionResponse, ServiceError> {
    let url = song_link::normalize(&request.url)
        .ok_or_else(|| ServiceError::InvalidInput("not a valid Spotify link".into()))?;
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let repo = &repo;

    state
        .run_exclusive(repo.code(), room.phase, move || async move {
            let snapshot = load_snapshot(repo).await?;
            let room = &snapshot.room;
            if room.phase != RoomPhase::Collect {
                return Err(wrong_phase("submit a song", room.phase));
            }
            check_submission(&snapshot.players, &snapshot.ledger.submissions, player_id, &url)?;

            let mut batch = WriteBatch::new();
            batch.set(
                paths::submission(repo.code(), room.round_number, player_id)?,
                Fields::new()
                    .value("url", url.as_str())
                    .timestamp("createdAt"),
            );
            repo.commit(batch).await?;
            info!(room = repo.code(), player = player_id, round = room.round_number, "song submitted");

            Ok(SubmissionResponse {
                url,
                round_number: room.round_number,
            })
        })
        .await
}

/// Guess the owner of the song currently playing. A second guess replaces the first.
pub async fn cast_vote(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let repo = &repo;

    state
        .run_exclusive(repo.code(), room.phase, move || async move {
            let snapshot = load_snapshot(repo).await?;
            let room = &snapshot.room;
            if room.phase != RoomPhase::Guessing {
                return Err(wrong_phase("vote", room.phase));
            }
            check_vote(
                &snapshot.players,
                room.current_owner(),
                voter_id,
                &request.guessed_player_id,
            )?;

            let song_index = room.index_in_round;
            let mut batch = WriteBatch::new();
            batch.set(
                paths::vote(repo.code(), room.round_number, song_index, voter_id)?,
                Fields::new()
                    .value("guessedPlayerId", request.guessed_player_id.as_str())
                    .timestamp("createdAt"),
            );
            repo.commit(batch).await?;
            debug!(room = repo.code(), player = voter_id, song = song_index, "vote recorded");

            Ok(VoteResponse {
                song_index,
                guessed_player_id: request.guessed_player_id,
            })
        })
        .await
}

fn ensure_banger_open(room: &Room) -> Result<(), ServiceError> {
    if !room.banger_enabled {
        return Err(LedgerError::BangerDisabled.into());
    }
    if room.banger_votable_songs() == 0 {
        return Err(wrong_phase("vote for a banger", room.phase));
    }
    Ok(())
}

/// Pick the best song of the round. Allowed while songs play and during banger voting.
pub async fn cast_banger_vote(
    state: &SharedState,
    code: &str,
    voter_id: &str,
    request: BangerVoteRequest,
) -> Result<BangerVoteResponse, ServiceError> {
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let repo = &repo;

    state
        .run_exclusive(repo.code(), room.phase, move || async move {
            let snapshot = load_snapshot(repo).await?;
            let room = &snapshot.room;
            ensure_banger_open(room)?;
            check_banger_vote(room, &snapshot.players, voter_id, request.song_index)?;

            let mut batch = WriteBatch::new();
            batch.set(
                paths::banger_vote(repo.code(), room.round_number, voter_id)?,
                Fields::new()
                    .value("songIndex", request.song_index)
                    .timestamp("createdAt"),
            );
            repo.commit(batch).await?;
            debug!(room = repo.code(), player = voter_id, song = request.song_index, "banger vote recorded");

            Ok(BangerVoteResponse {
                song_index: Some(request.song_index),
            })
        })
        .await
}

/// Take back the caller's banger vote for the current round.
pub async fn withdraw_banger_vote(
    state: &SharedState,
    code: &str,
    voter_id: &str,
) -> Result<BangerVoteResponse, ServiceError> {
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let repo = &repo;

    state
        .run_exclusive(repo.code(), room.phase, move || async move {
            let snapshot = load_snapshot(repo).await?;
            let room = &snapshot.room;
            ensure_banger_open(room)?;
            if !snapshot.has_player(voter_id) {
                return Err(LedgerError::UnknownPlayer(voter_id.to_owned()).into());
            }

            if snapshot.ledger.banger_votes.contains_key(voter_id) {
                let mut batch = WriteBatch::new();
                batch.delete(paths::banger_vote(repo.code(), room.round_number, voter_id)?);
                repo.commit(batch).await?;
                debug!(room = repo.code(), player = voter_id, "banger vote withdrawn");
            }

            Ok(BangerVoteResponse { song_index: None })
        })
        .await
}
