use std::{collections::BTreeMap, future::Future};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        document::{Fields, WriteBatch},
        paths,
        room_repository::RoomRepository,
        storage::StorageError,
    },
    dto::{
        room::{
            ActionResponse, CreateRoomRequest, CreateRoomResponse, PlayerSummary, ProfileRequest,
            SettingsRequest,
        },
        validation::{ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH, validate_room_code},
    },
    error::ServiceError,
    state::{
        SharedState,
        ledger::{RoundLedger, all_votes_in, everyone_banger_voted, everyone_submitted, shuffle_song_order},
        room::{MIN_ROUNDS, Player, PlayerId, Room, RoomSnapshot, clamp_total_rounds},
        scoring::score_round,
        state_machine::{RoomEvent, RoomPhase},
    },
};

/// Upper-case a client supplied room code after checking its format.
pub(crate) fn normalize_code(raw: &str) -> Result<String, ServiceError> {
    validate_room_code(raw).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.to_string())
                .unwrap_or_else(|| "invalid room code".into()),
        )
    })?;
    Ok(raw.to_ascii_uppercase())
}

pub(crate) async fn repository(
    state: &SharedState,
    code: &str,
) -> Result<RoomRepository, ServiceError> {
    let code = normalize_code(code)?;
    let store = state.require_store().await?;
    Ok(RoomRepository::new(store, code))
}

pub(crate) fn room_not_found() -> ServiceError {
    ServiceError::NotFound("room not found".into())
}

pub(crate) async fn load_snapshot(repo: &RoomRepository) -> Result<RoomSnapshot, ServiceError> {
    repo.snapshot().await?.ok_or_else(room_not_found)
}

fn require_phase(room: &Room, expected: RoomPhase) -> Result<(), ServiceError> {
    if room.phase == expected {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "room is in {}, expected {expected}",
            room.phase
        )))
    }
}

pub(crate) fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let alphabet = ROOM_CODE_ALPHABET.as_bytes();
    (0..ROOM_CODE_LENGTH)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// Open a new room in the lobby with `host_id` as its host.
pub async fn create_room(
    state: &SharedState,
    host_id: &str,
    request: CreateRoomRequest,
) -> Result<CreateRoomResponse, ServiceError> {
    let store = state.require_store().await?;
    let total_rounds = clamp_total_rounds(request.total_rounds.unwrap_or(MIN_ROUNDS));
    let banger_enabled = request.banger_enabled.unwrap_or(true);
    let attempts = state.config().room_code_attempts();

    for attempt in 1..=attempts {
        let code = generate_room_code(&mut rand::rng());
        let mut batch = WriteBatch::new();
        batch.create(
            paths::room(&code)?,
            clear_round(Fields::new(), 0)
                .value("phase", RoomPhase::Lobby.as_str())
                .value("hostId", host_id)
                .value("totalRounds", total_rounds)
                .value("bangerEnabled", banger_enabled)
                .timestamp("createdAt"),
        );

        match store.commit(batch).await {
            Ok(_) => {
                info!(room = %code, host = host_id, total_rounds, banger_enabled, "room created");
                return Ok(CreateRoomResponse {
                    code,
                    host_id: host_id.to_owned(),
                });
            }
            Err(StorageError::Conflict { .. }) => {
                debug!(room = %code, attempt, "room code already taken");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(attempts, "could not allocate a free room code");
    Err(ServiceError::InvalidState(
        "could not allocate a free room code, please retry".into(),
    ))
}

/// Create the caller's player on first save, afterwards update name and colour only.
pub async fn save_profile(
    state: &SharedState,
    code: &str,
    player_id: &str,
    request: ProfileRequest,
) -> Result<PlayerSummary, ServiceError> {
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let config = state.config();

    let requested_color = match request.color.as_deref() {
        Some(color) => Some(
            config
                .palette_color(color)
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!("colour `{color}` is not part of the palette"))
                })?
                .to_owned(),
        ),
        None => None,
    };
    let name = request.name.trim().to_owned();
    let repo = &repo;

    state
        .run_exclusive(repo.code(), room.phase, move || async move {
            let players = repo.players().await?;
            let is_host = room.is_host(player_id);
            let path = paths::player(repo.code(), player_id)?;
            let mut batch = WriteBatch::new();

            let (mut player, created) = match players.iter().find(|p| p.id == player_id) {
                Some(existing) => {
                    let color = requested_color.unwrap_or_else(|| existing.color.clone());
                    batch.merge(
                        path,
                        Fields::new()
                            .value("name", name.as_str())
                            .value("color", color.as_str())
                            .value("isHost", is_host),
                    );
                    let player = Player {
                        name,
                        color,
                        is_host,
                        ..existing.clone()
                    };
                    (player, false)
                }
                None => {
                    let used: Vec<&str> = players.iter().map(|p| p.color.as_str()).collect();
                    let color = requested_color
                        .or_else(|| config.first_unused_color(&used).map(str::to_owned))
                        .unwrap_or_default();
                    batch.set(
                        path,
                        Fields::new()
                            .value("id", player_id)
                            .value("name", name.as_str())
                            .value("color", color.as_str())
                            .value("score", 0)
                            .value("isHost", is_host)
                            .timestamp("joinedAt"),
                    );
                    let player = Player {
                        id: player_id.to_owned(),
                        name,
                        color,
                        score: 0,
                        is_host,
                        joined_at: None,
                    };
                    (player, true)
                }
            };

            let committed_at = repo.commit(batch).await?;
            if created {
                player.joined_at = Some(committed_at);
                info!(room = repo.code(), player = player_id, "player joined");
            } else {
                debug!(room = repo.code(), player = player_id, "profile updated");
            }
            Ok(PlayerSummary::from(&player))
        })
        .await
}

/// Change the round count or banger mode while the room is still in the lobby.
pub async fn update_settings(
    state: &SharedState,
    code: &str,
    caller: &str,
    request: SettingsRequest,
) -> Result<ActionResponse, ServiceError> {
    let repo = repository(state, code).await?;
    let snapshot_room = repo.room().await?.ok_or_else(room_not_found)?;
    if !snapshot_room.is_host(caller) {
        debug!(room = repo.code(), player = caller, "ignoring settings change from non-host");
        return Ok(ActionResponse::ignored(snapshot_room.phase));
    }

    let repo = &repo;
    let phase = state
        .run_exclusive(repo.code(), snapshot_room.phase, move || async move {
            let room = repo.room().await?.ok_or_else(room_not_found)?;
            require_phase(&room, RoomPhase::Lobby)?;

            let mut fields = Fields::new();
            if let Some(total_rounds) = request.total_rounds {
                fields = fields.value("totalRounds", clamp_total_rounds(total_rounds));
            }
            if let Some(banger_enabled) = request.banger_enabled {
                fields = fields.value("bangerEnabled", banger_enabled);
            }
            if !fields.is_empty() {
                let mut batch = WriteBatch::new();
                batch.merge(paths::room(repo.code())?, fields);
                repo.commit(batch).await?;
                info!(room = repo.code(), "room settings updated");
            }
            Ok(room.phase)
        })
        .await?;

    Ok(ActionResponse::applied(phase))
}

/// Read the room, ignore callers other than the host, then run `work` for the event
/// chosen by `choose` under the room gate against a fresh snapshot.
async fn run_host_command<C, W, Fut>(
    state: &SharedState,
    code: &str,
    caller: &str,
    choose: C,
    work: W,
) -> Result<ActionResponse, ServiceError>
where
    C: Fn(&Room) -> RoomEvent,
    W: FnOnce(RoomRepository, RoomSnapshot, RoomEvent) -> Fut,
    Fut: Future<Output = Result<(), ServiceError>>,
{
    let repo = repository(state, code).await?;
    let room = repo.room().await?.ok_or_else(room_not_found)?;
    let event = choose(&room);

    if !room.is_host(caller) {
        debug!(room = repo.code(), player = caller, event = ?event, "ignoring command from non-host");
        return Ok(ActionResponse::ignored(room.phase));
    }

    let room_code = repo.code().to_owned();
    let (_, phase) = state
        .run_transition(&room_code, room.phase, event, move || async move {
            let snapshot = load_snapshot(&repo).await?;
            if choose(&snapshot.room) != event {
                return Err(ServiceError::InvalidState(
                    "room changed while the command was queued, retry".into(),
                ));
            }
            work(repo, snapshot, event).await
        })
        .await?;

    Ok(ActionResponse::applied(phase))
}

/// Reset the per-round pointers of the room document, opening `round_number`.
fn clear_round(fields: Fields, round_number: u32) -> Fields {
    clear_song_pointer(fields)
        .value("roundNumber", round_number)
        .value("indexInRound", 0)
        .value("songOrder", Vec::<String>::new())
}

fn clear_song_pointer(fields: Fields) -> Fields {
    fields
        .value("currentSongUrl", "")
        .value("currentSongOwnerId", "")
}

/// Point the room at song `index` and stamp its meta document.
fn play_song(
    batch: &mut WriteBatch,
    room: &Room,
    ledger: &RoundLedger,
    song_order: &[PlayerId],
    index: usize,
) -> Result<(), ServiceError> {
    let owner = song_order
        .get(index)
        .ok_or_else(|| ServiceError::InvalidState(format!("song {index} is not part of the round")))?;
    let url = ledger
        .submissions
        .get(owner)
        .map(|submission| submission.url.clone())
        .ok_or_else(|| ServiceError::InvalidState(format!("no submission found for song {index}")))?;

    batch.merge(
        paths::room(&room.code)?,
        Fields::new()
            .value("phase", RoomPhase::Guessing.as_str())
            .value("indexInRound", index)
            .value("currentSongUrl", url.as_str())
            .value("currentSongOwnerId", owner.as_str()),
    );
    batch.set(
        paths::song(&room.code, room.round_number, index)?,
        Fields::new()
            .value("ownerId", owner.as_str())
            .value("url", url)
            .timestamp("createdAt")
            .timestamp("songStartedAt"),
    );
    Ok(())
}

/// Score the whole round and move to the round reveal in the same batch.
fn close_round(
    batch: &mut WriteBatch,
    snapshot: &RoomSnapshot,
    with_banger: bool,
) -> Result<BTreeMap<PlayerId, i64>, ServiceError> {
    let RoomSnapshot {
        room,
        ledger,
        ..
    } = snapshot;
    let score = score_round(ledger, &room.song_order, with_banger);

    for (player_id, delta) in &score.deltas {
        if *delta == 0 {
            continue;
        }
        if !snapshot.has_player(player_id) {
            warn!(room = %room.code, player = %player_id, "skipping points for unknown player");
            continue;
        }
        batch.merge(
            paths::player(&room.code, player_id)?,
            Fields::new().increment("score", *delta),
        );
    }
    batch.merge(
        paths::room(&room.code)?,
        clear_song_pointer(Fields::new()).value("phase", RoomPhase::RoundReveal.as_str()),
    );

    if let Some(winner) = &score.banger_winner {
        info!(room = %room.code, player = %winner, "banger bonus awarded");
    }
    Ok(score.deltas)
}

/// lobby -> collect, round 1.
pub async fn start_game(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        |_| RoomEvent::StartGame,
        |repo, snapshot, _| async move {
            require_phase(&snapshot.room, RoomPhase::Lobby)?;
            let mut batch = WriteBatch::new();
            batch.merge(
                paths::room(repo.code())?,
                clear_round(Fields::new(), 1).value("phase", RoomPhase::Collect.as_str()),
            );
            batch.set(
                paths::round_state(repo.code(), 1)?,
                Fields::new().timestamp("collectStartedAt"),
            );
            repo.commit(batch).await?;
            Ok(())
        },
    )
    .await
}

/// collect -> guessing once every player submitted: freeze a shuffled song order.
pub async fn start_round(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        |_| RoomEvent::StartRound,
        |repo, snapshot, _| async move {
            let RoomSnapshot {
                room,
                players,
                ledger,
            } = &snapshot;
            require_phase(room, RoomPhase::Collect)?;
            if !everyone_submitted(players.len(), ledger.submissions.len()) {
                return Err(ServiceError::InvalidState(format!(
                    "waiting for submissions ({}/{})",
                    ledger.submissions.len(),
                    players.len()
                )));
            }

            let submitters: Vec<PlayerId> = ledger.submissions.keys().cloned().collect();
            let song_order = shuffle_song_order(submitters, &mut rand::rng());

            let mut batch = WriteBatch::new();
            batch.merge(
                paths::room(repo.code())?,
                Fields::new().value("songOrder", song_order.clone()),
            );
            play_song(&mut batch, room, ledger, &song_order, 0)?;
            repo.commit(batch).await?;
            info!(room = repo.code(), round = room.round_number, songs = song_order.len(), "round started");
            Ok(())
        },
    )
    .await
}

/// guessing -> reveal once every non-owner voted on the current song.
pub async fn reveal_song(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        |_| RoomEvent::Reveal,
        |repo, snapshot, _| async move {
            let RoomSnapshot {
                room,
                players,
                ledger,
            } = &snapshot;
            require_phase(room, RoomPhase::Guessing)?;
            if !all_votes_in(ledger, room, players.len()) {
                return Err(ServiceError::InvalidState(
                    "waiting for every player to vote".into(),
                ));
            }

            let mut batch = WriteBatch::new();
            batch.merge(
                paths::room(repo.code())?,
                Fields::new().value("phase", RoomPhase::Reveal.as_str()),
            );
            repo.commit(batch).await?;
            Ok(())
        },
    )
    .await
}

fn continue_event(room: &Room) -> RoomEvent {
    if room.has_more_songs() {
        RoomEvent::NextSong
    } else if room.banger_enabled {
        RoomEvent::OpenBanger
    } else {
        RoomEvent::CloseRound
    }
}

/// reveal -> next song, banger voting, or the round reveal.
pub async fn continue_round(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        continue_event,
        |repo, snapshot, event| async move {
            require_phase(&snapshot.room, RoomPhase::Reveal)?;
            let mut batch = WriteBatch::new();
            match event {
                RoomEvent::NextSong => {
                    let room = &snapshot.room;
                    play_song(
                        &mut batch,
                        room,
                        &snapshot.ledger,
                        &room.song_order,
                        room.index_in_round + 1,
                    )?;
                }
                RoomEvent::OpenBanger => {
                    batch.merge(
                        paths::room(repo.code())?,
                        clear_song_pointer(Fields::new())
                            .value("phase", RoomPhase::Banger.as_str()),
                    );
                }
                _ => {
                    let deltas = close_round(&mut batch, &snapshot, false)?;
                    info!(room = repo.code(), deltas = ?deltas, "round scored");
                }
            }
            repo.commit(batch).await?;
            Ok(())
        },
    )
    .await
}

/// banger -> round reveal once every eligible player cast a banger vote.
pub async fn finalize_banger(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        |_| RoomEvent::CloseRound,
        |repo, snapshot, _| async move {
            let RoomSnapshot {
                room,
                players,
                ledger,
            } = &snapshot;
            require_phase(room, RoomPhase::Banger)?;
            if !everyone_banger_voted(players, &room.song_order, ledger) {
                return Err(ServiceError::InvalidState(
                    "waiting for every player to cast a banger vote".into(),
                ));
            }

            let mut batch = WriteBatch::new();
            let deltas = close_round(&mut batch, &snapshot, true)?;
            repo.commit(batch).await?;
            info!(room = repo.code(), deltas = ?deltas, "round scored");
            Ok(())
        },
    )
    .await
}

fn next_event(room: &Room) -> RoomEvent {
    if room.has_next_round() {
        RoomEvent::NextRound
    } else {
        RoomEvent::FinishGame
    }
}

/// round reveal -> collect for the following round, or finished after the last one.
pub async fn next_round(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        next_event,
        |repo, snapshot, event| async move {
            require_phase(&snapshot.room, RoomPhase::RoundReveal)?;
            let mut batch = WriteBatch::new();
            if event == RoomEvent::NextRound {
                let round_number = snapshot.room.round_number + 1;
                batch.merge(
                    paths::room(repo.code())?,
                    clear_round(Fields::new(), round_number)
                        .value("phase", RoomPhase::Collect.as_str()),
                );
                batch.set(
                    paths::round_state(repo.code(), round_number)?,
                    Fields::new().timestamp("collectStartedAt"),
                );
            } else {
                batch.merge(
                    paths::room(repo.code())?,
                    Fields::new().value("phase", RoomPhase::Finished.as_str()),
                );
            }
            repo.commit(batch).await?;
            Ok(())
        },
    )
    .await
}

/// Any phase -> lobby with every score zeroed. Round documents are removed afterwards,
/// best-effort.
pub async fn restart(
    state: &SharedState,
    code: &str,
    caller: &str,
) -> Result<ActionResponse, ServiceError> {
    run_host_command(
        state,
        code,
        caller,
        |_| RoomEvent::Restart,
        |repo, snapshot, _| async move {
            let mut batch = WriteBatch::new();
            for player in &snapshot.players {
                batch.merge(
                    paths::player(repo.code(), &player.id)?,
                    Fields::new().value("score", 0),
                );
            }
            batch.merge(
                paths::room(repo.code())?,
                clear_round(Fields::new(), 0).value("phase", RoomPhase::Lobby.as_str()),
            );
            repo.commit(batch).await?;

            if let Err(err) = discard_rounds(&repo, snapshot.room.round_number).await {
                warn!(room = repo.code(), error = %err, "failed to discard round documents after restart");
            }
            Ok(())
        },
    )
    .await
}

async fn discard_rounds(repo: &RoomRepository, through: u32) -> Result<(), ServiceError> {
    let code = repo.code();
    let mut batch = WriteBatch::new();
    for ledger in repo.round_ledgers(through).await? {
        let round = ledger.round_number;
        for player_id in ledger.submissions.keys() {
            batch.delete(paths::submission(code, round, player_id)?);
        }
        for (index, votes) in &ledger.votes {
            for voter_id in votes.keys() {
                batch.delete(paths::vote(code, round, *index, voter_id)?);
            }
        }
        for index in ledger.songs.keys() {
            batch.delete(paths::song(code, round, *index)?);
        }
        for player_id in ledger.banger_votes.keys() {
            batch.delete(paths::banger_vote(code, round, player_id)?);
        }
        batch.delete(paths::round_state(code, round)?);
    }

    if !batch.is_empty() {
        let removed = batch.len();
        repo.commit(batch).await?;
        debug!(room = code, removed, "round documents discarded");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::memory::MemoryDocumentStore,
        state::AppState,
    };

    pub async fn memory_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        state
    }

    /// Room hosted by `ids[0]` with every id joined, in order.
    pub async fn room_with_players(state: &SharedState, ids: &[&str], banger: bool) -> String {
        let created = create_room(
            state,
            ids[0],
            CreateRoomRequest {
                total_rounds: Some(1),
                banger_enabled: Some(banger),
            },
        )
        .await
        .unwrap();
        for id in ids {
            join(state, &created.code, id).await;
        }
        created.code
    }

    pub async fn join(state: &SharedState, code: &str, id: &str) {
        save_profile(
            state,
            code,
            id,
            ProfileRequest {
                name: format!("Player {id}"),
                color: None,
            },
        )
        .await
        .unwrap();
    }

    pub async fn snapshot(state: &SharedState, code: &str) -> RoomSnapshot {
        let repo = repository(state, code).await.unwrap();
        load_snapshot(&repo).await.unwrap()
    }

    pub fn scores(snapshot: &RoomSnapshot) -> BTreeMap<String, i64> {
        snapshot
            .players
            .iter()
            .map(|player| (player.id.clone(), player.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::{testing::*, *};
    use crate::{
        dto::{
            room::{BangerVoteRequest, SubmissionRequest, VoteRequest},
            view::RoomView,
        },
        services::ledger_service,
    };

    async fn submit_all(state: &SharedState, code: &str, ids: &[&str]) {
        for id in ids {
            ledger_service::submit_song(
                state,
                code,
                id,
                SubmissionRequest {
                    url: format!("spotify:track:{id}song"),
                },
            )
            .await
            .unwrap();
        }
    }

    async fn vote(state: &SharedState, code: &str, voter: &str, guessed: &str) {
        ledger_service::cast_vote(
            state,
            code,
            voter,
            VoteRequest {
                guessed_player_id: guessed.into(),
            },
        )
        .await
        .unwrap();
    }

    /// Someone who is neither the voter nor the owner.
    fn wrong_guess<'a>(ids: &[&'a str], voter: &str, owner: &str) -> &'a str {
        ids.iter()
            .copied()
            .find(|id| *id != voter && *id != owner)
            .unwrap()
    }

    #[test]
    fn generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let code = generate_room_code(&mut rng);
            assert!(validate_room_code(&code).is_ok(), "{code}");
        }
    }

    #[tokio::test]
    async fn create_room_stores_defaults() {
        let state = memory_state().await;
        let created = create_room(&state, "h", CreateRoomRequest::default())
            .await
            .unwrap();
        assert_eq!(created.host_id, "h");

        let snapshot = snapshot(&state, &created.code.to_lowercase()).await;
        assert_eq!(snapshot.room.phase, RoomPhase::Lobby);
        assert_eq!(snapshot.room.total_rounds, 1);
        assert_eq!(snapshot.room.round_number, 0);
        assert!(snapshot.room.banger_enabled);
        assert!(snapshot.room.created_at.is_some());
        assert!(snapshot.players.is_empty());
    }

    #[tokio::test]
    async fn profile_save_creates_then_updates() {
        let state = memory_state().await;
        let code = room_with_players(&state, &["h", "a"], false).await;

        let snap = snapshot(&state, &code).await;
        let host = snap.player("h").unwrap();
        assert!(host.is_host);
        let first_color = host.color.clone();
        let other = snap.player("a").unwrap();
        assert!(!other.is_host);
        assert_ne!(other.color, first_color);
        assert!(other.joined_at.is_some());

        let updated = save_profile(
            &state,
            &code,
            "a",
            ProfileRequest {
                name: "  Renamed ".into(),
                color: Some(first_color.to_lowercase()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.color, first_color);

        let err = save_profile(
            &state,
            &code,
            "a",
            ProfileRequest {
                name: "Renamed".into(),
                color: Some("#000000".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let state = memory_state().await;
        let err = start_game(&state, "ABC234", "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = start_game(&state, "nope", "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn non_host_commands_are_ignored() {
        let state = memory_state().await;
        let code = room_with_players(&state, &["h", "a"], false).await;

        let response = start_game(&state, &code, "a").await.unwrap();
        assert!(!response.applied);
        assert_eq!(response.phase, RoomPhase::Lobby);
        assert_eq!(snapshot(&state, &code).await.room.phase, RoomPhase::Lobby);

        let response = update_settings(
            &state,
            &code,
            "a",
            SettingsRequest {
                total_rounds: Some(5),
                banger_enabled: None,
            },
        )
        .await
        .unwrap();
        assert!(!response.applied);
        assert_eq!(snapshot(&state, &code).await.room.total_rounds, 1);
    }

    #[tokio::test]
    async fn settings_only_change_in_lobby() {
        let state = memory_state().await;
        let code = room_with_players(&state, &["h", "a"], false).await;

        update_settings(
            &state,
            &code,
            "h",
            SettingsRequest {
                total_rounds: Some(40),
                banger_enabled: Some(true),
            },
        )
        .await
        .unwrap();
        let room = snapshot(&state, &code).await.room;
        assert_eq!(room.total_rounds, 10);
        assert!(room.banger_enabled);

        start_game(&state, &code, "h").await.unwrap();
        let err = update_settings(&state, &code, "h", SettingsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn late_join_blocks_round_start() {
        let state = memory_state().await;
        let code = room_with_players(&state, &["h", "a"], false).await;
        start_game(&state, &code, "h").await.unwrap();
        submit_all(&state, &code, &["h", "a"]).await;

        let view = RoomView::project(&snapshot(&state, &code).await, Some("h"));
        assert!(view.progress.everyone_submitted);

        join(&state, &code, "late").await;
        let view = RoomView::project(&snapshot(&state, &code).await, Some("h"));
        assert!(!view.progress.everyone_submitted);

        let err = start_round(&state, &code, "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(snapshot(&state, &code).await.room.phase, RoomPhase::Collect);
    }

    #[tokio::test]
    async fn full_round_without_banger_scores_once() {
        let state = memory_state().await;
        let ids = ["h", "a", "b", "c"];
        let code = room_with_players(&state, &ids, false).await;

        assert!(start_game(&state, &code, "h").await.unwrap().applied);
        submit_all(&state, &code, &ids).await;
        let response = start_round(&state, &code, "h").await.unwrap();
        assert_eq!(response.phase, RoomPhase::Guessing);

        let order = snapshot(&state, &code).await.room.song_order;
        assert_eq!(order.len(), 4);
        let first_owner = order[0].clone();
        let voters: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| *id != first_owner)
            .collect();

        // two of three guess the first song correctly
        vote(&state, &code, voters[0], &first_owner).await;
        let err = reveal_song(&state, &code, "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        vote(&state, &code, voters[1], &first_owner).await;
        vote(&state, &code, voters[2], voters[0]).await;
        assert_eq!(
            reveal_song(&state, &code, "h").await.unwrap().phase,
            RoomPhase::Reveal
        );

        // nobody identifies the remaining songs
        for owner in &order[1..] {
            let response = continue_round(&state, &code, "h").await.unwrap();
            assert_eq!(response.phase, RoomPhase::Guessing);
            for voter in ids.iter().copied().filter(|id| id != owner) {
                vote(&state, &code, voter, wrong_guess(&ids, voter, owner)).await;
            }
            reveal_song(&state, &code, "h").await.unwrap();
        }

        let response = continue_round(&state, &code, "h").await.unwrap();
        assert_eq!(response.phase, RoomPhase::RoundReveal);

        let expected: BTreeMap<String, i64> = ids
            .iter()
            .map(|id| {
                let points = if *id == first_owner || *id == voters[0] || *id == voters[1] {
                    10
                } else {
                    0
                };
                (id.to_string(), points)
            })
            .collect();
        assert_eq!(scores(&snapshot(&state, &code).await), expected);

        // the guard refuses a second scoring pass
        let err = continue_round(&state, &code, "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let err = finalize_banger(&state, &code, "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        assert_eq!(
            next_round(&state, &code, "h").await.unwrap().phase,
            RoomPhase::Finished
        );
        assert_eq!(scores(&snapshot(&state, &code).await), expected);
    }

    #[tokio::test]
    async fn banger_round_awards_unique_winner() {
        let state = memory_state().await;
        let ids = ["h", "a", "b"];
        let code = room_with_players(&state, &ids, true).await;
        start_game(&state, &code, "h").await.unwrap();
        submit_all(&state, &code, &ids).await;
        start_round(&state, &code, "h").await.unwrap();
        let order = snapshot(&state, &code).await.room.song_order;

        for (index, owner) in order.iter().enumerate() {
            if index > 0 {
                continue_round(&state, &code, "h").await.unwrap();
            }
            for voter in ids.iter().copied().filter(|id| id != owner) {
                vote(&state, &code, voter, wrong_guess(&ids, voter, owner)).await;
            }
            reveal_song(&state, &code, "h").await.unwrap();
        }
        assert_eq!(
            continue_round(&state, &code, "h").await.unwrap().phase,
            RoomPhase::Banger
        );

        // both non-owners of the first song pick it
        let winner = order[0].clone();
        let fans: Vec<&str> = ids.iter().copied().filter(|id| *id != winner).collect();
        ledger_service::cast_banger_vote(
            &state,
            &code,
            fans[0],
            BangerVoteRequest { song_index: 0 },
        )
        .await
        .unwrap();
        let err = finalize_banger(&state, &code, "h").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        ledger_service::cast_banger_vote(
            &state,
            &code,
            fans[1],
            BangerVoteRequest { song_index: 0 },
        )
        .await
        .unwrap();
        let own_song = order.iter().position(|id| *id != winner).unwrap();
        ledger_service::cast_banger_vote(
            &state,
            &code,
            &winner,
            BangerVoteRequest {
                song_index: own_song,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            finalize_banger(&state, &code, "h").await.unwrap().phase,
            RoomPhase::RoundReveal
        );
        let scores = scores(&snapshot(&state, &code).await);
        assert_eq!(scores[&winner], 5);
        assert_eq!(scores.values().sum::<i64>(), 5);
    }

    #[tokio::test]
    async fn restart_zeroes_scores_and_discards_rounds() {
        let state = memory_state().await;
        let ids = ["h", "a"];
        let code = room_with_players(&state, &ids, false).await;
        start_game(&state, &code, "h").await.unwrap();
        submit_all(&state, &code, &ids).await;
        start_round(&state, &code, "h").await.unwrap();
        let order = snapshot(&state, &code).await.room.song_order;

        for (index, owner) in order.iter().enumerate() {
            if index > 0 {
                continue_round(&state, &code, "h").await.unwrap();
            }
            let voter = ids.iter().copied().find(|id| id != owner).unwrap();
            vote(&state, &code, voter, owner).await;
            reveal_song(&state, &code, "h").await.unwrap();
        }
        continue_round(&state, &code, "h").await.unwrap();
        assert!(scores(&snapshot(&state, &code).await).values().all(|s| *s == 15));

        let response = restart(&state, &code, "h").await.unwrap();
        assert_eq!(response.phase, RoomPhase::Lobby);

        let snap = snapshot(&state, &code).await;
        assert_eq!(snap.room.round_number, 0);
        assert!(snap.room.song_order.is_empty());
        assert!(scores(&snap).values().all(|s| *s == 0));

        let repo = repository(&state, &code).await.unwrap();
        let ledger = repo.round_ledger(1).await.unwrap();
        assert!(ledger.submissions.is_empty());
        assert!(ledger.songs.is_empty());
        assert!(ledger.collect_started_at.is_none());

        // a fresh game starts from round 1 again
        start_game(&state, &code, "h").await.unwrap();
        assert_eq!(snapshot(&state, &code).await.room.round_number, 1);
    }
}
