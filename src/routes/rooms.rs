use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        room::{
            ActionResponse, BangerVoteRequest, BangerVoteResponse, CreateRoomRequest,
            CreateRoomResponse, PlayerSummary, ProfileRequest, SettingsRequest, SubmissionRequest,
            SubmissionResponse, VoteRequest, VoteResponse,
        },
        stats::StatsResponse,
        view::RoomView,
    },
    error::AppError,
    routes::identity::{PlayerId, Viewer},
    services::{ledger_service, room_service, view_service},
    state::SharedState,
};

/// Room lifecycle, ledger and read routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .route("/rooms/{code}/profile", put(save_profile))
        .route("/rooms/{code}/settings", put(update_settings))
        .route("/rooms/{code}/game/start", post(start_game))
        .route("/rooms/{code}/round/start", post(start_round))
        .route("/rooms/{code}/song/reveal", post(reveal_song))
        .route("/rooms/{code}/song/continue", post(continue_round))
        .route("/rooms/{code}/banger/finalize", post(finalize_banger))
        .route("/rooms/{code}/round/next", post(next_round))
        .route("/rooms/{code}/restart", post(restart))
        .route("/rooms/{code}/submission", put(submit_song))
        .route("/rooms/{code}/vote", put(cast_vote))
        .route(
            "/rooms/{code}/banger",
            put(cast_banger_vote).delete(withdraw_banger_vote),
        )
        .route("/rooms/{code}/stats", get(game_stats))
}

/// Open a new room; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    params(("x-player-id" = String, Header, description = "Caller's player id")),
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse),
        (status = 409, description = "No free room code found")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let created = room_service::create_room(&state, &player_id, payload).await?;
    Ok(Json(created))
}

/// The room as seen by the caller.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = Option<String>, Header, description = "Caller's player id")
    ),
    responses(
        (status = 200, description = "Room projection for the caller", body = RoomView),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Viewer(viewer): Viewer,
) -> Result<Json<RoomView>, AppError> {
    let view = view_service::room_view(&state, &code, viewer.as_deref()).await?;
    Ok(Json(view))
}

/// Join the room, or edit the caller's name and colour.
#[utoipa::path(
    put,
    path = "/rooms/{code}/profile",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Caller's player id")
    ),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = PlayerSummary),
        (status = 400, description = "Invalid name or colour")
    )
)]
pub async fn save_profile(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<PlayerSummary>, AppError> {
    payload.validate()?;
    let player = room_service::save_profile(&state, &code, &player_id, payload).await?;
    Ok(Json(player))
}

/// Change the round count or banger mode while in the lobby.
#[utoipa::path(
    put,
    path = "/rooms/{code}/settings",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings applied or ignored", body = ActionResponse),
        (status = 409, description = "Room is not in the lobby")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<SettingsRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = room_service::update_settings(&state, &code, &player_id, payload).await?;
    Ok(Json(response))
}

/// Host only: leave the lobby and open round 1.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/start",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Game started or command ignored", body = ActionResponse))
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::start_game(&state, &code, &player_id).await?))
}

/// Host only: freeze the song order and play the first song.
#[utoipa::path(
    post,
    path = "/rooms/{code}/round/start",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 200, description = "Round started or command ignored", body = ActionResponse),
        (status = 409, description = "Not every player submitted a song")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::start_round(&state, &code, &player_id).await?))
}

/// Host only: soft-reveal the current song once every vote is in.
#[utoipa::path(
    post,
    path = "/rooms/{code}/song/reveal",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 200, description = "Song revealed or command ignored", body = ActionResponse),
        (status = 409, description = "Votes are still missing")
    )
)]
pub async fn reveal_song(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::reveal_song(&state, &code, &player_id).await?))
}

/// Host only: next song, banger vote or round reveal.
#[utoipa::path(
    post,
    path = "/rooms/{code}/song/continue",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Moved past the revealed song", body = ActionResponse))
)]
pub async fn continue_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::continue_round(&state, &code, &player_id).await?))
}

/// Host only: close the banger vote and reveal the round.
#[utoipa::path(
    post,
    path = "/rooms/{code}/banger/finalize",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses(
        (status = 200, description = "Round scored or command ignored", body = ActionResponse),
        (status = 409, description = "Banger votes are still missing")
    )
)]
pub async fn finalize_banger(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::finalize_banger(&state, &code, &player_id).await?))
}

/// Host only: open the next round, or finish after the last one.
#[utoipa::path(
    post,
    path = "/rooms/{code}/round/next",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Next round opened or game finished", body = ActionResponse))
)]
pub async fn next_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::next_round(&state, &code, &player_id).await?))
}

/// Host only: zero the scores and return to the lobby.
#[utoipa::path(
    post,
    path = "/rooms/{code}/restart",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Host player id")
    ),
    responses((status = 200, description = "Room back in the lobby", body = ActionResponse))
)]
pub async fn restart(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(room_service::restart(&state, &code, &player_id).await?))
}

/// Submit or replace the caller's song for the current round.
#[utoipa::path(
    put,
    path = "/rooms/{code}/submission",
    tag = "ledger",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Caller's player id")
    ),
    request_body = SubmissionRequest,
    responses(
        (status = 200, description = "Song submitted", body = SubmissionResponse),
        (status = 400, description = "Malformed or duplicate link")
    )
)]
pub async fn submit_song(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<SubmissionRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    payload.validate()?;
    let response = ledger_service::submit_song(&state, &code, &player_id, payload).await?;
    Ok(Json(response))
}

/// Guess the owner of the song playing; a later vote replaces it.
#[utoipa::path(
    put,
    path = "/rooms/{code}/vote",
    tag = "ledger",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Caller's player id")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Guess recorded", body = VoteResponse),
        (status = 400, description = "Owner or self-targeted guess")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    payload.validate()?;
    let response = ledger_service::cast_vote(&state, &code, &player_id, payload).await?;
    Ok(Json(response))
}

/// Give the round's banger vote to a song.
#[utoipa::path(
    put,
    path = "/rooms/{code}/banger",
    tag = "ledger",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Caller's player id")
    ),
    request_body = BangerVoteRequest,
    responses(
        (status = 200, description = "Banger vote recorded", body = BangerVoteResponse),
        (status = 400, description = "Own song or song not playable yet")
    )
)]
pub async fn cast_banger_vote(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
    Json(payload): Json<BangerVoteRequest>,
) -> Result<Json<BangerVoteResponse>, AppError> {
    let response = ledger_service::cast_banger_vote(&state, &code, &player_id, payload).await?;
    Ok(Json(response))
}

/// Take back the caller's banger vote.
#[utoipa::path(
    delete,
    path = "/rooms/{code}/banger",
    tag = "ledger",
    params(
        ("code" = String, Path, description = "Room code"),
        ("x-player-id" = String, Header, description = "Caller's player id")
    ),
    responses((status = 200, description = "Banger vote withdrawn", body = BangerVoteResponse))
)]
pub async fn withdraw_banger_vote(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    PlayerId(player_id): PlayerId,
) -> Result<Json<BangerVoteResponse>, AppError> {
    let response = ledger_service::withdraw_banger_vote(&state, &code, &player_id).await?;
    Ok(Json(response))
}

/// Statistics over the rounds whose owners are disclosed.
#[utoipa::path(
    get,
    path = "/rooms/{code}/stats",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Statistics of the rounds whose owners are revealed", body = StatsResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn game_stats(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(view_service::game_stats(&state, &code).await?))
}
