use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the Whose Song? backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::room_events,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::save_profile,
        crate::routes::rooms::update_settings,
        crate::routes::rooms::start_game,
        crate::routes::rooms::start_round,
        crate::routes::rooms::reveal_song,
        crate::routes::rooms::continue_round,
        crate::routes::rooms::finalize_banger,
        crate::routes::rooms::next_round,
        crate::routes::rooms::restart,
        crate::routes::rooms::submit_song,
        crate::routes::rooms::cast_vote,
        crate::routes::rooms::cast_banger_vote,
        crate::routes::rooms::withdraw_banger_vote,
        crate::routes::rooms::game_stats,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::CreateRoomResponse,
            crate::dto::room::ProfileRequest,
            crate::dto::room::SettingsRequest,
            crate::dto::room::SubmissionRequest,
            crate::dto::room::VoteRequest,
            crate::dto::room::BangerVoteRequest,
            crate::dto::room::PlayerSummary,
            crate::dto::room::ActionResponse,
            crate::dto::room::SubmissionResponse,
            crate::dto::room::VoteResponse,
            crate::dto::room::BangerVoteResponse,
            crate::dto::view::RoomView,
            crate::dto::stats::StatsResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::RoomMissing,
            crate::state::state_machine::RoomPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation, profiles and read models"),
        (name = "host", description = "Host-only phase transitions"),
        (name = "ledger", description = "Submissions, guesses and banger votes"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
/// Marker type carrying the generated document.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_room_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/rooms",
            "/rooms/{code}",
            "/rooms/{code}/song/continue",
            "/rooms/{code}/banger",
            "/rooms/{code}/events",
            "/healthcheck",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
