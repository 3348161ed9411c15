use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    routes::identity::{Viewer, parse_player_id},
    services::sse_service,
    state::SharedState,
};

/// `EventSource` cannot set headers, so the viewer may also be passed as a query parameter.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// Viewer the projections are computed for.
    pub player_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Room code"), StreamQuery),
    responses((status = 200, description = "Room projection stream", content_type = "text/event-stream", body = String))
)]
/// Stream a fresh room projection after every change to the room.
pub async fn room_events(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<StreamQuery>,
    Viewer(header_viewer): Viewer,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let viewer = match query.player_id.as_deref() {
        Some(raw) => Some(parse_player_id(raw)?),
        None => header_viewer,
    };
    info!(room = %code, player = ?viewer, "New room SSE connection");
    Ok(sse_service::room_stream(state, &code, viewer)?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/events", get(room_events))
}
