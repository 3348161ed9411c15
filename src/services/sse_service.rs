use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dao::{document::DocPath, paths},
    dto::{
        sse::{
            HANDSHAKE_EVENT, Handshake, ROOM_MISSING_EVENT, ROOM_VIEW_EVENT, RoomMissing,
            ServerEvent,
        },
        view::RoomView,
    },
    error::ServiceError,
    services::room_service::{normalize_code, repository},
    state::SharedState,
};

/// What the forwarder should do after refreshing a room projection.
enum Refresh {
    Open,
    Missing,
    Closed,
}

/// Open a projection stream for `code`. The caller receives a handshake, the current view,
/// and a new view after every committed change to the room.
pub fn room_stream(
    state: SharedState,
    code: &str,
    viewer: Option<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let feed =
        room_feed(state, code, viewer)?.map(|payload| Ok::<_, Infallible>(to_event(payload)));
    Ok(Sse::new(feed).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

/// Spawn the forwarder behind [`room_stream`] and hand back its receiving side.
/// The feed ends after `room.missing` or once the receiver is dropped.
pub fn room_feed(
    state: SharedState,
    code: &str,
    viewer: Option<String>,
) -> Result<ReceiverStream<ServerEvent>, ServiceError> {
    let code = normalize_code(code)?;
    let root = paths::room(&code)?;
    // subscribe before the first read so no commit slips between the two
    let mut changes = state.subscribe_changes();

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<ServerEvent>(8);

    tokio::spawn(async move {
        let handshake = Handshake {
            room: code.clone(),
            player_id: viewer.clone(),
            degraded: state.is_degraded(),
        };
        if let Ok(event) = ServerEvent::json(Some(HANDSHAKE_EVENT.to_string()), &handshake) {
            if tx.send(event).await.is_err() {
                return;
            }
        }

        let mut outcome = refresh(&state, &code, viewer.as_deref(), &tx).await;
        while let Refresh::Open = outcome {
            outcome = tokio::select! {
                _ = tx.closed() => Refresh::Closed,
                recv_result = changes.recv() => match recv_result {
                    Ok(change) if touches(&change.root, &root) => {
                        refresh(&state, &code, viewer.as_deref(), &tx).await
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(room = %code, skipped, "SSE subscriber lagged; resending view");
                        refresh(&state, &code, viewer.as_deref(), &tx).await
                    }
                    Err(RecvError::Closed) => Refresh::Closed,
                },
            };
        }

        if let Refresh::Missing = outcome {
            if let Ok(event) = ServerEvent::json(
                Some(ROOM_MISSING_EVENT.to_string()),
                &RoomMissing { room: code.clone() },
            ) {
                let _ = tx.send(event).await;
            }
        }
        info!(room = %code, "room SSE stream disconnected");
    });

    Ok(ReceiverStream::new(rx))
}

fn touches(changed_root: &DocPath, room_root: &DocPath) -> bool {
    changed_root == room_root
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Read the room and push its projection. Store errors keep the stream open;
/// the next change retries.
async fn refresh(
    state: &SharedState,
    code: &str,
    viewer: Option<&str>,
    tx: &mpsc::Sender<ServerEvent>,
) -> Refresh {
    let snapshot = match repository(state, code).await {
        Ok(repo) => repo.snapshot().await.map_err(ServiceError::from),
        Err(err) => Err(err),
    };

    let view = match snapshot {
        Ok(Some(snapshot)) => RoomView::project(&snapshot, viewer),
        Ok(None) => return Refresh::Missing,
        Err(err) => {
            warn!(room = code, error = %err, "failed to refresh room projection");
            return Refresh::Open;
        }
    };

    match ServerEvent::json(Some(ROOM_VIEW_EVENT.to_string()), &view) {
        Ok(event) => {
            if tx.send(event).await.is_err() {
                return Refresh::Closed;
            }
            Refresh::Open
        }
        Err(err) => {
            warn!(room = code, error = %err, "failed to serialise room projection");
            Refresh::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::services::room_service::testing::*;

    const QUIET: Duration = Duration::from_millis(100);

    async fn next_event(feed: &mut ReceiverStream<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(2), feed.next())
            .await
            .expect("feed stalled")
            .expect("feed ended")
    }

    fn name(event: &ServerEvent) -> &str {
        event.event.as_deref().unwrap_or_default()
    }

    #[tokio::test]
    async fn sends_handshake_then_current_view() {
        let state = memory_state().await;
        let code = room_with_players(&state, &["h", "a"], false).await;

        let mut feed = room_feed(state.clone(), &code.to_lowercase(), Some("a".into())).unwrap();
        let handshake = next_event(&mut feed).await;
        assert_eq!(name(&handshake), HANDSHAKE_EVENT);
        assert!(handshake.data.contains(&code));
        assert!(handshake.data.contains(r#""player_id":"a""#));

        let view = next_event(&mut feed).await;
        assert_eq!(name(&view), ROOM_VIEW_EVENT);
        let view: serde_json::Value = serde_json::from_str(&view.data).unwrap();
        assert_eq!(view["code"], code.as_str());
        assert_eq!(view["scoreboard"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn only_changes_to_the_watched_room_push_a_view() {
        let state = memory_state().await;
        let watched = room_with_players(&state, &["h"], false).await;
        let other = room_with_players(&state, &["x"], false).await;

        let mut feed = room_feed(state.clone(), &watched, None).unwrap();
        next_event(&mut feed).await;
        next_event(&mut feed).await;

        join(&state, &other, "y").await;
        assert!(timeout(QUIET, feed.next()).await.is_err());

        join(&state, &watched, "a").await;
        let view = next_event(&mut feed).await;
        assert_eq!(name(&view), ROOM_VIEW_EVENT);
        let view: serde_json::Value = serde_json::from_str(&view.data).unwrap();
        assert_eq!(view["scoreboard"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_room_ends_the_feed() {
        let state = memory_state().await;

        let mut feed = room_feed(state.clone(), "ZZZ999", None).unwrap();
        assert_eq!(name(&next_event(&mut feed).await), HANDSHAKE_EVENT);
        let missing = next_event(&mut feed).await;
        assert_eq!(name(&missing), ROOM_MISSING_EVENT);
        assert!(missing.data.contains("ZZZ999"));
        assert!(timeout(QUIET, feed.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_malformed_codes() {
        let state = memory_state().await;
        assert!(matches!(
            room_feed(state, "no", None),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
