use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::auth::Session;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingEvent, Role};
use crate::state::AppState;

/// Most events replayed to one reconnecting client; older ones are skipped.
const REPLAY_LIMIT: i64 = 200;

// GET /api/events: SSE stream of booking changes the caller is party to
#[derive(Deserialize)]
pub struct EventsQuery {
    pub last_id: Option<i64>,
}

fn to_sse(event: &BookingEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default()
        .id(event.id.to_string())
        .event("booking_event")
        .data(data)
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before the catch-up read so nothing committed in between is lost.
    let rx = state.events_tx.subscribe();

    let catchup_events: Vec<BookingEvent> = match query.last_id {
        Some(last_id) => {
            let viewer = (session.role != Role::Admin).then_some(session.user_id.as_str());
            let db = state.db()?;
            queries::get_events_since(&db, last_id, viewer, REPLAY_LIMIT)?
        }
        None => vec![],
    };
    let mut high_water = catchup_events
        .last()
        .map(|e| e.id)
        .or(query.last_id)
        .unwrap_or(0);

    let catchup_stream =
        tokio_stream::iter(catchup_events.into_iter().map(|e| Ok::<_, Infallible>(to_sse(&e))));

    let user_id = session.user_id.clone();
    let role = session.role;
    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.id > high_water && event.visible_to(&user_id, role) => {
            high_water = event.id;
            Some(Ok(to_sse(&event)))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "event subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
