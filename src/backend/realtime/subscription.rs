//! Realtime Subscription Handler
//!
//! `GET /api/realtime` opens a Server-Sent Events stream for the
//! authenticated user. The first event is always `connected`, carrying the
//! connection id the client uses for its join/leave/typing/ping commands.
//! Every later event is a board change or presence notice for a room the
//! connection joined, a `pong`, or an `error`.
//!
//! When the client goes away the stream is dropped, and with it a guard that
//! tears the connection down and announces its departures.

use super::service::RealtimeService;
use crate::backend::middleware::AuthUser;
use crate::shared::event::ServerEvent;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Disconnects its connection when dropped
struct ConnectionGuard {
    realtime: RealtimeService,
    connection_id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let realtime = self.realtime.clone();
        let connection_id = self.connection_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { realtime.disconnect(connection_id).await });
            }
            Err(_) => tracing::warn!(
                "[Realtime] No runtime to close connection {}; the sweep will reap it",
                connection_id
            ),
        }
    }
}

fn to_sse(event: &ServerEvent) -> Option<Event> {
    match event.data() {
        Ok(data) => Some(Event::default().event(event.name()).data(data)),
        Err(e) => {
            tracing::error!("[Realtime] Failed to serialize {}: {:?}", event.name(), e);
            None
        }
    }
}

/// Handle `GET /api/realtime`
pub async fn handle_realtime_connection(
    State(realtime): State<RealtimeService>,
    AuthUser(user): AuthUser,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (info, receiver) = realtime.connect(user.user_id, user.username.clone()).await;
    let guard = ConnectionGuard {
        realtime,
        connection_id: info.connection_id,
    };

    let stream = stream::unfold(
        (receiver, guard),
        |(mut receiver, guard): (mpsc::Receiver<ServerEvent>, ConnectionGuard)| async move {
            loop {
                let event = receiver.recv().await?;
                if let Some(sse) = to_sse(&event) {
                    return Some((Ok(sse), (receiver, guard)));
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
