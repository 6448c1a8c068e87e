//! Realtime Service
//!
//! Connection lifecycle, room membership and presence notices. The hub moves
//! events; this service decides which events a membership change produces:
//!
//! - join: `board_users` to the joining connection, `user_joined` to the rest
//!   of the room when this is the user's first connection in it
//! - leave, disconnect, sweep: `user_left` and a fresh `board_users` to the
//!   remaining members once the user's last connection is gone
//! - typing: `user_typing` to everyone but the typist

use super::hub::{ConnectionInfo, RoomHub};
use super::presence::{Departure, PresenceStore};
use crate::backend::board::{BoardError, BoardService};
use crate::backend::store::StoreError;
use crate::shared::event::{PresenceEvent, PresenceUser, ServerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Unknown connection")]
    UnknownConnection { connection_id: Uuid },

    #[error("Connection has not joined board {board_id}")]
    NotInRoom { board_id: Uuid },

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("presence store failure: {0}")]
    Presence(#[from] StoreError),
}

/// Expiry windows for presence and typing indicators
#[derive(Debug, Clone, Copy)]
pub struct PresenceSettings {
    pub presence_ttl: Duration,
    pub typing_ttl: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            presence_ttl: Duration::from_secs(3600),
            typing_ttl: Duration::from_secs(30),
        }
    }
}

/// Body of the join and leave commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub board_id: Uuid,
}

/// Body of the typing command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub board_id: Uuid,
    #[serde(default)]
    pub card_id: Option<Uuid>,
    pub is_typing: bool,
}

/// What a sweep removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub connections: usize,
    pub departures: usize,
    pub typing: usize,
}

#[derive(Clone)]
pub struct RealtimeService {
    hub: RoomHub,
    presence: Arc<dyn PresenceStore>,
    boards: BoardService,
    settings: PresenceSettings,
}

impl RealtimeService {
    pub fn new(
        hub: RoomHub,
        presence: Arc<dyn PresenceStore>,
        boards: BoardService,
        settings: PresenceSettings,
    ) -> Self {
        Self {
            hub,
            presence,
            boards,
            settings,
        }
    }

    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    pub async fn connect(
        &self,
        user_id: Uuid,
        username: Option<String>,
    ) -> (ConnectionInfo, mpsc::Receiver<ServerEvent>) {
        self.hub.register(user_id, username).await
    }

    /// Tear down a connection and emit leave notices for every room it held
    pub async fn disconnect(&self, connection_id: Uuid) {
        self.hub.unregister(connection_id).await;
        let records = match self.presence.records_of(connection_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    "[Presence] Failed to load records of {}: {:?}",
                    connection_id,
                    e
                );
                return;
            }
        };
        for record in records {
            match self
                .presence
                .leave(record.board_id, record.user_id, connection_id)
                .await
            {
                Ok(Some(departure)) => self.announce_departure(departure).await,
                Ok(None) => {}
                Err(e) => tracing::error!("[Presence] Failed to leave {:?}: {:?}", record, e),
            }
        }
        tracing::info!("[Realtime] Connection {} closed", connection_id);
    }

    /// The connection, provided it exists and belongs to `user_id`
    async fn owned_connection(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> Result<ConnectionInfo, RealtimeError> {
        self.hub
            .connection(connection_id)
            .await
            .filter(|info| info.user_id == user_id)
            .ok_or(RealtimeError::UnknownConnection { connection_id })
    }

    /// Join a board room. Returns the roster sent to the joining connection.
    pub async fn join(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<Vec<PresenceUser>, RealtimeError> {
        let connection = self.owned_connection(connection_id, user_id).await?;
        self.boards.authorize_view(user_id, board_id).await?;

        self.hub.join_room(board_id, connection_id).await;
        let joined = self
            .presence
            .join(
                board_id,
                user_id,
                connection.username.clone(),
                connection_id,
                self.settings.presence_ttl,
            )
            .await?;
        let users = self.presence.roster(board_id).await?;

        self.hub
            .emit_to_connection(
                connection_id,
                PresenceEvent::BoardUsers {
                    board_id,
                    users: users.clone(),
                }
                .into(),
            )
            .await;
        if joined.first_connection {
            self.hub
                .emit_to_room_except(
                    board_id,
                    Some(connection_id),
                    PresenceEvent::UserJoined {
                        board_id,
                        user: joined.user,
                    }
                    .into(),
                )
                .await;
        }
        tracing::info!(
            "[Presence] {} joined board {} ({} present)",
            user_id,
            board_id,
            users.len()
        );
        Ok(users)
    }

    pub async fn leave(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        board_id: Uuid,
    ) -> Result<(), RealtimeError> {
        self.owned_connection(connection_id, user_id).await?;
        if !self.hub.leave_room(board_id, connection_id).await {
            return Err(RealtimeError::NotInRoom { board_id });
        }
        if let Some(departure) = self.presence.leave(board_id, user_id, connection_id).await? {
            self.announce_departure(departure).await;
        }
        Ok(())
    }

    async fn announce_departure(&self, departure: Departure) {
        let Departure { board_id, user_id } = departure;
        tracing::info!("[Presence] {} left board {}", user_id, board_id);
        self.hub
            .emit_to_room(board_id, PresenceEvent::UserLeft { board_id, user_id }.into())
            .await;
        match self.presence.roster(board_id).await {
            Ok(users) => {
                self.hub
                    .emit_to_room(board_id, PresenceEvent::BoardUsers { board_id, users }.into())
                    .await;
            }
            Err(e) => tracing::error!("[Presence] Failed to load roster of {}: {:?}", board_id, e),
        }
    }

    pub async fn typing(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        request: TypingRequest,
    ) -> Result<(), RealtimeError> {
        self.owned_connection(connection_id, user_id).await?;
        let TypingRequest {
            board_id,
            card_id,
            is_typing,
        } = request;
        if !self.hub.is_member(board_id, connection_id).await {
            return Err(RealtimeError::NotInRoom { board_id });
        }
        if is_typing {
            self.presence
                .set_typing(board_id, user_id, card_id, self.settings.typing_ttl)
                .await?;
        } else {
            self.presence.clear_typing(board_id, user_id).await?;
        }
        self.hub
            .emit_to_room_except(
                board_id,
                Some(connection_id),
                PresenceEvent::UserTyping {
                    board_id,
                    user_id,
                    card_id,
                    is_typing,
                }
                .into(),
            )
            .await;
        Ok(())
    }

    /// Heartbeat: refresh presence expiry and answer with `pong`
    pub async fn ping(&self, connection_id: Uuid, user_id: Uuid) -> Result<(), RealtimeError> {
        self.owned_connection(connection_id, user_id).await?;
        let refreshed = self
            .presence
            .refresh(connection_id, self.settings.presence_ttl)
            .await?;
        tracing::debug!(
            "[Presence] Heartbeat from {} refreshed {} record(s)",
            connection_id,
            refreshed
        );
        self.hub
            .emit_to_connection(connection_id, ServerEvent::pong())
            .await;
        Ok(())
    }

    /// Remove unreachable connections, expired presence and stale typing
    /// indicators, emitting the notices each removal calls for
    pub async fn sweep(&self) -> Result<SweepReport, RealtimeError> {
        let closed = self.hub.closed_connections().await;
        for connection_id in &closed {
            self.hub.unregister(*connection_id).await;
        }

        let live = self.hub.live_connections().await;
        let departures = self.presence.sweep(&live).await?;
        for departure in &departures {
            self.announce_departure(*departure).await;
        }

        let stale = self.presence.expire_typing().await?;
        for typing in &stale {
            self.hub
                .emit_to_room(
                    typing.board_id,
                    PresenceEvent::UserTyping {
                        board_id: typing.board_id,
                        user_id: typing.user_id,
                        card_id: typing.card_id,
                        is_typing: false,
                    }
                    .into(),
                )
                .await;
        }

        let report = SweepReport {
            connections: closed.len(),
            departures: departures.len(),
            typing: stale.len(),
        };
        if report != SweepReport::default() {
            tracing::info!("[Presence] Sweep removed {:?}", report);
        }
        Ok(report)
    }

    /// Run [`Self::sweep`] and lease purging every `interval`
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = service.sweep().await {
                    tracing::error!("[Presence] Sweep failed: {:?}", e);
                }
                match service.boards.locks().purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!("[Lock] Purged {} expired lease(s)", purged),
                    Err(e) => tracing::error!("[Lock] Failed to purge expired leases: {:?}", e),
                }
            }
        })
    }
}
