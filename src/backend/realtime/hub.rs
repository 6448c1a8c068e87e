//! Room Hub
//!
//! Tracks live connections and which board rooms each one has joined, and
//! delivers [`ServerEvent`]s either to one connection or to every member of a
//! room. Each connection owns a bounded channel drained by its SSE stream.
//!
//! Delivery never waits. A connection whose channel is full has fallen so far
//! behind that its view can no longer be trusted: it is evicted, which ends
//! its stream, and the client reconnects and refetches the board.

use crate::shared::event::{ChangeEvent, ServerEvent};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Public data of a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Connection {
    info: ConnectionInfo,
    sender: mpsc::Sender<ServerEvent>,
}

#[derive(Debug, Default)]
struct HubInner {
    connections: RwLock<HashMap<Uuid, Connection>>,
    rooms: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    buffer: usize,
}

#[derive(Debug, Clone)]
pub struct RoomHub {
    inner: Arc<HubInner>,
}

enum Delivery {
    Sent,
    Gone,
    Lagging,
}

impl RoomHub {
    /// `buffer` is the per-connection queue length
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Register a connection. The `connected` event is already queued on the
    /// returned receiver.
    pub async fn register(
        &self,
        user_id: Uuid,
        username: Option<String>,
    ) -> (ConnectionInfo, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(self.inner.buffer);
        let info = ConnectionInfo {
            connection_id: Uuid::new_v4(),
            user_id,
            username,
            connected_at: Utc::now(),
        };
        // cannot fail: fresh channel with capacity >= 1
        let _ = sender.try_send(ServerEvent::connected(info.connection_id, user_id));
        self.inner.connections.write().await.insert(
            info.connection_id,
            Connection {
                info: info.clone(),
                sender,
            },
        );
        tracing::info!(
            "[Realtime] Connection {} opened for user {}",
            info.connection_id,
            user_id
        );
        (info, receiver)
    }

    /// Forget a connection and drop it from every room. Returns the rooms it
    /// was in.
    pub async fn unregister(&self, connection_id: Uuid) -> Vec<Uuid> {
        self.inner.connections.write().await.remove(&connection_id);
        let mut rooms = self.inner.rooms.write().await;
        let mut left = Vec::new();
        rooms.retain(|board_id, members| {
            if members.remove(&connection_id) {
                left.push(*board_id);
            }
            !members.is_empty()
        });
        left
    }

    pub async fn connection(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        self.inner
            .connections
            .read()
            .await
            .get(&connection_id)
            .map(|c| c.info.clone())
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub async fn join_room(&self, board_id: Uuid, connection_id: Uuid) -> bool {
        self.inner
            .rooms
            .write()
            .await
            .entry(board_id)
            .or_default()
            .insert(connection_id)
    }

    /// Remove a connection from a room. Returns false if it was not a member.
    pub async fn leave_room(&self, board_id: Uuid, connection_id: Uuid) -> bool {
        let mut rooms = self.inner.rooms.write().await;
        let Some(members) = rooms.get_mut(&board_id) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(&board_id);
        }
        removed
    }

    pub async fn is_member(&self, board_id: Uuid, connection_id: Uuid) -> bool {
        self.inner
            .rooms
            .read()
            .await
            .get(&board_id)
            .is_some_and(|members| members.contains(&connection_id))
    }

    pub async fn room_members(&self, board_id: Uuid) -> Vec<Uuid> {
        self.inner
            .rooms
            .read()
            .await
            .get(&board_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of connections whose stream is still being read
    pub async fn live_connections(&self) -> HashSet<Uuid> {
        self.inner
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, c)| !c.sender.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Connections whose stream has gone away without a clean disconnect
    pub async fn closed_connections(&self) -> Vec<Uuid> {
        self.inner
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, c)| c.sender.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    fn deliver(connection: &Connection, event: ServerEvent) -> Delivery {
        match connection.sender.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Closed(_)) => Delivery::Gone,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "[Realtime] Broadcast failure: connection {} is {} events behind, dropping {}",
                    connection.info.connection_id,
                    connection.sender.max_capacity(),
                    event.name()
                );
                Delivery::Lagging
            }
        }
    }

    async fn evict(&self, lagging: Vec<Uuid>) {
        if lagging.is_empty() {
            return;
        }
        let mut connections = self.inner.connections.write().await;
        for connection_id in lagging {
            if connections.remove(&connection_id).is_some() {
                tracing::warn!("[Realtime] Evicted lagging connection {}", connection_id);
            }
        }
    }

    /// Send to one connection. Returns whether the event was queued.
    pub async fn emit_to_connection(&self, connection_id: Uuid, event: ServerEvent) -> bool {
        let delivery = {
            let connections = self.inner.connections.read().await;
            match connections.get(&connection_id) {
                Some(connection) => Self::deliver(connection, event),
                None => Delivery::Gone,
            }
        };
        match delivery {
            Delivery::Sent => true,
            Delivery::Gone => {
                tracing::debug!("[Realtime] Connection {} is gone", connection_id);
                false
            }
            Delivery::Lagging => {
                self.evict(vec![connection_id]).await;
                false
            }
        }
    }

    /// Send to every member of a room. Returns the number of connections reached.
    pub async fn emit_to_room(&self, board_id: Uuid, event: ServerEvent) -> usize {
        self.emit_to_room_except(board_id, None, event).await
    }

    /// Send to every member of a room but `except`
    pub async fn emit_to_room_except(
        &self,
        board_id: Uuid,
        except: Option<Uuid>,
        event: ServerEvent,
    ) -> usize {
        let members = self.room_members(board_id).await;
        let mut delivered = 0;
        let mut lagging = Vec::new();
        {
            let connections = self.inner.connections.read().await;
            for connection_id in members {
                if Some(connection_id) == except {
                    continue;
                }
                let Some(connection) = connections.get(&connection_id) else {
                    continue;
                };
                match Self::deliver(connection, event.clone()) {
                    Delivery::Sent => delivered += 1,
                    Delivery::Gone => {}
                    Delivery::Lagging => lagging.push(connection_id),
                }
            }
        }
        self.evict(lagging).await;
        delivered
    }

    /// Fan a committed board change out to the board's room
    pub async fn emit_change(&self, event: ChangeEvent) -> usize {
        let board_id = event.board_id;
        self.emit_to_room(board_id, ServerEvent::Change(event)).await
    }
}
