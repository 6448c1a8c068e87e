//! Presence Store
//!
//! One record per (board, user). A record remembers every connection that
//! joined the room on the user's behalf and disappears when the last of them
//! leaves, or when its expiry passes without a heartbeat.
//!
//! Typing indicators live next to presence with their own, shorter expiry.

use crate::backend::store::StoreError;
use crate::shared::event::PresenceUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Result of adding a connection to a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub user: PresenceUser,
    /// True when this connection created the record
    pub first_connection: bool,
}

/// A user that is no longer present in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Departure {
    pub board_id: Uuid,
    pub user_id: Uuid,
}

/// A typing indicator that ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTyping {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub card_id: Option<Uuid>,
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn join(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        username: Option<String>,
        connection_id: Uuid,
        ttl: Duration,
    ) -> Result<Joined, StoreError>;

    /// Remove one connection from a record. Returns the departure when it was
    /// the record's last connection.
    async fn leave(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<Departure>, StoreError>;

    /// Push back the expiry of every record held by `connection_id`
    async fn refresh(&self, connection_id: Uuid, ttl: Duration) -> Result<usize, StoreError>;

    /// Present, non-expired users of a board ordered by join time
    async fn roster(&self, board_id: Uuid) -> Result<Vec<PresenceUser>, StoreError>;

    /// Every (board, user) record that `connection_id` holds
    async fn records_of(&self, connection_id: Uuid) -> Result<Vec<Departure>, StoreError>;

    /// Drop connections missing from `live` and records that expired.
    /// Returns the users that are no longer present anywhere they were.
    async fn sweep(&self, live: &HashSet<Uuid>) -> Result<Vec<Departure>, StoreError>;

    async fn set_typing(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        card_id: Option<Uuid>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Returns whether an indicator was cleared
    async fn clear_typing(&self, board_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn expire_typing(&self) -> Result<Vec<StaleTyping>, StoreError>;
}

#[derive(Debug, Clone)]
struct Record {
    username: Option<String>,
    joined_at: DateTime<Utc>,
    connections: HashSet<Uuid>,
    expires_at: Instant,
}

impl Record {
    fn user(&self, user_id: Uuid) -> PresenceUser {
        PresenceUser {
            user_id,
            username: self.username.clone(),
            joined_at: self.joined_at,
            connections: self.connections.len(),
        }
    }
}

#[derive(Debug, Default)]
struct PresenceState {
    records: HashMap<(Uuid, Uuid), Record>,
    typing: HashMap<(Uuid, Uuid), (Option<Uuid>, Instant)>,
}

/// In-process presence
#[derive(Debug, Default)]
pub struct MemoryPresenceStore {
    state: Mutex<PresenceState>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn join(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        username: Option<String>,
        connection_id: Uuid,
        ttl: Duration,
    ) -> Result<Joined, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .entry((board_id, user_id))
            .or_insert_with(|| Record {
                username: username.clone(),
                joined_at: Utc::now(),
                connections: HashSet::new(),
                expires_at: now + ttl,
            });
        // an expired record is replaced rather than revived
        if record.expires_at <= now {
            record.joined_at = Utc::now();
            record.connections.clear();
        }
        let first_connection = record.connections.is_empty();
        record.connections.insert(connection_id);
        record.expires_at = now + ttl;
        if username.is_some() {
            record.username = username;
        }
        Ok(Joined {
            user: record.user(user_id),
            first_connection,
        })
    }

    async fn leave(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<Departure>, StoreError> {
        let mut state = self.state.lock().await;
        let key = (board_id, user_id);
        let Some(record) = state.records.get_mut(&key) else {
            return Ok(None);
        };
        if !record.connections.remove(&connection_id) || !record.connections.is_empty() {
            return Ok(None);
        }
        state.records.remove(&key);
        state.typing.remove(&key);
        Ok(Some(Departure { board_id, user_id }))
    }

    async fn refresh(&self, connection_id: Uuid, ttl: Duration) -> Result<usize, StoreError> {
        let expires_at = Instant::now() + ttl;
        let mut state = self.state.lock().await;
        let mut refreshed = 0;
        for record in state.records.values_mut() {
            if record.connections.contains(&connection_id) {
                record.expires_at = expires_at;
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    async fn roster(&self, board_id: Uuid) -> Result<Vec<PresenceUser>, StoreError> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let mut users: Vec<PresenceUser> = state
            .records
            .iter()
            .filter(|((board, _), record)| *board == board_id && record.expires_at > now)
            .map(|((_, user_id), record)| record.user(*user_id))
            .collect();
        users.sort_by_key(|u| (u.joined_at, u.user_id));
        Ok(users)
    }

    async fn records_of(&self, connection_id: Uuid) -> Result<Vec<Departure>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .filter(|(_, record)| record.connections.contains(&connection_id))
            .map(|((board_id, user_id), _)| Departure {
                board_id: *board_id,
                user_id: *user_id,
            })
            .collect())
    }

    async fn sweep(&self, live: &HashSet<Uuid>) -> Result<Vec<Departure>, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut departed = Vec::new();
        state.records.retain(|(board_id, user_id), record| {
            record.connections.retain(|c| live.contains(c));
            let keep = !record.connections.is_empty() && record.expires_at > now;
            if !keep {
                departed.push(Departure {
                    board_id: *board_id,
                    user_id: *user_id,
                });
            }
            keep
        });
        for departure in &departed {
            state
                .typing
                .remove(&(departure.board_id, departure.user_id));
        }
        Ok(departed)
    }

    async fn set_typing(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        card_id: Option<Uuid>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        self.state
            .lock()
            .await
            .typing
            .insert((board_id, user_id), (card_id, expires_at));
        Ok(())
    }

    async fn clear_typing(&self, board_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .typing
            .remove(&(board_id, user_id))
            .is_some())
    }

    async fn expire_typing(&self) -> Result<Vec<StaleTyping>, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut stale = Vec::new();
        state.typing.retain(|(board_id, user_id), (card_id, expires_at)| {
            if *expires_at > now {
                return true;
            }
            stale.push(StaleTyping {
                board_id: *board_id,
                user_id: *user_id,
                card_id: *card_id,
            });
            false
        });
        Ok(stale)
    }
}
