//! In-process application
//!
//! Builds the real router over a [`MemoryStore`] the test keeps a handle to,
//! so faults can be injected and positions inspected directly.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use boardsync::backend::board::PolicyKind;
use boardsync::backend::locks::MemoryLeaseStore;
use boardsync::backend::routes::create_router;
use boardsync::backend::server::{build_state, AppState, Persistence, ServerConfig};
use boardsync::backend::store::MemoryStore;
use boardsync::shared::event::ServerEvent;
use boardsync::shared::model::NewCard;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
}

/// A board with its default columns and some cards
#[derive(Debug, Clone)]
pub struct Seeded {
    pub board_id: Uuid,
    pub owner: Uuid,
    pub columns: Vec<Uuid>,
    /// Card ids per column, in position order
    pub cards: Vec<Vec<Uuid>>,
}

impl TestApp {
    /// Any authenticated user may open any board
    pub fn new() -> Self {
        Self::with_config(ServerConfig {
            access_policy: PolicyKind::Any,
            ..ServerConfig::default()
        })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = MemoryStore::new();
        let persistence = Persistence {
            store: Arc::new(store.clone()),
            leases: Arc::new(MemoryLeaseStore::new()),
        };
        let state = build_state(config, persistence);
        let router = create_router(state.clone());
        Self {
            router,
            state,
            store,
        }
    }

    pub fn token(&self, user_id: Uuid) -> String {
        self.state
            .jwt
            .create_token(user_id, Some(format!("user-{}", &user_id.to_string()[..8])), None)
            .expect("token")
    }

    /// Send one request through the router and decode the JSON body
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("json"))),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Board owned by `owner` with `counts[i]` cards in default column `i`
    pub async fn seed(&self, owner: Uuid, counts: &[usize]) -> Seeded {
        let boards = &self.state.boards;
        let snapshot = boards
            .create_board(
                owner,
                boardsync::shared::model::NewBoard {
                    title: "Sprint".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("board");
        let columns: Vec<Uuid> = snapshot.columns.iter().map(|c| c.column.id).collect();

        let mut cards = Vec::new();
        for (index, count) in counts.iter().enumerate() {
            let mut ids = Vec::new();
            for n in 0..*count {
                let card = boards
                    .create_card(owner, NewCard::new(format!("card {}.{}", index, n), columns[index]))
                    .await
                    .expect("card");
                ids.push(card.id);
            }
            cards.push(ids);
        }

        Seeded {
            board_id: snapshot.board.id,
            owner,
            columns,
            cards,
        }
    }

    /// Card ids of a column in position order, read straight from the store
    pub async fn order(&self, column_id: Uuid) -> Vec<Uuid> {
        self.store
            .positions(column_id)
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub async fn positions(&self, column_id: Uuid) -> Vec<i32> {
        self.store
            .positions(column_id)
            .await
            .into_iter()
            .map(|(_, position)| position)
            .collect()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

pub fn move_body(card_id: Uuid, target_column_id: Uuid, position: i64) -> Value {
    serde_json::json!({
        "cardId": card_id,
        "targetColumnId": target_column_id,
        "newPosition": position,
    })
}

/// Every event already queued on a connection
pub fn drain(receiver: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn names(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
