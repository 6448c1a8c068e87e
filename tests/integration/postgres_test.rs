//! Postgres-backed runs of the core flows
//!
//! Ignored by default. Run with a disposable database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -- --ignored
//! ```

use boardsync::backend::board::{BoardError, PolicyKind};
use boardsync::backend::server::{build_state, AppState, Persistence, ServerConfig};
use boardsync::shared::ledger::is_dense;
use boardsync::backend::store::PgStore;
use boardsync::shared::model::{CardPatch, MoveCardRequest, NewBoard, NewCard};
use std::time::Duration;
use serial_test::serial;
use uuid::Uuid;

async fn pg_state() -> AppState {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let persistence = Persistence::postgres(&url, 5)
        .await
        .expect("connect and migrate");
    build_state(
        ServerConfig {
            access_policy: PolicyKind::Any,
            ..ServerConfig::default()
        },
        persistence,
    )
}

async fn column_positions(state: &AppState, owner: Uuid, board_id: Uuid) -> Vec<Vec<(Uuid, i32)>> {
    let snapshot = state.boards.get_board(owner, board_id).await.unwrap();
    snapshot
        .columns
        .iter()
        .map(|c| c.cards.iter().map(|card| (card.id, card.position)).collect())
        .collect()
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_postgres_move_and_delete() {
    let state = pg_state().await;
    let owner = Uuid::new_v4();
    let snapshot = state
        .boards
        .create_board(
            owner,
            NewBoard {
                title: "pg".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (a, b) = (snapshot.columns[0].column.id, snapshot.columns[1].column.id);

    let mut cards = Vec::new();
    for n in 0..3 {
        let card = state
            .boards
            .create_card(owner, NewCard::new(format!("card {}", n), a))
            .await
            .unwrap();
        cards.push(card.id);
    }

    let report = state
        .boards
        .move_card(owner, MoveCardRequest::new(cards[1], b, 0))
        .await
        .unwrap();
    assert!(report.changed);
    assert_eq!(report.card.version, 2);

    let columns = column_positions(&state, owner, snapshot.board.id).await;
    assert_eq!(columns[0], vec![(cards[0], 0), (cards[2], 1)]);
    assert_eq!(columns[1], vec![(cards[1], 0)]);

    state.boards.delete_card(owner, cards[0]).await.unwrap();
    let columns = column_positions(&state, owner, snapshot.board.id).await;
    assert_eq!(columns[0], vec![(cards[2], 0)]);

    let trail = state
        .boards
        .audit_trail(owner, snapshot.board.id, Some(10))
        .await
        .unwrap();
    assert!(trail.iter().any(|e| e.action.as_str() == "CARD_MOVED"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
#[serial]
async fn test_postgres_lease_contention() {
    let state = pg_state().await;
    let owner = Uuid::new_v4();
    let snapshot = state
        .boards
        .create_board(
            owner,
            NewBoard {
                title: "pg race".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let columns: Vec<Uuid> = snapshot.columns.iter().map(|c| c.column.id).collect();
    let card = state
        .boards
        .create_card(owner, NewCard::new("contended", columns[0]))
        .await
        .unwrap();

    let lease = state.boards.locks().acquire(card.id, Uuid::new_v4()).await.unwrap();
    let denied = state
        .boards
        .move_card(owner, MoveCardRequest::new(card.id, columns[1], 0))
        .await;
    assert!(matches!(denied, Err(BoardError::Contended { .. })));
    state.boards.locks().release(lease).await;

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let boards = state.boards.clone();
            let target = columns[n % columns.len()];
            tokio::spawn(async move {
                boards
                    .move_card(owner, MoveCardRequest::new(card.id, target, 0))
                    .await
            })
        })
        .collect();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(BoardError::Contended { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    for column in column_positions(&state, owner, snapshot.board.id).await {
        assert!(is_dense(column.iter().map(|(_, p)| *p)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
#[serial]
async fn test_postgres_edit_waits_for_concurrent_renumbering() {
    let state = pg_state().await;
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let raw = PgStore::connect(&url, 2).await.expect("connect");
    let owner = Uuid::new_v4();
    let snapshot = state
        .boards
        .create_board(
            owner,
            NewBoard {
                title: "pg edit".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let column = snapshot.columns[0].column.id;
    let mut cards = Vec::new();
    for n in 0..3 {
        let card = state
            .boards
            .create_card(owner, NewCard::new(format!("card {}", n), column))
            .await
            .unwrap();
        cards.push(card.id);
    }

    // A writer outside the lease holds the edited row while it renumbers
    let mut writer = raw.pool().begin().await.unwrap();
    sqlx::query("SELECT id FROM cards WHERE id = $1 FOR UPDATE")
        .bind(cards[1])
        .execute(&mut *writer)
        .await
        .unwrap();

    let boards = state.boards.clone();
    let edited = cards[1];
    let edit = tokio::spawn(async move {
        boards
            .update_card(owner, edited, CardPatch::title("Edited"))
            .await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    sqlx::query("UPDATE cards SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(cards[0])
        .execute(&mut *writer)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE cards SET position = position - 1 \
         WHERE column_id = $1 AND deleted_at IS NULL AND position > 0",
    )
    .bind(column)
    .execute(&mut *writer)
    .await
    .unwrap();
    writer.commit().await.unwrap();

    let card = edit.await.unwrap().expect("edit");
    assert_eq!(card.title, "Edited");
    assert_eq!(card.position, 0);

    let columns = column_positions(&state, owner, snapshot.board.id).await;
    assert_eq!(columns[0], vec![(cards[1], 0), (cards[2], 1)]);
    assert!(is_dense(columns[0].iter().map(|(_, p)| *p)));
}
