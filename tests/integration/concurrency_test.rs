//! Lease contention and concurrent moves

use crate::common::{assert_failure, move_body, TestApp};
use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use boardsync::backend::board::{BoardError, PolicyKind};
use boardsync::backend::server::ServerConfig;
use boardsync::backend::store::BoardStore;
use boardsync::shared::model::MoveCardRequest;
use futures_util::future::join_all;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_held_lease_rejects_move_as_retriable() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2, 0]).await;
    let card = seeded.cards[0][0];
    let before = app.order(seeded.columns[0]).await;

    let lease = app
        .state
        .boards
        .locks()
        .acquire(card, Uuid::new_v4())
        .await
        .expect("lease");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(card, seeded.columns[1], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_failure(&body, "CONTENDED");
    assert_eq!(body["retriable"], true);
    assert_eq!(app.order(seeded.columns[0]).await, before);

    app.state.boards.locks().release(lease).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(card, seeded.columns[1], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.order(seeded.columns[1]).await, vec![card]);
}

#[tokio::test]
async fn test_held_lease_blocks_edit_and_delete() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3]).await;
    let column = seeded.columns[0];
    let card = seeded.cards[0][1];
    let path = format!("/api/cards/{}", card);

    let lease = app
        .state
        .boards
        .locks()
        .acquire(card, Uuid::new_v4())
        .await
        .expect("lease");

    let (status, body) = app
        .send(Method::PUT, &path, Some(seeded.owner), Some(json!({ "title": "Edited" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_failure(&body, "CONTENDED");
    assert_eq!(body["retriable"], true);

    let (status, body) = app.send(Method::DELETE, &path, Some(seeded.owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_failure(&body, "CONTENDED");

    let stored = app.store.card(card).await.unwrap().expect("card still live");
    assert_ne!(stored.title, "Edited");
    assert_eq!(stored.version, 1);
    assert_eq!(app.order(column).await, seeded.cards[0]);
    assert_eq!(app.positions(column).await, vec![0, 1, 2]);

    app.state.boards.locks().release(lease).await;

    let (status, body) = app
        .send(Method::PUT, &path, Some(seeded.owner), Some(json!({ "title": "Edited" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["card"]["title"], "Edited");
}

#[tokio::test]
async fn test_expired_lease_is_taken_over() {
    let app = TestApp::with_config(ServerConfig {
        access_policy: PolicyKind::Any,
        lock_ttl_ms: 20,
        ..ServerConfig::default()
    });
    let seeded = app.seed(Uuid::new_v4(), &[1, 0]).await;
    let card = seeded.cards[0][0];

    // Abandoned lease: never released
    let _stale = app
        .state
        .boards
        .locks()
        .acquire(card, Uuid::new_v4())
        .await
        .expect("lease");
    tokio::time::sleep(Duration::from_millis(60)).await;

    let report = app
        .state
        .boards
        .move_card(seeded.owner, MoveCardRequest::new(card, seeded.columns[1], 0))
        .await
        .expect("move after expiry");
    assert!(report.changed);
    assert_eq!(report.card.column_id, seeded.columns[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_moves_of_one_card_stay_dense() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[4, 3, 0]).await;
    let card = seeded.cards[0][0];

    let moves = (0..12).map(|n| {
        let boards = app.state.boards.clone();
        let target = seeded.columns[n % 3];
        let user = Uuid::new_v4();
        tokio::spawn(async move {
            boards
                .move_card(user, MoveCardRequest::new(card, target, (n % 4) as i64))
                .await
        })
    });
    let results: Vec<_> = join_all(moves)
        .await
        .into_iter()
        .map(|joined| joined.expect("task"))
        .collect();

    let mut succeeded = 0;
    for result in &results {
        match result {
            Ok(_) => succeeded += 1,
            Err(e) => assert_matches!(e, BoardError::Contended { .. }),
        }
    }
    assert!(succeeded >= 1);

    let mut total = 0;
    for column in &seeded.columns {
        let positions = app.positions(*column).await;
        total += positions.len();
        crate::assert_dense!(positions);
    }
    assert_eq!(total, 7);
    assert_eq!(app.state.boards.locks().purge_expired().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_of_different_cards_all_apply() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[6, 0]).await;
    let (a, b) = (seeded.columns[0], seeded.columns[1]);

    let moves = seeded.cards[0].iter().enumerate().map(|(n, card)| {
        let boards = app.state.boards.clone();
        let card = *card;
        let owner = seeded.owner;
        let target = if n % 2 == 0 { b } else { a };
        tokio::spawn(async move {
            boards
                .move_card(owner, MoveCardRequest::new(card, target, 0))
                .await
        })
    });
    for joined in join_all(moves).await {
        joined.expect("task").expect("move of a distinct card");
    }

    let mut in_a = app.order(a).await;
    let mut in_b = app.order(b).await;
    assert_eq!(in_a.len(), 3);
    assert_eq!(in_b.len(), 3);
    crate::assert_dense!(app.positions(a).await);
    crate::assert_dense!(app.positions(b).await);

    in_a.append(&mut in_b);
    in_a.sort();
    let mut expected = seeded.cards[0].clone();
    expected.sort();
    assert_eq!(in_a, expected);
}
