//! Persistence failures during moves

use crate::common::{assert_failure, drain, move_body, names, TestApp};
use axum::http::{Method, StatusCode};
use uuid::Uuid;

#[tokio::test]
async fn test_failed_commit_leaves_positions_untouched() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3, 2]).await;
    let (a, b) = (seeded.columns[0], seeded.columns[1]);
    let before_a = app.order(a).await;
    let before_b = app.order(b).await;

    let (connection, mut events) = app.state.realtime.connect(seeded.owner, None).await;
    app.state
        .realtime
        .join(connection.connection_id, seeded.owner, seeded.board_id)
        .await
        .expect("join");
    drain(&mut events);

    app.store.fail_next_commits(1);
    let mover = seeded.cards[0][1];
    let (status, body) = app
        .send(Method::POST, "/api/cards/move", Some(seeded.owner), Some(move_body(mover, b, 0)))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_failure(&body, "PERSISTENCE_FAILURE");
    assert_eq!(body["error"], "Failed to save changes");

    assert_eq!(app.order(a).await, before_a);
    assert_eq!(app.order(b).await, before_b);
    assert_eq!(app.positions(a).await, vec![0, 1, 2]);
    assert!(drain(&mut events).is_empty(), "a failed move must not be broadcast");

    // The lease was released, so an immediate retry goes through
    let (status, _) = app
        .send(Method::POST, "/api/cards/move", Some(seeded.owner), Some(move_body(mover, b, 0)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.order(b).await[0], mover);
    assert_eq!(names(&drain(&mut events)), vec!["card_moved"]);
}

#[tokio::test]
async fn test_failed_card_create_keeps_column_dense() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2]).await;
    let column = seeded.columns[0];

    app.store.fail_next_commits(1);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards",
            Some(seeded.owner),
            Some(serde_json::json!({ "title": "lost", "columnId": column })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_failure(&body, "PERSISTENCE_FAILURE");
    assert_eq!(app.positions(column).await, vec![0, 1]);
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_the_move() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2]).await;
    let column = seeded.columns[0];
    let [first, second] = [seeded.cards[0][0], seeded.cards[0][1]];

    app.store.fail_audit(true);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(first, column, 1)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.order(column).await, vec![second, first]);

    app.store.fail_audit(false);
    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/boards/{}/audit", seeded.board_id),
            Some(seeded.owner),
            None,
        )
        .await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["action"] != "CARD_MOVED"));
}

#[tokio::test]
async fn test_storage_error_during_lookup_is_not_reported_as_missing() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2, 1]).await;
    let (a, b) = (seeded.columns[0], seeded.columns[1]);
    let card = seeded.cards[0][0];

    app.store.fail_board_reads(true);
    let (status, body) = app
        .send(Method::POST, "/api/cards/move", Some(seeded.owner), Some(move_body(card, b, 0)))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_failure(&body, "PERSISTENCE_FAILURE");
    assert_ne!(body["retriable"], true);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/cards/{}", card),
            Some(seeded.owner),
            Some(serde_json::json!({ "title": "Edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_failure(&body, "PERSISTENCE_FAILURE");

    app.store.fail_board_reads(false);
    assert_eq!(app.order(a).await, seeded.cards[0]);
    assert_eq!(app.positions(b).await, vec![0]);
}
