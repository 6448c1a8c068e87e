//! Board, column and card API tests

use crate::common::{assert_failure, move_body, TestApp};
use axum::http::{Method, StatusCode};
use boardsync::backend::server::ServerConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/boards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_failure(&body, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::GET, "/api/nothing-here", Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_board_with_default_columns() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let (status, body) = app
        .send(Method::POST, "/api/boards", Some(user), Some(json!({ "title": "Roadmap" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let columns = body["data"]["board"]["columns"].as_array().unwrap();
    let titles: Vec<&str> = columns.iter().map(|c| c["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["To Do", "In Progress", "Done"]);
    let positions: Vec<i64> = columns.iter().map(|c| c["position"].as_i64().unwrap()).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    let (status, body) = app.send(Method::GET, "/api/boards", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["boards"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_board_requires_title() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::POST, "/api/boards", Some(Uuid::new_v4()), Some(json!({ "title": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_cards_are_appended_densely() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[0]).await;
    let column = seeded.columns[0];

    for title in ["one", "two", "three"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/cards",
                Some(seeded.owner),
                Some(json!({ "title": title, "columnId": column })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(app.positions(column).await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_cross_column_move_renumbers_both_columns() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3, 2]).await;
    let (a, b) = (seeded.columns[0], seeded.columns[1]);
    let mover = seeded.cards[0][1];

    let (status, body) = app
        .send(Method::POST, "/api/cards/move", Some(seeded.owner), Some(move_body(mover, b, 0)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["card"]["columnId"], json!(b));
    assert_eq!(body["data"]["card"]["position"], 0);
    assert_eq!(body["data"]["card"]["version"], 2);

    assert_eq!(app.order(a).await, vec![seeded.cards[0][0], seeded.cards[0][2]]);
    assert_eq!(app.positions(a).await, vec![0, 1]);
    assert_eq!(
        app.order(b).await,
        vec![mover, seeded.cards[1][0], seeded.cards[1][1]]
    );
    assert_eq!(app.positions(b).await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_same_column_move_to_end() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3]).await;
    let column = seeded.columns[0];
    let [x, y, z] = [seeded.cards[0][0], seeded.cards[0][1], seeded.cards[0][2]];

    let (status, _) = app
        .send(Method::POST, "/api/cards/move", Some(seeded.owner), Some(move_body(x, column, 2)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.order(column).await, vec![y, z, x]);
}

#[tokio::test]
async fn test_out_of_range_position_is_clamped() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2, 1]).await;
    let mover = seeded.cards[0][0];

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(mover, seeded.columns[1], 99)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["card"]["position"], 1);
    assert_eq!(app.positions(seeded.columns[1]).await, vec![0, 1]);
}

#[tokio::test]
async fn test_noop_move_changes_nothing() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3]).await;
    let column = seeded.columns[0];
    let before = app.order(column).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(seeded.cards[0][1], column, 1)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Card already at requested position");
    assert_eq!(body["data"]["card"]["version"], 1);
    assert_eq!(app.order(column).await, before);
}

#[tokio::test]
async fn test_move_errors() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[1]).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(Uuid::new_v4(), seeded.columns[0], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_failure(&body, "NOT_FOUND");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(seeded.cards[0][0], Uuid::new_v4(), 0)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_failure(&body, "NOT_FOUND");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(json!({ "cardId": seeded.cards[0][0] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");

    let other = app.seed(seeded.owner, &[0]).await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(move_body(seeded.cards[0][0], other.columns[0], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::POST, "/api/cards/move", Some(Uuid::new_v4()), Some(json!([1, 2, 3])))
        .await;
    assert!(status.is_client_error());
    assert_failure(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_owner_only_policy_hides_boards() {
    let app = TestApp::with_config(ServerConfig::default());
    let seeded = app.seed(Uuid::new_v4(), &[1]).await;
    let stranger = Uuid::new_v4();

    let path = format!("/api/boards/{}", seeded.board_id);
    let (status, body) = app.send(Method::GET, &path, Some(stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_failure(&body, "NOT_FOUND");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(stranger),
            Some(move_body(seeded.cards[0][0], seeded.columns[0], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Method::GET, &path, Some(seeded.owner), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_and_delete_card() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[3]).await;
    let column = seeded.columns[0];
    let card = seeded.cards[0][0];
    let assignee = Uuid::new_v4();

    let path = format!("/api/cards/{}", card);
    let (status, body) = app
        .send(
            Method::PUT,
            &path,
            Some(seeded.owner),
            Some(json!({ "title": "  Renamed  ", "assigneeId": assignee, "priority": "high" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["card"]["title"], "Renamed");
    assert_eq!(body["data"]["card"]["priority"], "high");
    assert_eq!(body["data"]["card"]["version"], 2);

    let (status, body) = app
        .send(Method::PUT, &path, Some(seeded.owner), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");

    let (status, _) = app.send(Method::DELETE, &path, Some(seeded.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.order(column).await, vec![seeded.cards[0][1], seeded.cards[0][2]]);
    assert_eq!(app.positions(column).await, vec![0, 1]);

    let (status, _) = app.send(Method::DELETE, &path, Some(seeded.owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_column_lifecycle() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[0, 2]).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/columns",
            Some(seeded.owner),
            Some(json!({ "boardId": seeded.board_id, "title": "Blocked" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["column"]["position"], 3);
    let blocked: Uuid = serde_json::from_value(body["data"]["column"]["id"].clone()).unwrap();

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/columns/{}", blocked),
            Some(seeded.owner),
            Some(json!({ "title": "Waiting" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["column"]["title"], "Waiting");

    let reversed: Vec<Uuid> = [blocked]
        .into_iter()
        .chain(seeded.columns.iter().rev().copied())
        .collect();
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/boards/{}/columns/order", seeded.board_id),
            Some(seeded.owner),
            Some(json!({ "columnIds": reversed })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["columnIds"], json!(reversed));

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/boards/{}/columns/order", seeded.board_id),
            Some(seeded.owner),
            Some(json!({ "columnIds": [blocked] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/columns/{}", seeded.columns[1]),
            Some(seeded.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .send(Method::GET, &format!("/api/boards/{}", seeded.board_id), Some(seeded.owner), None)
        .await;
    let columns = body["data"]["board"]["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 3);
    let positions: Vec<i64> = columns.iter().map(|c| c["position"].as_i64().unwrap()).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert!(columns.iter().all(|c| c["id"] != json!(seeded.columns[1])));
}

#[tokio::test]
async fn test_audit_trail_records_moves() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2, 0]).await;
    let mover = seeded.cards[0][0];

    app.send(
        Method::POST,
        "/api/cards/move",
        Some(seeded.owner),
        Some(move_body(mover, seeded.columns[1], 0)),
    )
    .await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/boards/{}/audit?limit=1", seeded.board_id),
            Some(seeded.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "CARD_MOVED");
    assert_eq!(entries[0]["entityId"], json!(mover));
    assert_eq!(entries[0]["changes"]["from"]["columnId"], json!(seeded.columns[0]));
    assert_eq!(entries[0]["changes"]["to"]["columnId"], json!(seeded.columns[1]));
}
