//! Rooms, presence notices and the SSE stream

use crate::common::{assert_failure, drain, names, TestApp};
use assert_matches::assert_matches;
use axum::body::{Body, BodyDataStream};
use axum::http::{header, Method, Request, StatusCode};
use boardsync::backend::realtime::TypingRequest;
use boardsync::client::api::{SseFrame, SseParser};
use boardsync::shared::event::{BoardChange, PresenceEvent, ServerEvent};
use boardsync::shared::model::MoveCardRequest;
use futures_util::StreamExt;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_join_sends_roster_and_announces_newcomers() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[1]).await;
    let realtime = &app.state.realtime;
    let guest = Uuid::new_v4();

    let (owner_conn, mut owner_events) = realtime.connect(seeded.owner, Some("owner".into())).await;
    assert_eq!(names(&drain(&mut owner_events)), vec!["connected"]);

    let users = realtime
        .join(owner_conn.connection_id, seeded.owner, seeded.board_id)
        .await
        .expect("join");
    assert_eq!(users.len(), 1);
    assert_eq!(names(&drain(&mut owner_events)), vec!["board_users"]);

    let (guest_conn, mut guest_events) = realtime.connect(guest, Some("guest".into())).await;
    let users = realtime
        .join(guest_conn.connection_id, guest, seeded.board_id)
        .await
        .expect("join");
    assert_eq!(users.len(), 2);
    assert_eq!(names(&drain(&mut guest_events)), vec!["connected", "board_users"]);

    let owner_saw = drain(&mut owner_events);
    assert_eq!(owner_saw.len(), 1);
    assert_matches!(
        &owner_saw[0],
        ServerEvent::Presence(PresenceEvent::UserJoined { user, .. }) if user.user_id == guest
    );
}

#[tokio::test]
async fn test_second_connection_of_same_user_is_not_announced() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[0]).await;
    let realtime = &app.state.realtime;
    let watcher = Uuid::new_v4();

    let (watcher_conn, mut watcher_events) = realtime.connect(watcher, None).await;
    realtime
        .join(watcher_conn.connection_id, watcher, seeded.board_id)
        .await
        .unwrap();

    let (tab_one, _rx_one) = realtime.connect(seeded.owner, None).await;
    let (tab_two, _rx_two) = realtime.connect(seeded.owner, None).await;
    realtime
        .join(tab_one.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    drain(&mut watcher_events);

    let users = realtime
        .join(tab_two.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    let owner = users.iter().find(|u| u.user_id == seeded.owner).unwrap();
    assert_eq!(owner.connections, 2);
    assert!(drain(&mut watcher_events).is_empty());

    // Closing one tab keeps the user present
    realtime
        .leave(tab_one.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    assert!(drain(&mut watcher_events).is_empty());

    realtime
        .leave(tab_two.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    let events = drain(&mut watcher_events);
    assert_eq!(names(&events), vec!["user_left", "board_users"]);
    assert_matches!(
        &events[1],
        ServerEvent::Presence(PresenceEvent::BoardUsers { users, .. }) if users.len() == 1
    );
}

#[tokio::test]
async fn test_changes_reach_room_members_only() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[2, 0]).await;
    let other_board = app.seed(Uuid::new_v4(), &[0]).await;
    let realtime = &app.state.realtime;

    let (member, mut member_events) = realtime.connect(seeded.owner, None).await;
    realtime
        .join(member.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    let (elsewhere, mut elsewhere_events) = realtime.connect(other_board.owner, None).await;
    realtime
        .join(elsewhere.connection_id, other_board.owner, other_board.board_id)
        .await
        .unwrap();
    let (_idle, mut idle_events) = realtime.connect(Uuid::new_v4(), None).await;
    drain(&mut member_events);
    drain(&mut elsewhere_events);
    drain(&mut idle_events);

    let mover = seeded.cards[0][1];
    app.state
        .boards
        .move_card(
            seeded.owner,
            MoveCardRequest::new(mover, seeded.columns[1], 0),
        )
        .await
        .unwrap();

    let events = drain(&mut member_events);
    assert_eq!(events.len(), 1);
    let ServerEvent::Change(change) = &events[0] else {
        panic!("expected a change, got {:?}", events[0]);
    };
    assert_eq!(change.user_id, seeded.owner);
    assert_matches!(
        &change.change,
        BoardChange::CardMoved { placements, new_position: 0, .. } if placements.len() == 2
    );
    assert!(drain(&mut elsewhere_events).is_empty());
    assert!(drain(&mut idle_events).is_empty());
}

#[tokio::test]
async fn test_typing_reaches_everyone_but_the_typist() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[1]).await;
    let realtime = &app.state.realtime;
    let guest = Uuid::new_v4();

    let (owner_conn, mut owner_events) = realtime.connect(seeded.owner, None).await;
    let (guest_conn, mut guest_events) = realtime.connect(guest, None).await;
    for (conn, user) in [(&owner_conn, seeded.owner), (&guest_conn, guest)] {
        realtime
            .join(conn.connection_id, user, seeded.board_id)
            .await
            .unwrap();
    }
    drain(&mut owner_events);
    drain(&mut guest_events);

    realtime
        .typing(
            owner_conn.connection_id,
            seeded.owner,
            TypingRequest {
                board_id: seeded.board_id,
                card_id: Some(seeded.cards[0][0]),
                is_typing: true,
            },
        )
        .await
        .unwrap();

    assert!(drain(&mut owner_events).is_empty());
    let events = drain(&mut guest_events);
    assert_matches!(
        events.as_slice(),
        [ServerEvent::Presence(PresenceEvent::UserTyping { user_id, is_typing: true, .. })]
            if *user_id == seeded.owner
    );
}

#[tokio::test]
async fn test_realtime_command_errors() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[0]).await;
    let (conn, _events) = app.state.realtime.connect(seeded.owner, None).await;

    // Someone else's connection id
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/realtime/{}/join", conn.connection_id),
            Some(Uuid::new_v4()),
            Some(json!({ "boardId": seeded.board_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_failure(&body, "UNKNOWN_CONNECTION");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/realtime/{}/typing", conn.connection_id),
            Some(seeded.owner),
            Some(json!({ "boardId": seeded.board_id, "isTyping": true })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_failure(&body, "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/realtime/{}/join", conn.connection_id),
            Some(seeded.owner),
            Some(json!({ "boardId": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_failure(&body, "NOT_FOUND");

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/realtime/{}/ping", conn.connection_id),
            Some(seeded.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_closed_connections_are_swept() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[0]).await;
    let realtime = &app.state.realtime;
    let guest = Uuid::new_v4();

    let (watcher, mut watcher_events) = realtime.connect(seeded.owner, None).await;
    realtime
        .join(watcher.connection_id, seeded.owner, seeded.board_id)
        .await
        .unwrap();
    let (gone, gone_events) = realtime.connect(guest, None).await;
    realtime
        .join(gone.connection_id, guest, seeded.board_id)
        .await
        .unwrap();
    drain(&mut watcher_events);

    drop(gone_events);
    let report = realtime.sweep().await.unwrap();
    assert_eq!(report.connections, 1);
    assert_eq!(report.departures, 1);
    assert_eq!(names(&drain(&mut watcher_events)), vec!["user_left", "board_users"]);
    assert_eq!(realtime.hub().connection_count().await, 1);
}

/// Read frames from an SSE body until one named `name` arrives
async fn next_named(
    body: &mut BodyDataStream,
    parser: &mut SseParser,
    seen: &mut Vec<SseFrame>,
    name: &str,
) -> SseFrame {
    loop {
        if let Some(index) = seen.iter().position(|f| f.event == name) {
            return seen.remove(index);
        }
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", name))
            .expect("stream ended")
            .expect("body chunk");
        seen.extend(parser.feed(&chunk));
    }
}

#[tokio::test]
async fn test_sse_stream_over_http() {
    let app = TestApp::new();
    let seeded = app.seed(Uuid::new_v4(), &[1, 0]).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/realtime")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(seeded.owner)))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body().into_data_stream();
    let mut parser = SseParser::default();
    let mut seen = Vec::new();

    let connected = next_named(&mut body, &mut parser, &mut seen, "connected").await;
    let ServerEvent::Connected(connected) =
        ServerEvent::from_sse(&connected.event, &connected.data).unwrap()
    else {
        panic!("connected frame did not decode");
    };
    assert_eq!(connected.user_id, seeded.owner);

    let (status, body_json) = app
        .send(
            Method::POST,
            &format!("/api/realtime/{}/join", connected.connection_id),
            Some(seeded.owner),
            Some(json!({ "boardId": seeded.board_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_json["data"].as_array().unwrap().len(), 1);
    next_named(&mut body, &mut parser, &mut seen, "board_users").await;

    let mover = seeded.cards[0][0];
    let (status, _) = app
        .send(
            Method::POST,
            "/api/cards/move",
            Some(seeded.owner),
            Some(crate::common::move_body(mover, seeded.columns[1], 0)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let frame = next_named(&mut body, &mut parser, &mut seen, "card_moved").await;
    let event = ServerEvent::from_sse(&frame.event, &frame.data).unwrap();
    assert_eq!(event.board_id(), Some(seeded.board_id));
    assert_matches!(
        event,
        ServerEvent::Change(change) if matches!(
            change.change,
            BoardChange::CardMoved { ref card, .. } if card.id == mover
        )
    );
}
