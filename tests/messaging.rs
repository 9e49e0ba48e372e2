//! Messaging, Blocking & Reporting Tests
//!
//! Covers canonical thread ids, block enforcement on send, read receipts,
//! conversation summaries and abuse reports.

mod common;

use axum::http::StatusCode;
use campustrack::app::messaging::MessagingService;
use common::{app, TestApp, TestUser};
use serde_json::{json, Value};
use uuid::Uuid;

struct Pair {
    loser: TestUser,
    finder: TestUser,
    lost: Uuid,
    found: Uuid,
}

async fn matched_pair(app: &TestApp, label: &str) -> Pair {
    let loser = app.create_student(&format!("{}_loser", label)).await;
    let finder = app.create_student(&format!("{}_finder", label)).await;
    let lost = app
        .create_item(loser.id, "lost", "Electronics", "Grey Laptop", false)
        .await;
    let found = app
        .create_item(finder.id, "found", "Electronics", "Laptop in Lab 3", false)
        .await;
    Pair {
        loser,
        finder,
        lost,
        found,
    }
}

async fn is_read(app: &TestApp, message_id: Uuid) -> bool {
    sqlx::query_scalar("SELECT is_read FROM messages WHERE id = $1")
        .bind(message_id)
        .fetch_one(app.pool())
        .await
        .unwrap()
}

fn match_id(a: Uuid, b: Uuid) -> String {
    format!("{}-{}", a, b)
}

async fn send(app: &TestApp, from: &TestUser, to: &TestUser, match_id: &str, text: &str) -> Value {
    let resp = app
        .post_json(
            "/messages",
            json!({ "match_id": match_id, "to_user_id": to.id, "text": text }),
            from.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.error_message());
    resp.json()
}

// ===========================================================================
// Sending and threads
// ===========================================================================

#[tokio::test]
async fn match_id_is_order_independent() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_canon").await;

    let forward = send(
        &app,
        &pair.loser,
        &pair.finder,
        &match_id(pair.lost, pair.found),
        "Is this my laptop?",
    )
    .await;
    let backward = send(
        &app,
        &pair.finder,
        &pair.loser,
        &match_id(pair.found, pair.lost),
        "It has a sticker on the lid",
    )
    .await;

    assert_eq!(forward["match_id"], backward["match_id"]);
    assert_eq!(forward["is_read"], false);

    // Either spelling fetches the same two-message thread.
    for spelling in [match_id(pair.lost, pair.found), match_id(pair.found, pair.lost)] {
        let resp = app
            .get(&format!("/messages/{}", spelling), pair.loser.token())
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        let thread = resp.json();
        let thread = thread.as_array().unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0]["text"], "Is this my laptop?");
        assert_eq!(thread[1]["text"], "It has a sticker on the lid");
    }
}

#[tokio::test]
async fn send_rejects_bad_input() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_bad").await;
    let id = match_id(pair.lost, pair.found);

    let resp = app
        .post_json(
            "/messages",
            json!({ "match_id": "not-a-match", "to_user_id": pair.finder.id, "text": "hi" }),
            pair.loser.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid match id");

    let resp = app
        .post_json(
            "/messages",
            json!({ "match_id": id, "to_user_id": pair.finder.id, "text": "  " }),
            pair.loser.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "text is required");

    let resp = app
        .post_json(
            "/messages",
            json!({ "match_id": id, "to_user_id": pair.loser.id, "text": "hello me" }),
            pair.loser.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot message yourself");

    let resp = app
        .post_json(
            "/messages",
            json!({ "match_id": id, "to_user_id": Uuid::new_v4(), "text": "anyone?" }),
            pair.loser.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "recipient not found");
}

#[tokio::test]
async fn fetching_thread_marks_it_read_once() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_read").await;
    let id = match_id(pair.lost, pair.found);

    send(&app, &pair.finder, &pair.loser, &id, "I found a laptop").await;
    send(&app, &pair.finder, &pair.loser, &id, "Come to the front desk").await;
    send(&app, &pair.loser, &pair.finder, &id, "On my way").await;

    let first = app
        .get(&format!("/messages/{}", id), pair.loser.token())
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let unread_to_loser: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE to_user_id = $1 AND is_read = false",
    )
    .bind(pair.loser.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(unread_to_loser, 0);

    // Messages the loser sent stay unread until the finder looks.
    let unread_to_finder: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE to_user_id = $1 AND is_read = false",
    )
    .bind(pair.finder.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(unread_to_finder, 1);

    let second = app
        .get(&format!("/messages/{}", id), pair.loser.token())
        .await;
    let thread = second.json();
    let thread = thread.as_array().unwrap();
    assert_eq!(thread.len(), 3);
    for message in thread {
        if message["to_user_id"] == pair.loser.id.to_string() {
            assert_eq!(message["is_read"], true);
        }
    }
}

#[tokio::test]
async fn message_arriving_after_a_read_stays_unread() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_late").await;
    let id = match_id(pair.lost, pair.found);

    let seen = send(&app, &pair.finder, &pair.loser, &id, "Is this yours?").await;
    let seen = Uuid::parse_str(seen["id"].as_str().unwrap()).unwrap();
    // Lands between the loser's read and the mark-read update.
    let late = send(&app, &pair.finder, &pair.loser, &id, "Still here?").await;
    let late = Uuid::parse_str(late["id"].as_str().unwrap()).unwrap();

    let marked = MessagingService::new(app.state.db.clone())
        .mark_delivered(pair.loser.id, &[seen])
        .await
        .unwrap();
    assert_eq!(marked, 1);

    assert!(is_read(app, seen).await);
    assert!(!is_read(app, late).await);

    // The next fetch picks it up.
    let resp = app
        .get(&format!("/messages/{}", id), pair.loser.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let thread = resp.json();
    let late_entry = thread
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == late.to_string())
        .unwrap();
    assert_eq!(late_entry["is_read"], false);
    assert!(is_read(app, late).await);
}

#[tokio::test]
async fn thread_excludes_outsiders() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_outsider").await;
    let outsider = app.create_student("msg_outsider_other").await;
    let id = match_id(pair.lost, pair.found);

    send(&app, &pair.loser, &pair.finder, &id, "Private note").await;

    let resp = app.get(&format!("/messages/{}", id), outsider.token()).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn mark_single_message_read() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_mark").await;
    let id = match_id(pair.lost, pair.found);

    let message = send(&app, &pair.loser, &pair.finder, &id, "Ping").await;
    let message_id = Uuid::parse_str(message["id"].as_str().unwrap()).unwrap();

    // Only the recipient can mark it.
    let resp = app
        .put(&format!("/messages/read/{}", message_id), pair.loser.token())
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .put(&format!("/messages/read/{}", message_id), pair.finder.token())
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let is_read: bool = sqlx::query_scalar("SELECT is_read FROM messages WHERE id = $1")
        .bind(message_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(is_read);
}

// ===========================================================================
// Conversations
// ===========================================================================

#[tokio::test]
async fn conversations_one_entry_per_thread() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_convo").await;
    let other_finder = app.create_student("msg_convo_other").await;
    let other_found = app
        .create_item(other_finder.id, "found", "Electronics", "Laptop charger", false)
        .await;

    let first_thread = match_id(pair.lost, pair.found);
    let second_thread = match_id(other_found, pair.lost);

    send(&app, &pair.finder, &pair.loser, &first_thread, "First").await;
    send(&app, &pair.loser, &pair.finder, &first_thread, "Second").await;
    send(&app, &other_finder, &pair.loser, &second_thread, "Is it yours?").await;
    let newest = send(&app, &pair.finder, &pair.loser, &first_thread, "Third").await;

    let resp = app
        .get("/messages/conversations", pair.loser.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let conversations = body.as_array().unwrap();
    assert_eq!(conversations.len(), 2);

    // Most recent activity first.
    let top = &conversations[0];
    assert_eq!(top["match_id"], newest["match_id"]);
    assert_eq!(top["last_message"]["id"], newest["id"]);
    assert_eq!(top["last_message"]["text"], "Third");
    assert_eq!(top["unread_count"], 2);
    assert_eq!(top["other_user"]["id"], pair.finder.id.to_string());
    assert_eq!(top["other_user"]["name"], pair.finder.name);

    let bottom = &conversations[1];
    assert_eq!(bottom["other_user"]["id"], other_finder.id.to_string());
    assert_eq!(bottom["unread_count"], 1);

    // Reading a thread clears its count.
    app.get(&format!("/messages/{}", first_thread), pair.loser.token())
        .await;
    let resp = app
        .get("/messages/conversations", pair.loser.token())
        .await;
    assert_eq!(resp.json()[0]["unread_count"], 0);
}

// ===========================================================================
// Blocking
// ===========================================================================

#[tokio::test]
async fn block_stops_messages_both_ways() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_block").await;
    let id = match_id(pair.lost, pair.found);

    send(&app, &pair.loser, &pair.finder, &id, "Hello, is this mine?").await;

    let resp = app
        .post_json(
            "/messages/block",
            json!({ "user_id": pair.loser.id }),
            pair.finder.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["blocked"], true);

    // Blocking twice is a no-op.
    let resp = app
        .post_json(
            "/messages/block",
            json!({ "user_id": pair.loser.id }),
            pair.finder.token(),
        )
        .await;
    assert_eq!(resp.json()["blocked"], false);

    for (from, to) in [(&pair.loser, &pair.finder), (&pair.finder, &pair.loser)] {
        let resp = app
            .post_json(
                "/messages",
                json!({ "match_id": id, "to_user_id": to.id, "text": "still there?" }),
                from.token(),
            )
            .await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(resp.error_message(), "communication blocked");
        assert_eq!(resp.error_code().as_deref(), Some("communication_blocked"));
    }

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE match_id = $1")
        .bind(&id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(stored, 1);

    // History stays readable.
    let resp = app.get(&format!("/messages/{}", id), pair.finder.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn block_rejects_self_and_unknown() {
    let app = app().await;
    let user = app.create_student("msg_block_self").await;

    let resp = app
        .post_json("/messages/block", json!({ "user_id": user.id }), user.token())
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot block yourself");

    let resp = app
        .post_json(
            "/messages/block",
            json!({ "user_id": Uuid::new_v4() }),
            user.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

// ===========================================================================
// Reporting
// ===========================================================================

#[tokio::test]
async fn report_user_with_message() {
    let app = app().await;
    let pair = matched_pair(&app, "msg_report").await;
    let id = match_id(pair.lost, pair.found);
    let message = send(&app, &pair.finder, &pair.loser, &id, "Pay me to get it back").await;

    let resp = app
        .post_json(
            "/messages/report",
            json!({
                "reported_user_id": pair.finder.id,
                "reason": "Asking for ransom",
                "message_id": message["id"]
            }),
            pair.loser.token(),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["reporter_id"], pair.loser.id.to_string());
    assert_eq!(body["reported_user_id"], pair.finder.id.to_string());
    assert_eq!(body["message_id"], message["id"]);
    assert!(body["resolved_at"].is_null());
}

#[tokio::test]
async fn report_rejects_bad_targets() {
    let app = app().await;
    let reporter = app.create_student("msg_report_bad").await;
    let other = app.create_student("msg_report_bad_other").await;

    let resp = app
        .post_json(
            "/messages/report",
            json!({ "reported_user_id": reporter.id, "reason": "me" }),
            reporter.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot report yourself");

    let resp = app
        .post_json(
            "/messages/report",
            json!({ "reported_user_id": Uuid::new_v4(), "reason": "ghost" }),
            reporter.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");

    let resp = app
        .post_json(
            "/messages/report",
            json!({
                "reported_user_id": other.id,
                "reason": "spam",
                "message_id": Uuid::new_v4()
            }),
            reporter.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "message not found");

    let resp = app
        .post_json(
            "/messages/report",
            json!({ "reported_user_id": other.id, "reason": "" }),
            reporter.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
