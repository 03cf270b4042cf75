//! Protocol error scenario tests
//!
//! Errors go to the offending connection only and leave it usable.

use crate::harness::{Role, TestServer};
use serde_json::json;

#[tokio::test]
async fn test_bad_token_then_retry() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let mut client = server.connect().await.unwrap();
    client.join(&space_id, "bogus-token").await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "unauthorized");
    assert_eq!(server.registry().member_count(&space_id), 0);

    client.join(&space_id, &alice.token).await.unwrap();
    client.expect_next("space-joined").await.unwrap();
}

#[tokio::test]
async fn test_empty_token_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let mut client = server.connect().await.unwrap();
    client.join(&space_id, "").await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_logged_out_token_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    server
        .post_auth("/api/v1/logout", &json!({}), &alice.token)
        .await
        .unwrap();

    let mut client = server.connect().await.unwrap();
    client.join(&space_id, &alice.token).await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_space() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();

    let mut client = server.connect().await.unwrap();
    client.join("no-such-space", &alice.token).await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "space-not-found");
    assert_eq!(server.registry().room_count(), 0);
}

#[tokio::test]
async fn test_move_before_join() {
    let server = TestServer::start().await.expect("Failed to start server");

    let mut client = server.connect().await.unwrap();
    client.move_to(1, 0).await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "not-joined");

    client.leave().await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "not-joined");
}

#[tokio::test]
async fn test_second_join_refused() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_one = server.create_space(&alice.token, "10x10").await.unwrap();
    let space_two = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut client, _) = server.join(&space_one, &alice).await.unwrap();
    client.join(&space_two, &alice.token).await.unwrap();
    let err = client.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "already-joined");

    assert_eq!(server.registry().member_count(&space_one), 1);
    assert_eq!(server.registry().member_count(&space_two), 0);
}

#[tokio::test]
async fn test_malformed_frames_keep_connection() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let mut client = server.connect().await.unwrap();
    for frame in [
        "not json",
        r#"{"type":"teleport","payload":{"x":1,"y":1}}"#,
        r#"{"type":"move","payload":{"x":1}}"#,
    ] {
        client.send_raw(frame).await.unwrap();
        let err = client.expect_next("error").await.unwrap();
        assert_eq!(err["payload"]["code"], "malformed", "frame {:?}", frame);
    }

    client.join(&space_id, &alice.token).await.unwrap();
    client.expect_next("space-joined").await.unwrap();
}

#[tokio::test]
async fn test_errors_stay_local() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();
    let (mut b, _) = server.join(&space_id, &bob).await.unwrap();
    a.expect_next("user-joined").await.unwrap();

    b.send_raw("garbage").await.unwrap();
    b.expect_next("error").await.unwrap();

    assert!(a.drain().await.is_empty());
}

#[tokio::test]
async fn test_deleted_space_refuses_new_joins() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();

    let resp = server
        .delete_auth(&format!("/api/v1/space/{}", space_id), &alice.token)
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let mut b = server.connect().await.unwrap();
    b.join(&space_id, &bob.token).await.unwrap();
    let err = b.expect_next("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "space-not-found");

    assert_eq!(server.registry().member_count(&space_id), 1);
    assert!(a.drain().await.is_empty());
}
