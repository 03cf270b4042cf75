//! Presence scenario tests
//!
//! Join handshake, room isolation, explicit leave and disconnect cleanup.

use crate::harness::{of_type, Role, TestServer};
use serde_json::json;

#[tokio::test]
async fn test_first_joiner_gets_empty_room() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "100x200").await.unwrap();

    let mut client = server.connect().await.unwrap();
    client.join(&space_id, &alice.token).await.unwrap();

    let ack = client.expect_next("space-joined").await.unwrap();
    assert_eq!(ack["payload"]["spawn"], json!({"x": 0, "y": 0}));
    assert_eq!(ack["payload"]["users"], json!([]));
    assert!(client.drain().await.is_empty());

    assert_eq!(server.registry().member_count(&space_id), 1);
}

#[tokio::test]
async fn test_second_joiner_sees_first_and_is_announced() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_id = server.create_space(&alice.token, "100x200").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();

    let mut b = server.connect().await.unwrap();
    b.join(&space_id, &bob.token).await.unwrap();

    // the acknowledgment is the first thing the joiner hears
    let ack = b.expect_next("space-joined").await.unwrap();
    assert_eq!(ack["payload"]["spawn"], json!({"x": 1, "y": 0}));
    assert_eq!(
        ack["payload"]["users"],
        json!([{"userId": alice.user_id, "position": {"x": 0, "y": 0}}])
    );

    let joined = a.expect_next("user-joined").await.unwrap();
    assert_eq!(
        joined["payload"],
        json!({"userId": bob.user_id, "x": 1, "y": 0})
    );

    // no self-announcement
    assert!(of_type(&b.drain().await, "user-joined").is_empty());
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_one = server.create_space(&alice.token, "10x10").await.unwrap();
    let space_two = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_one, &alice).await.unwrap();
    let (mut b, ack) = server.join(&space_two, &bob).await.unwrap();
    assert_eq!(ack["payload"]["users"], json!([]));

    b.move_to(1, 0).await.unwrap();
    b.close().await.unwrap();

    assert!(a.drain().await.is_empty());
    assert_eq!(server.registry().room_count(), 1);
}

#[tokio::test]
async fn test_disconnect_announces_exactly_once() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();
    let (mut b, _) = server.join(&space_id, &bob).await.unwrap();
    a.expect("user-joined").await.unwrap();

    b.close().await.unwrap();
    drop(b);

    let left = a.expect_next("user-left").await.unwrap();
    assert_eq!(left["payload"]["userId"], bob.user_id.as_str());
    assert!(a.drain().await.is_empty());

    server.wait_for_members(&space_id, 1).await.unwrap();
}

#[tokio::test]
async fn test_explicit_leave_then_close() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let bob = server.create_user("bob", Role::User).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();
    let (mut b, _) = server.join(&space_id, &bob).await.unwrap();
    a.expect("user-joined").await.unwrap();

    b.leave().await.unwrap();
    let left = a.expect_next("user-left").await.unwrap();
    assert_eq!(left["payload"]["userId"], bob.user_id.as_str());

    // a left session may not move
    b.move_to(2, 0).await.unwrap();
    let err = b.expect("error").await.unwrap();
    assert_eq!(err["payload"]["code"], "not-joined");

    b.close().await.unwrap();
    drop(b);
    assert!(a.drain().await.is_empty());
}

#[tokio::test]
async fn test_rejoin_after_leave() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_one = server.create_space(&alice.token, "10x10").await.unwrap();
    let space_two = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_one, &alice).await.unwrap();
    a.leave().await.unwrap();
    server.wait_for_members(&space_one, 0).await.unwrap();

    a.join(&space_two, &alice.token).await.unwrap();
    let ack = a.expect_next("space-joined").await.unwrap();
    assert_eq!(ack["payload"]["users"], json!([]));
    assert_eq!(server.registry().member_count(&space_two), 1);
}

#[tokio::test]
async fn test_empty_room_is_evicted() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut a, _) = server.join(&space_id, &alice).await.unwrap();
    assert_eq!(server.registry().room_count(), 1);

    a.close().await.unwrap();
    drop(a);

    server.wait_for_members(&space_id, 0).await.unwrap();
    for _ in 0..100 {
        if server.registry().room_count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(server.registry().room_count(), 0);
}

#[tokio::test]
async fn test_same_account_on_two_connections() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.create_user("alice", Role::Admin).await.unwrap();
    let space_id = server.create_space(&alice.token, "10x10").await.unwrap();

    let (mut first, _) = server.join(&space_id, &alice).await.unwrap();
    let (_second, ack) = server.join(&space_id, &alice).await.unwrap();

    // each connection is its own occupant
    assert_eq!(ack["payload"]["users"].as_array().unwrap().len(), 1);
    let joined = first.expect_next("user-joined").await.unwrap();
    assert_eq!(joined["payload"]["userId"], alice.user_id.as_str());
    assert_eq!(server.registry().member_count(&space_id), 2);
}
