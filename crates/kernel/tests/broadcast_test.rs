//! Integration tests for committed-change broadcast.

mod common;

use serde_json::json;
use uuid::Uuid;

use common::{simple_content, test_state};
use scrivano_kernel::models::UpdateContent;

#[tokio::test]
async fn each_live_subscriber_gets_exactly_one_creation_event() {
    let state = test_state();
    let actor = Uuid::now_v7();

    let mut first = state.hub().subscribe();
    let mut second = state.hub().subscribe();

    let committed = state
        .content()
        .create(simple_content("Launch"), actor)
        .await
        .unwrap();

    for subscriber in [&mut first, &mut second] {
        let event = subscriber.recv().await.unwrap();
        assert_eq!(event.name, "content.created");
        assert_eq!(event.payload["id"], json!(committed.item.id));

        // exactly one event; nothing else is queued
        assert!(subscriber.try_recv().is_none());
    }
}

#[tokio::test]
async fn subscriber_connecting_after_publish_receives_nothing() {
    let state = test_state();
    let actor = Uuid::now_v7();

    state
        .content()
        .create(simple_content("Before"), actor)
        .await
        .unwrap();

    let mut late = state.hub().subscribe();
    assert!(late.try_recv().is_none());
}

#[tokio::test]
async fn write_path_emits_the_documented_event_sequence() {
    let state = test_state();
    let actor = Uuid::now_v7();

    let mut subscriber = state.hub().subscribe();

    let committed = state
        .content()
        .create(simple_content("Tracked"), actor)
        .await
        .unwrap();
    let id = committed.item.id;

    state
        .content()
        .update(
            id,
            UpdateContent {
                title: Some("Tracked v2".to_string()),
                ..UpdateContent::default()
            },
            actor,
        )
        .await
        .unwrap();

    state.content().remove(id, actor).await.unwrap();
    state.content().restore(id, actor).await.unwrap();

    let created = subscriber.recv().await.unwrap();
    assert_eq!(created.name, "content.created");

    let updated = subscriber.recv().await.unwrap();
    assert_eq!(updated.name, "content.updated");
    assert_eq!(updated.payload["title"], json!("Tracked v2"));

    let deleted = subscriber.recv().await.unwrap();
    assert_eq!(deleted.name, "content.deleted");
    assert_eq!(deleted.payload, json!({ "id": id, "deleted": true }));

    let restored = subscriber.recv().await.unwrap();
    assert_eq!(restored.name, "content.updated");
    assert_eq!(restored.payload["id"], json!(id));
}

#[tokio::test]
async fn failed_writes_publish_nothing() {
    let state = test_state();
    let actor = Uuid::now_v7();

    let mut subscriber = state.hub().subscribe();

    // invalid block list: the create fails before any write or broadcast
    let err = state
        .content()
        .create(
            scrivano_kernel::models::CreateContent {
                title: "Bad".to_string(),
                blocks: vec![scrivano_kernel::models::BlockInput {
                    block_type: "hologram".to_string(),
                    ..scrivano_kernel::models::BlockInput::default()
                }],
                ..scrivano_kernel::models::CreateContent::default()
            },
            actor,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, scrivano_kernel::KernelError::Validation { .. }));

    assert!(subscriber.try_recv().is_none());
}

#[tokio::test]
async fn disconnected_subscribers_do_not_affect_delivery() {
    let state = test_state();
    let actor = Uuid::now_v7();

    let early = state.hub().subscribe();
    let mut durable = state.hub().subscribe();
    assert_eq!(state.hub().subscriber_count(), 2);

    drop(early);

    state
        .content()
        .create(simple_content("Still delivered"), actor)
        .await
        .unwrap();

    let event = durable.recv().await.unwrap();
    assert_eq!(event.name, "content.created");
    assert_eq!(state.hub().subscriber_count(), 1);
}
