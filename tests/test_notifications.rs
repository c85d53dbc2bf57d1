mod helpers;

use helpers::test_db::{build_services, seed_device, seed_operator, setup_test_db};

use aidline::api::middleware::ApiError;
use aidline::models::{NewNotification, NotificationKind};
use aidline::realtime::{OutboundEvent, RoomKey};

async fn seed_conversation(
    services: &helpers::test_db::TestServices,
    db: &aidline::database::Database,
    device_id: &str,
) -> i64 {
    seed_device(db, device_id).await;
    let (conversation, _) = services
        .conversations
        .get_or_create(device_id, "")
        .await
        .unwrap();
    conversation.id
}

#[tokio::test]
async fn test_list_unread_is_newest_first() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_operator(&db, "op-1", true).await;
    let conversation_id = seed_conversation(&services, &db, "device-1").await;

    for i in 0..3 {
        services
            .notifications
            .notify(NewNotification::new_message(
                "op-1".to_string(),
                conversation_id,
                i + 1,
                &format!("message {}", i),
            ))
            .await
            .unwrap();
    }

    let unread = services.notifications.list_unread("op-1").await.unwrap();

    assert_eq!(unread.len(), 3);
    assert!(unread[0].id > unread[1].id);
    assert!(unread[1].id > unread[2].id);
}

#[tokio::test]
async fn test_mark_read_is_one_way_and_owned() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_operator(&db, "op-1", true).await;
    seed_operator(&db, "op-2", true).await;
    let conversation_id = seed_conversation(&services, &db, "device-1").await;

    let notification = services
        .notifications
        .notify(NewNotification::assignment("op-1".to_string(), conversation_id))
        .await
        .unwrap();
    assert!(!notification.is_read);

    // Another operator cannot touch it
    let result = services.notifications.mark_read(notification.id, "op-2").await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));

    let read = services
        .notifications
        .mark_read(notification.id, "op-1")
        .await
        .unwrap();
    assert!(read.is_read);

    // Repeat is a no-op, still read
    let again = services
        .notifications
        .mark_read(notification.id, "op-1")
        .await
        .unwrap();
    assert!(again.is_read);

    let unread = services.notifications.list_unread("op-1").await.unwrap();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn test_mark_all_read_returns_count() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_operator(&db, "op-1", true).await;
    seed_operator(&db, "op-2", true).await;
    let conversation_id = seed_conversation(&services, &db, "device-1").await;

    for _ in 0..2 {
        services
            .notifications
            .notify(NewNotification::assignment("op-1".to_string(), conversation_id))
            .await
            .unwrap();
    }
    services
        .notifications
        .notify(NewNotification::assignment("op-2".to_string(), conversation_id))
        .await
        .unwrap();

    let count = services.notifications.mark_all_read("op-1").await.unwrap();
    assert_eq!(count, 2);

    let repeat = services.notifications.mark_all_read("op-1").await.unwrap();
    assert_eq!(repeat, 0);

    // op-2's notification is untouched
    let other = services.notifications.list_unread("op-2").await.unwrap();
    assert_eq!(other.len(), 1);
}

#[tokio::test]
async fn test_notify_pushes_to_operator_room() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_operator(&db, "op-1", true).await;
    let conversation_id = seed_conversation(&services, &db, "device-1").await;

    let room = RoomKey::Operator("op-1".to_string());
    let (_conn, mut rx) = services.hub.join(room).await;

    let created = services
        .notifications
        .notify(NewNotification::assignment("op-1".to_string(), conversation_id))
        .await
        .unwrap();

    match rx.recv().await {
        Some(OutboundEvent::Notification { notification }) => {
            assert_eq!(notification.id, created.id);
            assert_eq!(notification.kind, NotificationKind::ConversationAssigned);
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_notify_with_no_listener_is_not_an_error() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_operator(&db, "op-1", true).await;
    let conversation_id = seed_conversation(&services, &db, "device-1").await;

    // Nobody joined the operator's room; the record still lands
    services
        .notifications
        .notify(NewNotification::assignment("op-1".to_string(), conversation_id))
        .await
        .unwrap();

    let unread = services.notifications.list_unread("op-1").await.unwrap();
    assert_eq!(unread.len(), 1);
}
