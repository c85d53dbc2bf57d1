mod helpers;

use helpers::test_db::{build_services, seed_device, seed_operator, setup_test_db};

use aidline::api::middleware::ApiError;
use aidline::models::{
    ConversationStatus, MessageKind, MessageStatus, NotificationKind, SenderKind,
    SendMessageRequest,
};

fn text_message(content: &str) -> SendMessageRequest {
    SendMessageRequest {
        content: content.to_string(),
        kind: MessageKind::Text,
        media_url: String::new(),
        is_urgent: false,
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
async fn test_first_device_message_activates_and_auto_assigns() {
    // Scenario A: a device with no open conversation starts one, sends
    // "Help", and the conversation comes back active with an operator.
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    assert_eq!(conversation.status, ConversationStatus::New);

    let message = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    assert_eq!(message.status, MessageStatus::Sent);
    assert!(message.sender_id.is_none());

    let conversation = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation.status, ConversationStatus::Active);
    assert_eq!(conversation.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(conversation.unread_count_operator, 1);
    assert_eq!(conversation.unread_count_device, 0);
    assert_eq!(conversation.last_message, "Help");
    assert_eq!(conversation.last_message_by.as_deref(), Some("device"));
}

#[tokio::test]
async fn test_operator_reply_increments_device_unread() {
    // Scenario B: the operator's reply bumps the device counter and leaves
    // the operator counter alone.
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    services
        .messages
        .create(
            conversation.id,
            SenderKind::Operator,
            Some("op-1".to_string()),
            text_message("On our way"),
        )
        .await
        .unwrap();

    let conversation = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation.unread_count_device, 1);
    assert_eq!(conversation.unread_count_operator, 1);
    assert_eq!(conversation.last_message, "On our way");
    assert_eq!(conversation.last_message_by.as_deref(), Some("op-1"));
}

#[tokio::test]
async fn test_mark_conversation_read_flips_all_and_is_idempotent() {
    // Scenario C: operator bulk-reads the device messages; the repeat call
    // changes nothing.
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    for content in ["first", "second", "third"] {
        services
            .messages
            .create(conversation.id, SenderKind::Device, None, text_message(content))
            .await
            .unwrap();
    }

    let count = services
        .messages
        .mark_conversation_read(conversation.id, SenderKind::Operator)
        .await
        .unwrap();
    assert_eq!(count, 3);

    let page = services
        .messages
        .list(conversation.id, 50, 0, None)
        .await
        .unwrap();
    for message in &page.messages {
        assert_eq!(message.status, MessageStatus::Read);
        assert!(message.read_at.is_some());
    }

    let conversation_after = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation_after.unread_count_operator, 0);

    let repeat = services
        .messages
        .mark_conversation_read(conversation.id, SenderKind::Operator)
        .await
        .unwrap();
    assert_eq!(repeat, 0);
}

#[tokio::test]
async fn test_concurrent_mark_read_transitions_once() {
    // Scenario D: two racing readers; exactly one transition, one decrement.
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    let message = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    let a = services.messages.clone();
    let b = services.messages.clone();
    let (left, right) = tokio::join!(a.mark_read(message.id), b.mark_read(message.id));

    let (left_message, left_changed) = left.unwrap();
    let (right_message, right_changed) = right.unwrap();

    assert_eq!(left_message.status, MessageStatus::Read);
    assert_eq!(right_message.status, MessageStatus::Read);
    // Exactly one call performed the transition
    assert!(left_changed ^ right_changed);

    let conversation = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation.unread_count_operator, 0);
}

#[tokio::test]
async fn test_status_transitions_are_monotonic() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    let message = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    let (message, changed) = services.messages.mark_read(message.id).await.unwrap();
    assert!(changed);
    assert_eq!(message.status, MessageStatus::Read);
    assert!(message.read_at.is_some());

    // Read is terminal: a later delivered must not rewind it
    let (message, changed) = services.messages.mark_delivered(message.id).await.unwrap();
    assert!(!changed);
    assert_eq!(message.status, MessageStatus::Read);
    assert!(message.delivered_at.is_none());
}

#[tokio::test]
async fn test_mark_delivered_stamps_once() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    let message = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    let (message, changed) = services.messages.mark_delivered(message.id).await.unwrap();
    assert!(changed);
    assert_eq!(message.status, MessageStatus::Delivered);
    let first_stamp = message.delivered_at.clone();
    assert!(first_stamp.is_some());

    let (message, changed) = services.messages.mark_delivered(message.id).await.unwrap();
    assert!(!changed);
    assert_eq!(message.delivered_at, first_stamp);
}

#[tokio::test]
async fn test_unread_counter_never_goes_negative() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    let message = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("Help"))
        .await
        .unwrap();

    // Bulk read resets the counter, then the single-message path observes
    // an already-read message and must not decrement again.
    services
        .messages
        .mark_conversation_read(conversation.id, SenderKind::Operator)
        .await
        .unwrap();
    services.messages.mark_read(message.id).await.unwrap();

    let conversation = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation.unread_count_operator, 0);
}

#[tokio::test]
async fn test_read_receipt_batch() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let mut ids = Vec::new();
    for content in ["one", "two"] {
        let message = services
            .messages
            .create(conversation.id, SenderKind::Device, None, text_message(content))
            .await
            .unwrap();
        ids.push(message.id);
    }
    // Unknown ids are skipped, not errors
    ids.push(9999);

    let count = services
        .messages
        .mark_read_many(conversation.id, &ids)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let conversation = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(conversation.unread_count_operator, 0);
}

#[tokio::test]
async fn test_message_validation_rules() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    // Empty text
    let result = services
        .messages
        .create(conversation.id, SenderKind::Device, None, text_message("  "))
        .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));

    // Over the content cap
    let result = services
        .messages
        .create(
            conversation.id,
            SenderKind::Device,
            None,
            text_message(&"x".repeat(1001)),
        )
        .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));

    // Media kind without a media URL
    let mut image = text_message("caption");
    image.kind = MessageKind::Image;
    let result = services
        .messages
        .create(conversation.id, SenderKind::Device, None, image)
        .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));

    // Location without content
    let mut location = text_message("");
    location.kind = MessageKind::Location;
    let result = services
        .messages
        .create(conversation.id, SenderKind::Device, None, location)
        .await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));

    // Nothing was written along the way
    let page = services
        .messages
        .list(conversation.id, 50, 0, None)
        .await
        .unwrap();
    assert_eq!(page.count, 0);
}

#[tokio::test]
async fn test_operator_message_requires_identity() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let result = services
        .messages
        .create(conversation.id, SenderKind::Operator, None, text_message("hi"))
        .await;

    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[tokio::test]
async fn test_urgent_device_message_adds_urgent_notification() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let mut urgent = text_message("Building collapsed");
    urgent.is_urgent = true;
    services
        .messages
        .create(conversation.id, SenderKind::Device, None, urgent)
        .await
        .unwrap();

    let kinds: Vec<NotificationKind> = services
        .notifications
        .list_unread("op-1")
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect();

    assert!(kinds.contains(&NotificationKind::ConversationAssigned));
    assert!(kinds.contains(&NotificationKind::NewMessage));
    assert!(kinds.contains(&NotificationKind::UrgentMessage));
}

#[tokio::test]
async fn test_message_listing_with_after_cursor() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let mut ids = Vec::new();
    for content in ["one", "two", "three"] {
        let message = services
            .messages
            .create(conversation.id, SenderKind::Device, None, text_message(content))
            .await
            .unwrap();
        ids.push(message.id);
    }

    let page = services
        .messages
        .list(conversation.id, 50, 0, Some(ids[0]))
        .await
        .unwrap();

    assert_eq!(page.count, 2);
    assert_eq!(page.messages[0].content, "two");
    assert_eq!(page.messages[1].content, "three");
}
