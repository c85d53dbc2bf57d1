mod helpers;

use helpers::test_db::{build_services, seed_device, seed_operator, setup_test_db};

use aidline::api::middleware::ApiError;
use aidline::models::{ConversationStatus, NotificationKind, Priority};

#[tokio::test]
async fn test_get_or_create_creates_new_conversation() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, created) = services
        .conversations
        .get_or_create("device-1", "Need help")
        .await
        .unwrap();

    assert!(created);
    assert_eq!(conversation.status, ConversationStatus::New);
    assert_eq!(conversation.priority, Priority::Medium);
    assert_eq!(conversation.subject, "Need help");
    assert!(conversation.assigned_operator_id.is_none());
    assert_eq!(conversation.unread_count_device, 0);
    assert_eq!(conversation.unread_count_operator, 0);
}

#[tokio::test]
async fn test_get_or_create_reuses_open_conversation() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (first, created_first) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    let (second, created_second) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_get_or_create_rejects_unknown_device() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);

    let result = services.conversations.get_or_create("ghost", "").await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_get_or_create_returns_same_conversation() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let a = services.conversations.clone();
    let b = services.conversations.clone();

    let (left, right) = tokio::join!(
        a.get_or_create("device-1", ""),
        b.get_or_create("device-1", "")
    );

    let (left, _) = left.unwrap();
    let (right, _) = right.unwrap();

    assert_eq!(left.id, right.id);
}

#[tokio::test]
async fn test_resolved_conversation_is_not_reused() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (first, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    services.conversations.mark_resolved(first.id).await.unwrap();

    let (second, created) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    assert!(created);
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_assign_sets_operator_and_activates() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let assigned = services
        .conversations
        .assign(conversation.id, "op-1")
        .await
        .unwrap();

    assert_eq!(assigned.status, ConversationStatus::Active);
    assert_eq!(assigned.assigned_operator_id.as_deref(), Some("op-1"));

    // Assignment notifies the operator
    let unread = services.notifications.list_unread("op-1").await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].kind, NotificationKind::ConversationAssigned);
    assert_eq!(unread[0].conversation_id, conversation.id);
}

#[tokio::test]
async fn test_assign_non_staff_fails_without_mutation() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "intruder", false).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let result = services.conversations.assign(conversation.id, "intruder").await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    // No partial state: the conversation is untouched
    let reloaded = services.conversations.get(conversation.id).await.unwrap();
    assert_eq!(reloaded.status, ConversationStatus::New);
    assert!(reloaded.assigned_operator_id.is_none());

    let unread = services.notifications.list_unread("intruder").await.unwrap();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn test_assign_unknown_operator_fails() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let result = services.conversations.assign(conversation.id, "nobody").await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_reassignment_overwrites_operator() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;
    seed_operator(&db, "op-2", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    services.conversations.assign(conversation.id, "op-1").await.unwrap();
    let reassigned = services
        .conversations
        .assign(conversation.id, "op-2")
        .await
        .unwrap();

    assert_eq!(reassigned.assigned_operator_id.as_deref(), Some("op-2"));
}

#[tokio::test]
async fn test_mark_resolved_is_idempotent() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_operator(&db, "op-1", true).await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    services.conversations.assign(conversation.id, "op-1").await.unwrap();

    let resolved = services.conversations.mark_resolved(conversation.id).await.unwrap();
    assert_eq!(resolved.status, ConversationStatus::Resolved);

    // Second resolve is a no-op, not an error, and does not re-notify
    let again = services.conversations.mark_resolved(conversation.id).await.unwrap();
    assert_eq!(again.status, ConversationStatus::Resolved);

    let resolved_notifications: Vec<_> = services
        .notifications
        .list_unread("op-1")
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::ConversationResolved)
        .collect();
    assert_eq!(resolved_notifications.len(), 1);
}

#[tokio::test]
async fn test_closed_is_terminal() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    services
        .conversations
        .update(conversation.id, Some(ConversationStatus::Closed), None)
        .await
        .unwrap();

    for target in [
        ConversationStatus::New,
        ConversationStatus::Active,
        ConversationStatus::Resolved,
    ] {
        let result = services
            .conversations
            .update(conversation.id, Some(target), None)
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    let resolve_result = services.conversations.mark_resolved(conversation.id).await;
    assert!(matches!(resolve_result, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_reopen_resolved_is_rejected() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    services.conversations.mark_resolved(conversation.id).await.unwrap();

    let result = services
        .conversations
        .update(conversation.id, Some(ConversationStatus::Active), None)
        .await;

    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_update_priority_only() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;

    let (conversation, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();

    let updated = services
        .conversations
        .update(conversation.id, None, Some(Priority::Urgent))
        .await
        .unwrap();

    assert_eq!(updated.priority, Priority::Urgent);
    assert_eq!(updated.status, ConversationStatus::New);
}

#[tokio::test]
async fn test_stats_counts() {
    let db = setup_test_db().await;
    let services = build_services(&db, 5);
    seed_device(&db, "device-1").await;
    seed_device(&db, "device-2").await;
    seed_operator(&db, "op-1", true).await;

    let (first, _) = services
        .conversations
        .get_or_create("device-1", "")
        .await
        .unwrap();
    services.conversations.assign(first.id, "op-1").await.unwrap();

    let (second, _) = services
        .conversations
        .get_or_create("device-2", "")
        .await
        .unwrap();
    services
        .conversations
        .update(second.id, None, Some(Priority::Urgent))
        .await
        .unwrap();

    let stats = services.conversations.stats().await.unwrap();

    assert_eq!(stats.total_conversations, 2);
    assert_eq!(stats.new_conversations, 1);
    assert_eq!(stats.active_conversations, 1);
    assert_eq!(stats.resolved_conversations, 0);
    assert_eq!(stats.unassigned_conversations, 1);
    assert_eq!(stats.urgent_conversations, 1);
}
