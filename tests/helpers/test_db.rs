use std::sync::Arc;

use aidline::database::Database;
use aidline::models::{DeviceSession, Operator};
use aidline::realtime::RealtimeHub;
use aidline::services::{ConversationService, MessageService, NotificationService};

/// Open a throwaway SQLite database (unique file per test for parallel
/// execution) and run the real migrations against it.
pub async fn setup_test_db() -> Database {
    let temp_file = format!("test_{}.db", uuid::Uuid::new_v4());
    let db_url = format!("sqlite://{}?mode=rwc", temp_file);

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    db
}

pub struct TestServices {
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub notifications: NotificationService,
    pub hub: Arc<RealtimeHub>,
}

/// Wire the service stack over a test database, mirroring bootstrap.
pub fn build_services(db: &Database, operator_active_cap: i64) -> TestServices {
    let hub = Arc::new(RealtimeHub::new());
    let notifications = NotificationService::new(db.clone(), hub.clone());
    let conversations =
        ConversationService::new(db.clone(), notifications.clone(), operator_active_cap);
    let messages = MessageService::new(db.clone(), conversations.clone(), notifications.clone());

    TestServices {
        conversations,
        messages,
        notifications,
        hub,
    }
}

#[allow(dead_code)]
pub async fn seed_device(db: &Database, device_id: &str) -> DeviceSession {
    db.create_device_session(device_id)
        .await
        .expect("Failed to seed device session")
}

#[allow(dead_code)]
pub async fn seed_operator(db: &Database, operator_id: &str, is_staff: bool) -> Operator {
    db.create_operator(operator_id, operator_id, is_staff)
        .await
        .expect("Failed to seed operator")
}
