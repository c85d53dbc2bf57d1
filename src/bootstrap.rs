use std::sync::Arc;

use crate::api::middleware::AppState;
use crate::config::Config;
use crate::database::Database;
use crate::realtime::RealtimeHub;
use crate::services::{ConversationService, MessageService, NotificationService};

/// Wire the database, the realtime hub and the service layer into the
/// shared application state.
pub fn build_app_state(db: Database, config: &Config) -> AppState {
    let hub = Arc::new(RealtimeHub::new());
    tracing::info!("Realtime hub initialized");

    let notification_service = NotificationService::new(db.clone(), hub.clone());
    tracing::info!("Notification service initialized");

    let conversation_service = ConversationService::new(
        db.clone(),
        notification_service.clone(),
        config.operator_active_cap,
    );
    tracing::info!(
        "Conversation service initialized (operator active cap: {})",
        config.operator_active_cap
    );

    let message_service = MessageService::new(
        db.clone(),
        conversation_service.clone(),
        notification_service.clone(),
    );
    tracing::info!("Message service initialized");

    AppState {
        db,
        hub,
        conversation_service,
        message_service,
        notification_service,
        ws_idle_timeout_secs: config.ws_idle_timeout_secs,
    }
}
