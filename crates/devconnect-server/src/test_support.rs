//! Shared fixtures for service and router tests.

use std::sync::Arc;

use devconnect_realtime::testing::RecordingNotifier;
use devconnect_shared::types::UserId;
use devconnect_store::{Database, NewUser};

use crate::api::AppState;
use crate::config::ServerConfig;

/// State backed by an in-memory database, with a notifier that records
/// every event instead of delivering it.
pub fn test_state() -> (AppState, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let db = Database::open_in_memory().unwrap();
    let state = AppState::with_notifier(db, ServerConfig::default(), Arc::new(notifier.clone()));
    (state, notifier)
}

pub async fn add_user(state: &AppState, name: &str, skills: &[&str]) -> UserId {
    let db = state.db.lock().await;
    db.create_user(NewUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        ..NewUser::default()
    })
    .unwrap()
    .id
}

/// Link two users directly, bypassing the request flow.
pub async fn connect(state: &AppState, a: UserId, b: UserId) {
    let db = state.db.lock().await;
    let mut first = db.get_user(&a).unwrap();
    let mut second = db.get_user(&b).unwrap();
    first.add_connection(b);
    second.add_connection(a);
    db.save_user(&first).unwrap();
    db.save_user(&second).unwrap();
}
