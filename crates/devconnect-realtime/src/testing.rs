//! A [`Notifier`] that records events instead of delivering them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use devconnect_shared::protocol::ServerEvent;
use devconnect_shared::types::UserId;

use crate::notifier::Notifier;

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<(UserId, ServerEvent)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded `(recipient, event)` pair, in emission order.
    pub fn events(&self) -> Vec<(UserId, ServerEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Events recorded for one recipient.
    pub fn events_for(&self, user: &UserId) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter(|(to, _)| to == user)
            .map(|(_, event)| event)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit_to_user(&self, user: &UserId, event: ServerEvent) {
        self.events.lock().unwrap().push((*user, event));
    }
}
