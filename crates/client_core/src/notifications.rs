use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::EntityKind;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::lifecycle::StoreEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: EntityKind,
    pub level: NotificationLevel,
    pub text: String,
}

#[async_trait]
pub trait ObservedStore: Send + Sync {
    fn kind(&self) -> EntityKind;
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
    /// Clears the field the notification came from, if it still holds the
    /// notified text.
    async fn acknowledge(&self, notification: &Notification);
}

#[derive(Debug, Default)]
pub struct TransitionTracker {
    last_message: Option<String>,
    last_error: Option<String>,
}

impl TransitionTracker {
    pub fn observe(&mut self, event: &StoreEvent) -> Vec<Notification> {
        let mut out = Vec::new();
        if let Some(text) = transition(&mut self.last_message, event.message.as_ref()) {
            out.push(Notification {
                kind: event.kind,
                level: NotificationLevel::Success,
                text,
            });
        }
        if let Some(text) = transition(&mut self.last_error, event.error.as_ref()) {
            out.push(Notification {
                kind: event.kind,
                level: NotificationLevel::Failure,
                text,
            });
        }
        out
    }
}

fn transition(last: &mut Option<String>, current: Option<&String>) -> Option<String> {
    if last.as_ref() == current {
        return None;
    }
    *last = current.cloned();
    current.cloned()
}

pub struct NotificationBridge {
    notifications: broadcast::Sender<Notification>,
    tasks: Vec<JoinHandle<()>>,
}

impl NotificationBridge {
    pub fn new(capacity: usize) -> Self {
        let (notifications, _) = broadcast::channel(capacity.max(1));
        Self {
            notifications,
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Starts watching `store`. Must be called from inside a tokio runtime.
    pub fn watch(&mut self, store: Arc<dyn ObservedStore>) {
        let mut events = store.subscribe();
        let sink = self.notifications.clone();
        let kind = store.kind();

        self.tasks.push(tokio::spawn(async move {
            let mut tracker = TransitionTracker::default();
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("notifications: lagged kind={kind} skipped={skipped}");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                for notification in tracker.observe(&event) {
                    debug!(
                        "notifications: emit kind={} level={:?} text={}",
                        notification.kind, notification.level, notification.text
                    );
                    let _ = sink.send(notification.clone());
                    store.acknowledge(&notification).await;
                }
            }
        }));
    }

    pub fn watch_all(&mut self, stores: impl IntoIterator<Item = Arc<dyn ObservedStore>>) {
        for store in stores {
            self.watch(store);
        }
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
