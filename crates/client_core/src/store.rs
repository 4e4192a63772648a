use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{EntityKind, RecordId},
    protocol::{EntityRecord, Pagination},
};
use tokio::sync::broadcast;

use crate::{
    lifecycle::{Completion, LifecycleController, ListParams, Operation, RequestPhase, StoreEvent},
    notifications::{Notification, NotificationLevel, ObservedStore},
    transport::Transport,
};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<T> {
    /// Server order; ids are unique.
    pub collection: Vec<T>,
    pub selected: Option<T>,
    pub phase: RequestPhase,
    pub error: Option<String>,
    pub message: Option<String>,
    pub pagination: Pagination,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            collection: Vec::new(),
            selected: None,
            phase: RequestPhase::Idle,
            error: None,
            message: None,
            pagination: Pagination::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation<T> {
    ReplaceCollection {
        records: Vec<T>,
        pagination: Option<Pagination>,
    },
    Select(T),
    Append(T),
    Replace {
        id: RecordId,
        record: T,
    },
    Remove {
        id: RecordId,
    },
}

impl<T: EntityRecord> EntityState<T> {
    pub fn is_loading(&self) -> bool {
        self.phase == RequestPhase::Pending
    }

    pub fn find(&self, id: &RecordId) -> Option<&T> {
        self.collection.iter().find(|record| record.id() == id)
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.collection.iter().map(|record| record.id().clone()).collect()
    }

    pub(crate) fn apply(&mut self, mutation: Mutation<T>) {
        match mutation {
            Mutation::ReplaceCollection {
                records,
                pagination,
            } => {
                self.collection = dedup_by_id(records);
                if let Some(pagination) = pagination {
                    self.pagination = pagination;
                }
            }
            Mutation::Select(record) => self.selected = Some(record),
            Mutation::Append(record) => {
                // a replayed create must not leave two entries with one id
                let id = record.id().clone();
                self.collection.retain(|existing| existing.id() != &id);
                self.collection.push(record);
            }
            Mutation::Replace { id, record } => {
                if let Some(slot) = self.collection.iter_mut().find(|r| r.id() == &id) {
                    *slot = record.clone();
                }
                if self.selected.as_ref().is_some_and(|s| s.id() == &id) {
                    self.selected = Some(record);
                }
            }
            Mutation::Remove { id } => {
                self.collection.retain(|record| record.id() != &id);
                if self.selected.as_ref().is_some_and(|s| s.id() == &id) {
                    self.selected = None;
                }
            }
        }
    }
}

fn dedup_by_id<T: EntityRecord>(records: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        if !unique.iter().any(|existing| existing.id() == record.id()) {
            unique.push(record);
        }
    }
    unique
}

pub struct EntityStore<T> {
    controller: LifecycleController<T>,
}

impl<T> EntityStore<T>
where
    T: EntityRecord + DeserializeOwned,
{
    pub fn new(transport: Arc<dyn Transport>, event_capacity: usize) -> Self {
        Self {
            controller: LifecycleController::new(transport, event_capacity),
        }
    }

    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    pub async fn list_all(&self, params: ListParams) -> Completion {
        self.controller.execute(Operation::List(params)).await
    }

    pub async fn get_by_id(&self, id: impl Into<RecordId>) -> Completion {
        self.controller.execute(Operation::Get(id.into())).await
    }

    pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> Completion {
        match serde_json::to_value(payload) {
            Ok(body) => self.controller.execute(Operation::Create(body)).await,
            Err(e) => {
                let op = Operation::Create(serde_json::Value::Null);
                self.controller
                    .fail_before_send(&op, format!("invalid {} payload: {e}", T::KIND))
                    .await
            }
        }
    }

    /// Replaces the cached record with the server's copy. A record missing
    /// from the collection is not inserted.
    pub async fn update<P: Serialize + ?Sized>(
        &self,
        id: impl Into<RecordId>,
        payload: &P,
    ) -> Completion {
        let id = id.into();
        match serde_json::to_value(payload) {
            Ok(body) => self.controller.execute(Operation::Update(id, body)).await,
            Err(e) => {
                let op = Operation::Update(id, serde_json::Value::Null);
                self.controller
                    .fail_before_send(&op, format!("invalid {} payload: {e}", T::KIND))
                    .await
            }
        }
    }

    pub async fn delete(&self, id: impl Into<RecordId>) -> Completion {
        self.controller.execute(Operation::Delete(id.into())).await
    }

    pub async fn search(&self, query: impl Into<String>) -> Completion {
        self.controller.execute(Operation::Search(query.into())).await
    }

    pub async fn clear_error(&self) {
        self.controller
            .update_state(|state| state.error.take().is_some())
            .await;
    }

    pub async fn clear_message(&self) {
        self.controller
            .update_state(|state| state.message.take().is_some())
            .await;
    }

    pub async fn reset(&self) {
        self.controller.reset().await;
    }

    pub async fn snapshot(&self) -> EntityState<T> {
        self.controller.read(|s| s.clone()).await
    }

    pub async fn collection(&self) -> Vec<T> {
        self.controller.read(|s| s.collection.clone()).await
    }

    pub async fn selected(&self) -> Option<T> {
        self.controller.read(|s| s.selected.clone()).await
    }

    pub async fn phase(&self) -> RequestPhase {
        self.controller.read(|s| s.phase).await
    }

    pub async fn is_loading(&self) -> bool {
        self.controller.read(|s| s.is_loading()).await
    }

    pub async fn error(&self) -> Option<String> {
        self.controller.read(|s| s.error.clone()).await
    }

    pub async fn message(&self) -> Option<String> {
        self.controller.read(|s| s.message.clone()).await
    }

    pub async fn pagination(&self) -> Pagination {
        self.controller.read(|s| s.pagination).await
    }

    pub async fn in_flight(&self) -> usize {
        self.controller.in_flight().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.controller.subscribe()
    }
}

#[async_trait]
impl<T> ObservedStore for EntityStore<T>
where
    T: EntityRecord + DeserializeOwned,
{
    fn kind(&self) -> EntityKind {
        T::KIND
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.controller.subscribe()
    }

    async fn acknowledge(&self, notification: &Notification) {
        let text = notification.text.as_str();
        match notification.level {
            NotificationLevel::Success => {
                self.controller
                    .update_state(|state| take_if_eq(&mut state.message, text))
                    .await
            }
            NotificationLevel::Failure => {
                self.controller
                    .update_state(|state| take_if_eq(&mut state.error, text))
                    .await
            }
        }
    }
}

fn take_if_eq(field: &mut Option<String>, text: &str) -> bool {
    if field.as_deref() == Some(text) {
        *field = None;
        true
    } else {
        false
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
