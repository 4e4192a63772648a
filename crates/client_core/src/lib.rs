use std::sync::Arc;

use shared::{
    domain::EntityKind,
    protocol::{Conversation, Customer, Message, Repair, Report, Sale, Settings},
};

pub mod config;
pub mod lifecycle;
pub mod normalizer;
pub mod notifications;
pub mod store;
pub mod transport;

pub use config::{load_settings, ClientSettings, SettingsError};
pub use lifecycle::{Completion, CorrelationToken, ListParams, RequestPhase, StoreEvent};
pub use notifications::{Notification, NotificationBridge, NotificationLevel, ObservedStore};
pub use store::{EntityState, EntityStore};
pub use transport::{ApiRequest, HttpTransport, Method, Transport, TransportSetupError};

/// One store per entity kind, created together at startup and handed to
/// whatever composes the UI.
#[derive(Clone)]
pub struct BusinessStores {
    pub customers: Arc<EntityStore<Customer>>,
    pub repairs: Arc<EntityStore<Repair>>,
    pub sales: Arc<EntityStore<Sale>>,
    pub conversations: Arc<EntityStore<Conversation>>,
    pub messages: Arc<EntityStore<Message>>,
    pub reports: Arc<EntityStore<Report>>,
    pub settings: Arc<EntityStore<Settings>>,
}

impl BusinessStores {
    pub fn new(transport: Arc<dyn Transport>, settings: &ClientSettings) -> Self {
        let capacity = settings.event_capacity;
        Self {
            customers: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            repairs: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            sales: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            conversations: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            messages: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            reports: Arc::new(EntityStore::new(Arc::clone(&transport), capacity)),
            settings: Arc::new(EntityStore::new(transport, capacity)),
        }
    }

    pub fn observed(&self) -> Vec<Arc<dyn ObservedStore>> {
        vec![
            self.customers.clone() as Arc<dyn ObservedStore>,
            self.repairs.clone() as Arc<dyn ObservedStore>,
            self.sales.clone() as Arc<dyn ObservedStore>,
            self.conversations.clone() as Arc<dyn ObservedStore>,
            self.messages.clone() as Arc<dyn ObservedStore>,
            self.reports.clone() as Arc<dyn ObservedStore>,
            self.settings.clone() as Arc<dyn ObservedStore>,
        ]
    }

    pub fn observed_kind(&self, kind: EntityKind) -> Arc<dyn ObservedStore> {
        match kind {
            EntityKind::Customer => self.customers.clone(),
            EntityKind::Repair => self.repairs.clone(),
            EntityKind::Sale => self.sales.clone(),
            EntityKind::Conversation => self.conversations.clone(),
            EntityKind::Message => self.messages.clone(),
            EntityKind::Report => self.reports.clone(),
            EntityKind::Settings => self.settings.clone(),
        }
    }

    pub async fn reset_all(&self) {
        self.customers.reset().await;
        self.repairs.reset().await;
        self.sales.reset().await;
        self.conversations.reset().await;
        self.messages.reset().await;
        self.reports.reset().await;
        self.settings.reset().await;
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
