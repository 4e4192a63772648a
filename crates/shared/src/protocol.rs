use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{EntityKind, RecordId};

pub trait EntityRecord: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &RecordId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<RecordId>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

macro_rules! entity_record {
    ($ty:ty, $kind:expr) => {
        impl EntityRecord for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &RecordId {
                &self.id
            }
        }
    };
}

entity_record!(Customer, EntityKind::Customer);
entity_record!(Repair, EntityKind::Repair);
entity_record!(Sale, EntityKind::Sale);
entity_record!(Conversation, EntityKind::Conversation);
entity_record!(Message, EntityKind::Message);
entity_record!(Report, EntityKind::Report);
entity_record!(Settings, EntityKind::Settings);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn customer_keeps_unknown_attributes() {
        let customer: Customer = serde_json::from_value(json!({
            "_id": 9,
            "name": "Ada",
            "loyalty_tier": "gold"
        }))
        .expect("customer");
        assert_eq!(customer.id, RecordId::from("9"));
        assert_eq!(customer.extra.get("loyalty_tier"), Some(&json!("gold")));
    }

    #[test]
    fn repair_references_customer_by_id() {
        let repair: Repair = serde_json::from_value(json!({
            "id": "r-1",
            "customer_id": "c-7",
            "status": "waiting_parts"
        }))
        .expect("repair");
        assert_eq!(repair.customer_id, Some(RecordId::from("c-7")));
        assert_eq!(repair.id(), &RecordId::from("r-1"));
    }
}
