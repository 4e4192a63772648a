use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(text) => Self(text),
            WireId::Signed(n) => Self(n.to_string()),
            WireId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Repair,
    Sale,
    Conversation,
    Message,
    Report,
    Settings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Customer,
        EntityKind::Repair,
        EntityKind::Sale,
        EntityKind::Conversation,
        EntityKind::Message,
        EntityKind::Report,
        EntityKind::Settings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            EntityKind::Customer => "customers",
            EntityKind::Repair => "repairs",
            EntityKind::Sale => "sales",
            EntityKind::Conversation => "conversations",
            EntityKind::Message => "messages",
            EntityKind::Report => "reports",
            EntityKind::Settings => "settings",
        }
    }

    pub fn from_path(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.path().eq_ignore_ascii_case(segment))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_accepts_numeric_and_text_ids() {
        let text: RecordId = serde_json::from_str("\"abc\"").expect("text id");
        let number: RecordId = serde_json::from_str("42").expect("numeric id");
        assert_eq!(text, RecordId::from("abc"));
        assert_eq!(number, RecordId::from("42"));
    }

    #[test]
    fn entity_kind_paths_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_path(kind.path()), Some(kind));
        }
        assert_eq!(EntityKind::from_path("Customers"), Some(EntityKind::Customer));
        assert_eq!(EntityKind::from_path("inventory"), None);
    }
}
