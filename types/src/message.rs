use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One transcript entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    id: Uuid,
    text: String,
    is_user: bool,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: &str) -> Self {
        Self::new(text, true)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(text, false)
    }

    fn new(text: &str, is_user: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            is_user,
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_user(&self) -> bool {
        self.is_user
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
