use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Corresponds to the 'person' table. A named identity, optionally reachable over chat.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    /// `None` until an operator or the guest gives this identity a name.
    pub name: Option<String>,
    /// Digits-only chat handle, unique across persons.
    pub contact_handle: Option<String>,
    pub seat_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roster entry as supplied by an operator or by guest registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGuest {
    pub name: String,
    pub contact: common_types::ContactHandle,
    pub seat_label: Option<String>,
}

/// How the naming operation resolves the person a face should link to.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonTarget {
    /// Resolve by exact display name, creating the person if nobody has it.
    Named(String),
    /// Resolve by contact handle (the canonical key), renaming if needed.
    Guest(NewGuest),
}

impl PersonTarget {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Guest(guest) => &guest.name,
        }
    }
}
