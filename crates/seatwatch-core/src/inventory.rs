//! Inventory-side records and the port the inventory adapter implements.
//!
//! Records are kept as opaque JSON objects: inventory backends disagree on
//! field names, so every consumer goes through the priority lookups in
//! [`crate::extract`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{extract, Result};

/// One license row as returned by the inventory API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseRecord(pub Map<String, Value>);

impl LicenseRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The record id rendered as a string (`null` and non-scalar ids count as absent).
    pub fn id(&self) -> Option<String> {
        self.get("id").and_then(extract::scalar_string)
    }
}

impl From<Value> for LicenseRecord {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// One license seat row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatAssignment(pub Map<String, Value>);

impl SeatAssignment {
    /// First embedded user object among the keys backends use for it.
    pub fn assigned_user(&self) -> Option<AssignedUser> {
        const KEYS: [&str; 5] = ["assigned_user", "assigned_to", "user", "assigned", "assignee"];
        KEYS.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(|v| v.as_object())
            .map(AssignedUser::from_object)
    }
}

impl From<Value> for SeatAssignment {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// The linking fields of a seat's assigned user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignedUser {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl AssignedUser {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            obj.get(key)
                .and_then(extract::scalar_string)
                .filter(|s| !s.is_empty())
        };
        Self {
            id: text("id"),
            username: text("username").or_else(|| text("name")),
            email: text("email"),
        }
    }
}

/// Inventory collaborator. Implementations drain pagination before returning.
#[async_trait]
pub trait InventoryPort: Send + Sync {
    async fn list_licenses(&self, page_size: usize) -> Result<Vec<LicenseRecord>>;
    async fn list_seats(&self, license_id: &str, page_size: usize) -> Result<Vec<SeatAssignment>>;
}
