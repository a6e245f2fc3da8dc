//! The persisted registry: registered users, pending requests and default
//! recipients.
//!
//! On disk the registry is a JSON object, but older deployments keep a bare
//! list of users; both load. Keys this crate does not know about survive a
//! load/save cycle so hand-edited annotations are not lost.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::{domain::ChatId, errors::Error, Result};

/// File name used when the configured registry path is a directory.
pub const DEFAULT_FILE_NAME: &str = "user_map.json";

/// A registered recipient and the inventory identity it is linked to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMapEntry {
    #[serde(rename = "telegram_chat_id", alias = "chat_id", default)]
    pub chat_id: ChatId,
    #[serde(
        rename = "snipeit_user_id",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub inventory_user_id: Option<String>,
    #[serde(
        rename = "snipeit_username",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub inventory_username: Option<String>,
    #[serde(
        rename = "snipeit_email",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub inventory_email: Option<String>,
    #[serde(
        rename = "telegram_first_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub first_name: Option<String>,
    #[serde(
        rename = "telegram_last_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_name: Option<String>,
    #[serde(
        rename = "telegram_username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chat_username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A registration awaiting an admin decision.
///
/// At most one of the `requested_*` hints is set, classified from the first
/// argument of `/register`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    #[serde(rename = "telegram_chat_id", alias = "chat_id", default)]
    pub chat_id: ChatId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requested_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requested_username: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requested_user_id: Option<String>,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_notified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a chat currently is in the registration lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatStatus {
    Unknown,
    Pending,
    Registered,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub users: Vec<UserMapEntry>,
    #[serde(rename = "pending_users", default)]
    pub pending: Vec<PendingRequest>,
    #[serde(default, deserialize_with = "chat_id_list")]
    pub default_chat_ids: Vec<ChatId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// Registered wins over pending; the state machine never lets both hold.
    pub fn status(&self, chat_id: &ChatId) -> ChatStatus {
        if self.find_user(chat_id).is_some() {
            ChatStatus::Registered
        } else if self.find_pending(chat_id).is_some() {
            ChatStatus::Pending
        } else {
            ChatStatus::Unknown
        }
    }

    pub fn find_user(&self, chat_id: &ChatId) -> Option<&UserMapEntry> {
        self.users.iter().find(|u| &u.chat_id == chat_id)
    }

    pub fn find_pending(&self, chat_id: &ChatId) -> Option<&PendingRequest> {
        self.pending.iter().find(|p| &p.chat_id == chat_id)
    }

    pub fn find_pending_mut(&mut self, chat_id: &ChatId) -> Option<&mut PendingRequest> {
        self.pending.iter_mut().find(|p| &p.chat_id == chat_id)
    }

    /// Remove and return the pending request for `chat_id`.
    pub fn take_pending(&mut self, chat_id: &ChatId) -> Option<PendingRequest> {
        let idx = self.pending.iter().position(|p| &p.chat_id == chat_id)?;
        Some(self.pending.remove(idx))
    }

    /// Chat ids of every registered user with a usable id, in file order.
    pub fn registered_chat_ids(&self) -> impl Iterator<Item = &ChatId> {
        self.users.iter().map(|u| &u.chat_id).filter(|c| !c.is_empty())
    }
}

/// Parse registry JSON in either on-disk shape: a bare list of users or the
/// full object. The shape is picked from the first token so a malformed file
/// reports the real error and its position.
pub fn parse_registry(txt: &str) -> std::result::Result<Registry, serde_json::Error> {
    if txt.trim_start().starts_with('[') {
        let users: Vec<UserMapEntry> = serde_json::from_str(txt)?;
        Ok(Registry {
            users,
            ..Registry::default()
        })
    } else {
        serde_json::from_str(txt)
    }
}

/// Persistence for the registry. Both cycles load a snapshot, mutate it and
/// save the whole object back.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<Registry>;
    fn save(&self, registry: &Registry) -> Result<()>;
}

/// Registry kept in a JSON file.
#[derive(Clone, Debug)]
pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file actually read and written: a directory resolves to
    /// [`DEFAULT_FILE_NAME`] inside it.
    pub fn resolved_path(&self) -> PathBuf {
        resolve_path(&self.path)
    }
}

pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

impl RegistryStore for FileRegistryStore {
    /// Missing file: an empty registry is written and returned. Unreadable or
    /// malformed file: `RegistryCorrupt`, since carrying on would drop users.
    fn load(&self) -> Result<Registry> {
        let path = self.resolved_path();
        if !path.exists() {
            let registry = Registry::default();
            self.save(&registry)?;
            info!("created empty registry at {}", path.display());
            return Ok(registry);
        }

        let txt = fs::read_to_string(&path)?;
        parse_registry(&txt).map_err(|e| Error::RegistryCorrupt {
            path,
            reason: e.to_string(),
        })
    }

    fn save(&self, registry: &Registry) -> Result<()> {
        let path = self.resolved_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let txt = serde_json::to_string_pretty(registry)?;
        fs::write(&path, txt)?;
        Ok(())
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn chat_id_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<ChatId>, D::Error> {
    let ids = Option::<Vec<ChatId>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(ids.into_iter().filter(|c| !c.is_empty()).collect())
}
