//! Poll cursor: the next update id to ask the chat backend for.

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PollCursor {
    #[serde(default, alias = "telegramOffset", skip_serializing_if = "Option::is_none")]
    pub telegram_offset: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PollCursor {
    pub fn at(offset: i64) -> Self {
        Self {
            telegram_offset: Some(offset),
            ..Self::default()
        }
    }

    /// Cursor positioned just past `update_id`. Never moves backwards.
    pub fn advanced_past(&self, update_id: i64) -> Self {
        let next = update_id.saturating_add(1);
        Self {
            telegram_offset: Some(self.telegram_offset.map_or(next, |cur| cur.max(next))),
            extra: self.extra.clone(),
        }
    }
}

pub trait CursorStore: Send + Sync {
    /// Never fails: anything unreadable means "no prior offset".
    fn load(&self) -> PollCursor;
    fn save(&self, cursor: &PollCursor) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> PollCursor {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PollCursor::default(),
            Err(e) => {
                warn!("cannot read poll state {}: {e}", self.path.display());
                return PollCursor::default();
            }
        };
        serde_json::from_str(&txt).unwrap_or_else(|e| {
            warn!("ignoring corrupt poll state {}: {e}", self.path.display());
            PollCursor::default()
        })
    }

    fn save(&self, cursor: &PollCursor) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(cursor)?)?;
        Ok(())
    }
}
