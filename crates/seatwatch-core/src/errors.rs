use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their transport errors into `External` so the cycles in
/// this crate can propagate them uniformly to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("registry file is corrupt: {path}: {reason}")]
    RegistryCorrupt { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
