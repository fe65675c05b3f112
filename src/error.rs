//! Error types shared by the tray core.

use std::path::PathBuf;

/// Errors produced by the tray core.
///
/// Box and icon bookkeeping errors are contract violations by the caller;
/// they are reported immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error("box {0:?} already exists")]
    DuplicateBox(String),

    #[error("unknown box {0:?}")]
    UnknownBox(String),

    #[error("icon {icon_id:?} is already in box {box_id:?}")]
    DuplicateIcon { icon_id: String, box_id: String },

    #[error("item was already destroyed")]
    AlreadyDestroyed,

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, TrayError>;
