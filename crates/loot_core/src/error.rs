//! Error types for the loot core.
//!
//! Failures are split by who can act on them: validation failures and
//! unknown players are reported to the caller unchanged, storage failures
//! abort the mutation that triggered them and leave in-memory state intact.

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Bad or missing input, or a command issued in the wrong raid state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Boss name cannot be empty")]
    EmptyBossName,

    #[error("A raid needs at least one participant")]
    NoParticipants,

    #[error("Item name cannot be empty")]
    EmptyItemName,

    #[error("Player name cannot be empty")]
    EmptyPlayerName,

    #[error("There is already an active raid session. End it first.")]
    RaidAlreadyActive,

    #[error("There is no active raid session.")]
    NoActiveRaid,

    #[error("Player {0} is not a participant in the current raid")]
    NotAParticipant(String),

    #[error("Player {0} is listed more than once")]
    DuplicateParticipant(String),
}

/// A referenced entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
}

/// Durable store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {0}: {1}")]
    DirectoryCreate(PathBuf, IoError),

    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to create file {0}: {1}")]
    FileCreate(PathBuf, IoError),

    #[error("Failed to write to file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to sync file {0}: {1}")]
    FileSync(PathBuf, IoError),

    #[error("Failed to rename file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to serialize {0}: {1}")]
    Serialization(String, serde_json::Error),

    #[error("Failed to deserialize file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error returned by every loot core operation.
#[derive(Debug, Error)]
pub enum LootError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LootError {
    /// Short machine-readable category, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            LootError::Validation(_) => "validation",
            LootError::NotFound(_) => "not_found",
            LootError::Storage(_) => "storage",
        }
    }
}

pub type LootResult<T> = Result<T, LootError>;
pub type StorageResult<T> = Result<T, StorageError>;
