//! Error types for offset tables, save containers and status queries
//!
//! Whole-call failures (`OffsetTableError`, `ContainerError`, invalid slots)
//! surface as `ServiceError`. Per-item failures (`LocateError`, `DecodeError`)
//! are absorbed by the callers into omissions or placeholders.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the block id -> block offset table
#[derive(Debug, Error)]
pub enum OffsetTableError {
    #[error("offset table not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read offset table {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to resolve a single event id to a flag address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("block {0} is not present in the offset table")]
    UnknownBlock(u64),

    #[error("byte offset {0} is outside the event flag region")]
    OutOfRange(u64),
}

/// Failure to open or read the save container
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("save file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("save container is {actual} bytes, at least {required} required")]
    TooSmall { actual: u64, required: u64 },

    #[error("unexpected end of save container at offset {offset:#x}")]
    UnexpectedEof { offset: u64 },

    #[error("invalid slot index {slot} (container holds {slot_count} slots)")]
    InvalidSlot { slot: u32, slot_count: u32 },

    #[error("flag byte offset {byte_offset} is outside the {limit}-byte flag region")]
    FlagOutOfRange { byte_offset: u64, limit: u64 },

    #[error("invalid container layout: {0}")]
    InvalidLayout(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to decode one slot's character record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("character name in slot {slot} is not valid UTF-16")]
    InvalidName { slot: u32 },

    #[error("character record is {actual} bytes, expected {expected}")]
    Truncated { expected: usize, actual: usize },
}

/// Whole-call failure of a status query
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid slot index {slot} (container holds {slot_count} slots)")]
    InvalidSlot { slot: u32, slot_count: u32 },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    OffsetTable(#[from] OffsetTableError),

    #[error("character record in slot {slot} could not be decoded: {source}")]
    Decode {
        slot: u32,
        #[source]
        source: DecodeError,
    },
}

impl ServiceError {
    /// Stable machine-readable category for callers that branch on failures
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidSlot { .. } => "invalid_slot",
            ServiceError::Container(e) => e.kind(),
            ServiceError::OffsetTable(_) => "offset_table",
            ServiceError::Decode { .. } => "decode",
        }
    }
}

impl ContainerError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            ContainerError::NotFound(_) => "file_not_found",
            ContainerError::TooSmall { .. } | ContainerError::UnexpectedEof { .. } => {
                "container_too_small"
            }
            ContainerError::InvalidLayout(_) => "invalid_layout",
            ContainerError::InvalidSlot { .. } => "invalid_slot",
            ContainerError::FlagOutOfRange { .. } => "flag_out_of_range",
            ContainerError::Io(_) => "io",
        }
    }
}

/// Map an open failure to `NotFound` when the OS says so
pub(crate) fn container_open_error(path: &std::path::Path, err: io::Error) -> ContainerError {
    if err.kind() == io::ErrorKind::NotFound {
        ContainerError::NotFound(path.to_path_buf())
    } else {
        ContainerError::Io(err)
    }
}
