//! SL2 Boss Tracker
//!
//! Reads boss defeat state and character stats out of SL2 save containers.
//! Boss defeats are event flags: single bits in each character slot's flag
//! region, addressed through a block offset table.
//!
//! This crate can be used as:
//! - A Rust library for direct integration
//! - The `flag-extractor` command line tool (feature `cli`), which prints JSON

pub mod bosses;
pub mod config;
pub mod error;
pub mod flags;
pub mod monitor;
pub mod save;
pub mod service;

// Re-export commonly used types
pub use bosses::{BossDataError, BossDataset, BossEntry, LocationGroup};
pub use config::{ConfigError, FlagGeometry, TrackerConfig};
pub use error::{ContainerError, DecodeError, LocateError, OffsetTableError, ServiceError};
pub use flags::{EventFlagAddress, EventFlagLocator, FlagOffsetTable};
pub use monitor::{StatusChange, StatusMonitor};
pub use save::{CharacterLayout, CharacterStats, CharacterSummary, ContainerLayout, SaveContainer};
pub use service::{BossStatusQuery, BossStatusResult, BossStatusService};
