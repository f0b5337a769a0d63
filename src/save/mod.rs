//! SL2 save container access
//!
//! This module knows the fixed byte layout of the container and performs
//! validated reads of flag bytes and character records. It never writes.

pub mod layout;
mod character;
mod container;

pub use character::{
    decode_name, CharacterCatalog, CharacterName, CharacterRecord, CharacterStats, CharacterSummary,
    PLACEHOLDER_NAME,
};
pub use container::SaveContainer;
pub use layout::{CharacterLayout, ContainerLayout};
