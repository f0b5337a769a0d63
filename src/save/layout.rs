//! Fixed layout of the SL2 save container
//!
//! The container is a header followed by `slot_count` equally sized
//! character slots. Each slot carries the event flag byte array at a fixed
//! offset and a character record (name, level, deaths, play time) at
//! another fixed offset.
//!
//! Container layout:
//! ```text
//! +0x000000  header            (header_size)
//! +0x000310  slot 0            (slot_size)
//!            +0x10             event flags (flag_region_max_size bytes)
//!            +record_offset    character record (record_size bytes)
//! +0x2803A0  slot 1
//! ...
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ContainerError;

pub const HEADER_SIZE: u64 = 0x310;
pub const SLOT_SIZE: u64 = 0x280090;
pub const FLAG_REGION_OFFSET_IN_SLOT: u64 = 0x10;
pub const FLAG_REGION_MAX_SIZE: u64 = 0x1BF99F;
pub const SLOT_COUNT: u32 = 10;

fn default_header_size() -> u64 { HEADER_SIZE }
fn default_slot_size() -> u64 { SLOT_SIZE }
fn default_slot_count() -> u32 { SLOT_COUNT }
fn default_flag_region_offset() -> u64 { FLAG_REGION_OFFSET_IN_SLOT }
fn default_flag_region_max_size() -> u64 { FLAG_REGION_MAX_SIZE }

/// Byte geometry of the container and of the flag region inside each slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLayout {
    #[serde(default = "default_header_size")]
    pub header_size: u64,
    #[serde(default = "default_slot_size")]
    pub slot_size: u64,
    #[serde(default = "default_slot_count")]
    pub slot_count: u32,
    #[serde(default = "default_flag_region_offset")]
    pub flag_region_offset: u64,
    #[serde(default = "default_flag_region_max_size")]
    pub flag_region_max_size: u64,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            header_size: HEADER_SIZE,
            slot_size: SLOT_SIZE,
            slot_count: SLOT_COUNT,
            flag_region_offset: FLAG_REGION_OFFSET_IN_SLOT,
            flag_region_max_size: FLAG_REGION_MAX_SIZE,
        }
    }
}

impl ContainerLayout {
    /// Smallest file that holds the header and every slot
    pub fn min_file_size(&self) -> u64 {
        self.header_size + u64::from(self.slot_count) * self.slot_size
    }

    /// Reject slot indices outside `0..slot_count`
    pub fn check_slot(&self, slot: u32) -> Result<(), ContainerError> {
        if slot < self.slot_count {
            Ok(())
        } else {
            Err(ContainerError::InvalidSlot {
                slot,
                slot_count: self.slot_count,
            })
        }
    }

    /// Absolute file offset of the first byte of a slot
    pub fn slot_start(&self, slot: u32) -> u64 {
        self.header_size + u64::from(slot) * self.slot_size
    }

    /// Absolute file offset of a byte inside a slot's flag region
    pub fn flag_byte_position(&self, slot: u32, byte_offset: u64) -> u64 {
        self.slot_start(slot) + self.flag_region_offset + byte_offset
    }

    /// Check that the flag region fits inside a slot and every offset fits in a `u64`
    ///
    /// Once this passes, the position helpers above cannot overflow for
    /// in-range slots and byte offsets.
    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.slot_count == 0 || self.slot_size == 0 {
            return Err(ContainerError::InvalidLayout(
                "slot_count and slot_size must be non-zero".to_string(),
            ));
        }
        let file_size = u64::from(self.slot_count)
            .checked_mul(self.slot_size)
            .and_then(|slots| slots.checked_add(self.header_size));
        if file_size.is_none() {
            return Err(ContainerError::InvalidLayout(format!(
                "0x{:X} + {} slots of 0x{:X} bytes overflows a file offset",
                self.header_size, self.slot_count, self.slot_size
            )));
        }
        let region_end = self.flag_region_offset.checked_add(self.flag_region_max_size);
        if region_end.map_or(true, |end| end > self.slot_size) {
            return Err(ContainerError::InvalidLayout(format!(
                "flag region 0x{:X}+0x{:X} exceeds slot size 0x{:X}",
                self.flag_region_offset, self.flag_region_max_size, self.slot_size
            )));
        }
        Ok(())
    }
}

fn default_record_offset() -> u64 { 0x1C0000 }
fn default_record_size() -> usize { 0x40 }
fn default_name_offset() -> usize { 0x00 }
fn default_name_chars() -> usize { 16 }
fn default_level_offset() -> usize { 0x20 }
fn default_seconds_played_offset() -> usize { 0x24 }
fn default_deaths_offset() -> usize { 0x28 }

/// Character record layout inside a slot
///
/// The name is a fixed-width UTF-16LE field padded with NULs; level is an
/// `i32`, play time and deaths are `u32`, all little-endian. Offsets are
/// relative to the start of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLayout {
    /// Offset of the record from the start of the slot
    #[serde(default = "default_record_offset")]
    pub record_offset: u64,
    #[serde(default = "default_record_size")]
    pub record_size: usize,
    #[serde(default = "default_name_offset")]
    pub name_offset: usize,
    /// Width of the name field in UTF-16 code units
    #[serde(default = "default_name_chars")]
    pub name_chars: usize,
    #[serde(default = "default_level_offset")]
    pub level_offset: usize,
    #[serde(default = "default_seconds_played_offset")]
    pub seconds_played_offset: usize,
    #[serde(default = "default_deaths_offset")]
    pub deaths_offset: usize,
}

impl Default for CharacterLayout {
    fn default() -> Self {
        Self {
            record_offset: default_record_offset(),
            record_size: default_record_size(),
            name_offset: default_name_offset(),
            name_chars: default_name_chars(),
            level_offset: default_level_offset(),
            seconds_played_offset: default_seconds_played_offset(),
            deaths_offset: default_deaths_offset(),
        }
    }
}

impl CharacterLayout {
    /// Absolute file offset of a slot's character record
    pub fn record_position(&self, container: &ContainerLayout, slot: u32) -> u64 {
        container.slot_start(slot) + self.record_offset
    }

    /// Bytes needed to decode every field, never less than the record size
    pub fn required_len(&self) -> usize {
        [
            self.record_size,
            self.name_offset.saturating_add(self.name_chars.saturating_mul(2)),
            self.level_offset.saturating_add(4),
            self.seconds_played_offset.saturating_add(4),
            self.deaths_offset.saturating_add(4),
        ]
        .into_iter()
        .max()
        .unwrap_or(self.record_size)
    }

    /// Check that the record fits in a slot and every field fits in the record
    pub fn validate(&self, container: &ContainerLayout) -> Result<(), ContainerError> {
        let record_end = u64::try_from(self.record_size)
            .ok()
            .and_then(|size| self.record_offset.checked_add(size));
        if record_end.map_or(true, |end| end > container.slot_size) {
            return Err(ContainerError::InvalidLayout(format!(
                "character record 0x{:X}+0x{:X} exceeds slot size 0x{:X}",
                self.record_offset, self.record_size, container.slot_size
            )));
        }

        let name_width = self.name_chars.checked_mul(2).ok_or_else(|| {
            ContainerError::InvalidLayout(format!("name_chars {} is too large", self.name_chars))
        })?;
        let fields = [
            ("name", self.name_offset, name_width),
            ("level", self.level_offset, 4),
            ("seconds_played", self.seconds_played_offset, 4),
            ("deaths", self.deaths_offset, 4),
        ];
        for (name, offset, width) in fields {
            if offset.checked_add(width).map_or(true, |end| end > self.record_size) {
                return Err(ContainerError::InvalidLayout(format!(
                    "{} field 0x{:X}+{} exceeds record size 0x{:X}",
                    name, offset, width, self.record_size
                )));
            }
        }
        Ok(())
    }
}
