//! Event id -> flag address resolution
//!
//! Flags are stored in blocks of `block_divisor` bits. To find a flag:
//! 1. Divide event_id by the divisor to get the block id and index in block
//! 2. Map the block id to a block offset through the offset table
//! 3. Multiply the block offset by the block multiplier (bytes per block)
//! 4. Add index / 8 for the byte; the bit is counted from the MSB

use std::sync::Arc;

use serde::Serialize;

use super::FlagOffsetTable;
use crate::error::LocateError;
use crate::save::layout::FLAG_REGION_MAX_SIZE;

/// Flags per block
pub const BLOCK_DIVISOR: u32 = 1000;
/// Bytes per block (1000 bits / 8)
pub const BLOCK_MULTIPLIER: u32 = 125;

/// Position of one flag, relative to the start of a slot's flag region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EventFlagAddress {
    pub byte_offset: u64,
    /// 0..=7, bit 7 being the most significant
    pub bit_index: u8,
}

impl EventFlagAddress {
    /// Test this address's bit in the byte that holds it
    pub fn test(&self, byte: u8) -> bool {
        (byte >> self.bit_index) & 1 == 1
    }
}

/// Resolve an event id against the default flag region size
pub fn locate(
    event_id: u64,
    table: &FlagOffsetTable,
    block_divisor: u32,
    block_multiplier: u32,
) -> Result<EventFlagAddress, LocateError> {
    locate_within(event_id, table, block_divisor, block_multiplier, FLAG_REGION_MAX_SIZE)
}

/// Resolve an event id, failing for offsets at or beyond `region_size`
pub fn locate_within(
    event_id: u64,
    table: &FlagOffsetTable,
    block_divisor: u32,
    block_multiplier: u32,
    region_size: u64,
) -> Result<EventFlagAddress, LocateError> {
    let divisor = u64::from(block_divisor.max(1));
    let block_id = event_id / divisor;
    let index_in_block = event_id % divisor;

    let mapped_offset = u32::try_from(block_id)
        .ok()
        .and_then(|id| table.lookup(id))
        .ok_or(LocateError::UnknownBlock(block_id))?;

    let base_byte_offset = u64::from(mapped_offset) * u64::from(block_multiplier);
    let byte_offset = base_byte_offset + index_in_block / 8;
    let bit_index = 7 - (index_in_block % 8) as u8;

    if byte_offset >= region_size {
        return Err(LocateError::OutOfRange(byte_offset));
    }

    Ok(EventFlagAddress {
        byte_offset,
        bit_index,
    })
}

/// Locator bound to one offset table and one block geometry
#[derive(Debug, Clone)]
pub struct EventFlagLocator {
    table: Arc<FlagOffsetTable>,
    block_divisor: u32,
    block_multiplier: u32,
    region_size: u64,
}

impl EventFlagLocator {
    /// Create a locator with the standard block geometry
    pub fn new(table: Arc<FlagOffsetTable>) -> Self {
        Self {
            table,
            block_divisor: BLOCK_DIVISOR,
            block_multiplier: BLOCK_MULTIPLIER,
            region_size: FLAG_REGION_MAX_SIZE,
        }
    }

    /// Override the block geometry
    pub fn with_geometry(mut self, block_divisor: u32, block_multiplier: u32) -> Self {
        self.block_divisor = block_divisor;
        self.block_multiplier = block_multiplier;
        self
    }

    /// Override the flag region size used for range checks
    pub fn with_region_size(mut self, region_size: u64) -> Self {
        self.region_size = region_size;
        self
    }

    pub fn table(&self) -> &FlagOffsetTable {
        &self.table
    }

    pub fn locate(&self, event_id: u64) -> Result<EventFlagAddress, LocateError> {
        locate_within(
            event_id,
            &self.table,
            self.block_divisor,
            self.block_multiplier,
            self.region_size,
        )
    }
}
