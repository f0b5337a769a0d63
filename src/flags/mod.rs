//! Event flag addressing
//!
//! Event flags are single bits inside a slot's flag region. This module
//! turns an event id into a byte offset and bit index within that region.

mod locator;
mod offset_table;

pub use locator::{locate, locate_within, EventFlagAddress, EventFlagLocator, BLOCK_DIVISOR, BLOCK_MULTIPLIER};
pub use offset_table::FlagOffsetTable;
