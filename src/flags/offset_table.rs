//! Block id -> block offset table
//!
//! Event flags are grouped into blocks of 1000 bits. The blocks are not
//! stored in block id order inside a slot, so each block id is mapped to a
//! block offset by a line-oriented resource file (`eventflag_bst.txt`):
//!
//! ```text
//! 0,0
//! 1,1
//! 1045,2231
//! ```

use std::collections::HashMap;
use std::io;
use std::path::Path;

use crate::error::OffsetTableError;

/// Immutable block id -> block offset mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagOffsetTable {
    entries: HashMap<u32, u32>,
    skipped_lines: usize,
}

impl FlagOffsetTable {
    /// Load the table from a file
    ///
    /// A missing or unreadable file is an error; malformed lines are
    /// skipped with a warning.
    pub fn load(path: &Path) -> Result<Self, OffsetTableError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                OffsetTableError::NotFound(path.to_path_buf())
            } else {
                OffsetTableError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let table = Self::parse(&content);
        log::info!(
            "Loaded {} offset table entries from {} ({} lines skipped)",
            table.len(),
            path.display(),
            table.skipped_lines
        );
        Ok(table)
    }

    /// Parse `block_id,block_offset` lines; duplicates keep the last value
    pub fn parse(content: &str) -> Self {
        let mut table = Self::default();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                Some((block_id, block_offset)) => {
                    table.entries.insert(block_id, block_offset);
                }
                None => {
                    log::warn!("Offset table line {}: malformed entry '{}', skipping", index + 1, line);
                    table.skipped_lines += 1;
                }
            }
        }

        table
    }

    /// Build a table from explicit pairs, later pairs overwriting earlier ones
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            skipped_lines: 0,
        }
    }

    /// Offset of a block, if the block is mapped
    pub fn lookup(&self, block_id: u32) -> Option<u32> {
        self.entries.get(&block_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-blank lines that failed to parse
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}

fn parse_line(line: &str) -> Option<(u32, u32)> {
    let (block_id, block_offset) = line.split_once(',')?;
    let block_id = block_id.trim().parse::<u32>().ok()?;
    let block_offset = block_offset.trim().parse::<u32>().ok()?;
    Some((block_id, block_offset))
}
