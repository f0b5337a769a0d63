//! Boss status queries
//!
//! `BossStatusService` is the entry point for callers: given a save path, a
//! slot and a set of event ids it returns which flags are set plus the
//! character's stats. Every call re-opens the save file; nothing read from
//! the container is cached between calls.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::TrackerConfig;
use crate::error::ServiceError;
use crate::flags::{EventFlagAddress, EventFlagLocator, FlagOffsetTable};
use crate::save::{
    CharacterCatalog, CharacterLayout, CharacterRecord, CharacterStats, CharacterSummary,
    ContainerLayout, SaveContainer,
};

/// Canonical string key of an event id
pub fn event_key(event_id: u64) -> String {
    event_id.to_string()
}

/// Parse an event id given as a decimal string, tolerating surrounding whitespace
pub fn parse_event_id(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Input of a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BossStatusQuery {
    pub save_path: PathBuf,
    pub slot_index: u32,
    pub event_ids: BTreeSet<u64>,
}

impl BossStatusQuery {
    pub fn new(save_path: impl Into<PathBuf>, slot_index: u32, event_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            save_path: save_path.into(),
            slot_index,
            event_ids: event_ids.into_iter().collect(),
        }
    }
}

/// Result of a status query
///
/// An event id missing from `boss_statuses` has unknown status, which is
/// distinct from `false` (flag read and clear).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BossStatusResult {
    pub stats: CharacterStats,
    pub boss_statuses: BTreeMap<String, bool>,
}

impl BossStatusResult {
    /// Status of one event id, `None` when unknown
    pub fn status(&self, event_id: u64) -> Option<bool> {
        self.boss_statuses.get(&event_key(event_id)).copied()
    }

    /// Ids whose flag is set
    pub fn defeated_ids(&self) -> impl Iterator<Item = &str> {
        self.boss_statuses
            .iter()
            .filter(|(_, set)| **set)
            .map(|(id, _)| id.as_str())
    }
}

/// Orchestrates flag location, container reads and stat extraction
#[derive(Debug, Clone)]
pub struct BossStatusService {
    locator: EventFlagLocator,
    layout: ContainerLayout,
    character: CharacterLayout,
}

impl BossStatusService {
    /// Build a service around an already loaded offset table
    pub fn new(table: Arc<FlagOffsetTable>, config: &TrackerConfig) -> Self {
        let locator = EventFlagLocator::new(table)
            .with_geometry(config.flags.block_divisor, config.flags.block_multiplier)
            .with_region_size(config.container.flag_region_max_size);

        Self {
            locator,
            layout: config.container,
            character: config.character,
        }
    }

    /// Load the offset table named by the configuration and build a service
    pub fn from_config(config: &TrackerConfig) -> Result<Self, ServiceError> {
        let table = FlagOffsetTable::load(&config.offset_table_path)?;
        Ok(Self::new(Arc::new(table), config))
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    pub fn locator(&self) -> &EventFlagLocator {
        &self.locator
    }

    /// Run a query
    pub fn query(&self, query: &BossStatusQuery) -> Result<BossStatusResult, ServiceError> {
        self.get_full_status(&query.save_path, query.slot_index, query.event_ids.iter().copied())
    }

    /// Read flag statuses for `event_ids` and the character stats of a slot
    pub fn get_full_status(
        &self,
        path: &Path,
        slot_index: u32,
        event_ids: impl IntoIterator<Item = u64>,
    ) -> Result<BossStatusResult, ServiceError> {
        self.check_slot(slot_index)?;
        let container = SaveContainer::open(path, self.layout)?;
        self.full_status_from(&container, slot_index, event_ids)
    }

    /// Same as `get_full_status`, against an opened container
    pub fn full_status_from<R: Read + Seek>(
        &self,
        container: &SaveContainer<R>,
        slot_index: u32,
        event_ids: impl IntoIterator<Item = u64>,
    ) -> Result<BossStatusResult, ServiceError> {
        self.check_slot(slot_index)?;

        let unique: BTreeSet<u64> = event_ids.into_iter().collect();
        let (ids, addresses) = self.locate_all(&unique);
        let states = container.flag_states(slot_index, &addresses)?;

        let boss_statuses: BTreeMap<String, bool> = ids
            .into_iter()
            .zip(states)
            .map(|(id, set)| (event_key(id), set))
            .collect();

        let stats = self.stats_from(container, slot_index)?;

        log::debug!(
            "Slot {}: {} of {} event ids resolved, {} set",
            slot_index,
            boss_statuses.len(),
            unique.len(),
            boss_statuses.values().filter(|&&set| set).count()
        );

        Ok(BossStatusResult {
            stats,
            boss_statuses,
        })
    }

    /// Status of a single flag, `None` when the id cannot be located
    pub fn is_event_flag_set(
        &self,
        path: &Path,
        slot_index: u32,
        event_id: u64,
    ) -> Result<Option<bool>, ServiceError> {
        self.check_slot(slot_index)?;

        let address = match self.locator.locate(event_id) {
            Ok(address) => address,
            Err(e) => {
                log::debug!("Event {}: {}", event_id, e);
                return Ok(None);
            }
        };

        let container = SaveContainer::open(path, self.layout)?;
        Ok(Some(container.is_flag_set(slot_index, address)?))
    }

    /// Stats of one slot
    pub fn read_stats(&self, path: &Path, slot_index: u32) -> Result<CharacterStats, ServiceError> {
        self.check_slot(slot_index)?;
        let container = SaveContainer::open(path, self.layout)?;
        self.stats_from(&container, slot_index)
    }

    /// Occupied character slots of a save file
    pub fn list_characters(&self, path: &Path) -> Result<Vec<CharacterSummary>, ServiceError> {
        Ok(self.catalog().list_characters(path)?)
    }

    pub fn catalog(&self) -> CharacterCatalog {
        CharacterCatalog::new(self.layout, self.character)
    }

    fn check_slot(&self, slot_index: u32) -> Result<(), ServiceError> {
        if slot_index < self.layout.slot_count {
            Ok(())
        } else {
            Err(ServiceError::InvalidSlot {
                slot: slot_index,
                slot_count: self.layout.slot_count,
            })
        }
    }

    fn locate_all(&self, event_ids: &BTreeSet<u64>) -> (Vec<u64>, Vec<EventFlagAddress>) {
        let mut ids = Vec::with_capacity(event_ids.len());
        let mut addresses = Vec::with_capacity(event_ids.len());

        for &event_id in event_ids {
            match self.locator.locate(event_id) {
                Ok(address) => {
                    ids.push(event_id);
                    addresses.push(address);
                }
                Err(e) => log::debug!("Event {}: {}, status unknown", event_id, e),
            }
        }

        (ids, addresses)
    }

    fn stats_from<R: Read + Seek>(
        &self,
        container: &SaveContainer<R>,
        slot_index: u32,
    ) -> Result<CharacterStats, ServiceError> {
        let block = container.read_character_block(slot_index, &self.character)?;
        let record = CharacterRecord::decode(slot_index, &block, &self.character).map_err(|source| {
            ServiceError::Decode {
                slot: slot_index,
                source,
            }
        })?;
        Ok(record.stats())
    }
}
