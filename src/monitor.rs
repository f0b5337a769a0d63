//! Save file change monitoring
//!
//! A `StatusMonitor` re-queries one slot on every `poll()` and reports what
//! changed since the previous successful poll. Each poll re-reads the save
//! file from disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ServiceError;
use crate::save::CharacterStats;
use crate::service::{BossStatusResult, BossStatusService};

/// Difference between two consecutive status snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// True for the first successful poll
    pub initial: bool,
    /// True when any flag or stat differs from the previous snapshot
    pub changed: bool,
    /// Ids whose flag became set
    pub newly_set: Vec<String>,
    /// Ids whose flag went from set to clear
    pub newly_cleared: Vec<String>,
    pub deaths_delta: i64,
    pub seconds_played_delta: i64,
    /// Stats of the current snapshot
    pub stats: CharacterStats,
}

impl StatusChange {
    /// Compare `current` against `previous`, treating no previous snapshot as
    /// the initial report
    pub fn between(previous: Option<&BossStatusResult>, current: &BossStatusResult) -> Self {
        let Some(previous) = previous else {
            return Self {
                initial: true,
                changed: true,
                newly_set: current.defeated_ids().map(str::to_string).collect(),
                stats: current.stats,
                ..Self::default()
            };
        };

        let mut newly_set = Vec::new();
        let mut newly_cleared = Vec::new();
        for (id, &set) in &current.boss_statuses {
            let was_set = previous.boss_statuses.get(id).copied().unwrap_or(false);
            match (was_set, set) {
                (false, true) => newly_set.push(id.clone()),
                (true, false) => newly_cleared.push(id.clone()),
                _ => {}
            }
        }

        let deaths_delta = current.stats.deaths - previous.stats.deaths;
        let seconds_played_delta = current.stats.seconds_played - previous.stats.seconds_played;
        let changed = !newly_set.is_empty()
            || !newly_cleared.is_empty()
            || deaths_delta != 0
            || seconds_played_delta != 0;

        Self {
            initial: false,
            changed,
            newly_set,
            newly_cleared,
            deaths_delta,
            seconds_played_delta,
            stats: current.stats,
        }
    }
}

/// Polls one character slot of one save file
#[derive(Debug)]
pub struct StatusMonitor {
    service: BossStatusService,
    save_path: PathBuf,
    slot_index: u32,
    event_ids: BTreeSet<u64>,
    last: Option<BossStatusResult>,
}

impl StatusMonitor {
    pub fn new(
        service: BossStatusService,
        save_path: impl Into<PathBuf>,
        slot_index: u32,
        event_ids: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            service,
            save_path: save_path.into(),
            slot_index,
            event_ids: event_ids.into_iter().collect(),
            last: None,
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn slot_index(&self) -> u32 {
        self.slot_index
    }

    /// Snapshot of the last successful poll
    pub fn last(&self) -> Option<&BossStatusResult> {
        self.last.as_ref()
    }

    /// Re-read the slot and report the difference to the last snapshot
    ///
    /// A failed poll leaves the previous snapshot in place.
    pub fn poll(&mut self) -> Result<StatusChange, ServiceError> {
        let current = self.service.get_full_status(
            &self.save_path,
            self.slot_index,
            self.event_ids.iter().copied(),
        )?;

        let change = StatusChange::between(self.last.as_ref(), &current);
        if change.changed && !change.initial {
            log::info!(
                "Slot {}: {} newly set, {} cleared, deaths {:+}",
                self.slot_index,
                change.newly_set.len(),
                change.newly_cleared.len(),
                change.deaths_delta
            );
        }

        self.last = Some(current);
        Ok(change)
    }
}
