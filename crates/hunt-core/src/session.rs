//! Per-map discovery bookkeeping and score accumulation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::now_unix_millis;
use crate::treasure::{MapId, TreasureId, TreasureMap};

/// One player's progress on one map.
///
/// The discovered set only grows and `total_points` never decreases; the
/// only mutation path is [`GameSession::discover`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: Uuid,
    pub map_id: MapId,
    /// Unix milliseconds.
    pub started_at: u64,
    discovered: BTreeSet<TreasureId>,
    total_points: u32,
    pub is_active: bool,
}

impl GameSession {
    pub fn new(map_id: MapId) -> Self {
        Self::new_at(map_id, now_unix_millis())
    }

    pub fn new_at(map_id: MapId, started_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            map_id,
            started_at,
            discovered: BTreeSet::new(),
            total_points: 0,
            is_active: true,
        }
    }

    /// Rebuild a session from persisted parts. The caller supplies the
    /// accumulated total as stored; it is not recomputed from the map.
    pub fn restore(
        id: Uuid,
        map_id: MapId,
        started_at: u64,
        discovered: impl IntoIterator<Item = TreasureId>,
        total_points: u32,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            map_id,
            started_at,
            discovered: discovered.into_iter().collect(),
            total_points,
            is_active,
        }
    }

    /// Record a discovery. Returns `false`, leaving the session untouched,
    /// when the treasure was already found.
    pub fn discover(&mut self, treasure_id: TreasureId, points: u32) -> bool {
        if self.discovered.contains(&treasure_id) {
            return false;
        }
        self.discovered.insert(treasure_id);
        self.total_points = self.total_points.saturating_add(points);
        true
    }

    pub fn is_discovered(&self, treasure_id: &TreasureId) -> bool {
        self.discovered.contains(treasure_id)
    }

    pub fn discovered(&self) -> &BTreeSet<TreasureId> {
        &self.discovered
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    /// `100 * |discovered ∩ total| / |total|`, or 0 for an empty total.
    pub fn completion_percentage<'a>(
        &self,
        total: impl IntoIterator<Item = &'a TreasureId>,
    ) -> f64 {
        let total: BTreeSet<&TreasureId> = total.into_iter().collect();
        if total.is_empty() {
            return 0.0;
        }
        let found = total.iter().filter(|id| self.discovered.contains(**id)).count();
        100.0 * found as f64 / total.len() as f64
    }

    pub fn is_complete(&self, map: &TreasureMap) -> bool {
        map.treasures.iter().all(|t| self.discovered.contains(&t.id))
    }

    pub fn duration(&self) -> Duration {
        self.duration_at(now_unix_millis())
    }

    /// Elapsed time at `now` (unix ms); zero if `now` precedes the start.
    pub fn duration_at(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.started_at))
    }

    pub fn end(&mut self) {
        self.is_active = false;
    }

    /// Reactivate a reloaded session.
    pub fn resume(&mut self) {
        self.is_active = true;
    }

    /// Start time is not in the future. Points are unsigned, so the
    /// non-negative total holds by construction.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_unix_millis())
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        self.started_at <= now
    }
}
