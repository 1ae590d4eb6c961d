//! Narrow collaborator contracts consumed by the engine, each with an
//! in-memory implementation for tests and headless hosts.

use std::collections::{HashMap, VecDeque};

use crate::coordinate::LocationFix;
use crate::error::{GameError, PersistenceError};
use crate::feedback::{FeedbackOutput, GameSettings};
use crate::session::GameSession;
use crate::treasure::{MapId, TreasureMap};

/// Source of position fixes. The engine only consumes point-in-time readings.
pub trait LocationSource: Send {
    /// Best-known fix, or `None` when no position is available.
    fn current_fix(&mut self) -> Option<LocationFix>;
}

/// Durable session and settings storage.
pub trait ProgressStore: Send {
    fn save(&mut self, session: &GameSession) -> Result<(), PersistenceError>;
    fn load(&mut self, map_id: &MapId) -> Result<Option<GameSession>, PersistenceError>;
    fn clear(&mut self) -> Result<(), PersistenceError>;
    fn save_settings(&mut self, settings: &GameSettings) -> Result<(), PersistenceError>;
    fn load_settings(&mut self) -> Result<Option<GameSettings>, PersistenceError>;
}

/// Catalog of treasure maps.
pub trait MapSource {
    fn all_maps(&self) -> Result<Vec<TreasureMap>, PersistenceError>;
}

/// Fetch every map and validate it. Any failure surfaces as
/// [`GameError::MapDataCorrupted`]; the detail is logged.
pub fn load_validated_maps(source: &dyn MapSource) -> Result<Vec<TreasureMap>, GameError> {
    let maps = source.all_maps().map_err(|e| {
        tracing::warn!("map source failed: {e}");
        GameError::MapDataCorrupted
    })?;
    for map in &maps {
        if let Err(e) = map.validate() {
            tracing::warn!("rejecting map data: {e}");
            return Err(GameError::MapDataCorrupted);
        }
    }
    tracing::debug!(count = maps.len(), "maps loaded");
    Ok(maps)
}

/// Replays a fixed sequence of readings, then reports no fix.
#[derive(Debug, Default, Clone)]
pub struct ScriptedLocationSource {
    fixes: VecDeque<Option<LocationFix>>,
}

impl ScriptedLocationSource {
    pub fn new(fixes: impl IntoIterator<Item = Option<LocationFix>>) -> Self {
        Self {
            fixes: fixes.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

impl LocationSource for ScriptedLocationSource {
    fn current_fix(&mut self) -> Option<LocationFix> {
        self.fixes.pop_front().flatten()
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryProgressStore {
    sessions: HashMap<MapId, GameSession>,
    settings: Option<GameSettings>,
    /// Make `save` fail, to exercise the durability-downgrade path.
    pub fail_saves: bool,
    pub save_count: usize,
}

impl InMemoryProgressStore {
    pub fn session(&self, map_id: &MapId) -> Option<&GameSession> {
        self.sessions.get(map_id)
    }
}

impl ProgressStore for InMemoryProgressStore {
    fn save(&mut self, session: &GameSession) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::new("disk full"));
        }
        self.save_count += 1;
        self.sessions.insert(session.map_id.clone(), session.clone());
        Ok(())
    }

    fn load(&mut self, map_id: &MapId) -> Result<Option<GameSession>, PersistenceError> {
        Ok(self.sessions.get(map_id).cloned())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        self.sessions.clear();
        Ok(())
    }

    fn save_settings(&mut self, settings: &GameSettings) -> Result<(), PersistenceError> {
        self.settings = Some(*settings);
        Ok(())
    }

    fn load_settings(&mut self) -> Result<Option<GameSettings>, PersistenceError> {
        Ok(self.settings)
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticMapSource(pub Vec<TreasureMap>);

impl MapSource for StaticMapSource {
    fn all_maps(&self) -> Result<Vec<TreasureMap>, PersistenceError> {
        Ok(self.0.clone())
    }
}

/// Records every output call; either channel can be told to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingOutput {
    pub tones: Vec<f64>,
    pub haptics: Vec<f64>,
    pub fail_audio: bool,
    pub fail_haptics: bool,
}

impl FeedbackOutput for RecordingOutput {
    fn play_tone(&mut self, volume: f64) -> bool {
        if self.fail_audio {
            return false;
        }
        self.tones.push(volume);
        true
    }

    fn trigger_haptic(&mut self, strength: f64) -> bool {
        if self.fail_haptics {
            return false;
        }
        self.haptics.push(strength);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Coordinate;
    use crate::treasure::fixtures::ueno_map;

    struct BrokenSource;

    impl MapSource for BrokenSource {
        fn all_maps(&self) -> Result<Vec<TreasureMap>, PersistenceError> {
            Err(PersistenceError::new("unreadable"))
        }
    }

    #[test]
    fn test_load_validated_maps_ok() {
        let maps = load_validated_maps(&StaticMapSource(vec![ueno_map()])).unwrap();
        assert_eq!(maps.len(), 1);
    }

    #[test]
    fn test_invalid_map_is_corrupted() {
        let mut bad = ueno_map();
        bad.treasures[0].discovery_radius_m = 900.0;
        let err = load_validated_maps(&StaticMapSource(vec![ueno_map(), bad])).unwrap_err();
        assert_eq!(err, GameError::MapDataCorrupted);
    }

    #[test]
    fn test_source_failure_is_corrupted() {
        assert_eq!(
            load_validated_maps(&BrokenSource).unwrap_err(),
            GameError::MapDataCorrupted
        );
    }

    #[test]
    fn test_scripted_source_drains() {
        let fix = LocationFix::new(Coordinate::new(1.0, 2.0).unwrap());
        let mut src = ScriptedLocationSource::new([Some(fix), None]);
        assert_eq!(src.current_fix(), Some(fix));
        assert_eq!(src.current_fix(), None);
        assert_eq!(src.remaining(), 0);
        assert_eq!(src.current_fix(), None);
    }

    #[test]
    fn test_in_memory_store_roundtrip() {
        let mut store = InMemoryProgressStore::default();
        let mut session = GameSession::new(MapId::new("ueno"));
        session.discover("pagoda".into(), 100);
        store.save(&session).unwrap();

        let loaded = store.load(&MapId::new("ueno")).unwrap().unwrap();
        assert_eq!(loaded.total_points(), 100);
        assert!(store.load(&MapId::new("other")).unwrap().is_none());

        store.clear().unwrap();
        assert!(store.load(&MapId::new("ueno")).unwrap().is_none());
    }

    #[test]
    fn test_in_memory_store_failure_flag() {
        let mut store = InMemoryProgressStore {
            fail_saves: true,
            ..Default::default()
        };
        assert!(store.save(&GameSession::new(MapId::new("m"))).is_err());
        assert_eq!(store.save_count, 0);
    }
}
