//! Composition layer: one location update in, one tick report out.
//!
//! The orchestrator owns the session and error manager for a single map. It
//! takes `&mut self` per tick, so discovery check and discovery apply can
//! never interleave; hosts that drive it from several tasks wrap it in a
//! [`SharedGame`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::GameConfig;
use crate::coordinate::{Coordinate, LocationFix};
use crate::discovery::{check_discovery, nearest_undiscovered, undiscovered};
use crate::error::GameError;
use crate::feedback::{
    FeedbackIntensity, FeedbackOutput, GameSettings, PulseAnimation, PulseColor, SonarFeedback,
    provide_sonar_feedback, pulse_animation, pulse_color,
};
use crate::geo::{self, CompassPoint};
use crate::resilience::{ErrorContext, ErrorResilienceManager, HandleOutcome, RecoveryReport};
use crate::services::{LocationSource, ProgressStore};
use crate::session::GameSession;
use crate::treasure::{MapId, TreasureId, TreasureMap};

/// A game driven from several tasks. The mutex serializes ticks.
pub type SharedGame = Arc<tokio::sync::Mutex<GameOrchestrator>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TickOutcome {
    /// Guidance toward the nearest undiscovered treasure was produced.
    Tracking,
    /// No position available and nothing to fall back on.
    NoFix,
    /// Every treasure on the map has been found.
    Completed,
    /// The session has ended; updates are ignored.
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryEvent {
    pub treasure_id: TreasureId,
    pub name: String,
    pub points: u32,
    pub total_points: u32,
}

/// Where to go next, and how the device should signal it.
#[derive(Debug, Clone, PartialEq)]
pub struct Guidance {
    pub treasure_id: TreasureId,
    pub treasure_name: String,
    pub distance_m: f64,
    pub bearing_deg: f64,
    pub compass: CompassPoint,
    /// Present only when the fix carried a compass heading (dowsing mode).
    pub relative_bearing_deg: Option<f64>,
    pub intensity: FeedbackIntensity,
    pub pulse: PulseAnimation,
    pub color: PulseColor,
    pub sonar: SonarFeedback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub location: Option<Coordinate>,
    /// The location is the last known one, not a fresh fix.
    pub used_fallback: bool,
    pub discovery: Option<DiscoveryEvent>,
    pub guidance: Option<Guidance>,
    /// Errors routed through the resilience manager during this tick.
    pub errors: Vec<GameError>,
}

impl TickReport {
    fn new(outcome: TickOutcome) -> Self {
        Self {
            outcome,
            location: None,
            used_fallback: false,
            discovery: None,
            guidance: None,
            errors: Vec::new(),
        }
    }
}

/// Point-in-time progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub map_id: MapId,
    pub points: u32,
    pub total_points: u32,
    pub discovered: usize,
    pub total: usize,
    pub completion_percentage: f64,
    pub elapsed: Duration,
    pub is_active: bool,
    pub is_complete: bool,
}

pub struct GameOrchestrator {
    map: TreasureMap,
    session: GameSession,
    settings: GameSettings,
    config: GameConfig,
    store: Box<dyn ProgressStore>,
    output: Box<dyn FeedbackOutput>,
    resilience: ErrorResilienceManager,
    last_known: Option<Coordinate>,
    compass_reported: bool,
}

impl GameOrchestrator {
    /// Resume the stored session for `map`, or start a new one.
    ///
    /// `map` is expected to have passed validation. Store failures while
    /// loading are routed as data corruption and a fresh session is used.
    pub fn start(
        map: TreasureMap,
        mut store: Box<dyn ProgressStore>,
        output: Box<dyn FeedbackOutput>,
        mut resilience: ErrorResilienceManager,
        config: GameConfig,
    ) -> Self {
        let settings = match store.load_settings() {
            Ok(Some(s)) => s,
            Ok(None) => config.settings,
            Err(e) => {
                resilience.report(GameError::DataCorruption(format!("settings load failed: {e}")));
                config.settings
            }
        };

        let session = match store.load(&map.id) {
            Ok(Some(mut s)) if s.is_valid() => {
                s.resume();
                tracing::info!(
                    map = %map.id,
                    points = s.total_points(),
                    found = s.discovered_count(),
                    "resumed session"
                );
                s
            }
            Ok(Some(_)) => {
                resilience.report(GameError::DataCorruption(
                    "stored session starts in the future".to_string(),
                ));
                GameSession::new(map.id.clone())
            }
            Ok(None) => {
                tracing::info!(map = %map.id, "new session");
                GameSession::new(map.id.clone())
            }
            Err(e) => {
                resilience.report(GameError::DataCorruption(format!("session load failed: {e}")));
                GameSession::new(map.id.clone())
            }
        };

        Self {
            map,
            session,
            settings,
            config,
            store,
            output,
            resilience,
            last_known: None,
            compass_reported: false,
        }
    }

    pub fn shared(self) -> SharedGame {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Pull one reading from `source` and process it.
    pub fn tick_from(&mut self, source: &mut dyn LocationSource) -> TickReport {
        let fix = source.current_fix();
        self.tick(fix)
    }

    /// Process one location update.
    pub fn tick(&mut self, fix: Option<LocationFix>) -> TickReport {
        if !self.session.is_active {
            return TickReport::new(TickOutcome::Inactive);
        }

        let mut report = TickReport::new(TickOutcome::Tracking);
        let threshold = self.config.location.weak_signal_accuracy_m;

        let (coordinate, heading) = match fix.filter(|f| f.coordinate.is_valid()) {
            Some(f) => {
                if f.is_degraded(threshold) {
                    let context: ErrorContext = [(
                        "accuracy_m".to_string(),
                        format!("{:.1}", f.horizontal_accuracy_m),
                    )]
                    .into();
                    self.route(GameError::GpsSignalWeak, context, &mut report.errors);
                }
                self.last_known = Some(f.coordinate);
                (f.coordinate, f.heading_deg)
            }
            None => match self.last_known {
                Some(c) => {
                    let context: ErrorContext =
                        [("fallback".to_string(), "lastKnownLocation".to_string())].into();
                    self.route(GameError::GpsSignalWeak, context, &mut report.errors);
                    report.used_fallback = true;
                    (c, None)
                }
                None => {
                    tracing::debug!("no location fix yet");
                    report.outcome = TickOutcome::NoFix;
                    return report;
                }
            },
        };
        report.location = Some(coordinate);

        report.discovery = self.apply_discovery(coordinate, &mut report.errors);

        if self.session.is_complete(&self.map) {
            report.outcome = TickOutcome::Completed;
            return report;
        }

        report.guidance =
            self.guide(coordinate, heading, report.used_fallback, &mut report.errors);
        report
    }

    fn apply_discovery(
        &mut self,
        at: Coordinate,
        errors: &mut Vec<GameError>,
    ) -> Option<DiscoveryEvent> {
        let candidates = undiscovered(&self.map.treasures, self.session.discovered());
        let (id, name, points) =
            check_discovery(at, candidates).map(|t| (t.id.clone(), t.name.clone(), t.points))?;

        if !self.session.discover(id.clone(), points) {
            return None;
        }
        tracing::info!(
            treasure = %id,
            points,
            total = self.session.total_points(),
            "treasure discovered"
        );
        self.persist_session(errors);

        Some(DiscoveryEvent {
            treasure_id: id,
            name,
            points,
            total_points: self.session.total_points(),
        })
    }

    fn guide(
        &mut self,
        from: Coordinate,
        heading: Option<f64>,
        fallback: bool,
        errors: &mut Vec<GameError>,
    ) -> Option<Guidance> {
        let (treasure_id, treasure_name, target, distance_m) =
            nearest_undiscovered(from, &self.map.treasures, self.session.discovered()).map(|r| {
                (
                    r.treasure.id.clone(),
                    r.treasure.name.clone(),
                    r.treasure.coordinate,
                    r.distance_m,
                )
            })?;

        let bearing_deg = geo::bearing(from, target);
        let relative_bearing_deg = heading.map(|h| geo::relative_bearing(bearing_deg, h));
        // A replayed last-known location carries no heading; only a live fix
        // without one says anything about the compass.
        if heading.is_none() && !fallback && !self.compass_reported {
            self.compass_reported = true;
            self.route(GameError::CompassUnavailable, ErrorContext::new(), errors);
        }

        let intensity = FeedbackIntensity::from_distance(distance_m);
        let sonar = provide_sonar_feedback(distance_m, &self.settings, self.output.as_mut());
        if !sonar.audio_ok {
            self.route(GameError::AudioServiceUnavailable, ErrorContext::new(), errors);
        }
        if !sonar.haptics_ok {
            self.route(GameError::HapticServiceUnavailable, ErrorContext::new(), errors);
        }

        tracing::debug!(
            treasure = %treasure_id,
            distance_m,
            bearing_deg,
            intensity = intensity.label(),
            "guidance"
        );

        Some(Guidance {
            treasure_id,
            treasure_name,
            distance_m,
            bearing_deg,
            compass: CompassPoint::from_bearing(bearing_deg),
            relative_bearing_deg,
            intensity,
            pulse: pulse_animation(intensity),
            color: pulse_color(intensity),
            sonar,
        })
    }

    fn route(
        &mut self,
        error: GameError,
        context: ErrorContext,
        errors: &mut Vec<GameError>,
    ) -> HandleOutcome {
        errors.push(error.clone());
        self.resilience.handle(error, context)
    }

    /// Persist the session. A failed write downgrades durability only; the
    /// in-memory session is kept as is.
    fn persist_session(&mut self, errors: &mut Vec<GameError>) {
        if let Err(e) = self.store.save(&self.session) {
            let context: ErrorContext = [("session".to_string(), self.session.id.to_string())].into();
            self.route(
                GameError::DataCorruption(format!("save failed: {e}")),
                context,
                errors,
            );
        }
    }

    /// Replace settings wholesale and persist them.
    pub fn update_settings(&mut self, settings: GameSettings) -> Vec<GameError> {
        self.settings = settings;
        let mut errors = Vec::new();
        if let Err(e) = self.store.save_settings(&self.settings) {
            self.route(
                GameError::DataCorruption(format!("settings save failed: {e}")),
                ErrorContext::new(),
                &mut errors,
            );
        }
        errors
    }

    /// End the session: clear the active flag, persist, and orphan any
    /// in-flight recovery.
    pub fn end_session(&mut self) -> Vec<GameError> {
        let mut errors = Vec::new();
        if !self.session.is_active {
            return errors;
        }
        self.session.end();
        self.resilience.invalidate_pending();
        self.persist_session(&mut errors);
        tracing::info!(map = %self.map.id, points = self.session.total_points(), "session ended");
        errors
    }

    /// Wait for in-flight recoveries and apply their results.
    pub async fn settle_recoveries(&mut self) -> Vec<RecoveryReport> {
        self.resilience.settle().await
    }

    pub fn progress(&self) -> Progress {
        let ids = self.map.treasure_ids();
        // Stored ids the map no longer has do not count.
        let discovered = ids.iter().filter(|id| self.session.is_discovered(id)).count();
        Progress {
            map_id: self.map.id.clone(),
            points: self.session.total_points(),
            total_points: self.map.total_points(),
            discovered,
            total: ids.len(),
            completion_percentage: self.session.completion_percentage(&ids),
            elapsed: self.session.duration(),
            is_active: self.session.is_active,
            is_complete: self.session.is_complete(&self.map),
        }
    }

    pub fn map(&self) -> &TreasureMap {
        &self.map
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn last_known_location(&self) -> Option<Coordinate> {
        self.last_known
    }

    pub fn resilience(&self) -> &ErrorResilienceManager {
        &self.resilience
    }

    pub fn resilience_mut(&mut self) -> &mut ErrorResilienceManager {
        &mut self.resilience
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::{InMemoryProgressStore, RecordingOutput};
    use crate::treasure::fixtures::ueno_map;

    fn fix(lat: f64, lon: f64) -> Option<LocationFix> {
        Some(LocationFix::new(Coordinate::new(lat, lon).unwrap()).with_heading(0.0))
    }

    fn game_with(store: InMemoryProgressStore, output: RecordingOutput) -> GameOrchestrator {
        GameOrchestrator::start(
            ueno_map(),
            Box::new(store),
            Box::new(output),
            ErrorResilienceManager::with_defaults(),
            GameConfig::default(),
        )
    }

    fn game() -> GameOrchestrator {
        game_with(InMemoryProgressStore::default(), RecordingOutput::default())
    }

    #[test]
    fn test_far_tick_gives_weak_guidance() {
        let mut g = game();
        let report = g.tick(fix(35.7148, 139.7753));
        assert_eq!(report.outcome, TickOutcome::Tracking);
        assert!(report.discovery.is_none());
        let guidance = report.guidance.unwrap();
        assert_eq!(guidance.treasure_id.as_str(), "pagoda");
        assert!((guidance.distance_m - 143.0).abs() < 2.0);
        assert_eq!(guidance.intensity, FeedbackIntensity::Weak);
        assert_eq!(guidance.compass, CompassPoint::NorthEast);
        assert!(guidance.relative_bearing_deg.is_some());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_discovery_scores_once() {
        let mut g = game();
        let near = fix(35.71572, 139.77622);

        let first = g.tick(near);
        let event = first.discovery.unwrap();
        assert_eq!(event.treasure_id.as_str(), "pagoda");
        assert_eq!(event.points, 100);
        assert_eq!(g.session().total_points(), 100);

        let second = g.tick(near);
        assert!(second.discovery.is_none());
        assert_eq!(g.session().total_points(), 100);
        // Guidance moves on to the next treasure
        assert_ne!(second.guidance.unwrap().treasure_id.as_str(), "pagoda");
    }

    #[test]
    fn test_no_fix_without_history() {
        let mut g = game();
        let report = g.tick(None);
        assert_eq!(report.outcome, TickOutcome::NoFix);
        assert!(report.location.is_none());
    }

    #[test]
    fn test_missing_fix_falls_back_to_last_known() {
        let mut g = game();
        g.tick(fix(35.7148, 139.7753));
        let report = g.tick(None);
        assert!(report.used_fallback);
        assert_eq!(report.outcome, TickOutcome::Tracking);
        assert_eq!(report.errors, vec![GameError::GpsSignalWeak]);
        assert_eq!(
            report.location,
            Some(Coordinate::new(35.7148, 139.7753).unwrap())
        );
    }

    #[test]
    fn test_degraded_fix_routes_weak_signal_but_is_used() {
        let mut g = game();
        let degraded = Some(
            LocationFix::new(Coordinate::new(35.71572, 139.77622).unwrap())
                .with_accuracy(80.0)
                .with_heading(90.0),
        );
        let report = g.tick(degraded);
        assert!(report.errors.contains(&GameError::GpsSignalWeak));
        assert!(report.discovery.is_some());
        assert_eq!(g.resilience().attempts(ErrorCode::GpsSignalWeak), 1);
    }

    #[test]
    fn test_missing_heading_reports_compass_once() {
        let mut g = game();
        let plain = Some(LocationFix::new(Coordinate::new(35.7148, 139.7753).unwrap()));
        let first = g.tick(plain);
        assert_eq!(first.errors, vec![GameError::CompassUnavailable]);
        assert!(first.guidance.unwrap().relative_bearing_deg.is_none());

        let second = g.tick(plain);
        assert!(second.errors.is_empty());
    }

    #[test]
    fn test_save_failure_keeps_in_memory_progress() {
        let mut store = InMemoryProgressStore::default();
        store.fail_saves = true;
        let mut g = game_with(store, RecordingOutput::default());
        let report = g.tick(fix(35.71572, 139.77622));

        assert!(report.discovery.is_some());
        assert_eq!(g.session().total_points(), 100);
        assert!(matches!(
            report.errors.as_slice(),
            [GameError::DataCorruption(detail)] if detail.starts_with("save failed")
        ));
    }

    #[test]
    fn test_audio_failure_routed() {
        let output = RecordingOutput {
            fail_audio: true,
            ..Default::default()
        };
        let mut g = game_with(InMemoryProgressStore::default(), output);
        let report = g.tick(fix(35.7148, 139.7753));
        assert_eq!(report.errors, vec![GameError::AudioServiceUnavailable]);
        assert!(!report.guidance.unwrap().sonar.success);
    }

    #[test]
    fn test_completion_and_end() {
        let mut g = game();
        let map = ueno_map();
        let mut last = None;
        for t in &map.treasures {
            last = Some(g.tick(fix(t.coordinate.latitude, t.coordinate.longitude)));
        }
        let last = last.unwrap();
        assert_eq!(last.outcome, TickOutcome::Completed);
        assert!(last.guidance.is_none());

        let progress = g.progress();
        assert_eq!(progress.points, 450);
        assert_eq!(progress.completion_percentage, 100.0);

        assert!(g.end_session().is_empty());
        assert_eq!(g.tick(fix(35.0, 139.0)).outcome, TickOutcome::Inactive);
    }

    #[test]
    fn test_resume_existing_session() {
        let mut store = InMemoryProgressStore::default();
        let mut prior = GameSession::new(MapId::new("ueno"));
        prior.discover("pagoda".into(), 100);
        prior.end();
        store.save(&prior).unwrap();

        let g = game_with(store, RecordingOutput::default());
        assert!(g.session().is_active);
        assert_eq!(g.session().id, prior.id);
        assert_eq!(g.session().total_points(), 100);
    }

    #[test]
    fn test_progress_ignores_ids_missing_from_map() {
        let mut store = InMemoryProgressStore::default();
        let stale = GameSession::restore(
            uuid::Uuid::new_v4(),
            MapId::new("ueno"),
            0,
            ["pagoda".into(), "pond".into(), "ghost".into()],
            250,
            true,
        );
        store.save(&stale).unwrap();

        let g = game_with(store, RecordingOutput::default());
        let progress = g.progress();
        assert_eq!(progress.discovered, 2);
        assert_eq!(progress.total, 3);
        assert!(!progress.is_complete);
        assert!((progress.completion_percentage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_session_replaced() {
        let mut store = InMemoryProgressStore::default();
        let future = GameSession::new_at(MapId::new("ueno"), u64::MAX / 2);
        store.save(&future).unwrap();

        let g = game_with(store, RecordingOutput::default());
        assert_ne!(g.session().id, future.id);
        assert!(matches!(
            g.resilience().current_error(),
            Some(GameError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_update_settings_mutes_audio() {
        let mut g = game();
        assert!(g.update_settings(GameSettings::new(false, true, 0.8)).is_empty());
        let report = g.tick(fix(35.7158, 139.77625));
        let sonar = report.guidance.map(|gd| gd.sonar);
        // pagoda is found on this tick, so guidance targets the next one
        assert_eq!(sonar.map(|s| s.volume), Some(0.0));
    }

    #[tokio::test]
    async fn test_shared_game_scores_once_under_concurrency() {
        let shared = game().shared();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = Arc::clone(&shared);
            handles.push(tokio::spawn(async move {
                g.lock().await.tick(fix(35.71572, 139.77622)).discovery.is_some()
            }));
        }
        let mut discoveries = 0;
        for h in handles {
            if h.await.unwrap() {
                discoveries += 1;
            }
        }
        assert_eq!(discoveries, 1);
        assert_eq!(shared.lock().await.session().total_points(), 100);
    }

    #[tokio::test]
    async fn test_end_session_orphans_recovery() {
        let mut g = game();
        let degraded = Some(
            LocationFix::new(Coordinate::new(35.7148, 139.7753).unwrap())
                .with_accuracy(120.0)
                .with_heading(0.0),
        );
        g.tick(degraded);
        g.end_session();
        let reports = g.settle_recoveries().await;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].discarded);
    }
}
