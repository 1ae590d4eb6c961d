//! Host-side implementations of the engine's collaborator traits.

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use hunt_core::{
    Coordinate, FeedbackOutput, LocationFix, LocationSource, RecoveryAction, RecoveryError,
    RecoveryHandler, TreasureId, TreasureMap, bearing, distance, nearest_undiscovered,
};

const METERS_PER_DEGREE: f64 = 111_320.0;

/// One recorded fix. `null` entries in a track are dropouts.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

impl TrackPoint {
    fn to_fix(self) -> Option<LocationFix> {
        let coordinate = match Coordinate::new(self.latitude, self.longitude) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("dropping track point: {e}");
                return None;
            }
        };
        let mut fix = LocationFix::new(coordinate);
        if let Some(accuracy) = self.accuracy {
            fix = fix.with_accuracy(accuracy);
        }
        if let Some(heading) = self.heading {
            fix = fix.with_heading(heading);
        }
        Some(fix)
    }
}

/// Replays a recorded track, one entry per read.
pub struct TrackLocationSource {
    fixes: VecDeque<Option<LocationFix>>,
}

impl TrackLocationSource {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let points: Vec<Option<TrackPoint>> =
            serde_json::from_str(json).context("invalid track JSON")?;
        Ok(Self {
            fixes: points
                .into_iter()
                .map(|p| p.and_then(TrackPoint::to_fix))
                .collect(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

impl LocationSource for TrackLocationSource {
    fn current_fix(&mut self) -> Option<LocationFix> {
        self.fixes.pop_front().flatten()
    }
}

/// Seeded pedestrian that walks from the map centre to each treasure in
/// nearest-first order, with GPS jitter, noisy accuracy and the odd dropout.
pub struct SimulatedWalker {
    rng: SmallRng,
    map: TreasureMap,
    position: Coordinate,
    visited: BTreeSet<TreasureId>,
    step_m: f64,
    jitter_m: f64,
    dropout_rate: f64,
}

impl SimulatedWalker {
    pub fn new(map: TreasureMap, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            position: map.region.center,
            map,
            visited: BTreeSet::new(),
            step_m: 12.0,
            jitter_m: 3.0,
            dropout_rate: 0.05,
        }
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    fn advance(&mut self) -> Option<f64> {
        let target = nearest_undiscovered(self.position, &self.map.treasures, &self.visited)
            .map(|r| (r.treasure.id.clone(), r.treasure.coordinate, r.distance_m));
        let (id, coordinate, remaining) = target?;

        let heading = bearing(self.position, coordinate);
        let step = self.step_m.min(remaining);
        let north = step * heading.to_radians().cos() + self.jitter();
        let east = step * heading.to_radians().sin() + self.jitter();
        self.position = offset(self.position, north, east);

        if distance(self.position, coordinate) < self.step_m / 2.0 {
            self.visited.insert(id);
        }
        Some(heading)
    }

    fn jitter(&mut self) -> f64 {
        self.rng.random_range(-self.jitter_m..=self.jitter_m)
    }
}

impl LocationSource for SimulatedWalker {
    fn current_fix(&mut self) -> Option<LocationFix> {
        let heading = self.advance().unwrap_or(0.0);
        if self.rng.random_bool(self.dropout_rate) {
            return None;
        }
        let accuracy = self.rng.random_range(3.0..70.0);
        Some(
            LocationFix::new(self.position)
                .with_accuracy(accuracy)
                .with_heading(heading),
        )
    }
}

fn offset(from: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let lat = from.latitude + north_m / METERS_PER_DEGREE;
    let lon = from.longitude
        + east_m / (METERS_PER_DEGREE * from.latitude.to_radians().cos().max(1e-6));
    Coordinate {
        latitude: lat.clamp(-90.0, 90.0),
        longitude: lon,
    }
}

/// Terminal stand-in for speaker and vibration motor.
#[derive(Debug, Default)]
pub struct ConsoleOutput {
    pub tones: usize,
    pub pulses: usize,
}

impl FeedbackOutput for ConsoleOutput {
    fn play_tone(&mut self, volume: f64) -> bool {
        self.tones += 1;
        tracing::debug!(volume, "ping");
        true
    }

    fn trigger_haptic(&mut self, strength: f64) -> bool {
        self.pulses += 1;
        tracing::debug!(strength, "buzz");
        true
    }
}

/// Recovery for a headless host: the sensors are simulated, so each action
/// succeeds after a short settling delay.
pub struct HostRecovery {
    pub delay: Duration,
}

impl Default for HostRecovery {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(20),
        }
    }
}

#[async_trait]
impl RecoveryHandler for HostRecovery {
    async fn perform(&self, action: RecoveryAction) -> Result<(), RecoveryError> {
        tracing::info!(?action, "running recovery");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
