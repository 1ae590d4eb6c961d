//! Tunables, loadable from TOML by the host. Every field has a default so a
//! partial (or missing) config file is fine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{ERROR_HISTORY_CAPACITY, MAX_RECOVERY_ATTEMPTS, WEAK_SIGNAL_ACCURACY_M};
use crate::error::RecoveryAction;
use crate::feedback::GameSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub settings: GameSettings,
    pub location: LocationConfig,
    pub resilience: ResiliencePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixes with horizontal accuracy above this are flagged as a weak signal.
    pub weak_signal_accuracy_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            weak_signal_accuracy_m: WEAK_SIGNAL_ACCURACY_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencePolicy {
    pub max_attempts: u32,
    pub history_capacity: usize,
    pub timeouts_ms: RecoveryTimeouts,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECOVERY_ATTEMPTS,
            history_capacity: ERROR_HISTORY_CAPACITY,
            timeouts_ms: RecoveryTimeouts::default(),
        }
    }
}

impl ResiliencePolicy {
    pub fn timeout(&self, action: RecoveryAction) -> Duration {
        let t = &self.timeouts_ms;
        let ms = match action {
            RecoveryAction::ReprobeLocation => t.reprobe_location,
            RecoveryAction::ReloadMapData => t.reload_map_data,
            RecoveryAction::ReinitializeAudio => t.reinitialize_audio,
            RecoveryAction::ReinitializeHaptics => t.reinitialize_haptics,
            RecoveryAction::PurgeCorruptedData => t.purge_corrupted_data,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryTimeouts {
    pub reprobe_location: u64,
    pub reload_map_data: u64,
    pub reinitialize_audio: u64,
    pub reinitialize_haptics: u64,
    pub purge_corrupted_data: u64,
}

impl Default for RecoveryTimeouts {
    fn default() -> Self {
        let ms = |a: RecoveryAction| a.default_timeout().as_millis() as u64;
        Self {
            reprobe_location: ms(RecoveryAction::ReprobeLocation),
            reload_map_data: ms(RecoveryAction::ReloadMapData),
            reinitialize_audio: ms(RecoveryAction::ReinitializeAudio),
            reinitialize_haptics: ms(RecoveryAction::ReinitializeHaptics),
            purge_corrupted_data: ms(RecoveryAction::PurgeCorruptedData),
        }
    }
}
