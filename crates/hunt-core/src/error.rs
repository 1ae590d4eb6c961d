//! Domain fault taxonomy.
//!
//! Every per-kind table (severity, recovery action, degradation menu,
//! fallback, user text) is an exhaustive `match` over [`GameError`], so a new
//! kind does not compile until each table has an answer for it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum GameError {
    #[error("location permission denied")]
    LocationPermissionDenied,
    #[error("location service unavailable")]
    LocationServiceUnavailable,
    #[error("map data corrupted")]
    MapDataCorrupted,
    #[error("treasure data missing")]
    TreasureDataMissing,
    #[error("GPS signal weak")]
    GpsSignalWeak,
    #[error("compass unavailable")]
    CompassUnavailable,
    #[error("audio service unavailable")]
    AudioServiceUnavailable,
    #[error("haptic service unavailable")]
    HapticServiceUnavailable,
    #[error("network unavailable")]
    NetworkUnavailable,
    #[error("data corruption: {0}")]
    DataCorruption(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Fieldless identity of a [`GameError`], used as the key for retry
/// counters and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    LocationPermissionDenied,
    LocationServiceUnavailable,
    MapDataCorrupted,
    TreasureDataMissing,
    GpsSignalWeak,
    CompassUnavailable,
    AudioServiceUnavailable,
    HapticServiceUnavailable,
    NetworkUnavailable,
    DataCorruption,
    Unexpected,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::LocationPermissionDenied => "location-permission-denied",
            ErrorCode::LocationServiceUnavailable => "location-service-unavailable",
            ErrorCode::MapDataCorrupted => "map-data-corrupted",
            ErrorCode::TreasureDataMissing => "treasure-data-missing",
            ErrorCode::GpsSignalWeak => "gps-signal-weak",
            ErrorCode::CompassUnavailable => "compass-unavailable",
            ErrorCode::AudioServiceUnavailable => "audio-service-unavailable",
            ErrorCode::HapticServiceUnavailable => "haptic-service-unavailable",
            ErrorCode::NetworkUnavailable => "network-unavailable",
            ErrorCode::DataCorruption => "data-corruption",
            ErrorCode::Unexpected => "unexpected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Minor,
}

/// Automated repair attempted for a recoverable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    ReprobeLocation,
    ReloadMapData,
    ReinitializeAudio,
    ReinitializeHaptics,
    PurgeCorruptedData,
}

impl RecoveryAction {
    /// Built-in timeout when no policy overrides it.
    pub fn default_timeout(self) -> Duration {
        Duration::from_millis(match self {
            RecoveryAction::ReprobeLocation => 2000,
            RecoveryAction::ReloadMapData => 1500,
            RecoveryAction::ReinitializeAudio => 1000,
            RecoveryAction::ReinitializeHaptics => 500,
            RecoveryAction::PurgeCorruptedData => 1500,
        })
    }
}

/// Feature-level fallback the UI can offer while a capability is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DegradationOption {
    DisableDowsingMode,
    ShowSonarModeOnly,
    ShowApproximateDistance,
    ReduceAccuracyRequirement,
    DisableAudioFeedback,
    UseVisualFeedbackOnly,
    DisableHapticFeedback,
    UseAudioFeedbackOnly,
    UseBuiltInMaps,
    SkipMissingTreasures,
    ResetProgress,
    ContinueWithoutSaving,
    ContinueOffline,
    RestartSession,
}

/// Single suggested substitute for the data or behaviour that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackMechanism {
    UseLastKnownLocation,
    UseCachedMapData,
    UseSonarMode,
    UseHapticFeedback,
    UseAudioFeedback,
    UseDefaultData,
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::LocationPermissionDenied => ErrorCode::LocationPermissionDenied,
            GameError::LocationServiceUnavailable => ErrorCode::LocationServiceUnavailable,
            GameError::MapDataCorrupted => ErrorCode::MapDataCorrupted,
            GameError::TreasureDataMissing => ErrorCode::TreasureDataMissing,
            GameError::GpsSignalWeak => ErrorCode::GpsSignalWeak,
            GameError::CompassUnavailable => ErrorCode::CompassUnavailable,
            GameError::AudioServiceUnavailable => ErrorCode::AudioServiceUnavailable,
            GameError::HapticServiceUnavailable => ErrorCode::HapticServiceUnavailable,
            GameError::NetworkUnavailable => ErrorCode::NetworkUnavailable,
            GameError::DataCorruption(_) => ErrorCode::DataCorruption,
            GameError::Unexpected(_) => ErrorCode::Unexpected,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GameError::LocationPermissionDenied
            | GameError::LocationServiceUnavailable
            | GameError::TreasureDataMissing => Severity::Critical,
            GameError::MapDataCorrupted
            | GameError::DataCorruption(_)
            | GameError::Unexpected(_) => Severity::Error,
            GameError::GpsSignalWeak | GameError::CompassUnavailable => Severity::Warning,
            GameError::AudioServiceUnavailable
            | GameError::HapticServiceUnavailable
            | GameError::NetworkUnavailable => Severity::Minor,
        }
    }

    /// The automatic repair for this kind. Kinds without one never retry.
    pub fn recovery_action(&self) -> Option<RecoveryAction> {
        match self {
            GameError::GpsSignalWeak => Some(RecoveryAction::ReprobeLocation),
            GameError::MapDataCorrupted => Some(RecoveryAction::ReloadMapData),
            GameError::AudioServiceUnavailable => Some(RecoveryAction::ReinitializeAudio),
            GameError::HapticServiceUnavailable => Some(RecoveryAction::ReinitializeHaptics),
            GameError::DataCorruption(_) => Some(RecoveryAction::PurgeCorruptedData),
            GameError::LocationPermissionDenied
            | GameError::LocationServiceUnavailable
            | GameError::TreasureDataMissing
            | GameError::CompassUnavailable
            | GameError::NetworkUnavailable
            | GameError::Unexpected(_) => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recovery_action().is_some()
    }

    pub fn degradation_options(&self) -> &'static [DegradationOption] {
        use DegradationOption::*;
        match self {
            GameError::LocationPermissionDenied
            | GameError::LocationServiceUnavailable
            | GameError::TreasureDataMissing => &[],
            GameError::MapDataCorrupted => &[UseBuiltInMaps],
            GameError::GpsSignalWeak => &[ReduceAccuracyRequirement, ShowApproximateDistance],
            GameError::CompassUnavailable => &[DisableDowsingMode, ShowSonarModeOnly],
            GameError::AudioServiceUnavailable => &[DisableAudioFeedback, UseVisualFeedbackOnly],
            GameError::HapticServiceUnavailable => &[DisableHapticFeedback, UseAudioFeedbackOnly],
            GameError::NetworkUnavailable => &[ContinueOffline],
            GameError::DataCorruption(_) => &[ResetProgress, ContinueWithoutSaving],
            GameError::Unexpected(_) => &[RestartSession],
        }
    }

    pub fn fallback_mechanism(&self) -> Option<FallbackMechanism> {
        match self {
            GameError::GpsSignalWeak | GameError::LocationServiceUnavailable => {
                Some(FallbackMechanism::UseLastKnownLocation)
            }
            GameError::MapDataCorrupted | GameError::TreasureDataMissing => {
                Some(FallbackMechanism::UseCachedMapData)
            }
            GameError::CompassUnavailable => Some(FallbackMechanism::UseSonarMode),
            GameError::AudioServiceUnavailable => Some(FallbackMechanism::UseHapticFeedback),
            GameError::HapticServiceUnavailable => Some(FallbackMechanism::UseAudioFeedback),
            GameError::DataCorruption(_) => Some(FallbackMechanism::UseDefaultData),
            GameError::LocationPermissionDenied
            | GameError::NetworkUnavailable
            | GameError::Unexpected(_) => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            GameError::LocationPermissionDenied => "Location Access Needed",
            GameError::LocationServiceUnavailable => "Location Unavailable",
            GameError::MapDataCorrupted => "Map Data Problem",
            GameError::TreasureDataMissing => "Treasure Data Missing",
            GameError::GpsSignalWeak => "Weak GPS Signal",
            GameError::CompassUnavailable => "Compass Unavailable",
            GameError::AudioServiceUnavailable => "Audio Unavailable",
            GameError::HapticServiceUnavailable => "Vibration Unavailable",
            GameError::NetworkUnavailable => "Offline",
            GameError::DataCorruption(_) => "Saved Data Problem",
            GameError::Unexpected(_) => "Something Went Wrong",
        }
    }

    pub fn message(&self) -> String {
        match self {
            GameError::LocationPermissionDenied => {
                "The hunt needs your location to guide you to treasure.".to_string()
            }
            GameError::LocationServiceUnavailable => {
                "Location services are turned off or unavailable on this device.".to_string()
            }
            GameError::MapDataCorrupted => "The treasure map could not be read.".to_string(),
            GameError::TreasureDataMissing => {
                "Some treasures for this map could not be found.".to_string()
            }
            GameError::GpsSignalWeak => {
                "Your position is approximate. Distances may jump around.".to_string()
            }
            GameError::CompassUnavailable => {
                "Direction finding is unavailable; sonar still works.".to_string()
            }
            GameError::AudioServiceUnavailable => "Sound feedback is unavailable.".to_string(),
            GameError::HapticServiceUnavailable => {
                "Vibration feedback is unavailable.".to_string()
            }
            GameError::NetworkUnavailable => {
                "No connection. The hunt works fully offline.".to_string()
            }
            GameError::DataCorruption(detail) => format!("Saved progress is damaged: {detail}"),
            GameError::Unexpected(detail) => format!("Unexpected problem: {detail}"),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GameError::LocationPermissionDenied => "Allow location access in system settings.",
            GameError::LocationServiceUnavailable => "Turn on location services and try again.",
            GameError::MapDataCorrupted => "Try reloading the map or pick a built-in one.",
            GameError::TreasureDataMissing => "Choose another map.",
            GameError::GpsSignalWeak => "Move to an open area away from tall buildings.",
            GameError::CompassUnavailable => "Use sonar mode to follow the signal strength.",
            GameError::AudioServiceUnavailable => "Check the volume or rely on vibration.",
            GameError::HapticServiceUnavailable => "Rely on sound and the visual pulse.",
            GameError::NetworkUnavailable => "No action needed.",
            GameError::DataCorruption(_) => "Reset progress for this map if the problem persists.",
            GameError::Unexpected(_) => "Restart the hunt.",
        }
    }
}

/// Failure reported by a persistence or data collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct PersistenceError(pub String);

impl PersistenceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure of a recovery action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecoveryError {
    #[error("recovery failed: {0}")]
    Failed(String),
    #[error("recovery timed out after {0:?}")]
    TimedOut(Duration),
    #[error("recovery task aborted")]
    Aborted,
    #[error("no async runtime to run recovery")]
    NoRuntime,
}
