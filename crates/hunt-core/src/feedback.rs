//! Proximity feedback: distance → intensity band → audio, haptic and visual
//! output parameters.
//!
//! Everything here is pure. The only side effects happen in
//! [`provide_sonar_feedback`], which hands precomputed values to a
//! [`FeedbackOutput`] sink and observes success per channel.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{MEDIUM_BELOW_M, STRONG_BELOW_M, VERY_STRONG_BELOW_M};

/// Feedback strength derived from distance to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackIntensity {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl FeedbackIntensity {
    pub const ALL: [FeedbackIntensity; 4] = [
        FeedbackIntensity::Weak,
        FeedbackIntensity::Medium,
        FeedbackIntensity::Strong,
        FeedbackIntensity::VeryStrong,
    ];

    /// Band a distance in meters. Negative distances count as zero;
    /// NaN counts as out of range (weak).
    pub fn from_distance(meters: f64) -> Self {
        if meters.is_nan() {
            return FeedbackIntensity::Weak;
        }
        let d = meters.max(0.0);
        if d < VERY_STRONG_BELOW_M {
            FeedbackIntensity::VeryStrong
        } else if d < STRONG_BELOW_M {
            FeedbackIntensity::Strong
        } else if d < MEDIUM_BELOW_M {
            FeedbackIntensity::Medium
        } else {
            FeedbackIntensity::Weak
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            FeedbackIntensity::Weak => 0.25,
            FeedbackIntensity::Medium => 0.5,
            FeedbackIntensity::Strong => 0.75,
            FeedbackIntensity::VeryStrong => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeedbackIntensity::Weak => "weak",
            FeedbackIntensity::Medium => "medium",
            FeedbackIntensity::Strong => "strong",
            FeedbackIntensity::VeryStrong => "very strong",
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn deserialize_volume<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    f64::deserialize(d).map(clamp_unit)
}

/// Player output preferences. Replaced wholesale on every change; the
/// volume is clamped to [0, 1] whenever a value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    audio_enabled: bool,
    haptics_enabled: bool,
    #[serde(deserialize_with = "deserialize_volume")]
    audio_volume: f64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            haptics_enabled: true,
            audio_volume: 0.7,
        }
    }
}

impl GameSettings {
    pub fn new(audio_enabled: bool, haptics_enabled: bool, audio_volume: f64) -> Self {
        Self {
            audio_enabled,
            haptics_enabled,
            audio_volume: clamp_unit(audio_volume),
        }
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn haptics_enabled(&self) -> bool {
        self.haptics_enabled
    }

    pub fn audio_volume(&self) -> f64 {
        self.audio_volume
    }

    pub fn with_audio_enabled(self, enabled: bool) -> Self {
        Self::new(enabled, self.haptics_enabled, self.audio_volume)
    }

    pub fn with_haptics_enabled(self, enabled: bool) -> Self {
        Self::new(self.audio_enabled, enabled, self.audio_volume)
    }

    pub fn with_audio_volume(self, volume: f64) -> Self {
        Self::new(self.audio_enabled, self.haptics_enabled, volume)
    }
}

/// Tone volume for `intensity`, 0 when audio is off.
pub fn audio_volume(intensity: FeedbackIntensity, settings: &GameSettings) -> f64 {
    if !settings.audio_enabled {
        return 0.0;
    }
    clamp_unit(settings.audio_volume) * intensity.weight()
}

/// Haptic strength for `intensity`, 0 when haptics are off.
pub fn haptic_intensity(intensity: FeedbackIntensity, settings: &GameSettings) -> f64 {
    if !settings.haptics_enabled {
        return 0.0;
    }
    intensity.weight()
}

/// Radar pulse profile: faster, larger and shorter as the target nears.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseAnimation {
    pub frequency_hz: f64,
    pub amplitude: f64,
    pub duration: Duration,
}

pub fn pulse_animation(intensity: FeedbackIntensity) -> PulseAnimation {
    let (frequency_hz, amplitude, millis) = match intensity {
        FeedbackIntensity::Weak => (0.5, 0.3, 500),
        FeedbackIntensity::Medium => (1.0, 0.5, 400),
        FeedbackIntensity::Strong => (2.0, 0.75, 300),
        FeedbackIntensity::VeryStrong => (4.0, 1.0, 200),
    };
    PulseAnimation {
        frequency_hz,
        amplitude,
        duration: Duration::from_millis(millis),
    }
}

/// RGBA in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

pub fn pulse_color(intensity: FeedbackIntensity) -> PulseColor {
    let (red, green, blue, alpha) = match intensity {
        FeedbackIntensity::Weak => (0.2, 0.4, 1.0, 0.4),
        FeedbackIntensity::Medium => (0.2, 0.8, 0.3, 0.6),
        FeedbackIntensity::Strong => (1.0, 0.6, 0.0, 0.8),
        FeedbackIntensity::VeryStrong => (1.0, 0.1, 0.1, 1.0),
    };
    PulseColor {
        red,
        green,
        blue,
        alpha,
    }
}

/// Host audio/haptic drivers. Each call reports whether the device accepted it.
pub trait FeedbackOutput: Send {
    fn play_tone(&mut self, volume: f64) -> bool;
    fn trigger_haptic(&mut self, strength: f64) -> bool;
}

/// Outcome of one sonar ping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SonarFeedback {
    pub intensity: FeedbackIntensity,
    pub volume: f64,
    pub haptic_strength: f64,
    /// A disabled channel is not invoked and reports `true`.
    pub audio_ok: bool,
    pub haptics_ok: bool,
    pub success: bool,
}

/// Band `distance_m`, then drive the enabled output channels.
pub fn provide_sonar_feedback(
    distance_m: f64,
    settings: &GameSettings,
    output: &mut dyn FeedbackOutput,
) -> SonarFeedback {
    let intensity = FeedbackIntensity::from_distance(distance_m);
    let volume = audio_volume(intensity, settings);
    let haptic_strength = haptic_intensity(intensity, settings);

    let audio_ok = !settings.audio_enabled || output.play_tone(volume);
    let haptics_ok = !settings.haptics_enabled || output.trigger_haptic(haptic_strength);

    if !audio_ok {
        tracing::debug!(volume, "tone playback failed");
    }
    if !haptics_ok {
        tracing::debug!(haptic_strength, "haptic pulse failed");
    }

    SonarFeedback {
        intensity,
        volume,
        haptic_strength,
        audio_ok,
        haptics_ok,
        success: audio_ok && haptics_ok,
    }
}
