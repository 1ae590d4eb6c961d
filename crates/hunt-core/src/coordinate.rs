use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FIX_ACCURACY_M, SAME_POINT_TOLERANCE_DEG, WEAK_SIGNAL_ACCURACY_M,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("latitude {0} outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),
}

/// A WGS-84 position in degrees.
///
/// Values are not range-checked when deserialized; map data goes through
/// `TreasureMap::validate` on load, and the geodesy functions degrade to
/// zero for out-of-range input instead of failing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ModelError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ModelError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ModelError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// True when both axes differ by less than the same-point tolerance.
    pub fn approx_eq(&self, other: &Coordinate) -> bool {
        (self.latitude - other.latitude).abs() < SAME_POINT_TOLERANCE_DEG
            && (self.longitude - other.longitude).abs() < SAME_POINT_TOLERANCE_DEG
    }
}

/// A point-in-time reading from the location source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in meters. Negative means the platform
    /// could not determine accuracy.
    #[serde(default = "default_accuracy")]
    pub horizontal_accuracy_m: f64,
    /// True-north heading of the device, when a compass is available.
    #[serde(default)]
    pub heading_deg: Option<f64>,
}

fn default_accuracy() -> f64 {
    DEFAULT_FIX_ACCURACY_M
}

impl LocationFix {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            horizontal_accuracy_m: DEFAULT_FIX_ACCURACY_M,
            heading_deg: None,
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.horizontal_accuracy_m = meters;
        self
    }

    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.heading_deg = Some(degrees);
        self
    }

    pub fn is_degraded(&self, threshold_m: f64) -> bool {
        self.horizontal_accuracy_m < 0.0 || self.horizontal_accuracy_m > threshold_m
    }

    pub fn is_weak_signal(&self) -> bool {
        self.is_degraded(WEAK_SIGNAL_ACCURACY_M)
    }
}
