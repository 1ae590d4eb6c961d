//! Great-circle geodesy on a spherical Earth.
//!
//! Haversine distance agrees with the ellipsoidal distance reported by
//! platform location APIs to well under 1% at game scales (tens of meters
//! to a few kilometers). Every function here is total: invalid input
//! degrades to 0 instead of returning an error or NaN.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::EARTH_RADIUS_M;
use crate::coordinate::Coordinate;

/// Great-circle distance in meters. Returns 0 if either coordinate is invalid.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    if !a.is_valid() || !b.is_valid() {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Initial forward azimuth from `from` to `to`, in degrees [0, 360).
///
/// Returns 0 for (near-)identical points and for invalid input.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    if !from.is_valid() || !to.is_valid() || from.approx_eq(&to) {
        return 0.0;
    }

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Direction of a target relative to the device heading, in degrees [0, 360).
/// 0 means straight ahead, 90 to the right.
pub fn relative_bearing(bearing_deg: f64, heading_deg: f64) -> f64 {
    if !heading_deg.is_finite() {
        return normalize_degrees(bearing_deg);
    }
    normalize_degrees(bearing_deg - heading_deg)
}

/// Fold any finite angle into [0, 360). Non-finite input maps to 0.
pub fn normalize_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let folded = (deg % 360.0 + 360.0) % 360.0;
    if folded >= 360.0 { 0.0 } else { folded }
}

/// Human-readable distance: meters below 1 km, kilometers with one decimal above.
pub fn format_distance(meters: f64) -> String {
    let meters = meters.max(0.0);
    if meters < 1000.0 {
        format!("{meters:.0} m")
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

/// Eight-wind compass rose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassPoint {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl CompassPoint {
    const ROSE: [CompassPoint; 8] = [
        CompassPoint::North,
        CompassPoint::NorthEast,
        CompassPoint::East,
        CompassPoint::SouthEast,
        CompassPoint::South,
        CompassPoint::SouthWest,
        CompassPoint::West,
        CompassPoint::NorthWest,
    ];

    pub fn from_bearing(deg: f64) -> Self {
        let idx = ((normalize_degrees(deg) + 22.5) / 45.0).floor() as usize % 8;
        Self::ROSE[idx]
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            CompassPoint::North => "N",
            CompassPoint::NorthEast => "NE",
            CompassPoint::East => "E",
            CompassPoint::SouthEast => "SE",
            CompassPoint::South => "S",
            CompassPoint::SouthWest => "SW",
            CompassPoint::West => "W",
            CompassPoint::NorthWest => "NW",
        }
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}
