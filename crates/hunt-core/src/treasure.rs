use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_DISCOVERY_RADIUS_M;
use crate::coordinate::Coordinate;

/// Stable identifier of a treasure within its map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreasureId(pub String);

/// Stable identifier of a treasure map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(TreasureId);
string_id!(MapId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Treasure {
    pub id: TreasureId,
    pub coordinate: Coordinate,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points: u32,
    pub discovery_radius_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Coordinate,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Region {
    /// True when `c` lies inside the span centred on `center`.
    pub fn contains(&self, c: Coordinate) -> bool {
        (c.latitude - self.center.latitude).abs() <= self.latitude_delta / 2.0
            && (c.longitude - self.center.longitude).abs() <= self.longitude_delta / 2.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("map '{map}': region centre is not a valid coordinate")]
    InvalidRegionCenter { map: MapId },
    #[error("map '{map}': region spans must be positive (got {latitude_delta}, {longitude_delta})")]
    InvalidRegionSpan {
        map: MapId,
        latitude_delta: f64,
        longitude_delta: f64,
    },
    #[error("map '{map}' has no treasures")]
    NoTreasures { map: MapId },
    #[error("map '{map}': duplicate treasure id '{treasure}'")]
    DuplicateTreasure { map: MapId, treasure: TreasureId },
    #[error("map '{map}': treasure '{treasure}' has an invalid coordinate")]
    InvalidTreasureCoordinate { map: MapId, treasure: TreasureId },
    #[error("map '{map}': treasure '{treasure}' radius {radius} outside (0, 500]")]
    InvalidRadius {
        map: MapId,
        treasure: TreasureId,
        radius: f64,
    },
    #[error("map '{map}': treasure '{treasure}' must be worth at least one point")]
    ZeroPoints { map: MapId, treasure: TreasureId },
}

/// An immutable hunt area with its ordered treasures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreasureMap {
    pub id: MapId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub region: Region,
    pub treasures: Vec<Treasure>,
    pub difficulty: Difficulty,
}

impl TreasureMap {
    /// Check every load-time invariant. Stops at the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let map = || self.id.clone();

        if !self.region.center.is_valid() {
            return Err(ValidationError::InvalidRegionCenter { map: map() });
        }
        let (lat_d, lon_d) = (self.region.latitude_delta, self.region.longitude_delta);
        if !(lat_d.is_finite() && lon_d.is_finite() && lat_d > 0.0 && lon_d > 0.0) {
            return Err(ValidationError::InvalidRegionSpan {
                map: map(),
                latitude_delta: lat_d,
                longitude_delta: lon_d,
            });
        }
        if self.treasures.is_empty() {
            return Err(ValidationError::NoTreasures { map: map() });
        }

        let mut seen = HashSet::new();
        for t in &self.treasures {
            if !seen.insert(&t.id) {
                return Err(ValidationError::DuplicateTreasure {
                    map: map(),
                    treasure: t.id.clone(),
                });
            }
            if !t.coordinate.is_valid() {
                return Err(ValidationError::InvalidTreasureCoordinate {
                    map: map(),
                    treasure: t.id.clone(),
                });
            }
            let r = t.discovery_radius_m;
            if !(r.is_finite() && r > 0.0 && r <= MAX_DISCOVERY_RADIUS_M) {
                return Err(ValidationError::InvalidRadius {
                    map: map(),
                    treasure: t.id.clone(),
                    radius: r,
                });
            }
            if t.points == 0 {
                return Err(ValidationError::ZeroPoints {
                    map: map(),
                    treasure: t.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Sum of treasure points, saturating like [`GameSession::discover`].
    ///
    /// [`GameSession::discover`]: crate::session::GameSession::discover
    pub fn total_points(&self) -> u32 {
        self.treasures
            .iter()
            .fold(0u32, |acc, t| acc.saturating_add(t.points))
    }

    pub fn treasure(&self, id: &TreasureId) -> Option<&Treasure> {
        self.treasures.iter().find(|t| &t.id == id)
    }

    pub fn treasure_ids(&self) -> Vec<TreasureId> {
        self.treasures.iter().map(|t| t.id.clone()).collect()
    }
}
