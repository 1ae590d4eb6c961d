//! Nearest-treasure selection and in-radius discovery testing.
//!
//! Both searches are linear scans in list order and break ties in favour of
//! the earliest candidate, so replays of the same track are reproducible.

use std::collections::BTreeSet;

use crate::coordinate::Coordinate;
use crate::geo;
use crate::treasure::{Treasure, TreasureId};

/// A treasure paired with its distance from the query point.
#[derive(Debug, Clone, Copy)]
pub struct RankedTreasure<'a> {
    pub treasure: &'a Treasure,
    pub distance_m: f64,
}

/// Minimum-distance candidate; first encountered wins a tie.
fn closest<'a>(
    from: Coordinate,
    candidates: impl IntoIterator<Item = &'a Treasure>,
    mut accept: impl FnMut(&Treasure, f64) -> bool,
) -> Option<RankedTreasure<'a>> {
    let mut best: Option<RankedTreasure<'a>> = None;
    for treasure in candidates {
        let d = geo::distance(from, treasure.coordinate);
        if !accept(treasure, d) {
            continue;
        }
        match best {
            Some(b) if d >= b.distance_m => {}
            _ => {
                best = Some(RankedTreasure {
                    treasure,
                    distance_m: d,
                })
            }
        }
    }
    best
}

/// Nearest treasure whose id is not in `discovered`, with its distance.
pub fn nearest_undiscovered<'a>(
    from: Coordinate,
    candidates: impl IntoIterator<Item = &'a Treasure>,
    discovered: &BTreeSet<TreasureId>,
) -> Option<RankedTreasure<'a>> {
    closest(from, candidates, |t, _| !discovered.contains(&t.id))
}

/// Nearest treasure whose id is not in `discovered`.
///
/// Returns `None` for empty or fully discovered input.
pub fn find_nearest_undiscovered<'a>(
    from: Coordinate,
    candidates: impl IntoIterator<Item = &'a Treasure>,
    discovered: &BTreeSet<TreasureId>,
) -> Option<&'a Treasure> {
    nearest_undiscovered(from, candidates, discovered).map(|r| r.treasure)
}

/// Among treasures within their own discovery radius of `at`, the closest.
///
/// The caller filters out already discovered treasures first.
pub fn check_discovery<'a>(
    at: Coordinate,
    candidates: impl IntoIterator<Item = &'a Treasure>,
) -> Option<&'a Treasure> {
    closest(at, candidates, |t, d| d <= t.discovery_radius_m).map(|r| r.treasure)
}

/// Iterator over the treasures not yet in `discovered`, preserving order.
pub fn undiscovered<'a>(
    candidates: &'a [Treasure],
    discovered: &'a BTreeSet<TreasureId>,
) -> impl Iterator<Item = &'a Treasure> + 'a {
    candidates.iter().filter(|t| !discovered.contains(&t.id))
}
