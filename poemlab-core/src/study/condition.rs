//! Between-subjects condition assignment

use crate::types::{AnthroLevel, Condition, PointOfView};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeds are the unix timestamp reduced into `0..SEED_MODULUS`.
pub const SEED_MODULUS: i64 = 1_000_000;

/// Derive the assignment seed from session creation time.
pub fn seed_from_time(now: DateTime<Utc>) -> u64 {
    now.timestamp().rem_euclid(SEED_MODULUS) as u64
}

/// Draw a condition from `seed`.
///
/// Both factors are drawn uniformly and independently. The same seed always
/// yields the same condition, so a recorded seed reproduces the assignment.
pub fn assign_condition(seed: u64) -> Condition {
    let mut rng = StdRng::seed_from_u64(seed);
    let anthro_level = AnthroLevel::ALL[rng.gen_range(0..AnthroLevel::ALL.len())];
    let pov = PointOfView::ALL[rng.gen_range(0..PointOfView::ALL.len())];
    Condition { anthro_level, pov }
}
