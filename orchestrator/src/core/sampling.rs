//! Sample selection over an ordered candidate list
//!
//! The sample is always a prefix of the input order (most recently created
//! customers first), so a burst is deterministic for a fixed input once the
//! size is resolved.

use rand::Rng;
use shared::EntityRecord;

use crate::types::SamplePolicy;

/// Resolved sample for one burst
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<'a> {
    pub records: &'a [EntityRecord],
    /// Fraction actually applied, when the policy is fraction based
    pub fraction: Option<f64>,
}

impl Sample<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Number of entities a policy selects out of `candidates`.
///
/// Zero only when there are no candidates; otherwise at least one and at most
/// `candidates`. `rng` is only consulted by `RandomFraction`.
pub fn resolve_size<R: Rng + ?Sized>(policy: &SamplePolicy, candidates: usize, rng: &mut R) -> (usize, Option<f64>) {
    if candidates == 0 {
        return (0, None);
    }

    let (raw, fraction) = match *policy {
        SamplePolicy::FixedCount(k) => (k, None),
        SamplePolicy::Fraction(f) => (fraction_of(candidates, f), Some(f)),
        SamplePolicy::RandomFraction { min, max } => {
            let f = if min >= max { min } else { rng.gen_range(min..=max) };
            (fraction_of(candidates, f), Some(f))
        }
    };

    (raw.clamp(1, candidates), fraction)
}

/// Take the policy's share of `ordered` from the front
pub fn sample<'a, R: Rng + ?Sized>(ordered: &'a [EntityRecord], policy: &SamplePolicy, rng: &mut R) -> Sample<'a> {
    let (size, fraction) = resolve_size(policy, ordered.len(), rng);
    Sample {
        records: &ordered[..size],
        fraction,
    }
}

fn fraction_of(candidates: usize, fraction: f64) -> usize {
    (candidates as f64 * fraction).floor() as usize
}
