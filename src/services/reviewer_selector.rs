//! Random reviewer selection.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::User;

/// Picks reviewers uniformly at random from a candidate list.
///
/// The generator is shared by all callers; only the shuffle itself runs
/// under the lock.
pub struct ReviewerSelector {
    rng: Mutex<StdRng>,
}

impl ReviewerSelector {
    /// A selector seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A deterministic selector.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Choose up to `count` distinct candidates.
    ///
    /// Returns every candidate (in input order) when there are no more than
    /// `count` of them, and nothing when `candidates` is empty or `count` is 0.
    pub fn select(&self, candidates: &[User], count: usize) -> Vec<User> {
        if candidates.is_empty() || count == 0 {
            return Vec::new();
        }
        if candidates.len() <= count {
            return candidates.to_vec();
        }

        let mut pool = candidates.to_vec();
        let chosen = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pool.partial_shuffle(&mut *rng, count).0
        };
        chosen.to_vec()
    }
}

impl Default for ReviewerSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}
