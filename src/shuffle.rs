//! Shuffle-bag message selection.
//!
//! Each feedback category owns a pool of messages. Picks are drawn from a
//! shuffled copy of the active pool without replacement, so nothing repeats
//! until every message in the pool has been shown once. When the bag runs
//! dry it is refilled with a fresh permutation.
//!
//! Only the active category has a bag. Switching category throws away the
//! unseen remainder of the old bag; the tones are mutually exclusive, so
//! there is nothing to resume.

use std::{collections::HashMap, fs, io, path::Path};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, warn};

use crate::model::FeedbackCategory;

/// Message used when a category's pool file is missing or empty.
pub fn fallback_message(category: FeedbackCategory) -> &'static str {
    match category {
        FeedbackCategory::Positive => "Nice work!",
        FeedbackCategory::Negative => "Try again.",
        FeedbackCategory::Neutral => "",
    }
}

/// Draws messages from per-category pools without back-to-back repetition.
pub struct ShuffleBagSelector<R = StdRng> {
    pools: HashMap<FeedbackCategory, Vec<String>>,
    /// Remaining picks for the active category; the top is the last element.
    bag: Vec<String>,
    active: Option<FeedbackCategory>,
    rng: R,
}

impl ShuffleBagSelector<StdRng> {
    /// Loads `<dir>/<category>.txt` for every category with a pool.
    ///
    /// A pool that cannot be read, or has no non-blank lines, is replaced
    /// by its single fallback message. Never fails.
    pub fn load(dir: &Path) -> Self {
        let pools = FeedbackCategory::WITH_POOLS
            .into_iter()
            .map(|category| (category, load_pool(dir, category)))
            .collect();
        Self::with_rng(pools, StdRng::from_os_rng())
    }
}

impl<R: Rng> ShuffleBagSelector<R> {
    /// Builds a selector from in-memory pools and an explicit RNG.
    ///
    /// Missing or empty pools are filled with the fallback message.
    pub fn with_rng(mut pools: HashMap<FeedbackCategory, Vec<String>>, rng: R) -> Self {
        pools.remove(&FeedbackCategory::Neutral);
        for category in FeedbackCategory::WITH_POOLS {
            let pool = pools.entry(category).or_default();
            if pool.is_empty() {
                pool.push(fallback_message(category).to_string());
            }
        }
        Self {
            pools,
            bag: Vec::new(),
            active: None,
            rng,
        }
    }

    /// The category whose bag is currently being drawn from.
    pub fn active(&self) -> Option<FeedbackCategory> {
        self.active
    }

    /// Number of messages in a category's pool.
    pub fn pool_len(&self, category: FeedbackCategory) -> usize {
        self.pools.get(&category).map_or(0, Vec::len)
    }

    /// Picks the next message for `category`.
    ///
    /// `Neutral` clears the active category and returns `None` without
    /// touching any bag.
    pub fn select(&mut self, category: FeedbackCategory) -> Option<String> {
        if category == FeedbackCategory::Neutral {
            if self.active.take().is_some() {
                debug!("feedback switched to neutral");
            }
            self.bag.clear();
            return None;
        }

        if self.active != Some(category) || self.bag.is_empty() {
            self.refill(category);
        }

        self.bag.pop()
    }

    fn refill(&mut self, category: FeedbackCategory) {
        let mut bag = self.pools.get(&category).cloned().unwrap_or_default();
        fisher_yates(&mut bag, &mut self.rng);
        debug!(%category, size = bag.len(), "refilled feedback bag");
        self.active = Some(category);
        self.bag = bag;
    }
}

/// Unbiased in-place shuffle: walk from the last index down to 1, swapping
/// each slot with a uniform pick at or before it.
fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

fn load_pool(dir: &Path, category: FeedbackCategory) -> Vec<String> {
    let path = dir.join(format!("{category}.txt"));
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let lines: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
            if lines.is_empty() {
                warn!(path = %path.display(), "message pool is empty, using fallback");
            }
            lines
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "message pool not found, using fallback");
            Vec::new()
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read message pool, using fallback");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use tempfile::TempDir;

    fn pools() -> HashMap<FeedbackCategory, Vec<String>> {
        HashMap::from([
            (
                FeedbackCategory::Positive,
                ["great", "superb", "clean", "stylish", "sharp"]
                    .map(String::from)
                    .to_vec(),
            ),
            (
                FeedbackCategory::Negative,
                ["oops", "again", "close one"].map(String::from).to_vec(),
            ),
        ])
    }

    fn selector(seed: u64) -> ShuffleBagSelector {
        ShuffleBagSelector::with_rng(pools(), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn full_cycle_returns_each_member_once() {
        let mut selector = selector(1);
        let pool: HashSet<String> = pools()[&FeedbackCategory::Positive].iter().cloned().collect();

        for _ in 0..20 {
            let cycle: Vec<String> = (0..pool.len())
                .map(|_| selector.select(FeedbackCategory::Positive).unwrap())
                .collect();
            let seen: HashSet<String> = cycle.iter().cloned().collect();
            assert_eq!(seen, pool, "cycle {cycle:?} was not a permutation");
        }
    }

    #[test]
    fn switching_category_discards_remaining_bag() {
        let mut selector = selector(2);
        let first = selector.select(FeedbackCategory::Positive).unwrap();
        assert_eq!(selector.active(), Some(FeedbackCategory::Positive));

        let negative = selector.select(FeedbackCategory::Negative).unwrap();
        assert!(pools()[&FeedbackCategory::Negative].contains(&negative));

        // Back to positive: a fresh bag of the full pool, so a whole cycle
        // is available again and may include the first pick.
        let cycle: HashSet<String> = (0..5)
            .map(|_| selector.select(FeedbackCategory::Positive).unwrap())
            .collect();
        assert_eq!(cycle.len(), 5);
        assert!(cycle.contains(&first));
    }

    #[test]
    fn neutral_yields_nothing_and_consumes_nothing() {
        let mut selector = selector(3);
        assert_eq!(selector.select(FeedbackCategory::Neutral), None);
        assert_eq!(selector.active(), None);

        selector.select(FeedbackCategory::Negative).unwrap();
        assert_eq!(selector.select(FeedbackCategory::Neutral), None);
        assert_eq!(selector.active(), None);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = selector(9);
        let mut b = selector(9);
        for _ in 0..12 {
            assert_eq!(
                a.select(FeedbackCategory::Positive),
                b.select(FeedbackCategory::Positive)
            );
        }
    }

    #[test]
    fn empty_pool_uses_fallback() {
        let mut selector = ShuffleBagSelector::with_rng(HashMap::new(), StdRng::seed_from_u64(0));
        assert_eq!(selector.pool_len(FeedbackCategory::Positive), 1);
        assert_eq!(
            selector.select(FeedbackCategory::Negative).as_deref(),
            Some(fallback_message(FeedbackCategory::Negative))
        );
        // A singleton pool simply repeats.
        assert_eq!(
            selector.select(FeedbackCategory::Negative).as_deref(),
            Some(fallback_message(FeedbackCategory::Negative))
        );
    }

    #[test]
    fn load_reads_pools_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("positive.txt"), "one\n\n  two  \nthree\n").unwrap();

        let mut selector = ShuffleBagSelector::load(dir.path());
        assert_eq!(selector.pool_len(FeedbackCategory::Positive), 3);

        let drawn: HashSet<String> = (0..3)
            .map(|_| selector.select(FeedbackCategory::Positive).unwrap())
            .collect();
        assert_eq!(drawn, HashSet::from(["one", "two", "three"].map(String::from)));

        // negative.txt is missing.
        assert_eq!(selector.pool_len(FeedbackCategory::Negative), 1);
    }

    #[test]
    fn fisher_yates_keeps_every_element() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut items: Vec<u32> = (0..50).collect();
        fisher_yates(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
