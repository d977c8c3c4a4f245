use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::rc::Rc;

use crate::dictionary::Dictionary;
use crate::pattern_cache::{Pattern, PatternCache};
use crate::types::IndexList;
use crate::MAX_SLOT_LENGTH;

/// The shared mutable state of one search: the dictionary, the per-length
/// pattern caches, and the RNG used for shuffling. Grid operations receive
/// this explicitly; nothing here is global.
pub struct SearchContext {
    pub dictionary: Dictionary,
    caches: Vec<PatternCache>,
    rng: SmallRng,
}

impl SearchContext {
    #[must_use]
    pub fn new(dictionary: Dictionary, seed: u64) -> SearchContext {
        SearchContext {
            dictionary,
            caches: (0..=MAX_SLOT_LENGTH).map(PatternCache::new).collect(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Cached lookup of the words of the pattern's length matching it.
    pub fn get_matches(&mut self, length: usize, pattern: &Pattern) -> Rc<IndexList> {
        self.caches[length].get_matches(&self.dictionary.words[length], pattern)
    }

    /// Cached refinement of `base_list`; see `PatternCache::get_matches_prune`.
    pub fn get_matches_prune(
        &mut self,
        length: usize,
        base_list: &Rc<IndexList>,
        cursor: &mut usize,
        signature: &mut Pattern,
        prune_pattern: &Pattern,
    ) -> Rc<IndexList> {
        self.caches[length].get_matches_prune(
            &self.dictionary.words[length],
            base_list,
            cursor,
            signature,
            prune_pattern,
        )
    }

    /// Shuffle the dictionary into a new order and drop every cache entry,
    /// which refers to the old order. The restart primitive.
    pub fn reshuffle(&mut self) {
        self.dictionary.shuffle(&mut self.rng);
        for cache in &mut self.caches {
            cache.clear();
        }
    }

    /// Install a reloaded dictionary (after a veto edit). The caller must
    /// restart the grid before searching again; every outstanding word id
    /// and cached list is invalidated here.
    pub fn replace_dictionary(&mut self, dictionary: Dictionary) {
        self.dictionary = dictionary;
        for cache in &mut self.caches {
            cache.clear();
        }
    }
}
