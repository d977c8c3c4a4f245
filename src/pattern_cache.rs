use smallvec::SmallVec;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::IndexList;
use crate::MAX_SLOT_LENGTH;

/// The wildcard byte in a pattern.
pub const WILDCARD: u8 = b'_';

/// A fixed-length string over `a-z` and `_`, also used directly as a cache
/// key. Composite keys produced by pruning are concatenations of patterns,
/// so they can be longer than one slot.
pub type Pattern = SmallVec<[u8; MAX_SLOT_LENGTH]>;

/// An all-wildcard pattern of the given length.
#[must_use]
pub fn blank_pattern(length: usize) -> Pattern {
    std::iter::repeat(WILDCARD).take(length).collect()
}

/// Does the word match the pattern? Positionwise: `_` matches anything, a
/// letter must match exactly.
#[inline]
#[must_use]
pub fn matches_pattern(pattern: &[u8], word: &[u8]) -> bool {
    pattern
        .iter()
        .zip(word.iter())
        .all(|(&p, &w)| p == WILDCARD || p == w)
}

/// For the words of a single length, a memo of pattern -> list of matching
/// word indices. Nothing is ever evicted during a search; `clear` is called
/// on restart, when the bucket order changes.
pub struct PatternCache {
    length: usize,
    map: HashMap<Pattern, Rc<IndexList>>,
}

impl PatternCache {
    #[must_use]
    pub fn new(length: usize) -> PatternCache {
        PatternCache {
            length,
            map: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// The list of words in `bucket` matching `pattern`, computed by linear
    /// scan on a miss and memoized. Repeated calls with an identical pattern
    /// return the same list. Callers share the `Rc` and must not mutate the
    /// list.
    pub fn get_matches(&mut self, bucket: &[String], pattern: &Pattern) -> Rc<IndexList> {
        debug_assert_eq!(pattern.len(), self.length);
        if let Some(list) = self.map.get(pattern) {
            return Rc::clone(list);
        }
        let list: Rc<IndexList> = Rc::new(
            bucket
                .iter()
                .enumerate()
                .filter(|(_, word)| matches_pattern(pattern, word.as_bytes()))
                .map(|(id, _)| id)
                .collect(),
        );
        self.map.insert(pattern.clone(), Rc::clone(&list));
        list
    }

    /// Refine a known list by removing the words that match `prune_pattern`.
    ///
    /// The starting point is `base_list` with the scan cursor just past
    /// position `*cursor - 1`. If at least one word is removed, the new list
    /// is installed under the composite key `signature ++ prune_pattern`,
    /// the prune pattern is appended to `signature`, and `*cursor` is
    /// rewritten to the count of surviving words that were at positions
    /// before the old cursor, so the scan resumes at the first untried
    /// survivor. If nothing is removed, `base_list` comes back unchanged and
    /// the signature and cursor are untouched.
    ///
    /// The composite keying makes repeated refinement with the same sequence
    /// of prune patterns hit the cache; the cursor rewrite is a pure function
    /// of `base_list`, so it is applied on hits too.
    pub fn get_matches_prune(
        &mut self,
        bucket: &[String],
        base_list: &Rc<IndexList>,
        cursor: &mut usize,
        signature: &mut Pattern,
        prune_pattern: &Pattern,
    ) -> Rc<IndexList> {
        let mut kept: IndexList = Vec::with_capacity(base_list.len());
        let mut new_cursor = 0;
        let mut removed = false;
        for (pos, &word_id) in base_list.iter().enumerate() {
            if matches_pattern(prune_pattern, bucket[word_id].as_bytes()) {
                removed = true;
                continue;
            }
            kept.push(word_id);
            if pos < *cursor {
                new_cursor = kept.len();
            }
        }
        if !removed {
            return Rc::clone(base_list);
        }

        signature.extend_from_slice(prune_pattern);
        *cursor = new_cursor;

        if let Some(list) = self.map.get(signature) {
            return Rc::clone(list);
        }
        let list = Rc::new(kept);
        self.map.insert(signature.clone(), Rc::clone(&list));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn pattern(s: &str) -> Pattern {
        Pattern::from_slice(s.as_bytes())
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern(b"___", b"cat"));
        assert!(matches_pattern(b"c_t", b"cat"));
        assert!(matches_pattern(b"cat", b"cat"));
        assert!(!matches_pattern(b"c_t", b"car"));
        assert!(!matches_pattern(b"x__", b"cat"));
    }

    #[test]
    fn test_get_matches_and_memoization() {
        let bucket = bucket(&["cat", "cot", "oar", "tan", "tea"]);
        let mut cache = PatternCache::new(3);

        let list = cache.get_matches(&bucket, &pattern("c_t"));
        assert_eq!(*list, vec![0, 1]);

        // The same list object comes back for the same pattern.
        let again = cache.get_matches(&bucket, &pattern("c_t"));
        assert!(Rc::ptr_eq(&list, &again));

        let blank = cache.get_matches(&bucket, &blank_pattern(3));
        assert_eq!(*blank, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_prune_removes_matches_and_rekeys() {
        let bucket = bucket(&["cat", "cot", "car", "oar", "tan"]);
        let mut cache = PatternCache::new(3);

        let signature_start = pattern("___");
        let base = cache.get_matches(&bucket, &signature_start);
        assert_eq!(*base, vec![0, 1, 2, 3, 4]);

        // Cursor sits past "car" (position 2); prune everything matching c_r.
        let mut cursor = 3;
        let mut signature = signature_start.clone();
        let pruned = cache.get_matches_prune(
            &bucket,
            &base,
            &mut cursor,
            &mut signature,
            &pattern("c_r"),
        );
        assert_eq!(*pruned, vec![0, 1, 3, 4]);
        // Two survivors preceded the old cursor, so scanning resumes at "oar".
        assert_eq!(cursor, 2);
        assert_eq!(&signature[..], b"___c_r");

        // Refinement matches the set difference law against a direct lookup.
        let direct = cache.get_matches(&bucket, &pattern("c_r"));
        for id in pruned.iter() {
            assert!(!direct.contains(id));
        }
        assert_eq!(pruned.len() + direct.len(), base.len());
    }

    #[test]
    fn test_prune_without_removals_leaves_state_alone() {
        let bucket = bucket(&["cat", "cot", "tan"]);
        let mut cache = PatternCache::new(3);

        let base = cache.get_matches(&bucket, &blank_pattern(3));
        let mut cursor = 1;
        let mut signature = blank_pattern(3);
        let result = cache.get_matches_prune(
            &bucket,
            &base,
            &mut cursor,
            &mut signature,
            &pattern("xxx"),
        );

        assert!(Rc::ptr_eq(&base, &result));
        assert_eq!(cursor, 1);
        assert_eq!(signature, blank_pattern(3));
    }

    #[test]
    fn test_prune_is_idempotent_over_the_composite_key() {
        let bucket = bucket(&["cat", "cot", "car", "oar"]);
        let mut cache = PatternCache::new(3);

        let base = cache.get_matches(&bucket, &blank_pattern(3));

        let mut cursor_a = 0;
        let mut signature_a = blank_pattern(3);
        let first = cache.get_matches_prune(
            &bucket,
            &base,
            &mut cursor_a,
            &mut signature_a,
            &pattern("c__"),
        );

        let mut cursor_b = 0;
        let mut signature_b = blank_pattern(3);
        let second = cache.get_matches_prune(
            &bucket,
            &base,
            &mut cursor_b,
            &mut signature_b,
            &pattern("c__"),
        );

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(signature_a, signature_b);
    }

    #[test]
    fn test_prune_cursor_when_current_word_is_removed() {
        let bucket = bucket(&["cat", "cot", "oar", "tan"]);
        let mut cache = PatternCache::new(3);

        let base = cache.get_matches(&bucket, &blank_pattern(3));
        // Cursor just past "cot" (position 1), and "cot" itself is pruned.
        let mut cursor = 2;
        let mut signature = blank_pattern(3);
        let pruned = cache.get_matches_prune(
            &bucket,
            &base,
            &mut cursor,
            &mut signature,
            &pattern("co_"),
        );
        assert_eq!(*pruned, vec![0, 2, 3]);
        // Only "cat" survives from before the cursor; "oar" is next to try.
        assert_eq!(cursor, 1);
    }
}
