use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use unicode_normalization::UnicodeNormalization;

use crate::MAX_SLOT_LENGTH;

/// Given a raw word-list line, turn it into the normalized form used by the
/// fill engine.
#[must_use]
pub fn normalize_word(raw: &str) -> String {
    raw.to_lowercase().nfc().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone)]
pub enum DictionaryError {
    InvalidPath(String),
}

impl fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryError::InvalidPath(path) => {
                write!(f, "Can't read word list: \"{path}\"")
            }
        }
    }
}

/// The currently-loaded word list, bucketed by length. An index into `words`
/// is the length of the words in the bucket, so `words[0]` is always an empty
/// vec. Within one search the buckets are stable -- no reallocation, no
/// reordering -- so `WordId`s held elsewhere stay valid. A restart may
/// re-shuffle them.
pub struct Dictionary {
    /// One bucket per length, `0..=MAX_SLOT_LENGTH`.
    pub words: Vec<Vec<String>>,

    /// Per-length sets of words excluded from loading.
    vetoed: Vec<HashSet<String>>,

    /// Words already present, used to keep bucket entries distinct.
    seen: HashSet<String>,
}

impl Dictionary {
    #[must_use]
    pub fn new() -> Dictionary {
        Dictionary {
            words: (0..=MAX_SLOT_LENGTH).map(|_| vec![]).collect(),
            vetoed: (0..=MAX_SLOT_LENGTH).map(|_| HashSet::new()).collect(),
            seen: HashSet::new(),
        }
    }

    /// Read the veto file and the word list, in that order, so that vetoes
    /// apply to the load.
    pub fn load(
        word_path: &str,
        veto_path: &str,
        reverse_words: bool,
    ) -> Result<Dictionary, DictionaryError> {
        let mut dictionary = Dictionary::new();
        dictionary.read_veto_file(veto_path);
        dictionary.read(word_path, reverse_words)?;
        Ok(dictionary)
    }

    /// Build a dictionary from in-memory words (primarily a test seam).
    pub fn from_words<'a, I: IntoIterator<Item = &'a str>>(words: I) -> Dictionary {
        let mut dictionary = Dictionary::new();
        for word in words {
            dictionary.add_word(word.to_string(), false);
        }
        dictionary
    }

    /// Read one word per line from the given file. Words are lowercased and
    /// NFC-normalized; anything that isn't entirely `a-z` after that is
    /// skipped, as are vetoed words and words longer than `MAX_SLOT_LENGTH`.
    /// File order is preserved. If `reverse_words` is set, each word's
    /// reversal is added as its own entry.
    pub fn read(&mut self, path: &str, reverse_words: bool) -> Result<(), DictionaryError> {
        let contents = fs::read_to_string(path)
            .map_err(|_| DictionaryError::InvalidPath(path.to_string()))?;
        for line in contents.lines() {
            self.add_word(line.to_string(), reverse_words);
        }
        Ok(())
    }

    fn add_word(&mut self, raw: String, reverse_words: bool) {
        let normalized = normalize_word(&raw);
        if normalized.is_empty() || !normalized.bytes().all(|b| b.is_ascii_lowercase()) {
            return;
        }
        let length = normalized.len();
        if length > MAX_SLOT_LENGTH {
            return;
        }
        if self.vetoed[length].contains(&normalized) {
            return;
        }
        let reversed = if reverse_words {
            Some(normalized.chars().rev().collect::<String>())
        } else {
            None
        };
        if self.seen.insert(normalized.clone()) {
            self.words[length].push(normalized);
        }
        if let Some(reversed) = reversed {
            if self.seen.insert(reversed.clone()) {
                self.words[length].push(reversed);
            }
        }
    }

    /// Populate the per-length veto sets from a file in the same format as
    /// the word list. A missing veto file is not an error.
    pub fn read_veto_file(&mut self, path: &str) {
        let Ok(contents) = fs::read_to_string(path) else {
            return;
        };
        for line in contents.lines() {
            let normalized = normalize_word(line);
            let length = normalized.len();
            if length == 0 || length > MAX_SLOT_LENGTH {
                continue;
            }
            self.vetoed[length].insert(normalized);
        }
    }

    /// Permute each length bucket in place. The caller supplies the RNG so
    /// that runs are reproducible for a fixed seed.
    pub fn shuffle(&mut self, rng: &mut SmallRng) {
        for bucket in &mut self.words {
            if bucket.is_empty() {
                continue;
            }
            bucket.shuffle(rng);
        }
    }

    /// Per-length word counts, for reporting.
    #[must_use]
    pub fn counts(&self) -> Vec<(usize, usize)> {
        self.words
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(length, bucket)| (length, bucket.len()))
            .collect()
    }

    #[must_use]
    pub fn word(&self, length: usize, id: usize) -> &str {
        &self.words[length][id]
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Dictionary::new()
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::path::PathBuf;

    #[must_use]
    pub fn resource_path(name: &str) -> String {
        let mut path = PathBuf::from(file!());
        path.pop();
        path.pop();
        path.push("resources");
        path.push(name);
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_buckets_by_length() {
        let dictionary = Dictionary::from_words(["cat", "tea", "mouse", "ox"]);
        assert_eq!(dictionary.words[2], vec!["ox"]);
        assert_eq!(dictionary.words[3], vec!["cat", "tea"]);
        assert_eq!(dictionary.words[5], vec!["mouse"]);
        assert_eq!(dictionary.counts(), vec![(2, 1), (3, 2), (5, 1)]);
    }

    #[test]
    fn test_read_applies_vetoes_and_normalization() {
        let mut dictionary = Dictionary::new();
        dictionary.read_veto_file(&resource_path("vetoes.sample"));
        dictionary
            .read(&resource_path("words.sample"), false)
            .expect("word list should load");

        // "oar" is vetoed; "don't" isn't alphabetic; "CAT" is lowercased.
        assert!(dictionary.words[3].contains(&"cat".to_string()));
        assert!(!dictionary.words[3].contains(&"oar".to_string()));
        assert!(!dictionary.words[4].contains(&"dont".to_string()));
    }

    #[test]
    fn test_missing_veto_file_is_not_fatal() {
        let mut dictionary = Dictionary::new();
        dictionary.read_veto_file("no/such/file");
        dictionary
            .read(&resource_path("words.sample"), false)
            .expect("word list should load");
        assert!(dictionary.words[3].contains(&"oar".to_string()));
    }

    #[test]
    fn test_missing_word_list_is_fatal() {
        let mut dictionary = Dictionary::new();
        assert!(dictionary.read("no/such/file", false).is_err());
    }

    #[test]
    fn test_reverse_words() {
        let dictionary = {
            let mut dictionary = Dictionary::new();
            for word in ["tan", "eye"] {
                dictionary.add_word(word.to_string(), true);
            }
            dictionary
        };
        // "eye" reverses to itself and is kept distinct (i.e., not doubled).
        assert_eq!(dictionary.words[3], vec!["tan", "nat", "eye"]);
    }

    #[test]
    fn test_shuffle_is_deterministic_for_a_fixed_seed() {
        let words = ["cat", "cot", "oar", "tan", "tea", "arc", "act", "are", "ate"];
        let mut first = Dictionary::from_words(words);
        let mut second = Dictionary::from_words(words);

        let mut rng = SmallRng::seed_from_u64(7);
        first.shuffle(&mut rng);
        let mut rng = SmallRng::seed_from_u64(7);
        second.shuffle(&mut rng);

        assert_eq!(first.words[3], second.words[3]);
    }
}
