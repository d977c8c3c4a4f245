pub mod bar;
pub mod black_square;
pub mod builder;
pub mod context;
pub mod dictionary;
pub mod grid;
pub mod pattern_cache;
pub mod search;
pub mod slot;
pub mod types;

pub const LOG_SEARCH: bool = cfg!(feature = "log_search");
pub const CHECK_INVARIANTS: bool = cfg!(feature = "check_invariants");

/// The maximum length of a single word or slot. Longer words are dropped
/// when the dictionary is loaded; longer slots are a grid-file error.
pub const MAX_SLOT_LENGTH: usize = 28;

/// The expected maximum number of slots appearing in a grid.
pub const MAX_SLOT_COUNT: usize = 512;
