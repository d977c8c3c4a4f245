/// An identifier for a word, based on its index in the `Dictionary`'s bucket
/// for the relevant length.
pub type WordId = usize;

/// An identifier for a slot, based on its index in the `Grid`'s slot arena.
pub type SlotId = usize;

/// An ordered list of `WordId`s -- a subset of one length bucket, in bucket
/// order.
pub type IndexList = Vec<WordId>;
