use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

use crate::context::SearchContext;
use crate::pattern_cache::{Pattern, WILDCARD};
use crate::types::{IndexList, SlotId};
use crate::MAX_SLOT_LENGTH;

pub const LETTER_COUNT: usize = 26;

/// A link from a position in one slot to a position in another, meaning the
/// two positions are the same physical grid cell. Links always come in
/// complementary pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub other_slot: SlotId,
    pub other_pos: usize,
}

/// The per-slot state: geometry, crossing links, pattern state, candidate
/// cursor, forward-check masks, and stack bookkeeping. Slots are owned by
/// the `Grid`; links address other slots by index.
pub struct Slot {
    /// Index in the grid's slot arena; unique but otherwise arbitrary.
    pub num: SlotId,
    pub len: usize,
    pub row: usize,
    pub col: usize,
    pub is_across: bool,
    /// e.g. `A(2,0)`
    pub name: String,

    /// At most one link out of each position.
    pub links: SmallVec<[Option<Link>; MAX_SLOT_LENGTH]>,

    /// Letters fixed by the grid author; `_` where unconstrained.
    pub preset_pattern: Pattern,

    /// Current known letters: presets plus letters contributed by crossing
    /// filled slots lower on the stack.
    pub filled_pattern: Pattern,

    pub filled: bool,

    /// Valid iff `filled`.
    pub current_word: Pattern,

    /// Index into `compatible_words` of the next candidate to try.
    pub next_word_index: usize,

    /// Words compatible with `filled_pattern`; `None` iff the slot is fully
    /// determined. The list is shared with the pattern cache and must not be
    /// mutated through this handle.
    pub compatible_words: Option<Rc<IndexList>>,

    /// Position in the filled stack when pushed; -1 otherwise.
    pub stack_level: isize,

    /// The highest stack level whose installed word blocked a candidate here
    /// by the duplicate rule during the current stay; -1 if none.
    pub dup_stack_level: isize,

    /// Positions whose letters were consulted by higher-stack searches while
    /// this slot was filled; consumed by pruning.
    pub ref_by_higher: SmallVec<[bool; MAX_SLOT_LENGTH]>,

    /// `filled_pattern` at the moment this slot was pushed; the base cache
    /// key under which prune refinements are stored.
    pub prune_signature: Pattern,

    /// The grid's solution count when this slot's current word was installed.
    /// Conflict-based pruning only applies to subtrees that yielded nothing.
    pub solutions_at_install: usize,

    // Per position and letter, whether putting that letter there has been
    // checked against the linked slot, and the result. Cleared at the start
    // of each visit to this slot.
    pub usable_letter_checked: [[bool; LETTER_COUNT]; MAX_SLOT_LENGTH],
    pub usable_letter_ok: [[bool; LETTER_COUNT]; MAX_SLOT_LENGTH],
}

impl Slot {
    #[must_use]
    pub fn new(num: SlotId, row: usize, col: usize, is_across: bool) -> Slot {
        Slot {
            num,
            len: 0,
            row,
            col,
            is_across,
            name: String::new(),
            links: SmallVec::new(),
            preset_pattern: Pattern::new(),
            filled_pattern: Pattern::new(),
            filled: false,
            current_word: Pattern::new(),
            next_word_index: 0,
            compatible_words: None,
            stack_level: -1,
            dup_stack_level: -1,
            ref_by_higher: SmallVec::new(),
            prune_signature: Pattern::new(),
            solutions_at_install: 0,
            usable_letter_checked: [[false; LETTER_COUNT]; MAX_SLOT_LENGTH],
            usable_letter_ok: [[false; LETTER_COUNT]; MAX_SLOT_LENGTH],
        }
    }

    /// Extend the slot by one cell, returning the new cell's position.
    pub fn push_cell(&mut self) -> usize {
        let pos = self.len;
        self.len += 1;
        self.links.push(None);
        self.preset_pattern.push(WILDCARD);
        self.filled_pattern.push(WILDCARD);
        self.ref_by_higher.push(false);
        pos
    }

    /// Record a link out of `this_pos`. Linking the same position twice is a
    /// programming fault in the grid builder.
    pub fn add_link(&mut self, this_pos: usize, other_slot: SlotId, other_pos: usize) {
        if self.links[this_pos].is_some() {
            panic!("slot {}, pos {this_pos}: already linked", self.num);
        }
        self.links[this_pos] = Some(Link {
            other_slot,
            other_pos,
        });
    }

    /// Fix a letter at the given position. If a crossing slot covers the same
    /// cell, the builder must preset it there too.
    pub fn preset_char(&mut self, pos: usize, c: u8) {
        self.preset_pattern[pos] = c;
    }

    /// Seal the slot: take the preset pattern as the initial filled pattern,
    /// and either fetch the initial compatible list or, if the presets fully
    /// determine the word, mark the slot filled.
    pub fn prepare(&mut self, ctx: &mut SearchContext) {
        self.name = format!(
            "{}({},{})",
            if self.is_across { 'A' } else { 'D' },
            self.row,
            self.col
        );
        self.filled_pattern = self.preset_pattern.clone();
        if self.filled_pattern.contains(&WILDCARD) {
            self.compatible_words = Some(ctx.get_matches(self.len, &self.filled_pattern));
            self.filled = false;
        } else {
            self.compatible_words = None;
            self.current_word = self.filled_pattern.clone();
            self.filled = true;
        }
        self.next_word_index = 0;
        self.stack_level = -1;
        self.dup_stack_level = -1;
        self.prune_signature = Pattern::new();
        self.solutions_at_install = 0;
        self.clear_ref_marks();
        self.clear_usable_letter_masks();
    }

    pub fn clear_usable_letter_masks(&mut self) {
        self.usable_letter_checked = [[false; LETTER_COUNT]; MAX_SLOT_LENGTH];
        self.usable_letter_ok = [[false; LETTER_COUNT]; MAX_SLOT_LENGTH];
    }

    pub fn clear_ref_marks(&mut self) {
        for mark in &mut self.ref_by_higher {
            *mark = false;
        }
    }

    /// The current word restricted to positions marked `ref_by_higher`, `_`
    /// elsewhere; `None` if no position is marked.
    #[must_use]
    pub fn build_prune_pattern(&self) -> Option<Pattern> {
        let mut found = false;
        let mut pattern = Pattern::new();
        for pos in 0..self.len {
            if self.ref_by_higher[pos] {
                pattern.push(self.current_word[pos]);
                found = true;
            } else {
                pattern.push(WILDCARD);
            }
        }
        found.then_some(pattern)
    }

    /// The letter currently visible at the given position (possibly `_`).
    #[must_use]
    pub fn letter(&self, pos: usize) -> u8 {
        if self.filled {
            self.current_word[pos]
        } else {
            self.filled_pattern[pos]
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("num", &self.num)
            .field("len", &self.len)
            .field("filled", &self.filled)
            .field(
                "filled_pattern",
                &String::from_utf8_lossy(&self.filled_pattern),
            )
            .field(
                "compatible_words",
                &self.compatible_words.as_ref().map(|list| list.len()),
            )
            .field("stack_level", &self.stack_level)
            .finish_non_exhaustive()
    }
}
