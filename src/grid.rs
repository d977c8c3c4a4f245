use std::fmt::Write as _;

use crate::context::SearchContext;
use crate::pattern_cache::{matches_pattern, Pattern, WILDCARD};
use crate::search::SearchOptions;
use crate::slot::{Link, Slot};
use crate::types::SlotId;
use crate::LOG_SEARCH;

/// The slot registry, the filled-slot stack, and the search driver.
///
/// Fill algorithm sketch: at any point there is a stack of filled slots.
/// Every slot's `filled_pattern` reflects the letters of crossing filled
/// slots, and every unfilled slot's `compatible_words` matches its pattern.
/// `push_next_slot` picks the unfilled slot with the fewest compatible words
/// and scans for a usable one (one that leaves every crossing unfilled slot
/// with at least one compatible word). On success the slot is pushed and the
/// word's letters propagate; on failure `backtrack` rolls the stack back,
/// trying later words and popping slots that are out of options.
pub struct Grid {
    pub slots: Vec<Slot>,
    pub filled_stack: Vec<SlotId>,

    /// Slots fully determined by presets; filled but never on the stack.
    pub npreset_slots: usize,

    /// Total number of word installations, for performance reporting.
    pub nsteps: u64,

    /// Solutions accepted so far (across restarts).
    pub nsolutions: usize,
}

impl Grid {
    #[must_use]
    pub fn new() -> Grid {
        Grid {
            slots: vec![],
            filled_stack: vec![],
            npreset_slots: 0,
            nsteps: 0,
            nsolutions: 0,
        }
    }

    /// Register a new empty slot; the builder grows it with `push_cell`.
    pub fn add_slot(&mut self, row: usize, col: usize, is_across: bool) -> SlotId {
        let id = self.slots.len();
        self.slots.push(Slot::new(id, row, col, is_across));
        id
    }

    /// Link two positions representing the same physical cell, in both
    /// directions.
    pub fn add_link(&mut self, slot1: SlotId, pos1: usize, slot2: SlotId, pos2: usize) {
        self.slots[slot1].add_link(pos1, slot2, pos2);
        self.slots[slot2].add_link(pos2, slot1, pos1);
    }

    /// Seal the grid after slots, presets, and links have been added.
    pub fn prepare(&mut self, ctx: &mut SearchContext) {
        self.npreset_slots = 0;
        for slot in &mut self.slots {
            slot.prepare(ctx);
            if slot.filled {
                self.npreset_slots += 1;
            }
        }
    }

    /// Reset every slot to its preset state, clear the stack, re-shuffle the
    /// dictionary, drop the pattern caches, and re-seal the grid.
    pub fn restart(&mut self, ctx: &mut SearchContext) {
        for slot in &mut self.slots {
            slot.filled = false;
            slot.compatible_words = None;
            slot.filled_pattern = slot.preset_pattern.clone();
        }
        self.filled_stack.clear();
        ctx.reshuffle();
        self.prepare(ctx);
    }

    /// Are all slots accounted for (stacked or preset)?
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.filled_stack.len() + self.npreset_slots == self.slots.len()
    }

    /// Do the stacked slots all hold distinct words? Preset slots are the
    /// grid author's business and are not checked.
    #[must_use]
    pub fn stack_words_distinct(&self) -> bool {
        for i in 0..self.filled_stack.len() {
            for j in (i + 1)..self.filled_stack.len() {
                let a = &self.slots[self.filled_stack[i]];
                let b = &self.slots[self.filled_stack[j]];
                if a.current_word == b.current_word {
                    return false;
                }
            }
        }
        true
    }

    /// Among unfilled slots, pick the one with the smallest compatible list
    /// (ties broken by registration order) and try to fill it. On success
    /// the slot is pushed and its word installed.
    pub fn push_next_slot(&mut self, ctx: &mut SearchContext, opts: &SearchOptions) -> bool {
        let mut best: Option<SlotId> = None;
        let mut nbest = usize::MAX;
        for (id, slot) in self.slots.iter().enumerate() {
            if slot.filled {
                continue;
            }
            let n = slot
                .compatible_words
                .as_ref()
                .expect("unfilled slot without compatible list")
                .len();
            if n < nbest {
                nbest = n;
                best = Some(id);
            }
        }
        let best = best.expect("push_next_slot: no unfilled slot");
        if LOG_SEARCH {
            eprintln!(
                "push_next_slot: slot {} ({} compatible words)",
                self.slots[best].name, nbest
            );
        }

        if opts.prune {
            // Record that the chosen slot's search is constrained by the
            // letters its filled partners have already contributed.
            for pos in 0..self.slots[best].len {
                let Some(link) = self.slots[best].links[pos] else {
                    continue;
                };
                if self.slots[link.other_slot].filled {
                    self.slots[link.other_slot].ref_by_higher[link.other_pos] = true;
                }
            }
        }

        self.slots[best].clear_ref_marks();
        self.slots[best].dup_stack_level = -1;
        self.slots[best].next_word_index = 0;
        if !self.find_next_usable_word(best, ctx, opts) {
            if LOG_SEARCH {
                eprintln!("push_next_slot: slot {} has no usable words", self.slots[best].name);
            }
            return false;
        }

        let slot = &mut self.slots[best];
        slot.filled = true;
        slot.stack_level = self.filled_stack.len() as isize;
        slot.prune_signature = slot.filled_pattern.clone();
        if crate::CHECK_INVARIANTS {
            assert!(
                !self.filled_stack.contains(&best),
                "slot {best} is already on the filled stack"
            );
        }
        self.filled_stack.push(best);
        self.install_word(best, ctx, opts);
        true
    }

    /// Scan forward through the compatible list from `next_word_index` for a
    /// word that passes the per-letter forward check and (unless dups are
    /// allowed) isn't already on the stack. On success the word is copied to
    /// `current_word` and the cursor is left just past it.
    pub fn find_next_usable_word(
        &mut self,
        id: SlotId,
        ctx: &SearchContext,
        opts: &SearchOptions,
    ) -> bool {
        let Some(compatible) = self.slots[id].compatible_words.clone() else {
            return false;
        };
        if self.slots[id].next_word_index == 0 {
            self.slots[id].clear_usable_letter_masks();
        }
        let len = self.slots[id].len;

        while self.slots[id].next_word_index < compatible.len() {
            let word_id = compatible[self.slots[id].next_word_index];
            self.slots[id].next_word_index += 1;
            let word = ctx.dictionary.words[len][word_id].as_bytes();

            let mut usable = true;
            for pos in 0..len {
                if self.slots[id].links[pos].is_none() {
                    continue;
                }
                if self.slots[id].filled_pattern[pos] != WILDCARD {
                    continue;
                }
                let c = word[pos];
                let nc = (c - b'a') as usize;
                debug_assert!(nc < crate::slot::LETTER_COUNT);
                if !self.slots[id].usable_letter_checked[pos][nc] {
                    self.slots[id].usable_letter_checked[pos][nc] = true;
                    let ok = self.letter_compatible(id, pos, c, ctx, opts);
                    self.slots[id].usable_letter_ok[pos][nc] = ok;
                }
                if !self.slots[id].usable_letter_ok[pos][nc] {
                    usable = false;
                    break;
                }
            }

            if usable && !opts.allow_dups {
                for stack_index in 0..self.filled_stack.len() {
                    let other = self.filled_stack[stack_index];
                    if self.slots[other].current_word[..] == *word {
                        usable = false;
                        // Keep the highest blocking level seen this stay, so
                        // a backjump can never skip past a slot whose word
                        // blocked one of our candidates.
                        let level = self.slots[other].stack_level;
                        let slot = &mut self.slots[id];
                        slot.dup_stack_level = slot.dup_stack_level.max(level);
                        break;
                    }
                }
            }

            if usable {
                self.slots[id].current_word = Pattern::from_slice(word);
                return true;
            }
        }
        false
    }

    /// Would putting `c` at the linked position leave the crossing slot with
    /// at least one compatible word? Filled crossers are compatible by
    /// construction. Under `do_prune`, record which filled slots' letters
    /// the crosser's list is currently constrained by.
    fn letter_compatible(
        &mut self,
        id: SlotId,
        pos: usize,
        c: u8,
        ctx: &SearchContext,
        opts: &SearchOptions,
    ) -> bool {
        let link = self.slots[id].links[pos].expect("letter_compatible: no link");
        let target = link.other_slot;
        if self.slots[target].filled {
            return true;
        }

        if opts.prune {
            for j in 0..self.slots[target].len {
                let Some(link2) = self.slots[target].links[j] else {
                    continue;
                };
                if self.slots[link2.other_slot].filled {
                    self.slots[link2.other_slot].ref_by_higher[link2.other_pos] = true;
                }
            }
        }

        let slot = &self.slots[target];
        let mut trial = slot.filled_pattern.clone();
        trial[link.other_pos] = c;
        let bucket = &ctx.dictionary.words[slot.len];
        slot.compatible_words
            .as_ref()
            .expect("unfilled slot without compatible list")
            .iter()
            .any(|&word_id| matches_pattern(&trial, bucket[word_id].as_bytes()))
    }

    /// Propagate the letters of the slot's current word into crossing slots.
    /// A crosser whose pattern fills up completely becomes filled itself and
    /// is pushed (it had no say, so it carries no compatible list).
    pub fn install_word(&mut self, id: SlotId, ctx: &mut SearchContext, opts: &SearchOptions) {
        self.nsteps += 1;
        self.slots[id].solutions_at_install = self.nsolutions;
        if LOG_SEARCH {
            eprintln!(
                "install_word: {} in slot {}",
                String::from_utf8_lossy(&self.slots[id].current_word),
                self.slots[id].name
            );
        }
        for pos in 0..self.slots[id].len {
            let Some(Link {
                other_slot: target,
                other_pos,
            }) = self.slots[id].links[pos]
            else {
                continue;
            };
            if self.slots[id].filled_pattern[pos] != WILDCARD {
                continue;
            }
            let c = self.slots[id].current_word[pos];
            self.slots[target].filled_pattern[other_pos] = c;
            if self.slots[target].filled_pattern.contains(&WILDCARD) {
                let pattern = self.slots[target].filled_pattern.clone();
                let list = ctx.get_matches(self.slots[target].len, &pattern);
                if list.is_empty() {
                    panic!(
                        "empty compatible list for slot {} pattern {}",
                        self.slots[target].name,
                        String::from_utf8_lossy(&pattern)
                    );
                }
                self.slots[target].compatible_words = Some(list);
            } else {
                // The crosser is now fully determined.
                if crate::CHECK_INVARIANTS {
                    assert!(
                        !self.filled_stack.contains(&target),
                        "slot {target} is already on the filled stack"
                    );
                }
                let level = self.filled_stack.len() as isize;
                let nsolutions = self.nsolutions;
                let slot = &mut self.slots[target];
                slot.compatible_words = None;
                slot.current_word = slot.filled_pattern.clone();
                slot.filled = true;
                slot.stack_level = level;
                slot.solutions_at_install = nsolutions;
                slot.clear_ref_marks();
                self.filled_stack.push(target);
                if opts.prune {
                    // The crosser's word was dictated by its filled
                    // partners' letters; record that those letters are now
                    // load-bearing for everything above.
                    for j in 0..self.slots[target].len {
                        let Some(link2) = self.slots[target].links[j] else {
                            continue;
                        };
                        if self.slots[link2.other_slot].filled {
                            self.slots[link2.other_slot].ref_by_higher[link2.other_pos] = true;
                        }
                    }
                }
            }
        }
    }

    /// Withdraw the slot's letters from unfilled crossing slots and refresh
    /// their compatible lists. An empty refreshed list means the forward
    /// check was violated, which is a bug.
    pub fn uninstall_word(&mut self, id: SlotId, ctx: &mut SearchContext) {
        for pos in 0..self.slots[id].len {
            let Some(Link {
                other_slot: target,
                other_pos,
            }) = self.slots[id].links[pos]
            else {
                continue;
            };
            if self.slots[target].filled {
                continue;
            }
            self.slots[target].filled_pattern[other_pos] = WILDCARD;
            let pattern = self.slots[target].filled_pattern.clone();
            let list = ctx.get_matches(self.slots[target].len, &pattern);
            if list.is_empty() {
                panic!(
                    "empty compatible list for slot {} pattern {} after uninstall",
                    self.slots[target].name,
                    String::from_utf8_lossy(&pattern)
                );
            }
            self.slots[target].compatible_words = Some(list);
        }
    }

    /// Replace the slot's compatible list with the cached refinement that
    /// drops words matching the current word at the positions higher slots
    /// actually consulted. Returns false if nothing was consulted, in which
    /// case retrying this slot cannot change the outcome above it.
    fn prune_slot(&mut self, id: SlotId, ctx: &mut SearchContext, opts: &SearchOptions) -> bool {
        let Some(prune_pattern) = self.slots[id].build_prune_pattern() else {
            return false;
        };
        if opts.verbose_prune {
            eprintln!(
                "prune: slot {} pattern {}",
                self.slots[id].name,
                String::from_utf8_lossy(&prune_pattern)
            );
        }
        let len = self.slots[id].len;
        let base = self.slots[id]
            .compatible_words
            .clone()
            .expect("prune on slot without compatible list");
        let mut cursor = self.slots[id].next_word_index;
        let mut signature = std::mem::take(&mut self.slots[id].prune_signature);
        let list = ctx.get_matches_prune(len, &base, &mut cursor, &mut signature, &prune_pattern);
        let slot = &mut self.slots[id];
        slot.compatible_words = Some(list);
        slot.next_word_index = cursor;
        slot.prune_signature = signature;
        true
    }

    /// Bookkeeping for a slot leaving the stack. Under pruning, the slot's
    /// compatible list may carry refinements that were only valid for the
    /// stack context of its stay; re-fetch the plain list for its pattern.
    fn pop_cleanup(&mut self, id: SlotId, ctx: &mut SearchContext, opts: &SearchOptions) {
        self.slots[id].filled = false;
        self.slots[id].stack_level = -1;
        self.slots[id].clear_ref_marks();
        if opts.prune && self.slots[id].compatible_words.is_some() {
            let pattern = self.slots[id].filled_pattern.clone();
            let list = ctx.get_matches(self.slots[id].len, &pattern);
            self.slots[id].compatible_words = Some(list);
        }
    }

    /// The level of the topmost filled slot whose choice could have affected
    /// this (just-popped) slot's failure: a dup conflict, a filled direct
    /// crosser, or a filled slot crossing an unfilled direct crosser.
    /// Short-circuits at `my_level - 1`.
    fn top_affecting_level(&self, id: SlotId, my_level: isize) -> isize {
        let slot = &self.slots[id];
        let mut max_level = -1;
        if slot.dup_stack_level >= 0 {
            max_level = slot.dup_stack_level;
            if max_level == my_level - 1 {
                return max_level;
            }
        }
        for pos in 0..slot.len {
            let Some(link) = slot.links[pos] else {
                continue;
            };
            let crosser = &self.slots[link.other_slot];
            if crosser.filled {
                if crosser.stack_level > max_level {
                    max_level = crosser.stack_level;
                    if max_level == my_level - 1 {
                        return max_level;
                    }
                }
            } else {
                for j in 0..crosser.len {
                    let Some(link2) = crosser.links[j] else {
                        continue;
                    };
                    let second = &self.slots[link2.other_slot];
                    if second.filled && second.stack_level > max_level {
                        max_level = second.stack_level;
                        if max_level == my_level - 1 {
                            return max_level;
                        }
                    }
                }
            }
        }
        max_level
    }

    /// Roll back the most recent choice: withdraw the top slot's word and
    /// try its next usable one; failing that, pop it and repeat further
    /// down, optionally backjumping past slots that couldn't have affected
    /// the failure.
    pub fn backtrack(&mut self, ctx: &mut SearchContext, opts: &SearchOptions) -> bool {
        loop {
            let Some(&id) = self.filled_stack.last() else {
                return false;
            };
            if LOG_SEARCH {
                eprintln!("backtrack to slot {}", self.slots[id].name);
            }
            self.uninstall_word(id, ctx);

            // Conflict reasoning only transfers failures: if the subtree
            // above this slot's word yielded a solution, running out of
            // candidates is not a dead end, so neither pruning nor
            // backjumping applies.
            let fruitless = self.nsolutions == self.slots[id].solutions_at_install;

            if self.slots[id].compatible_words.is_some() {
                let popped_by_prune =
                    opts.prune && fruitless && !self.prune_slot(id, ctx, opts);
                if !popped_by_prune && self.find_next_usable_word(id, ctx, opts) {
                    self.install_word(id, ctx, opts);
                    return true;
                }
            }

            let my_level = self.slots[id].stack_level;
            self.filled_stack.pop();
            self.pop_cleanup(id, ctx, opts);
            if self.filled_stack.is_empty() {
                return false;
            }

            if opts.backjump && fruitless {
                let level = self.top_affecting_level(id, my_level);
                while self.filled_stack.len() as isize > level + 1 {
                    let top = *self.filled_stack.last().unwrap();
                    if LOG_SEARCH {
                        eprintln!("backjump past slot {}", self.slots[top].name);
                    }
                    self.uninstall_word(top, ctx);
                    self.filled_stack.pop();
                    self.pop_cleanup(top, ctx, opts);
                }
                if self.filled_stack.is_empty() {
                    return false;
                }
            }
        }
    }

    /// A human-readable dump of the grid structure.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for slot in &self.slots {
            let _ = writeln!(
                out,
                "slot {}: {} len {} preset {}",
                slot.num,
                slot.name,
                slot.len,
                String::from_utf8_lossy(&slot.preset_pattern)
            );
            for pos in 0..slot.len {
                if let Some(link) = slot.links[pos] {
                    let _ = writeln!(
                        out,
                        "   pos {pos} -> slot {} pos {}",
                        link.other_slot, link.other_pos
                    );
                }
            }
        }
        out
    }

    /// Sanity checks for conditions that should always hold mid-search.
    pub fn check_invariants(&self, ctx: &SearchContext) {
        for (level, &id) in self.filled_stack.iter().enumerate() {
            let slot = &self.slots[id];
            assert!(slot.filled, "stacked slot {} is not filled", slot.name);
            assert_eq!(
                slot.stack_level, level as isize,
                "slot {} stack level out of sync",
                slot.name
            );
        }
        for slot in &self.slots {
            if slot.filled {
                for pos in 0..slot.len {
                    if slot.filled_pattern[pos] != WILDCARD {
                        assert_eq!(
                            slot.current_word[pos], slot.filled_pattern[pos],
                            "slot {} word disagrees with its pattern",
                            slot.name
                        );
                    }
                }
            } else if let Some(list) = &slot.compatible_words {
                let bucket = &ctx.dictionary.words[slot.len];
                for &word_id in list.iter() {
                    assert!(
                        matches_pattern(&slot.filled_pattern, bucket[word_id].as_bytes()),
                        "slot {} compatible list is stale",
                        slot.name
                    );
                }
            }
            for pos in 0..slot.len {
                let Some(link) = slot.links[pos] else {
                    continue;
                };
                let other = &self.slots[link.other_slot];
                let a = slot.filled_pattern[pos];
                let b = other.filled_pattern[link.other_pos];
                if a != WILDCARD && b != WILDCARD {
                    assert_eq!(
                        a, b,
                        "linked cells disagree: {} pos {pos} vs {} pos {}",
                        slot.name, other.name, link.other_pos
                    );
                }
            }
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Grid::new()
    }
}
