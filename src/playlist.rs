//! The realized play sequence and the look-ahead buffer that extends it.
//!
//! Every append, removal and insertion patches the [`EligibilitySet`] so it
//! stays the complement of the last `window` playlist slots.

use crate::eligibility::EligibilitySet;
use crate::error::{EngineError, Result};
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

/// Seeds one independent random stream per playlist slot. Regenerating a
/// slot from the same eligibility therefore yields the same pick until the
/// epoch moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSeed {
    seed: u64,
    epoch: u64,
}

impl DrawSeed {
    pub fn new(seed: u64) -> Self {
        Self { seed, epoch: 0 }
    }

    pub fn from_os_rng() -> Self {
        Self::new(rand::random())
    }

    pub fn advance_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn rng_for(&self, slot: usize) -> SmallRng {
        let mixed = self.seed
            ^ self.epoch.rotate_left(32)
            ^ (slot as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        SmallRng::seed_from_u64(mixed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DrawRules<'a> {
    pub window: usize,
    pub look_ahead: usize,
    /// Sorted search results to intersect with when restricting draws.
    pub restrict_to: Option<&'a [usize]>,
    pub unplayable: &'a BTreeSet<usize>,
    pub seed: DrawSeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    Filled,
    /// No candidate and no fallback were left; `missing` slots stay empty.
    Exhausted { missing: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<usize>,
    /// Parallel to `entries`: slots the operator queued rather than drew.
    queued: Vec<bool>,
}

impl Playlist {
    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<usize> {
        self.entries.get(position).copied()
    }

    pub fn is_queued(&self, position: usize) -> bool {
        self.queued.get(position).copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.queued.clear();
    }

    fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
        self.queued.truncate(len);
    }

    pub fn buffer(
        &mut self,
        eligible: &mut EligibilitySet,
        cursor: usize,
        rules: &DrawRules<'_>,
    ) -> BufferStatus {
        while self.entries.len() < target_len(cursor, rules.look_ahead) {
            debug_assert!(rules.window < eligible.pool_len().max(1));
            debug_assert!(eligible.len() + rules.window >= eligible.pool_len());

            let Some(drawn) = self.draw(eligible, rules) else {
                let missing = target_len(cursor, rules.look_ahead) - self.entries.len();
                debug!("buffer exhausted with {missing} slots unfilled");
                return BufferStatus::Exhausted { missing };
            };

            if rules.window > 0 {
                let falling_out = self
                    .entries
                    .len()
                    .checked_sub(rules.window)
                    .map(|position| (position, self.entries[position]))
                    .filter(|(position, index)| !self.entries[position + 1..].contains(index))
                    .map(|(_, index)| index);
                eligible.toggle(falling_out, Some(drawn));
            }
            self.entries.push(drawn);
            self.queued.push(false);
        }
        BufferStatus::Filled
    }

    /// Drops everything after `cursor`, rebuilds eligibility from the
    /// remaining history and buffers again.
    pub fn rebuffer(
        &mut self,
        eligible: &mut EligibilitySet,
        cursor: usize,
        rules: &DrawRules<'_>,
    ) -> BufferStatus {
        self.truncate(cursor.saturating_add(1));
        eligible.recompute(&self.entries, cursor, rules.window);
        self.buffer(eligible, cursor, rules)
    }

    pub fn remove(
        &mut self,
        eligible: &mut EligibilitySet,
        cursor: usize,
        offset: usize,
        rules: &DrawRules<'_>,
    ) -> Result<(usize, BufferStatus)> {
        if offset == 0 {
            return Err(EngineError::NonPositiveOffset);
        }
        let len = self.entries.len();
        let position = cursor.saturating_add(offset);
        if position >= len {
            return Err(EngineError::OffsetOutOfRange { offset, len });
        }

        let window = rules.window;
        let first_banned = len.checked_sub(window);
        let in_window = window > 0 && first_banned.is_none_or(|first| position >= first);
        let slides_in = first_banned
            .filter(|first| in_window && *first > 0)
            .map(|first| self.entries[first - 1]);

        let removed = self.entries.remove(position);
        self.queued.remove(position);
        if in_window {
            let window_start = self.entries.len().saturating_sub(window);
            let readmit = (!self.entries[window_start..].contains(&removed)).then_some(removed);
            eligible.toggle(readmit, slides_in);
        }
        self.repair_from(eligible, position, window);

        let status = self.buffer(eligible, cursor, rules);
        Ok((removed, status))
    }

    pub fn insert(
        &mut self,
        eligible: &mut EligibilitySet,
        cursor: usize,
        offset: usize,
        pool_index: usize,
        rules: &DrawRules<'_>,
    ) -> Result<BufferStatus> {
        if offset == 0 {
            return Err(EngineError::NonPositiveOffset);
        }
        let len = self.entries.len();
        let position = cursor.saturating_add(offset);
        if position > len {
            return Err(EngineError::OffsetOutOfRange { offset, len });
        }

        self.entries.insert(position, pool_index);
        self.queued.insert(position, true);

        let window = rules.window;
        if window > 0 {
            let first_banned = self.entries.len().checked_sub(window);
            if first_banned.is_none_or(|first| position >= first) {
                let pushed_out = first_banned
                    .filter(|first| *first > 0)
                    .map(|first| self.entries[first - 1])
                    .filter(|index| {
                        let start = first_banned.unwrap_or(0);
                        !self.entries[start..].contains(index)
                    });
                eligible.toggle(pushed_out, Some(pool_index));
            }
        }
        self.repair_from(eligible, position + 1, window);

        Ok(self.buffer(eligible, cursor, rules))
    }

    /// Closing a gap or queueing an item can pull two equal entries within
    /// `window` of each other. Drops drawn entries at or after `start` that
    /// repeat inside the window so the buffer redraws them. Queued entries
    /// are kept even when they repeat.
    fn repair_from(&mut self, eligible: &mut EligibilitySet, start: usize, window: usize) {
        if window == 0 {
            return;
        }
        let mut position = start;
        let mut dropped = 0;
        while position < self.entries.len() {
            let from = position.saturating_sub(window);
            let repeats = self.entries[from..position].contains(&self.entries[position]);
            if repeats && !self.queued[position] {
                self.entries.remove(position);
                self.queued.remove(position);
                dropped += 1;
            } else {
                position += 1;
            }
        }
        if dropped > 0 {
            debug!("dropped {dropped} upcoming entries to keep the no-repeat window");
            let end = self.entries.len().saturating_sub(1);
            eligible.recompute(&self.entries, end, window);
        }
    }

    fn draw(&self, eligible: &EligibilitySet, rules: &DrawRules<'_>) -> Option<usize> {
        let playable = |index: &usize| !rules.unplayable.contains(index);
        let candidates: Vec<usize> = match rules.restrict_to {
            Some(results) => results
                .iter()
                .copied()
                .filter(|index| eligible.contains(*index))
                .filter(playable)
                .collect(),
            None => eligible.iter().filter(playable).collect(),
        };

        if !candidates.is_empty() {
            let mut rng = rules.seed.rng_for(self.entries.len());
            return Some(candidates[rng.random_range(0..candidates.len())]);
        }

        // Nothing eligible: repeat whatever played a whole number of cycles
        // of the candidate pool ago so the buffer keeps moving.
        let cycle = rules
            .restrict_to
            .map_or(eligible.pool_len(), |results| results.len());
        if cycle == 0 {
            return None;
        }
        (1..=self.entries.len() / cycle)
            .map(|cycles| self.entries[self.entries.len() - cycles * cycle])
            .find(playable)
    }
}

fn target_len(cursor: usize, look_ahead: usize) -> usize {
    cursor.saturating_add(look_ahead).saturating_add(1)
}
