//! Pool indices that random draws may currently pick.
//!
//! The set is the complement of the no-repeat window: an index is missing
//! exactly while it sits among the last `K` playlist slots.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilitySet {
    allowed: Vec<bool>,
    count: usize,
}

impl EligibilitySet {
    pub fn full(pool_len: usize) -> Self {
        Self {
            allowed: vec![true; pool_len],
            count: pool_len,
        }
    }

    pub fn pool_len(&self) -> usize {
        self.allowed.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.allowed.get(index).copied().unwrap_or(false)
    }

    /// Re-admits `old` and then evicts `new`, so passing the same index for
    /// both leaves it evicted.
    pub fn toggle(&mut self, old: Option<usize>, new: Option<usize>) {
        if let Some(index) = old {
            self.set(index, true);
        }
        if let Some(index) = new {
            self.set(index, false);
        }
    }

    /// Rebuilds the set from history: everything except
    /// `playlist[cursor + 1 - window ..= cursor]`.
    pub fn recompute(&mut self, playlist: &[usize], cursor: usize, window: usize) {
        let pool_len = self.allowed.len();
        *self = Self::full(pool_len);
        if window == 0 || playlist.is_empty() {
            return;
        }

        let end = cursor.min(playlist.len() - 1);
        let start = (end + 1).saturating_sub(window);
        for &index in &playlist[start..=end] {
            self.set(index, false);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.allowed
            .iter()
            .enumerate()
            .filter_map(|(index, allowed)| allowed.then_some(index))
    }

    fn set(&mut self, index: usize, allowed: bool) {
        let Some(slot) = self.allowed.get_mut(index) else {
            return;
        };
        if *slot != allowed {
            *slot = allowed;
            if allowed {
                self.count += 1;
            } else {
                self.count -= 1;
            }
        }
    }
}
