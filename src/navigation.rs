//! Cursor over the playlist and browse views.
//!
//! Browse positions are pool indices. Search results are the sorted pool
//! indices matching the current query; seeking in browse mode moves to the
//! strictly next or previous result using half-open interval searches,
//! which also works when the current item is no longer a result.

use crate::model::ListKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSlot {
    /// On the result with this rank.
    At(usize),
    /// Between ranks `n - 1` and `n`; the selection is not a result.
    Before(usize),
}

impl ResultSlot {
    pub fn locate(results: &[usize], pool_index: usize) -> Self {
        let rank = results.partition_point(|&result| result < pool_index);
        if results.get(rank) == Some(&pool_index) {
            Self::At(rank)
        } else {
            Self::Before(rank)
        }
    }

    pub fn rank(self) -> Option<usize> {
        match self {
            Self::At(rank) => Some(rank),
            Self::Before(_) => None,
        }
    }
}

/// The result strictly after (or before) `value`. Past either end the
/// search wraps around when `wrap` is set and clamps to that end otherwise.
pub fn seek_to_result(
    value: usize,
    direction: Direction,
    results: &[usize],
    wrap: bool,
) -> Option<usize> {
    let first = *results.first()?;
    let last = *results.last()?;
    match direction {
        Direction::Next => {
            let rank = results.partition_point(|&result| result <= value);
            Some(match results.get(rank) {
                Some(result) => *result,
                None if wrap => first,
                None => last,
            })
        }
        Direction::Prev => {
            let rank = results.partition_point(|&result| result < value);
            Some(match rank.checked_sub(1) {
                Some(previous) => results[previous],
                None if wrap => last,
                None => first,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    active: ListKind,
    playlist_position: usize,
    browse_index: usize,
    browse_slot: ResultSlot,
    generation: u64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            active: ListKind::Playlist,
            playlist_position: 0,
            browse_index: 0,
            browse_slot: ResultSlot::Before(0),
            generation: 0,
        }
    }
}

impl Cursor {
    pub fn active(&self) -> ListKind {
        self.active
    }

    pub fn position(&self) -> usize {
        match self.active {
            ListKind::Playlist => self.playlist_position,
            ListKind::Browse => self.browse_index,
        }
    }

    pub fn playlist_position(&self) -> usize {
        self.playlist_position
    }

    pub fn browse_index(&self) -> usize {
        self.browse_index
    }

    pub fn browse_slot(&self) -> ResultSlot {
        self.browse_slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts over at the first playlist entry. The generation keeps
    /// counting so completions from the old session stay stale.
    pub fn reset(&mut self, results: &[usize]) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
        self.refilter(results);
    }

    pub fn play_from(&mut self, list: ListKind, index: usize, results: &[usize]) {
        self.active = list;
        match list {
            ListKind::Playlist => self.playlist_position = index,
            ListKind::Browse => {
                self.browse_index = index;
                self.browse_slot = ResultSlot::locate(results, index);
            }
        }
        self.bump();
    }

    pub fn step(&mut self, delta: isize) {
        let position = self.playlist_position.saturating_add_signed(delta);
        self.play_from(ListKind::Playlist, position, &[]);
    }

    /// Returns `false` when a browse seek had no result to land on.
    pub fn seek(&mut self, direction: Direction, results: &[usize], wrap: bool) -> bool {
        match self.active {
            ListKind::Playlist => {
                let delta = match direction {
                    Direction::Next => 1,
                    Direction::Prev => -1,
                };
                self.step(delta);
                true
            }
            ListKind::Browse => {
                match seek_to_result(self.browse_index, direction, results, wrap) {
                    Some(index) => {
                        self.play_from(ListKind::Browse, index, results);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Re-anchors the browse selection after the result set changed,
    /// without touching what is playing.
    pub fn refilter(&mut self, results: &[usize]) {
        self.browse_slot = ResultSlot::locate(results, self.browse_index);
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seeks_strictly_past_the_current_value() {
        let results = [2, 5, 9];
        assert_eq!(seek_to_result(5, Direction::Next, &results, false), Some(9));
        assert_eq!(seek_to_result(5, Direction::Prev, &results, false), Some(2));
        assert_eq!(seek_to_result(6, Direction::Next, &results, false), Some(9));
        assert_eq!(seek_to_result(6, Direction::Prev, &results, false), Some(5));
    }

    #[test]
    fn seeking_past_the_ends_clamps_or_wraps() {
        let results = [2, 5, 9];
        assert_eq!(seek_to_result(9, Direction::Next, &results, false), Some(9));
        assert_eq!(seek_to_result(9, Direction::Next, &results, true), Some(2));
        assert_eq!(seek_to_result(0, Direction::Prev, &results, false), Some(2));
        assert_eq!(seek_to_result(0, Direction::Prev, &results, true), Some(9));
        assert_eq!(seek_to_result(40, Direction::Next, &results, false), Some(9));
        assert_eq!(seek_to_result(40, Direction::Prev, &results, false), Some(9));
    }

    #[test]
    fn seeking_empty_results_goes_nowhere() {
        assert_eq!(seek_to_result(3, Direction::Next, &[], true), None);

        let mut cursor = Cursor::default();
        cursor.play_from(ListKind::Browse, 3, &[]);
        let generation = cursor.generation();
        assert!(!cursor.seek(Direction::Next, &[], true));
        assert_eq!(cursor.browse_index(), 3);
        assert_eq!(cursor.generation(), generation);
    }

    #[test]
    fn locates_half_positions_between_results() {
        let results = [2, 5, 9];
        assert_eq!(ResultSlot::locate(&results, 5), ResultSlot::At(1));
        assert_eq!(ResultSlot::locate(&results, 6), ResultSlot::Before(2));
        assert_eq!(ResultSlot::locate(&results, 0), ResultSlot::Before(0));
        assert_eq!(ResultSlot::locate(&results, 10), ResultSlot::Before(3));
    }

    #[test]
    fn playlist_seek_never_goes_negative() {
        let mut cursor = Cursor::default();
        cursor.seek(Direction::Prev, &[], true);
        assert_eq!(cursor.playlist_position(), 0);
        cursor.seek(Direction::Next, &[], true);
        cursor.seek(Direction::Next, &[], true);
        assert_eq!(cursor.playlist_position(), 2);
        cursor.step(-5);
        assert_eq!(cursor.playlist_position(), 0);
    }

    #[test]
    fn browsing_keeps_the_playlist_position() {
        let results = [1, 4, 6];
        let mut cursor = Cursor::default();
        cursor.step(3);
        cursor.play_from(ListKind::Browse, 4, &results);
        cursor.seek(Direction::Next, &results, true);
        cursor.seek(Direction::Next, &results, true);

        assert_eq!(cursor.active(), ListKind::Browse);
        assert_eq!(cursor.browse_index(), 1);
        assert_eq!(cursor.playlist_position(), 3);
    }

    #[test]
    fn refilter_tracks_the_selection_without_moving_it() {
        let mut cursor = Cursor::default();
        cursor.play_from(ListKind::Browse, 4, &[1, 4, 6]);
        assert_eq!(cursor.browse_slot(), ResultSlot::At(1));
        let generation = cursor.generation();

        cursor.refilter(&[0, 3, 8]);
        assert_eq!(cursor.browse_slot(), ResultSlot::Before(2));
        assert_eq!(cursor.browse_index(), 4);
        assert_eq!(cursor.generation(), generation);

        cursor.seek(Direction::Prev, &[0, 3, 8], false);
        assert_eq!(cursor.browse_index(), 3);
    }

    #[test]
    fn generation_moves_with_every_selection() {
        let mut cursor = Cursor::default();
        let start = cursor.generation();
        cursor.step(1);
        cursor.play_from(ListKind::Playlist, 1, &[]);
        assert_eq!(cursor.generation(), start + 2);
        cursor.reset(&[]);
        assert_eq!(cursor.generation(), start + 3);
        assert_eq!(cursor.position(), 0);
    }

    proptest! {
        #[test]
        fn next_then_prev_returns_to_a_result(
            results in proptest::collection::btree_set(0usize..200, 1..40),
            pick in 0usize..40,
        ) {
            let results: Vec<usize> = results.into_iter().collect();
            let start = results[pick % results.len()];

            let next = seek_to_result(start, Direction::Next, &results, true).expect("next");
            let back = seek_to_result(next, Direction::Prev, &results, true).expect("prev");
            prop_assert_eq!(back, start);

            let last = *results.last().expect("non-empty");
            if start != last {
                let next = seek_to_result(start, Direction::Next, &results, false).expect("next");
                let back = seek_to_result(next, Direction::Prev, &results, false).expect("prev");
                prop_assert_eq!(back, start);
            }
        }
    }
}
