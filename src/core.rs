use crate::eligibility::EligibilitySet;
use crate::error::{EngineError, Result};
use crate::model::{Item, ListKind, MAX_LOOK_AROUND, Pool, Settings};
use crate::navigation::{Cursor, Direction};
use crate::playlist::{BufferStatus, DrawRules, DrawSeed, Playlist};
use crate::query::{self, FieldConfig, Query};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Identifies the item a resolution was started for. Completions carrying
/// an old generation are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveRequest {
    pub generation: u64,
    pub pool_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Ready(String),
    Stale,
    /// The item could not be resolved and was dropped from random draws.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct UpcomingRow<'a> {
    pub offset: isize,
    pub item: Option<&'a Item>,
    /// Put there by the operator rather than drawn.
    pub queued: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BrowseRow<'a> {
    pub item: &'a Item,
    pub selected: bool,
}

#[derive(Debug)]
pub struct PlayerCore {
    pool: Pool,
    fields: FieldConfig,
    settings: Settings,
    window: usize,
    eligible: EligibilitySet,
    playlist: Playlist,
    cursor: Cursor,
    query_text: String,
    query: Option<Query>,
    results: Vec<usize>,
    unplayable: BTreeSet<usize>,
    seed: DrawSeed,
    songs_left: Option<u32>,
    buffer_status: BufferStatus,
    pub dirty: bool,
    pub status: String,
}

fn draw_rules<'a>(
    settings: &Settings,
    window: usize,
    results: &'a [usize],
    unplayable: &'a BTreeSet<usize>,
    seed: DrawSeed,
) -> DrawRules<'a> {
    DrawRules {
        window,
        look_ahead: settings.look_ahead_after,
        restrict_to: settings.restrict_random_to_query.then_some(results),
        unplayable,
        seed,
    }
}

impl PlayerCore {
    pub fn new(settings: Settings) -> Self {
        Self::with_seed(settings, DrawSeed::from_os_rng())
    }

    pub fn with_seed(mut settings: Settings, seed: DrawSeed) -> Self {
        settings.clamp_look_around();
        let mut core = Self {
            pool: Pool::default(),
            fields: FieldConfig::songs(),
            settings,
            window: 0,
            eligible: EligibilitySet::default(),
            playlist: Playlist::default(),
            cursor: Cursor::default(),
            query_text: String::new(),
            query: Some(Query::default()),
            results: Vec::new(),
            unplayable: BTreeSet::new(),
            seed,
            songs_left: None,
            buffer_status: BufferStatus::Filled,
            dirty: true,
            status: String::from("Ready"),
        };
        core.reset();
        core
    }

    /// Replaces the pool wholesale. All playback state starts over.
    pub fn load_pool(&mut self, items: Vec<Item>) {
        self.pool = Pool::new(items);
        info!("loaded pool with {} items", self.pool.len());
        self.reset();
    }

    pub fn reset(&mut self) {
        let pool_len = self.pool.len();
        self.window = self.settings.effective_window(pool_len);
        if let Some(requested) = self.settings.no_repeat_window {
            if pool_len > 0 && requested > self.window {
                warn!(
                    "no-repeat window {requested} does not fit a pool of {pool_len}, using {}",
                    self.window
                );
            }
        }

        self.eligible = EligibilitySet::full(pool_len);
        self.playlist.clear();
        self.unplayable.clear();
        self.refresh_results();
        self.cursor.reset(&self.results);
        self.buffer();
        if self.buffer_status == BufferStatus::Filled {
            self.set_status(&format!("Loaded {pool_len} items"));
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fields(&self) -> &FieldConfig {
        &self.fields
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn eligible(&self) -> &EligibilitySet {
        &self.eligible
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn query_is_valid(&self) -> bool {
        self.query.is_some()
    }

    pub fn search_results(&self) -> &[usize] {
        &self.results
    }

    pub fn buffer_status(&self) -> BufferStatus {
        self.buffer_status
    }

    pub fn songs_left(&self) -> Option<u32> {
        self.songs_left
    }

    pub fn unplayable_count(&self) -> usize {
        self.unplayable.len()
    }

    pub fn now_playing(&self) -> Option<&Item> {
        let index = match self.cursor.active() {
            ListKind::Playlist => self.playlist.get(self.cursor.playlist_position())?,
            ListKind::Browse => self.cursor.browse_index(),
        };
        self.pool.get(index)
    }

    pub fn display_name(&self, item: &Item) -> String {
        item.display_name(self.settings.use_unicode)
    }

    pub fn play_from(&mut self, list: ListKind, index: usize) -> Result<()> {
        let len = match list {
            ListKind::Playlist => self.playlist.len(),
            ListKind::Browse => self.pool.len(),
        };
        if index >= len {
            return Err(EngineError::PositionOutOfRange {
                list: list.label(),
                position: index,
                len,
            });
        }

        self.cursor.play_from(list, index, &self.results);
        self.buffer();
        self.announce();
        Ok(())
    }

    pub fn resume_playlist(&mut self) -> Result<()> {
        self.play_from(ListKind::Playlist, self.cursor.playlist_position())
    }

    pub fn play_next(&mut self) -> Result<()> {
        self.seek(Direction::Next)
    }

    pub fn play_prev(&mut self) -> Result<()> {
        self.seek(Direction::Prev)
    }

    pub fn seek(&mut self, direction: Direction) -> Result<()> {
        if self.pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        let past_the_end = self.cursor.active() == ListKind::Playlist
            && self.cursor.playlist_position() >= self.playlist.len();
        if direction == Direction::Next && past_the_end {
            self.set_status("Nothing left to play");
            return Ok(());
        }

        let playable = self.playable_results();
        if !self
            .cursor
            .seek(direction, &playable, self.settings.browse_wrap)
        {
            self.set_status("No search results to move through");
            return Ok(());
        }
        self.cursor.refilter(&self.results);
        self.buffer();
        self.announce();
        Ok(())
    }

    /// Jumps `delta` playlist entries, as when clicking an upcoming row.
    pub fn step(&mut self, delta: isize) -> Result<()> {
        if self.pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        self.cursor.step(delta);
        self.buffer();
        self.announce();
        Ok(())
    }

    /// Malformed text filters everything out instead of failing.
    pub fn set_query(&mut self, text: &str) {
        self.query_text = text.to_string();
        self.query = Query::parse(text);
        self.refresh_results();
        self.cursor.refilter(&self.results);

        match &self.query {
            Some(_) => {
                let message = format!("{} matches", self.results.len());
                self.set_status(&message);
            }
            None => self.set_status("Invalid query"),
        }
        if self.settings.restrict_random_to_query {
            self.rebuffer();
        }
    }

    /// `None` selects the automatic window for the pool size.
    pub fn set_no_repeat_window(&mut self, window: Option<usize>) -> Result<()> {
        let pool_len = self.pool.len();
        if let Some(requested) = window {
            if pool_len > 0 && requested >= pool_len {
                return Err(EngineError::WindowTooLarge {
                    window: requested,
                    pool: pool_len,
                });
            }
        }

        self.settings.no_repeat_window = window;
        self.window = self.settings.effective_window(pool_len);
        info!("no-repeat window set to {}", self.window);
        self.rebuffer();
        Ok(())
    }

    pub fn set_look_ahead(&mut self, look_ahead: usize) {
        self.settings.look_ahead_after = look_ahead.min(MAX_LOOK_AROUND);
        self.buffer();
    }

    pub fn set_look_behind(&mut self, look_behind: usize) {
        self.settings.look_behind_before = look_behind.min(MAX_LOOK_AROUND);
        self.dirty = true;
    }

    pub fn set_restrict_to_query(&mut self, restrict: bool) {
        self.settings.restrict_random_to_query = restrict;
        self.rebuffer();
    }

    pub fn set_browse_wrap(&mut self, wrap: bool) {
        self.settings.browse_wrap = wrap;
        self.dirty = true;
    }

    pub fn set_use_unicode(&mut self, use_unicode: bool) {
        self.settings.use_unicode = use_unicode;
        self.dirty = true;
    }

    pub fn set_folders(&mut self, folders: Vec<PathBuf>) {
        self.settings.folders = folders;
    }

    pub fn set_player_command(&mut self, command: Option<String>) {
        self.settings.player_command = command;
    }

    /// Stops autoplay after `limit` more songs; `None` plays on forever.
    pub fn set_songs_left(&mut self, limit: Option<u32>) {
        self.songs_left = limit;
        self.dirty = true;
    }

    /// Regenerates upcoming entries from the current history. Repeating it
    /// without other changes yields the same entries.
    pub fn rebuffer(&mut self) {
        let rules = draw_rules(
            &self.settings,
            self.window,
            &self.results,
            &self.unplayable,
            self.seed,
        );
        let status =
            self.playlist
                .rebuffer(&mut self.eligible, self.cursor.playlist_position(), &rules);
        self.note_buffer(status);
    }

    pub fn reshuffle(&mut self) {
        self.seed.advance_epoch();
        self.rebuffer();
        if self.buffer_status == BufferStatus::Filled {
            self.set_status("Upcoming songs reshuffled");
        }
    }

    pub fn remove_upcoming(&mut self, offset: usize) -> Result<usize> {
        let rules = draw_rules(
            &self.settings,
            self.window,
            &self.results,
            &self.unplayable,
            self.seed,
        );
        let (removed, status) = self.playlist.remove(
            &mut self.eligible,
            self.cursor.playlist_position(),
            offset,
            &rules,
        )?;
        self.note_buffer(status);
        debug!("removed pool item {removed} at offset {offset}");
        if let Some(item) = self.pool.get(removed) {
            let message = format!("Removed {}", self.display_name(item));
            self.set_status(&message);
        }
        Ok(removed)
    }

    pub fn insert_upcoming(&mut self, offset: usize, pool_index: usize) -> Result<()> {
        let Some(item) = self.pool.get(pool_index) else {
            return Err(EngineError::PositionOutOfRange {
                list: "pool",
                position: pool_index,
                len: self.pool.len(),
            });
        };
        let message = format!("Queued {}", self.display_name(item));

        let rules = draw_rules(
            &self.settings,
            self.window,
            &self.results,
            &self.unplayable,
            self.seed,
        );
        let status = self.playlist.insert(
            &mut self.eligible,
            self.cursor.playlist_position(),
            offset,
            pool_index,
            &rules,
        )?;
        self.note_buffer(status);
        self.set_status(&message);
        Ok(())
    }

    pub fn queue_next(&mut self, pool_index: usize) -> Result<()> {
        self.insert_upcoming(1, pool_index)
    }

    pub fn resolve_request(&self) -> Option<ResolveRequest> {
        let item = self.now_playing()?;
        if self.unplayable.contains(&item.index) {
            return None;
        }
        Some(ResolveRequest {
            generation: self.cursor.generation(),
            pool_index: item.index,
        })
    }

    /// Feeds back the result of resolving the item named by `request`.
    /// Failures drop the item from future draws and advance.
    pub fn complete_resolve(
        &mut self,
        request: ResolveRequest,
        result: anyhow::Result<String>,
    ) -> ResolveOutcome {
        if request.generation != self.cursor.generation() {
            debug!(
                "ignoring stale resolution for item {} (generation {})",
                request.pool_index, request.generation
            );
            return ResolveOutcome::Stale;
        }

        match result {
            Ok(uri) => ResolveOutcome::Ready(uri),
            Err(err) => {
                warn!("skipping item {}: {err:#}", request.pool_index);
                self.unplayable.insert(request.pool_index);
                // Upcoming copies were drawn before the item failed.
                self.rebuffer();

                let playable_left = match self.cursor.active() {
                    ListKind::Playlist => self.unplayable.len() < self.pool.len(),
                    ListKind::Browse => !self.playable_results().is_empty(),
                };
                if !playable_left {
                    self.set_status("No playable items left");
                    return ResolveOutcome::Skipped;
                }
                if let Err(err) = self.seek(Direction::Next) {
                    warn!("could not advance past unplayable item: {err}");
                }
                if self.now_playing().map(|item| item.index) == Some(request.pool_index) {
                    self.set_status("No playable items left");
                }
                ResolveOutcome::Skipped
            }
        }
    }

    /// Called when the current song finished. Returns whether playback
    /// moved on.
    pub fn track_ended(&mut self) -> bool {
        match self.songs_left {
            Some(0) => {
                self.set_status("Stopped: song limit reached");
                false
            }
            Some(remaining) => {
                self.songs_left = Some(remaining - 1);
                self.seek(Direction::Next).is_ok()
            }
            None => self.seek(Direction::Next).is_ok(),
        }
    }

    pub fn upcoming_rows(&self) -> Vec<UpcomingRow<'_>> {
        let behind = self.settings.look_behind_before as isize;
        let ahead = self.settings.look_ahead_after as isize;
        let center = self.cursor.playlist_position();
        let playing_playlist = self.cursor.active() == ListKind::Playlist;

        (-behind..=ahead)
            .map(|offset| {
                let position = center.checked_add_signed(offset);
                let item = position
                    .and_then(|position| self.playlist.get(position))
                    .and_then(|index| self.pool.get(index));
                UpcomingRow {
                    offset,
                    item,
                    queued: position.is_some_and(|position| self.playlist.is_queued(position)),
                    selected: offset == 0 && playing_playlist,
                }
            })
            .collect()
    }

    pub fn browse_rows(&self) -> Vec<BrowseRow<'_>> {
        let browsing = self.cursor.active() == ListKind::Browse;
        self.results
            .iter()
            .filter_map(|index| self.pool.get(*index))
            .map(|item| BrowseRow {
                item,
                selected: browsing && item.index == self.cursor.browse_index(),
            })
            .collect()
    }

    fn buffer(&mut self) {
        let rules = draw_rules(
            &self.settings,
            self.window,
            &self.results,
            &self.unplayable,
            self.seed,
        );
        let status =
            self.playlist
                .buffer(&mut self.eligible, self.cursor.playlist_position(), &rules);
        self.note_buffer(status);
    }

    fn note_buffer(&mut self, status: BufferStatus) {
        self.buffer_status = status;
        self.dirty = true;
        if let BufferStatus::Exhausted { missing } = status {
            if !self.pool.is_empty() {
                warn!("buffer exhausted, {missing} upcoming slots left empty");
                self.set_status(&format!(
                    "Nothing left to draw: {missing} upcoming slots empty"
                ));
            }
        }
    }

    fn playable_results(&self) -> Vec<usize> {
        self.results
            .iter()
            .copied()
            .filter(|index| !self.unplayable.contains(index))
            .collect()
    }

    fn refresh_results(&mut self) {
        self.results = query::search(&self.pool, self.query.as_ref(), &self.fields);
    }

    fn announce(&mut self) {
        let message = match self.now_playing() {
            Some(item) => format!("Now playing {}", self.display_name(item)),
            None => String::from("Nothing to play"),
        };
        self.set_status(&message);
    }

    fn set_status(&mut self, message: &str) {
        debug!("status: {message}");
        self.status = message.to_string();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemSource;
    use proptest::prelude::*;

    fn songs(titles: &[&str]) -> Vec<Item> {
        titles
            .iter()
            .map(|title| {
                Item::new(ItemSource::File(PathBuf::from(format!("{title}.mp3"))))
                    .with_field("title", *title)
            })
            .collect()
    }

    fn core_with(titles: &[&str], settings: Settings) -> PlayerCore {
        let mut core = PlayerCore::with_seed(settings, DrawSeed::new(42));
        core.load_pool(songs(titles));
        core
    }

    fn settings(window: usize, look_ahead: usize) -> Settings {
        Settings {
            no_repeat_window: Some(window),
            look_ahead_after: look_ahead,
            ..Settings::default()
        }
    }

    fn banned_tail(core: &PlayerCore) -> BTreeSet<usize> {
        let entries = core.playlist().entries();
        let start = entries.len().saturating_sub(core.window());
        entries[start..].iter().copied().collect()
    }

    fn assert_complement(core: &PlayerCore) {
        let banned = banned_tail(core);
        let expected: Vec<usize> = (0..core.pool().len())
            .filter(|index| !banned.contains(index))
            .collect();
        assert_eq!(core.eligible().iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn reset_fills_look_ahead_and_bans_the_tail() {
        let core = core_with(&["a", "b", "c", "d", "e"], settings(2, 3));
        assert_eq!(core.playlist().len(), 4);
        assert_eq!(core.eligible().len(), 3);
        assert_complement(&core);
        assert_eq!(core.cursor().active(), ListKind::Playlist);
        assert_eq!(core.cursor().position(), 0);
    }

    #[test]
    fn empty_pool_has_nothing_to_play() {
        let mut core = PlayerCore::with_seed(Settings::default(), DrawSeed::new(1));
        assert!(core.now_playing().is_none());
        assert_eq!(core.play_next(), Err(EngineError::EmptyPool));
        assert!(core.resolve_request().is_none());
    }

    #[test]
    fn play_next_keeps_the_look_ahead_topped_up() {
        let mut core = core_with(&["a", "b", "c", "d", "e", "f"], settings(3, 2));
        for expected in 1..10 {
            core.play_next().expect("next");
            assert_eq!(core.cursor().playlist_position(), expected);
            assert_eq!(core.playlist().len(), expected + 3);
            assert_complement(&core);
        }
    }

    #[test]
    fn browsing_leaves_the_playlist_position_alone() {
        let mut core = core_with(&["a", "b", "c", "d"], settings(1, 2));
        core.play_next().expect("next");
        core.play_from(ListKind::Browse, 2).expect("browse");
        core.play_next().expect("next");
        core.play_prev().expect("prev");
        core.play_prev().expect("prev");

        assert_eq!(core.cursor().active(), ListKind::Browse);
        assert_eq!(core.cursor().browse_index(), 1);
        assert_eq!(core.cursor().playlist_position(), 1);
        assert_eq!(core.now_playing().map(|item| item.index), Some(1));

        core.resume_playlist().expect("resume");
        assert_eq!(core.cursor().position(), 1);
    }

    #[test]
    fn out_of_range_play_from_is_rejected() {
        let mut core = core_with(&["a", "b", "c"], settings(1, 1));
        let generation = core.cursor().generation();
        assert_eq!(
            core.play_from(ListKind::Browse, 3),
            Err(EngineError::PositionOutOfRange {
                list: "browse",
                position: 3,
                len: 3
            })
        );
        assert_eq!(core.cursor().generation(), generation);
    }

    #[test]
    fn window_too_large_is_rejected_without_changes() {
        let mut core = core_with(&["a", "b", "c"], settings(1, 4));
        let entries = core.playlist().entries().to_vec();
        assert_eq!(
            core.set_no_repeat_window(Some(3)),
            Err(EngineError::WindowTooLarge { window: 3, pool: 3 })
        );
        assert_eq!(core.window(), 1);
        assert_eq!(core.playlist().entries(), entries.as_slice());
    }

    #[test]
    fn oversized_window_is_clamped_on_load() {
        let core = core_with(&["a", "b", "c"], settings(10, 4));
        assert_eq!(core.window(), 2);
        assert_complement(&core);
    }

    #[test]
    fn automatic_window_covers_small_pools() {
        let core = core_with(&["a", "b", "c", "d"], Settings::default());
        assert_eq!(core.window(), 3);
        let entries = core.playlist().entries();
        for position in 4..entries.len() {
            assert_eq!(entries[position], entries[position - 4]);
        }
    }

    #[test]
    fn changing_the_window_rebuffers_only_the_future() {
        let mut core = core_with(&["a", "b", "c", "d", "e", "f", "g"], settings(2, 5));
        core.play_next().expect("next");
        core.play_next().expect("next");
        let history = core.playlist().entries()[..3].to_vec();

        core.set_no_repeat_window(Some(5)).expect("window");
        assert_eq!(&core.playlist().entries()[..3], history.as_slice());
        assert_eq!(core.window(), 5);
        assert_complement(&core);
    }

    #[test]
    fn rebuffer_twice_gives_the_same_tail() {
        let mut core = core_with(&["a", "b", "c", "d", "e", "f", "g", "h"], settings(3, 6));
        core.play_next().expect("next");
        core.rebuffer();
        let first = core.playlist().clone();
        core.rebuffer();
        assert_eq!(core.playlist(), &first);

        core.reshuffle();
        assert_eq!(core.playlist().len(), first.len());
        assert_eq!(core.playlist().entries()[..2], first.entries()[..2]);
    }

    #[test]
    fn insert_with_zero_window_keeps_everything_eligible() {
        let mut core = core_with(&["a", "b", "c", "d", "e"], settings(0, 3));
        assert_eq!(core.eligible().len(), 5);
        core.insert_upcoming(1, 4).expect("insert");
        assert_eq!(core.eligible().len(), 5);
        assert_eq!(core.playlist().get(1), Some(4));
    }

    #[test]
    fn edits_patch_eligibility() {
        let titles = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let mut core = core_with(&titles, settings(3, 4));

        let removed = core.remove_upcoming(4).expect("remove");
        assert!(removed < titles.len());
        assert_complement(&core);

        let candidate = core.eligible().iter().next().expect("eligible");
        core.queue_next(candidate).expect("queue");
        assert_eq!(core.playlist().get(1), Some(candidate));
        assert_complement(&core);

        assert_eq!(core.remove_upcoming(0), Err(EngineError::NonPositiveOffset));
        assert_eq!(
            core.insert_upcoming(1, 99),
            Err(EngineError::PositionOutOfRange {
                list: "pool",
                position: 99,
                len: 10
            })
        );
    }

    #[test]
    fn restricting_to_query_filters_future_draws_only() {
        let mut core = core_with(
            &["red one", "blue", "red two", "green", "red three", "grey"],
            settings(1, 4),
        );
        let first = core.playlist().get(0);

        core.set_query("red");
        assert_eq!(core.search_results(), &[0, 2, 4]);
        core.set_restrict_to_query(true);

        assert_eq!(core.playlist().get(0), first);
        assert!(
            core.playlist().entries()[1..]
                .iter()
                .all(|index| [0, 2, 4].contains(index))
        );
    }

    #[test]
    fn invalid_query_matches_nothing_and_starves_restricted_draws() {
        let mut core = core_with(&["a", "b", "c", "d"], settings(1, 3));
        core.set_restrict_to_query(true);
        core.set_query("title=\"open");

        assert!(!core.query_is_valid());
        assert!(core.search_results().is_empty());
        assert!(core.browse_rows().is_empty());
        assert_eq!(core.playlist().len(), 1);
        assert_eq!(core.buffer_status(), BufferStatus::Exhausted { missing: 3 });

        core.set_query("");
        assert_eq!(core.buffer_status(), BufferStatus::Filled);
        assert_eq!(core.playlist().len(), 4);
    }

    #[test]
    fn query_edit_in_browse_keeps_the_selection() {
        let mut core = core_with(&["alpha", "beta", "gamma", "delta"], settings(1, 2));
        core.play_from(ListKind::Browse, 2).expect("browse");
        let generation = core.cursor().generation();

        core.set_query("a");
        assert_eq!(core.cursor().browse_index(), 2);
        assert_eq!(core.cursor().generation(), generation);

        core.set_query("delta");
        assert_eq!(
            core.cursor().browse_slot(),
            crate::navigation::ResultSlot::Before(0)
        );
        core.play_next().expect("next");
        assert_eq!(core.cursor().browse_index(), 3);
    }

    #[test]
    fn stale_resolutions_are_ignored() {
        let mut core = core_with(&["a", "b", "c"], settings(1, 2));
        let request = core.resolve_request().expect("request");
        core.play_next().expect("next");

        let outcome = core.complete_resolve(request, Ok(String::from("a.mp3")));
        assert_eq!(outcome, ResolveOutcome::Stale);
        assert_eq!(core.unplayable_count(), 0);
    }

    #[test]
    fn failed_resolution_skips_and_excludes_the_item() {
        let mut core = core_with(&["a", "b", "c", "d"], settings(1, 2));
        let request = core.resolve_request().expect("request");

        let outcome = core.complete_resolve(request, Err(anyhow::anyhow!("missing file")));
        assert_eq!(outcome, ResolveOutcome::Skipped);
        assert_eq!(core.cursor().playlist_position(), 1);
        assert_eq!(core.unplayable_count(), 1);

        core.reshuffle();
        let skipped = request.pool_index;
        assert!(core.playlist().entries()[2..].iter().all(|index| *index != skipped));

        let current = core.resolve_request().expect("request");
        let outcome = core.complete_resolve(current, Ok(String::from("ok.mp3")));
        assert_eq!(outcome, ResolveOutcome::Ready(String::from("ok.mp3")));
    }

    #[test]
    fn failed_item_never_comes_back_in_a_forced_rotation() {
        for seed in 0..20 {
            let mut core = PlayerCore::with_seed(Settings::default(), DrawSeed::new(seed));
            core.load_pool(songs(&["a", "b", "c"]));
            assert_eq!(core.window(), 2);

            let request = core.resolve_request().expect("request");
            let failed = request.pool_index;
            core.complete_resolve(request, Err(anyhow::anyhow!("missing file")));
            assert!(!core.playlist().entries()[1..].contains(&failed));

            for _ in 0..12 {
                core.play_next().expect("next");
                assert_ne!(core.now_playing().map(|item| item.index), Some(failed));
            }
            assert!(!core.playlist().entries()[1..].contains(&failed));
            assert!(matches!(core.buffer_status(), BufferStatus::Exhausted { .. }));
            assert_eq!(core.cursor().playlist_position(), core.playlist().len());
        }
    }

    #[test]
    fn browse_skip_stops_when_no_result_is_playable() {
        let mut core = core_with(&["alpha", "beta", "gamma"], settings(1, 2));
        core.set_query("alpha");
        core.play_from(ListKind::Browse, 0).expect("browse");
        let request = core.resolve_request().expect("request");
        let generation = core.cursor().generation();

        let outcome = core.complete_resolve(request, Err(anyhow::anyhow!("gone")));
        assert_eq!(outcome, ResolveOutcome::Skipped);
        assert_eq!(core.status, "No playable items left");
        assert_eq!(core.cursor().generation(), generation);
        assert_eq!(core.cursor().browse_index(), 0);
        assert!(core.resolve_request().is_none());

        core.set_query("a");
        assert_eq!(core.search_results(), &[0, 1, 2]);
        core.play_next().expect("next");
        assert_eq!(core.cursor().browse_index(), 1);
        core.play_prev().expect("prev");
        assert_eq!(core.cursor().browse_index(), 2);
        assert_eq!(core.browse_rows().len(), 3);
        assert!(core.browse_rows()[2].selected);
    }

    #[test]
    fn songs_left_stops_autoplay() {
        let mut core = core_with(&["a", "b", "c"], settings(1, 2));
        core.set_songs_left(Some(2));
        assert!(core.track_ended());
        assert!(core.track_ended());
        assert!(!core.track_ended());
        assert_eq!(core.cursor().playlist_position(), 2);
        assert_eq!(core.songs_left(), Some(0));

        core.set_songs_left(None);
        assert!(core.track_ended());
    }

    #[test]
    fn upcoming_rows_span_behind_and_ahead() {
        let mut core = core_with(&["a", "b", "c", "d", "e"], settings(2, 2));
        core.set_look_behind(1);
        let rows = core.upcoming_rows();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].item.is_none());
        assert!(rows[1].selected);
        assert!(rows[2..].iter().all(|row| row.item.is_some()));
        assert!(rows.iter().all(|row| !row.queued));

        core.queue_next(4).expect("queue");
        let rows = core.upcoming_rows();
        assert!(rows[2].queued);
        assert!(!rows[3].queued);

        core.play_from(ListKind::Browse, 0).expect("browse");
        assert!(core.upcoming_rows().iter().all(|row| !row.selected));
        assert!(core.browse_rows()[0].selected);
    }

    #[test]
    fn reloading_the_pool_starts_over() {
        let mut core = core_with(&["a", "b", "c"], settings(1, 2));
        core.play_next().expect("next");
        core.play_from(ListKind::Browse, 1).expect("browse");

        core.load_pool(songs(&["x", "y", "z", "w"]));
        assert_eq!(core.cursor().active(), ListKind::Playlist);
        assert_eq!(core.cursor().position(), 0);
        assert_eq!(core.playlist().len(), 3);
        assert_eq!(core.eligible().pool_len(), 4);
        assert_complement(&core);
    }

    proptest! {
        #[test]
        fn engine_invariants_hold_after_random_ops(
            pool_len in 2usize..10,
            window_seed in 0usize..10,
            ops in proptest::collection::vec((0u8..9, 0usize..12), 1..120),
        ) {
            let titles: Vec<String> = (0..pool_len).map(|n| format!("song_{n}")).collect();
            let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
            let mut core = core_with(&titles, settings(window_seed % pool_len, 3));
            // History drawn under a smaller window may repeat within a larger one.
            let mut resized = false;

            for (op, arg) in ops {
                let playlist_position = core.cursor().playlist_position();
                match op {
                    0 => { let _ = core.play_next(); }
                    1 => { let _ = core.play_prev(); }
                    2 => { let _ = core.play_from(ListKind::Browse, arg % pool_len); }
                    3 => { let _ = core.resume_playlist(); }
                    4 => { let _ = core.remove_upcoming(1 + arg % 3); }
                    5 => core.reshuffle(),
                    6 => {
                        resized |= core.set_no_repeat_window(Some(arg % pool_len)).is_ok();
                    }
                    7 => core.set_query(&format!("{}", arg % 4)),
                    _ => core.set_look_ahead(arg % 5),
                }

                if core.cursor().active() == ListKind::Browse {
                    prop_assert!(core.cursor().playlist_position() == playlist_position);
                }

                let banned = banned_tail(&core);
                prop_assert!(core.eligible().len() == pool_len - banned.len());
                prop_assert!(core.eligible().iter().all(|index| !banned.contains(&index)));
                prop_assert!(core.eligible().len() + core.window() >= pool_len);

                if !resized {
                    let entries = core.playlist().entries();
                    for (position, index) in entries.iter().enumerate() {
                        let from = position.saturating_sub(core.window());
                        prop_assert!(!entries[from..position].contains(index));
                    }
                }
            }
        }
    }
}
