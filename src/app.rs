use crate::config;
use crate::core::{PlayerCore, ResolveOutcome, ResolveRequest};
use crate::library;
use crate::model::{Item, ListKind};
use crate::player::{self, Player};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::{info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    pub folders: Vec<PathBuf>,
    pub documents: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Command,
}

type Resolution = (ResolveRequest, Result<String>);

pub struct App {
    pub core: PlayerCore,
    player: Box<dyn Player>,
    pub focus: ListKind,
    /// Selected row of the upcoming panel, relative to the playlist position.
    pub upcoming_offset: isize,
    pub browse_row: usize,
    pub input_mode: InputMode,
    pub input: String,
    documents: Vec<PathBuf>,
    requested: Option<u64>,
    in_flight: usize,
    resolved_tx: Sender<Resolution>,
    resolved_rx: Receiver<Resolution>,
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let mut settings = config::load_settings()?;
    for folder in &options.folders {
        let folder = config::normalize_path(folder);
        if !settings.folders.contains(&folder) {
            settings.folders.push(folder);
        }
    }

    let player = player::for_settings(&settings);
    let mut app = App::new(PlayerCore::new(settings), player, options.documents);
    app.reload_pool();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        app.pump();

        if app.core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| crate::ui::draw(frame, &app))?;
            app.core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if app.handle_key(key) {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    app.player.stop();
    let save_result = config::save_settings(app.core.settings());
    result?;
    save_result?;
    Ok(())
}

/// Scans folders and reads documents into one pool. Unreadable documents
/// are skipped and returned.
pub fn load_sources(
    folders: &[PathBuf],
    documents: &[PathBuf],
) -> (Vec<Item>, Vec<anyhow::Error>) {
    let mut items = library::scan_many(folders);
    let mut errors = Vec::new();
    for document in documents {
        match library::load_document(document) {
            Ok(mut loaded) => items.append(&mut loaded),
            Err(err) => {
                warn!("{err:#}");
                errors.push(err);
            }
        }
    }
    (items, errors)
}

impl App {
    pub fn new(core: PlayerCore, player: Box<dyn Player>, documents: Vec<PathBuf>) -> Self {
        let (resolved_tx, resolved_rx) = mpsc::channel();
        Self {
            core,
            player,
            focus: ListKind::Playlist,
            upcoming_offset: 0,
            browse_row: 0,
            input_mode: InputMode::Normal,
            input: String::new(),
            documents,
            requested: None,
            in_flight: 0,
            resolved_tx,
            resolved_rx,
        }
    }

    pub fn player(&self) -> &dyn Player {
        &*self.player
    }

    pub fn reload_pool(&mut self) {
        let (items, errors) = load_sources(&self.core.settings().folders, &self.documents);
        self.core.load_pool(items);
        self.upcoming_offset = 0;
        self.browse_row = 0;
        if let Some(err) = errors.first() {
            self.report(format!("load error: {err:#}"));
        }
    }

    /// One turn of background work: start resolving a newly selected item,
    /// collect finished resolutions and advance when playback ends.
    pub fn pump(&mut self) {
        self.request_if_moved();

        while let Ok((request, result)) = self.resolved_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            match self.core.complete_resolve(request, result) {
                ResolveOutcome::Ready(uri) => {
                    if let Err(err) = self.player.play(&uri) {
                        self.report(format!("playback error: {err:#}"));
                    }
                }
                ResolveOutcome::Stale | ResolveOutcome::Skipped => {}
            }
        }

        if self.player.is_finished() && !self.core.track_ended() {
            self.player.stop();
        }
    }

    fn request_if_moved(&mut self) {
        let generation = self.core.cursor().generation();
        if self.requested == Some(generation) {
            return;
        }
        self.requested = Some(generation);
        self.player.stop();

        let Some(request) = self.core.resolve_request() else {
            return;
        };
        let Some(source) = self
            .core
            .pool()
            .get(request.pool_index)
            .map(|item| item.source.clone())
        else {
            return;
        };

        let tx = self.resolved_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = source.resolve();
            // The receiver is gone only when the app is shutting down.
            let _ = tx.send((request, result));
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        match self.input_mode {
            InputMode::Search => {
                self.handle_search_key(key);
                false
            }
            InputMode::Command => {
                self.handle_command_key(key);
                false
            }
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => {
                self.focus = self.focus.toggle();
                self.core.dirty = true;
            }
            KeyCode::Down => self.move_selection(1),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter => self.activate_selection(),
            KeyCode::Char('n') | KeyCode::Right => {
                let result = self.core.play_next();
                self.report_result(result);
                self.sync_browse_row();
            }
            KeyCode::Char('p') | KeyCode::Left => {
                let result = self.core.play_prev();
                self.report_result(result);
                self.sync_browse_row();
            }
            KeyCode::Char('b') => {
                let result = self.core.resume_playlist();
                self.report_result(result);
            }
            KeyCode::Char('+') => self.queue_browse_selection(),
            KeyCode::Char('x') | KeyCode::Delete => self.remove_selected_upcoming(),
            KeyCode::Char('r') => self.core.reshuffle(),
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
                self.input = self.core.query_text().to_string();
                self.core.dirty = true;
            }
            KeyCode::Char(':') => {
                self.input_mode = InputMode::Command;
                self.input.clear();
                self.core.dirty = true;
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                self.input_mode = InputMode::Normal;
                self.apply_query();
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.focus = ListKind::Browse;
                self.core.dirty = true;
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.apply_query();
            }
            KeyCode::Char(ch) => {
                self.input.push(ch);
                self.apply_query();
            }
            _ => {}
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input.clear();
                self.core.dirty = true;
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.input);
                self.input_mode = InputMode::Normal;
                self.run_command(&command);
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.core.dirty = true;
            }
            KeyCode::Char(ch) => {
                self.input.push(ch);
                self.core.dirty = true;
            }
            _ => {}
        }
    }

    fn apply_query(&mut self) {
        let text = self.input.clone();
        self.core.set_query(&text);
        self.sync_browse_row();
    }

    fn move_selection(&mut self, delta: isize) {
        match self.focus {
            ListKind::Playlist => {
                let behind = self.core.settings().look_behind_before as isize;
                let ahead = self.core.settings().look_ahead_after as isize;
                self.upcoming_offset = (self.upcoming_offset + delta).clamp(-behind, ahead);
            }
            ListKind::Browse => {
                let last = self.core.search_results().len().saturating_sub(1);
                self.browse_row = self.browse_row.saturating_add_signed(delta).min(last);
            }
        }
        self.core.dirty = true;
    }

    fn activate_selection(&mut self) {
        let result = match self.focus {
            ListKind::Playlist => {
                let offset = std::mem::take(&mut self.upcoming_offset);
                if offset == 0 {
                    self.core.resume_playlist()
                } else {
                    self.core.step(offset)
                }
            }
            ListKind::Browse => match self.selected_browse_item() {
                Some(index) => self.core.play_from(ListKind::Browse, index),
                None => return,
            },
        };
        self.report_result(result);
    }

    fn queue_browse_selection(&mut self) {
        let Some(index) = self.selected_browse_item() else {
            self.report(String::from("Nothing selected to queue"));
            return;
        };
        let result = self.core.queue_next(index);
        self.report_result(result);
    }

    fn remove_selected_upcoming(&mut self) {
        let Ok(offset) = usize::try_from(self.upcoming_offset) else {
            self.report(String::from("Only upcoming songs can be removed"));
            return;
        };
        let result = self.core.remove_upcoming(offset).map(|_| ());
        self.report_result(result);
    }

    fn selected_browse_item(&self) -> Option<usize> {
        self.core.search_results().get(self.browse_row).copied()
    }

    fn sync_browse_row(&mut self) {
        let results = self.core.search_results();
        self.browse_row = match self.core.cursor().browse_slot().rank() {
            Some(rank) if self.core.cursor().active() == ListKind::Browse => rank,
            _ => self.browse_row.min(results.len().saturating_sub(1)),
        };
    }

    pub fn run_command(&mut self, raw: &str) {
        let input = raw.trim();
        if input.is_empty() {
            self.report(String::from("No command"));
            return;
        }

        let mut command_split = input.splitn(2, char::is_whitespace);
        let command = command_split.next().unwrap_or_default();
        let rest = command_split.next().unwrap_or("").trim();

        match command {
            "help" => self.report(String::from(
                "Commands: norepeat <n|auto> | ahead <n> | behind <n> | restrict <on|off> | wrap <on|off> | unicode <on|off> | folder <path> | load <file.json> | songs <n|off> | save",
            )),
            "norepeat" => {
                let window = match rest {
                    "auto" => None,
                    value => match value.parse::<usize>() {
                        Ok(window) => Some(window),
                        Err(_) => {
                            self.report(String::from("Usage: norepeat <n|auto>"));
                            return;
                        }
                    },
                };
                match self.core.set_no_repeat_window(window) {
                    Ok(()) => self.report(format!("No-repeat window: {}", self.core.window())),
                    Err(err) => self.report(err.to_string()),
                }
            }
            "ahead" => match rest.parse::<usize>() {
                Ok(count) => {
                    self.core.set_look_ahead(count);
                    let applied = self.core.settings().look_ahead_after;
                    self.report(format!("Look-ahead: {applied}"));
                }
                Err(_) => self.report(String::from("Usage: ahead <n>")),
            },
            "behind" => match rest.parse::<usize>() {
                Ok(count) => {
                    self.core.set_look_behind(count);
                    let applied = self.core.settings().look_behind_before;
                    self.report(format!("Look-behind: {applied}"));
                }
                Err(_) => self.report(String::from("Usage: behind <n>")),
            },
            "restrict" => match parse_switch(rest) {
                Some(on) => {
                    self.core.set_restrict_to_query(on);
                    self.report(format!("Random draws restricted to query: {}", switch_label(on)));
                }
                None => self.report(String::from("Usage: restrict <on|off>")),
            },
            "wrap" => match parse_switch(rest) {
                Some(on) => {
                    self.core.set_browse_wrap(on);
                    self.report(format!("Browse wrap: {}", switch_label(on)));
                }
                None => self.report(String::from("Usage: wrap <on|off>")),
            },
            "unicode" => match parse_switch(rest) {
                Some(on) => {
                    self.core.set_use_unicode(on);
                    self.report(format!("Unicode names: {}", switch_label(on)));
                }
                None => self.report(String::from("Usage: unicode <on|off>")),
            },
            "folder" => {
                if rest.is_empty() {
                    self.report(String::from("Usage: folder <path>"));
                    return;
                }
                let folder = config::normalize_path(Path::new(rest));
                if !folder.is_dir() {
                    self.report(format!("Not a folder: {}", folder.display()));
                    return;
                }
                let mut folders = self.core.settings().folders.clone();
                if !folders.contains(&folder) {
                    folders.push(folder);
                }
                self.core.set_folders(folders);
                self.reload_pool();
            }
            "load" => {
                if rest.is_empty() {
                    self.report(String::from("Usage: load <file.json>"));
                    return;
                }
                let document = PathBuf::from(rest);
                if let Err(err) = library::load_document(&document) {
                    self.report(format!("load error: {err:#}"));
                    return;
                }
                info!("adding playlist document {}", document.display());
                self.documents.push(document);
                self.reload_pool();
            }
            "songs" => {
                let limit = match rest {
                    "off" => None,
                    value => match value.parse::<u32>() {
                        Ok(limit) => Some(limit),
                        Err(_) => {
                            self.report(String::from("Usage: songs <n|off>"));
                            return;
                        }
                    },
                };
                self.core.set_songs_left(limit);
                self.report(match limit {
                    Some(limit) => format!("Stopping after {limit} more songs"),
                    None => String::from("Playing without a song limit"),
                });
            }
            "save" => match config::save_settings(self.core.settings()) {
                Ok(()) => self.report(String::from("Settings saved")),
                Err(err) => self.report(format!("save error: {err:#}")),
            },
            _ => self.report(String::from("Unknown command. Use :help")),
        }
    }

    fn report_result(&mut self, result: crate::error::Result<()>) {
        if let Err(err) = result {
            self.report(err.to_string());
        }
    }

    fn report(&mut self, message: String) {
        self.core.status = message;
        self.core.dirty = true;
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn switch_label(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
