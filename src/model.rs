use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Playlist,
    Browse,
}

impl ListKind {
    pub fn toggle(self) -> Self {
        match self {
            Self::Playlist => Self::Browse,
            Self::Browse => Self::Playlist,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::Browse => "browse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Where an item's audio lives. Resolution happens outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSource {
    File(PathBuf),
    Remote(String),
}

impl ItemSource {
    /// Turns the source into a URI an external player can open.
    pub fn resolve(&self) -> anyhow::Result<String> {
        match self {
            Self::File(path) => {
                let meta = std::fs::metadata(path)
                    .map_err(|err| anyhow::anyhow!("{}: {err}", path.display()))?;
                if !meta.is_file() {
                    anyhow::bail!("{} is not a file", path.display());
                }
                Ok(path.display().to_string())
            }
            Self::Remote(url) => {
                if url.trim().is_empty() {
                    anyhow::bail!("empty url");
                }
                Ok(url.clone())
            }
        }
    }

    fn stem(&self) -> String {
        match self {
            Self::File(path) => path
                .file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("unknown")
                .to_string(),
            Self::Remote(url) => url
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .map(|segment| segment.split('.').next().unwrap_or(segment).to_string())
                .unwrap_or_else(|| url.clone()),
        }
    }
}

/// One playable entry of the pool. `index` is its stable position.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub index: usize,
    pub source: ItemSource,
    pub metadata: BTreeMap<String, FieldValue>,
}

impl Item {
    pub fn new(source: ItemSource) -> Self {
        Self {
            index: 0,
            source,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(name.to_string(), value.into());
        self
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.metadata.get(field)? {
            FieldValue::Text(value) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    fn maybe_unicode(&self, field: &str, use_unicode: bool) -> Option<&str> {
        if use_unicode {
            if let Some(value) = self.text(&format!("{field}_unicode")) {
                return Some(value);
            }
        }
        self.text(field)
    }

    /// `artist - title`, falling back to the title and then the file stem.
    pub fn display_name(&self, use_unicode: bool) -> String {
        let title = self.maybe_unicode("title", use_unicode);
        let artist = self.maybe_unicode("artist", use_unicode);
        match (artist, title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.to_string(),
            (Some(artist), None) => format!("{artist} - {}", self.source.stem()),
            (None, None) => self.source.stem(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pool {
    items: Vec<Item>,
}

impl Pool {
    /// Assigns every item its position as a stable index.
    pub fn new(items: Vec<Item>) -> Self {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Item { index, ..item })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// `None` picks `min(100, pool - 1)` whenever a pool is loaded.
    #[serde(default)]
    pub no_repeat_window: Option<usize>,
    #[serde(default = "default_look_ahead_after")]
    pub look_ahead_after: usize,
    #[serde(default = "default_look_behind_before")]
    pub look_behind_before: usize,
    #[serde(default)]
    pub restrict_random_to_query: bool,
    #[serde(default = "default_browse_wrap")]
    pub browse_wrap: bool,
    #[serde(default)]
    pub use_unicode: bool,
    #[serde(default)]
    pub folders: Vec<PathBuf>,
    #[serde(default)]
    pub player_command: Option<String>,
}

pub const AUTO_NO_REPEAT_CAP: usize = 100;
pub const MAX_LOOK_AROUND: usize = 1000;

fn default_look_ahead_after() -> usize {
    10
}

fn default_look_behind_before() -> usize {
    5
}

fn default_browse_wrap() -> bool {
    true
}

impl Settings {
    /// Window size to use for a pool of `pool_len` items, always `< pool_len`.
    pub fn effective_window(&self, pool_len: usize) -> usize {
        let limit = pool_len.saturating_sub(1);
        self.no_repeat_window
            .unwrap_or(AUTO_NO_REPEAT_CAP)
            .min(limit)
    }

    pub fn clamp_look_around(&mut self) {
        self.look_ahead_after = self.look_ahead_after.min(MAX_LOOK_AROUND);
        self.look_behind_before = self.look_behind_before.min(MAX_LOOK_AROUND);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            no_repeat_window: None,
            look_ahead_after: default_look_ahead_after(),
            look_behind_before: default_look_behind_before(),
            restrict_random_to_query: false,
            browse_wrap: default_browse_wrap(),
            use_unicode: false,
            folders: Vec::new(),
            player_command: None,
        }
    }
}
