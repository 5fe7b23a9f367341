use crate::model::{FieldValue, Item, ItemSource};
use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

#[derive(Default)]
struct TagMetadata {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration_seconds: Option<u64>,
}

/// A playlist document is either a bare array of records or an object
/// holding one under `items`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Records(Vec<Map<String, Value>>),
    Wrapped { items: Vec<Map<String, Value>> },
}

pub fn scan_folder(root: &Path) -> Vec<Item> {
    let mut items = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("skipping unreadable entry under {}: {err}", root.display());
                None
            }
        })
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }
        items.push(item_for_file(path));
    }

    items.sort_by_key(source_key);
    info!("scanned {} audio files under {}", items.len(), root.display());
    items
}

pub fn scan_many(roots: &[PathBuf]) -> Vec<Item> {
    let mut all = Vec::new();
    for root in roots {
        all.extend(scan_folder(root));
    }
    all.sort_by_key(source_key);
    all.dedup_by(|a, b| a.source == b.source);
    all
}

fn item_for_file(path: &Path) -> Item {
    let tags = tag_metadata(path);
    let mut item = Item::new(ItemSource::File(path.to_path_buf()))
        .with_field("path", path.display().to_string());

    for (name, value) in [
        ("title", tags.title),
        ("artist", tags.artist),
        ("album", tags.album),
    ] {
        if let Some(value) = value {
            item = item.with_field(name, value);
        }
    }
    if let Some(seconds) = tags.duration_seconds {
        item = item.with_field("duration", seconds as f64);
    }
    item
}

fn tag_metadata(path: &Path) -> TagMetadata {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged_file) => tagged_file,
        Err(err) => {
            debug!("no readable tags in {}: {err}", path.display());
            return TagMetadata::default();
        }
    };

    let duration = tagged_file.properties().duration().as_secs();
    let mut metadata = TagMetadata {
        duration_seconds: (duration > 0).then_some(duration),
        ..TagMetadata::default()
    };

    if let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    {
        metadata.title = tag.title().and_then(|value| clean_text(&value));
        metadata.artist = tag.artist().and_then(|value| clean_text(&value));
        metadata.album = tag.album().and_then(|value| clean_text(&value));
    }
    metadata
}

fn clean_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads a JSON playlist document. Relative `path` entries resolve against
/// the document's folder.
pub fn load_document(path: &Path) -> Result<Vec<Item>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read playlist {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let items = parse_document(&raw, base)
        .with_context(|| format!("failed to parse playlist {}", path.display()))?;
    info!("loaded {} items from {}", items.len(), path.display());
    Ok(items)
}

pub fn parse_document(raw: &str, base: &Path) -> Result<Vec<Item>> {
    let records = match serde_json::from_str::<Document>(raw)? {
        Document::Records(records) | Document::Wrapped { items: records } => records,
    };

    let mut items = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        match item_for_record(record, base) {
            Some(item) => items.push(item),
            None => warn!("playlist record {position} has neither path nor url, skipped"),
        }
    }
    Ok(items)
}

fn item_for_record(record: Map<String, Value>, base: &Path) -> Option<Item> {
    let source = match (record_text(&record, "path"), record_text(&record, "url")) {
        (Some(path), _) => {
            let path = PathBuf::from(path);
            ItemSource::File(if path.is_relative() {
                base.join(path)
            } else {
                path
            })
        }
        (None, Some(url)) => ItemSource::Remote(url.to_string()),
        (None, None) => return None,
    };

    let mut item = Item::new(source);
    for (name, value) in record {
        let value = match value {
            Value::String(text) => FieldValue::Text(text),
            Value::Number(number) => match number.as_f64() {
                Some(number) => FieldValue::Number(number),
                None => continue,
            },
            _ => continue,
        };
        item = item.with_field(&name, value);
    }
    Some(item)
}

fn record_text<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn source_key(item: &Item) -> String {
    match &item.source {
        ItemSource::File(path) => path.display().to_string(),
        ItemSource::Remote(url) => url.clone(),
    }
}
