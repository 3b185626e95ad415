use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::endpoints::ITEM_URL_MARKER;
use crate::error::{FetchError, Result};
use crate::item::{Item, SeriesLink};

pub const MARKER_FILE_NAME: &str = "series_completed.txt";
const MARKER_CONTENTS: &str = "completed";
const ITEM_EXTENSION: &str = "txt";

const TITLE_LABEL: &str = "Title: ";
const AUTHOR_LABEL: &str = "Author: ";
const CREATED_LABEL: &str = "Created: ";
const TAGS_LABEL: &str = "Tags: ";
const URL_LABEL: &str = "URL: ";
const SERIES_LABEL: &str = "Series: ";
const CHAPTER_LABEL: &str = "Chapter: ";

pub fn header_separator() -> String {
    "=".repeat(50)
}

/// Keeps alphanumerics, spaces, `-` and `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Target directory for `item`: the series subdirectory, or `root` itself.
pub fn item_dir(root: &Path, series_link: Option<&SeriesLink>) -> PathBuf {
    match series_link {
        Some(link) => root.join(series_dir_name(link)),
        None => root.to_path_buf(),
    }
}

fn series_dir_name(link: &SeriesLink) -> String {
    let name = sanitize_file_name(&link.series_title);
    if name.is_empty() {
        format!("series_{}", link.series_id)
    } else {
        name
    }
}

pub fn render_item(item: &Item, canonical_url: &str) -> String {
    let mut out = String::with_capacity(item.body.len() + 256);
    out.push_str(&format!("{TITLE_LABEL}{}\n", item.title));
    out.push_str(&format!("{AUTHOR_LABEL}{}\n", item.author));
    out.push_str(&format!("{CREATED_LABEL}{}\n", item.created_at));
    out.push_str(&format!("{TAGS_LABEL}{}\n", item.tags.join(", ")));
    out.push_str(&format!("{URL_LABEL}{canonical_url}\n"));
    if let Some(link) = &item.series_link {
        out.push_str(&format!("{SERIES_LABEL}{}\n", link.series_title));
        if let Some(order) = link.order {
            out.push_str(&format!("{CHAPTER_LABEL}{order}\n"));
        }
    }
    out.push('\n');
    out.push_str(&header_separator());
    out.push_str("\n\n");
    out.push_str(&item.body);
    out
}

/// Writes `item` into `dir` atomically and returns the file path.
pub fn write_item(dir: &Path, item: &Item, canonical_url: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|err| FetchError::persistence(dir, err))?;

    let path = item_path(dir, item);
    let mut file =
        tempfile::NamedTempFile::new_in(dir).map_err(|err| FetchError::persistence(dir, err))?;
    file.write_all(render_item(item, canonical_url).as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| FetchError::persistence(&path, err))?;
    file.persist(&path)
        .map_err(|err| FetchError::persistence(&path, err.error))?;

    tracing::info!(id = %item.id, path = %path.display(), "saved item");
    Ok(path)
}

/// `<title>.txt`, or `<title> (<id>).txt` when the plain name is already taken
/// by anything other than this item.
fn item_path(dir: &Path, item: &Item) -> PathBuf {
    let mut stem = sanitize_file_name(&item.title);
    if stem.is_empty() {
        stem = item.id.clone();
    }
    let plain = dir.join(format!("{stem}.{ITEM_EXTENSION}"));
    if !plain.exists() || read_persisted_id(&plain).as_deref() == Some(item.id.as_str()) {
        return plain;
    }
    dir.join(format!("{stem} ({}).{ITEM_EXTENSION}", item.id))
}

/// Item id embedded in the header URL of a persisted file.
pub fn read_persisted_id(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    persisted_id_in(&contents)
}

pub fn persisted_id_in(contents: &str) -> Option<String> {
    let (_, rest) = contents.split_once(ITEM_URL_MARKER)?;
    let id = rest.split_whitespace().next()?;
    (!id.is_empty()).then(|| id.to_owned())
}

/// Ids of all items persisted in `dir`. A missing directory holds nothing.
pub fn scan_persisted_ids(dir: &Path) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    if !dir.exists() {
        return Ok(ids);
    }
    for path in item_files(dir)? {
        match read_persisted_id(&path) {
            Some(id) => {
                ids.insert(id);
            }
            None => tracing::debug!(path = %path.display(), "no item id in file; skipping"),
        }
    }
    Ok(ids)
}

/// `.txt` files in `dir` except the completion marker, sorted by file name.
pub fn item_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|err| FetchError::persistence(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FetchError::persistence(dir, err))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXTENSION) {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(MARKER_FILE_NAME) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Overwrites the completion marker in `dir`.
pub fn write_marker(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| FetchError::persistence(dir, err))?;
    let path = dir.join(MARKER_FILE_NAME);
    std::fs::write(&path, MARKER_CONTENTS).map_err(|err| FetchError::persistence(&path, err))?;
    tracing::info!(dir = %dir.display(), "marked series complete");
    Ok(())
}

pub fn has_marker(dir: &Path) -> bool {
    dir.join(MARKER_FILE_NAME).is_file()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemHeader {
    pub title: String,
    pub author: String,
    pub created_at: String,
    pub tags: Vec<String>,
    pub url: String,
    pub series_title: Option<String>,
    pub chapter: Option<u32>,
}

/// Splits a persisted file into its header fields and body. `None` when the
/// separator line is missing.
pub fn parse_item_file(contents: &str) -> Option<(ItemHeader, &str)> {
    let separator = header_separator();
    let mut offset = 0usize;
    let mut header_end = None;
    for line in contents.split_inclusive('\n') {
        if line.trim_end() == separator {
            header_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let (header_len, body_start) = header_end?;

    let mut header = ItemHeader::default();
    for line in contents[..header_len].lines() {
        if let Some(value) = line.strip_prefix(TITLE_LABEL) {
            header.title = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix(AUTHOR_LABEL) {
            header.author = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix(CREATED_LABEL) {
            header.created_at = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix(TAGS_LABEL) {
            header.tags = value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect();
        } else if let Some(value) = line.strip_prefix(URL_LABEL) {
            header.url = value.trim().to_owned();
        } else if let Some(value) = line.strip_prefix(SERIES_LABEL) {
            header.series_title = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix(CHAPTER_LABEL) {
            header.chapter = value.trim().parse().ok();
        }
    }

    let body = contents[body_start..].trim_start_matches(['\r', '\n']);
    Some((header, body))
}
