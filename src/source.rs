use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_PLAYLIST_NAME: &str = "Converted from Amazon Music";

/// The scraped page puts the playlist title on its ninth line.
const PLAYLIST_NAME_LINE: usize = 8;

/// One scraped entry from the source playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRecord {
    /// 1-based position in the source playlist. Informational only.
    pub ordinal: u32,
    pub title: String,
    pub artist: String,
}

impl SourceRecord {
    pub fn new(ordinal: u32, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            ordinal,
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// `"<title> by <artist>"`, the line format of the not-found report.
    pub fn describe(&self) -> String {
        format!("{} by {}", self.title, self.artist)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open track list {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read track list: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Number", default)]
    number: Option<String>,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Artist", default)]
    artist: String,
}

/// Parse `Number,Title,Artist` rows produced by the playlist cleaner.
///
/// Rows without a title are skipped. The ordinal comes from the `Number`
/// column and falls back to the row position when that column is unusable.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let position = index as u32 + 1;

        if row.title.is_empty() {
            log::warn!("Skipping row {} without a title", position);
            continue;
        }

        let ordinal = row
            .number
            .as_deref()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(position);

        records.push(SourceRecord {
            ordinal,
            title: row.title,
            artist: row.artist,
        });
    }

    log::debug!("Parsed {} source records", records.len());
    Ok(records)
}

pub fn load_records(path: &Path) -> Result<Vec<SourceRecord>, SourceError> {
    let file = std::fs::File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(file)
}

/// Playlist name from the raw scrape text, or the default name.
pub fn playlist_name_from_raw(contents: &str) -> String {
    contents
        .lines()
        .nth(PLAYLIST_NAME_LINE)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string())
}

/// Read the playlist name from the raw scrape file. Never fails: an
/// unreadable file falls back to [`DEFAULT_PLAYLIST_NAME`].
pub fn read_playlist_name(raw_path: &Path) -> String {
    match std::fs::read_to_string(raw_path) {
        Ok(contents) => playlist_name_from_raw(&contents),
        Err(e) => {
            log::warn!(
                "Could not read playlist name from {}: {}",
                raw_path.display(),
                e
            );
            DEFAULT_PLAYLIST_NAME.to_string()
        }
    }
}
