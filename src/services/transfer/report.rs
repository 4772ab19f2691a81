use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use color_eyre::eyre::{Result, WrapErr};
use regex::Regex;

use super::types::ResolutionReport;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-_. ]").unwrap());

/// Replace anything that is not a word character, `-`, `_`, `.` or space.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name, "_").to_string()
}

pub fn not_found_file_path(directory: &Path, playlist_name: &str) -> PathBuf {
    directory.join(format!(
        "{}_tracks_not_found.txt",
        sanitize_filename(playlist_name)
    ))
}

/// `"<title> by <artist>"` for every unresolved record.
///
/// Completion order unless `sort_by_ordinal` asks for source order.
pub fn not_found_lines(report: &ResolutionReport, sort_by_ordinal: bool) -> Vec<String> {
    let mut records: Vec<_> = report.not_found.iter().map(|o| &o.record).collect();
    if sort_by_ordinal {
        records.sort_by_key(|record| record.ordinal);
    }
    records.into_iter().map(|record| record.describe()).collect()
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .wrap_err_with(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    tokio::fs::write(path, contents)
        .await
        .wrap_err_with(|| format!("Failed to write {}", path.display()))
}

/// Persist the not-found lines next to other reports for this playlist.
///
/// Best effort: returns the written path, or `None` when there was nothing
/// to write or writing failed (the failure is logged).
pub async fn write_not_found_file(
    directory: &Path,
    playlist_name: &str,
    lines: &[String],
) -> Option<PathBuf> {
    if lines.is_empty() {
        return None;
    }

    let path = not_found_file_path(directory, playlist_name);
    match write_lines(&path, lines).await {
        Ok(()) => {
            log::info!("Not-found songs saved to {}", path.display());
            Some(path)
        }
        Err(e) => {
            log::error!("Could not save not-found songs: {:?}", e);
            None
        }
    }
}
