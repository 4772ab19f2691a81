use std::sync::LazyLock;

use regex::Regex;

use crate::source::SourceRecord;

static PARENTHESES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\[[^\]]*\]").unwrap());
static SOUNDTRACK_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Original Motion Picture Soundtrack|From.*Album)").unwrap()
});
static ARTIST_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)( - topic|official|music|audio)").unwrap());
static ARTIST_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",|&|feat\.|Feat\.|featuring|Featuring").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A source track reduced to the pieces used for searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTrack {
    pub cleaned_title: String,
    pub artist_variants: Vec<String>,
}

/// Strip annotations and soundtrack markers from a raw title.
///
/// `"Kesariya (From \"Brahmastra\") [Lofi]"` becomes `"kesariya"`.
pub fn clean_title(raw: &str) -> String {
    let title = PARENTHESES.replace_all(raw, "");
    let title = BRACKETS.replace_all(&title, "");
    let title = SOUNDTRACK_MARKERS.replace_all(&title, "");
    title.to_lowercase().trim().to_string()
}

/// Lower-case an artist name and drop channel noise like "- Topic" or "Official".
pub fn clean_artist(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    ARTIST_NOISE.replace_all(&lowered, "").trim().to_string()
}

/// Comparison form: lower-case, punctuation turned into spaces, whitespace collapsed.
pub fn normalize_for_comparison(s: &str) -> String {
    let lowered = s.to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE_RUNS
        .replace_all(&spaced, " ")
        .trim()
        .to_string()
}

/// Split a raw artist credit on `,`, `&` and featuring markers, cleaning each piece.
///
/// Pieces that are blank are skipped. The separators are matched literally
/// (`feat.` and `Feat.` but not `FEAT.`).
pub fn artist_variants(raw_artist: &str) -> Vec<String> {
    ARTIST_SEPARATORS
        .split(raw_artist)
        .filter(|piece| !piece.trim().is_empty())
        .map(clean_artist)
        .collect()
}

pub fn normalize_track(record: &SourceRecord) -> NormalizedTrack {
    NormalizedTrack {
        cleaned_title: clean_title(&record.title),
        artist_variants: artist_variants(&record.artist),
    }
}
