use crate::normalize::normalize_for_comparison;

/// Keywords that mark a search result as an altered version of a song.
pub const UNWANTED_KEYWORDS: [&str; 16] = [
    "remix",
    "lofi",
    "lo-fi",
    "chill",
    "version",
    "cover",
    "mix",
    "edit",
    "acoustic",
    "reverb",
    "slowed",
    "speedup",
    "sped up",
    "nightcore",
    "karaoke",
    "reprise",
];

/// Whether `candidate_name` looks like a variant the source never asked for.
///
/// A keyword only rejects a candidate when the raw source title does not
/// mention it as well, so an "(Acoustic)" source still matches acoustic
/// results. Matching is on normalized substrings: "remix" also hits "mix".
pub fn is_unwanted_variant(candidate_name: &str, raw_source_title: &str) -> bool {
    let candidate = normalize_for_comparison(candidate_name);
    let source = normalize_for_comparison(raw_source_title);

    UNWANTED_KEYWORDS.iter().any(|keyword| {
        let keyword = normalize_for_comparison(keyword);
        candidate.contains(&keyword) && !source.contains(&keyword)
    })
}
