use crate::normalize::artist_variants;

/// Title up to the first `-`, trimmed. The whole title when there is no hyphen.
fn first_segment_before_hyphen(title: &str) -> &str {
    title.split('-').next().unwrap_or(title).trim()
}

/// Build the ordered list of search queries for a track.
///
/// Callers search these in order and stop at the first acceptable match, so
/// the most specific queries come first. The list always has
/// `4 + 2 * artist_variants(raw_artist).len()` entries; duplicates are kept.
pub fn generate_queries(cleaned_title: &str, raw_artist: &str) -> Vec<String> {
    let variants = artist_variants(raw_artist);
    let mut queries = Vec::with_capacity(4 + 2 * variants.len());

    queries.push(format!("track:{} artist:{}", cleaned_title, raw_artist));
    queries.push(format!("{} {}", cleaned_title, raw_artist));
    queries.push(cleaned_title.to_string());
    queries.push(format!(
        "{} {}",
        first_segment_before_hyphen(cleaned_title),
        raw_artist
    ));

    for variant in variants {
        queries.push(format!("track:{} artist:{}", cleaned_title, variant));
        queries.push(format!("{} {}", cleaned_title, variant));
    }

    queries
}
