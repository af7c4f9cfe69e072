use unicode_normalization::UnicodeNormalization;

/// Apply NFKC normalization to text.
///
/// The KoBERT sentencepiece vocabulary was built from NFKC-normalized text, so
/// full-width ASCII and compatibility jamo would otherwise fall through to the
/// unknown token.
///
/// NFKC normalization converts:
/// - Full-width ASCII → Half-width: `（` → `(`, `！` → `!`, `？` → `?`
/// - Full-width digits → Half-width: `０` → `0`, `１` → `1`
/// - Compatibility characters → Canonical forms
///
/// Precomposed Hangul syllables are NOT affected.
pub fn normalize_nfkc(text: &str) -> String {
    text.nfkc().collect()
}

/// Normalize an optional raw segment: a missing segment becomes the empty string.
pub fn normalize_segment(text: Option<&str>) -> &str {
    text.unwrap_or_default()
}

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
