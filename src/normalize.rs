//! Canonicalization of free-text names so that payee strings from bank statements can be compared
//! with contact names from the accounting service.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalizes `raw` for name comparison.
///
/// - Unicode compatibility decomposition (NFKD) with combining marks removed, so `Müller` becomes
///   `muller`.
/// - `ß` and `ẞ` become `ss`. Decomposition does not transliterate them.
/// - Commas and periods become spaces.
/// - Whitespace is collapsed and trimmed.
/// - Everything is lower-cased.
///
/// No other transliteration is done: `ü` is not expanded to `ue` and non-Latin scripts pass
/// through unchanged apart from case folding.
///
/// # Examples
/// ```
/// # use voucher_sync::normalize;
/// assert_eq!(normalize("Schmidt,  Hans"), "schmidt hans");
/// assert_eq!(normalize("Straße"), normalize("STRASSE"));
/// assert_eq!(normalize("Müller"), "muller");
/// ```
pub fn normalize(raw: &str) -> String {
    // Lower-case first so that characters whose lower-case form decomposes (e.g. 'İ') are folded
    // before the combining marks are dropped.
    let mut folded = String::with_capacity(raw.len());
    for c in raw.to_lowercase().nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            'ß' | 'ẞ' => folded.push_str("ss"),
            ',' | '.' => folded.push(' '),
            other => folded.push(other),
        }
    }

    // Compatibility decomposition can produce upper-case letters (e.g. 'Ⅻ').
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits an already-normalized string into words.
pub(crate) fn words(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|w| !w.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("Müller"), "muller");
        assert_eq!(normalize("MÜLLER"), "muller");
        assert_eq!(normalize("José Ñúñez"), "jose nunez");
        assert_eq!(normalize("Übungsleiterpauschale"), "ubungsleiterpauschale");
    }

    #[test]
    fn test_normalize_eszett() {
        assert_eq!(normalize("Straße"), "strasse");
        assert_eq!(normalize("Straße"), normalize("STRASSE"));
        assert_eq!(normalize("GROẞ"), "gross");
    }

    #[test]
    fn test_normalize_umlaut_is_not_transliterated() {
        assert_ne!(normalize("Müller"), normalize("Mueller"));
    }

    #[test]
    fn test_normalize_punctuation_and_whitespace() {
        let n = normalize("Schmidt, Hans");
        assert!(!n.contains(','));
        assert_eq!(n, "schmidt hans");
        assert_eq!(normalize("  Dr. Hans   Meier\t"), "dr hans meier");
        assert_eq!(normalize("Mueller,"), "mueller");
        assert_eq!(normalize("muller "), "muller");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" ,. "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Müller",
            "Straße",
            "GROẞ",
            "Schmidt, Hans",
            "THOMAS HOCHSTETTER NINA HOCHSTETTER",
            "Adrian und Diane Schmeichel",
            "İstanbul Çarşı",
            "Ⅻ Apostel e.V.",
            "ﬁnance Ltd.",
            "Gemeinde\u{00a0}Spende",
            "Ǆemal",
            "Åsa Ørsted",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize is not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_words() {
        assert_eq!(words("adrian und diane"), vec!["adrian", "und", "diane"]);
        assert!(words("").is_empty());
    }
}
