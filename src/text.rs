//! Label normalization used by every piece of matching logic.
//!
//! The portal exposes no stable identifiers: resources, calendar headers
//! and slot statuses are all free text, localized and inconsistently
//! accented. Matching therefore happens on a folded form of the text.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold a label for matching: strip diacritics (NFKD, drop combining
/// marks), lowercase, collapse whitespace runs and trim.
///
/// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(label: &str) -> String {
    let stripped: String = label.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First embedded run of ASCII digits in a label, e.g. the court number
/// in "Quadra de Tênis 2". `None` when the label carries no number or
/// the run overflows a `u32`.
pub fn embedded_number(label: &str) -> Option<u32> {
    let mut digits = String::new();
    for c in label.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize("Quadra de Tênis 2"), "quadra de tenis 2");
        assert_eq!(normalize("março"), "marco");
        assert_eq!(normalize("INDISPONÍVEL"), "indisponivel");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  Quadra   de\tTênis  "), "quadra de tenis");
        assert_eq!(normalize("\n"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["Quadra de Tênis 1", "  SÁBADO  ", "çÇáéíóúâêôãõ", ""] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_embedded_number() {
        assert_eq!(embedded_number("Quadra de Tênis 2"), Some(2));
        assert_eq!(embedded_number("Quadra 10 (coberta)"), Some(10));
        assert_eq!(embedded_number("Salão de Festas"), None);
        assert_eq!(embedded_number(""), None);
    }

    #[test]
    fn test_embedded_number_takes_first_run() {
        assert_eq!(embedded_number("Quadra 3 - Bloco 7"), Some(3));
    }
}
