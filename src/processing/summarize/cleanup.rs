//! Cosmetic cleanup of model output. Patterns are anchored to the start or end of the text.

use regex::Regex;
use std::sync::OnceLock;

fn preamble() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:sure[!,.]?\s*|certainly[!,.]?\s*|okay[!,.]?\s*)?(?:here(?:'s|’s| is) (?:a |the )?summary(?:\s+of\s+[^:\n]*)?(?:,\s*[^:\n]*)?|summary(?:\s+(?:text|of\s+[^:\n]*))?)\s*:\s*)",
        )
        .expect("preamble pattern compiles")
    })
}

fn trailing_annotation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*\[(?:References?|Note|Source)[^\]]*\]\s*$")
            .expect("annotation pattern compiles")
    })
}

fn trailing_filler() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(^|[.!?\n])\s*(?:Let me know if|I hope (?:this|that)|Feel free to|If you (?:need|want|have))[^\n]*$",
        )
        .expect("filler pattern compiles")
    })
}

/// Usable summary text, or `None` for blank output and the `None` sentinel (before or after
/// cleanup).
pub(crate) fn accept(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_empty_marker(trimmed) {
        return None;
    }
    let cleaned = clean(trimmed);
    if is_empty_marker(&cleaned) {
        return None;
    }
    Some(cleaned)
}

fn is_empty_marker(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("none") || text.eq_ignore_ascii_case("\"none\"")
}

/// Strip a leading preamble, a trailing bracketed annotation and trailing filler.
pub(crate) fn clean(text: &str) -> String {
    let text = preamble().replace(text.trim(), "");
    let text = trailing_annotation().replace(text.trim_end(), "");
    let text = trailing_filler().replace(text.trim_end(), "${1}");
    text.trim().to_string()
}
