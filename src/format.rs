// src/format.rs
// Passage formatting: whitespace policy, poetry line breaks, reference suffix

use once_cell::sync::Lazy;
use regex::Regex;

use crate::passage::Passage;
use crate::reference::{Reference, Translation};

#[allow(clippy::expect_used)]
static HORIZONTAL_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
#[allow(clippy::expect_used)]
static SPACE_AROUND_NEWLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ?\n ?").expect("valid regex"));
#[allow(clippy::expect_used)]
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Separator between passage text and the reference suffix
const SUFFIX_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Keep verse-internal line breaks instead of flowing everything onto one line
    pub preserve_poetry: bool,
    /// Append " - <reference> <MARKER>"
    pub translation_suffix: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            preserve_poetry: false,
            translation_suffix: true,
        }
    }
}

/// Final text for a passage.
///
/// Empty passages give an empty string, with no suffix.
pub fn format_passage(passage: &Passage, options: FormatOptions) -> String {
    let body = format_text(&passage.lines.join("\n"), options.preserve_poetry);
    if body.is_empty() || !options.translation_suffix {
        return body;
    }
    append_suffix(&body, &reference_suffix(&passage.reference, passage.translation))
}

/// Apply the whitespace policy to raw text.
///
/// Default: all whitespace, line breaks included, collapses to single
/// spaces. Poetry: line breaks survive, runs of blank lines shrink to one.
pub fn format_text(text: &str, preserve_poetry: bool) -> String {
    if !preserve_poetry {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_SPACE_RE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE_RE.replace_all(&text, "\n");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// `" - John 3:16 KJV"`
pub fn reference_suffix(reference: &Reference, translation: Translation) -> String {
    format!("{SUFFIX_SEPARATOR}{reference} {}", translation.marker())
}

/// Append `suffix` unless `body` already ends with it.
pub fn append_suffix(body: &str, suffix: &str) -> String {
    if suffix.is_empty() || body.ends_with(suffix) {
        body.to_string()
    } else {
        format!("{body}{suffix}")
    }
}

/// HTML rendering for rich chat clients: escaped, line breaks as `<br />`.
pub fn to_html(text: &str) -> String {
    html_escape::encode_text(text).replace('\n', "<br />")
}
