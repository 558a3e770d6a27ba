// src/reference/matcher.rs
// Reference detection over whitespace tokens
//
// Grammar:
//   reference     := book-spelling SP chapter-verse [SP translation]
//   chapter-verse := chapter [":" verse ["-" | "–" verse]] [translation]
//
// Tokens are classified as chapter-verse, translation code, or plain word.
// Book spellings span one or more plain words and are resolved through the
// catalog; the regex only recognizes the chapter-verse token.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{MatchMode, Reference, Translation, TranslationChoice};
use crate::catalog::{BookCatalog, is_worded_ordinal};

#[allow(clippy::expect_used)]
static CHAPTER_VERSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})(?::(\d{1,3})(?:[-\x{2013}](\d{1,3}))?)?([A-Za-z]+)?$")
        .expect("valid regex")
});

/// Punctuation that may wrap a reference inside prose: "(John 3:16),"
const LEADING_PUNCTUATION: &[char] = &['(', '[', '"', '\'', '\u{201c}', '\u{2018}'];
const TRAILING_PUNCTUATION: &[char] = &[
    ')', ']', '"', '\'', ',', ';', ':', '.', '!', '?', '\u{201d}', '\u{2019}',
];

/// A recognized `chapter[:verse[-verse]][code]` token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChapterVerse {
    chapter: u32,
    verse_start: Option<u32>,
    verse_end: Option<u32>,
    /// Translation code written without a space, as in "3:16kjv"
    glued: Option<Translation>,
}

impl ChapterVerse {
    fn parse(token: &str) -> Option<Self> {
        let caps = CHAPTER_VERSE_RE.captures(token)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let glued = match caps.get(4) {
            Some(code) => Some(Translation::from_code(code.as_str())?),
            None => None,
        };

        Some(Self {
            chapter: number(1)?,
            verse_start: number(2),
            verse_end: number(3),
            glued,
        })
    }

    fn has_verse(&self) -> bool {
        self.verse_start.is_some()
    }

    fn into_reference(
        self,
        catalog: &BookCatalog,
        spelling: &str,
        trailing: Option<Translation>,
    ) -> Option<Reference> {
        let book = catalog.resolve(spelling)?;
        let translation = match self.glued.or(trailing) {
            Some(t) => TranslationChoice::Explicit(t),
            None => TranslationChoice::Default,
        };
        let reference = Reference::new(
            book,
            self.chapter,
            self.verse_start,
            self.verse_end,
            translation,
        );
        if reference.is_none() {
            debug!(book = %book, chapter = self.chapter, "Rejected reference with invalid verse range");
        }
        reference
    }
}

/// Find a reference in `text` using the global book catalog.
pub fn find_reference(text: &str, mode: MatchMode) -> Option<Reference> {
    find_reference_in(BookCatalog::global(), text, mode)
}

/// Find a reference in `text` using `catalog`.
///
/// Never fails: anything that is not a reference yields `None`.
pub fn find_reference_in(catalog: &BookCatalog, text: &str, mode: MatchMode) -> Option<Reference> {
    match mode {
        MatchMode::Exact => match_exact(catalog, text),
        MatchMode::Anywhere => match_anywhere(catalog, text),
    }
}

/// The whole trimmed message must be `book chapter[:verse[-verse]] [code]`.
fn match_exact(catalog: &BookCatalog, text: &str) -> Option<Reference> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    // Peel an optional trailing translation code, but only when something
    // that could still be "book chapter" remains in front of it.
    let (tokens, trailing) = match tokens.split_last() {
        Some((last, rest)) if rest.len() >= 2 => match Translation::from_code(last) {
            Some(t) => (rest, Some(t)),
            None => (tokens.as_slice(), None),
        },
        _ => (tokens.as_slice(), None),
    };

    let (numeric, words) = tokens.split_last()?;
    if words.is_empty() || words.len() > catalog.max_words() {
        return None;
    }

    let chapter_verse = ChapterVerse::parse(numeric)?;
    if chapter_verse.glued.is_some() && trailing.is_some() {
        return None;
    }

    chapter_verse.into_reference(catalog, &words.join(" "), trailing)
}

/// Numeral prefixes trusted inside prose. "I", "first" and friends are
/// ordinary words there, so only digits and "II"/"III" count.
fn is_prose_numeral(word: &str) -> bool {
    !is_worded_ordinal(word) || matches!(word.trim_end_matches('.'), "II" | "III")
}

/// Leftmost `book chapter:verse` anywhere in the message.
///
/// Scans start positions left to right; at each start, the longest spelling
/// that resolves wins. Whole-chapter references are not accepted here since
/// "am 5" or "ex 2" turn up in ordinary conversation. A translation code
/// both glued to the verse and repeated after it rejects the candidate.
fn match_anywhere(catalog: &BookCatalog, text: &str) -> Option<Reference> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|t| {
            t.trim_start_matches(LEADING_PUNCTUATION)
                .trim_end_matches(TRAILING_PUNCTUATION)
        })
        .collect();

    for start in 0..tokens.len() {
        for len in (1..=catalog.max_words()).rev() {
            let numeric_at = start + len;
            let Some(numeric) = tokens.get(numeric_at) else {
                continue;
            };
            let words = &tokens[start..numeric_at];
            if words.iter().any(|w| w.is_empty()) || (len > 1 && !is_prose_numeral(words[0])) {
                continue;
            }

            let Some(chapter_verse) = ChapterVerse::parse(numeric).filter(ChapterVerse::has_verse)
            else {
                continue;
            };

            let spelling = words.join(" ");
            if catalog.resolve(&spelling).is_none() {
                if len == 1 {
                    debug!(candidate = %spelling, "Rejected reference candidate: unknown book");
                }
                continue;
            }

            let trailing = tokens
                .get(numeric_at + 1)
                .and_then(|t| Translation::from_code(t));
            if chapter_verse.glued.is_some() && trailing.is_some() {
                debug!(candidate = %spelling, "Rejected reference candidate: two translation codes");
                continue;
            }

            if let Some(reference) = chapter_verse.into_reference(catalog, &spelling, trailing) {
                return Some(reference);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(text: &str) -> Option<Reference> {
        find_reference(text, MatchMode::Exact)
    }

    fn anywhere(text: &str) -> Option<Reference> {
        find_reference(text, MatchMode::Anywhere)
    }

    fn summary(r: Option<Reference>) -> Option<(String, u32, Option<u32>, Option<u32>, TranslationChoice)> {
        r.map(|r| {
            (
                r.book.name().to_string(),
                r.chapter,
                r.verse_start,
                r.verse_end,
                r.translation,
            )
        })
    }

    // ========================================================================
    // Chapter-verse token
    // ========================================================================

    #[test]
    fn test_chapter_verse_token() {
        let cv = ChapterVerse::parse("3:16-18").unwrap();
        assert_eq!((cv.chapter, cv.verse_start, cv.verse_end), (3, Some(16), Some(18)));

        let cv = ChapterVerse::parse("3:16\u{2013}18").unwrap();
        assert_eq!(cv.verse_end, Some(18));

        let cv = ChapterVerse::parse("23").unwrap();
        assert_eq!((cv.chapter, cv.verse_start), (23, None));

        let cv = ChapterVerse::parse("3:16ESV").unwrap();
        assert_eq!(cv.glued, Some(Translation::Esv));

        assert!(ChapterVerse::parse("3:16abc").is_none());
        assert!(ChapterVerse::parse("3:").is_none());
        assert!(ChapterVerse::parse("3:16-").is_none());
        assert!(ChapterVerse::parse("1234").is_none());
        assert!(ChapterVerse::parse("love").is_none());
    }

    // ========================================================================
    // Exact mode
    // ========================================================================

    #[test]
    fn test_exact_single_verse() {
        assert_eq!(
            summary(exact("John 3:16")),
            Some(("John".into(), 3, Some(16), None, TranslationChoice::Default))
        );
    }

    #[test]
    fn test_exact_rejects_prose() {
        assert_eq!(exact("I love John 3:16"), None);
        assert_eq!(exact("John 3:16 is great"), None);
        assert_eq!(exact("see you at 3:16"), None);
        assert_eq!(exact(""), None);
        assert_eq!(exact("John"), None);
    }

    #[test]
    fn test_exact_range_and_translation() {
        assert_eq!(
            summary(exact("  1 Cor. 13:4-7 ESV  ")),
            Some((
                "1 Corinthians".into(),
                13,
                Some(4),
                Some(7),
                TranslationChoice::Explicit(Translation::Esv)
            ))
        );
        assert_eq!(
            exact("John 3:16kjv").map(|r| r.translation),
            Some(TranslationChoice::Explicit(Translation::Kjv))
        );
        assert_eq!(exact("John 3:16kjv esv"), None);
        // unrecognized trailing token makes the message non-conforming
        assert_eq!(exact("John 3:16 msg"), None);
    }

    #[test]
    fn test_exact_whole_chapter() {
        assert_eq!(
            summary(exact("Psalm 23")),
            Some(("Psalms".into(), 23, None, None, TranslationChoice::Default))
        );
        assert_eq!(
            summary(exact("song of solomon 2 web")),
            Some((
                "Song of Solomon".into(),
                2,
                None,
                None,
                TranslationChoice::Explicit(Translation::Web)
            ))
        );
    }

    #[test]
    fn test_exact_invalid_range() {
        assert_eq!(exact("John 3:20-10"), None);
        assert_eq!(exact("John 0:1"), None);
        assert_eq!(exact("John 3:0"), None);
    }

    #[test]
    fn test_exact_unknown_book() {
        assert_eq!(exact("Hezekiah 3:16"), None);
    }

    // ========================================================================
    // Anywhere mode
    // ========================================================================

    #[test]
    fn test_anywhere_in_prose() {
        assert_eq!(
            summary(anywhere("Check out Romans 8:28 niv please")),
            Some((
                "Romans".into(),
                8,
                Some(28),
                None,
                TranslationChoice::Explicit(Translation::Niv)
            ))
        );
    }

    #[test]
    fn test_anywhere_ignores_unrecognized_trailing_token() {
        assert_eq!(
            summary(anywhere("Romans 8:28 please")),
            Some(("Romans".into(), 8, Some(28), None, TranslationChoice::Default))
        );
    }

    #[test]
    fn test_anywhere_requires_verse() {
        assert_eq!(anywhere("I am 5 years old"), None);
        assert_eq!(anywhere("we meet at am 5 tomorrow"), None);
        assert_eq!(anywhere("read Psalm 23 tonight"), None);
    }

    #[test]
    fn test_anywhere_leftmost_wins() {
        let r = anywhere("compare Gen 1:1 with John 1:1").unwrap();
        assert_eq!(r.book.name(), "Genesis");
    }

    #[test]
    fn test_anywhere_longest_spelling_at_start() {
        let r = anywhere("today: 1 John 4:8 and more").unwrap();
        assert_eq!(r.book.name(), "1 John");
        let r = anywhere("from song of songs 2:1").unwrap();
        assert_eq!(r.book.name(), "Song of Solomon");
    }

    #[test]
    fn test_anywhere_skips_invalid_candidates() {
        assert_eq!(anywhere("John 3:20-10"), None);
        let r = anywhere("Foo 1:2 then Acts 2:38").unwrap();
        assert_eq!(r.book.name(), "Acts");
        let r = anywhere("John 3:20-10 or rather Jude 1:3").unwrap();
        assert_eq!(r.book.name(), "Jude");
    }

    #[test]
    fn test_anywhere_punctuation() {
        let r = anywhere("as written (Rom. 12:2), we are").unwrap();
        assert_eq!(r.book.name(), "Romans");
        assert_eq!(r.verse_start, Some(2));
        let r = anywhere("Read John 3:16.").unwrap();
        assert_eq!(r.verse_start, Some(16));
        let r = anywhere("\"Phil 4:13 ESV\"").unwrap();
        assert_eq!(r.translation, TranslationChoice::Explicit(Translation::Esv));
    }

    #[test]
    fn test_anywhere_worded_ordinals_are_prose() {
        let r = anywhere("Have I John 3:16 right?").unwrap();
        assert_eq!(r.book.name(), "John");
        let r = anywhere("my first John 3:16 tattoo").unwrap();
        assert_eq!(r.book.name(), "John");
        let r = anywhere("see II Kings 2:11 tonight").unwrap();
        assert_eq!(r.book.name(), "2 Kings");
        let r = anywhere("see 1st Cor 13:4 tonight").unwrap();
        assert_eq!(r.book.name(), "1 Corinthians");
        // exact mode keeps every ordinal spelling
        assert_eq!(exact("I John 3:16").unwrap().book.name(), "1 John");
        assert_eq!(exact("First John 3:16").unwrap().book.name(), "1 John");
    }

    #[test]
    fn test_anywhere_rejects_two_translation_codes() {
        assert_eq!(anywhere("John 3:16kjv esv"), None);
        let r = anywhere("John 3:16kjv esv or Jude 1:3 web").unwrap();
        assert_eq!(r.book.name(), "Jude");
        assert_eq!(r.translation, TranslationChoice::Explicit(Translation::Web));
    }

    #[test]
    fn test_anywhere_exact_message_also_matches() {
        assert_eq!(
            summary(anywhere("John 3:16")),
            summary(exact("John 3:16"))
        );
    }
}
