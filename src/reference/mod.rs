// src/reference/mod.rs
// Scripture reference types and detection

mod matcher;

pub use matcher::{find_reference, find_reference_in};

use std::fmt;
use std::str::FromStr;

use crate::catalog::Book;

/// Recognized translation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Translation {
    #[default]
    Kjv,
    Esv,
    Niv,
    Nkjv,
    Nasb,
    Nlt,
    Web,
}

impl Translation {
    pub const ALL: [Translation; 7] = [
        Translation::Kjv,
        Translation::Esv,
        Translation::Niv,
        Translation::Nkjv,
        Translation::Nasb,
        Translation::Nlt,
        Translation::Web,
    ];

    /// Case-insensitive code lookup
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Translation::Kjv => "kjv",
            Translation::Esv => "esv",
            Translation::Niv => "niv",
            Translation::Nkjv => "nkjv",
            Translation::Nasb => "nasb",
            Translation::Nlt => "nlt",
            Translation::Web => "web",
        }
    }

    /// Marker shown to users in the reference suffix
    pub fn marker(&self) -> &'static str {
        match self {
            Translation::Kjv => "KJV",
            Translation::Esv => "ESV",
            Translation::Niv => "NIV",
            Translation::Nkjv => "NKJV",
            Translation::Nasb => "NASB",
            Translation::Nlt => "NLT",
            Translation::Web => "WEB",
        }
    }
}

impl FromStr for Translation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s.trim()).ok_or_else(|| format!("unknown translation: {s}"))
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Translation as written in the message: none given, or an explicit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TranslationChoice {
    #[default]
    Default,
    Explicit(Translation),
}

impl TranslationChoice {
    /// Concrete translation, falling back to the configured default.
    pub fn resolve(&self, default: Translation) -> Translation {
        match self {
            TranslationChoice::Default => default,
            TranslationChoice::Explicit(t) => *t,
        }
    }
}

/// How much of a message must be a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// The whole trimmed message must be a reference.
    #[default]
    Exact,
    /// The leftmost valid `Book C:V` anywhere in the message.
    Anywhere,
}

/// A resolved scripture reference.
///
/// `verse_end` is only ever set together with `verse_start`, and is never
/// smaller than it. `verse_start == None` means the whole chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    pub book: Book,
    pub chapter: u32,
    pub verse_start: Option<u32>,
    pub verse_end: Option<u32>,
    pub translation: TranslationChoice,
}

impl Reference {
    /// Build a reference, enforcing the positivity and range rules.
    pub fn new(
        book: Book,
        chapter: u32,
        verse_start: Option<u32>,
        verse_end: Option<u32>,
        translation: TranslationChoice,
    ) -> Option<Self> {
        if chapter == 0 || verse_start == Some(0) {
            return None;
        }
        match (verse_start, verse_end) {
            (None, Some(_)) => return None,
            (Some(start), Some(end)) if end < start => return None,
            _ => {}
        }
        Some(Self {
            book,
            chapter,
            verse_start,
            verse_end,
            translation,
        })
    }

    /// Same reference with the translation choice replaced
    pub fn with_translation(mut self, translation: TranslationChoice) -> Self {
        self.translation = translation;
        self
    }
}

impl fmt::Display for Reference {
    /// `John 3`, `John 3:16` or `John 3:16-18`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)?;
        if let Some(start) = self.verse_start {
            write!(f, ":{start}")?;
            if let Some(end) = self.verse_end.filter(|end| *end != start) {
                write!(f, "-{end}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolve;

    fn john() -> Book {
        resolve("John").unwrap()
    }

    #[test]
    fn test_translation_codes() {
        assert_eq!(Translation::from_code("KJV"), Some(Translation::Kjv));
        assert_eq!(Translation::from_code("esv"), Some(Translation::Esv));
        assert_eq!(Translation::from_code("Niv"), Some(Translation::Niv));
        assert_eq!(Translation::from_code("msg"), None);
        assert_eq!("web".parse::<Translation>(), Ok(Translation::Web));
        assert_eq!(Translation::default(), Translation::Kjv);
    }

    #[test]
    fn test_translation_choice_resolve() {
        assert_eq!(
            TranslationChoice::Default.resolve(Translation::Esv),
            Translation::Esv
        );
        assert_eq!(
            TranslationChoice::Explicit(Translation::Niv).resolve(Translation::Esv),
            Translation::Niv
        );
    }

    #[test]
    fn test_reference_validation() {
        let d = TranslationChoice::Default;
        assert!(Reference::new(john(), 3, Some(16), None, d).is_some());
        assert!(Reference::new(john(), 3, Some(16), Some(16), d).is_some());
        assert!(Reference::new(john(), 3, None, None, d).is_some());
        assert!(Reference::new(john(), 0, Some(1), None, d).is_none());
        assert!(Reference::new(john(), 3, Some(0), None, d).is_none());
        assert!(Reference::new(john(), 3, Some(20), Some(10), d).is_none());
        assert!(Reference::new(john(), 3, None, Some(10), d).is_none());
    }

    #[test]
    fn test_reference_display() {
        let d = TranslationChoice::Default;
        let r = |s, e| Reference::new(john(), 3, s, e, d).unwrap().to_string();
        assert_eq!(r(None, None), "John 3");
        assert_eq!(r(Some(16), None), "John 3:16");
        assert_eq!(r(Some(16), Some(18)), "John 3:16-18");
        assert_eq!(r(Some(16), Some(16)), "John 3:16");
    }
}
