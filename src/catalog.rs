// src/catalog.rs
// Book catalog - canonical book names and every accepted spelling

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Canonical name of one of the 66 books.
///
/// Only the catalog can construct a `Book`, so holding one proves the name is canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Book(&'static str);

impl Book {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Canonical names with their abbreviations. Numbered books list the
/// unnumbered stem once; the numeral prefix is added when the table is built.
const BOOKS: &[(&str, &[&str])] = &[
    ("Genesis", &["gen", "ge", "gn"]),
    ("Exodus", &["exod", "exo", "ex"]),
    ("Leviticus", &["lev", "le", "lv"]),
    ("Numbers", &["num", "nu", "nm", "nb"]),
    ("Deuteronomy", &["deut", "de", "dt"]),
    ("Joshua", &["josh", "jos", "jsh"]),
    ("Judges", &["judg", "jdg", "jg", "jdgs"]),
    ("Ruth", &["rth", "ru"]),
    ("1 Samuel", &["sam", "sa", "sm"]),
    ("2 Samuel", &["sam", "sa", "sm"]),
    ("1 Kings", &["kgs", "ki", "kin"]),
    ("2 Kings", &["kgs", "ki", "kin"]),
    ("1 Chronicles", &["chron", "chr", "ch"]),
    ("2 Chronicles", &["chron", "chr", "ch"]),
    ("Ezra", &["ezr"]),
    ("Nehemiah", &["neh", "ne"]),
    ("Esther", &["esth", "est", "es"]),
    ("Job", &["jb"]),
    ("Psalms", &["psalm", "ps", "psa", "pss", "psm"]),
    ("Proverbs", &["prov", "pro", "prv", "pr"]),
    ("Ecclesiastes", &["eccles", "eccl", "ecc", "ec", "qoh"]),
    (
        "Song of Solomon",
        &["song", "song of songs", "sos", "canticles", "cant"],
    ),
    ("Isaiah", &["isa"]),
    ("Jeremiah", &["jer", "je", "jr"]),
    ("Lamentations", &["lam", "la"]),
    ("Ezekiel", &["ezek", "eze", "ezk"]),
    ("Daniel", &["dan", "da", "dn"]),
    ("Hosea", &["hos", "ho"]),
    ("Joel", &["jl"]),
    ("Amos", &["am"]),
    ("Obadiah", &["obad", "ob"]),
    ("Jonah", &["jnh", "jon"]),
    ("Micah", &["mic", "mc"]),
    ("Nahum", &["nah", "na"]),
    ("Habakkuk", &["hab", "hb"]),
    ("Zephaniah", &["zeph", "zep", "zp"]),
    ("Haggai", &["hag", "hg"]),
    ("Zechariah", &["zech", "zec", "zc"]),
    ("Malachi", &["mal", "ml"]),
    ("Matthew", &["matt", "mat", "mt"]),
    ("Mark", &["mrk", "mar", "mk", "mr"]),
    ("Luke", &["luk", "lk"]),
    ("John", &["joh", "jhn", "jn"]),
    ("Acts", &["act", "ac"]),
    ("Romans", &["rom", "ro", "rm"]),
    ("1 Corinthians", &["cor", "co"]),
    ("2 Corinthians", &["cor", "co"]),
    ("Galatians", &["gal", "ga"]),
    ("Ephesians", &["eph", "ephes"]),
    ("Philippians", &["phil", "php", "pp"]),
    ("Colossians", &["col"]),
    ("1 Thessalonians", &["thess", "thes", "th"]),
    ("2 Thessalonians", &["thess", "thes", "th"]),
    ("1 Timothy", &["tim", "ti"]),
    ("2 Timothy", &["tim", "ti"]),
    ("Titus", &["tit"]),
    ("Philemon", &["philem", "phm", "pm"]),
    ("Hebrews", &["heb"]),
    ("James", &["jas", "jm"]),
    ("1 Peter", &["pet", "pe", "pt"]),
    ("2 Peter", &["pet", "pe", "pt"]),
    ("1 John", &["jn", "jhn", "joh"]),
    ("2 John", &["jn", "jhn", "joh"]),
    ("3 John", &["jn", "jhn", "joh"]),
    ("Jude", &["jud", "jd"]),
    ("Revelation", &["rev", "re", "revelations"]),
];

/// Leading ordinal words accepted in place of a digit ("I Cor", "2nd Kings").
const ORDINALS: &[(&str, &str)] = &[
    ("1", "1"),
    ("2", "2"),
    ("3", "3"),
    ("i", "1"),
    ("ii", "2"),
    ("iii", "3"),
    ("1st", "1"),
    ("2nd", "2"),
    ("3rd", "3"),
    ("first", "1"),
    ("second", "2"),
    ("third", "3"),
];

/// Whether `word` is an ordinal written without a digit ("I", "ii", "First").
pub fn is_worded_ordinal(word: &str) -> bool {
    let word = word.trim_end_matches('.');
    !word.starts_with(|c: char| c.is_ascii_digit())
        && ORDINALS.iter().any(|(ordinal, _)| ordinal.eq_ignore_ascii_case(word))
}

/// Normalize a raw spelling to the catalog's lookup form.
///
/// Lowercases, drops dots, collapses whitespace, and glues a leading ordinal
/// to the following word, so "1 Cor.", "1cor", "I  cor" and "1st Cor" all
/// become "1cor".
pub fn normalize(spelling: &str) -> String {
    let cleaned = spelling.to_lowercase().replace('.', "");
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    if words.len() > 1 {
        if let Some((_, digit)) = ORDINALS.iter().find(|(word, _)| *word == words[0]) {
            let glued = format!("{}{}", digit, words[1]);
            let rest = words.split_off(2);
            return std::iter::once(glued.as_str())
                .chain(rest)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    words.join(" ")
}

/// Read-only spelling table, built once
pub struct BookCatalog {
    by_spelling: HashMap<String, Book>,
    max_words: usize,
}

static CATALOG: Lazy<BookCatalog> = Lazy::new(BookCatalog::build);

impl BookCatalog {
    /// The process-wide catalog.
    pub fn global() -> &'static BookCatalog {
        &CATALOG
    }

    fn build() -> Self {
        let mut by_spelling = HashMap::new();
        let mut max_words = 1;

        for (canonical, abbreviations) in BOOKS {
            let book = Book(canonical);
            for spelling in Self::spellings_of(canonical, abbreviations) {
                // Raw text may separate the numeral, so count it as its own word
                let words = spelling.split_whitespace().count();
                max_words = max_words.max(words);

                let previous = by_spelling.insert(normalize(&spelling), book);
                debug_assert!(
                    previous.is_none_or(|p| p == book),
                    "spelling {spelling:?} maps to two books"
                );
            }
        }

        Self {
            by_spelling,
            max_words,
        }
    }

    /// Display spellings of one catalog row: the canonical name, its
    /// abbreviations, and numeral-prefixed forms for numbered books.
    fn spellings_of(canonical: &str, abbreviations: &[&str]) -> Vec<String> {
        let mut spellings = vec![canonical.to_string()];
        let numeral = canonical
            .split_once(' ')
            .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()))
            .map(|(n, _)| n);

        for abbreviation in abbreviations {
            match numeral {
                Some(n) => spellings.push(format!("{n} {abbreviation}")),
                None => spellings.push((*abbreviation).to_string()),
            }
        }
        spellings
    }

    /// Resolve any accepted spelling to its canonical book.
    pub fn resolve(&self, spelling: &str) -> Option<Book> {
        self.by_spelling.get(&normalize(spelling)).copied()
    }

    /// All display spellings accepted for `book`.
    pub fn spellings(&self, book: Book) -> Vec<String> {
        BOOKS
            .iter()
            .find(|(canonical, _)| *canonical == book.name())
            .map(|(canonical, abbreviations)| Self::spellings_of(canonical, abbreviations))
            .unwrap_or_default()
    }

    /// Every canonical book, in canonical order.
    pub fn books(&self) -> impl Iterator<Item = Book> {
        BOOKS.iter().map(|(canonical, _)| Book(canonical))
    }

    /// Upper bound on the number of whitespace-separated words in a spelling.
    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

/// Resolve a spelling against the global catalog.
pub fn resolve(spelling: &str) -> Option<Book> {
    BookCatalog::global().resolve(spelling)
}
