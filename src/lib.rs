// src/lib.rs
// versebot - scripture reference detection and reliable chat delivery

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod catalog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod format;
pub mod passage;
pub mod pipeline;
pub mod reference;

pub use catalog::{Book, BookCatalog};
pub use error::{ConfigError, FetchError, SendError};
pub use pipeline::{Outcome, Pipeline, PipelineSettings};
pub use reference::{MatchMode, Reference, Translation, TranslationChoice, find_reference};
