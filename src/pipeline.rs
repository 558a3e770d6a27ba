// src/pipeline.rs
// One incoming message: match, fetch, format, deliver

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryPlan, DeliveryReport, DeliveryScheduler, DeliveryState};
use crate::error::FetchError;
use crate::format::{FormatOptions, format_passage, reference_suffix};
use crate::passage::{Passage, PassageFetcher};
use crate::reference::{MatchMode, Reference, Translation, find_reference};

pub const ERROR_PASSAGE_NOT_FOUND: &str =
    "Error: The requested passage could not be found. Please check the book, chapter, and verse.";
pub const ERROR_SERVICE_UNAVAILABLE: &str =
    "Error: The scripture service is unavailable right now. Please try again later.";

/// Reply for a translation whose backend needs a key that is not configured
pub fn missing_api_key_message(translation: Translation, reference: &Reference) -> String {
    format!(
        "{} translation requires an API key. Please configure one in your config.toml or use KJV instead. (Try: {} kjv)",
        translation.marker(),
        reference
    )
}

/// Per-message behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub match_mode: MatchMode,
    pub format: FormatOptions,
    /// Reply to transient lookup failures instead of dropping them
    pub report_transient_errors: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::Exact,
            format: FormatOptions::default(),
            report_transient_errors: true,
        }
    }
}

/// How one message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No reference in the message
    Ignored,
    /// Passage delivered in full
    Delivered { reference: Reference, chunks: usize },
    NotFoundReported(Reference),
    TransientReported(Reference),
    TransientDropped(Reference),
    MissingKeyReported(Reference, Translation),
    /// Lookup succeeded but there was nothing to show
    EmptyPassage(Reference),
    /// Passage or error reply could not be sent
    DeliveryFailed(DeliveryReport),
    Cancelled,
}

/// Wires matcher, fetcher, formatter and scheduler together.
///
/// Holds no per-message state; one instance serves every room and can be
/// shared across tasks. Steps inside one `handle` call run strictly in order.
pub struct Pipeline {
    fetcher: PassageFetcher,
    scheduler: DeliveryScheduler,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(fetcher: PassageFetcher, scheduler: DeliveryScheduler, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            scheduler,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn fetcher(&self) -> &PassageFetcher {
        &self.fetcher
    }

    /// Change the default translation; cached passages are dropped.
    pub fn reconfigure(&mut self, default_translation: Translation) {
        self.fetcher.reconfigure(default_translation);
    }

    /// Reference in `text` under the configured match mode
    pub fn detect(&self, text: &str) -> Option<Reference> {
        find_reference(text, self.settings.match_mode)
    }

    /// Handle one incoming message for `room`.
    pub async fn handle(&self, room: &str, text: &str, cancel: &CancellationToken) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }

        let Some(reference) = self.detect(text) else {
            debug!(room = %room, "No reference in message");
            return Outcome::Ignored;
        };

        let translation = reference.translation.resolve(self.fetcher.default_translation());
        info!(room = %room, reference = %reference, translation = %translation, "Fetching passage");

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            result = self.fetcher.fetch(&reference) => result,
        };

        match fetched {
            Ok(passage) => self.deliver_passage(room, &passage, cancel).await,
            Err(err) => self.report_failure(room, reference, err, cancel).await,
        }
    }

    /// Resolve and fetch without delivering; used by the one-shot CLI.
    pub async fn lookup(&self, text: &str) -> Option<Result<String, FetchError>> {
        let reference = self.detect(text)?;
        let result = self
            .fetcher
            .fetch(&reference)
            .await
            .map(|passage| format_passage(&passage, self.settings.format));
        Some(result)
    }

    async fn deliver_passage(&self, room: &str, passage: &Passage, cancel: &CancellationToken) -> Outcome {
        let reference = passage.reference;
        let formatted = format_passage(passage, self.settings.format);
        if formatted.is_empty() {
            warn!(room = %room, reference = %reference, "Retrieved empty passage text");
            return Outcome::EmptyPassage(reference);
        }

        let suffix = if self.settings.format.translation_suffix {
            reference_suffix(&reference, passage.translation)
        } else {
            String::new()
        };

        let report = self.scheduler.deliver(room, &formatted, &suffix, cancel).await;
        match report.state {
            DeliveryState::Done => {
                info!(room = %room, reference = %reference, chunks = report.chunks_sent, "Sent scripture");
                Outcome::Delivered {
                    reference,
                    chunks: report.chunks_sent,
                }
            }
            DeliveryState::Cancelled => Outcome::Cancelled,
            _ => Outcome::DeliveryFailed(report),
        }
    }

    async fn report_failure(
        &self,
        room: &str,
        reference: Reference,
        err: FetchError,
        cancel: &CancellationToken,
    ) -> Outcome {
        warn!(room = %room, reference = %reference, error = %err, "Failed to retrieve passage");

        let (reply, outcome) = match err {
            FetchError::NotFound(_) => (
                ERROR_PASSAGE_NOT_FOUND.to_string(),
                Outcome::NotFoundReported(reference),
            ),
            FetchError::Transient(_) if !self.settings.report_transient_errors => {
                return Outcome::TransientDropped(reference);
            }
            FetchError::Transient(_) => (
                ERROR_SERVICE_UNAVAILABLE.to_string(),
                Outcome::TransientReported(reference),
            ),
            FetchError::MissingApiKey(translation) => (
                missing_api_key_message(translation, &reference),
                Outcome::MissingKeyReported(reference, translation),
            ),
        };

        let report = self
            .scheduler
            .send_plan(room, &DeliveryPlan::single(reply), cancel)
            .await;
        match report.state {
            DeliveryState::Done => outcome,
            DeliveryState::Cancelled => Outcome::Cancelled,
            _ => Outcome::DeliveryFailed(report),
        }
    }
}
