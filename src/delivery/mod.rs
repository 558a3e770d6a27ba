// src/delivery/mod.rs
// Ordered, throttle-aware delivery of formatted text to a chat room

mod backoff;
mod plan;

pub use backoff::{
    Backoff, DEFAULT_BASE_BACKOFF, DEFAULT_JITTER, DEFAULT_MAX_THROTTLE_RETRIES, Sleeper, TokioSleeper,
};
pub use plan::{Chunk, DeliveryPlan, Limits, MIN_PRACTICAL_CHUNK_SIZE, plan_delivery};

use async_trait::async_trait;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SendError;
use crate::format::to_html;

/// Default hard limit for one message, in characters
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;
/// Default timeout around one send call
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// One message handed to the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    /// Same content escaped for rich clients
    pub html_body: String,
    /// Last message of its delivery
    pub is_final: bool,
}

impl OutgoingMessage {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let body = chunk.text();
        Self {
            html_body: to_html(&body),
            body,
            is_final: chunk.is_final,
        }
    }
}

/// Chat send capability.
///
/// Rate limiting must be reported as `SendError::Throttled` so the
/// scheduler can back off; anything else is a terminal transport error.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, room: &str, message: &OutgoingMessage) -> Result<(), SendError>;
}

/// Observable state of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Nothing planned yet
    Unsent,
    /// Chunks computed, nothing sent
    Planned,
    /// Sending chunk `chunk`; `attempt` counts throttled tries before this one
    Sending { chunk: usize, attempt: u32 },
    /// Every chunk acknowledged
    Done,
    /// A chunk failed for good; later chunks were never sent
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// What happened during one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub state: DeliveryState,
    /// Every state entered, in order, starting with `Unsent`
    pub transitions: Vec<DeliveryState>,
    pub chunks_planned: usize,
    pub chunks_sent: usize,
    /// Throttle waits actually started, in order
    pub waits: Vec<Duration>,
    /// Error behind a `Failed` delivery
    pub error: Option<SendError>,
}

impl DeliveryReport {
    fn new() -> Self {
        Self {
            state: DeliveryState::Unsent,
            transitions: vec![DeliveryState::Unsent],
            chunks_planned: 0,
            chunks_sent: 0,
            waits: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, state: DeliveryState) {
        self.state = state;
        self.transitions.push(state);
    }

    fn fail(mut self, err: SendError) -> Self {
        self.error = Some(err);
        self.enter(DeliveryState::Failed);
        self
    }

    fn finish(mut self, state: DeliveryState) -> Self {
        self.enter(state);
        self
    }

    pub fn is_done(&self) -> bool {
        self.state == DeliveryState::Done
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryConfig {
    pub limits: Limits,
    pub backoff: Backoff,
    pub send_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            limits: Limits::new(DEFAULT_MAX_MESSAGE_LENGTH, DEFAULT_MAX_MESSAGE_LENGTH),
            backoff: Backoff::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Splits formatted text into chunks and sends them in order.
///
/// Each chunk gets its own throttle retry budget. Chunk N+1 is never sent
/// before chunk N is acknowledged, and a chunk that fails for good stops
/// the whole delivery.
pub struct DeliveryScheduler {
    sink: Arc<dyn MessageSink>,
    sleeper: Arc<dyn Sleeper>,
    /// Jitter source; the thread-local RNG when unset
    rng: Option<Mutex<StdRng>>,
    config: DeliveryConfig,
}

impl DeliveryScheduler {
    pub fn new(sink: Arc<dyn MessageSink>, config: DeliveryConfig) -> Self {
        Self {
            sink,
            sleeper: Arc::new(TokioSleeper),
            rng: None,
            config,
        }
    }

    /// Replace the sleeper used for throttle waits
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Draw backoff jitter from `rng` instead of the thread-local RNG
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(Mutex::new(rng));
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Plan `formatted`, which may already end with `suffix`.
    pub fn plan(&self, formatted: &str, suffix: &str) -> DeliveryPlan {
        let text = if suffix.is_empty() {
            formatted
        } else {
            formatted.strip_suffix(suffix).unwrap_or(formatted)
        };
        plan_delivery(text, suffix, self.config.limits)
    }

    /// Plan and send `formatted` to `room`.
    pub async fn deliver(
        &self,
        room: &str,
        formatted: &str,
        suffix: &str,
        cancel: &CancellationToken,
    ) -> DeliveryReport {
        let plan = self.plan(formatted, suffix);
        self.send_plan(room, &plan, cancel).await
    }

    fn next_wait(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        let backoff = &self.config.backoff;
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                backoff.delay(attempt, suggested, &mut *rng)
            }
            None => backoff.delay(attempt, suggested, &mut rand::rng()),
        }
    }

    /// Send an already planned delivery.
    pub async fn send_plan(&self, room: &str, plan: &DeliveryPlan, cancel: &CancellationToken) -> DeliveryReport {
        let mut report = DeliveryReport::new();
        report.chunks_planned = plan.len();
        report.enter(DeliveryState::Planned);

        for (index, chunk) in plan.chunks().iter().enumerate() {
            let message = OutgoingMessage::from_chunk(chunk);
            let mut attempt = 0;

            loop {
                if cancel.is_cancelled() {
                    info!(room = %room, chunk = index, "Delivery cancelled");
                    return report.finish(DeliveryState::Cancelled);
                }

                report.enter(DeliveryState::Sending { chunk: index, attempt });

                let result = match tokio::time::timeout(self.config.send_timeout, self.sink.send(room, &message)).await {
                    Ok(result) => result,
                    Err(_) => Err(SendError::transport(format!(
                        "send timed out after {:?}",
                        self.config.send_timeout
                    ))),
                };

                match result {
                    Ok(()) => {
                        debug!(room = %room, chunk = index, of = plan.len(), "Chunk sent");
                        report.chunks_sent += 1;
                        break;
                    }
                    Err(SendError::Throttled { retry_after }) if self.config.backoff.allows_retry(attempt) => {
                        let wait = self.next_wait(attempt, retry_after);
                        warn!(
                            room = %room,
                            chunk = index,
                            attempt = attempt + 1,
                            suggested = ?retry_after,
                            "Throttled, retrying in {:?}...",
                            wait
                        );
                        report.waits.push(wait);

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                info!(room = %room, chunk = index, "Delivery cancelled during backoff");
                                return report.finish(DeliveryState::Cancelled);
                            }
                            _ = self.sleeper.sleep(wait) => {}
                        }
                        attempt += 1;
                    }
                    Err(err) => {
                        error!(
                            room = %room,
                            chunk = index,
                            attempts = attempt + 1,
                            error = %err,
                            "Delivery failed"
                        );
                        return report.fail(err);
                    }
                }
            }
        }

        report.finish(DeliveryState::Done)
    }
}
