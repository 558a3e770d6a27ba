// src/delivery/plan.rs
// Splitting formatted text into sendable chunks

use tracing::{debug, warn};

/// Chunk budgets below this are raised to it when config is loaded
pub const MIN_PRACTICAL_CHUNK_SIZE: usize = 8;
/// Indicator appended to a shortened suffix
const TRUNCATION_INDICATOR: &str = "...";

/// Message length limits, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Hard limit for any single message
    pub max_message_length: usize,
    /// Target size of each chunk when a message has to be split
    pub split_message_length: usize,
}

impl Limits {
    pub fn new(max_message_length: usize, split_message_length: usize) -> Self {
        Self {
            max_message_length,
            split_message_length,
        }
    }

    fn chunk_budget(&self) -> usize {
        self.split_message_length.min(self.max_message_length).max(1)
    }
}

/// One message of a delivery plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Slice of the formatted text carried by this chunk
    pub body: String,
    /// Reference suffix; only ever set on the final chunk
    pub suffix: Option<String>,
    pub is_final: bool,
}

impl Chunk {
    /// Text actually sent for this chunk.
    pub fn text(&self) -> String {
        match &self.suffix {
            // standalone suffix chunk: drop the " - " separator
            Some(suffix) if self.body.is_empty() => suffix
                .trim_start()
                .trim_start_matches('-')
                .trim_start()
                .to_string(),
            Some(suffix) => format!("{}{}", self.body, suffix),
            None => self.body.clone(),
        }
    }

    /// Length of `text()` in characters
    pub fn len(&self) -> usize {
        self.text().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered chunks for one formatted passage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryPlan {
    chunks: Vec<Chunk>,
}

impl DeliveryPlan {
    /// One plain message with no suffix (error replies).
    pub fn single(text: impl Into<String>) -> Self {
        let body = text.into();
        if body.is_empty() {
            return Self::default();
        }
        Self {
            chunks: vec![Chunk {
                body,
                suffix: None,
                is_final: true,
            }],
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenated chunk bodies, suffix excluded.
    pub fn body_text(&self) -> String {
        self.chunks.iter().map(|c| c.body.as_str()).collect()
    }

    fn from_bodies(bodies: Vec<String>, suffix: String) -> Self {
        let mut chunks: Vec<Chunk> = bodies
            .into_iter()
            .map(|body| Chunk {
                body,
                suffix: None,
                is_final: false,
            })
            .collect();
        if !suffix.is_empty() {
            match chunks.last_mut() {
                Some(last) => last.suffix = Some(suffix),
                None => chunks.push(Chunk {
                    body: String::new(),
                    suffix: Some(suffix),
                    is_final: false,
                }),
            }
        }
        if let Some(last) = chunks.last_mut() {
            last.is_final = true;
        }
        Self { chunks }
    }
}

/// Plan delivery of `text` followed by `suffix`.
///
/// Fits in one message → one chunk. Otherwise the text is cut at whitespace
/// into chunks of at most `split_message_length` characters; the suffix goes
/// on the last chunk when it fits under `max_message_length`, or into its
/// own trailing chunk when it does not. A chunk may run past the split length
/// only to carry whitespace left over at a cut, never past
/// `max_message_length`. A word longer than the chunk budget makes the plan
/// fall back to a single unsplit chunk.
pub fn plan_delivery(text: &str, suffix: &str, limits: Limits) -> DeliveryPlan {
    if text.is_empty() {
        return DeliveryPlan::default();
    }

    let suffix = fit_suffix(suffix, limits.max_message_length);
    let text_len = text.chars().count();
    let suffix_len = suffix.chars().count();

    if text_len + suffix_len <= limits.max_message_length {
        return DeliveryPlan::from_bodies(vec![text.to_string()], suffix);
    }

    let budget = limits.chunk_budget();
    let hard_limit = limits.max_message_length.max(budget);
    let Some(mut bodies) = split_at_whitespace(text, budget, hard_limit) else {
        warn!(
            length = text_len,
            budget, "Text cannot be cut at whitespace within the limits, sending unsplit"
        );
        return DeliveryPlan::from_bodies(vec![text.to_string()], suffix);
    };

    let last_len = bodies.last().map(|b| b.chars().count()).unwrap_or_default();
    if !suffix.is_empty() && last_len + suffix_len > limits.max_message_length {
        debug!("Suffix does not fit after the last chunk, sending it separately");
        bodies.push(String::new());
    }

    debug!(chunks = bodies.len(), budget, "Split message");
    DeliveryPlan::from_bodies(bodies, suffix)
}

/// Shorten a suffix that cannot fit in any message.
fn fit_suffix(suffix: &str, max_message_length: usize) -> String {
    let len = suffix.chars().count();
    if len <= max_message_length {
        return suffix.to_string();
    }
    if max_message_length <= TRUNCATION_INDICATOR.len() {
        return String::new();
    }
    let keep = max_message_length - TRUNCATION_INDICATOR.len();
    let mut shortened: String = suffix.chars().take(keep).collect();
    shortened.push_str(TRUNCATION_INDICATOR);
    shortened
}

/// Cut `text` into pieces of at most `budget` characters without breaking
/// a word. Whitespace at a cut stays with the earlier piece where possible.
///
/// A piece that starts with whitespace left over from the previous cut may
/// grow up to `hard_limit` to hold its first word. Returns `None` when some
/// piece cannot be placed within those limits.
fn split_at_whitespace(text: &str, budget: usize, hard_limit: usize) -> Option<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let is_space = |i: usize| chars[i].is_whitespace();
    // cut position i means a piece ends right before chars[i]
    let starts_word = |i: usize| i == n || (i > 0 && !is_space(i) && is_space(i - 1));
    let between_words = |i: usize| i == n || is_space(i) || (i > 0 && is_space(i - 1));
    // a piece must hold at least one non-space character
    let best_cut = |first_content: usize, limit: usize| {
        (first_content + 1..=limit)
            .rev()
            .find(|&i| starts_word(i))
            .or_else(|| (first_content + 1..=limit).rev().find(|&i| between_words(i)))
    };

    let mut pieces: Vec<String> = Vec::new();
    let mut start = 0;

    while start < n {
        let first_content = (start..n).find(|&i| !is_space(i)).unwrap_or(n);

        if first_content == n {
            // only trailing whitespace is left
            let last = pieces.last_mut()?;
            if last.chars().count() + (n - start) > hard_limit {
                return None;
            }
            last.extend(&chars[start..]);
            break;
        }

        let end = match best_cut(first_content, (start + budget).min(n)) {
            Some(end) => end,
            None if is_space(start) => {
                let word_end = (first_content..n).find(|&i| is_space(i)).unwrap_or(n);
                if word_end - start > hard_limit {
                    return None;
                }
                let run_end = (word_end..n).find(|&i| !is_space(i)).unwrap_or(n);
                best_cut(first_content, run_end.min(start + hard_limit))?
            }
            None => return None,
        };

        pieces.push(chars[start..end].iter().collect());
        start = end;
    }

    Some(pieces)
}
