// src/passage/mod.rs
// Passage fetching with a bounded, time-limited result cache

mod http;

pub use http::{Endpoints, HttpVerseLookup};

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::Book;
use crate::error::FetchError;
use crate::reference::{Reference, Translation};

/// Default maximum number of cached passages
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100;
/// Default time a cached passage stays valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
/// Default timeout around one lookup call
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Verse text retrieved for a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub reference: Reference,
    /// Verse lines in order, as returned by the backend
    pub lines: Vec<String>,
    pub translation: Translation,
}

impl Passage {
    pub fn new(reference: Reference, text: &str, translation: Translation) -> Self {
        Self {
            reference,
            lines: text.lines().map(str::to_string).collect(),
            translation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

/// External verse lookup capability.
///
/// Implementations map "no such verse" to `FetchError::NotFound` and
/// network/timeout/5xx failures to `FetchError::Transient`.
#[async_trait]
pub trait VerseLookup: Send + Sync {
    async fn lookup(&self, reference: &Reference, translation: Translation) -> Result<String, FetchError>;
}

/// Exact cache key: the reference with its translation resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    book: Book,
    chapter: u32,
    verse_start: Option<u32>,
    verse_end: Option<u32>,
    translation: Translation,
}

impl CacheKey {
    fn new(reference: &Reference, translation: Translation) -> Self {
        Self {
            book: reference.book,
            chapter: reference.chapter,
            verse_start: reference.verse_start,
            // "John 3:16-16" and "John 3:16" are the same passage
            verse_end: reference.verse_end.filter(|end| Some(*end) != reference.verse_start),
            translation,
        }
    }
}

/// Cache sizing for the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Fetches passages through a `VerseLookup`, caching successful results.
///
/// The cache is the only state shared between pipeline invocations. Two
/// concurrent misses on the same key may both reach the lookup; the second
/// insert simply overwrites the first with an equal value.
pub struct PassageFetcher {
    lookup: Arc<dyn VerseLookup>,
    cache: Option<Cache<CacheKey, Arc<Passage>>>,
    default_translation: Translation,
    timeout: Duration,
}

impl PassageFetcher {
    pub fn new(
        lookup: Arc<dyn VerseLookup>,
        default_translation: Translation,
        policy: CachePolicy,
        timeout: Duration,
    ) -> Self {
        let cache = policy.enabled.then(|| {
            Cache::builder()
                .max_capacity(policy.max_entries)
                .time_to_live(policy.ttl)
                .build()
        });

        Self {
            lookup,
            cache,
            default_translation,
            timeout,
        }
    }

    pub fn default_translation(&self) -> Translation {
        self.default_translation
    }

    /// Fetch the passage for `reference`.
    ///
    /// Cache hits return without calling the lookup. Misses call it exactly
    /// once under the configured timeout; failures are returned as-is and
    /// never retried here.
    pub async fn fetch(&self, reference: &Reference) -> Result<Arc<Passage>, FetchError> {
        let translation = reference.translation.resolve(self.default_translation);
        let key = CacheKey::new(reference, translation);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                debug!(reference = %reference, translation = %translation, "Passage cache hit");
                return Ok(hit);
            }
        }

        let text = match tokio::time::timeout(self.timeout, self.lookup.lookup(reference, translation)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(reference = %reference, timeout = ?self.timeout, "Passage lookup timed out");
                return Err(FetchError::transient(format!(
                    "lookup timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let passage = Arc::new(Passage::new(*reference, &text, translation));

        if let Some(cache) = &self.cache {
            cache.insert(key, passage.clone()).await;
        }

        Ok(passage)
    }

    /// Apply new translation settings; every cached entry is dropped.
    pub fn reconfigure(&mut self, default_translation: Translation) {
        info!(
            from = %self.default_translation,
            to = %default_translation,
            "Translation settings changed, clearing passage cache"
        );
        self.default_translation = default_translation;
        self.invalidate_cache();
    }

    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Number of cached passages after pending maintenance has run.
    pub async fn cached_entries(&self) -> u64 {
        match &self.cache {
            Some(cache) => {
                cache.run_pending_tasks().await;
                cache.entry_count()
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolve;
    use crate::reference::TranslationChoice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    /// Lookup that counts calls and answers from a closure
    struct CountingLookup<F> {
        calls: AtomicUsize,
        respond: F,
    }

    #[async_trait]
    impl<F> VerseLookup for CountingLookup<F>
    where
        F: Fn(&Reference, Translation) -> Result<String, FetchError> + Send + Sync,
    {
        async fn lookup(&self, reference: &Reference, translation: Translation) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(reference, translation)
        }
    }

    fn counting<F>(respond: F) -> Arc<CountingLookup<F>>
    where
        F: Fn(&Reference, Translation) -> Result<String, FetchError> + Send + Sync,
    {
        Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            respond,
        })
    }

    fn john_3_16(translation: TranslationChoice) -> Reference {
        Reference::new(resolve("John").unwrap(), 3, Some(16), None, translation).unwrap()
    }

    fn fetcher(lookup: Arc<dyn VerseLookup>, policy: CachePolicy) -> PassageFetcher {
        PassageFetcher::new(lookup, Translation::Kjv, policy, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_cache_hit_skips_lookup() {
        let lookup = counting(|r, t| Ok(format!("{r} in {t}")));
        let fetcher = fetcher(lookup.clone(), CachePolicy::default());
        let reference = john_3_16(TranslationChoice::Default);

        let first = fetcher.fetch(&reference).await.unwrap();
        let second = fetcher.fetch(&reference).await.unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.lines, vec!["John 3:16 in kjv".to_string()]);
        assert_eq!(first.translation, Translation::Kjv);
    }

    #[tokio::test]
    async fn test_cache_key_includes_translation() {
        let lookup = counting(|_, t| Ok(t.marker().to_string()));
        let fetcher = fetcher(lookup.clone(), CachePolicy::default());

        let kjv = fetcher.fetch(&john_3_16(TranslationChoice::Default)).await.unwrap();
        let esv = fetcher
            .fetch(&john_3_16(TranslationChoice::Explicit(Translation::Esv)))
            .await
            .unwrap();
        // explicit kjv shares the entry with the default
        fetcher
            .fetch(&john_3_16(TranslationChoice::Explicit(Translation::Kjv)))
            .await
            .unwrap();

        assert_eq!(kjv.lines, vec!["KJV"]);
        assert_eq!(esv.lines, vec!["ESV"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let lookup = counting(|_, _| Err(FetchError::not_found("nope")));
        let fetcher = fetcher(lookup.clone(), CachePolicy::default());
        let reference = john_3_16(TranslationChoice::Default);

        assert_eq!(
            fetcher.fetch(&reference).await,
            Err(FetchError::not_found("nope"))
        );
        assert!(fetcher.fetch(&reference).await.is_err());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn test_transient_error_surfaces_once() {
        let lookup = counting(|_, _| Err(FetchError::transient("503")));
        let fetcher = fetcher(lookup.clone(), CachePolicy::default());

        let result = fetcher.fetch(&john_3_16(TranslationChoice::Default)).await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_calls_lookup() {
        let lookup = counting(|_, _| Ok("text".to_string()));
        let policy = CachePolicy {
            enabled: false,
            ..CachePolicy::default()
        };
        let fetcher = fetcher(lookup.clone(), policy);
        let reference = john_3_16(TranslationChoice::Default);

        fetcher.fetch(&reference).await.unwrap();
        fetcher.fetch(&reference).await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn test_reconfigure_invalidates_cache() {
        let lookup = counting(|_, t| Ok(t.code().to_string()));
        let mut fetcher = fetcher(lookup.clone(), CachePolicy::default());
        let reference = john_3_16(TranslationChoice::Default);

        fetcher.fetch(&reference).await.unwrap();
        assert_eq!(fetcher.cached_entries().await, 1);

        fetcher.reconfigure(Translation::Web);

        let passage = fetcher.fetch(&reference).await.unwrap();
        assert_eq!(passage.translation, Translation::Web);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        // the kjv entry cached before the change is gone too
        fetcher
            .fetch(&reference.with_translation(TranslationChoice::Explicit(Translation::Kjv)))
            .await
            .unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    /// Lookup that holds every caller until `n` of them have arrived.
    struct GatedLookup {
        barrier: Barrier,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VerseLookup for GatedLookup {
        async fn lookup(&self, _: &Reference, _: Translation) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            Ok("For God so loved the world".to_string())
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_leave_one_entry() {
        let lookup = Arc::new(GatedLookup {
            barrier: Barrier::new(2),
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(lookup.clone(), CachePolicy::default());
        let reference = john_3_16(TranslationChoice::Default);

        let (a, b) = tokio::join!(fetcher.fetch(&reference), fetcher.fetch(&reference));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a, b);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.cached_entries().await, 1);

        let cached = fetcher.fetch(&reference).await.unwrap();
        assert_eq!(cached.lines, vec!["For God so loved the world"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    /// Lookup that never answers
    struct StalledLookup;

    #[async_trait]
    impl VerseLookup for StalledLookup {
        async fn lookup(&self, _: &Reference, _: Translation) -> Result<String, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout_is_transient() {
        let fetcher = PassageFetcher::new(
            Arc::new(StalledLookup),
            Translation::Kjv,
            CachePolicy::default(),
            Duration::from_millis(20),
        );
        let result = fetcher.fetch(&john_3_16(TranslationChoice::Default)).await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }

    #[test]
    fn test_passage_lines() {
        let reference = john_3_16(TranslationChoice::Default);
        let passage = Passage::new(reference, "line one\nline two", Translation::Kjv);
        assert_eq!(passage.lines, vec!["line one", "line two"]);
        assert!(!passage.is_empty());
        assert!(Passage::new(reference, "  \n ", Translation::Kjv).is_empty());
    }
}
