//! Record fetcher
//!
//! Wraps the metadata provider and document source with per-call timeouts,
//! a global request-rate ceiling, and exponential backoff with jitter for
//! transient failures. Permanent failures are never retried.

use crate::errors::FailureReason;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use citeforge_common::config::{RateLimitConfig, RetryConfig};
use citeforge_common::errors::{AppError, SourceError};
use citeforge_common::metrics::record_fetch_attempt;
use citeforge_common::{DocumentSource, MetadataProvider, PublicationId, PublicationRecord};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Rate limiter shared by every outbound call of a run
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a new rate limiter
pub fn create_rate_limiter(
    requests_per_second: u32,
    burst: u32,
) -> Result<Arc<GlobalRateLimiter>, AppError> {
    let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| AppError::Configuration {
        message: "requests_per_second must be positive".to_string(),
    })?;
    let burst = NonZeroU32::new(burst).unwrap_or(rate);

    Ok(Arc::new(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))))
}

/// Build the limiter described by configuration, if enabled
pub fn rate_limiter_from_config(
    config: &RateLimitConfig,
) -> Result<Option<Arc<GlobalRateLimiter>>, AppError> {
    if !config.enabled {
        return Ok(None);
    }
    create_rate_limiter(config.requests_per_second, config.burst).map(Some)
}

/// Retry and timeout policy for one remote call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(self.jitter)
            .with_multiplier(2.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
            call_timeout: config.call_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// What happened to the document-text half of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Text(String),
    /// Not requested (leaf visit at the depth budget)
    Skipped,
    /// Metadata succeeded but text retrieval did not: a partial failure
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
pub struct FetchedPublication {
    pub record: PublicationRecord,
    pub text: TextOutcome,
}

/// A failed call: the last error and how many attempts were made
#[derive(Debug, Clone)]
pub struct CallFailure {
    pub error: SourceError,
    pub attempts: u32,
}

impl CallFailure {
    pub fn reason(&self) -> FailureReason {
        FailureReason::from_source(&self.error, self.attempts)
    }
}

pub struct RecordFetcher {
    metadata: Arc<dyn MetadataProvider>,
    documents: Arc<dyn DocumentSource>,
    policy: RetryPolicy,
    limiter: Option<Arc<GlobalRateLimiter>>,
}

impl RecordFetcher {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        documents: Arc<dyn DocumentSource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            metadata,
            documents,
            policy,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Fetch the record and, when `want_text` is set, the document text.
    ///
    /// A metadata failure fails the whole fetch. A text failure does not; it
    /// is reported in [`TextOutcome::Failed`] next to the record.
    #[instrument(skip_all, fields(id = %id, want_text = want_text))]
    pub async fn fetch(
        &self,
        id: &PublicationId,
        want_text: bool,
    ) -> Result<FetchedPublication, FailureReason> {
        let record = self
            .call_with_retry("metadata", || self.metadata.get_metadata(id))
            .await
            .map_err(|failure| failure.reason())?;

        if !want_text {
            return Ok(FetchedPublication {
                record,
                text: TextOutcome::Skipped,
            });
        }

        let text = match self
            .call_with_retry("document", || self.documents.get_text(id))
            .await
        {
            Ok(text) => {
                debug!(chars = text.len(), "Document text retrieved");
                TextOutcome::Text(text)
            }
            Err(failure) => {
                warn!(
                    error = %failure.error,
                    attempts = failure.attempts,
                    source = self.documents.name(),
                    "Document text unavailable, keeping metadata only"
                );
                TextOutcome::Failed(failure.reason())
            }
        };

        Ok(FetchedPublication { record, text })
    }

    /// Run `op` under the timeout, rate limit and retry policy
    pub async fn call_with_retry<T, F, Fut>(
        &self,
        call: &'static str,
        mut op: F,
    ) -> Result<T, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut backoff = self.policy.backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let started = Instant::now();
            let result = match tokio::time::timeout(self.policy.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout {
                    timeout_ms: self.policy.call_timeout.as_millis() as u64,
                }),
            };
            let elapsed = started.elapsed().as_secs_f64();

            let error = match result {
                Ok(value) => {
                    record_fetch_attempt(call, "ok", elapsed);
                    return Ok(value);
                }
                Err(error) => error,
            };

            record_fetch_attempt(call, outcome_label(&error), elapsed);

            if !error.is_transient() || attempt > self.policy.max_retries {
                return Err(CallFailure {
                    error,
                    attempts: attempt,
                });
            }

            let delay = backoff.next_backoff().unwrap_or(self.policy.max_delay);
            warn!(
                call,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Remote call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn outcome_label(error: &SourceError) -> &'static str {
    match error {
        SourceError::NotFound => "not_found",
        SourceError::Transient { .. } => "transient",
        SourceError::Timeout { .. } => "timeout",
        SourceError::Malformed { .. } => "malformed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use citeforge_common::VersionPolicy;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes, then repeats the last one
    struct Scripted<T> {
        outcomes: Mutex<VecDeque<Result<T, SourceError>>>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl<T: Clone> Scripted<T> {
        fn new(outcomes: Vec<Result<T, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(outcome: Result<T, SourceError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![outcome].into()),
                calls: AtomicU32::new(0),
                delay,
            })
        }

        async fn next(&self) -> Result<T, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataProvider for Scripted<PublicationRecord> {
        async fn get_metadata(&self, _id: &PublicationId) -> Result<PublicationRecord, SourceError> {
            self.next().await
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[async_trait]
    impl DocumentSource for Scripted<String> {
        async fn get_text(&self, _id: &PublicationId) -> Result<String, SourceError> {
            self.next().await
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn record() -> PublicationRecord {
        PublicationRecord {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into()],
            year: Some(2017),
            link: "http://arxiv.org/abs/1706.03762v7".into(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.5,
            call_timeout: Duration::from_millis(200),
        }
    }

    fn transient() -> SourceError {
        SourceError::Transient {
            message: "503 Service Unavailable".into(),
        }
    }

    fn id() -> PublicationId {
        PublicationId::parse("1706.03762", VersionPolicy::Collapse).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_is_attempted_once() {
        let metadata = Scripted::<PublicationRecord>::new(vec![Err(SourceError::NotFound)]);
        let documents = Scripted::new(vec![Ok("text".to_string())]);
        let fetcher = RecordFetcher::new(metadata.clone(), documents.clone(), fast_policy());

        let err = fetcher.fetch(&id(), true).await.unwrap_err();
        assert_eq!(err, FailureReason::NotFound);
        assert_eq!(metadata.calls(), 1);
        assert_eq!(documents.calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let metadata = Scripted::new(vec![Err(transient()), Err(transient()), Ok(record())]);
        let documents = Scripted::new(vec![Ok("arXiv:2001.08361".to_string())]);
        let fetcher = RecordFetcher::new(metadata.clone(), documents, fast_policy());

        let fetched = fetcher.fetch(&id(), true).await.unwrap();
        assert_eq!(fetched.record, record());
        assert_eq!(fetched.text, TextOutcome::Text("arXiv:2001.08361".into()));
        assert_eq!(metadata.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhaust() {
        let metadata = Scripted::<PublicationRecord>::new(vec![Err(transient())]);
        let documents = Scripted::new(vec![Ok(String::new())]);
        let fetcher = RecordFetcher::new(metadata.clone(), documents, fast_policy());

        let err = fetcher.fetch(&id(), true).await.unwrap_err();
        assert!(matches!(err, FailureReason::Transient { attempts: 4, .. }));
        assert_eq!(metadata.calls(), 4);
    }

    #[tokio::test]
    async fn test_malformed_is_not_retried() {
        let metadata = Scripted::<PublicationRecord>::new(vec![Err(SourceError::Malformed {
            message: "not an Atom feed".into(),
        })]);
        let documents = Scripted::new(vec![Ok(String::new())]);
        let fetcher = RecordFetcher::new(metadata.clone(), documents, fast_policy());

        let err = fetcher.fetch(&id(), true).await.unwrap_err();
        assert!(matches!(err, FailureReason::Malformed { .. }));
        assert_eq!(metadata.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let metadata = Scripted::slow(Ok(record()), Duration::from_millis(100));
        let documents = Scripted::new(vec![Ok(String::new())]);
        let policy = RetryPolicy {
            max_retries: 1,
            call_timeout: Duration::from_millis(10),
            ..fast_policy()
        };
        let fetcher = RecordFetcher::new(metadata.clone(), documents, policy);

        let err = fetcher.fetch(&id(), true).await.unwrap_err();
        assert!(matches!(err, FailureReason::Transient { attempts: 2, .. }));
        assert_eq!(metadata.calls(), 2);
    }

    #[tokio::test]
    async fn test_text_failure_keeps_metadata() {
        let metadata = Scripted::new(vec![Ok(record())]);
        let documents = Scripted::<String>::new(vec![Err(SourceError::NotFound)]);
        let fetcher = RecordFetcher::new(metadata, documents.clone(), fast_policy());

        let fetched = fetcher.fetch(&id(), true).await.unwrap();
        assert_eq!(fetched.record, record());
        assert_eq!(fetched.text, TextOutcome::Failed(FailureReason::NotFound));
        assert_eq!(documents.calls(), 1);
    }

    #[tokio::test]
    async fn test_leaf_fetch_skips_text() {
        let metadata = Scripted::new(vec![Ok(record())]);
        let documents = Scripted::new(vec![Ok("unused".to_string())]);
        let fetcher = RecordFetcher::new(metadata, documents.clone(), fast_policy());

        let fetched = fetcher.fetch(&id(), false).await.unwrap();
        assert_eq!(fetched.text, TextOutcome::Skipped);
        assert_eq!(documents.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limiter_admits_calls() {
        let limiter = tokio_test::assert_ok!(create_rate_limiter(1000, 10));
        let metadata = Scripted::new(vec![Ok(record())]);
        let documents = Scripted::new(vec![Ok(String::new())]);
        let fetcher = RecordFetcher::new(metadata, documents, fast_policy())
            .with_rate_limiter(Some(limiter));

        tokio_test::assert_ok!(fetcher.fetch(&id(), true).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_caps_request_rate() {
        // 10 requests per second with no burst: one call every 100ms
        let limiter = tokio_test::assert_ok!(create_rate_limiter(10, 1));
        let metadata = Scripted::new(vec![Ok(record())]);
        let documents = Scripted::new(vec![Ok(String::new())]);
        let fetcher = RecordFetcher::new(metadata.clone(), documents, fast_policy())
            .with_rate_limiter(Some(limiter));

        let started = Instant::now();
        for _ in 0..5 {
            tokio_test::assert_ok!(fetcher.fetch(&id(), false).await);
        }
        let elapsed = started.elapsed();

        assert_eq!(metadata.calls(), 5);
        assert!(
            elapsed >= Duration::from_millis(350),
            "5 calls at 10 rps finished in {:?}",
            elapsed
        );
    }

    #[test]
    fn test_rate_limiter_rejects_zero_rate() {
        assert!(create_rate_limiter(0, 1).is_err());
    }
}
