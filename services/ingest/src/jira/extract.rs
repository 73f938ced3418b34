use std::time::Duration;

use chrono::Utc;
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::CollectionId;
use quarry_config::{parse_bool_var_or, parse_var_or};
use quarry_store::checkpoint::CheckpointRepository;
use quarry_store::pages::PageSink;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::client::{JiraClient, SearchError};
use super::models::{max_updated, SearchPage};
use super::query::{build_search_jql, incremental_filter};
use super::retry::{Decision, GiveUpReason, RetryPolicy, RetryState};
use crate::pacing::{Sleeper, TokioSleeper};

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub project_keys: Vec<CollectionId>,
    pub page_size: u32,
    /// Pause between two successful pages, independent of retry backoff.
    pub polite_delay: Duration,
    pub incremental: bool,
    pub lookback_days: u32,
    pub retry: RetryPolicy,
}

impl ExtractConfig {
    /// Load extraction settings from environment.
    ///
    /// `JIRA_PROJECT_KEYS` is mandatory; every other knob has a default.
    pub fn from_env() -> QuarryResult<Self> {
        let project_keys = parse_csv_project_keys("JIRA_PROJECT_KEYS")?;
        let defaults = RetryPolicy::default();

        let page_size: u32 = parse_var_or("EXTRACT_PAGE_SIZE", 50)?;
        if page_size == 0 {
            return Err(QuarryError::Config(
                "EXTRACT_PAGE_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            project_keys,
            page_size,
            polite_delay: Duration::from_secs(parse_var_or("EXTRACT_POLITE_DELAY_SECS", 2)?),
            incremental: parse_bool_var_or("EXTRACT_INCREMENTAL", false)?,
            lookback_days: parse_var_or("EXTRACT_LOOKBACK_DAYS", 7)?,
            retry: RetryPolicy {
                backoff_base: parse_var_or("EXTRACT_BACKOFF_BASE", defaults.backoff_base)?,
                max_backoff: Duration::from_secs(parse_var_or(
                    "EXTRACT_MAX_BACKOFF_SECS",
                    defaults.max_backoff.as_secs(),
                )?),
                rate_limit_delay: Duration::from_secs(parse_var_or(
                    "EXTRACT_RATE_LIMIT_DELAY_SECS",
                    defaults.rate_limit_delay.as_secs(),
                )?),
                max_attempts: parse_var_or("EXTRACT_MAX_ATTEMPTS", defaults.max_attempts)?,
            },
        })
    }

    /// The same settings limited to a single configured project.
    pub fn restricted_to(&self, key: &CollectionId) -> QuarryResult<Self> {
        if !self.project_keys.contains(key) {
            return Err(QuarryError::Config(format!(
                "project {key} is not in JIRA_PROJECT_KEYS"
            )));
        }
        Ok(Self {
            project_keys: vec![key.clone()],
            ..self.clone()
        })
    }
}

/// Parse a comma-separated list of Jira project keys from an env var.
/// Returns `Err` if the var is missing, all entries are blank, or a key is
/// not a valid collection identifier.
pub fn parse_csv_project_keys(env_key: &str) -> QuarryResult<Vec<CollectionId>> {
    let raw = std::env::var(env_key)
        .map_err(|_| QuarryError::Config(format!("{env_key} is required but not set")))?;

    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let key = CollectionId::parse(part)
            .map_err(|e| QuarryError::Config(format!("{env_key}: {e}")))?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        return Err(QuarryError::Config(format!(
            "{env_key} is set but contains no valid project keys"
        )));
    }

    Ok(keys)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{collection}: remote rejected request at offset {offset}: HTTP {status}: {body}")]
    RemoteRejected {
        collection: CollectionId,
        offset: u64,
        status: StatusCode,
        body: String,
    },

    #[error("{collection}: gave up at offset {offset} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        collection: CollectionId,
        offset: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("{collection}: request failed at offset {offset}: {source}")]
    Transport {
        collection: CollectionId,
        offset: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("{collection}: persisting progress failed: {source}")]
    Store {
        collection: CollectionId,
        #[source]
        source: QuarryError,
    },

    #[error("{collection}: cancelled at offset {offset}")]
    Cancelled {
        collection: CollectionId,
        offset: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The remote returned an empty page.
    Exhausted,
    /// The cursor reached the last reported total.
    ReachedTotal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub collection: CollectionId,
    pub start_cursor: u64,
    pub cursor: u64,
    pub total: Option<u64>,
    pub pages: u64,
    pub records: u64,
    pub watermark: Option<String>,
    pub finish: Finish,
}

enum Step {
    Request,
    Backoff(Duration),
    Ingest(SearchPage),
    Done(Finish),
}

/// The only mutable copy of cursor and watermark during a run.
struct Progress {
    cursor: u64,
    watermark: Option<String>,
    total: Option<u64>,
    pages: u64,
    records: u64,
}

/// Drives paginated extraction of one collection at a time.
pub struct Extractor<C, P, S = TokioSleeper> {
    client: JiraClient,
    config: ExtractConfig,
    checkpoints: C,
    pages: P,
    sleeper: S,
}

impl<C, P> Extractor<C, P, TokioSleeper>
where
    C: CheckpointRepository,
    P: PageSink,
{
    pub fn new(client: JiraClient, config: ExtractConfig, checkpoints: C, pages: P) -> Self {
        Self {
            client,
            config,
            checkpoints,
            pages,
            sleeper: TokioSleeper,
        }
    }
}

impl<C, P, S> Extractor<C, P, S>
where
    C: CheckpointRepository,
    P: PageSink,
    S: Sleeper,
{
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Extractor<C, P, T> {
        Extractor {
            client: self.client,
            config: self.config,
            checkpoints: self.checkpoints,
            pages: self.pages,
            sleeper,
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extract `collection` from its last checkpoint until the remote is
    /// exhausted. Progress is persisted after every page, so an aborted run
    /// resumes from the last ingested page.
    pub async fn extract(
        &self,
        collection: &CollectionId,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport, ExtractError> {
        let span = tracing::info_span!("extract", collection = %collection);
        self.run(collection, cancel).instrument(span).await
    }

    async fn run(
        &self,
        collection: &CollectionId,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport, ExtractError> {
        let checkpoint = self
            .checkpoints
            .load(collection)
            .await
            .map_err(|source| store_error(collection, source))?;

        let filter = incremental_filter(
            self.config.incremental,
            self.config.lookback_days,
            &checkpoint,
            Utc::now().date_naive(),
        );
        let jql = build_search_jql(collection, &filter);
        tracing::info!(
            jql = %jql,
            cursor = checkpoint.cursor,
            watermark = ?checkpoint.watermark,
            "starting extraction"
        );

        let start_cursor = checkpoint.cursor;
        let mut progress = Progress {
            cursor: checkpoint.cursor,
            watermark: checkpoint.watermark,
            total: None,
            pages: 0,
            records: 0,
        };
        let mut retry = RetryState::default();
        let mut step = Step::Request;

        let finish = loop {
            step = match step {
                Step::Request => {
                    let offset = progress.cursor;
                    self.ensure_live(cancel, collection, offset)?;
                    tracing::debug!(offset, attempt = retry.attempt, "requesting page");

                    let request = self.client.search(&jql, offset, self.config.page_size);
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(collection, offset)),
                        outcome = request => outcome,
                    };

                    match outcome {
                        Ok(page) => {
                            retry = retry.succeeded();
                            Step::Ingest(page)
                        }
                        Err(err) => self.after_failure(collection, offset, &mut retry, err)?,
                    }
                }
                Step::Backoff(delay) => {
                    self.pause(delay, cancel, collection, progress.cursor)
                        .await?;
                    Step::Request
                }
                Step::Ingest(page) => self.ingest(collection, &mut progress, page, cancel).await?,
                Step::Done(finish) => break finish,
            };
        };

        let report = ExtractReport {
            collection: collection.clone(),
            start_cursor,
            cursor: progress.cursor,
            total: progress.total,
            pages: progress.pages,
            records: progress.records,
            watermark: progress.watermark,
            finish,
        };
        tracing::info!(
            pages = report.pages,
            records = report.records,
            cursor = report.cursor,
            watermark = ?report.watermark,
            finish = ?report.finish,
            "extraction completed"
        );
        Ok(report)
    }

    async fn ingest(
        &self,
        collection: &CollectionId,
        progress: &mut Progress,
        page: SearchPage,
        cancel: &CancellationToken,
    ) -> Result<Step, ExtractError> {
        if page.issues.is_empty() {
            tracing::info!(offset = progress.cursor, "empty page, collection exhausted");
            return Ok(Step::Done(Finish::Exhausted));
        }
        if page.total.is_some() {
            progress.total = page.total;
        }

        let offset = progress.cursor;
        let fetched = page.issues.len() as u64;

        if let Some(page_max) = max_updated(&page.issues) {
            let advances = progress
                .watermark
                .as_deref()
                .map_or(true, |current| page_max > current);
            if advances {
                progress.watermark = Some(page_max.to_string());
            }
        }

        self.pages
            .store(collection, offset, &page.issues)
            .await
            .map_err(|source| store_error(collection, source))?;

        progress.cursor = offset.saturating_add(fetched);
        self.checkpoints
            .save(collection, progress.cursor, progress.watermark.as_deref())
            .await
            .map_err(|source| store_error(collection, source))?;
        progress.pages += 1;
        progress.records += fetched;

        tracing::info!(
            offset,
            fetched,
            cursor = progress.cursor,
            total = ?progress.total,
            "page ingested"
        );

        // The polite pause only separates requests; the last page has none after it.
        if progress.total.is_some_and(|total| progress.cursor >= total) {
            return Ok(Step::Done(Finish::ReachedTotal));
        }

        let cursor = progress.cursor;
        self.pause(self.config.polite_delay, cancel, collection, cursor)
            .await?;
        Ok(Step::Request)
    }

    fn after_failure(
        &self,
        collection: &CollectionId,
        offset: u64,
        retry: &mut RetryState,
        err: SearchError,
    ) -> Result<Step, ExtractError> {
        let (next, decision) = self.config.retry.on_failure(*retry, err.failure());
        *retry = next;
        match decision {
            Decision::Retry { delay, fault } => {
                tracing::warn!(
                    offset,
                    attempt = retry.attempt,
                    max_attempts = self.config.retry.max_attempts,
                    delay_secs = delay.as_secs(),
                    fault = ?fault,
                    error = %err,
                    "request failed, retrying"
                );
                Ok(Step::Backoff(delay))
            }
            Decision::GiveUp(reason) => Err(give_up(collection, offset, *retry, reason, err)),
        }
    }

    fn ensure_live(
        &self,
        cancel: &CancellationToken,
        collection: &CollectionId,
        offset: u64,
    ) -> Result<(), ExtractError> {
        if cancel.is_cancelled() {
            return Err(cancelled(collection, offset));
        }
        Ok(())
    }

    async fn pause(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
        collection: &CollectionId,
        offset: u64,
    ) -> Result<(), ExtractError> {
        self.ensure_live(cancel, collection, offset)?;
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(collection, offset)),
            _ = self.sleeper.sleep(delay) => Ok(()),
        }
    }
}

fn store_error(collection: &CollectionId, source: QuarryError) -> ExtractError {
    ExtractError::Store {
        collection: collection.clone(),
        source,
    }
}

fn cancelled(collection: &CollectionId, offset: u64) -> ExtractError {
    tracing::warn!(offset, "extraction cancelled");
    ExtractError::Cancelled {
        collection: collection.clone(),
        offset,
    }
}

fn give_up(
    collection: &CollectionId,
    offset: u64,
    state: RetryState,
    reason: GiveUpReason,
    err: SearchError,
) -> ExtractError {
    let collection = collection.clone();
    let error = match (reason, err) {
        (GiveUpReason::Exhausted, err) => ExtractError::RetriesExhausted {
            collection,
            offset,
            attempts: state.attempt,
            last_error: err.to_string(),
        },
        (_, SearchError::Status { status, body }) => ExtractError::RemoteRejected {
            collection,
            offset,
            status,
            body,
        },
        (_, SearchError::Transport(source)) => ExtractError::Transport {
            collection,
            offset,
            source,
        },
    };
    tracing::error!(error = %error, "aborting extraction");
    error
}
