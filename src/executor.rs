use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::instrument;

use crate::config::{BackoffPolicy, HarvestConfig};
use crate::harvest::pipeline::{HarvestPipeline, PipelineError};
use crate::model::ResultSet;
use crate::traits::{FetchError, Fetcher, PipelineEvent};

/// Position of a run in the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Running attempt `n` (1-based)
    Attempting(u32),
    Succeeded,
    Failed,
}

impl AttemptState {
    /// `Attempting(1)`, or `Failed` when no attempt is allowed at all.
    pub fn initial(max_attempts: u32) -> Self {
        if max_attempts == 0 {
            AttemptState::Failed
        } else {
            AttemptState::Attempting(1)
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptState::Attempting(_))
    }

    /// State following the outcome of the current attempt.
    pub fn advance(self, succeeded: bool, max_attempts: u32) -> Self {
        match self {
            AttemptState::Attempting(_) if succeeded => AttemptState::Succeeded,
            AttemptState::Attempting(n) if n < max_attempts => AttemptState::Attempting(n + 1),
            AttemptState::Attempting(_) => AttemptState::Failed,
            terminal => terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Upper bound on a single fetch, on top of the client's own timeout
    pub fetch_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff,
            fetch_timeout: config.timeout(),
        }
    }
}

/// Successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub records: ResultSet,
    /// Attempt that succeeded (1-based)
    pub attempts: u32,
}

/// Terminal `Failed` state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("All {attempts} attempts failed; last failure in {stage} stage: {last}")]
    Exhausted {
        attempts: u32,
        stage: &'static str,
        last: PipelineError,
    },

    #[error("Retry policy allows no attempts")]
    NoAttempts,
}

/// Drives fetch -> extract -> clean -> validate until success or the
/// attempt cap. Every attempt starts from a fresh fetch.
pub struct RetryOrchestrator<F: Fetcher> {
    fetcher: F,
    pipeline: HarvestPipeline,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryOrchestrator<F> {
    pub fn new(fetcher: F, pipeline: HarvestPipeline, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            pipeline,
            policy,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        self.pipeline.sink().emit(&event);
    }

    async fn attempt(&self, attempt: u32) -> Result<ResultSet, PipelineError> {
        let html = timeout(self.policy.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| FetchError::Timeout {
                secs: self.policy.fetch_timeout.as_secs(),
            })??;
        self.emit(PipelineEvent::FetchCompleted {
            attempt,
            bytes: html.len(),
        });

        self.pipeline.process(&html)
    }

    /// Runs the state machine to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Exhausted`] with the last attempt's failure once
    /// `max_attempts` attempts have failed.
    #[instrument(skip(self), fields(source = %self.fetcher.source()))]
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let max_attempts = self.policy.max_attempts;
        let mut state = AttemptState::initial(max_attempts);
        let mut last_failure: Option<(u32, PipelineError)> = None;

        while let AttemptState::Attempting(attempt) = state {
            self.emit(PipelineEvent::AttemptStarted {
                attempt,
                max_attempts,
            });

            let result = self.attempt(attempt).await;
            state = state.advance(result.is_ok(), max_attempts);

            match result {
                Ok(records) => {
                    self.emit(PipelineEvent::Succeeded {
                        attempts: attempt,
                        records: records.len(),
                    });
                    return Ok(RunReport {
                        records,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    self.emit(PipelineEvent::AttemptFailed {
                        attempt,
                        stage: err.stage(),
                        reason: err.to_string(),
                    });
                    if !state.is_terminal() {
                        let delay = self.policy.backoff.delay_after(attempt);
                        self.emit(PipelineEvent::BackoffScheduled { attempt, delay });
                        sleep(delay).await;
                    }
                    last_failure = Some((attempt, err));
                }
            }
        }

        let Some((attempts, last)) = last_failure else {
            self.emit(PipelineEvent::Failed {
                attempts: 0,
                records: None,
                reason: RunError::NoAttempts.to_string(),
            });
            return Err(RunError::NoAttempts);
        };

        let records = last.records();
        let error = RunError::Exhausted {
            attempts,
            stage: last.stage(),
            last,
        };
        self.emit(PipelineEvent::Failed {
            attempts,
            records,
            reason: error.to_string(),
        });
        Err(error)
    }
}
