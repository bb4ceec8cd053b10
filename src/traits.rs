use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Transient failures of the fetch collaborator. Every variant is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the resource this fetcher reads (e.g. the page URL).
    fn source(&self) -> &str;

    /// Retrieves the page content as text.
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Structured events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    AttemptStarted { attempt: u32, max_attempts: u32 },
    FetchCompleted { attempt: u32, bytes: usize },
    StrategyAttempted { strategy: &'static str },
    /// The strategy found no matching table; the next strategy is invoked.
    StrategyMissed { strategy: &'static str },
    StrategyMatched { strategy: &'static str, rows: usize },
    AttemptFailed { attempt: u32, stage: &'static str, reason: String },
    BackoffScheduled { attempt: u32, delay: Duration },
    Succeeded { attempts: u32, records: usize },
    /// `records` is the row count of the last attempt, if it reached validation.
    Failed {
        attempts: u32,
        records: Option<usize>,
        reason: String,
    },
}

/// Destination for [`PipelineEvent`]s, injected into the pipeline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::AttemptStarted {
                attempt,
                max_attempts,
            } => info!(attempt, max_attempts, "Starting attempt"),
            PipelineEvent::FetchCompleted { attempt, bytes } => {
                debug!(attempt, bytes, "Fetched page")
            }
            PipelineEvent::StrategyAttempted { strategy } => {
                info!(strategy, "Trying extraction strategy")
            }
            PipelineEvent::StrategyMissed { strategy } => {
                warn!(strategy, "No matching table, falling back")
            }
            PipelineEvent::StrategyMatched { strategy, rows } => {
                info!(strategy, rows, "Extraction strategy matched")
            }
            PipelineEvent::AttemptFailed {
                attempt,
                stage,
                reason,
            } => warn!(attempt, stage, reason = %reason, "Attempt failed"),
            PipelineEvent::BackoffScheduled { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "Waiting before retry")
            }
            PipelineEvent::Succeeded { attempts, records } => {
                info!(attempts, records, "Harvest succeeded")
            }
            PipelineEvent::Failed {
                attempts,
                records,
                reason,
            } => error!(attempts, records = ?records, reason = %reason, "Harvest failed"),
        }
    }
}

/// Keeps every event in memory. Useful for assertions and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
