//! Async projection pipeline.
//!
//! This module provides the [`ProjectionPipeline`] coordinator that runs one
//! projection round trip:
//! - Concurrent fetch of every input collection, each under a timeout
//! - A join barrier: computing starts only once all fetches succeed
//! - Per-unit timelines on the blocking pool via [`UnitExecutor`]
//! - Structured logging via `tracing`

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, instrument};

use crate::config::ProjectionConfig;
use crate::executor::{ExecutorError, UnitExecutor};
use crate::model::{ProjectionInput, ProjectionOutput};
use crate::projection::engine::ProjectionPlan;
use crate::traits::{RecordSource, SourceError};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Projection rows plus timing for one pipeline run.
#[derive(Debug)]
pub struct ProjectionResult {
    pub output: ProjectionOutput,
    pub timings: PipelineTimings,
}

/// Wall-clock timing of one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PipelineTimings {
    /// Time until every collection was fetched (milliseconds)
    pub fetch_duration_ms: u64,

    /// Time spent building timelines and rows (milliseconds)
    pub compute_duration_ms: u64,

    pub total_duration_ms: u64,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A collection fetch exceeded the timeout
    #[error("Fetching '{collection}' timed out after {timeout_ms}ms")]
    FetchTimeout {
        collection: &'static str,
        timeout_ms: u64,
    },

    /// The record store failed to return a collection
    #[error("Fetching '{collection}' failed: {source}")]
    Source {
        collection: &'static str,
        source: SourceError,
    },

    #[error("Projection failed: {0}")]
    Executor(#[from] ExecutorError),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Fetch-then-compute projection over a [`RecordSource`].
///
/// # Example
///
/// ```ignore
/// use stem_forecast::{InMemorySource, ProjectionConfig, ProjectionPipeline};
/// use std::time::Duration;
///
/// let pipeline = ProjectionPipeline::new(source, ProjectionConfig::default())
///     .with_timeout(Duration::from_secs(10));
/// let result = pipeline.execute(today).await?;
/// println!("{} rows", result.output.rows.len());
/// ```
pub struct ProjectionPipeline<S>
where
    S: RecordSource,
{
    source: S,
    config: ProjectionConfig,
    executor: UnitExecutor,
    fetch_timeout: Duration,
}

impl<S> ProjectionPipeline<S>
where
    S: RecordSource,
{
    /// Creates a pipeline with the fetch timeout and parallelism from `config`.
    pub fn new(source: S, config: ProjectionConfig) -> Self {
        Self {
            source,
            executor: UnitExecutor::new(config.max_parallel_units),
            fetch_timeout: config.fetch_timeout(),
            config,
        }
    }

    /// Sets the timeout applied to each collection fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets how many unit timelines may be computed at once.
    pub fn with_parallelism(mut self, limit: usize) -> Self {
        self.executor = UnitExecutor::new(limit);
        self
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Fetches all input collections concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first fetch failure or timeout; the other fetches are
    /// dropped.
    pub async fn fetch(&self) -> Result<ProjectionInput, PipelineError> {
        let limit = self.fetch_timeout;
        let source = &self.source;

        let (observations, pinches, stage_configs, production, beds) = tokio::try_join!(
            fetch_collection("observations", limit, source.observations()),
            fetch_collection("pinches", limit, source.pinches()),
            fetch_collection("stage_configs", limit, source.stage_configs()),
            fetch_collection("production", limit, source.production()),
            fetch_collection("beds", limit, source.beds()),
        )?;

        Ok(ProjectionInput {
            observations,
            pinches,
            stage_configs,
            production,
            beds,
        })
    }

    /// Runs the full round trip for the evaluation date `today`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any fetch fails or times out, or if a unit
    /// task cannot be joined. The projection itself never fails.
    #[instrument(skip(self), fields(source = self.source.source_id()))]
    pub async fn execute(&self, today: NaiveDate) -> Result<ProjectionResult, PipelineError> {
        let start = Instant::now();
        let mut timings = PipelineTimings::default();

        // ====================================================================
        // Stage 1: Fetch
        // ====================================================================

        let input = self.fetch().await?;
        timings.fetch_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            duration_ms = timings.fetch_duration_ms,
            observations = input.observations.len(),
            pinches = input.pinches.len(),
            production = input.production.len(),
            "Fetch completed"
        );

        // ====================================================================
        // Stage 2: Compute
        // ====================================================================

        let compute_start = Instant::now();
        let plan = Arc::new(ProjectionPlan::new(&input, &self.config, today));
        let per_unit = self.executor.execute(Arc::clone(&plan)).await?;
        let output = plan.finish(per_unit);

        timings.compute_duration_ms = compute_start.elapsed().as_millis() as u64;
        timings.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            duration_ms = timings.compute_duration_ms,
            units = output.stats.units,
            rows = output.stats.rows,
            "Compute completed"
        );

        Ok(ProjectionResult { output, timings })
    }
}

async fn fetch_collection<T, F>(
    collection: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| PipelineError::FetchTimeout {
            collection,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })?
        .map_err(|source| PipelineError::Source { collection, source })
}

// ============================================================================
// Tests
// ============================================================================
