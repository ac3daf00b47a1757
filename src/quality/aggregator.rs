//! Runs the configured engines and folds their results.
//!
//! The [`ResultAggregator`] holds engines only as `Arc<dyn Engine>`. Each
//! engine runs on a blocking thread under its own timeout; engines may run
//! concurrently because they share no in-memory state.
//!
//! # Example
//!
//! ```rust,ignore
//! use quality_check::quality::{AggregatorConfig, EngineContext, ResultAggregator};
//!
//! let aggregator = ResultAggregator::from_config(&config, &project_root)?;
//! let result = aggregator.run(&EngineContext::new(&project_root), &files, "id").await;
//! println!("success: {}", result.success());
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, warn};

use super::engines::{Engine, EngineContext, FormatEngine, LintEngine, TypeEngine};
use super::issue::{CheckerResult, QualityCheckResult, Tool};
use crate::config::ProjectConfig;
use crate::error::Result;

// ============================================================================
// Aggregator Configuration
// ============================================================================

/// How engines are scheduled.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Run engines concurrently (default: true).
    pub parallel: bool,
    /// Per-engine timeout in milliseconds. An engine that exceeds it is
    /// reported as skipped.
    pub engine_timeout_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            engine_timeout_ms: 30_000,
        }
    }
}

impl AggregatorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    #[must_use]
    pub fn with_engine_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.engine_timeout_ms = timeout_ms;
        self
    }
}

// ============================================================================
// Result Aggregator
// ============================================================================

/// Orchestrates the engines for one invocation.
pub struct ResultAggregator {
    engines: Vec<Arc<dyn Engine>>,
    config: AggregatorConfig,
}

impl ResultAggregator {
    /// An aggregator with no engines.
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            engines: Vec::new(),
            config,
        }
    }

    /// Add an engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engines.push(engine);
        self
    }

    /// Build the engines enabled in `config`.
    pub fn from_config(config: &ProjectConfig, project_root: &Path) -> Result<Self> {
        let mut aggregator = Self::new(
            AggregatorConfig::new()
                .with_parallel(config.parallel_engines)
                .with_engine_timeout_ms(config.engine_timeout_ms),
        );

        if config.typescript.enabled {
            aggregator = aggregator.with_engine(Arc::new(TypeEngine::new(config.tsc_cache_dir())));
        }
        if config.eslint.enabled {
            let engine = LintEngine::new(&config.eslint, config.eslint_cache_dir(project_root))?;
            aggregator = aggregator.with_engine(Arc::new(engine));
        }
        if config.prettier.enabled {
            aggregator = aggregator.with_engine(Arc::new(FormatEngine::new()));
        }

        Ok(aggregator)
    }

    /// Tools this aggregator will run, in registration order.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.engines.iter().map(|e| e.tool()).collect()
    }

    /// Run every engine on `files` and fold the results.
    pub async fn run(
        &self,
        ctx: &EngineContext,
        files: &[PathBuf],
        correlation_id: &str,
    ) -> QualityCheckResult {
        self.run_engines(&self.engines, ctx, files, correlation_id)
            .await
    }

    /// Run only the engines reporting as one of `tools`.
    pub async fn run_only(
        &self,
        tools: &[Tool],
        ctx: &EngineContext,
        files: &[PathBuf],
        correlation_id: &str,
    ) -> QualityCheckResult {
        let engines: Vec<Arc<dyn Engine>> = self
            .engines
            .iter()
            .filter(|e| tools.contains(&e.tool()))
            .cloned()
            .collect();
        self.run_engines(&engines, ctx, files, correlation_id).await
    }

    async fn run_engines(
        &self,
        engines: &[Arc<dyn Engine>],
        ctx: &EngineContext,
        files: &[PathBuf],
        correlation_id: &str,
    ) -> QualityCheckResult {
        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.engine_timeout_ms);

        let outcomes: Vec<(Tool, CheckerResult)> = if self.config.parallel {
            let futures = engines.iter().map(|engine| {
                run_single_engine_with_timeout(Arc::clone(engine), ctx.clone(), files.to_vec(), timeout)
            });
            join_all(futures).await
        } else {
            let mut outcomes = Vec::with_capacity(engines.len());
            for engine in engines {
                outcomes.push(
                    run_single_engine_with_timeout(
                        Arc::clone(engine),
                        ctx.clone(),
                        files.to_vec(),
                        timeout,
                    )
                    .await,
                );
            }
            outcomes
        };

        let checkers: BTreeMap<Tool, CheckerResult> = outcomes.into_iter().collect();
        QualityCheckResult::new(checkers, start.elapsed().as_millis() as u64, correlation_id)
    }
}

/// Run one engine on a blocking thread with a timeout.
///
/// Errors, panics and timeouts all become a skipped result so one engine
/// never takes the run down.
async fn run_single_engine_with_timeout(
    engine: Arc<dyn Engine>,
    ctx: EngineContext,
    files: Vec<PathBuf>,
    timeout: Duration,
) -> (Tool, CheckerResult) {
    let tool = engine.tool();
    let name = engine.name().to_string();
    let start = Instant::now();

    let task = tokio::task::spawn_blocking(move || engine.check(&ctx, &files));
    let result = tokio::time::timeout(timeout, task).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let checker = match result {
        Ok(Ok(Ok(checker))) => {
            debug!("{} finished in {}ms", name, duration_ms);
            checker
        }
        Ok(Ok(Err(e))) => {
            warn!("{} failed: {}", name, e);
            CheckerResult::skipped(e.to_string())
        }
        Ok(Err(e)) => {
            warn!("{} panicked: {}", name, e);
            CheckerResult::skipped(format!("{name} panicked"))
        }
        Err(_elapsed) => {
            warn!("{} timed out after {}ms", name, timeout.as_millis());
            CheckerResult::skipped(format!(
                "{name} timed out after {}ms",
                timeout.as_millis()
            ))
        }
    };

    (tool, checker.with_duration(duration_ms))
}
