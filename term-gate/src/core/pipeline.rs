//! The validation pipeline: completeness, uniqueness, statistics, bounds.

use super::report::ReportBuilder;
use super::state::StateMachine;
use super::{PipelineState, RuleReport, ValidationReport};
use crate::config::ValidationConfig;
use crate::engine::{Dataset, DatasetEngine};
use crate::error::{FatalViolation, Result};
use crate::log_stage;
use crate::logging::LogConfig;
use crate::rules::RuleSet;
use crate::schema::{KeyDefinition, SchemaDescriptor};
use crate::sink::{ReportSink, TracingSink};
use crate::stages::{
    check_bounds, check_completeness, collect_stats, resolve_duplicates, BoundsOutcome,
    StageOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Runs a validated configuration against datasets.
///
/// The configuration is checked once, when the pipeline is built, and then
/// shared read-only. A pipeline can run any number of datasets, concurrently
/// if the engine allows it; each run owns its own state and report.
///
/// # Examples
///
/// ```rust,no_run
/// use term_gate::prelude::*;
///
/// # async fn example() -> term_gate::error::Result<()> {
/// let engine = DataFusionEngine::new()?;
/// let purchases = engine.register_csv("purchases", "data/purchases.csv").await?;
///
/// let pipeline = ValidationPipeline::new(ValidationConfig::purchases())?;
/// match pipeline.run(&engine, &purchases).await {
///     Ok((clean, report)) => {
///         println!("{} rows kept, {} removed", report.final_row_count, report.total_removed());
///         let _batches = engine.collect(&clean).await?;
///     }
///     Err(GateError::FatalViolation(violation)) => {
///         eprintln!("batch rejected: {violation}");
///     }
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ValidationPipeline {
    config: Arc<ValidationConfig>,
    sink: Arc<dyn ReportSink>,
    log_config: LogConfig,
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("config", &self.config)
            .field("log_config", &self.log_config)
            .finish_non_exhaustive()
    }
}

impl ValidationPipeline {
    /// Validates `config` and builds a pipeline that reports through `tracing`.
    pub fn new(config: ValidationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sink: Arc::new(TracingSink),
            log_config: LogConfig::default(),
        })
    }

    /// Builds a pipeline from its parts.
    pub fn from_parts(
        schema: SchemaDescriptor,
        keys: KeyDefinition,
        rules: RuleSet,
    ) -> Result<Self> {
        Self::new(ValidationConfig::new(schema, keys, rules))
    }

    /// Sends entries, rejected rows and reports to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates one dataset.
    ///
    /// Returns the filtered dataset and a completed report. A fatal breach
    /// returns [`GateError::FatalViolation`](crate::error::GateError::FatalViolation)
    /// carrying the dataset as it entered the bounds stage and an aborted
    /// report. The input dataset is never modified.
    ///
    /// Intermediate datasets are released as soon as a later stage supersedes
    /// them. The returned dataset belongs to the caller, who releases it with
    /// [`DatasetEngine::release`] once done.
    #[instrument(skip_all, fields(run.id = tracing::field::Empty, dataset = %dataset))]
    pub async fn run(
        &self,
        engine: &dyn DatasetEngine,
        dataset: &Dataset,
    ) -> Result<(Dataset, ValidationReport)> {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        tracing::Span::current().record("run.id", run_id);

        let config = self.config.as_ref();
        let mut machine = StateMachine::new();
        let initial_rows = engine.count(dataset).await?;
        let mut report = ReportBuilder::new(run_id, initial_rows);

        info!(
            run.id = run_id,
            rows = initial_rows,
            rules = config.rules.len(),
            "Starting validation run"
        );

        let completeness =
            check_completeness(engine, dataset, initial_rows, &config.keys, self.sink.as_ref())
                .await?;
        let (complete, complete_rows) = self.finish_stage(
            &mut machine,
            &mut report,
            PipelineState::CompletenessChecked,
            completeness,
        )?;

        let uniqueness = resolve_duplicates(engine, &complete, complete_rows, &config.keys).await?;
        let (unique, unique_rows) = self.finish_stage(
            &mut machine,
            &mut report,
            PipelineState::Deduplicated,
            uniqueness,
        )?;
        release_superseded(engine, &complete, dataset, &unique).await?;

        let stats = collect_stats(engine, &unique, &config.schema, &config.rules).await?;
        machine.advance(PipelineState::StatsCollected)?;
        report.record_stage(PipelineState::StatsCollected, unique_rows, unique_rows);
        log_stage!(
            self.log_config,
            run.id = run_id,
            columns = stats.columns().len(),
            "Statistics collected"
        );

        let outcome = check_bounds(
            engine,
            &unique,
            unique_rows,
            &config.rules,
            &stats,
            self.sink.as_ref(),
        )
        .await?;
        machine.advance(PipelineState::BoundsChecked)?;

        match outcome {
            BoundsOutcome::Completed {
                dataset: filtered,
                row_count_after,
                entries,
            } => {
                self.record_entries(&mut report, entries);
                report.record_stage(PipelineState::BoundsChecked, unique_rows, row_count_after);
                machine.advance(PipelineState::Completed)?;
                release_superseded(engine, &unique, dataset, &filtered).await?;

                let report = report.finish(machine.state(), row_count_after);
                self.sink.record_report(&report);
                info!(
                    run.id = run_id,
                    rows.initial = report.initial_row_count,
                    rows.remaining = report.final_row_count,
                    elapsed_ms = report.elapsed_ms,
                    "Validation run completed"
                );
                Ok((filtered, report))
            }
            BoundsOutcome::Aborted {
                entries,
                rule,
                breach,
            } => {
                self.record_entries(&mut report, entries);
                report.record_stage(PipelineState::BoundsChecked, unique_rows, unique_rows);
                machine.advance(PipelineState::Aborted)?;

                let report = report.finish(machine.state(), unique_rows);
                self.sink.record_report(&report);
                warn!(
                    run.id = run_id,
                    rule.id = %rule.id,
                    "Validation run aborted by fatal rule"
                );
                Err(FatalViolation {
                    rule_id: rule.id,
                    column: rule.column,
                    statistic: breach.statistic,
                    observed: breach.observed,
                    bound: breach.bound,
                    dataset: unique,
                    report,
                }
                .into())
            }
        }
    }

    fn finish_stage(
        &self,
        machine: &mut StateMachine,
        report: &mut ReportBuilder,
        stage: PipelineState,
        outcome: StageOutcome,
    ) -> Result<(Dataset, u64)> {
        machine.advance(stage)?;
        log_stage!(
            self.log_config,
            stage = %stage,
            rows.before = outcome.row_count_before,
            rows.after = outcome.row_count_after,
            "Stage finished"
        );
        report.record_stage(stage, outcome.row_count_before, outcome.row_count_after);
        self.record_entries(report, [outcome.entry]);
        if let Some(message) = outcome.inconsistency {
            self.sink.record_inconsistency(&message);
            report.record_inconsistency(message);
        }
        Ok((outcome.dataset, outcome.row_count_after))
    }

    fn record_entries(
        &self,
        report: &mut ReportBuilder,
        entries: impl IntoIterator<Item = RuleReport>,
    ) {
        for entry in entries {
            self.sink.record_entry(&entry);
            report.record_entry(entry);
        }
    }
}

/// Releases `stale` unless it is the caller's input or still moves on as `next`.
async fn release_superseded(
    engine: &dyn DatasetEngine,
    stale: &Dataset,
    input: &Dataset,
    next: &Dataset,
) -> Result<()> {
    if stale != input && stale != next {
        engine.release(stale).await?;
    }
    Ok(())
}

/// Validates `dataset` with a one-off configuration.
///
/// Equivalent to building a [`ValidationPipeline`] from the parts and running
/// it once.
pub async fn run(
    engine: &dyn DatasetEngine,
    dataset: &Dataset,
    schema: SchemaDescriptor,
    keys: KeyDefinition,
    rules: RuleSet,
) -> Result<(Dataset, ValidationReport)> {
    ValidationPipeline::from_parts(schema, keys, rules)?
        .run(engine, dataset)
        .await
}
