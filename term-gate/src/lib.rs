//! # Term Gate - Rule-Driven Batch Validation for Rust
//!
//! Term Gate screens a tabular batch before it is loaded anywhere. A batch is
//! described by a typed schema, a completeness key, a uniqueness key and an
//! ordered set of bounds rules. Running the pipeline either returns a filtered
//! copy of the batch with a report of every rule, or rejects the whole batch
//! when a fatal rule is breached.
//!
//! Row work is delegated to a [`DatasetEngine`](engine::DatasetEngine); the
//! shipped engine runs SQL on DataFusion.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use term_gate::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let engine = DataFusionEngine::new()?;
//! let batch = engine.register_csv("purchases", "data/purchases.csv").await?;
//!
//! let pipeline = ValidationPipeline::new(ValidationConfig::purchases())?;
//! let (clean, report) = pipeline.run(&engine, &batch).await?;
//!
//! println!("{}", HumanFormatter::new().format(&report)?);
//! let _rows = engine.collect(&clean).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Stages
//!
//! 1. **Completeness**: rows whose completeness-key columns are NULL or fail
//!    integer coercion are dropped.
//! 2. **Uniqueness**: one row is kept per uniqueness-key tuple.
//! 3. **Statistics**: min/max of every rule-referenced column, in one scan.
//! 4. **Bounds**: each rule is checked against the statistics in declaration
//!    order. Recoverable rules filter offending rows; a fatal rule aborts the
//!    run with [`GateError::FatalViolation`](error::GateError::FatalViolation).
//!
//! ## Configuration
//!
//! A [`ValidationConfig`](config::ValidationConfig) is plain serde data and can
//! be loaded from JSON with
//! [`ValidationConfig::from_path`](config::ValidationConfig::from_path). It is
//! validated once, when the pipeline is built.
//!
//! ## Logging
//!
//! All diagnostics go through `tracing`. See [`logging`] for the verbosity
//! knobs and a ready-made subscriber.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod rules;
pub mod schema;
pub mod security;
pub mod sink;
pub mod stages;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
