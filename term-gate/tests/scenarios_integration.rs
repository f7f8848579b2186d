//! End-to-end runs of the purchase configuration.

mod common;

use common::{batch_of, column_values, engine_with, good, Row};
use std::sync::{Arc, Mutex};
use term_gate::core::{PipelineState, RuleOutcome};
use term_gate::engine::{DataFusionEngine, Dataset, DatasetEngine};
use term_gate::error::GateError;
use term_gate::prelude::*;
use term_gate::rules::{COMPLETENESS_RULE_ID, UNIQUENESS_RULE_ID};

fn pipeline() -> ValidationPipeline {
    ValidationPipeline::new(ValidationConfig::purchases()).unwrap()
}

#[tokio::test]
async fn test_non_integer_id_is_dropped() {
    let mut bad = good("3");
    bad[0] = Some("abc");
    let (engine, data) = engine_with(&[good("1"), good("2"), bad]);

    let (clean, report) = pipeline().run(&engine, &data).await.unwrap();

    let completeness = report.entry(COMPLETENESS_RULE_ID).unwrap();
    assert_eq!(completeness.rows_removed, 1);
    assert_eq!(completeness.outcome, RuleOutcome::Filtered);
    let dedup = report.stage(PipelineState::Deduplicated).unwrap();
    assert_eq!(dedup.row_count_before, 2);
    assert!(report.is_complete());

    let ids = column_values(&engine, &clean, "id").await;
    assert!(!ids.contains(&Some("abc".to_string())));
}

#[tokio::test]
async fn test_duplicate_key_keeps_one_row() {
    let first = good("1");
    let mut second = good("1");
    second[4] = Some("N");
    let (engine, data) = engine_with(&[first, second, good("2")]);

    let (clean, report) = pipeline().run(&engine, &data).await.unwrap();

    assert_eq!(report.entry(UNIQUENESS_RULE_ID).unwrap().rows_removed, 1);
    let key: Vec<String> = ["id", "day_cd", "category", "type"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(
        engine.distinct_count(&clean, &key).await.unwrap(),
        engine.count(&clean).await.unwrap()
    );
    assert_eq!(report.final_row_count, 2);
    assert!(!report.has_inconsistencies());
}

#[tokio::test]
async fn test_short_day_code_is_filtered() {
    let mut short = good("3");
    short[1] = Some("2024011");
    let (engine, data) = engine_with(&[good("1"), good("2"), short]);

    let (clean, report) = pipeline().run(&engine, &data).await.unwrap();

    let entry = report.entry("day_cd_length").unwrap();
    assert_eq!(entry.outcome, RuleOutcome::Filtered);
    assert_eq!(entry.rows_removed, 1);
    assert_eq!(report.final_state, PipelineState::Completed);
    assert_eq!(engine.count(&clean).await.unwrap(), 2);
}

#[tokio::test]
async fn test_long_category_aborts_run() {
    let mut long = good("3");
    long[2] = Some("abcdefghijklmnopqrstuvwxyz0123");
    // A recoverable violation earlier in rule order must not leak into the
    // returned dataset.
    let mut short = good("4");
    short[1] = Some("2024011");
    let (engine, data) = engine_with(&[good("1"), good("2"), long, short]);

    let err = pipeline().run(&engine, &data).await.unwrap_err();
    let violation = match err {
        GateError::FatalViolation(violation) => violation,
        other => panic!("expected a fatal violation, got {other}"),
    };

    assert_eq!(violation.rule_id, "category_length");
    assert_eq!(violation.observed, 30);
    assert_eq!(violation.report.final_state, PipelineState::Aborted);
    assert!(!violation.report.is_complete());

    // The recoverable breach before the fatal one is judged but not applied.
    let day_cd = violation.report.entry("day_cd_length").unwrap();
    assert_eq!(day_cd.rows_removed, 0);
    assert!(day_cd.breach.is_some());
    assert_eq!(violation.report.entry("category_length").unwrap().rows_examined, 4);
    assert!(violation.report.entry("type_length").is_none());
    assert!(violation.report.entry("purchase_amt_length").is_none());

    // Pre-bounds state: all four rows, including the one day_cd would drop.
    assert_eq!(violation.report.final_row_count, 4);
    assert_eq!(
        violation.report.initial_row_count - violation.report.final_row_count,
        violation.report.total_removed()
    );
    // Nothing was removed before bounds, so the bounds input is the input.
    assert_eq!(violation.dataset, data);
    let mut ids = column_values(&engine, &violation.dataset, "id").await;
    ids.sort();
    assert_eq!(
        ids,
        ["1", "2", "3", "4"].map(|id| Some(id.to_string())).to_vec()
    );
}

#[tokio::test]
async fn test_fatal_after_filters_returns_deduplicated_rows() {
    let mut long = good("3");
    long[2] = Some("abcdefghijklmnopqrstuvwxyz0123");
    let mut short = good("4");
    short[1] = Some("2024011");
    let mut no_id = good("5");
    no_id[0] = None;
    let (engine, data) = engine_with(&[good("1"), good("1"), long, short, no_id]);

    let err = pipeline().run(&engine, &data).await.unwrap_err();
    let violation = err.as_fatal().unwrap();
    let report = &violation.report;

    assert_eq!(report.entry(COMPLETENESS_RULE_ID).unwrap().rows_removed, 1);
    assert_eq!(report.entry(UNIQUENESS_RULE_ID).unwrap().rows_removed, 1);
    assert_eq!(report.final_row_count, 3);
    assert_eq!(
        report.initial_row_count - report.final_row_count,
        report.total_removed()
    );

    // Exactly the rows that entered the bounds stage, short day_cd included.
    let mut ids = column_values(&engine, &violation.dataset, "id").await;
    ids.sort();
    assert_eq!(ids, ["1", "3", "4"].map(|id| Some(id.to_string())).to_vec());
    let mut days = column_values(&engine, &violation.dataset, "day_cd").await;
    days.sort();
    assert_eq!(
        days,
        ["2024011", "20240115", "20240115"]
            .map(|d| Some(d.to_string()))
            .to_vec()
    );
    // Only the returned dataset is left registered.
    assert_eq!(
        engine.derived_datasets(),
        vec![violation.dataset.name().to_string()]
    );
}

#[tokio::test]
async fn test_empty_dataset_completes() {
    let (engine, data) = engine_with(&[]);

    let (clean, report) = pipeline().run(&engine, &data).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.initial_row_count, 0);
    assert_eq!(report.final_row_count, 0);
    assert_eq!(report.total_removed(), 0);
    assert!(report
        .entries
        .iter()
        .all(|e| e.outcome == RuleOutcome::Passed));
    assert_eq!(engine.count(&clean).await.unwrap(), 0);
}

#[tokio::test]
async fn test_out_of_range_id_is_fatal() {
    let mut big = good("2");
    big[0] = Some("3000000000");
    let (engine, data) = engine_with(&[good("1"), big]);

    let err = pipeline().run(&engine, &data).await.unwrap_err();
    let violation = err.as_fatal().unwrap();
    assert_eq!(violation.rule_id, "id_range");
    assert_eq!(violation.bound, 2_147_483_647);
    assert_eq!(violation.report.entry(COMPLETENESS_RULE_ID).unwrap().rows_removed, 0);
}

#[tokio::test]
async fn test_row_counts_never_grow() {
    let mut rows: Vec<Row> = vec![good("1"), good("1"), good("2"), good("3")];
    rows[2][4] = Some("YN");
    rows[3][0] = None;
    let (engine, data) = engine_with(&rows);

    let (_, report) = pipeline().run(&engine, &data).await.unwrap();

    let mut previous = report.initial_row_count;
    for stage in &report.stages {
        assert_eq!(stage.row_count_before, previous);
        assert!(stage.row_count_after <= stage.row_count_before);
        previous = stage.row_count_after;
    }
    assert_eq!(previous, report.final_row_count);
    assert_eq!(
        report.initial_row_count - report.final_row_count,
        report.total_removed()
    );
    assert_eq!(report.final_row_count, 1);
}

#[tokio::test]
async fn test_input_dataset_is_untouched() {
    let mut bad = good("2");
    bad[4] = Some("YN");
    let (engine, data) = engine_with(&[good("1"), good("1"), bad]);

    let (clean, _) = pipeline().run(&engine, &data).await.unwrap();

    assert_ne!(clean, data);
    assert_eq!(engine.count(&data).await.unwrap(), 3);
}

/// Reads rejected rows while their handles are still registered.
struct CollectingSink {
    engine: Arc<DataFusionEngine>,
    rows: Mutex<Vec<(String, Vec<Option<String>>)>>,
}

impl ReportSink for CollectingSink {
    fn record_rejected(&self, rule_id: &str, rows: &Dataset, _count: u64) {
        let values = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(column_values(&self.engine, rows, "ind"))
        });
        self.rows.lock().unwrap().push((rule_id.to_string(), values));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sink_reads_rejected_rows_during_callback() {
    let mut bad = good("2");
    bad[4] = Some("YN");
    let (engine, data) = engine_with(&[good("1"), bad]);
    let engine = Arc::new(engine);
    let sink = Arc::new(CollectingSink {
        engine: engine.clone(),
        rows: Mutex::new(Vec::new()),
    });

    let (_, report) = pipeline()
        .with_sink(sink.clone())
        .run(engine.as_ref(), &data)
        .await
        .unwrap();

    assert!(report.is_complete());
    let rows = sink.rows.lock().unwrap().clone();
    assert_eq!(
        rows,
        vec![("ind_length".to_string(), vec![Some("YN".to_string())])]
    );
}

#[tokio::test]
async fn test_memory_sink_keeps_released_handles() {
    let mut bad = good("2");
    bad[4] = Some("YN");
    let (engine, data) = engine_with(&[good("1"), bad]);
    let sink = Arc::new(MemorySink::new());

    let (_, report) = pipeline()
        .with_sink(sink.clone())
        .run(&engine, &data)
        .await
        .unwrap();

    let rejected = sink.rejected();
    assert_eq!(rejected.len(), 1);
    let (rule_id, rows, count) = &rejected[0];
    assert_eq!(rule_id, "ind_length");
    assert_eq!(*count, 1);
    assert!(engine.count(rows).await.is_err());
    assert_eq!(sink.entries().len(), report.entries.len());
}

#[tokio::test]
async fn test_repeated_runs_do_not_accumulate_views() {
    let engine = DataFusionEngine::new().unwrap();
    let pipeline = pipeline();

    for run in 0..5 {
        let mut no_id = good("9");
        no_id[0] = None;
        let mut wide = good("2");
        wide[4] = Some("YN");
        let name = format!("purchases_{run}");
        let data = engine
            .register_batch(&name, batch_of(&[good("1"), good("1"), wide, no_id]))
            .unwrap();

        let (clean, report) = pipeline.run(&engine, &data).await.unwrap();
        assert_eq!(report.final_row_count, 1);
        assert_eq!(engine.derived_datasets(), vec![clean.name().to_string()]);

        engine.release(&clean).await.unwrap();
        engine.release(&data).await.unwrap();
        assert!(engine.derived_datasets().is_empty());
    }
}

#[tokio::test]
async fn test_empty_indicator_is_filtered() {
    let mut empty = good("2");
    empty[4] = Some("");
    let mut missing = good("3");
    missing[4] = None;
    let (engine, data) = engine_with(&[good("1"), empty, missing]);

    let (clean, report) = pipeline().run(&engine, &data).await.unwrap();

    let entry = report.entry("ind_length").unwrap();
    assert_eq!(entry.outcome, RuleOutcome::Filtered);
    assert_eq!(entry.rows_removed, 1);
    // A NULL flag has no length to judge and is kept.
    let mut ids = column_values(&engine, &clean, "id").await;
    ids.sort();
    assert_eq!(ids, vec![Some("1".to_string()), Some("3".to_string())]);
}

#[tokio::test]
async fn test_free_function_run() {
    let (engine, data) = engine_with(&[good("1"), good("2")]);
    let config = ValidationConfig::purchases();

    let (_, report) = term_gate::core::run(&engine, &data, config.schema, config.keys, config.rules)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.final_row_count, 2);
}
