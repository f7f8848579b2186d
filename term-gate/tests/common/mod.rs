//! Shared helpers for integration tests.
#![allow(dead_code)]

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use term_gate::engine::{DataFusionEngine, Dataset};

pub type Row = [Option<&'static str>; 6];

/// A row that passes every purchase rule, with the given id.
pub fn good(id: &'static str) -> Row {
    [
        Some(id),
        Some("20240115"),
        Some("books"),
        Some("online"),
        Some("Y"),
        Some("12.500000"),
    ]
}

pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(
        ["id", "day_cd", "category", "type", "ind", "purchase_amt"]
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

pub fn batch_of(rows: &[Row]) -> RecordBatch {
    let columns = (0..6)
        .map(|i| Arc::new(rows.iter().map(|r| r[i]).collect::<StringArray>()) as ArrayRef)
        .collect::<Vec<_>>();
    RecordBatch::try_new(schema(), columns).unwrap()
}

/// Registers owned string rows; used by property tests.
pub fn batch_of_owned(rows: &[[Option<String>; 6]]) -> RecordBatch {
    let columns = (0..6)
        .map(|i| Arc::new(rows.iter().map(|r| r[i].as_deref()).collect::<StringArray>()) as ArrayRef)
        .collect::<Vec<_>>();
    RecordBatch::try_new(schema(), columns).unwrap()
}

pub fn engine_with(rows: &[Row]) -> (DataFusionEngine, Dataset) {
    let engine = DataFusionEngine::new().unwrap();
    let dataset = if rows.is_empty() {
        engine.register_batches("purchases", schema(), vec![]).unwrap()
    } else {
        engine.register_batch("purchases", batch_of(rows)).unwrap()
    };
    (engine, dataset)
}

/// Reads one text column of a collected dataset.
pub async fn column_values(
    engine: &DataFusionEngine,
    dataset: &Dataset,
    column: &str,
) -> Vec<Option<String>> {
    use term_gate::engine::DatasetEngine;

    let batches = engine.collect(dataset).await.unwrap();
    let mut values = Vec::new();
    for batch in batches {
        let index = batch.schema().index_of(column).unwrap();
        let array = batch
            .column(index)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .clone();
        values.extend(array.iter().map(|v| v.map(str::to_string)));
    }
    values
}
