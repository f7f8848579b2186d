//! Purchase-record fixtures for tests and benchmarks.
//!
//! Every column is loaded as text, the way raw extracts arrive, so that
//! coercion and length checks see exactly what a file would contain.

use crate::engine::{DataFusionEngine, Dataset};
use crate::error::Result;
use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Column names of the purchase dataset, in order.
pub const PURCHASE_COLUMNS: [&str; 6] = ["id", "day_cd", "category", "type", "ind", "purchase_amt"];

/// One raw purchase record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRow {
    pub id: Option<String>,
    pub day_cd: Option<String>,
    pub category: Option<String>,
    pub r#type: Option<String>,
    pub ind: Option<String>,
    pub purchase_amt: Option<String>,
}

impl PurchaseRow {
    /// A row that passes every purchase rule.
    pub fn valid(id: i64, day_cd: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            day_cd: Some(day_cd.to_string()),
            category: Some("books".to_string()),
            r#type: Some("online".to_string()),
            ind: Some("Y".to_string()),
            purchase_amt: Some("12.500000".to_string()),
        }
    }

    pub fn with_id(mut self, id: Option<&str>) -> Self {
        self.id = id.map(str::to_string);
        self
    }

    pub fn with_day_cd(mut self, day_cd: Option<&str>) -> Self {
        self.day_cd = day_cd.map(str::to_string);
        self
    }

    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(str::to_string);
        self
    }

    pub fn with_type(mut self, value: Option<&str>) -> Self {
        self.r#type = value.map(str::to_string);
        self
    }

    pub fn with_ind(mut self, ind: Option<&str>) -> Self {
        self.ind = ind.map(str::to_string);
        self
    }

    pub fn with_amount(mut self, amount: Option<&str>) -> Self {
        self.purchase_amt = amount.map(str::to_string);
        self
    }
}

/// Arrow schema of the raw purchase dataset (all nullable text).
pub fn purchase_schema() -> SchemaRef {
    Arc::new(Schema::new(
        PURCHASE_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Builds a record batch from purchase rows.
///
/// # Panics
///
/// Never for well-formed rows; the schema and the columns are built together.
pub fn purchase_batch(rows: &[PurchaseRow]) -> RecordBatch {
    fn column<F>(rows: &[PurchaseRow], field: F) -> Arc<StringArray>
    where
        F: Fn(&PurchaseRow) -> Option<&str>,
    {
        Arc::new(rows.iter().map(field).collect::<StringArray>())
    }

    RecordBatch::try_new(
        purchase_schema(),
        vec![
            column(rows, |r| r.id.as_deref()),
            column(rows, |r| r.day_cd.as_deref()),
            column(rows, |r| r.category.as_deref()),
            column(rows, |r| r.r#type.as_deref()),
            column(rows, |r| r.ind.as_deref()),
            column(rows, |r| r.purchase_amt.as_deref()),
        ],
    )
    .expect("purchase columns match the purchase schema")
}

/// `count` valid rows with ids `1..=count`, spread over a few days.
pub fn valid_rows(count: usize) -> Vec<PurchaseRow> {
    (1..=count as i64)
        .map(|id| PurchaseRow::valid(id, &format!("202401{:02}", id % 28 + 1)))
        .collect()
}

/// Registers `rows` in a fresh engine under `name`.
pub fn engine_with_rows(name: &str, rows: &[PurchaseRow]) -> Result<(DataFusionEngine, Dataset)> {
    let engine = DataFusionEngine::new()?;
    let dataset = engine.register_batch(name, purchase_batch(rows))?;
    Ok((engine, dataset))
}

/// Scenario: a clean batch with one incomplete row, one malformed id and one
/// exact duplicate.
pub fn rows_with_key_defects() -> Vec<PurchaseRow> {
    let mut rows = valid_rows(5);
    rows.push(PurchaseRow::valid(6, "20240101").with_id(None));
    rows.push(PurchaseRow::valid(7, "20240101").with_id(Some("seven")));
    rows.push(rows[0].clone());
    rows
}

/// Scenario: a clean batch where one row's indicator is two characters long.
pub fn rows_with_long_indicator() -> Vec<PurchaseRow> {
    let mut rows = valid_rows(4);
    rows[2] = rows[2].clone().with_ind(Some("YN"));
    rows
}

/// Scenario: a clean batch where one category exceeds 24 characters.
pub fn rows_with_long_category() -> Vec<PurchaseRow> {
    let mut rows = valid_rows(4);
    rows[1] = rows[1]
        .clone()
        .with_category(Some("household-and-garden-supplies"));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_shape() {
        let batch = purchase_batch(&valid_rows(3));
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), PURCHASE_COLUMNS.len());
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(rows_with_key_defects().len(), 8);
        assert_eq!(rows_with_long_indicator()[2].ind.as_deref(), Some("YN"));
        assert!(
            rows_with_long_category()[1]
                .category
                .as_ref()
                .map(|c| c.len())
                .unwrap_or(0)
                > 24
        );
    }
}
