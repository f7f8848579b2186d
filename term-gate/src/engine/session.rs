//! DataFusion-backed [`DatasetEngine`].

use super::{AggregateRequest, ColumnStats, Dataset, DatasetEngine, Measure, Predicate};
use crate::config::EngineConfig;
use crate::error::{GateError, Result};
use crate::logging::{truncate_field, LogConfig};
use crate::security::SqlSecurity;
use crate::{log_data_op, perf_debug};
use arrow::array::{Array, Int64Array};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::common::TableReference;
use datafusion::datasource::MemTable;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::instrument;

/// Prefix of the views created by `select` and `deduplicate`.
const VIEW_PREFIX: &str = "gate_view";

/// Column used to rank duplicates during deduplication.
const ROW_RANK_COLUMN: &str = "__gate_row_rank";

/// A [`DatasetEngine`] running SQL on a DataFusion [`SessionContext`].
///
/// Every derived dataset is registered as a view, so handles stay cheap and
/// nothing is materialized until a count, aggregate or `collect` runs.
///
/// # Examples
///
/// ```rust,no_run
/// use term_gate::engine::{DataFusionEngine, DatasetEngine};
///
/// # async fn example() -> term_gate::error::Result<()> {
/// let engine = DataFusionEngine::new()?;
/// let purchases = engine.register_csv("purchases", "data/purchases.csv").await?;
/// let rows = engine.count(&purchases).await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub struct DataFusionEngine {
    ctx: SessionContext,
    config: EngineConfig,
    log_config: LogConfig,
    views: AtomicU64,
}

impl DataFusionEngine {
    /// Creates an engine with default configuration.
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with a tuned session and a bounded memory pool.
    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        let pool_size = (config.max_memory as f64 * config.memory_fraction) as usize;
        let memory_pool = Arc::new(FairSpillPool::new(pool_size)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        let ctx = SessionContext::new_with_config_rt(session_config, runtime_env);

        Ok(Self {
            ctx,
            config,
            log_config: LogConfig::default(),
            views: AtomicU64::new(0),
        })
    }

    /// Wraps an existing session, keeping its configuration.
    pub fn from_context(ctx: SessionContext) -> Self {
        Self {
            ctx,
            config: EngineConfig::default(),
            log_config: LogConfig::default(),
            views: AtomicU64::new(0),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Returns the underlying DataFusion session.
    pub fn inner(&self) -> &SessionContext {
        &self.ctx
    }

    /// Returns the configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers in-memory batches as a dataset.
    ///
    /// `schema` is required so that an empty dataset can be registered.
    pub fn register_batches(
        &self,
        name: &str,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Dataset> {
        SqlSecurity::validate_identifier(name)?;
        let table = MemTable::try_new(schema, vec![batches])?;
        self.ctx
            .register_table(TableReference::bare(name), Arc::new(table))?;
        log_data_op!(self.log_config, dataset = %name, "Registered in-memory dataset");
        Ok(Dataset::new(name))
    }

    /// Registers a single batch as a dataset.
    pub fn register_batch(&self, name: &str, batch: RecordBatch) -> Result<Dataset> {
        self.register_batches(name, batch.schema(), vec![batch])
    }

    /// Registers a CSV file (with header) as a dataset.
    pub async fn register_csv(&self, name: &str, path: &str) -> Result<Dataset> {
        SqlSecurity::validate_identifier(name)?;
        self.ctx
            .register_csv(TableReference::bare(name), path, CsvReadOptions::new())
            .await?;
        log_data_op!(self.log_config, dataset = %name, path = %path, "Registered CSV dataset");
        Ok(Dataset::new(name))
    }

    /// Registers a Parquet file as a dataset.
    pub async fn register_parquet(&self, name: &str, path: &str) -> Result<Dataset> {
        SqlSecurity::validate_identifier(name)?;
        self.ctx
            .register_parquet(TableReference::bare(name), path, ParquetReadOptions::default())
            .await?;
        log_data_op!(self.log_config, dataset = %name, path = %path, "Registered Parquet dataset");
        Ok(Dataset::new(name))
    }

    /// Returns a handle for a table already registered in the session.
    pub fn dataset(&self, name: &str) -> Result<Dataset> {
        SqlSecurity::validate_identifier(name)?;
        if !self.ctx.table_exist(TableReference::bare(name))? {
            return Err(GateError::engine(
                "dataset",
                format!("no dataset registered as '{name}'"),
            ));
        }
        Ok(Dataset::new(name))
    }

    /// Names of the derived datasets (`select`/`deduplicate` results) still
    /// registered, sorted.
    pub fn derived_datasets(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ctx
            .catalog_names()
            .into_iter()
            .filter_map(|catalog| self.ctx.catalog(&catalog))
            .flat_map(|catalog| {
                catalog
                    .schema_names()
                    .into_iter()
                    .filter_map(|schema| catalog.schema(&schema))
                    .flat_map(|schema| schema.table_names())
                    .collect::<Vec<_>>()
            })
            .filter(|name| name.starts_with(VIEW_PREFIX))
            .collect();
        names.sort();
        names
    }

    fn table_sql(dataset: &Dataset) -> Result<String> {
        SqlSecurity::escape_identifier(dataset.name())
    }

    fn next_view_name(&self) -> String {
        let n = self.views.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{VIEW_PREFIX}_{n}")
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        perf_debug!(
            self.log_config,
            sql = %truncate_field(sql, self.log_config.max_field_length),
            "Executing query"
        );
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    /// Registers the result of `sql` as a new view and returns its handle.
    async fn register_view(&self, sql: &str) -> Result<Dataset> {
        let name = self.next_view_name();
        let df = self.ctx.sql(sql).await?;
        self.ctx
            .register_table(TableReference::bare(name.as_str()), df.into_view())?;
        perf_debug!(
            self.log_config,
            view = %name,
            sql = %truncate_field(sql, self.log_config.max_field_length),
            "Registered view"
        );
        Ok(Dataset::new(name))
    }

    async fn column_names(&self, dataset: &Dataset) -> Result<Vec<String>> {
        let df = self.ctx.table(TableReference::bare(dataset.name())).await?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect())
    }

    async fn scalar_u64(&self, operation: &str, sql: &str) -> Result<u64> {
        let batches = self.run_query(sql).await?;
        let value = extract_i64(&batches, 0, operation)?.ok_or_else(|| {
            GateError::engine(operation, "query returned NULL instead of a count")
        })?;
        u64::try_from(value)
            .map_err(|_| GateError::engine(operation, format!("negative count {value}")))
    }
}

/// Reads column `index` of the first non-empty batch as an `i64`.
fn extract_i64(batches: &[RecordBatch], index: usize, operation: &str) -> Result<Option<i64>> {
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| GateError::engine(operation, "query returned no rows"))?;

    if index >= batch.num_columns() {
        return Err(GateError::engine(
            operation,
            format!("expected at least {} result columns", index + 1),
        ));
    }

    let column = arrow::compute::cast(batch.column(index), &DataType::Int64)?;
    let values = column
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| GateError::engine(operation, "failed to read integer result"))?;

    if values.is_null(0) {
        Ok(None)
    } else {
        Ok(Some(values.value(0)))
    }
}

#[async_trait]
impl DatasetEngine for DataFusionEngine {
    #[instrument(skip(self), fields(dataset = %dataset))]
    async fn count(&self, dataset: &Dataset) -> Result<u64> {
        let table = Self::table_sql(dataset)?;
        self.scalar_u64("count", &format!("SELECT COUNT(*) AS row_count FROM {table}"))
            .await
    }

    #[instrument(skip(self), fields(dataset = %dataset, columns = ?columns))]
    async fn distinct_count(&self, dataset: &Dataset, columns: &[String]) -> Result<u64> {
        let table = Self::table_sql(dataset)?;
        let projection = SqlSecurity::escape_identifier_list(columns)?;
        let sql = format!(
            "SELECT COUNT(*) AS distinct_count FROM (SELECT DISTINCT {projection} FROM {table}) AS keys"
        );
        self.scalar_u64("distinct_count", &sql).await
    }

    #[instrument(skip(self, predicate), fields(dataset = %dataset))]
    async fn select(&self, dataset: &Dataset, predicate: &Predicate) -> Result<Dataset> {
        let table = Self::table_sql(dataset)?;
        let condition = predicate.to_sql()?;
        self.register_view(&format!("SELECT * FROM {table} WHERE {condition}"))
            .await
    }

    #[instrument(skip(self, requests), fields(dataset = %dataset, columns = requests.len()))]
    async fn aggregate(
        &self,
        dataset: &Dataset,
        requests: &[AggregateRequest],
    ) -> Result<HashMap<String, ColumnStats>> {
        if requests.is_empty() {
            return Ok(HashMap::new());
        }

        let table = Self::table_sql(dataset)?;
        let mut parts = Vec::with_capacity(requests.len() * 2);
        for (i, request) in requests.iter().enumerate() {
            let measure = request
                .measure
                .sql(&SqlSecurity::escape_identifier(&request.column)?);
            parts.push(format!("MIN({measure}) AS stat_{i}_low"));
            parts.push(format!("MAX({measure}) AS stat_{i}_high"));
        }
        let sql = format!("SELECT {} FROM {table}", parts.join(", "));
        let batches = self.run_query(&sql).await?;

        let mut stats = HashMap::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            let low = extract_i64(&batches, 2 * i, "aggregate")?;
            let high = extract_i64(&batches, 2 * i + 1, "aggregate")?;
            let entry: &mut ColumnStats = stats.entry(request.column.clone()).or_default();
            match request.measure {
                Measure::IntegerValue => {
                    entry.min = low;
                    entry.max = high;
                }
                Measure::Length => {
                    entry.min_length = low;
                    entry.max_length = high;
                }
            }
        }
        Ok(stats)
    }

    #[instrument(skip(self), fields(dataset = %dataset, key = ?key_columns))]
    async fn deduplicate(&self, dataset: &Dataset, key_columns: &[String]) -> Result<Dataset> {
        let table = Self::table_sql(dataset)?;
        let keys = SqlSecurity::escape_identifier_list(key_columns)?;
        let columns = self
            .column_names(dataset)
            .await?
            .iter()
            .map(|c| SqlSecurity::quote_column_name(c))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "SELECT {columns} FROM (\
             SELECT {columns}, ROW_NUMBER() OVER (PARTITION BY {keys}) AS {ROW_RANK_COLUMN} \
             FROM {table}) AS ranked \
             WHERE {ROW_RANK_COLUMN} = 1"
        );
        self.register_view(&sql).await
    }

    #[instrument(skip(self), fields(dataset = %dataset))]
    async fn collect(&self, dataset: &Dataset) -> Result<Vec<RecordBatch>> {
        let table = Self::table_sql(dataset)?;
        self.run_query(&format!("SELECT * FROM {table}")).await
    }

    #[instrument(skip(self), fields(dataset = %dataset))]
    async fn release(&self, dataset: &Dataset) -> Result<()> {
        // Views hold resolved plans, so children outlive their parent's entry.
        let dropped = self
            .ctx
            .deregister_table(TableReference::bare(dataset.name()))?;
        perf_debug!(
            self.log_config,
            dataset = %dataset,
            released = dropped.is_some(),
            "Released dataset"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Coercion;
    use crate::rules::BoundCheck;
    use arrow::array::StringArray;
    use arrow::datatypes::{Field, Schema};

    fn engine_with(ids: Vec<Option<&str>>, codes: Vec<Option<&str>>) -> (DataFusionEngine, Dataset) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("day_cd", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(codes)),
            ],
        )
        .unwrap();
        let engine = DataFusionEngine::new().unwrap();
        let dataset = engine.register_batch("data", batch).unwrap();
        (engine, dataset)
    }

    #[tokio::test]
    async fn test_count_and_distinct() {
        let (engine, data) = engine_with(
            vec![Some("1"), Some("1"), Some("2")],
            vec![Some("20240101"), Some("20240101"), Some("20240102")],
        );
        assert_eq!(engine.count(&data).await.unwrap(), 3);
        let key = vec!["id".to_string(), "day_cd".to_string()];
        assert_eq!(engine.distinct_count(&data, &key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_select_does_not_touch_input() {
        let (engine, data) = engine_with(
            vec![Some("1"), Some("abc"), None],
            vec![Some("20240101"), Some("20240102"), Some("20240103")],
        );
        let predicate = Predicate::coercible(&["id".to_string()], Coercion::Integer);
        let valid = engine.select(&data, &predicate).await.unwrap();
        let invalid = engine.select(&data, &predicate.negate()).await.unwrap();

        assert_ne!(valid, data);
        assert_eq!(engine.count(&valid).await.unwrap(), 1);
        assert_eq!(engine.count(&invalid).await.unwrap(), 2);
        assert_eq!(engine.count(&data).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_aggregate_single_scan() {
        let (engine, data) = engine_with(
            vec![Some("5"), Some("-2"), Some("40")],
            vec![Some("20240101"), Some("2024010"), None],
        );
        let stats = engine
            .aggregate(
                &data,
                &[
                    AggregateRequest::new("id", Measure::IntegerValue),
                    AggregateRequest::new("day_cd", Measure::Length),
                ],
            )
            .await
            .unwrap();

        assert_eq!(stats["id"].min, Some(-2));
        assert_eq!(stats["id"].max, Some(40));
        assert_eq!(stats["day_cd"].min_length, Some(7));
        assert_eq!(stats["day_cd"].max_length, Some(8));
        assert_eq!(stats["day_cd"].min, None);
    }

    #[tokio::test]
    async fn test_aggregate_empty_dataset() {
        let (engine, data) = engine_with(vec![], vec![]);
        let stats = engine
            .aggregate(&data, &[AggregateRequest::new("id", Measure::IntegerValue)])
            .await
            .unwrap();
        assert!(stats["id"].is_undefined());
    }

    #[tokio::test]
    async fn test_deduplicate_keeps_one_per_key() {
        let (engine, data) = engine_with(
            vec![Some("1"), Some("1"), Some("1"), Some("2")],
            vec![Some("a"), Some("a"), Some("b"), Some("a")],
        );
        let key = vec!["id".to_string()];
        let deduped = engine.deduplicate(&data, &key).await.unwrap();
        assert_eq!(engine.count(&deduped).await.unwrap(), 2);
        assert_eq!(engine.distinct_count(&deduped, &key).await.unwrap(), 2);

        let batches = engine.collect(&deduped).await.unwrap();
        assert_eq!(batches[0].schema().fields().len(), 2);
    }

    #[tokio::test]
    async fn test_select_in_bounds_keeps_nulls() {
        let (engine, data) = engine_with(
            vec![Some("1"), Some("2"), Some("3")],
            vec![Some("20240101"), Some("2024"), None],
        );
        let kept = engine
            .select(&data, &Predicate::in_bounds("day_cd", BoundCheck::exact_length(8)))
            .await
            .unwrap();
        assert_eq!(engine.count(&kept).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let engine = DataFusionEngine::new().unwrap();
        assert!(engine.dataset("missing").is_err());
        assert!(engine.dataset("bad name").is_err());
    }

    #[tokio::test]
    async fn test_release_keeps_children_usable() {
        let (engine, data) = engine_with(
            vec![Some("1"), Some("1"), Some("x")],
            vec![Some("a"), Some("a"), Some("b")],
        );
        let predicate = Predicate::coercible(&["id".to_string()], Coercion::Integer);
        let valid = engine.select(&data, &predicate).await.unwrap();
        let deduped = engine
            .deduplicate(&valid, &["id".to_string()])
            .await
            .unwrap();
        assert_eq!(engine.derived_datasets().len(), 2);

        engine.release(&valid).await.unwrap();
        assert_eq!(engine.derived_datasets(), vec![deduped.name().to_string()]);
        assert!(engine.count(&valid).await.is_err());
        assert_eq!(engine.count(&deduped).await.unwrap(), 1);

        engine.release(&deduped).await.unwrap();
        engine.release(&deduped).await.unwrap();
        assert!(engine.derived_datasets().is_empty());
        assert_eq!(engine.count(&data).await.unwrap(), 3);
    }
}
