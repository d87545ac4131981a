use crate::db::pool::DuckDbConnectionManager;
use crate::sql::{self, ValidatedSql};
use async_trait::async_trait;
use duckdb::types::ValueRef;
use r2d2::Pool;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

pub const MSG_NO_DATA: &str = "No data found for that question.";

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct EngineError(pub String);

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query engine error: {}", self.0)
    }
}

impl Error for EngineError {}

/// One cell of a result row, reduced to the shapes the formatter cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Scalar coercion rule: integers pass through, floats truncate, null
    /// becomes 0. Text must parse as an integer; anything else is an error
    /// rather than a made-up number.
    fn as_i64(&self) -> Result<i64, EngineError> {
        match self {
            CellValue::Null => Ok(0),
            CellValue::Bool(b) => Ok(i64::from(*b)),
            CellValue::Int(v) => Ok(*v),
            CellValue::Float(v) => Ok(*v as i64),
            CellValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| EngineError(format!("non-numeric scalar value: {}", s))),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Shaped query outcome. `shape` is the only constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Scalar(i64),
    Rows(Vec<(usize, String)>),
    Empty,
}

impl QueryResult {
    pub fn render(&self) -> String {
        match self {
            QueryResult::Scalar(n) => format_thousands(*n),
            QueryResult::Rows(lines) => lines
                .iter()
                .map(|(_, line)| line.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            QueryResult::Empty => MSG_NO_DATA.to_string(),
        }
    }
}

/// Turns a row set into a `QueryResult`:
/// - one row with one column becomes a scalar;
/// - otherwise each row becomes a line, `"{i}. {col2}"` for two-column rows,
///   the first column alone for anything else;
/// - no rows at all is `Empty`.
///
/// Fails only when a single-cell result holds text that is not an integer.
pub fn shape(rows: Vec<Vec<CellValue>>) -> Result<QueryResult, EngineError> {
    if rows.is_empty() {
        return Ok(QueryResult::Empty);
    }

    if rows.len() == 1 && rows[0].len() == 1 {
        return Ok(QueryResult::Scalar(rows[0][0].as_i64()?));
    }

    let lines = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let n = i + 1;
            let line = if row.len() == 2 {
                format!("{}. {}", n, row[1])
            } else {
                row.first().map(|c| c.to_string()).unwrap_or_default()
            };
            (n, line)
        })
        .collect();

    Ok(QueryResult::Rows(lines))
}

fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let body: String = grouped.chars().rev().collect();
    if n < 0 { format!("-{}", body) } else { body }
}

/// The relational store the pipeline runs validated SQL against.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn run(&self, sql: &str) -> Result<Vec<Vec<CellValue>>, EngineError>;
}

pub struct DuckDbEngine {
    pool: Pool<DuckDbConnectionManager>,
    timeout: Duration,
}

impl DuckDbEngine {
    pub fn new(pool: Pool<DuckDbConnectionManager>) -> Self {
        Self { pool, timeout: QUERY_TIMEOUT }
    }
}

#[async_trait]
impl QueryEngine for DuckDbEngine {
    async fn run(&self, sql: &str) -> Result<Vec<Vec<CellValue>>, EngineError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();

        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<CellValue>>, EngineError> {
            let conn = pool.get().map_err(|e| EngineError(e.to_string()))?;
            let mut stmt = conn.prepare(&sql).map_err(|e| EngineError(e.to_string()))?;
            let mut rows = stmt.query([]).map_err(|e| EngineError(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(|e| EngineError(e.to_string()))? {
                let column_count = row.as_ref().column_count();
                let mut cells = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    cells.push(read_cell(row, idx));
                }
                out.push(cells);
            }
            Ok(out)
        });

        match time::timeout(self.timeout, task).await {
            // DuckDB has no cancellation hook here: a timed-out query keeps
            // running on the blocking thread and holds its pooled connection
            // until it finishes. Repeated timeouts can drain the pool.
            Err(_) => Err(EngineError("query timed out".to_string())),
            Ok(Err(join_err)) => Err(EngineError(join_err.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

fn read_cell(row: &duckdb::Row<'_>, idx: usize) -> CellValue {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => CellValue::Null,
        Ok(ValueRef::Boolean(b)) => CellValue::Bool(b),
        Ok(ValueRef::TinyInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::SmallInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::Int(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::BigInt(v)) => CellValue::Int(v),
        Ok(ValueRef::HugeInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::UTinyInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::USmallInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::UInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::UBigInt(v)) => CellValue::Int(v as i64),
        Ok(ValueRef::Float(v)) => CellValue::Float(v as f64),
        Ok(ValueRef::Double(v)) => CellValue::Float(v),
        Ok(ValueRef::Text(bytes)) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        // Timestamps, decimals and other exotics: fall back to a string read.
        Ok(_) => match row.get::<_, String>(idx) {
            Ok(s) => CellValue::Text(s),
            Err(_) => CellValue::Null,
        },
        Err(_) => CellValue::Null,
    }
}

/// Submits validated SQL to the engine and shapes the row set.
pub struct QueryExecutor {
    engine: Arc<dyn QueryEngine>,
}

impl QueryExecutor {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    pub async fn execute(&self, sql: &ValidatedSql) -> Result<QueryResult, EngineError> {
        // Fence markers should already be gone; strip again in case the
        // model nested them inside the statement.
        let cleaned = sql::strip_fences(sql.as_str());
        let rows = self.engine.run(&cleaned).await?;
        shape(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::pool;
    use crate::sql::{validate, CandidateSql};

    fn memory_engine() -> (DuckDbEngine, Pool<DuckDbConnectionManager>) {
        let config = DatabaseConfig { path: ":memory:".to_string(), pool_size: 1 };
        let pool = pool::build(&config).unwrap();
        (DuckDbEngine::new(pool.clone()), pool)
    }

    #[test]
    fn empty_row_set_shapes_to_empty() {
        assert_eq!(shape(Vec::new()).unwrap(), QueryResult::Empty);
        assert_eq!(shape(Vec::new()).unwrap().render(), MSG_NO_DATA);
    }

    #[test]
    fn single_cell_shapes_to_scalar() {
        let result = shape(vec![vec![CellValue::Int(42)]]).unwrap();
        assert_eq!(result, QueryResult::Scalar(42));
        assert_eq!(result.render(), "42");
    }

    #[test]
    fn null_scalar_coerces_to_zero() {
        assert_eq!(shape(vec![vec![CellValue::Null]]).unwrap(), QueryResult::Scalar(0));
    }

    #[test]
    fn numeric_text_scalar_is_parsed() {
        assert_eq!(
            shape(vec![vec![CellValue::Text("17".into())]]).unwrap(),
            QueryResult::Scalar(17)
        );
    }

    #[test]
    fn non_numeric_text_scalar_is_an_error() {
        // A 1x1 result carrying e.g. a UUID must not be coerced to a number.
        let err = shape(vec![vec![CellValue::Text(
            "11111111-1111-1111-1111-111111111111".into(),
        )]])
        .unwrap_err();
        assert!(err.0.contains("non-numeric scalar"));
    }

    #[test]
    fn non_numeric_text_in_a_multi_row_result_is_fine() {
        // The coercion rule applies to scalars only; labels stay text.
        let result = shape(vec![
            vec![CellValue::Text("alice".into()), CellValue::Int(3)],
            vec![CellValue::Text("bob".into()), CellValue::Int(2)],
        ])
        .unwrap();
        assert_eq!(result.render(), "1. 3\n2. 2");
    }

    #[test]
    fn two_column_rows_keep_only_the_second_column() {
        let result = shape(vec![
            vec![CellValue::Text("a".into()), CellValue::Int(100)],
            vec![CellValue::Text("b".into()), CellValue::Int(90)],
        ])
        .unwrap();
        assert_eq!(result.render(), "1. 100\n2. 90");
    }

    #[test]
    fn wide_rows_fall_back_to_the_first_column() {
        let result = shape(vec![
            vec![CellValue::Text("a".into()), CellValue::Int(1), CellValue::Int(2)],
            vec![CellValue::Text("b".into()), CellValue::Int(3), CellValue::Int(4)],
        ])
        .unwrap();
        assert_eq!(result.render(), "a\nb");
    }

    #[test]
    fn single_row_with_two_columns_is_not_a_scalar() {
        let result = shape(vec![vec![CellValue::Text("a".into()), CellValue::Int(5)]]).unwrap();
        assert_eq!(result.render(), "1. 5");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(-42000), "-42,000");
    }

    #[tokio::test]
    async fn engine_runs_a_scalar_select() {
        let (engine, _pool) = memory_engine();
        let rows = engine.run("SELECT 41 + 1").await.unwrap();
        assert_eq!(shape(rows).unwrap(), QueryResult::Scalar(42));
    }

    #[tokio::test]
    async fn engine_reports_failures_as_engine_errors() {
        let (engine, _pool) = memory_engine();
        let err = engine.run("SELECT * FROM missing_table").await.unwrap_err();
        assert!(err.0.contains("missing_table"));
    }

    #[tokio::test]
    async fn executor_strips_residual_fences() {
        let (engine, _pool) = memory_engine();
        let executor = QueryExecutor::new(Arc::new(engine));
        // A trailing fence survives validation (statement still starts with
        // SELECT); the executor must drop it before the engine sees it.
        let sql = validate(CandidateSql::new("SELECT 7\n```")).unwrap();
        let result = executor.execute(&sql).await.unwrap();
        assert_eq!(result, QueryResult::Scalar(7));
    }
}
