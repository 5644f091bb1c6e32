//! In-memory row source
//!
//! Tables are held as column names plus rows in their natural order; that
//! order is what the export sees, `order_by` is not re-applied. Rows can be
//! appended while an export is in flight to model a growing table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::formatter::{Row, Value};

use super::{QueryWindow, RowSource, StreamingQuery};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Row source backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table
    pub async fn create_table(&self, table: &str, columns: &[&str], rows: Vec<Row>) {
        let table_data = MemoryTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        };
        self.tables
            .write()
            .await
            .insert(table.to_string(), table_data);
    }

    /// Append rows to an existing table
    pub async fn append_rows(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let data = tables
            .get_mut(table)
            .ok_or_else(|| SourceError::QueryFailed(format!("unknown table '{table}'")))?;
        data.rows.extend(rows);
        Ok(())
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn count(&self, table: &str) -> Result<u64> {
        let tables = self.tables.read().await;
        let data = tables
            .get(table)
            .ok_or_else(|| SourceError::CountFailed(format!("unknown table '{table}'")))?;
        Ok(data.rows.len() as u64)
    }

    async fn open(&self, window: &QueryWindow) -> Result<Box<dyn StreamingQuery>> {
        let tables = self.tables.read().await;
        let data = tables.get(&window.table).ok_or_else(|| {
            SourceError::QueryFailed(format!("unknown table '{}'", window.table))
        })?;

        let projection: Vec<Option<usize>> = window
            .fields
            .iter()
            .map(|f| data.columns.iter().position(|c| c == f))
            .collect();

        let rows: Vec<Row> = data
            .rows
            .iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|row| {
                projection
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        debug!(
            "Opened memory query on '{}': {} row(s) from offset {}",
            window.table,
            rows.len(),
            window.offset
        );

        Ok(Box::new(MemoryStreamingQuery {
            rows: rows.into_iter(),
            batch_size: window.batch_size.max(1) as usize,
        }))
    }
}

struct MemoryStreamingQuery {
    rows: std::vec::IntoIter<Row>,
    batch_size: usize,
}

#[async_trait]
impl StreamingQuery for MemoryStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        let batch: Vec<Row> = self.rows.by_ref().take(self.batch_size).collect();
        Ok((!batch.is_empty()).then_some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(offset: u64, limit: u64) -> QueryWindow {
        QueryWindow {
            table: "users".into(),
            fields: vec!["name".into(), "missing".into(), "id".into()],
            order_by: vec!["id".into()],
            offset,
            limit,
            batch_size: 2,
        }
    }

    async fn source() -> MemorySource {
        let source = MemorySource::new();
        let rows = (1..=5)
            .map(|i| vec![Value::Int(i), Value::Text(format!("user{i}"))])
            .collect();
        source.create_table("users", &["id", "name"], rows).await;
        source
    }

    #[tokio::test]
    async fn test_count_and_window() {
        let source = source().await;
        assert_eq!(source.count("users").await.unwrap(), 5);

        let mut query = source.open(&window(1, 3)).await.unwrap();
        let first = query.next_batch().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(
            first[0],
            vec![Value::Text("user2".into()), Value::Null, Value::Int(2)]
        );
        let second = query.next_batch().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(query.next_batch().await.unwrap().is_none());
        query.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_append_rows_grows_count() {
        let source = source().await;
        source
            .append_rows("users", vec![vec![Value::Int(6), Value::Text("late".into())]])
            .await
            .unwrap();
        assert_eq!(source.count("users").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let source = MemorySource::new();
        assert!(source.count("ghosts").await.is_err());
    }
}
