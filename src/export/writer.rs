//! Chunk writer: renders a chunk of rows as CSV and uploads it
//!
//! The body is a header line of field names followed by one line per row,
//! joined with `\n` and without a trailing newline.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::formatter::{CsvValueConverter, Row, escape_csv_value, format_row};
use crate::storage::{CSV_CONTENT_TYPE, ObjectStore};

use super::chunk::ChunkMetadata;

/// Writer for CSV chunk objects
pub struct CsvChunkWriter {
    /// Destination bucket
    store: Arc<dyn ObjectStore>,
    /// Rendered header line
    header: String,
    /// Converter for field values
    converter: CsvValueConverter,
    /// Chunks uploaded by this writer
    chunks_written: u64,
    /// Body bytes uploaded by this writer
    bytes_written: u64,
}

impl CsvChunkWriter {
    /// Create a writer for the given field list
    pub fn new(store: Arc<dyn ObjectStore>, fields: &[String]) -> Self {
        let header = fields
            .iter()
            .map(|f| escape_csv_value(f))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            store,
            header,
            converter: CsvValueConverter::new(),
            chunks_written: 0,
            bytes_written: 0,
        }
    }

    /// Render the CSV body of a chunk
    pub fn render(&self, rows: &[Row]) -> String {
        let mut body = self.header.clone();
        for row in rows {
            body.push('\n');
            body.push_str(&format_row(&self.converter, row));
        }
        body
    }

    /// Render and upload one chunk under the name encoded from `meta`
    ///
    /// # Returns
    /// * `Result<String>` - The object name written
    pub async fn write_chunk(&mut self, meta: &ChunkMetadata, rows: &[Row]) -> Result<String> {
        let name = meta.encode();
        let body = self.render(rows);
        self.store
            .upload(&name, body.as_bytes(), CSV_CONTENT_TYPE)
            .await?;

        self.chunks_written += 1;
        self.bytes_written += body.len() as u64;
        debug!("Uploaded {} ({} rows, {} bytes)", name, rows.len(), body.len());
        Ok(name)
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::chunk::RunTimestamp;
    use crate::formatter::Value;
    use crate::storage::MemoryObjectStore;
    use chrono::{TimeZone, Utc};

    fn fields() -> Vec<String> {
        vec!["name".into(), "active".into(), "id".into()]
    }

    #[test]
    fn test_render_has_no_trailing_newline() {
        let writer = CsvChunkWriter::new(Arc::new(MemoryObjectStore::new()), &fields());
        let rows = vec![
            vec![Value::Text("Ada".into()), Value::Bool(true), Value::Int(1)],
            vec![Value::Text("Grace, H.".into()), Value::Bool(false), Value::Int(2)],
        ];
        assert_eq!(
            writer.render(&rows),
            "name,active,id\nAda,1,1\n\"Grace, H.\",0,2"
        );
    }

    #[tokio::test]
    async fn test_write_chunk_uploads_under_encoded_name() {
        let store = MemoryObjectStore::new();
        let mut writer = CsvChunkWriter::new(Arc::new(store.clone()), &fields());
        let run =
            RunTimestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let meta = ChunkMetadata::new("users", run, 1, 1, 2).unwrap();

        let rows = vec![vec![Value::Null, Value::Bool(true), Value::Int(1)]];
        let name = writer.write_chunk(&meta, &rows).await.unwrap();

        assert_eq!(name, "users/20240102T030405__01_01.csv");
        assert_eq!(
            store.text(&name).await.as_deref(),
            Some("name,active,id\n,1,1")
        );
        assert_eq!(writer.chunks_written(), 1);
        assert_eq!(writer.bytes_written(), 19);
    }
}
