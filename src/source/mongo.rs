//! MongoDB row source
//!
//! Each table maps to a collection of the configured database. Windows are
//! read with `find` + sort/skip/limit, projected to the exported fields and
//! streamed from the driver cursor in batches.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::{Client, Cursor};
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::formatter::{Row, Value};

use super::{MAX_BATCH_SIZE, QueryWindow, RowSource, StreamingQuery};

/// Row source reading collections of one MongoDB database
#[derive(Clone)]
pub struct MongoSource {
    client: Client,
    database: String,
    filter: Document,
}

impl MongoSource {
    /// Connect to a deployment and read from `database`
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `database` - Database holding the exported collections
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        info!("Connected row source to database '{}'", database);
        Ok(Self::new(client, database))
    }

    /// Wrap an existing client
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
            filter: Document::new(),
        }
    }

    /// Restrict every table to documents matching `filter`
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = filter;
        self
    }

    fn collection(&self, table: &str) -> mongodb::Collection<Document> {
        self.client.database(&self.database).collection(table)
    }
}

/// Ascending sort document over the given fields
///
/// `_id` is appended as a last key so that documents sharing (or lacking) the
/// ordering fields still come back in the same order for every skip.
fn sort_document(order_by: &[String]) -> Document {
    let mut sort: Document = order_by
        .iter()
        .map(|f| (f.clone(), Bson::Int32(1)))
        .collect();
    if !sort.contains_key("_id") {
        sort.insert("_id", 1);
    }
    sort
}

/// Projection document including exactly the given fields
fn projection_document(fields: &[String]) -> Document {
    let mut projection: Document = fields
        .iter()
        .map(|f| (f.clone(), Bson::Int32(1)))
        .collect();
    if !fields.iter().any(|f| f == "_id") {
        projection.insert("_id", 0);
    }
    projection
}

/// Pick the projected fields out of a document, in order
fn document_to_row(doc: &Document, fields: &[String]) -> Row {
    fields
        .iter()
        .map(|f| doc.get(f).map(Value::from).unwrap_or(Value::Null))
        .collect()
}

#[async_trait]
impl RowSource for MongoSource {
    async fn count(&self, table: &str) -> Result<u64> {
        self.collection(table)
            .count_documents(self.filter.clone())
            .await
            .map_err(|e| SourceError::CountFailed(e.to_string()).into())
    }

    async fn open(&self, window: &QueryWindow) -> Result<Box<dyn StreamingQuery>> {
        // A zero limit means "no limit" to the server.
        if window.limit == 0 {
            return Ok(Box::new(CursorStreamingQuery::exhausted(window)));
        }
        let limit = i64::try_from(window.limit).map_err(|_| {
            SourceError::QueryFailed(format!("window limit {} is too large", window.limit))
        })?;

        let cursor = self
            .collection(&window.table)
            .find(self.filter.clone())
            .sort(sort_document(&window.order_by))
            .projection(projection_document(&window.fields))
            .skip(window.offset)
            .limit(limit)
            .batch_size(window.batch_size)
            .await?;

        debug!(
            "Opened cursor on '{}' at offset {} (limit {})",
            window.table, window.offset, window.limit
        );
        Ok(Box::new(CursorStreamingQuery::new(cursor, window)))
    }
}

/// Cursor-based streaming query producing projected rows
pub struct CursorStreamingQuery {
    cursor: Option<Cursor<Document>>,
    fields: Vec<String>,
    batch_size: u32,
    total_fetched: u64,
    table: String,
    closed: bool,
}

impl CursorStreamingQuery {
    fn new(cursor: Cursor<Document>, window: &QueryWindow) -> Self {
        Self {
            cursor: Some(cursor),
            fields: window.fields.clone(),
            batch_size: window.batch_size.clamp(1, MAX_BATCH_SIZE),
            total_fetched: 0,
            table: window.table.clone(),
            closed: false,
        }
    }

    fn exhausted(window: &QueryWindow) -> Self {
        Self {
            cursor: None,
            fields: window.fields.clone(),
            batch_size: window.batch_size.max(1),
            total_fetched: 0,
            table: window.table.clone(),
            closed: true,
        }
    }
}

#[async_trait]
impl StreamingQuery for CursorStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.closed {
            return Ok(None);
        }

        let cursor = match self.cursor.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };

        let mut batch = Vec::new();

        for _ in 0..self.batch_size {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(document_to_row(&doc, &self.fields)),
                Ok(None) => break,
                Err(e) => {
                    // On error, close cursor to release resources
                    self.cursor = None;
                    self.closed = true;
                    return Err(SourceError::QueryFailed(e.to_string()).into());
                }
            }
        }

        if batch.is_empty() {
            debug!(
                "Cursor on '{}' exhausted after {} rows",
                self.table, self.total_fetched
            );
            self.cursor = None;
            self.closed = true;
            Ok(None)
        } else {
            self.total_fetched += batch.len() as u64;
            debug!(
                "Fetched batch of {} rows (total: {})",
                batch.len(),
                self.total_fetched
            );
            Ok(Some(batch))
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            // Explicitly drop cursor to release server resources
            self.cursor = None;
            self.closed = true;
            info!(
                "Closed cursor on '{}' after fetching {} rows",
                self.table, self.total_fetched
            );
        }
        Ok(())
    }
}

impl Drop for CursorStreamingQuery {
    fn drop(&mut self) {
        if !self.closed {
            debug!("CursorStreamingQuery dropped without explicit close");
            self.cursor = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_document_to_row_follows_field_order() {
        let doc = doc! { "active": true, "name": "Ada", "id": 7 };
        let row = document_to_row(&doc, &fields(&["name", "active", "email", "id"]));
        assert_eq!(
            row,
            vec![
                Value::Text("Ada".into()),
                Value::Bool(true),
                Value::Null,
                Value::Int(7),
            ]
        );
    }

    #[test]
    fn test_sort_document_is_ascending_in_order() {
        let sort = sort_document(&fields(&["created_at", "id"]));
        let keys: Vec<&String> = sort.keys().collect();
        assert_eq!(keys, ["created_at", "id", "_id"]);
        assert_eq!(sort.get_i32("id").unwrap(), 1);
        assert_eq!(sort.get_i32("_id").unwrap(), 1);
    }

    #[test]
    fn test_sort_document_keeps_listed_object_id() {
        let sort = sort_document(&fields(&["_id", "created_at"]));
        let keys: Vec<&String> = sort.keys().collect();
        assert_eq!(keys, ["_id", "created_at"]);
    }

    #[test]
    fn test_projection_hides_object_id_unless_requested() {
        let projection = projection_document(&fields(&["name", "id"]));
        assert_eq!(projection.get_i32("_id").unwrap(), 0);

        let projection = projection_document(&fields(&["name", "_id"]));
        assert_eq!(projection.get_i32("_id").unwrap(), 1);
    }
}
