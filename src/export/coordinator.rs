//! Export coordinator for one attempt of a run
//!
//! This module brings together the row source, inventory reconciliation, and
//! the chunk writer. One call to [`ExportCoordinator::execute`] is one attempt:
//!
//! ```text
//! count rows -> (0 rows: done) -> reconcile -> (already covered: done)
//!            -> stream from the resume pointer, one object per chunk -> done
//! ```
//!
//! Errors are returned as-is; deciding whether to retry is the task layer's job.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::formatter::Row;
use crate::source::{MAX_BATCH_SIZE, QueryWindow, RowSource, StreamingQuery};
use crate::storage::ObjectStore;

use super::chunk::{ChunkMetadata, RunTimestamp, digit_width};
use super::options::ExportOptions;
use super::progress::ProgressTracker;
use super::reconciler::{ReconcileRequest, reconcile};
use super::writer::CsvChunkWriter;

/// Result of one export attempt
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportResult {
    /// Exported table
    pub table: String,
    /// Run the attempt belonged to
    pub run: Option<RunTimestamp>,
    /// Row count captured at the start of the attempt
    pub total_rows: u64,
    /// Rows already covered by earlier attempts
    pub resumed_from: u64,
    /// Rows uploaded by this attempt
    pub rows_exported: u64,
    /// Objects uploaded by this attempt, in order
    pub objects_written: Vec<String>,
    /// Objects re-padded to a new digit width
    pub objects_renamed: usize,
    /// Objects of other runs deleted
    pub foreign_deleted: usize,
    /// Body bytes uploaded
    pub bytes_written: u64,
    /// Time taken
    pub elapsed_ms: u64,
    /// Whether the attempt stopped early on cancellation
    pub cancelled: bool,
}

/// Coordinator for export attempts of one table
pub struct ExportCoordinator {
    /// Validated options of the table
    options: Arc<ExportOptions>,
    /// Source of rows
    source: Arc<dyn RowSource>,
    /// Destination bucket
    store: Arc<dyn ObjectStore>,
    /// Whether to draw a progress bar
    show_progress: bool,
    /// Cancellation token for aborting between chunks
    cancel_token: Option<CancellationToken>,
}

struct StreamState {
    writer: CsvChunkWriter,
    buffer: Vec<Row>,
    next_index: u64,
    remaining: u64,
    objects_written: Vec<String>,
    cancelled: bool,
}

/// Rows requested per source batch; also the initial chunk buffer capacity
///
/// Never more than the window holds, and never more than [`MAX_BATCH_SIZE`],
/// so a large chunk size does not reserve memory up front.
fn batch_size_for(chunk_size: u64, limit: u64) -> u32 {
    let rows = chunk_size.min(limit).clamp(1, u64::from(MAX_BATCH_SIZE));
    u32::try_from(rows).unwrap_or(MAX_BATCH_SIZE)
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        options: Arc<ExportOptions>,
        source: Arc<dyn RowSource>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            options,
            source,
            store,
            show_progress: false,
            cancel_token: None,
        }
    }

    /// Set cancellation token for this coordinator
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Execute one attempt of `run`
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Attempt statistics or the first error hit
    pub async fn execute(&self, run: RunTimestamp) -> Result<ExportResult> {
        let start_time = Instant::now();
        let table = self.options.table();
        let mut result = ExportResult {
            table: table.to_string(),
            run: Some(run),
            ..ExportResult::default()
        };

        info!("Starting export of '{}' (run {})", table, run);

        let total_rows = self.source.count(table).await?;
        result.total_rows = total_rows;
        if total_rows == 0 {
            info!("'{}' has no rows; nothing to export", table);
            result.elapsed_ms = start_time.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let width = digit_width(total_rows);
        let inventory = reconcile(
            self.store.as_ref(),
            &ReconcileRequest {
                table,
                run,
                total_rows,
                only_consider_current_run_objects: self.options.only_consider_current_run_objects(),
                delete_foreign_run_objects: self.options.delete_foreign_run_objects(),
            },
        )
        .await?;
        result.objects_renamed = inventory.renamed;
        result.foreign_deleted = inventory.foreign_deleted;

        let resume = inventory.resume_pointer.unwrap_or(0);
        result.resumed_from = resume.min(total_rows);
        if resume >= total_rows {
            info!(
                "Run {} of '{}' already covers all {} rows",
                run, table, total_rows
            );
            result.elapsed_ms = start_time.elapsed().as_millis() as u64;
            return Ok(result);
        }
        if resume > 0 {
            info!("Resuming run {} of '{}' after row {}", run, table, resume);
        }

        // The window is capped at the captured count so rows added mid-run are left out.
        let chunk_size = self.options.chunk_size();
        let window = QueryWindow {
            table: table.to_string(),
            fields: self.options.fields().to_vec(),
            order_by: self.options.order_by().to_vec(),
            offset: resume,
            limit: total_rows - resume,
            batch_size: batch_size_for(chunk_size, total_rows - resume),
        };
        let mut query = self.source.open(&window).await?;

        let tracker = ProgressTracker::new(total_rows, self.show_progress);
        tracker.resume_at(resume);

        let mut state = StreamState {
            writer: CsvChunkWriter::new(Arc::clone(&self.store), self.options.fields()),
            buffer: Vec::with_capacity(window.batch_size as usize),
            next_index: resume + 1,
            remaining: window.limit,
            objects_written: Vec::new(),
            cancelled: false,
        };

        let streamed = self
            .stream_chunks(query.as_mut(), &mut state, &tracker, run, width)
            .await;
        let closed = query.close().await;
        tracker.finish();
        streamed?;
        closed?;

        result.rows_exported = tracker.uploaded_this_attempt();
        result.bytes_written = state.writer.bytes_written();
        result.objects_written = state.objects_written;
        result.cancelled = state.cancelled;
        result.elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Export of '{}' {}: {} rows in {} object(s), {} bytes, {} ms",
            table,
            if result.cancelled { "cancelled" } else { "completed" },
            result.rows_exported,
            result.objects_written.len(),
            result.bytes_written,
            result.elapsed_ms
        );
        Ok(result)
    }

    /// Pull batches from the source and upload every full chunk, then the remainder
    async fn stream_chunks(
        &self,
        query: &mut dyn StreamingQuery,
        state: &mut StreamState,
        tracker: &ProgressTracker,
        run: RunTimestamp,
        width: usize,
    ) -> Result<()> {
        let chunk_size = self.options.chunk_size() as usize;
        let mut batch_count = 0u32;

        while state.remaining > 0 {
            if self.is_cancelled() {
                info!("Export of '{}' cancelled", self.options.table());
                state.cancelled = true;
                return Ok(());
            }

            debug!("Fetching batch #{}", batch_count + 1);
            let Some(rows) = query.next_batch().await? else {
                debug!("No more rows available");
                break;
            };
            batch_count += 1;

            for row in rows {
                if state.remaining == 0 {
                    break;
                }
                state.buffer.push(row);
                state.remaining -= 1;
                if state.buffer.len() == chunk_size {
                    self.flush(state, tracker, run, width).await?;
                }
            }
        }

        if !state.buffer.is_empty() {
            self.flush(state, tracker, run, width).await?;
        }
        Ok(())
    }

    /// Upload the buffered rows as the next chunk
    async fn flush(
        &self,
        state: &mut StreamState,
        tracker: &ProgressTracker,
        run: RunTimestamp,
        width: usize,
    ) -> Result<()> {
        let start = state.next_index;
        let end = start + state.buffer.len() as u64 - 1;
        let meta = ChunkMetadata::new(self.options.table(), run, start, end, width)?;

        let name = state.writer.write_chunk(&meta, &state.buffer).await?;
        info!("Uploaded {} ({} rows)", name, meta.rows());

        state.objects_written.push(name);
        state.buffer.clear();
        state.next_index = end + 1;
        tracker.update(end);
        Ok(())
    }
}
