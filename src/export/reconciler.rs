//! Blob inventory reconciliation
//!
//! Before an attempt writes anything it inspects what is already in the
//! bucket for its table:
//! 1. list candidates (current run only in append mode, whole table otherwise)
//! 2. decode every name; a name that does not decode aborts the attempt
//! 3. re-pad current-run objects whose digit width is stale (copy, then delete)
//! 4. delete other runs' objects when the write mode asks for it
//! 5. report the highest row index already written by the current run

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::ObjectStore;

use super::chunk::{ChunkMetadata, RunTimestamp, digit_width, run_prefix, table_prefix};

/// Inputs of one reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconcileRequest<'a> {
    pub table: &'a str,
    pub run: RunTimestamp,
    /// Row count captured at the start of the attempt
    pub total_rows: u64,
    pub only_consider_current_run_objects: bool,
    pub delete_foreign_run_objects: bool,
}

/// What a reconciliation pass found and changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Highest `end` index among current-run objects
    pub resume_pointer: Option<u64>,
    /// Current-run objects found
    pub current_run_objects: usize,
    /// Current-run objects re-uploaded under a new digit width
    pub renamed: usize,
    /// Foreign-run objects deleted
    pub foreign_deleted: usize,
    /// Foreign-run objects left in place
    pub foreign_kept: usize,
}

/// Reconcile the stored inventory of a table with the current run
pub async fn reconcile(
    store: &dyn ObjectStore,
    request: &ReconcileRequest<'_>,
) -> Result<ReconcileReport> {
    let prefix = if request.only_consider_current_run_objects {
        run_prefix(request.table, &request.run)
    } else {
        table_prefix(request.table)
    };

    // Decode everything before touching anything.
    let mut current = Vec::new();
    let mut foreign = Vec::new();
    for object in store.list(&prefix).await? {
        let meta = ChunkMetadata::decode(&object.name)?;
        if meta.table() != request.table {
            debug!("Skipping {} (belongs to table '{}')", object.name, meta.table());
            continue;
        }
        if meta.run() == request.run {
            current.push(meta);
        } else {
            foreign.push(meta);
        }
    }

    let mut report = ReconcileReport {
        current_run_objects: current.len(),
        ..ReconcileReport::default()
    };

    let width = digit_width(request.total_rows);
    let shrunk = current.iter().any(|m| m.end() > request.total_rows);
    if shrunk {
        // Nothing new will be written this attempt, so widths are left as they are.
        warn!(
            "Run {} of '{}' already covers more than the current {} rows",
            request.run, request.table, request.total_rows
        );
    } else {
        for meta in current.iter_mut() {
            if meta.digit_width() == width {
                continue;
            }
            let renamed = meta.with_digit_width(width)?;
            let (old_name, new_name) = (meta.encode(), renamed.encode());
            store.copy(&old_name, &new_name).await?;
            store.delete(&old_name).await?;
            info!("Re-padded {} -> {}", old_name, new_name);
            *meta = renamed;
            report.renamed += 1;
        }
    }

    for meta in &foreign {
        if request.delete_foreign_run_objects {
            store.delete(&meta.encode()).await?;
            report.foreign_deleted += 1;
        } else {
            report.foreign_kept += 1;
        }
    }
    if report.foreign_deleted > 0 {
        info!(
            "Deleted {} object(s) of previous runs of '{}'",
            report.foreign_deleted, request.table
        );
    }

    report.resume_pointer = current.iter().map(ChunkMetadata::end).max();
    debug!(
        "Reconciled '{}' run {}: {:?}",
        request.table, request.run, report
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExportError, NameError};
    use crate::storage::{CSV_CONTENT_TYPE, MemoryObjectStore, StoreOp};
    use chrono::{TimeZone, Utc};

    fn run(minute: u32) -> RunTimestamp {
        RunTimestamp::from_datetime(Utc.with_ymd_and_hms(2024, 5, 1, 8, minute, 0).unwrap())
    }

    fn request(run: RunTimestamp, total_rows: u64, overwrite: bool) -> ReconcileRequest<'static> {
        ReconcileRequest {
            table: "users",
            run,
            total_rows,
            only_consider_current_run_objects: !overwrite,
            delete_foreign_run_objects: overwrite,
        }
    }

    async fn put(store: &MemoryObjectStore, run: RunTimestamp, start: u64, end: u64, width: usize) -> String {
        let name = ChunkMetadata::new("users", run, start, end, width)
            .unwrap()
            .encode();
        store
            .upload(&name, format!("id\n{start}").as_bytes(), CSV_CONTENT_TYPE)
            .await
            .unwrap();
        name
    }

    #[tokio::test]
    async fn test_empty_inventory_has_no_resume_pointer() {
        let store = MemoryObjectStore::new();
        let report = reconcile(&store, &request(run(0), 5, true)).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_resume_pointer_is_highest_end() {
        let store = MemoryObjectStore::new();
        put(&store, run(0), 1, 10, 2).await;
        put(&store, run(0), 11, 20, 2).await;
        let report = reconcile(&store, &request(run(0), 25, false)).await.unwrap();
        assert_eq!(report.resume_pointer, Some(20));
        assert_eq!(report.current_run_objects, 2);
        assert_eq!(report.renamed, 0);
    }

    #[tokio::test]
    async fn test_width_change_copies_before_deleting() {
        let store = MemoryObjectStore::new();
        let old_a = put(&store, run(0), 1, 5, 1).await;
        let old_b = put(&store, run(0), 6, 9, 1).await;
        store.clear_ops().await;

        let report = reconcile(&store, &request(run(0), 11, false)).await.unwrap();
        assert_eq!(report.renamed, 2);
        assert_eq!(report.resume_pointer, Some(9));

        let new_a = "users/20240501T080000__01_05.csv".to_string();
        let new_b = "users/20240501T080000__06_09.csv".to_string();
        assert_eq!(
            store.ops().await,
            vec![
                StoreOp::Upload(new_a.clone()),
                StoreOp::Delete(old_a),
                StoreOp::Upload(new_b.clone()),
                StoreOp::Delete(old_b),
            ]
        );
        assert_eq!(store.names().await, vec![new_a.clone(), new_b]);
        assert_eq!(store.text(&new_a).await.as_deref(), Some("id\n1"));
    }

    #[tokio::test]
    async fn test_overwrite_deletes_foreign_runs() {
        let store = MemoryObjectStore::new();
        put(&store, run(0), 1, 3, 1).await;
        let current = put(&store, run(5), 1, 2, 1).await;

        let report = reconcile(&store, &request(run(5), 3, true)).await.unwrap();
        assert_eq!(report.foreign_deleted, 1);
        assert_eq!(report.resume_pointer, Some(2));
        assert_eq!(store.names().await, vec![current]);
    }

    #[tokio::test]
    async fn test_append_never_sees_foreign_runs() {
        let store = MemoryObjectStore::new();
        let foreign = put(&store, run(0), 1, 3, 1).await;

        let report = reconcile(&store, &request(run(5), 3, false)).await.unwrap();
        assert_eq!(report.foreign_kept, 0);
        assert_eq!(report.resume_pointer, None);
        assert_eq!(store.names().await, vec![foreign]);
    }

    #[tokio::test]
    async fn test_malformed_name_aborts_without_changes() {
        let store = MemoryObjectStore::new();
        put(&store, run(0), 1, 3, 1).await;
        store
            .upload("users/notes.txt", b"", CSV_CONTENT_TYPE)
            .await
            .unwrap();
        store.clear_ops().await;

        let err = reconcile(&store, &request(run(5), 3, true)).await.unwrap_err();
        assert!(matches!(
            err,
            ExportError::Name(NameError::MalformedName { .. })
        ));
        assert!(store.ops().await.is_empty());
    }

    #[tokio::test]
    async fn test_shrunk_table_leaves_widths_alone() {
        let store = MemoryObjectStore::new();
        let name = put(&store, run(0), 1, 10, 2).await;
        store.clear_ops().await;

        let report = reconcile(&store, &request(run(0), 9, false)).await.unwrap();
        assert_eq!(report.resume_pointer, Some(10));
        assert_eq!(report.renamed, 0);
        assert_eq!(store.names().await, vec![name]);
    }
}
