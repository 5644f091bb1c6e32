//! Process-wide registry of export tasks
//!
//! Every table is registered exactly once, with options validated at
//! registration time. Tasks share the registry's source, store, clock, and
//! cancellation token.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Result, TaskError};
use crate::export::{ExportConfig, ExportCoordinator, ExportOptions};
use crate::source::RowSource;
use crate::storage::ObjectStore;

use super::{Clock, ExportTask, SystemClock, TaskArgs, TaskOutcome};

/// Registry mapping table names to export tasks
pub struct ExportRegistry {
    source: Arc<dyn RowSource>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    cancel_token: Option<CancellationToken>,
    show_progress: bool,
    tasks: BTreeMap<String, Arc<ExportTask>>,
}

impl ExportRegistry {
    /// Create an empty registry over a source and a bucket
    pub fn new(source: Arc<dyn RowSource>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            source,
            store,
            clock: Arc::new(SystemClock),
            cancel_token: None,
            show_progress: false,
            tasks: BTreeMap::new(),
        }
    }

    /// Use a different clock for minting run timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cancel tasks registered from now on through `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Draw progress bars for tasks registered from now on
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Register validated options
    ///
    /// # Errors
    /// `DuplicateTableRegistration` if the table is already registered.
    pub fn register(&mut self, options: ExportOptions) -> Result<()> {
        let table = options.table().to_string();
        if self.tasks.contains_key(&table) {
            return Err(TaskError::DuplicateTableRegistration(table).into());
        }

        let mut coordinator = ExportCoordinator::new(
            Arc::new(options),
            Arc::clone(&self.source),
            Arc::clone(&self.store),
        )
        .with_progress(self.show_progress);
        if let Some(ref token) = self.cancel_token {
            coordinator = coordinator.with_cancellation(token.clone());
        }

        info!("Registered export of '{}'", table);
        self.tasks.insert(
            table,
            Arc::new(ExportTask::new(coordinator, Arc::clone(&self.clock))),
        );
        Ok(())
    }

    /// Validate and register raw configurations, stopping at the first error
    pub fn register_all(&mut self, configs: impl IntoIterator<Item = ExportConfig>) -> Result<()> {
        for config in configs {
            self.register(ExportOptions::validate(config)?)?;
        }
        Ok(())
    }

    /// Task registered for `table`
    pub fn get(&self, table: &str) -> Option<Arc<ExportTask>> {
        self.tasks.get(table).cloned()
    }

    /// Registered table names, sorted
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Run one attempt of the task named by `args.table`
    pub async fn dispatch(&self, args: TaskArgs) -> TaskOutcome {
        match self.get(&args.table) {
            Some(task) => task.run(args).await,
            None => TaskOutcome::Failed(TaskError::UnknownTable(args.table).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ExportError};
    use crate::export::WriteMode;
    use crate::source::MemorySource;
    use crate::storage::MemoryObjectStore;

    fn registry() -> ExportRegistry {
        ExportRegistry::new(
            Arc::new(MemorySource::new()),
            Arc::new(MemoryObjectStore::new()),
        )
    }

    fn config(table: &str) -> ExportConfig {
        ExportConfig::new(table, WriteMode::Append, vec!["name".into()])
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = registry();
        registry.register_all([config("users"), config("orders")]).unwrap();
        let err = registry.register_all([config("users")]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Task(TaskError::DuplicateTableRegistration(ref t)) if t == "users"
        ));
        assert_eq!(registry.tables().collect::<Vec<_>>(), ["orders", "users"]);
    }

    #[test]
    fn test_invalid_config_is_rejected_at_registration() {
        let mut registry = registry();
        let mut bad = config("users");
        bad.chunk_size = 15;
        let err = registry.register_all([bad]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Config(ConfigError::ChunkSizeNotMultipleOfTen(15))
        ));
        assert!(registry.get("users").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_table() {
        let registry = registry();
        match registry.dispatch(TaskArgs::new("ghosts")).await {
            TaskOutcome::Failed(ExportError::Task(TaskError::UnknownTable(t))) => {
                assert_eq!(t, "ghosts")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
