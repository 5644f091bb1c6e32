//! Command-line interface for chunkport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and flag overrides
//! - The `version`, `config`, and `list` subcommands
//!
//! Running exports needs a source connection and is driven from `main`.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, LogLevel};
use crate::error::Result;
use crate::export::RunTimestamp;
use crate::export::chunk::{ChunkMetadata, table_prefix};
use crate::storage::{FsObjectStore, ObjectStore};

/// Chunked, resumable export of database tables into object storage
#[derive(Parser, Debug)]
#[command(
    name = "chunkport",
    version,
    about = "Chunked, resumable table export into object storage",
    long_about = "Exports a table as a sequence of CSV objects whose names record the
rows they hold. An interrupted run resumes from the objects already written."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Bucket directory, overriding `storage.root`
    #[arg(long, value_name = "DIR", global = true)]
    pub bucket: Option<PathBuf>,

    /// Quiet mode (errors only, no progress bar)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for chunkport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a registered table
    Run {
        /// Table to export
        #[arg(value_name = "TABLE")]
        table: String,

        /// Continue this run instead of starting a new one
        #[arg(long, value_name = "TS")]
        run_timestamp: Option<RunTimestamp>,

        /// Retries already spent on the run
        #[arg(long, value_name = "N", default_value_t = 0)]
        attempt: u32,

        /// Run a single attempt and print its outcome instead of retrying
        #[arg(long)]
        once: bool,
    },

    /// Show the chunks stored for a table
    List {
        /// Table to inspect
        #[arg(value_name = "TABLE")]
        table: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: AppConfig,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and apply argument overrides
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<AppConfig>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<AppConfig> {
        let mut config = AppConfig::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut AppConfig, args: &CliArgs) {
        if let Some(ref bucket) = args.bucket {
            config.storage.root = bucket.clone();
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Get the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Whether a progress bar should be drawn
    pub fn show_progress(&self) -> bool {
        !self.args.quiet && !self.args.no_progress && std::io::stderr().is_terminal()
    }

    /// Bucket configured for this invocation
    pub fn object_store(&self) -> FsObjectStore {
        FsObjectStore::new(self.config.storage.root.clone())
    }

    /// Handle subcommands that need no source connection
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub async fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::List { table } => {
                let store = self.object_store();
                for line in describe_inventory(&store, table).await? {
                    println!("{}", line);
                }
                Ok(true)
            }
            Commands::Run { .. } => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("chunkport version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return Ok(());
        }

        match AppConfig::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(exports) => println!(
                    "Configuration is valid ({} export(s) registered)",
                    exports.len()
                ),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .as_ref()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(AppConfig::default_config_path)
    }

    /// Path of the configuration file in use, if given explicitly
    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }
}

/// Describe the objects stored for `table`, grouped by run
///
/// Objects whose names do not decode are listed as such instead of failing,
/// so the listing can be used to find them.
pub async fn describe_inventory(store: &dyn ObjectStore, table: &str) -> Result<Vec<String>> {
    let objects = store.list(&table_prefix(table)).await?;
    if objects.is_empty() {
        return Ok(vec![format!("No objects stored for '{}'", table)]);
    }

    let mut runs: BTreeMap<RunTimestamp, Vec<(ChunkMetadata, u64)>> = BTreeMap::new();
    let mut malformed = Vec::new();
    for object in objects {
        match ChunkMetadata::decode(&object.name) {
            Ok(meta) if meta.table() == table => {
                runs.entry(meta.run()).or_default().push((meta, object.size));
            }
            Ok(_) => {}
            Err(e) => malformed.push(format!("  ! {}", e)),
        }
    }

    let mut lines = Vec::new();
    for (run, mut chunks) in runs {
        chunks.sort_by_key(|(meta, _)| meta.start());
        let rows: u64 = chunks.iter().map(|(meta, _)| meta.rows()).sum();
        let last = chunks.last().map(|(meta, _)| meta.end()).unwrap_or(0);
        lines.push(format!(
            "run {}: {} object(s), {} row(s), rows 1..={}",
            run,
            chunks.len(),
            rows,
            last
        ));
        for (meta, size) in chunks {
            lines.push(format!("  {} ({} bytes)", meta.encode(), size));
        }
    }
    if !malformed.is_empty() {
        lines.push(format!("{} malformed object name(s):", malformed.len()));
        lines.extend(malformed);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CSV_CONTENT_TYPE, MemoryObjectStore};

    #[test]
    fn test_run_args_parsing() {
        let args = CliArgs::try_parse_from([
            "chunkport",
            "run",
            "users",
            "--run-timestamp",
            "20240101T000000",
            "--attempt",
            "2",
        ])
        .unwrap();
        match args.command {
            Commands::Run {
                table,
                run_timestamp,
                attempt,
                once,
            } => {
                assert_eq!(table, "users");
                assert_eq!(run_timestamp.unwrap().to_string(), "20240101T000000");
                assert_eq!(attempt, 2);
                assert!(!once);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_run_timestamp_is_rejected() {
        let result =
            CliArgs::try_parse_from(["chunkport", "run", "users", "--run-timestamp", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from(["chunkport", "list", "users", "--quiet", "--vv"])
            .unwrap();
        assert!(args.quiet);
        assert!(args.very_verbose);
    }

    #[test]
    fn test_flags_override_config() {
        let args =
            CliArgs::try_parse_from(["chunkport", "--bucket", "/tmp/b", "-v", "version"]).unwrap();
        let mut config = AppConfig::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/b"));
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[tokio::test]
    async fn test_describe_inventory() {
        let store = MemoryObjectStore::new();
        for name in [
            "users/20240101T000000__11_20.csv",
            "users/20240101T000000__01_10.csv",
            "users/20240102T000000__1_5.csv",
            "users/garbage.csv",
            "users_archive/20240101T000000__1_1.csv",
        ] {
            store.upload(name, b"id", CSV_CONTENT_TYPE).await.unwrap();
        }

        let lines = describe_inventory(&store, "users").await.unwrap();
        assert_eq!(
            lines[0],
            "run 20240101T000000: 2 object(s), 20 row(s), rows 1..=20"
        );
        assert_eq!(lines[1], "  users/20240101T000000__01_10.csv (2 bytes)");
        assert_eq!(
            lines[3],
            "run 20240102T000000: 1 object(s), 5 row(s), rows 1..=5"
        );
        assert_eq!(lines[5], "1 malformed object name(s):");
        assert_eq!(lines.len(), 7);
    }

    #[tokio::test]
    async fn test_describe_empty_inventory() {
        let store = MemoryObjectStore::new();
        let lines = describe_inventory(&store, "users").await.unwrap();
        assert_eq!(lines, ["No objects stored for 'users'"]);
    }
}
