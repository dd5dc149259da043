use clap::Parser;
use thiserror::Error;

use crate::storage::MAX_BATCH_SIZE;
use crate::utils::logging::LogFormat;

pub const SRC_STORAGE_KEY: &str = "SRC_STORAGE_KEY";
pub const DST_STORAGE_KEY: &str = "DST_STORAGE_KEY";
pub const DEFAULT_TABLE: &str = "ProcessedPhotos";

/// Migrate Azure Table Storage between accounts
#[derive(Debug, Clone, Parser)]
#[command(name = "table-migrate", version, about)]
pub struct CliArgs {
    /// Source storage account name
    #[arg(long)]
    pub src_account: String,

    /// Destination storage account name
    #[arg(long)]
    pub dst_account: String,

    /// Table name to migrate
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Batch size (max 100)
    #[arg(long, default_value_t = MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Exit with status 1 when any entity failed to migrate
    #[arg(long, env = "MIGRATE_FAIL_ON_ERRORS")]
    pub fail_on_errors: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingKey(&'static str),

    #[error("--batch-size must be at least 1")]
    InvalidBatchSize,
}

/// Storage Account Key, wird nie geloggt
#[derive(Clone, PartialEq, Eq)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StorageKey(<redacted>)")
    }
}

/// Hauptkonfiguration für einen Migrationslauf
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub src_account: String,
    pub src_key: StorageKey,
    pub dst_account: String,
    pub dst_key: StorageKey,
    pub table: String,
    pub batch_size: usize,
    pub fail_on_errors: bool,
}

impl MigrationConfig {
    /// Lade Config aus CLI Argumenten und Environment Variablen
    pub fn from_env(args: CliArgs) -> Result<Self, ConfigError> {
        Self::from_args(args, |name| std::env::var(name).ok())
    }

    /// Like `from_env`, with an explicit variable lookup
    pub fn from_args(
        args: CliArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let src_key = required_key(&lookup, SRC_STORAGE_KEY)?;
        let dst_key = required_key(&lookup, DST_STORAGE_KEY)?;

        if args.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        Ok(Self {
            src_account: args.src_account,
            src_key,
            dst_account: args.dst_account,
            dst_key,
            table: args.table,
            batch_size: clamp_batch_size(args.batch_size),
            fail_on_errors: args.fail_on_errors,
        })
    }
}

fn required_key(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<StorageKey, ConfigError> {
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .map(StorageKey::new)
        .ok_or(ConfigError::MissingKey(name))
}

/// The service caps a transaction at 100 operations
pub fn clamp_batch_size(requested: usize) -> usize {
    if requested > MAX_BATCH_SIZE {
        tracing::warn!(
            requested = requested,
            "Azure limits batch size to {}, using {}",
            MAX_BATCH_SIZE,
            MAX_BATCH_SIZE
        );
        MAX_BATCH_SIZE
    } else {
        requested
    }
}
