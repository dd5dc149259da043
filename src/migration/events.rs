use crate::migration::result::MigrationResult;
use crate::storage::StoreError;

/// Everything the migration reports while it runs
#[derive(Debug)]
pub enum MigrationEvent<'a> {
    TableCreated { table: &'a str },
    TableAlreadyExists { table: &'a str },
    TableCreationFailed { table: &'a str, error: &'a StoreError },
    FetchStarted { account: &'a str, table: &'a str },
    Fetched { count: usize },
    NothingToMigrate,
    PartitionsFound { count: usize },
    BatchFailed { partition_key: &'a str, error: &'a StoreError },
    RowFailed { row_key: &'a str, error: &'a StoreError },
    Progress { migrated: usize, total: usize },
    Completed { result: MigrationResult },
}

/// Sink for migration events; keeps the pipeline free of output concerns
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent<'_>);
}

/// Default observer: structured log lines through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent<'_>) {
        match event {
            MigrationEvent::TableCreated { table } => {
                tracing::info!(table = %table, "Created table in destination");
            }
            MigrationEvent::TableAlreadyExists { table } => {
                tracing::info!(table = %table, "Table already exists in destination");
            }
            MigrationEvent::TableCreationFailed { table, error } => {
                tracing::warn!(
                    table = %table,
                    error = %error,
                    "Could not create table in destination, continuing"
                );
            }
            MigrationEvent::FetchStarted { account, table } => {
                tracing::info!("Fetching entities from source '{}/{}'...", account, table);
            }
            MigrationEvent::Fetched { count } => {
                tracing::info!(count = count, "Found {} entities to migrate", count);
            }
            MigrationEvent::NothingToMigrate => {
                tracing::info!("Nothing to migrate");
            }
            MigrationEvent::PartitionsFound { count } => {
                tracing::info!(partitions = count, "Found {} partition(s)", count);
            }
            MigrationEvent::BatchFailed {
                partition_key,
                error,
            } => {
                tracing::warn!(
                    partition_key = %partition_key,
                    error = %error,
                    "Batch error in partition, falling back to single upserts"
                );
            }
            MigrationEvent::RowFailed { row_key, error } => {
                tracing::error!(row_key = %row_key, error = %error, "Failed to insert {}", row_key);
            }
            MigrationEvent::Progress { migrated, total } => {
                tracing::info!(
                    migrated = migrated,
                    total = total,
                    "Progress: {}/{} entities migrated",
                    migrated,
                    total
                );
            }
            MigrationEvent::Completed { result } => {
                tracing::info!("Migration complete!");
                tracing::info!(migrated = result.migrated, "  Migrated: {}", result.migrated);
                tracing::info!(errors = result.errors, "  Errors: {}", result.errors);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Observer that keeps a rendered line per event
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        pub fn contains(&self, needle: &str) -> bool {
            self.lines().iter().any(|l| l.contains(needle))
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.lines().iter().filter(|l| l.starts_with(prefix)).count()
        }
    }

    impl MigrationObserver for RecordingObserver {
        fn on_event(&self, event: &MigrationEvent<'_>) {
            let line = match event {
                MigrationEvent::TableCreated { table } => format!("created {}", table),
                MigrationEvent::TableAlreadyExists { table } => format!("exists {}", table),
                MigrationEvent::TableCreationFailed { table, error } => {
                    format!("create-failed {}: {}", table, error)
                }
                MigrationEvent::FetchStarted { account, table } => {
                    format!("fetching {}/{}", account, table)
                }
                MigrationEvent::Fetched { count } => format!("fetched {}", count),
                MigrationEvent::NothingToMigrate => "nothing to migrate".to_string(),
                MigrationEvent::PartitionsFound { count } => format!("partitions {}", count),
                MigrationEvent::BatchFailed {
                    partition_key,
                    error,
                } => format!("batch-failed {}: {}", partition_key, error),
                MigrationEvent::RowFailed { row_key, error } => {
                    format!("row-failed {}: {}", row_key, error)
                }
                MigrationEvent::Progress { migrated, total } => {
                    format!("progress {}/{}", migrated, total)
                }
                MigrationEvent::Completed { result } => {
                    format!("completed {}/{}", result.migrated, result.errors)
                }
            };
            self.lines.lock().unwrap().push(line);
        }
    }
}
