use crate::migration::error::MigrationError;
use crate::migration::events::{MigrationEvent, MigrationObserver};
use crate::migration::partition::{batched, group_by_partition};
use crate::migration::result::MigrationResult;
use crate::migration::writer::upsert_batch;
use crate::storage::client::{connect, TableServiceClient};
use crate::storage::{Entity, EntitySource, EntityStore, TableProvisioning};
use crate::utils::config::MigrationConfig;

/// Progress is reported each time the migrated count crosses a multiple of this
pub const PROGRESS_INTERVAL: usize = 500;

/// Copy the configured table from the source account to the destination
pub async fn migrate_table(
    config: &MigrationConfig,
    observer: &dyn MigrationObserver,
) -> Result<MigrationResult, MigrationError> {
    let src = connect(&config.src_account, config.src_key.expose()).map_err(|source| {
        MigrationError::Connect {
            role: "source",
            account: config.src_account.clone(),
            source,
        }
    })?;

    let dst = connect(&config.dst_account, config.dst_key.expose()).map_err(|source| {
        MigrationError::Connect {
            role: "destination",
            account: config.dst_account.clone(),
            source,
        }
    })?;

    migrate_with(&src, &dst, &config.table, config.batch_size, observer).await
}

/// Ensure `table` on the destination, then copy every source entity into it
///
/// A failed table creation is reported and the run carries on; the writes
/// surface the problem if the table really is missing.
pub async fn migrate_with(
    src: &TableServiceClient,
    dst: &TableServiceClient,
    table: &str,
    batch_size: usize,
    observer: &dyn MigrationObserver,
) -> Result<MigrationResult, MigrationError> {
    match dst.ensure_table(table).await {
        TableProvisioning::Created => observer.on_event(&MigrationEvent::TableCreated { table }),
        TableProvisioning::AlreadyExists => {
            observer.on_event(&MigrationEvent::TableAlreadyExists { table })
        }
        TableProvisioning::Failed(error) => observer.on_event(&MigrationEvent::TableCreationFailed {
            table,
            error: &error,
        }),
    }

    let src_table = src.get_table_client(table);
    let dst_table = dst.get_table_client(table);

    observer.on_event(&MigrationEvent::FetchStarted {
        account: src_table.account(),
        table: src_table.table_name(),
    });

    migrate_from(&src_table, &dst_table, batch_size, observer).await
}

/// Fetch every source entity, then migrate them; an empty source writes nothing
pub async fn migrate_from(
    source: &dyn EntitySource,
    destination: &dyn EntityStore,
    batch_size: usize,
    observer: &dyn MigrationObserver,
) -> Result<MigrationResult, MigrationError> {
    let entities = source.list_entities().await.map_err(MigrationError::Fetch)?;
    observer.on_event(&MigrationEvent::Fetched {
        count: entities.len(),
    });

    if entities.is_empty() {
        observer.on_event(&MigrationEvent::NothingToMigrate);
        return Ok(MigrationResult::default());
    }

    let result = migrate_entities(destination, entities, batch_size, observer).await?;
    observer.on_event(&MigrationEvent::Completed { result });

    Ok(result)
}

/// Group by partition, chunk, and write every chunk in order
pub async fn migrate_entities(
    destination: &dyn EntityStore,
    entities: Vec<Entity>,
    batch_size: usize,
    observer: &dyn MigrationObserver,
) -> Result<MigrationResult, MigrationError> {
    let total = entities.len();
    let mut result = MigrationResult::default();

    let by_partition = group_by_partition(entities);
    observer.on_event(&MigrationEvent::PartitionsFound {
        count: by_partition.len(),
    });

    for (partition_key, partition_entities) in by_partition.iter() {
        for batch in batched(partition_entities, batch_size) {
            let before = result.migrated;

            result += upsert_batch(destination, batch, partition_key, observer)
                .await
                .map_err(|source| MigrationError::Write {
                    partition_key: partition_key.to_string(),
                    source,
                })?;

            let crossed = result.migrated / PROGRESS_INTERVAL > before / PROGRESS_INTERVAL;
            if crossed || result.processed() == total {
                observer.on_event(&MigrationEvent::Progress {
                    migrated: result.migrated,
                    total,
                });
            }
        }
    }

    Ok(result)
}
