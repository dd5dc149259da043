use crate::migration::events::{MigrationEvent, MigrationObserver};
use crate::migration::result::MigrationResult;
use crate::storage::{Entity, EntityStore, StoreError};

/// Upsert `rows` as one transaction, degrading to single upserts when the
/// transaction is rejected. Errors other than a rejected transaction abort.
pub async fn upsert_batch(
    table: &dyn EntityStore,
    rows: &[Entity],
    partition_key: &str,
    observer: &dyn MigrationObserver,
) -> Result<MigrationResult, StoreError> {
    match table.submit_transaction(rows).await {
        Ok(()) => Ok(MigrationResult::migrated(rows.len())),
        Err(error) if error.is_transaction() => {
            observer.on_event(&MigrationEvent::BatchFailed {
                partition_key,
                error: &error,
            });
            Ok(upsert_individually(table, rows, observer).await)
        }
        Err(error) => Err(error),
    }
}

/// Upsert each row on its own; a failed row is reported and counted
pub async fn upsert_individually(
    table: &dyn EntityStore,
    rows: &[Entity],
    observer: &dyn MigrationObserver,
) -> MigrationResult {
    let mut result = MigrationResult::default();

    for entity in rows {
        match table.upsert_entity(entity).await {
            Ok(()) => result.migrated += 1,
            Err(error) => {
                observer.on_event(&MigrationEvent::RowFailed {
                    row_key: entity.row_key(),
                    error: &error,
                });
                result.errors += 1;
            }
        }
    }

    result
}
