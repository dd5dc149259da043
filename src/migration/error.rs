use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to connect to {role} account '{account}': {source}")]
    Connect {
        role: &'static str,
        account: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to fetch entities from source: {0}")]
    Fetch(#[source] StoreError),

    #[error("failed to write partition '{partition_key}': {source}")]
    Write {
        partition_key: String,
        #[source]
        source: StoreError,
    },
}
