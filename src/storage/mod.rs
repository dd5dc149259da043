pub mod auth;
pub mod batch;
pub mod client;
pub mod connection;
pub mod error;
pub mod models;
pub mod store;

pub use client::MAX_BATCH_SIZE;
pub use error::StoreError;
pub use models::{Entity, TableProvisioning};
pub use store::{EntitySource, EntityStore};

#[cfg(test)]
pub use store::{MockEntitySource, MockEntityStore};
