pub mod error;
pub mod events;
pub mod orchestrator;
pub mod partition;
pub mod result;
pub mod writer;

pub use events::TracingObserver;
pub use orchestrator::migrate_table;
