pub mod config;
pub mod logging;

pub use config::{CliArgs, MigrationConfig};
pub use logging::init_logging;
