//! Configuration and dependency initialization for the catalog indexer.

mod dependencies;
mod settings;

pub use dependencies::{build_pipeline, ConnectionMode, Dependencies};
pub use settings::Settings;
