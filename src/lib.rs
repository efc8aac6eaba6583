pub mod cli;
pub mod config;
pub mod database_ops;
pub mod error;
pub mod events;
pub mod logging;
pub mod marketplace;
pub mod models;
pub mod normalization;
pub mod sync;

pub mod util {
    pub mod env;
}

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use sync::{RunSummary, SyncOrchestrator};
