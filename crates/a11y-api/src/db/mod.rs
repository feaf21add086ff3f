//! Issue store: durable scans and their findings

pub mod schema;
pub mod store;

use a11y_core::{IssueId, ScanId, ScanStatus};
use thiserror::Error;

pub use store::{ScanListing, ScanStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Scan {0} not found")]
    ScanNotFound(ScanId),

    #[error("Issue {0} not found")]
    IssueNotFound(IssueId),

    #[error("Illegal status transition for scan {id}: {from} -> {to}")]
    InvalidTransition {
        id: ScanId,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("Corrupt row: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
