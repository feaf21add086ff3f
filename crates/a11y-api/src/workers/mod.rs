//! Background workers

pub mod scanner;

pub use scanner::{execute, CoordinatorError, ScanContext, ScanCoordinator, ScanJob};
