//! Command implementations for keeper-cli

pub mod sync;
pub mod template;

pub use sync::{SyncArgs, run_sync};
pub use template::run_test_template;
