//! Filesystem primitives for keeper
//!
//! Provides the well-known repository names, atomic temp-file-then-rename
//! writes, chunked content comparison and format-detecting config loading.

pub mod config;
pub mod constants;
pub mod error;
pub mod io;

pub use config::{ConfigFormat, ConfigStore};
pub use constants::KeeperPath;
pub use error::{Error, Result};
pub use io::AtomicFile;
