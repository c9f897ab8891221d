//! Shared test utilities for the keeper workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`] builder for a repository plus a scratch target
//!   root

pub mod tree;

pub use tree::TestTree;
