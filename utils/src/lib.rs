//! Shared infrastructure utilities for the prompt reducer.
//!
//! - **`atomic_write`**: Crash-safe file output (temp + rename)

pub mod atomic_write;

pub use atomic_write::{FileSyncPolicy, atomic_write, atomic_write_with_policy};
