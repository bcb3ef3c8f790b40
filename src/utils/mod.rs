//! Utility functions for string matching and cell formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{cell_text, contains_ignore_case};
