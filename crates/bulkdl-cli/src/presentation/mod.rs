//! Shared CLI presentation utilities.
//!
//! Keep this module format-only: no batch transitions here.

pub mod progress;
pub mod tables;

pub use progress::{BatchProgress, Summary};
pub use tables::{format_progress, print_separator, truncate_string};
