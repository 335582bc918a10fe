//! Directory scanning and ignore handling.

pub mod directory;
pub mod ignore;

pub use directory::{directory_tree, scan_directory, SCAN_WORKERS};
pub use ignore::{apply_ignore_patterns, ignore_patterns};
