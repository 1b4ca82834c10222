//! File selection within a single candidate.
//!
//! Given one uploader's file listing, picks the directory and files to
//! download under size, count and quality constraints.

mod select;
mod types;

pub use select::select_files;
pub use types::{FileSelection, FileSelectionOptions, SelectionRejected};
