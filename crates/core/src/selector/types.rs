use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::SharedFile;
use crate::quality::QualityPreferences;

/// Constraints for choosing files from one uploader's listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileSelectionOptions {
    pub min_file_size_bytes: u64,
    pub max_file_size_bytes: u64,
    /// Minimum number of qualifying files in the chosen set.
    pub min_files: usize,
    /// Prefer the largest directory that meets `min_files`.
    pub prefer_complete_albums: bool,
    /// Prefer the first directory that meets `min_files`.
    pub prefer_album_folder: bool,
    pub quality: Option<QualityPreferences>,
    /// Narrow the result to a single file matching this text.
    pub single_file_hint: Option<String>,
    /// Only consider files located directly in this directory.
    pub directory: Option<String>,
}

/// Files chosen from a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelection {
    /// Normalized parent directory ("" for files at the share root).
    pub directory: String,
    pub files: Vec<SharedFile>,
}

impl FileSelection {
    /// Sum of known file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().filter_map(|f| f.size).sum()
    }
}

/// Why a listing could not produce a selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionRejected {
    #[error("No audio files in listing")]
    NoAudioFiles,

    #[error("Not enough files: found {found}, required {required}")]
    NotEnoughFiles { found: usize, required: usize },
}
