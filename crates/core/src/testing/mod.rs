//! Testing utilities and mock implementations.
//!
//! Mocks of the external network traits, so the engine can be exercised
//! end to end without a running slskd instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use digger_core::testing::{fixtures, MockDownloadRunner, MockSearchNetwork};
//!
//! let network = MockSearchNetwork::new();
//! network.set_responses(vec![
//!     fixtures::album_response("alice", "Music\\Artist\\Album", &["01.flac", "02.flac"], None),
//! ]).await;
//!
//! let downloads = MockDownloadRunner::new();
//! ```

mod mock_download_runner;
mod mock_network;

pub use mock_download_runner::MockDownloadRunner;
pub use mock_network::{MockSearchNetwork, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::network::{CandidateResponse, SharedFile};

    /// Default size of fixture files.
    pub const FILE_SIZE: u64 = 30 * 1024 * 1024;

    /// A shared file with a fixed size and optional bitrate.
    pub fn file(filename: &str, bit_rate: Option<u32>) -> SharedFile {
        SharedFile {
            size: Some(FILE_SIZE),
            bit_rate,
            ..SharedFile::named(filename)
        }
    }

    /// A response with the given files and no free slot.
    pub fn response(username: &str, files: &[(&str, Option<u32>)]) -> CandidateResponse {
        CandidateResponse {
            username: username.to_string(),
            files: files
                .iter()
                .map(|(name, bit_rate)| file(name, *bit_rate))
                .collect(),
            has_free_slot: false,
            upload_speed: 0,
            queue_length: 0,
        }
    }

    /// A response sharing one directory, using Windows-style separators.
    pub fn album_response(
        username: &str,
        directory: &str,
        names: &[&str],
        bit_rate: Option<u32>,
    ) -> CandidateResponse {
        let paths: Vec<String> = names
            .iter()
            .map(|name| format!("{}\\{}", directory, name))
            .collect();
        let files: Vec<(&str, Option<u32>)> =
            paths.iter().map(|p| (p.as_str(), bit_rate)).collect();
        response(username, &files)
    }

    /// A numbered lossless album: `01 - Track 1.flac` and so on.
    pub fn flac_album(username: &str, directory: &str, tracks: usize) -> CandidateResponse {
        let names: Vec<String> = (1..=tracks)
            .map(|i| format!("{:02} - Track {}.flac", i, i))
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        album_response(username, directory, &names, None)
    }
}
