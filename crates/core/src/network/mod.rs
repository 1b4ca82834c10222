//! Peer-to-peer search network and download runner.
//!
//! The engine talks to the network only through the [`SearchNetwork`] and
//! [`DownloadRunner`] traits. [`SlskdClient`] implements both against the
//! slskd REST API.

mod slskd;
mod types;

pub use slskd::SlskdClient;
pub use types::*;
