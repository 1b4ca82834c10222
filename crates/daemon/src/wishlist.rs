//! Wishlist file processing.
//!
//! A wishlist is a TOML file of `[[entries]]`, each searched once through
//! the engine with bounded concurrency.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use digger_core::{AcquisitionEngine, AcquisitionOutcome, EngineError, SearchConfig, SearchContext};

/// Release kind of a wishlist entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Album,
    Track,
}

/// One wanted release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WishlistEntry {
    pub artist: String,
    /// Album or track title, depending on `kind`.
    pub title: String,
    #[serde(default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub year: Option<u16>,
}

impl WishlistEntry {
    pub fn context(&self) -> SearchContext {
        let context = match self.kind {
            EntryKind::Album => SearchContext::album(&self.artist, &self.title),
            EntryKind::Track => SearchContext::track(&self.artist, &self.title),
        };
        match self.year {
            Some(year) => context.with_year(year),
            None => context,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wishlist {
    #[serde(default)]
    pub entries: Vec<WishlistEntry>,
}

impl Wishlist {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid wishlist")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read wishlist {:?}", path))?;
        Self::parse(&content)
    }
}

/// Counts of how entries ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WishlistSummary {
    pub enqueued: usize,
    pub awaiting_selection: usize,
    pub failed: usize,
    pub errors: usize,
    pub cancelled: usize,
}

/// Search every entry, at most `concurrency` at a time.
pub async fn process(
    engine: Arc<AcquisitionEngine>,
    wishlist: Wishlist,
    config: SearchConfig,
    concurrency: usize,
    cancel: CancellationToken,
) -> WishlistSummary {
    info!(
        entries = wishlist.entries.len(),
        concurrency, "Processing wishlist"
    );

    let results: Vec<Result<AcquisitionOutcome, EngineError>> = stream::iter(wishlist.entries)
        .map(|entry| {
            let engine = Arc::clone(&engine);
            let config = &config;
            let cancel = &cancel;
            async move {
                let task_id = Uuid::new_v4().to_string();
                let context = entry.context();
                let result = engine
                    .search_and_maybe_select(&task_id, &context, config, cancel)
                    .await;
                if let Err(e) = &result {
                    warn!(task_id = %task_id, entry = %context.label(), error = %e, "Wishlist entry failed");
                }
                result
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = WishlistSummary::default();
    for result in results {
        match result {
            Ok(AcquisitionOutcome::Enqueued { .. }) => summary.enqueued += 1,
            Ok(AcquisitionOutcome::AwaitingSelection { .. }) => summary.awaiting_selection += 1,
            Ok(AcquisitionOutcome::Failed { .. }) => summary.failed += 1,
            Err(EngineError::Cancelled) => summary.cancelled += 1,
            Err(_) => summary.errors += 1,
        }
    }

    info!(
        enqueued = summary.enqueued,
        awaiting_selection = summary.awaiting_selection,
        failed = summary.failed,
        errors = summary.errors,
        cancelled = summary.cancelled,
        "Wishlist processed"
    );
    summary
}
