//! Page-by-page sync orchestration.
//!
//! One call to [`SyncEngine::sync_page`] fetches exactly one page of remote
//! products, reconciles every product on it, and advances the persisted
//! cursor: `Start → Page(token)* → End`. Progress is durable after every
//! page, so a multi-page sync resumes at the next unseen page after a crash
//! or restart. `End` is terminal until an explicit reset.

mod images;
mod reconcile;

pub use images::{ImageSyncError, derive_filename, sync_image};
pub use reconcile::{ReconcileOutcome, ReconcileReport};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shopsync_core::SyncCursor;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::catalog::CatalogStore;
use crate::shopify::ProductSource;
use crate::state::{StateError, StateStore, SyncState};

/// Errors that make a sync run unresumable.
///
/// Everything else — fetch failures, bad products, bad images — is folded
/// into the [`PageSummary`] so the cursor machinery keeps working.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// What drove a sync run. Completion timestamps are tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// An operator asked for it.
    Manual,
    /// The watch loop's recurring tick.
    Scheduled,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Outcome of one page sync, persisted as the last-known summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// Products the page was expected to carry (page size on fetch failure).
    pub attempted: u32,
    /// Products created or updated.
    pub processed: u32,
    /// Products skipped (no variants, or nothing sellable).
    pub skipped: u32,
    /// Failed products plus failed/unsellable variants.
    pub failed: u32,
    /// Cursor the page was fetched at, in display form.
    pub page: String,
    /// Cursor persisted for the next run.
    pub next_cursor: SyncCursor,
    /// Human-readable result line.
    pub message: String,
}

impl PageSummary {
    fn no_op(cursor: &SyncCursor) -> Self {
        Self {
            attempted: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            page: cursor.to_string(),
            next_cursor: cursor.clone(),
            message: "sync already complete".to_string(),
        }
    }
}

/// Drives the fetch → reconcile → persist cycle.
///
/// An internal mutex serializes page syncs: at most one page is in flight
/// per engine, whatever mix of manual and scheduled callers shares it.
pub struct SyncEngine<S, C, T> {
    source: S,
    catalog: C,
    state: T,
    page_size: u32,
    sync_images: bool,
    guard: Mutex<()>,
}

impl<S, C, T> SyncEngine<S, C, T>
where
    S: ProductSource,
    C: CatalogStore,
    T: StateStore,
{
    #[must_use]
    pub fn new(source: S, catalog: C, state: T, page_size: u32, sync_images: bool) -> Self {
        Self {
            source,
            catalog,
            state,
            page_size,
            sync_images,
            guard: Mutex::new(()),
        }
    }

    /// The product source this engine fetches from.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The catalog store this engine writes to.
    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Sync exactly one page and advance the cursor.
    ///
    /// At [`SyncCursor::End`] this is a no-op; a failed fetch reports
    /// `failed = page_size` and leaves the cursor where it was so the same
    /// page is retried next run. Both are `Ok` summaries.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] only when sync state cannot be loaded or
    /// saved; that is the one fault that would make the run unresumable.
    #[instrument(skip(self), fields(trigger = %trigger))]
    pub async fn sync_page(&self, trigger: SyncTrigger) -> Result<PageSummary, SyncError> {
        let _in_flight = self.guard.lock().await;

        let mut state = self.state.load().await?;
        let cursor = state.cursor.clone();

        if cursor.is_end() {
            info!("pagination already exhausted");
            return Ok(PageSummary::no_op(&cursor));
        }

        let page = match self.source.fetch_page(self.page_size, &cursor).await {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %err, "page fetch failed");
                let summary = PageSummary {
                    attempted: self.page_size,
                    processed: 0,
                    skipped: 0,
                    failed: self.page_size,
                    page: cursor.to_string(),
                    next_cursor: cursor.clone(),
                    message: format!("page fetch failed: {err}"),
                };
                state.last_summary = Some(summary.clone());
                self.state.save(&state).await?;
                return Ok(summary);
            }
        };

        let attempted = page.products.len() as u32;
        let mut processed = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;

        // Strictly in API response order; no product aborts the page.
        for product in &page.products {
            let report = reconcile::reconcile(
                &self.source,
                &self.catalog,
                product,
                self.sync_images,
                Utc::now(),
            )
            .await;

            failed += report.failed_variants;
            match report.outcome {
                ReconcileOutcome::Created | ReconcileOutcome::Updated => processed += 1,
                ReconcileOutcome::SkippedNoVariants | ReconcileOutcome::SkippedNotSellable => {
                    skipped += 1;
                }
                ReconcileOutcome::Failed(reason) => {
                    warn!(remote_id = %product.id, %reason, "product failed");
                    failed += 1;
                }
            }
        }

        // An empty page means the listing ran out; so does a response with
        // no next-page token.
        let next_cursor = if page.products.is_empty() {
            SyncCursor::End
        } else {
            page.next_page_info
                .and_then(|token| SyncCursor::page(token).ok())
                .unwrap_or(SyncCursor::End)
        };

        let summary = PageSummary {
            attempted,
            processed,
            skipped,
            failed,
            page: cursor.to_string(),
            next_cursor: next_cursor.clone(),
            message: format!(
                "processed {processed}, skipped {skipped}, failed {failed} of {attempted}"
            ),
        };

        state.cursor = next_cursor.clone();
        state.last_summary = Some(summary.clone());
        if next_cursor.is_end() {
            state.mark_completed(trigger, Utc::now());
        }
        self.state.save(&state).await?;

        info!(
            processed,
            skipped,
            failed,
            next = %next_cursor,
            "page synced"
        );
        Ok(summary)
    }

    /// Drive [`Self::sync_page`] until the cursor reaches `End`, a page makes
    /// no progress (persistent fetch failure), or `max_pages` is hit.
    ///
    /// Returns the summaries in page order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] under the same conditions as
    /// [`Self::sync_page`].
    pub async fn run_to_completion(
        &self,
        trigger: SyncTrigger,
        max_pages: Option<u32>,
    ) -> Result<Vec<PageSummary>, SyncError> {
        let mut summaries = Vec::new();
        loop {
            let summary = self.sync_page(trigger).await?;
            let done = summary.next_cursor.is_end()
                || summary.next_cursor.to_string() == summary.page;
            summaries.push(summary);
            if done {
                break;
            }
            if let Some(limit) = max_pages {
                if summaries.len() as u32 >= limit {
                    break;
                }
            }
        }
        Ok(summaries)
    }

    /// Clear all sync state, returning the cursor to [`SyncCursor::Start`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] when the state store cannot be cleared.
    pub async fn reset(&self) -> Result<(), SyncError> {
        self.state.reset().await?;
        info!("sync state reset");
        Ok(())
    }

    /// Read-only snapshot of the persisted sync state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] when the state store cannot be read.
    pub async fn state(&self) -> Result<SyncState, SyncError> {
        Ok(self.state.load().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::catalog::MemoryCatalog;
    use crate::shopify::ShopifyError;
    use crate::shopify::types::ProductPage;
    use crate::state::MemoryStateStore;

    use super::*;

    /// Source whose every call fails at the transport level.
    struct DownSource;

    #[async_trait]
    impl ProductSource for DownSource {
        async fn fetch_page(
            &self,
            _limit: u32,
            _cursor: &SyncCursor,
        ) -> Result<ProductPage, ShopifyError> {
            Err(ShopifyError::Remote {
                status: 503,
                errors: None,
            })
        }

        async fn download_image(&self, _url: &str) -> Result<Bytes, ShopifyError> {
            Err(ShopifyError::Remote {
                status: 503,
                errors: None,
            })
        }
    }

    fn engine_with_down_source() -> SyncEngine<DownSource, MemoryCatalog, MemoryStateStore> {
        SyncEngine::new(DownSource, MemoryCatalog::new(), MemoryStateStore::new(), 10, false)
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_without_advancing() {
        let engine = engine_with_down_source();

        let summary = engine.sync_page(SyncTrigger::Manual).await.unwrap();
        assert_eq!(summary.failed, 10);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.next_cursor, SyncCursor::Start);
        assert!(summary.message.contains("page fetch failed"));

        // The failure itself is durable.
        let state = engine.state().await.unwrap();
        assert_eq!(state.cursor, SyncCursor::Start);
        assert_eq!(state.last_summary.unwrap().failed, 10);
    }

    #[tokio::test]
    async fn test_run_to_completion_stops_on_stuck_cursor() {
        let engine = engine_with_down_source();
        let summaries = engine
            .run_to_completion(SyncTrigger::Scheduled, None)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_end_is_a_no_op_until_reset() {
        let engine = engine_with_down_source();
        let state = SyncState {
            cursor: SyncCursor::End,
            ..SyncState::default()
        };
        engine.state.save(&state).await.unwrap();

        // Even with a broken source, End short-circuits before any fetch.
        let summary = engine.sync_page(SyncTrigger::Manual).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.message, "sync already complete");
        assert!(summary.next_cursor.is_end());

        engine.reset().await.unwrap();
        assert_eq!(engine.state().await.unwrap().cursor, SyncCursor::Start);
    }

    #[test]
    fn test_page_summary_serde_round_trip() {
        let summary = PageSummary {
            attempted: 10,
            processed: 7,
            skipped: 2,
            failed: 1,
            page: "START".to_string(),
            next_cursor: SyncCursor::page("tok").unwrap(),
            message: "processed 7, skipped 2, failed 1 of 10".to_string(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: PageSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
