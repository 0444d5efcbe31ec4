//! crates/evaluation_core/src/history.rs
//!
//! Paginated browsing of past evaluation sessions.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::domain::{HistoryDetail, HistoryEntry, HistoryQuery, UploadedFileHandle};
use crate::ports::{HistoryService, PortError};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The caller should log the user out.
    #[error("Session expired. Please login again.")]
    Unauthorized,
    #[error("Failed to load history.")]
    Load,
    #[error("Failed to fetch details.")]
    Detail,
    #[error("Failed to delete record.")]
    Delete,
    #[error("Failed to download original file.")]
    DownloadFile,
    #[error("Failed to download report.")]
    DownloadReport,
}

fn classify(err: PortError, otherwise: HistoryError) -> HistoryError {
    match err {
        PortError::Unauthorized => HistoryError::Unauthorized,
        other => {
            warn!("{}: {}", otherwise, other);
            otherwise
        }
    }
}

impl HistoryEntry {
    pub fn description_or_placeholder(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => "No description",
        }
    }

    pub fn subject_or_placeholder(&self) -> &str {
        match self.subject_name.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => "Unknown",
        }
    }
}

/// One page of history at a time, with the listing cached between calls.
pub struct HistoryBrowser {
    service: Arc<dyn HistoryService>,
    page_size: u32,
    page: u32,
    category: Option<String>,
    entries: Vec<HistoryEntry>,
    total: u64,
}

impl HistoryBrowser {
    pub fn new(service: Arc<dyn HistoryService>, page_size: u32) -> Self {
        Self {
            service,
            page_size: page_size.max(1),
            page: 1,
            category: None,
            entries: Vec::new(),
            total: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Never less than one, so an empty history still shows "page 1 of 1".
    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// Narrows the listing to one evaluation type; takes effect on the next fetch.
    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category.filter(|c| !c.trim().is_empty());
        self.page = 1;
    }

    /// Loads `page` (1-based; 0 is treated as 1) and caches it.
    pub async fn fetch_page(&mut self, page: u32) -> Result<&[HistoryEntry], HistoryError> {
        let query = HistoryQuery {
            page: page.max(1),
            limit: self.page_size,
            category: self.category.clone(),
        };
        debug!(page = query.page, limit = query.limit, "Fetching history page");
        let listing = self
            .service
            .list(&query)
            .await
            .map_err(|e| classify(e, HistoryError::Load))?;
        self.page = query.page;
        self.entries = listing.entries;
        self.total = listing.total;
        Ok(&self.entries)
    }

    pub async fn view(&self, id: i64) -> Result<HistoryDetail, HistoryError> {
        self.service
            .detail(id)
            .await
            .map_err(|e| classify(e, HistoryError::Detail))
    }

    /// Deletes a record and reloads the listing. Removing the last entry of a
    /// page past the first steps back one page.
    pub async fn delete(&mut self, id: i64) -> Result<(), HistoryError> {
        self.service
            .delete(id)
            .await
            .map_err(|e| classify(e, HistoryError::Delete))?;
        info!(id, "History record deleted");

        let emptied = self.entries.len() <= 1 && self.entries.iter().all(|e| e.id == id);
        let page = if emptied && self.page > 1 { self.page - 1 } else { self.page };
        self.fetch_page(page).await?;
        Ok(())
    }

    pub async fn download_file(&self, handle: &UploadedFileHandle) -> Result<Bytes, HistoryError> {
        self.service
            .download_file(handle)
            .await
            .map_err(|e| classify(e, HistoryError::DownloadFile))
    }

    pub async fn download_report(&self, result_id: i64) -> Result<Bytes, HistoryError> {
        self.service
            .download_report(result_id)
            .await
            .map_err(|e| classify(e, HistoryError::DownloadReport))
    }
}
