use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while opening the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file does not exist (this tool never creates one)
    #[error("Cache file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file opened but lacks one of the feed reader's tables
    #[error("'{}' is not a feed cache (missing table {table})", path.display())]
    MissingTable { path: PathBuf, table: &'static str },

    /// Generic database error
    #[error("Cache error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// A row of `rss_feed`, reduced to the columns this tool reads
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedRecord {
    #[sqlx(rename = "rssurl")]
    pub url: String,
    pub title: String,
}

/// Rows touched by a feed URL move
///
/// A report with both counts at zero means nothing referenced the old URL.
/// `committed` is false for dry runs, where the transaction was rolled back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub feeds: u64,
    pub items: u64,
    pub committed: bool,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.feeds == 0 && self.items == 0
    }
}
