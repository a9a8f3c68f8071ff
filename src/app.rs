use crate::config::Settings;
use crate::error::{MoveError, SetupError};
use crate::lock::CacheLock;
use crate::storage::{Cache, MigrationReport};

/// One feed URL move, as requested on the command line.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub old_url: String,
    pub new_url: String,
    /// Roll the transaction back instead of committing it
    pub dry_run: bool,
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub report: MigrationReport,
    /// Display title of the moved feed, if the cache had one for `old_url`
    pub title: Option<String>,
}

/// Move a feed to a new URL under the cache lock.
///
/// The lock is taken before the cache is opened and is released on every
/// path out of this function, including failures while opening or
/// migrating. A busy cache fails immediately; there is no waiting.
pub async fn move_url(settings: &Settings, request: &MoveRequest) -> Result<MoveOutcome, MoveError> {
    if request.old_url.is_empty() {
        return Err(SetupError::EmptyKey("old URL").into());
    }
    if request.new_url.is_empty() {
        return Err(SetupError::EmptyKey("new URL").into());
    }

    let lock = CacheLock::acquire(&settings.cache_path)?;
    let result = migrate_locked(settings, request).await;
    drop(lock);
    result
}

async fn migrate_locked(settings: &Settings, request: &MoveRequest) -> Result<MoveOutcome, MoveError> {
    let mut cache = Cache::open(&settings.cache_path).await?;

    // The title only decorates the operator message; a failed lookup is not fatal.
    let title = match cache.feed(&request.old_url).await {
        Ok(feed) => feed.map(|f| f.title),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to look up feed title");
            None
        }
    };

    let report = match cache
        .move_feed_url(&request.old_url, &request.new_url, !request.dry_run)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            close_quietly(cache).await;
            return Err(MoveError::MigrationFailed(e));
        }
    };

    if report.is_noop() {
        tracing::warn!(old_url = %request.old_url, "Nothing in the cache references the old URL");
    }

    close_quietly(cache).await;
    Ok(MoveOutcome { report, title })
}

/// Close the cache, logging instead of failing: by now the result is decided.
async fn close_quietly(cache: Cache) {
    let path = cache.path().to_path_buf();
    if let Err(e) = cache.close().await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to close cache cleanly");
    }
}
