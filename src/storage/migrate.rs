use sqlx::{Connection, Sqlite, Transaction};

use super::schema::Cache;
use super::types::MigrationReport;

impl Cache {
    // ========================================================================
    // Feed URL Move
    // ========================================================================

    /// Re-key a feed from `old_url` to `new_url`, carrying its items along.
    ///
    /// Both updates run in one transaction: readers never see items pointing
    /// at a feed URL that has no `rss_feed` row. Keys are matched literally;
    /// no URL normalization happens here. Feed titles and item columns other
    /// than `feedurl` are left untouched.
    ///
    /// With `commit == false` the updates are rolled back after counting,
    /// which previews a move (including constraint failures) without writing.
    ///
    /// # Errors
    ///
    /// Any storage error aborts and rolls back the whole transaction, so the
    /// cache keeps its pre-move state. This includes the PRIMARY KEY conflict
    /// raised when `new_url` already names a feed.
    pub async fn move_feed_url(
        &mut self,
        old_url: &str,
        new_url: &str,
        commit: bool,
    ) -> Result<MigrationReport, sqlx::Error> {
        let mut tx = self.conn.begin().await?;

        let report = match apply_move(&mut tx, old_url, new_url).await {
            Ok(report) => report,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed move also failed");
                }
                return Err(e);
            }
        };

        if commit {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        tracing::info!(
            old_url,
            new_url,
            feeds = report.feeds,
            items = report.items,
            committed = commit,
            "Feed URL move finished"
        );
        Ok(MigrationReport {
            committed: commit,
            ..report
        })
    }
}

async fn apply_move(
    tx: &mut Transaction<'_, Sqlite>,
    old_url: &str,
    new_url: &str,
) -> Result<MigrationReport, sqlx::Error> {
    // Items first; the feed row follows in the same transaction.
    let items = sqlx::query("UPDATE rss_item SET feedurl = ? WHERE feedurl = ?")
        .bind(new_url)
        .bind(old_url)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    let feeds = sqlx::query("UPDATE rss_feed SET rssurl = ? WHERE rssurl = ?")
        .bind(new_url)
        .bind(old_url)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    tracing::debug!(items, feeds, "Applied move inside transaction");
    Ok(MigrationReport {
        feeds,
        items,
        committed: false,
    })
}
