use super::schema::Cache;
use super::types::FeedRecord;

impl Cache {
    // ========================================================================
    // Feed Lookups
    // ========================================================================

    /// Look up a feed by its exact URL.
    pub async fn feed(&mut self, url: &str) -> Result<Option<FeedRecord>, sqlx::Error> {
        sqlx::query_as::<_, FeedRecord>("SELECT rssurl, title FROM rss_feed WHERE rssurl = ?")
            .bind(url)
            .fetch_optional(&mut self.conn)
            .await
    }

    /// Number of items whose owning feed is `url`.
    pub async fn count_items(&mut self, url: &str) -> Result<u64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rss_item WHERE feedurl = ?")
            .bind(url)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count.max(0) as u64)
    }
}
