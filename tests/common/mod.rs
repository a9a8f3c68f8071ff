//! Throwaway caches laid out like the feed reader's `cache.db`.
#![allow(dead_code)]

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection},
    ConnectOptions, Connection,
};
use std::path::Path;

pub const OLD: &str = "http://old.example/feed";
pub const NEW: &str = "https://new.example/feed";
pub const OTHER: &str = "https://other.example/rss";

async fn connect(path: &Path, create: bool) -> SqliteConnection {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .connect()
        .await
        .unwrap()
}

/// Create a cache with `items` articles under [`OLD`] and one under [`OTHER`].
pub async fn seed_cache(path: &Path, items: usize) {
    let mut conn = connect(path, true).await;

    sqlx::query(
        r#"
        CREATE TABLE rss_feed (
            rssurl VARCHAR(1024) PRIMARY KEY NOT NULL,
            url VARCHAR(1024) NOT NULL,
            title VARCHAR(1024) NOT NULL
        )
    "#,
    )
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE rss_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            guid VARCHAR(64) NOT NULL,
            title VARCHAR(1024) NOT NULL,
            url VARCHAR(1024) NOT NULL,
            feedurl VARCHAR(1024) NOT NULL,
            unread INTEGER(1) NOT NULL
        )
    "#,
    )
    .execute(&mut conn)
    .await
    .unwrap();

    for (rssurl, title) in [(OLD, "Example"), (OTHER, "Other")] {
        sqlx::query("INSERT INTO rss_feed (rssurl, url, title) VALUES (?, ?, ?)")
            .bind(rssurl)
            .bind("https://example.com/")
            .bind(title)
            .execute(&mut conn)
            .await
            .unwrap();
    }

    let guids: Vec<(String, &str)> = (0..items)
        .map(|i| (format!("old-{i}"), OLD))
        .chain(std::iter::once(("other-0".to_string(), OTHER)))
        .collect();
    for (guid, feedurl) in guids {
        sqlx::query(
            "INSERT INTO rss_item (guid, title, url, feedurl, unread) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&guid)
        .bind(format!("Article {guid}"))
        .bind(format!("http://old.example/posts/{guid}"))
        .bind(feedurl)
        .execute(&mut conn)
        .await
        .unwrap();
    }

    conn.close().await.unwrap();
}

/// Make every `rss_feed` update fail, after the item update has already run.
pub async fn break_feed_updates(path: &Path) {
    let mut conn = connect(path, false).await;
    sqlx::query(
        r#"
        CREATE TRIGGER fail_feed_update BEFORE UPDATE ON rss_feed BEGIN
            SELECT RAISE(ABORT, 'simulated storage failure');
        END
    "#,
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

/// Full dump of both tables, for before/after comparisons.
pub async fn snapshot(path: &Path) -> (Vec<(String, String)>, Vec<(String, String, String)>) {
    let mut conn = connect(path, false).await;
    let feeds = sqlx::query_as("SELECT rssurl, title FROM rss_feed ORDER BY rssurl")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    let items = sqlx::query_as("SELECT guid, feedurl, url FROM rss_item ORDER BY guid")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
    (feeds, items)
}
