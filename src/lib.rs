//! Move a feed to a new URL inside newsboat's cache without losing its
//! articles.
//!
//! [`lock::CacheLock`] gates every write; [`storage::Cache::move_feed_url`]
//! re-keys the feed and its items in one transaction; [`app::move_url`]
//! composes the two.

pub mod app;
pub mod config;
pub mod error;
pub mod lock;
pub mod storage;
