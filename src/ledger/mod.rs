//! Ledger persistence layer
//!
//! Entries and tags owned by a chat user. "Most recent" always means the
//! entry with the greatest `created_at`; among equal timestamps the one
//! appended last wins.

use crate::error::{require_owner, BotError};
use crate::models::{Entry, Tag, TimeRange};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod postgres;
pub use postgres::PostgresLedgerStore;

/// Trait for entry persistence
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, entry: Entry) -> Result<()>;
    /// Entries of `owner` ascending by `created_at`, optionally limited to `range`
    async fn query(&self, owner: &str, range: Option<TimeRange>) -> Result<Vec<Entry>>;
    async fn delete_most_recent(&self, owner: &str) -> Result<()>;
    async fn delete_all(&self, owner: &str) -> Result<()>;
    async fn attach_tag_to_most_recent(&self, owner: &str, tag: &str) -> Result<()>;
}

/// Trait for tag persistence
#[async_trait::async_trait]
pub trait TagStore: Send + Sync {
    async fn append(&self, tag: Tag) -> Result<()>;
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Tag>>;
}

/// In-memory ledger holding both entries and tags
pub struct InMemoryLedger {
    entries_by_owner: Arc<RwLock<HashMap<String, Vec<Entry>>>>,
    tags_by_owner: Arc<RwLock<HashMap<String, Vec<Tag>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries_by_owner: Arc::new(RwLock::new(HashMap::new())),
            tags_by_owner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn most_recent_index(entries: &[Entry]) -> Option<usize> {
    // max_by_key keeps the last of equal maxima, i.e. the latest append
    entries
        .iter()
        .enumerate()
        .max_by_key(|(_, entry)| entry.created_at)
        .map(|(index, _)| index)
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(&self, entry: Entry) -> Result<()> {
        require_owner(&entry.owner)?;

        let mut entries = self.entries_by_owner.write().await;
        entries
            .entry(entry.owner.clone())
            .or_insert_with(Vec::new)
            .push(entry);

        Ok(())
    }

    async fn query(&self, owner: &str, range: Option<TimeRange>) -> Result<Vec<Entry>> {
        require_owner(owner)?;

        let entries = self.entries_by_owner.read().await;
        let mut selected: Vec<Entry> = entries
            .get(owner)
            .map(|list| {
                list.iter()
                    .filter(|entry| range.map_or(true, |r| r.contains(&entry.created_at)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort: ties keep append order
        selected.sort_by_key(|entry| entry.created_at);
        Ok(selected)
    }

    async fn delete_most_recent(&self, owner: &str) -> Result<()> {
        require_owner(owner)?;

        let mut entries = self.entries_by_owner.write().await;
        let list = entries.get_mut(owner).ok_or(BotError::NoEntries)?;
        let index = most_recent_index(list).ok_or(BotError::NoEntries)?;
        list.remove(index);

        Ok(())
    }

    async fn delete_all(&self, owner: &str) -> Result<()> {
        require_owner(owner)?;

        let mut entries = self.entries_by_owner.write().await;
        entries.remove(owner);
        Ok(())
    }

    async fn attach_tag_to_most_recent(&self, owner: &str, tag: &str) -> Result<()> {
        require_owner(owner)?;

        let mut entries = self.entries_by_owner.write().await;
        let list = entries.get_mut(owner).ok_or(BotError::NoEntries)?;
        let index = most_recent_index(list).ok_or(BotError::NoEntries)?;
        list[index].add_tag(tag);

        Ok(())
    }
}

#[async_trait::async_trait]
impl TagStore for InMemoryLedger {
    async fn append(&self, tag: Tag) -> Result<()> {
        require_owner(&tag.owner)?;

        let mut tags = self.tags_by_owner.write().await;
        tags.entry(tag.owner.clone()).or_insert_with(Vec::new).push(tag);
        Ok(())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Tag>> {
        require_owner(owner)?;

        let tags = self.tags_by_owner.read().await;
        Ok(tags.get(owner).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tokio_test::assert_ok;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn entry(owner: &str, amount: f64, description: &str, minute: i64) -> Entry {
        Entry::from_signed(owner, amount, description.to_string(), at(minute))
    }

    #[tokio::test]
    async fn test_query_orders_by_created_at() {
        let ledger = InMemoryLedger::new();
        assert_ok!(LedgerStore::append(&ledger, entry("alice", 1.0, "b", 5)).await);
        assert_ok!(LedgerStore::append(&ledger, entry("alice", 2.0, "a", 1)).await);
        assert_ok!(LedgerStore::append(&ledger, entry("alice", 3.0, "c", 9)).await);
        assert_ok!(LedgerStore::append(&ledger, entry("bob", 4.0, "x", 0)).await);

        let entries = ledger.query("alice", None).await.unwrap();
        let order: Vec<&str> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_query_range_excludes_end_boundary() {
        let ledger = InMemoryLedger::new();
        LedgerStore::append(&ledger, entry("alice", 1.0, "start", 0)).await.unwrap();
        LedgerStore::append(&ledger, entry("alice", 1.0, "inside", 30)).await.unwrap();
        LedgerStore::append(&ledger, entry("alice", 1.0, "end", 60)).await.unwrap();

        let range = TimeRange {
            start: at(0),
            end: at(60),
        };
        let entries = ledger.query("alice", Some(range)).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["start", "inside"]);
    }

    #[tokio::test]
    async fn test_delete_most_recent_removes_only_newest() {
        let ledger = InMemoryLedger::new();
        LedgerStore::append(&ledger, entry("alice", 1.0, "new", 10)).await.unwrap();
        LedgerStore::append(&ledger, entry("alice", 1.0, "old", 1)).await.unwrap();
        LedgerStore::append(&ledger, entry("alice", 1.0, "mid", 5)).await.unwrap();

        ledger.delete_most_recent("alice").await.unwrap();

        let entries = ledger.query("alice", None).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["old", "mid"]);
    }

    #[tokio::test]
    async fn test_most_recent_tie_goes_to_last_append() {
        let ledger = InMemoryLedger::new();
        LedgerStore::append(&ledger, entry("alice", 1.0, "first", 3)).await.unwrap();
        LedgerStore::append(&ledger, entry("alice", 1.0, "second", 3)).await.unwrap();

        ledger.attach_tag_to_most_recent("alice", "food").await.unwrap();

        let entries = ledger.query("alice", None).await.unwrap();
        assert!(entries[0].tags.is_empty());
        assert_eq!(entries[1].tags, vec!["food".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_most_recent_on_empty_ledger() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.delete_most_recent("alice").await,
            Err(BotError::NoEntries)
        ));
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let ledger = InMemoryLedger::new();
        LedgerStore::append(&ledger, entry("alice", 1.0, "a", 1)).await.unwrap();
        LedgerStore::append(&ledger, entry("bob", 1.0, "b", 1)).await.unwrap();

        assert_ok!(ledger.delete_all("alice").await);
        assert_ok!(ledger.delete_all("alice").await);

        assert!(ledger.query("alice", None).await.unwrap().is_empty());
        assert_eq!(ledger.query("bob", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_owner_rejected_everywhere() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.query("", None).await,
            Err(BotError::UnrecognizedOwner)
        ));
        assert!(ledger.delete_all("").await.is_err());
        assert!(ledger.delete_most_recent("").await.is_err());
        assert!(ledger.attach_tag_to_most_recent("", "x").await.is_err());
        assert!(LedgerStore::append(&ledger, entry("", 1.0, "a", 1)).await.is_err());
        assert!(ledger.list_by_owner("").await.is_err());
    }

    #[tokio::test]
    async fn test_tags_tolerate_duplicates() {
        let ledger = InMemoryLedger::new();
        for _ in 0..2 {
            TagStore::append(
                &ledger,
                Tag {
                    name: "food".into(),
                    owner: "alice".into(),
                    created_at: at(0),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(ledger.list_by_owner("alice").await.unwrap().len(), 2);
        assert!(ledger.list_by_owner("bob").await.unwrap().is_empty());
    }
}
