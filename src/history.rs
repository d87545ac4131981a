//! Per-user bounded history of answered questions. Process-local only; the
//! whole store resets on restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const HISTORY_CAPACITY: usize = 10;
pub const MSG_EMPTY_HISTORY: &str = "No history yet.";

/// Anonymous callers are keyed under 0; their entries are recorded but never
/// read back.
pub const ANONYMOUS_USER: i64 = 0;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub query: String,
    pub sql: String,
    pub result: String,
}

/// Map of user id to a fixed-capacity ring of recent interactions, oldest
/// evicted first. Each ring carries its own lock so concurrent records for
/// the same user serialize without blocking other users.
#[derive(Default)]
pub struct HistoryStore {
    users: RwLock<HashMap<i64, Arc<Mutex<VecDeque<HistoryEntry>>>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ring(&self, user_id: i64) -> Arc<Mutex<VecDeque<HistoryEntry>>> {
        if let Some(ring) = self.users.read().await.get(&user_id) {
            return Arc::clone(ring);
        }
        let mut users = self.users.write().await;
        Arc::clone(users.entry(user_id).or_default())
    }

    pub async fn record(&self, user_id: i64, entry: HistoryEntry) {
        let ring = self.ring(user_id).await;
        let mut ring = ring.lock().await;
        if ring.len() == HISTORY_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(entry);
    }

    /// Entries for a user, oldest first. Anonymous and unknown users get an
    /// empty list.
    pub async fn read(&self, user_id: i64) -> Vec<HistoryEntry> {
        if user_id == ANONYMOUS_USER {
            return Vec::new();
        }
        let ring = match self.users.read().await.get(&user_id) {
            Some(ring) => Arc::clone(ring),
            None => return Vec::new(),
        };
        let ring = ring.lock().await;
        ring.iter().cloned().collect()
    }

    pub async fn render(&self, user_id: i64) -> String {
        let entries = self.read(user_id).await;
        if entries.is_empty() {
            return MSG_EMPTY_HISTORY.to_string();
        }

        let mut text = String::from("Recent queries:\n\n");
        for (i, entry) in entries.iter().enumerate() {
            text.push_str(&format!("{}. {} → {}\n", i + 1, entry.query, entry.result));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            query: format!("question {}", n),
            sql: format!("SELECT {}", n),
            result: n.to_string(),
        }
    }

    #[tokio::test]
    async fn records_in_order() {
        let store = HistoryStore::new();
        store.record(7, entry(1)).await;
        store.record(7, entry(2)).await;

        let entries = store.read(7).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "question 1");
        assert_eq!(entries[1].query, "question 2");
    }

    #[tokio::test]
    async fn ring_evicts_oldest_at_capacity() {
        let store = HistoryStore::new();
        for n in 1..=13 {
            store.record(7, entry(n)).await;
        }

        let entries = store.read(7).await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].query, "question 4");
        assert_eq!(entries[9].query, "question 13");
    }

    #[tokio::test]
    async fn concurrent_records_for_one_user_keep_the_ring_bounded() {
        let store = Arc::new(HistoryStore::new());

        let mut handles = Vec::new();
        for n in 1..=50usize {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.record(7, entry(n)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Arrival order is unspecified, but the per-user lock must keep the
        // ring at capacity with no duplicated or torn entries.
        let entries = store.read(7).await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);

        let distinct: std::collections::HashSet<&str> =
            entries.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(distinct.len(), HISTORY_CAPACITY);
        for e in &entries {
            assert!(e.query.starts_with("question "));
        }
    }

    #[tokio::test]
    async fn users_do_not_share_rings() {
        let store = HistoryStore::new();
        store.record(1, entry(1)).await;
        store.record(2, entry(2)).await;

        assert_eq!(store.read(1).await.len(), 1);
        assert_eq!(store.read(2).await.len(), 1);
    }

    #[tokio::test]
    async fn anonymous_entries_are_never_read_back() {
        let store = HistoryStore::new();
        store.record(ANONYMOUS_USER, entry(1)).await;

        assert!(store.read(ANONYMOUS_USER).await.is_empty());
        assert_eq!(store.render(ANONYMOUS_USER).await, MSG_EMPTY_HISTORY);
    }

    #[tokio::test]
    async fn render_numbers_entries() {
        let store = HistoryStore::new();
        store.record(7, entry(1)).await;
        store.record(7, entry(2)).await;

        let text = store.render(7).await;
        assert!(text.starts_with("Recent queries:"));
        assert!(text.contains("1. question 1 → 1\n"));
        assert!(text.contains("2. question 2 → 2\n"));
    }

    #[tokio::test]
    async fn unknown_user_renders_empty_message() {
        let store = HistoryStore::new();
        assert_eq!(store.render(99).await, MSG_EMPTY_HISTORY);
    }
}
