use std::collections::HashMap;

use time::OffsetDateTime;

/// One accepted discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    pub key: String,
    pub tool: String,
    /// Local receipt time; the push channel carries no server timestamp.
    pub observed_at: OffsetDateTime,
}

/// Deduplicated discoveries for one scan session, kept in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    items: Vec<DiscoveredItem>,
    index: HashMap<String, usize>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` unless it is already present. Returns whether it was accepted.
    pub fn try_add(&mut self, key: &str, tool: &str) -> bool {
        if self.index.contains_key(key) {
            return false;
        }
        self.index.insert(key.to_string(), self.items.len());
        self.items.push(DiscoveredItem {
            key: key.to_string(),
            tool: tool.to_string(),
            observed_at: OffsetDateTime::now_utc(),
        });
        true
    }

    pub fn get(&self, key: &str) -> Option<&DiscoveredItem> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn last(&self) -> Option<&DiscoveredItem> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Up to `n` keys in insertion order. The iterator is `Clone`, so it can be
    /// replayed without touching the store.
    pub fn top_n(&self, n: usize) -> impl Iterator<Item = &str> + Clone + '_ {
        self.items.iter().take(n).map(|item| item.key.as_str())
    }
}
