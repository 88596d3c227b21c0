//! Table Registry
//!
//! Maps table names to shared table instances, creating tables on first use.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::CacheTable;

/// Name-indexed collection of cache tables with the same key and value types.
pub struct CacheRegistry<K, V> {
    tables: RwLock<HashMap<String, Arc<CacheTable<K, V>>>>,
}

impl<K, V> CacheRegistry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    // == Table ==
    /// Returns the table called `name`, creating it if it does not exist yet.
    ///
    /// Concurrent callers asking for the same new name all receive the same table.
    pub fn table(&self, name: &str) -> Arc<CacheTable<K, V>> {
        if let Some(table) = self.tables.read().get(name) {
            return Arc::clone(table);
        }

        let mut tables = self.tables.write();
        Arc::clone(
            tables
                .entry(name.to_string())
                .or_insert_with(|| CacheTable::new(name)),
        )
    }

    /// Returns the table called `name` without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<CacheTable<K, V>>> {
        self.tables.read().get(name).cloned()
    }

    /// Unregisters the table called `name`.
    ///
    /// Handles already given out keep working; the table's sweeps stop once
    /// the last of them is dropped.
    pub fn remove(&self, name: &str) -> Option<Arc<CacheTable<K, V>>> {
        self.tables.write().remove(name)
    }

    /// Returns the names of all registered tables.
    pub fn names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Returns the number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl<K, V> Default for CacheRegistry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_table_is_created_once() {
        let registry: CacheRegistry<String, u32> = CacheRegistry::new();

        let first = registry.table("users");
        first.add("a".to_string(), Duration::ZERO, 1);
        let second = registry.table("users");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.count(), 1);
        assert_eq!(second.name(), "users");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_and_remove() {
        let registry: CacheRegistry<u64, u64> = CacheRegistry::default();
        assert!(registry.get("sessions").is_none());

        registry.table("sessions");
        registry.table("tokens");
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["sessions", "tokens"]);

        assert!(registry.remove("sessions").is_some());
        assert!(registry.get("sessions").is_none());
        assert!(registry.remove("sessions").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_table_creation() {
        let registry: Arc<CacheRegistry<u64, u64>> = Arc::new(CacheRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.table("shared"))
            })
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        for table in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], table));
        }
    }
}
