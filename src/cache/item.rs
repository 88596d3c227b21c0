//! Cache Item Module
//!
//! Defines a single cached record: an immutable key and value plus the
//! access bookkeeping that drives idle expiration.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::cache::CallbackList;

/// Hook invoked with the item's key right before the item leaves its table.
pub type ExpireCallback<K> = dyn Fn(&K) + Send + Sync;

// == Access Metadata ==
/// Mutable part of an item, guarded by the item's own lock.
struct AccessMeta<K> {
    accessed_on: Instant,
    access_count: u64,
    expire_callbacks: CallbackList<ExpireCallback<K>>,
}

// == Cache Item ==
/// Represents a single cache entry with its idle life span.
///
/// Key, data, life span and creation time never change after construction
/// and are read without locking. Access time, access count and the expire
/// callbacks sit behind a per-item lock, so an item handed out by a table
/// stays safe to use after the table has dropped it.
pub struct CacheItem<K, V> {
    key: K,
    data: V,
    life_span: Duration,
    created_on: Instant,
    meta: RwLock<AccessMeta<K>>,
    removing: AtomicBool,
}

impl<K, V> CacheItem<K, V> {
    // == Constructor ==
    /// Creates a new cache item.
    ///
    /// # Arguments
    /// * `key` - The item's cache key
    /// * `life_span` - How long the item may stay idle before it expires;
    ///   `Duration::ZERO` means it never expires
    /// * `data` - The value to store
    pub fn new(key: K, life_span: Duration, data: V) -> Self {
        let now = Instant::now();

        Self {
            key,
            data,
            life_span,
            created_on: now,
            meta: RwLock::new(AccessMeta {
                accessed_on: now,
                access_count: 0,
                expire_callbacks: CallbackList::new(),
            }),
            removing: AtomicBool::new(false),
        }
    }

    // == Keep Alive ==
    /// Marks the item as accessed, restarting its idle period.
    pub fn keep_alive(&self) {
        let mut meta = self.meta.write();
        meta.accessed_on = Instant::now();
        meta.access_count += 1;
    }

    /// Returns the item's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the item's value.
    pub fn data(&self) -> &V {
        &self.data
    }

    /// Returns how long the item may stay idle before it expires.
    pub fn life_span(&self) -> Duration {
        self.life_span
    }

    /// Returns when the item was created.
    pub fn created_on(&self) -> Instant {
        self.created_on
    }

    /// Returns when the item was last kept alive.
    pub fn accessed_on(&self) -> Instant {
        self.meta.read().accessed_on
    }

    /// Returns how often the item has been kept alive.
    pub fn access_count(&self) -> u64 {
        self.meta.read().access_count
    }

    // == Expiry Check ==
    /// Returns the idle time left before the item expires as of `now`.
    ///
    /// # Returns
    /// - `None` if the item never expires
    /// - `Some(Duration::ZERO)` if the life span has fully elapsed
    /// - `Some(remaining)` otherwise
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        if self.life_span.is_zero() {
            return None;
        }
        let idle = now.saturating_duration_since(self.accessed_on());
        Some(self.life_span.saturating_sub(idle))
    }

    // == Expire Callbacks ==
    /// Replaces all expire callbacks with `callback`.
    pub fn set_expire_callback<F>(&self, callback: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.meta.write().expire_callbacks.set(Arc::new(callback));
    }

    /// Appends `callback` to the expire callbacks.
    pub fn add_expire_callback<F>(&self, callback: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.meta.write().expire_callbacks.add(Arc::new(callback));
    }

    /// Removes every expire callback.
    pub fn clear_expire_callbacks(&self) {
        self.meta.write().expire_callbacks.clear();
    }

    /// Invokes the expire callbacks with the item's key.
    ///
    /// The list is copied under the read lock and run after it is released.
    pub(crate) fn fire_expire_callbacks(&self) {
        let callbacks = self.meta.read().expire_callbacks.snapshot();
        for callback in callbacks {
            callback(&self.key);
        }
    }

    /// Marks the item as being removed from its table.
    ///
    /// Returns `true` for exactly one caller; every later call returns `false`.
    pub(crate) fn claim_removal(&self) -> bool {
        self.removing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true once a deleter has claimed the item.
    pub(crate) fn is_removing(&self) -> bool {
        self.removing.load(Ordering::Acquire)
    }

    /// Splits a loader-built item into the parts a table re-inserts.
    pub(crate) fn into_parts(self) -> (Duration, V) {
        (self.life_span, self.data)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheItem<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta.read();
        f.debug_struct("CacheItem")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("life_span", &self.life_span)
            .field("created_on", &self.created_on)
            .field("accessed_on", &meta.accessed_on)
            .field("access_count", &meta.access_count)
            .field("expire_callbacks", &meta.expire_callbacks)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread::{self, sleep};

    #[test]
    fn test_item_creation() {
        let item = CacheItem::new("key", Duration::from_secs(5), "value");

        assert_eq!(*item.key(), "key");
        assert_eq!(*item.data(), "value");
        assert_eq!(item.life_span(), Duration::from_secs(5));
        assert_eq!(item.access_count(), 0);
        assert_eq!(item.accessed_on(), item.created_on());
    }

    #[test]
    fn test_keep_alive_updates_bookkeeping() {
        let item = CacheItem::new(1u32, Duration::from_secs(5), ());
        let created = item.created_on();

        sleep(Duration::from_millis(5));
        item.keep_alive();
        item.keep_alive();

        assert_eq!(item.access_count(), 2);
        assert!(item.accessed_on() > created);
        assert_eq!(item.created_on(), created);
    }

    #[test]
    fn test_remaining_at() {
        let item = CacheItem::new("k", Duration::from_millis(100), ());
        let start = item.accessed_on();

        assert_eq!(item.remaining_at(start), Some(Duration::from_millis(100)));
        assert_eq!(
            item.remaining_at(start + Duration::from_millis(40)),
            Some(Duration::from_millis(60))
        );
        assert_eq!(
            item.remaining_at(start + Duration::from_millis(100)),
            Some(Duration::ZERO)
        );
        assert_eq!(
            item.remaining_at(start + Duration::from_secs(10)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_remaining_at_immortal() {
        let item = CacheItem::new("k", Duration::ZERO, ());
        assert!(item.remaining_at(Instant::now() + Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn test_expire_callbacks_add_set_clear() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let item = CacheItem::new("key", Duration::ZERO, ());

        let first = Arc::clone(&seen);
        item.add_expire_callback(move |k| first.lock().unwrap().push(format!("a:{k}")));
        let second = Arc::clone(&seen);
        item.add_expire_callback(move |k| second.lock().unwrap().push(format!("b:{k}")));
        item.fire_expire_callbacks();
        assert_eq!(*seen.lock().unwrap(), vec!["a:key", "b:key"]);

        seen.lock().unwrap().clear();
        let replaced = Arc::clone(&seen);
        item.set_expire_callback(move |k| replaced.lock().unwrap().push(format!("c:{k}")));
        item.fire_expire_callbacks();
        assert_eq!(*seen.lock().unwrap(), vec!["c:key"]);

        seen.lock().unwrap().clear();
        item.clear_expire_callbacks();
        item.fire_expire_callbacks();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_expire_callback_may_touch_its_item() {
        let item = Arc::new(CacheItem::new("key", Duration::from_secs(1), ()));
        let inner = Arc::clone(&item);
        item.set_expire_callback(move |_| inner.keep_alive());

        item.fire_expire_callbacks();

        assert_eq!(item.access_count(), 1);
    }

    #[test]
    fn test_concurrent_keep_alive() {
        let item = Arc::new(CacheItem::new("key", Duration::from_secs(1), ()));
        let fired = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let item = Arc::clone(&item);
                let fired = Arc::clone(&fired);
                thread::spawn(move || {
                    for _ in 0..100 {
                        item.keep_alive();
                        fired.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(item.access_count(), 800);
        assert_eq!(fired.load(Ordering::Relaxed), 800);
    }

    #[test]
    fn test_claim_removal_succeeds_once() {
        let item = Arc::new(CacheItem::new("key", Duration::ZERO, ()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let item = Arc::clone(&item);
                thread::spawn(move || item.claim_removal())
            })
            .collect();
        let claimed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(claimed, 1);
        assert!(!item.claim_removal());
    }

    #[test]
    fn test_into_parts() {
        let item = CacheItem::new("key", Duration::from_secs(3), String::from("v"));
        let (life_span, data) = item.into_parts();
        assert_eq!(life_span, Duration::from_secs(3));
        assert_eq!(data, "v");
    }
}
