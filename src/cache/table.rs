//! Cache Table Module
//!
//! Main cache engine: a named map of items with table-level hooks and a
//! self-adjusting expiration timer.
//!
//! # Locking
//! The table lock guards the item map, the hook lists and the timer state.
//! Each item carries its own lock for access bookkeeping. Hooks are always
//! invoked with the table lock released: the needed state is copied out under
//! the lock, the lock is dropped, the hooks run, and the lock is taken again
//! only if the map still has to change. A hook may therefore call back into
//! the table, but must not assume the table is unchanged since it was fired.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, trace};

use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheItem, CacheStats, CallbackList};
use crate::error::{CacheError, Result};
use crate::tasks::{sweep_handle, ExpirationTimer};

/// Hook invoked with an item when it is added to, or about to leave, a table.
pub type ItemCallback<K, V> = dyn Fn(&Arc<CacheItem<K, V>>) + Send + Sync;

/// Hook that synthesizes an item for a missing key.
///
/// Receives the requested key and the extra arguments passed to
/// [`CacheTable::value_with`]. Returning `None` declines the load.
pub type DataLoader<K, V> = dyn Fn(&K, &[&dyn Any]) -> Option<CacheItem<K, V>> + Send + Sync;

/// Shortest delay a sweep is ever scheduled for.
const MIN_SWEEP_DELAY: Duration = Duration::from_millis(1);

/// Scan passes one sweep may run before it yields to the timer.
const MAX_SWEEP_PASSES: usize = 16;

// == Table State ==
/// Everything guarded by the table lock.
struct TableState<K, V> {
    items: HashMap<K, Arc<CacheItem<K, V>>>,
    timer: ExpirationTimer,
    data_loader: Option<Arc<DataLoader<K, V>>>,
    added_item: CallbackList<ItemCallback<K, V>>,
    about_to_delete: CallbackList<ItemCallback<K, V>>,
}

// == Cache Table ==
/// A named cache of items expiring after a per-item idle period.
///
/// Tables are always shared through an `Arc`; the expiration timer only holds
/// a weak reference, so dropping the last handle stops the table's sweeps.
pub struct CacheTable<K, V> {
    name: String,
    state: RwLock<TableState<K, V>>,
    stats: StatsRecorder,
    this: Weak<Self>,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty table.
    ///
    /// Expiration timers run on the crate's shared sweep runtime, so the table
    /// keeps expiring items regardless of which runtime, if any, created it.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_runtime(name, sweep_handle())
    }

    fn with_runtime(
        name: impl Into<String>,
        runtime: Option<tokio::runtime::Handle>,
    ) -> Arc<Self> {
        let name = name.into();
        debug!(table = %name, "Creating cache table");

        Arc::new_cyclic(|this| Self {
            name,
            state: RwLock::new(TableState {
                items: HashMap::new(),
                timer: ExpirationTimer::new(runtime),
                data_loader: None,
                added_item: CallbackList::new(),
                about_to_delete: CallbackList::new(),
            }),
            stats: StatsRecorder::default(),
            this: this.clone(),
        })
    }

    /// Returns the table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many items are currently stored.
    pub fn count(&self) -> usize {
        self.state.read().items.len()
    }

    /// Returns true if the table holds no items.
    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    /// Returns the keys currently stored, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.state.read().items.keys().cloned().collect()
    }

    /// Returns the interval the pending sweep was scheduled for, or
    /// `Duration::ZERO` if no sweep is scheduled.
    pub fn cleanup_interval(&self) -> Duration {
        self.state.read().timer.interval()
    }

    // == Stats ==
    /// Returns a snapshot of the table's activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.count())
    }

    // == For Each ==
    /// Calls `visit` for every stored item.
    ///
    /// The table's read lock is held for the whole traversal: `visit` must not
    /// call back into this table.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &Arc<CacheItem<K, V>>),
    {
        let state = self.state.read();
        for (key, item) in &state.items {
            visit(key, item);
        }
    }

    // == Hook Registration ==
    /// Configures the loader consulted when a looked-up key is missing.
    pub fn set_data_loader<F>(&self, loader: F)
    where
        F: Fn(&K, &[&dyn Any]) -> Option<CacheItem<K, V>> + Send + Sync + 'static,
    {
        self.state.write().data_loader = Some(Arc::new(loader));
    }

    /// Replaces all added-item callbacks with `callback`.
    pub fn set_added_item_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    {
        self.state.write().added_item.set(Arc::new(callback));
    }

    /// Appends `callback` to the added-item callbacks.
    pub fn add_added_item_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    {
        self.state.write().added_item.add(Arc::new(callback));
    }

    /// Removes every added-item callback.
    pub fn remove_added_item_callbacks(&self) {
        self.state.write().added_item.clear();
    }

    /// Replaces all about-to-delete callbacks with `callback`.
    pub fn set_about_to_delete_item_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    {
        self.state.write().about_to_delete.set(Arc::new(callback));
    }

    /// Appends `callback` to the about-to-delete callbacks.
    pub fn add_about_to_delete_item_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    {
        self.state.write().about_to_delete.add(Arc::new(callback));
    }

    /// Removes every about-to-delete callback.
    pub fn remove_about_to_delete_item_callbacks(&self) {
        self.state.write().about_to_delete.clear();
    }

    // == Add ==
    /// Stores `data` under `key`, replacing any existing item.
    ///
    /// Added-item callbacks run after the insert, without the table lock.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `life_span` - Idle period after which the item expires;
    ///   `Duration::ZERO` keeps it until deleted or flushed
    /// * `data` - The value to store
    pub fn add(&self, key: K, life_span: Duration, data: V) -> Arc<CacheItem<K, V>> {
        let item = Arc::new(CacheItem::new(key, life_span, data));
        let state = self.state.write();
        self.add_internal(state, Arc::clone(&item));
        item
    }

    // == Not Found Add ==
    /// Stores `data` under `key` only if the key is absent.
    ///
    /// The absence check and the insert happen under one lock acquisition.
    ///
    /// # Returns
    /// `true` if the item was inserted.
    pub fn not_found_add(&self, key: K, life_span: Duration, data: V) -> bool {
        let state = self.state.write();
        if state.items.contains_key(&key) {
            return false;
        }

        let item = Arc::new(CacheItem::new(key, life_span, data));
        self.add_internal(state, item);
        true
    }

    /// Inserts `item` and releases `state` before running callbacks.
    fn add_internal(
        &self,
        mut state: RwLockWriteGuard<'_, TableState<K, V>>,
        item: Arc<CacheItem<K, V>>,
    ) {
        debug!(
            table = %self.name,
            life_span = ?item.life_span(),
            "Adding item"
        );
        state.items.insert(item.key().clone(), Arc::clone(&item));
        let callbacks = state.added_item.snapshot();
        drop(state);

        for callback in callbacks {
            callback(&item);
        }

        let life_span = item.life_span();
        if life_span.is_zero() {
            return;
        }

        // Pull the next sweep forward if this item is due before it
        let mut state = self.state.write();
        let interval = state.timer.interval();
        if interval.is_zero() || life_span < interval {
            let delay = state
                .timer
                .remaining(Instant::now())
                .map_or(life_span, |left| left.min(life_span));
            self.arm_sweep(&mut state, delay);
        }
    }

    // == Delete ==
    /// Removes the item stored under `key`.
    ///
    /// Table about-to-delete callbacks run first, then the item's expire
    /// callbacks, both without the table lock; the entry is removed afterwards.
    ///
    /// # Errors
    /// `CacheError::KeyNotFound` if the key is not stored.
    pub fn delete(&self, key: &K) -> Result<Arc<CacheItem<K, V>>> {
        let item = self.delete_internal(key, None)?;
        self.stats.record_deletion();
        Ok(item)
    }

    /// Runs the delete protocol for `key`.
    ///
    /// With `expected` set, only that exact item is deleted. Each item is
    /// claimed by a single deleter; concurrent deleters of the same item get
    /// `KeyNotFound` and fire nothing. The map entry is dropped only if it
    /// still refers to the item the callbacks saw, so an item re-added under
    /// the same key while callbacks ran is kept.
    fn delete_internal(
        &self,
        key: &K,
        expected: Option<&Arc<CacheItem<K, V>>>,
    ) -> Result<Arc<CacheItem<K, V>>> {
        let (item, callbacks) = {
            let state = self.state.read();
            let item = state.items.get(key).ok_or(CacheError::KeyNotFound)?;
            if expected.is_some_and(|expected| !Arc::ptr_eq(item, expected)) {
                return Err(CacheError::KeyNotFound);
            }
            if !item.claim_removal() {
                return Err(CacheError::KeyNotFound);
            }
            (Arc::clone(item), state.about_to_delete.snapshot())
        };

        for callback in callbacks {
            callback(&item);
        }
        item.fire_expire_callbacks();

        let mut state = self.state.write();
        if state
            .items
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &item))
        {
            state.items.remove(key);
        }
        debug!(
            table = %self.name,
            age = ?item.created_on().elapsed(),
            hits = item.access_count(),
            "Deleted item"
        );

        Ok(item)
    }

    // == Exists ==
    /// Returns true if `key` is stored.
    ///
    /// Neither keeps the item alive nor consults the data loader.
    pub fn exists(&self, key: &K) -> bool {
        self.state.read().items.contains_key(key)
    }

    // == Value ==
    /// Looks up `key`, keeping the item alive on a hit.
    ///
    /// On a miss the data loader, if configured, is asked for the item.
    ///
    /// # Errors
    /// - `CacheError::KeyNotFound` if the key is missing and there is no loader
    /// - `CacheError::KeyNotFoundOrNotLoadable` if the loader declined
    pub fn value(&self, key: &K) -> Result<Arc<CacheItem<K, V>>> {
        self.value_with(key, &[])
    }

    /// Looks up `key`, passing `args` to the data loader on a miss.
    ///
    /// A loaded item is stored with the life span and data the loader chose
    /// and the stored item is returned.
    pub fn value_with(&self, key: &K, args: &[&dyn Any]) -> Result<Arc<CacheItem<K, V>>> {
        let (found, loader) = {
            let state = self.state.read();
            (state.items.get(key).cloned(), state.data_loader.clone())
        };

        if let Some(item) = found {
            item.keep_alive();
            self.stats.record_hit();
            return Ok(item);
        }
        self.stats.record_miss();

        let Some(loader) = loader else {
            return Err(CacheError::KeyNotFound);
        };

        match loader(key, args) {
            Some(loaded) => {
                let (life_span, data) = loaded.into_parts();
                self.stats.record_load();
                Ok(self.add(key.clone(), life_span, data))
            }
            None => Err(CacheError::KeyNotFoundOrNotLoadable),
        }
    }

    // == Flush ==
    /// Drops every item and cancels the pending sweep.
    ///
    /// No about-to-delete or expire callbacks are invoked.
    pub fn flush(&self) {
        let mut state = self.state.write();
        debug!(table = %self.name, items = state.items.len(), "Flushing table");

        state.items = HashMap::new();
        state.timer.cancel();
    }

    // == Most Accessed ==
    /// Returns up to `count` items ordered by descending access count.
    ///
    /// Items with equal counts come back in no particular order.
    pub fn most_accessed(&self, count: usize) -> Vec<Arc<CacheItem<K, V>>> {
        let state = self.state.read();

        let mut ranked: Vec<(u64, &Arc<CacheItem<K, V>>)> = state
            .items
            .values()
            .map(|item| (item.access_count(), item))
            .collect();
        ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        ranked
            .into_iter()
            .take(count)
            .map(|(_, item)| Arc::clone(item))
            .collect()
    }

    // == Expiration Check ==
    /// Runs one expiration sweep and schedules the next one.
    ///
    /// Each pass scans all items under the table lock. Expired items are
    /// deleted through the regular delete protocol once the lock is released,
    /// then the scan repeats. The pass that finds nothing expired arms the
    /// timer for the shortest remaining life span while still holding the
    /// lock. After `MAX_SWEEP_PASSES` passes the remaining work is left to a
    /// sweep scheduled `MIN_SWEEP_DELAY` later.
    pub(crate) fn expiration_check(&self) {
        let mut first_pass = true;
        let mut passes = 0;

        loop {
            let expired = {
                let mut state = self.state.write();
                if first_pass {
                    let interval = state.timer.interval();
                    if interval.is_zero() {
                        debug!(table = %self.name, "Expiration check installed");
                    } else {
                        debug!(table = %self.name, ?interval, "Expiration check triggered");
                    }
                    first_pass = false;
                }
                state.timer.cancel();

                let now = Instant::now();
                let mut smallest: Option<Duration> = None;
                let mut expired = Vec::new();
                for (key, item) in &state.items {
                    // Already on its way out through another delete
                    if item.is_removing() {
                        continue;
                    }
                    match item.remaining_at(now) {
                        None => {}
                        Some(left) if left.is_zero() => {
                            expired.push((key.clone(), Arc::clone(item)));
                        }
                        Some(left) => {
                            smallest = Some(smallest.map_or(left, |s| s.min(left)));
                        }
                    }
                }

                if expired.is_empty() {
                    match smallest {
                        Some(delay) => self.arm_sweep(&mut state, delay),
                        None => trace!(table = %self.name, "No mortal items left"),
                    }
                    return;
                }

                passes += 1;
                if passes > MAX_SWEEP_PASSES {
                    debug!(
                        table = %self.name,
                        pending = expired.len(),
                        "Sweep pass limit reached, deferring"
                    );
                    self.arm_sweep(&mut state, MIN_SWEEP_DELAY);
                    return;
                }
                expired
            };

            info!(table = %self.name, count = expired.len(), "Expiring items");
            for (key, item) in expired {
                if self.delete_internal(&key, Some(&item)).is_ok() {
                    self.stats.record_expiration();
                }
            }
        }
    }

    /// Replaces the pending sweep with one firing after `delay`.
    fn arm_sweep(&self, state: &mut TableState<K, V>, delay: Duration) {
        let delay = delay.max(MIN_SWEEP_DELAY);
        let table = self.this.clone();

        let armed = state.timer.arm(delay, move || {
            if let Some(table) = table.upgrade() {
                table.expiration_check();
            }
        });
        if armed {
            trace!(table = %self.name, ?delay, "Next expiration check scheduled");
        } else {
            debug!(table = %self.name, "No runtime available, expiration check skipped");
        }
    }
}

impl<K, V> fmt::Debug for CacheTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheTable")
            .field("name", &self.name)
            .field("items", &state.items.len())
            .field("cleanup_interval", &state.timer.interval())
            .field("added_item", &state.added_item)
            .field("about_to_delete", &state.about_to_delete)
            .finish()
    }
}
