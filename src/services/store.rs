// src/services/store.rs
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::cache::{CacheContents, SnapshotCache};
use super::macro_data::{apply_quick_quotes, QuickQuote};
use super::sources::{FundPage, FundPageSource};
use super::throttle::{FetchThrottle, RequestClass};
use crate::error::FetchError;
use crate::models::{Allocation, MacroSnapshot};

pub const DAILY_NOT_AVAILABLE: &str = "N/A";
pub const DAILY_FETCH_ERROR: &str = "Error";

/// Marks a batch fetch as running; cleared when dropped.
#[derive(Debug)]
pub struct BatchGuard {
    running: Arc<AtomicBool>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub requested: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub cancelled: bool,
}

/// In-memory fund and macro data, backed by the day snapshot on disk.
pub struct FundStore {
    cache: SnapshotCache,
    data: RwLock<CacheContents>,
    pages: Arc<dyn FundPageSource>,
    throttle: Arc<FetchThrottle>,
    save_every: usize,
    batch_running: Arc<AtomicBool>,
}

impl FundStore {
    /// Start from today's snapshot, if there is one.
    pub fn open(
        cache: SnapshotCache,
        pages: Arc<dyn FundPageSource>,
        throttle: Arc<FetchThrottle>,
        save_every: usize,
    ) -> Self {
        let contents = cache.load();
        FundStore {
            cache,
            data: RwLock::new(contents),
            pages,
            throttle,
            save_every: save_every.max(1),
            batch_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn allocation(&self, code: &str) -> Option<Allocation> {
        self.data.read().await.allocations.get(code).cloned()
    }

    pub async fn allocations(&self) -> HashMap<String, Allocation> {
        self.data.read().await.allocations.clone()
    }

    pub async fn daily_returns(&self) -> HashMap<String, String> {
        self.data.read().await.daily_returns.clone()
    }

    pub async fn macro_data(&self) -> MacroSnapshot {
        self.data.read().await.macro_data.clone()
    }

    pub async fn set_macro_data(&self, snapshot: MacroSnapshot) {
        self.data.write().await.macro_data = snapshot;
    }

    /// Apply quick quotes to the snapshot held now, not to a copy taken
    /// before the quotes were fetched.
    pub async fn apply_quick_quotes(&self, quotes: &[QuickQuote]) -> usize {
        apply_quick_quotes(&mut self.data.write().await.macro_data, quotes)
    }

    /// Write the current state to disk. A failed write is logged by the
    /// cache and the in-memory state stays authoritative.
    pub async fn persist(&self) {
        let data = self.data.read().await;
        if let Err(e) = self.cache.save(&data) {
            debug!("Continuing without a saved snapshot: {}", e);
        }
    }

    /// Allocation and daily return for one fund. A cached allocation is
    /// served without contacting the provider.
    pub async fn fetch_fund(&self, code: &str) -> Result<FundPage, FetchError> {
        {
            let data = self.data.read().await;
            if let Some(allocation) = data.allocations.get(code).filter(|a| !a.is_empty()) {
                return Ok(FundPage {
                    allocation: allocation.clone(),
                    daily_return: data.daily_returns.get(code).cloned(),
                });
            }
        }

        self.throttle.await_turn(RequestClass::Single).await;
        let page = self.pages.fetch_fund_page(code).await?;

        {
            let mut data = self.data.write().await;
            if !page.allocation.is_empty() {
                data.allocations.insert(code.to_string(), page.allocation.clone());
            }
            if let Some(daily) = &page.daily_return {
                data.daily_returns.insert(code.to_string(), daily.clone());
            }
        }
        self.persist().await;

        Ok(page)
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::SeqCst)
    }

    /// Claim the batch slot. `None` while another batch holds it.
    pub fn try_begin_batch(&self) -> Option<BatchGuard> {
        self.batch_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BatchGuard {
                running: Arc::clone(&self.batch_running),
            })
    }

    /// Fetch daily returns (and allocations) for every code not cached yet.
    ///
    /// `cancel` is checked before each code. Results gathered so far are
    /// saved every `save_every` codes, on cancellation and at the end.
    pub async fn batch_fetch(&self, guard: BatchGuard, codes: &[String], cancel: &AtomicBool) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            requested: codes.len(),
            ..BatchOutcome::default()
        };
        info!("Batch fetch started for {} funds", codes.len());

        for (i, code) in codes.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                info!("Batch fetch cancelled after {} of {} funds", i, codes.len());
                outcome.cancelled = true;
                break;
            }

            if self.data.read().await.daily_returns.contains_key(code) {
                outcome.skipped += 1;
                continue;
            }

            self.throttle.await_turn(RequestClass::Batch).await;
            let result = self.pages.fetch_fund_page(code).await;

            {
                let mut data = self.data.write().await;
                match result {
                    Ok(page) => {
                        let daily = page.daily_return.unwrap_or_else(|| DAILY_NOT_AVAILABLE.to_string());
                        data.daily_returns.insert(code.clone(), daily);
                        if !page.allocation.is_empty() {
                            data.allocations.insert(code.clone(), page.allocation);
                        }
                        outcome.fetched += 1;
                    }
                    Err(e) => {
                        if e.is_blocked() {
                            error!("Fund provider refused {}: {}", code, e);
                        } else {
                            warn!("Failed to fetch fund {}: {}", code, e);
                        }
                        data.daily_returns.insert(code.clone(), DAILY_FETCH_ERROR.to_string());
                        outcome.failed.push(code.clone());
                    }
                }
            }

            if (i + 1) % self.save_every == 0 {
                self.persist().await;
            }
        }

        self.persist().await;
        drop(guard);

        info!(
            "Batch fetch finished: {} fetched, {} skipped, {} failed",
            outcome.fetched,
            outcome.skipped,
            outcome.failed.len()
        );
        outcome
    }

    /// Empty every map and delete the snapshot file.
    pub async fn clear(&self) {
        *self.data.write().await = CacheContents::default();
        if let Err(e) = self.cache.clear() {
            error!("Failed to remove cache file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationEntry;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FakePages {
        calls: Mutex<Vec<String>>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl FakePages {
        fn new() -> Arc<Self> {
            Arc::new(FakePages { calls: Mutex::new(Vec::new()), cancel_after: None })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FundPageSource for FakePages {
        async fn fetch_fund_page(&self, code: &str) -> Result<FundPage, FetchError> {
            let count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(code.to_string());
                calls.len()
            };
            if let Some((n, flag)) = &self.cancel_after {
                if count >= *n {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            match code {
                "BAD" => Err(FetchError::Status { status: 500, url: code.to_string() }),
                "NODAILY" => Ok(FundPage::default()),
                _ => {
                    let mut allocation = Allocation::new();
                    allocation.insert("Hisse Senedi".to_string(), AllocationEntry { percentage: 90.0, color: None });
                    Ok(FundPage { allocation, daily_return: Some("%0,45".to_string()) })
                }
            }
        }
    }

    fn store(dir: &TempDir, pages: Arc<FakePages>, save_every: usize) -> FundStore {
        let cache = SnapshotCache::new(dir.path().join("cache.json"), chrono_tz::Europe::Istanbul);
        let throttle = Arc::new(FetchThrottle::new(Duration::ZERO, Duration::ZERO));
        FundStore::open(cache, pages, throttle, save_every)
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_fund_serves_cached_allocation() {
        let dir = TempDir::new().unwrap();
        let pages = FakePages::new();
        let store = store(&dir, pages.clone(), 20);

        let first = store.fetch_fund("AFA").await.unwrap();
        assert_eq!(first.daily_return.as_deref(), Some("%0,45"));
        let second = store.fetch_fund("AFA").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(pages.calls(), vec!["AFA"]);

        // persisted on the way
        let reloaded = SnapshotCache::new(dir.path().join("cache.json"), chrono_tz::Europe::Istanbul).load();
        assert!(reloaded.allocations.contains_key("AFA"));
    }

    #[tokio::test]
    async fn test_batch_marks_missing_and_failed() {
        let dir = TempDir::new().unwrap();
        let pages = FakePages::new();
        let store = store(&dir, pages.clone(), 2);

        let guard = store.try_begin_batch().unwrap();
        let cancel = AtomicBool::new(false);
        let outcome = store.batch_fetch(guard, &codes(&["AFA", "BAD", "NODAILY"]), &cancel).await;

        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.failed, vec!["BAD"]);
        let daily = store.daily_returns().await;
        assert_eq!(daily["AFA"], "%0,45");
        assert_eq!(daily["BAD"], DAILY_FETCH_ERROR);
        assert_eq!(daily["NODAILY"], DAILY_NOT_AVAILABLE);
        assert!(store.allocation("NODAILY").await.is_none());
        assert!(!store.is_batch_running());
    }

    #[tokio::test]
    async fn test_batch_skips_cached_codes() {
        let dir = TempDir::new().unwrap();
        let pages = FakePages::new();
        let store = store(&dir, pages.clone(), 20);

        let cancel = AtomicBool::new(false);
        let guard = store.try_begin_batch().unwrap();
        store.batch_fetch(guard, &codes(&["AFA"]), &cancel).await;
        let guard = store.try_begin_batch().unwrap();
        let outcome = store.batch_fetch(guard, &codes(&["AFA", "TCD"]), &cancel).await;

        assert_eq!(outcome.skipped, 1);
        assert_eq!(pages.calls(), vec!["AFA", "TCD"]);
    }

    #[tokio::test]
    async fn test_only_one_batch_at_a_time() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FakePages::new(), 20);

        let guard = store.try_begin_batch();
        assert!(guard.is_some());
        assert!(store.try_begin_batch().is_none());
        drop(guard);
        assert!(store.try_begin_batch().is_some());
    }

    #[tokio::test]
    async fn test_cancel_persists_partial_results() {
        let dir = TempDir::new().unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let pages = Arc::new(FakePages {
            calls: Mutex::new(Vec::new()),
            cancel_after: Some((2, Arc::clone(&cancel))),
        });
        let store = store(&dir, pages.clone(), 50);

        let guard = store.try_begin_batch().unwrap();
        let outcome = store.batch_fetch(guard, &codes(&["A1", "A2", "A3", "A4"]), &cancel).await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.fetched, 2);
        let reloaded = SnapshotCache::new(dir.path().join("cache.json"), chrono_tz::Europe::Istanbul).load();
        assert_eq!(reloaded.daily_returns.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_memory_and_disk() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FakePages::new(), 20);
        store.fetch_fund("AFA").await.unwrap();
        assert!(dir.path().join("cache.json").exists());

        store.clear().await;
        assert!(store.allocation("AFA").await.is_none());
        assert!(!dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_cache_keeps_memory() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("missing").join("cache.json"), chrono_tz::Europe::Istanbul);
        let throttle = Arc::new(FetchThrottle::new(Duration::ZERO, Duration::ZERO));
        let store = FundStore::open(cache, FakePages::new(), throttle, 20);

        let page = store.fetch_fund("AFA").await.unwrap();
        assert_eq!(page.daily_return.as_deref(), Some("%0,45"));
        assert!(store.allocation("AFA").await.is_some());
        assert!(!dir.path().join("missing").exists());
    }
}
