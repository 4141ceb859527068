//! Lazy diff fetcher with per-key single flight.
//!
//! At most one diff-tool invocation is outstanding per `(config, pre, post)`;
//! concurrent requests for the same key wait on the same slot. Unusable output
//! degrades to an empty [`DiffResult`] instead of an error.

use super::{DiffResult, DiffTool};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DiffKey {
    pub config: String,
    pub pre: u64,
    pub post: u64,
}

impl DiffKey {
    pub fn new(config: impl Into<String>, pre: u64, post: u64) -> Self {
        Self {
            config: config.into(),
            pre,
            post,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchStatus {
    Complete,
    /// The tool answered with something that is not a diff report
    Malformed,
    /// The tool could not be run or exited with an error
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedDiff {
    pub result: DiffResult,
    pub status: FetchStatus,
    pub fetched_at: DateTime<Utc>,
}

type Slot = Arc<OnceCell<Arc<CachedDiff>>>;

fn in_flight(slot: &Slot) -> bool {
    !slot.initialized()
}

pub struct DiffCache {
    tool: Arc<dyn DiffTool>,
    slots: DashMap<DiffKey, Slot>,
    invocations: AtomicU64,
}

impl DiffCache {
    pub fn new(tool: Arc<dyn DiffTool>) -> Self {
        Self {
            tool,
            slots: DashMap::new(),
            invocations: AtomicU64::new(0),
        }
    }

    /// Fetch the diff for `key`, reusing a cached or in-flight result.
    pub async fn get(&self, key: &DiffKey) -> Arc<CachedDiff> {
        let slot: Slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let cached = slot.get_or_init(|| self.fetch(key)).await.clone();

        // Failures are shared with whoever waited on this fetch, then
        // forgotten so the next expand tries again.
        if matches!(cached.status, FetchStatus::Failed { .. }) {
            self.slots
                .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
        }

        cached
    }

    /// The cached result for `key`, without fetching
    pub fn peek(&self, key: &DiffKey) -> Option<Arc<CachedDiff>> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }

    async fn fetch(&self, key: &DiffKey) -> Arc<CachedDiff> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        debug!("Fetching diff {}:{}..{}", key.config, key.pre, key.post);

        let (result, status) = match self.tool.diff(&key.config, key.pre, key.post).await {
            Ok(output) => match DiffResult::parse(&output) {
                Ok(result) => (result, FetchStatus::Complete),
                Err(e) => {
                    warn!(
                        "Malformed diff output for {}:{}..{}: {}",
                        key.config, key.pre, key.post, e
                    );
                    (DiffResult::default(), FetchStatus::Malformed)
                }
            },
            Err(e) => {
                warn!(
                    "Diff tool failed for {}:{}..{}: {}",
                    key.config, key.pre, key.post, e
                );
                (
                    DiffResult::default(),
                    FetchStatus::Failed {
                        message: e.to_string(),
                    },
                )
            }
        };

        Arc::new(CachedDiff {
            result,
            status,
            fetched_at: Utc::now(),
        })
    }

    /// Drop every entry of `config` whose pair is not in `pairs`.
    /// Returns how many entries were dropped.
    ///
    /// Fetches still in flight keep their slot so later callers join them;
    /// they are dropped by the first listing after they resolve.
    pub fn retain_pairs(&self, config: &str, pairs: &HashSet<(u64, u64)>) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, slot| {
            key.config != config || pairs.contains(&(key.pre, key.post)) || in_flight(slot)
        });
        before.saturating_sub(self.slots.len())
    }

    /// Drop every resolved entry of a configuration that no longer exists
    pub fn drop_config(&self, config: &str) {
        self.slots
            .retain(|key, slot| key.config != config || in_flight(slot));
    }

    pub fn evict(&self, key: &DiffKey) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Number of diff-tool invocations issued so far
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GatedDiffTool;

    const EMPTY_REPORT: &str = r#"{"packages":{"updated":[],"downgraded":[],"added":[],"removed":[]},"files":{"modified":[],"added":[],"removed":[]}}"#;
    const ONE_PACKAGE: &str = r#"{"packages":{"updated":[{"name":"bash","version_from":"1","version_to":"2"}]},"files":{}}"#;

    #[tokio::test]
    async fn test_concurrent_requests_share_one_invocation() {
        let tool = Arc::new(GatedDiffTool::gated(Ok(ONE_PACKAGE)));
        let cache = DiffCache::new(tool.clone());
        let key = DiffKey::new("root", 1, 2);

        let (a, b, _) = tokio::join!(cache.get(&key), cache.get(&key), async {
            tokio::task::yield_now().await;
            tool.release();
        });

        assert_eq!(tool.calls(), 1);
        assert_eq!(cache.invocations(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.status, FetchStatus::Complete);
        assert_eq!(a.result.packages.updated[0].name, "bash");
    }

    #[tokio::test]
    async fn test_result_is_cached() {
        let tool = Arc::new(GatedDiffTool::immediate(Ok(ONE_PACKAGE)));
        let cache = DiffCache::new(tool.clone());
        let key = DiffKey::new("root", 1, 2);

        cache.get(&key).await;
        cache.get(&key).await;
        assert_eq!(tool.calls(), 1);
        assert!(cache.peek(&key).is_some());
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let tool = Arc::new(GatedDiffTool::immediate(Ok(EMPTY_REPORT)));
        let cache = DiffCache::new(tool.clone());

        cache.get(&DiffKey::new("root", 1, 2)).await;
        cache.get(&DiffKey::new("home", 1, 2)).await;
        assert_eq!(tool.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_empty() {
        let tool = Arc::new(GatedDiffTool::immediate(Ok(r#"{"packages": {"upd"#)));
        let cache = DiffCache::new(tool.clone());
        let key = DiffKey::new("root", 3, 4);

        let cached = cache.get(&key).await;
        assert_eq!(cached.status, FetchStatus::Malformed);
        assert!(cached.result.is_empty());

        // Malformed output is kept; asking again does not re-run the tool.
        cache.get(&key).await;
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_and_is_retried_later() {
        let tool = Arc::new(GatedDiffTool::immediate(Err("permission denied")));
        let cache = DiffCache::new(tool.clone());
        let key = DiffKey::new("root", 3, 4);

        let cached = cache.get(&key).await;
        assert_eq!(
            cached.status,
            FetchStatus::Failed {
                message: "permission denied".to_string()
            }
        );
        assert!(cached.result.is_empty());
        assert!(cache.peek(&key).is_none());

        cache.get(&key).await;
        assert_eq!(tool.calls(), 2);
    }

    #[tokio::test]
    async fn test_retain_pairs_drops_stale_keys_of_that_config_only() {
        let tool = Arc::new(GatedDiffTool::immediate(Ok(EMPTY_REPORT)));
        let cache = DiffCache::new(tool);

        cache.get(&DiffKey::new("root", 1, 2)).await;
        cache.get(&DiffKey::new("root", 3, 4)).await;
        cache.get(&DiffKey::new("home", 3, 4)).await;

        let live: HashSet<(u64, u64)> = [(1, 2)].into_iter().collect();
        let dropped = cache.retain_pairs("root", &live);

        assert_eq!(dropped, 1);
        assert!(cache.peek(&DiffKey::new("root", 1, 2)).is_some());
        assert!(cache.peek(&DiffKey::new("root", 3, 4)).is_none());
        assert!(cache.peek(&DiffKey::new("home", 3, 4)).is_some());

        cache.drop_config("home");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pair_in_flight_is_joined_not_refetched() {
        let tool = Arc::new(GatedDiffTool::gated(Ok(ONE_PACKAGE)));
        let cache = Arc::new(DiffCache::new(tool.clone()));
        let key = DiffKey::new("root", 1, 5);

        let first = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.get(&key).await }
        });
        while tool.calls() == 0 {
            tokio::task::yield_now().await;
        }

        // A listing without (1, 5) lands while the fetch is outstanding.
        assert_eq!(cache.retain_pairs("root", &HashSet::new()), 0);
        cache.drop_config("root");

        let second = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.get(&key).await }
        });
        tokio::task::yield_now().await;
        tool.release();

        let (a, b) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(tool.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));

        // Once resolved, the next listing drops it.
        assert_eq!(cache.retain_pairs("root", &HashSet::new()), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_evict_forces_refetch() {
        let tool = Arc::new(GatedDiffTool::immediate(Ok(EMPTY_REPORT)));
        let cache = DiffCache::new(tool.clone());
        let key = DiffKey::new("root", 1, 2);

        cache.get(&key).await;
        assert!(cache.evict(&key));
        cache.get(&key).await;
        assert_eq!(tool.calls(), 2);
    }
}
