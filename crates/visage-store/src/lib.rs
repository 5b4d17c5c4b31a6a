//! Bounded, content-addressed cache of extracted face sessions.
//!
//! Extraction is the expensive step (detection plus several network passes),
//! so the store guarantees at most one extraction per distinct image content:
//! the first caller for a new content hash installs a broadcast channel in
//! the in-flight registry and spawns the extraction as a detached task;
//! concurrent callers for the same hash subscribe to the same channel. The
//! registry entry is removed when the task finishes — success or failure —
//! so a failed extraction can be retried by a later upload.
//!
//! Sessions are content-keyed: re-uploading identical bytes returns the
//! existing session rather than minting a new one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use visage_core::bundle::{ContentHash, FaceFeatures, FeatureBundle};
use visage_core::errors::VisageError;
use visage_core::ids::SessionId;

/// Default session capacity, matching the reference deployment.
pub const DEFAULT_CAPACITY: usize = 256;

/// Produces the expensive per-image feature extraction on a cache miss.
#[async_trait]
pub trait BundleSource: Send + Sync + 'static {
    async fn extract(&self, bytes: Bytes) -> Result<FaceFeatures, VisageError>;
}

type ExtractionResult = Result<Arc<FeatureBundle>, VisageError>;

struct Entry {
    bundle: Arc<FeatureBundle>,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SessionId, Entry>,
    by_hash: HashMap<ContentHash, SessionId>,
    in_flight: HashMap<ContentHash, broadcast::Sender<ExtractionResult>>,
    /// Monotonic recency counter; bumped on every touch.
    tick: u64,
}

impl Inner {
    fn touch_by_hash(&mut self, hash: &ContentHash) -> Option<Arc<FeatureBundle>> {
        let id = self.by_hash.get(hash)?.clone();
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(&id)?;
        entry.last_used = tick;
        Some(Arc::clone(&entry.bundle))
    }

    fn evict_over_capacity(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.by_hash.remove(&entry.bundle.content_hash);
                tracing::debug!(session_id = %oldest, "evicted least-recently-used session");
            }
        }
    }
}

/// Bounded LRU cache of `FeatureBundle`s, keyed by session id with a content
/// hash index for dedup. All mutation goes through one mutex, so eviction and
/// insertion cannot interleave; bundles themselves are immutable.
pub struct SessionStore {
    inner: Mutex<Inner>,
    source: Arc<dyn BundleSource>,
    capacity: usize,
}

enum IngestPath {
    Cached(Arc<FeatureBundle>),
    Wait(broadcast::Receiver<ExtractionResult>),
    Lead(broadcast::Receiver<ExtractionResult>),
}

impl SessionStore {
    pub fn new(capacity: usize, source: Arc<dyn BundleSource>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            source,
            capacity: capacity.max(1),
        }
    }

    /// Resolve raw image bytes to a cached or freshly extracted bundle.
    ///
    /// Identical bytes always converge on one extraction and one session,
    /// even under concurrent callers.
    pub async fn ingest(self: &Arc<Self>, bytes: Bytes) -> ExtractionResult {
        let hash = ContentHash::of(&bytes);

        let path = {
            let mut inner = self.inner.lock();
            if let Some(bundle) = inner.touch_by_hash(&hash) {
                IngestPath::Cached(bundle)
            } else if let Some(tx) = inner.in_flight.get(&hash) {
                IngestPath::Wait(tx.subscribe())
            } else {
                let (tx, rx) = broadcast::channel(1);
                inner.in_flight.insert(hash.clone(), tx);
                IngestPath::Lead(rx)
            }
        };

        let mut rx = match path {
            IngestPath::Cached(bundle) => return Ok(bundle),
            IngestPath::Wait(rx) => rx,
            IngestPath::Lead(rx) => {
                self.spawn_extraction(hash, bytes);
                rx
            }
        };

        rx.recv().await.unwrap_or_else(|_| {
            Err(VisageError::ModelInference(
                "extraction task dropped its result".into(),
            ))
        })
    }

    /// Fetch a bundle by session id, refreshing its recency.
    pub fn lookup(&self, id: &SessionId) -> ExtractionResult {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(id) {
            Some(entry) => {
                entry.last_used = tick;
                Ok(Arc::clone(&entry.bundle))
            }
            None => Err(VisageError::SessionNotFound(id.to_string())),
        }
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the extraction detached from any caller: a waiter disconnecting
    /// must not cancel work whose result other connections (or a reconnect)
    /// can still use.
    fn spawn_extraction(self: &Arc<Self>, hash: ContentHash, bytes: Bytes) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let result = store.source.extract(bytes).await;

            let mut inner = store.inner.lock();
            let tx = inner.in_flight.remove(&hash);
            let outcome = match result {
                Ok(features) => {
                    let id = SessionId::new();
                    let bundle = Arc::new(FeatureBundle::new(id.clone(), hash.clone(), features));
                    inner.tick += 1;
                    let tick = inner.tick;
                    inner.entries.insert(
                        id.clone(),
                        Entry {
                            bundle: Arc::clone(&bundle),
                            last_used: tick,
                        },
                    );
                    inner.by_hash.insert(hash, id.clone());
                    inner.evict_over_capacity(store.capacity);
                    tracing::debug!(session_id = %id, total = inner.entries.len(), "session cached");
                    Ok(bundle)
                }
                Err(e) => {
                    tracing::debug!(kind = e.error_kind(), "extraction failed");
                    Err(e)
                }
            };

            if let Some(tx) = tx {
                // Nobody left waiting is fine; the cache entry (on success)
                // still serves the next upload.
                let _ = tx.send(outcome);
            }
        });
    }
}
