//! In-memory cache of rendered gallery thumbnails.
//!
//! Thumbnails are stitched from pyramid tiles on first request and kept in
//! an LRU cache, so the served artwork tree is never written to.
//!
//! # Cache Key
//!
//! - Artwork slug
//! - Thumbnail edge length
//! - Modification time of the artwork's descriptor
//!
//! Reconverting an artwork rewrites its descriptor, which changes the key and
//! leaves the stale entry to age out.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

/// Cache key for a rendered thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub slug: Arc<str>,
    pub size: u32,
    pub modified: Option<SystemTime>,
}

impl ThumbnailKey {
    pub fn new(slug: impl Into<Arc<str>>, size: u32, modified: Option<SystemTime>) -> Self {
        Self {
            slug: slug.into(),
            size,
            modified,
        }
    }
}

/// LRU cache of encoded thumbnails, bounded by entry count.
///
/// Thread-safe; share it across handlers via `Arc`.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use gigazoom::server::{ThumbnailCache, ThumbnailKey};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = ThumbnailCache::new(16);
///     let key = ThumbnailKey::new("starry-night", 200, None);
///
///     cache.put(key.clone(), Bytes::from_static(&[0xFF, 0xD8])).await;
///     assert_eq!(cache.get(&key).await, Some(Bytes::from_static(&[0xFF, 0xD8])));
/// }
/// ```
pub struct ThumbnailCache {
    cache: Mutex<LruCache<ThumbnailKey, Bytes>>,
}

impl ThumbnailCache {
    /// Create a cache holding at most `capacity` thumbnails (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a thumbnail, marking it as recently used.
    pub async fn get(&self, key: &ThumbnailKey) -> Option<Bytes> {
        self.cache.lock().await.get(key).cloned()
    }

    /// Store a thumbnail, evicting the least recently used one when full.
    pub async fn put(&self, key: ThumbnailKey, data: Bytes) {
        self.cache.lock().await.put(key, data);
    }

    /// Number of cached thumbnails.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    /// Drop every cached thumbnail.
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}
