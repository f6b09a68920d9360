//! Resources the watchdog is allowed to reclaim
//!
//! The application registers its response caches, temporary binary buffers
//! and overlay hosts here; the watchdog's cleanup pass purges, revokes and
//! empties them. Each item is handled in its own fault boundary so one broken
//! resource cannot stop the rest of the pass.

use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A response/query cache that can be emptied on demand
pub trait Purgeable: Send + Sync {
    /// Name used in logs
    fn label(&self) -> &str;

    /// Drop every cached entry
    fn purge(&self);
}

/// A container for transient UI (tooltips, modals, toasts)
pub trait OverlayHost: Send + Sync {
    /// Name used in logs
    fn label(&self) -> &str;

    /// Whether something is currently shown
    fn has_visible_content(&self) -> bool;

    /// Drop every child, shown or not
    fn clear(&self);
}

/// Temporary binary buffer handed out to other layers (exports, previews)
///
/// Clones share the buffer. Once revoked, every clone reads `None`.
#[derive(Clone)]
pub struct RevocableBlob {
    label: Arc<str>,
    bytes: Arc<RwLock<Option<Arc<[u8]>>>>,
}

impl RevocableBlob {
    /// New live blob
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            label: label.into(),
            bytes: Arc::new(RwLock::new(Some(bytes.into()))),
        }
    }

    /// Name used in logs
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Contents, unless revoked
    #[must_use]
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.bytes.read().clone()
    }

    /// Revoke the blob; returns whether it was still live
    pub fn revoke(&self) -> bool {
        self.bytes.write().take().is_some()
    }

    /// Whether the blob has been revoked
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.bytes.read().is_none()
    }
}

impl std::fmt::Debug for RevocableBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocableBlob")
            .field("label", &self.label)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

/// Registry of reclaimable resources
#[derive(Default)]
pub struct CleanupRegistry {
    caches: RwLock<Vec<Arc<dyn Purgeable>>>,
    blobs: Mutex<Vec<RevocableBlob>>,
    overlays: RwLock<Vec<Arc<dyn OverlayHost>>>,
}

impl CleanupRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache to purge during cleanup
    pub fn register_cache(&self, cache: Arc<dyn Purgeable>) {
        self.caches.write().push(cache);
    }

    /// Track a blob so cleanup can revoke it
    pub fn track_blob(&self, blob: &RevocableBlob) {
        self.blobs.lock().push(blob.clone());
    }

    /// Register an overlay host
    pub fn register_overlay(&self, overlay: Arc<dyn OverlayHost>) {
        self.overlays.write().push(overlay);
    }

    /// Number of blobs currently tracked
    #[must_use]
    pub fn tracked_blobs(&self) -> usize {
        self.blobs.lock().len()
    }

    /// Purge every registered cache, returning how many were purged
    pub fn purge_caches(&self) -> usize {
        let caches = self.caches.read().clone();
        caches
            .iter()
            .filter(|cache| isolate(cache.label(), || cache.purge()).is_some())
            .count()
    }

    /// Revoke and forget every tracked blob, returning how many were live
    pub fn release_blobs(&self) -> usize {
        let blobs = std::mem::take(&mut *self.blobs.lock());
        blobs
            .iter()
            .filter(|blob| isolate(blob.label(), || blob.revoke()) == Some(true))
            .count()
    }

    /// Clear overlays that show nothing, returning how many were cleared
    pub fn clear_idle_overlays(&self) -> usize {
        let overlays = self.overlays.read().clone();
        overlays
            .iter()
            .filter(|overlay| {
                isolate(overlay.label(), || {
                    let idle = !overlay.has_visible_content();
                    if idle {
                        overlay.clear();
                    }
                    idle
                }) == Some(true)
            })
            .count()
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("caches", &self.caches.read().len())
            .field("blobs", &self.blobs.lock().len())
            .field("overlays", &self.overlays.read().len())
            .finish()
    }
}

/// Run `f`, turning a panic into `None` and a warning
pub(crate) fn isolate<T>(label: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(target: "rrl_watchdog::cleanup", item = label, "cleanup item panicked");
            None
        }
    }
}
