//! Two-tier document store: optional remote in front of the local cache.
//!
//! Precedence and fallback order:
//!
//! ```text
//! load(id):  remote (if enabled) ── Ok(Some) ──────────────▶ done
//!                 │ disabled / Err / Ok(None)
//!                 ▼
//!            local cache ── Ok(Some) / Ok(None) / Err ─────▶ done
//!
//! save(doc): remote (if enabled) ── Err is logged
//!            local cache (always)  ── Err is logged
//!            error only when every enabled tier failed
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use deck_core::{DocumentStore, Error, Presentation, Result};

use crate::local::LocalCache;

/// Where a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Local,
}

/// Remote store with a write-through local cache as fallback.
pub struct TieredStore {
    remote: Option<Arc<dyn DocumentStore>>,
    local: LocalCache,
}

impl fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredStore")
            .field("remote_enabled", &self.remote.is_some())
            .field("local", &self.local)
            .finish()
    }
}

impl TieredStore {
    /// A store that never leaves the local machine.
    pub fn local_only(local: LocalCache) -> Self {
        Self {
            remote: None,
            local,
        }
    }

    /// A store backed by `remote`, falling back to `local`.
    pub fn with_remote(remote: Arc<dyn DocumentStore>, local: LocalCache) -> Self {
        Self {
            remote: Some(remote),
            local,
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Load a document and report which tier served it.
    pub async fn load_with_source(&self, id: &str) -> Result<Option<(Presentation, LoadSource)>> {
        if let Some(remote) = &self.remote {
            match remote.load(id).await {
                Ok(Some(doc)) => return Ok(Some((doc, LoadSource::Remote))),
                Ok(None) => log::debug!("Remote store has no presentation {}", id),
                Err(e) => log::warn!(
                    "Remote load of {} failed, falling back to local cache: {}",
                    id,
                    e
                ),
            }
        }
        Ok(self
            .local
            .load(id)
            .await?
            .map(|doc| (doc, LoadSource::Local)))
    }
}

#[async_trait]
impl DocumentStore for TieredStore {
    async fn load(&self, id: &str) -> Result<Option<Presentation>> {
        Ok(self.load_with_source(id).await?.map(|(doc, _)| doc))
    }

    async fn save(&self, doc: &Presentation) -> Result<()> {
        let remote_result = match &self.remote {
            Some(remote) => Some(remote.save(doc).await),
            None => None,
        };

        let local_result = self.local.save(doc).await;

        match (remote_result, local_result) {
            (None, local) => local,
            (Some(Ok(())), Ok(())) => Ok(()),
            (Some(Ok(())), Err(e)) => {
                log::warn!("Local cache write of {} failed: {}", doc.id, e);
                Ok(())
            }
            (Some(Err(e)), Ok(())) => {
                log::warn!("Remote save of {} failed: {}", doc.id, e);
                log::info!("Presentation {} kept in local cache", doc.id);
                Ok(())
            }
            (Some(Err(remote)), Err(local)) => Err(Error::StoreError(format!(
                "remote save failed ({}); local cache write failed ({})",
                remote, local
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory remote that can be switched offline.
    #[derive(Default)]
    pub(crate) struct FakeRemote {
        pub docs: Mutex<HashMap<String, Presentation>>,
        pub offline: AtomicBool,
        /// Fail reads only; writes still succeed.
        pub reads_fail: AtomicBool,
        pub saves: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FakeRemote {
        async fn load(&self, id: &str) -> Result<Option<Presentation>> {
            if self.offline.load(Ordering::SeqCst) || self.reads_fail.load(Ordering::SeqCst) {
                return Err(Error::HttpError("connection refused".into()));
            }
            Ok(self.docs.lock().unwrap().get(id).cloned())
        }

        async fn save(&self, doc: &Presentation) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::HttpError("connection refused".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.docs
                .lock()
                .unwrap()
                .insert(doc.id.clone(), doc.clone());
            Ok(())
        }
    }

    fn doc(title: &str) -> Presentation {
        let mut doc = Presentation::blank();
        doc.outline = vec![title.to_string()];
        doc
    }

    #[tokio::test]
    async fn test_remote_preferred_on_load() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let store = TieredStore::with_remote(remote.clone(), LocalCache::new(dir.path()));

        let mut stale = doc("Stale");
        store.local().save(&stale).await.unwrap();
        stale.outline = vec!["Fresh".into()];
        remote
            .docs
            .lock()
            .unwrap()
            .insert(stale.id.clone(), stale.clone());

        let (loaded, source) = store.load_with_source(&stale.id).await.unwrap().unwrap();
        assert_eq!(source, LoadSource::Remote);
        assert_eq!(loaded.outline, vec!["Fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_remote_falls_back_to_local() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let store = TieredStore::with_remote(remote.clone(), LocalCache::new(dir.path()));
        let doc = doc("Intro");

        store.save(&doc).await.unwrap();
        remote.offline.store(true, Ordering::SeqCst);

        let (loaded, source) = store.load_with_source(&doc.id).await.unwrap().unwrap();
        assert_eq!(source, LoadSource::Local);
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_save_survives_offline_remote() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        remote.offline.store(true, Ordering::SeqCst);
        let store = TieredStore::with_remote(remote.clone(), LocalCache::new(dir.path()));
        let doc = doc("Intro");

        store.save(&doc).await.unwrap();

        assert_eq!(remote.saves.load(Ordering::SeqCst), 0);
        assert_eq!(store.local().load(&doc.id).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_local_only_mode() {
        let dir = TempDir::new().unwrap();
        let store = TieredStore::local_only(LocalCache::new(dir.path()));
        let doc = doc("Intro");

        assert!(!store.remote_enabled());
        store.save(&doc).await.unwrap();
        assert_eq!(store.load(&doc.id).await.unwrap(), Some(doc));
        assert_eq!(store.load("unknown").await.unwrap(), None);
    }
}
