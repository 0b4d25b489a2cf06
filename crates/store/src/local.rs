//! Local JSON cache.
//!
//! Layout under the cache directory:
//!
//! ```text
//! <cache_dir>/
//!     session.json              active id + last known AppState per id
//!     presentations/<id>.json   cached documents
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use deck_core::{AppState, DocumentStore, Error, Presentation, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const SESSION_FILE: &str = "session.json";
const PRESENTATIONS_DIR: &str = "presentations";

/// Session bookkeeping kept next to the cached documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRecord {
    /// Id of the presentation the last session was working on.
    pub active_id: Option<String>,

    /// Last AppState seen for each presentation id.
    pub app_states: BTreeMap<String, AppState>,
}

/// File-backed cache for documents and session bookkeeping.
#[derive(Debug)]
pub struct LocalCache {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on `session.json`.
    session_lock: Mutex<()>,
}

impl LocalCache {
    /// Create a cache rooted at `dir`. Directories are created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            session_lock: Mutex::new(()),
        }
    }

    /// Root directory of the cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self
            .dir
            .join(PRESENTATIONS_DIR)
            .join(format!("{}.json", id)))
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Read the session record. A missing file yields an empty record.
    pub async fn session(&self) -> Result<SessionRecord> {
        match tokio::fs::read_to_string(self.session_path()).await {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SessionRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_session<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let _guard = self.session_lock.lock().await;
        let mut record = self.session().await?;
        update(&mut record);
        let data = serde_json::to_vec_pretty(&record)?;
        write_atomic(&self.session_path(), &data).await
    }

    /// Id of the presentation the last session was working on.
    pub async fn active_id(&self) -> Option<String> {
        match self.session().await {
            Ok(record) => record.active_id,
            Err(e) => {
                log::warn!("Failed to read local session record: {}", e);
                None
            }
        }
    }

    /// Remember `id` as the active presentation.
    pub async fn set_active_id(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        self.update_session(|record| record.active_id = Some(id.to_string()))
            .await
    }

    /// Last cached AppState for `id`, if any.
    pub async fn cached_state(&self, id: &str) -> Option<AppState> {
        match self.session().await {
            Ok(mut record) => record.app_states.remove(id),
            Err(e) => {
                log::warn!("Failed to read cached app state for {}: {}", id, e);
                None
            }
        }
    }

    /// Cache the AppState for `id`.
    pub async fn store_state(&self, id: &str, state: AppState) -> Result<()> {
        validate_id(id)?;
        self.update_session(|record| {
            record.app_states.insert(id.to_string(), state);
        })
        .await
    }
}

#[async_trait]
impl DocumentStore for LocalCache {
    async fn load(&self, id: &str) -> Result<Option<Presentation>> {
        let path = self.document_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &Presentation) -> Result<()> {
        let path = self.document_path(&doc.id)?;
        let data = serde_json::to_vec_pretty(doc)?;
        write_atomic(&path, &data).await
    }
}

/// Ids become file names, so only a conservative character set is allowed.
fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::StoreError(format!("invalid presentation id: {:?}", id)))
    }
}

/// Write through a temporary file so readers never see a partial document.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::Slide;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_document_save_and_load() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());
        let mut doc = Presentation::blank();
        doc.outline = vec!["Intro".into()];
        doc.slides.push(Slide {
            title: "Intro".into(),
            ..Slide::default()
        });

        cache.save(&doc).await.unwrap();
        let loaded = cache.load(&doc.id).await.unwrap();

        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());

        assert_eq!(cache.load("does-not-exist").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());

        assert!(cache.load("../escape").await.is_err());
        assert!(cache.load("").await.is_err());
        assert!(cache.store_state("a/b", AppState::Editing).await.is_err());
    }

    #[tokio::test]
    async fn test_session_record_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());

        assert_eq!(cache.active_id().await, None);
        assert_eq!(cache.cached_state("abc").await, None);

        cache.set_active_id("abc").await.unwrap();
        cache.store_state("abc", AppState::Approving).await.unwrap();
        cache.store_state("def", AppState::Editing).await.unwrap();

        assert_eq!(cache.active_id().await.as_deref(), Some("abc"));
        assert_eq!(cache.cached_state("abc").await, Some(AppState::Approving));
        assert_eq!(cache.cached_state("def").await, Some(AppState::Editing));
    }

    #[tokio::test]
    async fn test_corrupt_session_record_reads_as_empty_state() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{ not json").unwrap();
        let cache = LocalCache::new(dir.path());

        assert!(cache.session().await.is_err());
        assert_eq!(cache.active_id().await, None);
        assert_eq!(cache.cached_state("abc").await, None);
    }
}
