//! The application state store.
//!
//! A [`Session`] is the single owner of `(AppState, Presentation)` for the
//! active deck, plus the cancellation flag for generation runs. All reads
//! and writes to persistence go through it. Persistence failures are
//! logged and never make the in-memory document unusable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use deck_core::{
    new_id, AppState, CancellationFlag, ChatMessage, DocumentStore, Error, FileRef, FileUpload,
    GenerationSink, InitialInput, InitialInputPatch, Presentation, Progress, Result, Slide, Uploader,
};

use crate::autosave::Autosaver;
use crate::config::StoreConfig;
use crate::tiered::{LoadSource, TieredStore};

/// The `(AppState, Presentation)` pair owned by a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub app_state: AppState,
    pub presentation: Presentation,
}

struct SessionInner {
    store: Arc<TieredStore>,
    autosave: Arc<Autosaver>,
    uploader: Option<Arc<dyn Uploader>>,
    state: Mutex<SessionState>,
    cancel: CancellationFlag,
    progress: Mutex<Option<Progress>>,
    /// The document has changes that no immediate save has written yet.
    /// A freshly loaded (or placeholder) document is clean.
    dirty: AtomicBool,
}

/// Handle to the active session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session with an empty document that has no id yet.
    pub fn new(store: TieredStore, config: &StoreConfig) -> Self {
        Self::build(store, config, None)
    }

    /// Like [`Session::new`], with an upload endpoint attached.
    pub fn with_uploader(
        store: TieredStore,
        config: &StoreConfig,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self::build(store, config, Some(uploader))
    }

    fn build(store: TieredStore, config: &StoreConfig, uploader: Option<Arc<dyn Uploader>>) -> Self {
        let store = Arc::new(store);
        let autosave = Autosaver::new(store.clone(), config.autosave_debounce);
        Self {
            inner: Arc::new(SessionInner {
                store,
                autosave,
                uploader,
                state: Mutex::new(SessionState::default()),
                cancel: CancellationFlag::new(),
                progress: Mutex::new(None),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current `(AppState, Presentation)` pair.
    pub fn snapshot(&self) -> SessionState {
        self.state().clone()
    }

    pub fn app_state(&self) -> AppState {
        self.state().app_state
    }

    pub fn presentation(&self) -> Presentation {
        self.state().presentation.clone()
    }

    pub fn presentation_id(&self) -> String {
        self.state().presentation.id.clone()
    }

    /// The cancellation flag observed by generation runs.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.inner.cancel
    }

    /// Last progress reported by a generation run.
    pub fn progress(&self) -> Option<Progress> {
        *self
            .inner
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The underlying tiered store.
    pub fn store(&self) -> &TieredStore {
        &self.inner.store
    }

    /// Whether the autosave queue has a write waiting on its timer.
    pub fn autosave_pending(&self) -> bool {
        self.inner.autosave.has_pending()
    }

    /// Resume the previous session: `id` if given, else the last active
    /// id from the local cache, else a fresh document.
    pub async fn bootstrap(&self, id: Option<&str>) -> SessionState {
        let id = match id {
            Some(id) => Some(id.to_string()),
            None => self.inner.store.local().active_id().await,
        };
        match id {
            Some(id) => self.load(&id).await,
            None => {
                self.start_fresh().await;
                self.snapshot()
            }
        }
    }

    /// Load a presentation by id.
    ///
    /// Never fails: a remote failure falls back to the local cache, and a
    /// document found nowhere yields a blank placeholder under `id`. The
    /// placeholder is not written anywhere until it is edited.
    pub async fn load(&self, id: &str) -> SessionState {
        self.flush_outgoing().await;

        let (presentation, app_state, found) = match self.inner.store.load_with_source(id).await {
            Ok(Some((doc, source))) => {
                let derived = AppState::derive(&doc);
                let cached = self.inner.store.local().cached_state(id).await;
                let resolved = AppState::reconcile(cached, derived);
                log::debug!(
                    "Loaded {} from {} (cached {:?}, derived {}, resolved {})",
                    id,
                    match source {
                        LoadSource::Remote => "remote store",
                        LoadSource::Local => "local cache",
                    },
                    cached,
                    derived,
                    resolved
                );
                (doc, resolved, true)
            }
            Ok(None) => {
                log::info!("Presentation {} not found; starting blank", id);
                (blank_with_id(id), AppState::Initial, false)
            }
            Err(e) => {
                log::error!("Failed to load presentation {}: {}", id, e);
                (blank_with_id(id), AppState::Initial, false)
            }
        };

        *self.state() = SessionState {
            app_state,
            presentation,
        };
        self.inner.dirty.store(false, Ordering::SeqCst);
        self.inner.cancel.reset();
        if found {
            self.remember(id, app_state).await;
        }
        self.snapshot()
    }

    /// Apply a document transform and schedule a debounced write.
    ///
    /// Returns whether the document changed; an unchanged document does not
    /// schedule a write.
    pub fn mutate<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut Presentation),
    {
        let doc = {
            let mut state = self.state();
            let mut next = state.presentation.clone();
            update(&mut next);
            if next == state.presentation {
                return false;
            }
            state.presentation = next;
            state.presentation.clone()
        };
        self.inner.dirty.store(true, Ordering::SeqCst);
        if doc.has_id() {
            self.inner.autosave.schedule(doc);
        }
        true
    }

    /// Persist the current document immediately, bypassing the debounce.
    ///
    /// A document without edits since it was loaded or last saved is not
    /// written, so a placeholder never replaces a stored document.
    pub async fn save_now(&self) -> Result<()> {
        let doc = self.presentation();
        if !doc.has_id() || !self.inner.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.autosave.save_now(&doc).await.map_err(|e| {
            self.inner.dirty.store(true, Ordering::SeqCst);
            log::warn!("Immediate save of {} failed: {}", doc.id, e);
            e
        })
    }

    /// Whether the document has edits not yet written by an immediate save.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Move to `next`, validating against the state machine.
    pub async fn transition(&self, next: AppState) -> Result<()> {
        let (id, from) = {
            let mut state = self.state();
            let from = state.app_state;
            state.app_state = from.transition(next)?;
            (state.presentation.id.clone(), from)
        };
        if from != next {
            log::debug!("AppState {} -> {}", from, next);
        }
        if !id.is_empty() {
            if let Err(e) = self.inner.store.local().store_state(&id, next).await {
                log::warn!("Failed to cache app state for {}: {}", id, e);
            }
        }
        Ok(())
    }

    /// Persist the outgoing document, then start over with a blank one.
    pub async fn reset_state(&self) -> String {
        self.flush_outgoing().await;
        self.start_fresh().await
    }

    /// Clone the current document under a new id, persist the clone, and
    /// continue the session on it. The original document is not modified.
    pub async fn duplicate_presentation(&self) -> Result<String> {
        self.flush_outgoing().await;

        self.inner.autosave.suspend();
        let (clone, app_state) = {
            let state = self.state();
            (state.presentation.duplicate(), state.app_state)
        };
        let saved = self.inner.store.save(&clone).await;
        self.inner.autosave.resume();
        saved?;

        let id = clone.id.clone();
        *self.state() = SessionState {
            app_state,
            presentation: clone,
        };
        self.inner.dirty.store(false, Ordering::SeqCst);
        self.remember(&id, app_state).await;
        log::info!("Duplicated presentation into {}", id);
        Ok(id)
    }

    /// Upload a file under the active presentation's id.
    ///
    /// A document without an id gets one, and is persisted, before the
    /// upload is attempted.
    pub async fn upload_file(&self, file: &FileUpload, category: Option<&str>) -> Result<FileRef> {
        let uploader = self
            .inner
            .uploader
            .clone()
            .ok_or_else(|| Error::UploadError("no upload endpoint configured".to_string()))?;

        let minted = {
            let mut state = self.state();
            if state.presentation.has_id() {
                None
            } else {
                state.presentation.id = new_id();
                self.inner.dirty.store(true, Ordering::SeqCst);
                Some((state.presentation.id.clone(), state.app_state))
            }
        };
        if let Some((id, app_state)) = minted {
            log::debug!("Minted presentation id {} for upload", id);
            // Failure is logged by save_now; the id is still usable.
            let _ = self.save_now().await;
            self.remember(&id, app_state).await;
        }

        let id = self.presentation_id();
        uploader.upload(file, &id, category).await
    }

    /// Capture the initial input and enter clarification.
    pub async fn begin_clarification(&self, input: InitialInput) -> Result<()> {
        self.check_transition(AppState::Clarifying)?;
        self.mutate(|doc| doc.initial_input = input);
        self.transition(AppState::Clarifying).await
    }

    /// Append a clarification message.
    pub fn append_chat_message(&self, message: ChatMessage) {
        self.mutate(|doc| doc.chat_history.push(message));
    }

    /// Apply a chat-driven patch to the initial input.
    pub fn patch_initial_input(&self, patch: InitialInputPatch) {
        self.mutate(|doc| doc.initial_input.apply(patch));
    }

    /// Record the clarification outcome and move to outline approval.
    pub async fn finish_clarification(&self, goals: impl Into<String>) -> Result<()> {
        if self.state().presentation.clarified_goals.is_some() {
            return Err(Error::AlreadySet("clarified goals"));
        }
        self.check_transition(AppState::Approving)?;
        let goals = goals.into();
        self.mutate(|doc| doc.clarified_goals = Some(goals));
        self.transition(AppState::Approving).await
    }

    /// Fix the outline and move to generation.
    pub async fn approve_outline(&self, titles: Vec<String>) -> Result<()> {
        if !self.state().presentation.outline.is_empty() {
            return Err(Error::AlreadySet("outline"));
        }
        self.check_transition(AppState::Generating)?;
        self.mutate(|doc| {
            doc.outline = titles;
            doc.slides.clear();
        });
        self.transition(AppState::Generating).await
    }

    fn check_transition(&self, next: AppState) -> Result<()> {
        self.state().app_state.transition(next).map(|_| ())
    }

    async fn start_fresh(&self) -> String {
        let doc = Presentation::blank();
        let id = doc.id.clone();
        *self.state() = SessionState {
            app_state: AppState::Initial,
            presentation: doc,
        };
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.cancel.reset();
        *self
            .inner
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        let _ = self.save_now().await;
        self.remember(&id, AppState::Initial).await;
        log::info!("Started new presentation {}", id);
        id
    }

    /// Write the current document, if it has an id, before swapping it out.
    async fn flush_outgoing(&self) {
        if self.state().presentation.has_id() {
            let _ = self.save_now().await;
        } else {
            self.inner.autosave.cancel_pending();
        }
    }

    async fn remember(&self, id: &str, app_state: AppState) {
        let local = self.inner.store.local();
        if let Err(e) = local.set_active_id(id).await {
            log::warn!("Failed to record active presentation {}: {}", id, e);
        }
        if let Err(e) = local.store_state(id, app_state).await {
            log::warn!("Failed to cache app state for {}: {}", id, e);
        }
    }
}

impl GenerationSink for Session {
    fn publish_slides(&self, slides: Vec<Slide>) {
        self.mutate(|doc| doc.slides = slides);
    }

    fn report_progress(&self, progress: Progress) {
        log::debug!(
            "Generated {}/{} slides",
            progress.completed,
            progress.total
        );
        *self
            .inner
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(progress);
    }
}

fn blank_with_id(id: &str) -> Presentation {
    Presentation {
        id: id.to_string(),
        ..Presentation::default()
    }
}
