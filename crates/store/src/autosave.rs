//! Debounced autosave queue.
//!
//! Each mutation replaces the queued document and restarts the single
//! pending timer, so a burst of mutations results in one write of the
//! latest document once the window elapses without further changes.
//! Writes are serialized, so a later document is never overwritten by an
//! earlier one that was still in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deck_core::{DocumentStore, Presentation, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct PendingTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Coalescing write queue in front of a [`DocumentStore`].
pub struct Autosaver {
    store: Arc<dyn DocumentStore>,
    window: Duration,
    /// The one pending timer, if any.
    pending: Mutex<Option<PendingTimer>>,
    /// Latest document waiting to be written.
    queued: Mutex<Option<Presentation>>,
    next_ticket: AtomicU64,
    /// One-shot flag: the next timer that fires drops its write.
    suspended: AtomicBool,
    write_lock: tokio::sync::Mutex<()>,
    writes: AtomicUsize,
}

impl Autosaver {
    pub fn new(store: Arc<dyn DocumentStore>, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            window,
            pending: Mutex::new(None),
            queued: Mutex::new(None),
            next_ticket: AtomicU64::new(0),
            suspended: AtomicBool::new(false),
            write_lock: tokio::sync::Mutex::new(()),
            writes: AtomicUsize::new(0),
        })
    }

    /// Queue `doc` and restart the timer window.
    ///
    /// Must be called from within a tokio runtime; outside one the write is
    /// left queued for the next [`Autosaver::flush`].
    pub fn schedule(self: &Arc<Self>, doc: Presentation) {
        *lock(&self.queued) = Some(doc);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("Autosave requested outside a runtime; write deferred");
                return;
            }
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.take() {
            previous.handle.abort();
        }
        let this = Arc::clone(self);
        let handle = runtime.spawn(async move { this.fire(ticket).await });
        *pending = Some(PendingTimer { ticket, handle });
    }

    async fn fire(self: Arc<Self>, ticket: u64) {
        tokio::time::sleep(self.window).await;

        // Leave the pending slot before writing so a new mutation starts a
        // fresh timer instead of aborting this write.
        {
            let mut pending = lock(&self.pending);
            if pending.as_ref().map(|timer| timer.ticket) != Some(ticket) {
                return;
            }
            pending.take();
        }

        let _write = self.write_lock.lock().await;
        if self.suspended.swap(false, Ordering::SeqCst) {
            log::debug!("Autosave suspended; dropping debounced write");
            return;
        }
        let Some(doc) = lock(&self.queued).take() else {
            return;
        };
        log::debug!("Autosaving presentation {}", doc.id);
        if let Err(e) = self.write(&doc).await {
            log::warn!("Autosave of {} failed: {}", doc.id, e);
        }
    }

    async fn write(&self, doc: &Presentation) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.store.save(doc).await
    }

    /// Drop the pending timer and the queued document without writing.
    pub fn cancel_pending(&self) {
        if let Some(timer) = lock(&self.pending).take() {
            timer.handle.abort();
        }
        lock(&self.queued).take();
    }

    /// Suspend autosave until [`Autosaver::resume`]: pending writes are
    /// dropped and a timer already past its window skips its write.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
        self.cancel_pending();
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }

    /// Write the queued document now, if there is one.
    pub async fn flush(&self) -> Result<()> {
        if let Some(timer) = lock(&self.pending).take() {
            timer.handle.abort();
        }
        let _write = self.write_lock.lock().await;
        let queued = lock(&self.queued).take();
        match queued {
            Some(doc) => {
                log::debug!("Flushing queued write of {}", doc.id);
                self.write(&doc).await
            }
            None => Ok(()),
        }
    }

    /// Bypass the debounce and write `doc` immediately. Any queued write
    /// is superseded.
    pub async fn save_now(&self, doc: &Presentation) -> Result<()> {
        if let Some(timer) = lock(&self.pending).take() {
            timer.handle.abort();
        }
        let _write = self.write_lock.lock().await;
        lock(&self.queued).take();
        self.write(doc).await
    }

    /// Whether a debounced write is waiting on its timer.
    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Number of writes issued to the underlying store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Lock a std mutex, recovering from poisoning; guarded data is plain state.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
