//! Debounced draft synchronization.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::debounce::DebounceTimer;
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::models::{DraftDocument, Note, NoteId};
use crate::state::{Connectivity, SyncState};
use crate::store::DraftStore;

/// What a flush did with the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Written locally and to the server.
    Synced,
    /// Written locally only: the document was clean or the client is offline.
    StoredLocally,
    /// Refused before touching storage or the network: the title is blank.
    Rejected(Error),
    /// Local or remote write failed; the document stays dirty.
    Failed(Error),
}

impl FlushOutcome {
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Rejected(error) | Self::Failed(error) => Some(error),
            Self::Synced | Self::StoredLocally => None,
        }
    }
}

struct DocumentState {
    draft: DraftDocument,
    /// Bumped on every edit and replacement, so a flush only marks the
    /// document clean if nothing changed while it was in flight.
    revision: u64,
}

struct EngineInner {
    api: ApiClient,
    drafts: DraftStore,
    connectivity: ConnectivityMonitor,
    debounce: Duration,
    document: Mutex<DocumentState>,
    /// Serializes writes for the active document.
    write_lock: tokio::sync::Mutex<()>,
    timer: DebounceTimer,
    status: watch::Sender<SyncState>,
}

/// Owns the active document's dirty flag and sync state.
///
/// Edits land in memory immediately and arm a debounce timer; when the
/// timer fires, [`flush`](Self::flush) persists the draft locally and, when
/// online and dirty, sends exactly one create or update. Only one flush
/// runs at a time; a flush requested meanwhile waits for it to finish.
#[derive(Clone)]
pub struct NoteSyncEngine {
    inner: Arc<EngineInner>,
}

impl NoteSyncEngine {
    pub fn new(
        api: ApiClient,
        drafts: DraftStore,
        connectivity: ConnectivityMonitor,
        config: &ClientConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncState::Saved);
        Self {
            inner: Arc::new(EngineInner {
                api,
                drafts,
                connectivity,
                debounce: config.debounce_window(),
                document: Mutex::new(DocumentState {
                    draft: DraftDocument::new(),
                    revision: 0,
                }),
                write_lock: tokio::sync::Mutex::new(()),
                timer: DebounceTimer::new(),
                status,
            }),
        }
    }

    /// Snapshot of the active document.
    pub fn document(&self) -> DraftDocument {
        self.lock_document().draft.clone()
    }

    pub fn sync_state(&self) -> SyncState {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.status.subscribe()
    }

    pub fn on_edit_title(&self, value: impl Into<String>) {
        let value = value.into();
        self.edit(|draft| draft.title = value);
    }

    pub fn on_edit_body(&self, value: impl Into<String>) {
        let value = value.into();
        self.edit(|draft| draft.body = value);
    }

    /// Persist the active document locally and, if it is dirty and the
    /// client is online, write it to the server.
    pub async fn flush(&self) -> FlushOutcome {
        let _write = self.inner.write_lock.lock().await;
        self.flush_locked().await
    }

    /// Switch to `note`, loaded from the server.
    ///
    /// The outgoing document is flushed first and its outcome returned. If
    /// that flush leaves it with unsent changes (offline, failed or
    /// untitled) the switch is refused with the flush's error and the
    /// outgoing document stays active and persisted.
    pub async fn select_document(&self, note: &Note) -> Result<FlushOutcome> {
        self.replace_document(DraftDocument::from_note(note)).await
    }

    /// Flush the outgoing document and start an empty, never-synced one.
    /// Refused like [`select_document`](Self::select_document).
    pub async fn new_document(&self) -> Result<FlushOutcome> {
        self.replace_document(DraftDocument::new()).await
    }

    /// Drop the active document and its local draft without sending it.
    pub async fn discard_document(&self) -> Result<()> {
        self.inner.timer.cancel();
        let _write = self.inner.write_lock.lock().await;
        self.install(DraftDocument::new());
        self.inner.drafts.clear()?;
        tracing::info!("Discarded active document");
        Ok(())
    }

    /// Load the draft left in the local store by a previous run.
    ///
    /// The restored document is dirty, so the next flush sends it: as an
    /// update when its identity was stored, as a create otherwise.
    pub async fn restore_local_draft(&self) -> Result<bool> {
        let _write = self.inner.write_lock.lock().await;
        let Some(stored) = self.inner.drafts.load()? else {
            return Ok(false);
        };

        let draft = DraftDocument::restored(
            stored.identity,
            stored.title.unwrap_or_default(),
            stored.body.unwrap_or_default(),
            stored.last_saved_at,
        );
        tracing::info!(
            "Restored local draft{}",
            draft
                .identity
                .as_ref()
                .map_or_else(String::new, |id| format!(" of note {id}"))
        );
        self.install(draft);
        Ok(true)
    }

    /// Delete a note on the server. Deleting the active document resets
    /// the engine to an empty one.
    pub async fn delete_document(&self, id: &NoteId) -> Result<()> {
        let _write = self.inner.write_lock.lock().await;
        self.inner.api.delete_note(id).await?;

        let is_active = self.lock_document().draft.identity.as_ref() == Some(id);
        if is_active {
            self.inner.timer.cancel();
            self.install(DraftDocument::new());
            self.inner.drafts.clear()?;
        }
        Ok(())
    }

    /// Record a connectivity change. A transition to online flushes right
    /// away instead of waiting for the next edit.
    pub async fn on_connectivity_change(&self, state: Connectivity) -> Option<FlushOutcome> {
        if self.inner.connectivity.set(state) && state.is_online() {
            Some(self.resync().await)
        } else {
            None
        }
    }

    /// Follow the connectivity monitor and flush on every transition to
    /// online. Use either this or
    /// [`on_connectivity_change`](Self::on_connectivity_change), not both.
    pub fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let mut updates = self.inner.connectivity.subscribe();
        let engine = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = *updates.borrow_and_update();
                if !state.is_online() {
                    continue;
                }
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                Self { inner }.resync().await;
            }
        })
    }

    /// Cancel the pending debounce timer. Returns whether one was armed.
    pub fn cancel_pending(&self) -> bool {
        self.inner.timer.cancel()
    }

    pub async fn list(&self) -> Result<Vec<Note>> {
        self.inner.api.list_notes().await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        self.inner.api.search_notes(query).await
    }

    fn edit(&self, apply: impl FnOnce(&mut DraftDocument)) {
        {
            let mut document = self.lock_document();
            apply(&mut document.draft);
            document.draft.mark_dirty();
            document.revision += 1;
        }
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        let engine: Weak<EngineInner> = Arc::downgrade(&self.inner);
        tracing::debug!("Flush scheduled in {:?}", self.inner.debounce);
        self.inner.timer.arm(self.inner.debounce, async move {
            if let Some(inner) = engine.upgrade() {
                Self { inner }.flush().await;
            }
        });
    }

    async fn resync(&self) -> FlushOutcome {
        self.inner.timer.cancel();
        tracing::info!("Back online, flushing active document");
        self.flush().await
    }

    async fn replace_document(&self, incoming: DraftDocument) -> Result<FlushOutcome> {
        self.inner.timer.cancel();
        let _write = self.inner.write_lock.lock().await;

        // Edits that arrive while the outgoing flush is in flight belong to
        // the outgoing document; keep flushing until it is settled.
        let outgoing = loop {
            let revision = self.lock_document().revision;
            let outcome = self.flush_locked().await;
            if !outcome.is_synced() || self.lock_document().revision == revision {
                break outcome;
            }
        };
        self.inner.timer.cancel();

        if self.lock_document().draft.is_dirty() {
            tracing::warn!("Outgoing document has unsent changes, not switching");
            return Err(match outgoing {
                FlushOutcome::Rejected(error) | FlushOutcome::Failed(error) => error,
                FlushOutcome::Synced | FlushOutcome::StoredLocally => Error::TransientNetwork(
                    "offline, unsent changes kept locally".to_string(),
                ),
            });
        }

        let clear_identity = incoming.identity.is_none();
        self.install(incoming.clone());
        if clear_identity {
            self.inner.drafts.clear()?;
        } else {
            self.inner.drafts.save(&incoming, Utc::now())?;
        }
        Ok(outgoing)
    }

    fn install(&self, draft: DraftDocument) {
        {
            let mut document = self.lock_document();
            document.draft = draft;
            document.revision += 1;
        }
        self.set_state(SyncState::Saved);
    }

    /// Caller holds `write_lock`.
    async fn flush_locked(&self) -> FlushOutcome {
        let (draft, revision) = {
            let document = self.lock_document();
            (document.draft.clone(), document.revision)
        };

        if draft.title.trim().is_empty() {
            tracing::debug!("Not saving untitled draft");
            return FlushOutcome::Rejected(Error::Validation("Title is required".to_string()));
        }

        if let Err(error) = self.inner.drafts.save(&draft, Utc::now()) {
            tracing::error!("Failed to store draft locally: {}", error);
            self.set_state(SyncState::Error);
            return FlushOutcome::Failed(error);
        }
        if !draft.is_dirty() {
            return FlushOutcome::StoredLocally;
        }
        if !self.inner.connectivity.current().is_online() {
            tracing::debug!("Offline, draft kept locally");
            return FlushOutcome::StoredLocally;
        }

        self.set_state(SyncState::Saving);
        let payload = draft.payload();
        let result = match draft.identity.as_ref() {
            Some(id) => self.inner.api.update_note(id, &payload).await,
            None => self.inner.api.create_note(&payload).await,
        };
        let note = match result {
            Ok(note) => note,
            Err(error) => {
                tracing::warn!("Sync failed, draft stays dirty: {}", error);
                self.set_state(SyncState::Error);
                return FlushOutcome::Failed(error);
            }
        };

        if draft.identity.is_none() {
            self.lock_document().draft.identity = Some(note.id.clone());
            if let Err(error) = self.inner.drafts.save_identity(Some(&note.id)) {
                tracing::error!("Failed to store identity of note {}: {}", note.id, error);
                self.set_state(SyncState::Error);
                return FlushOutcome::Failed(error);
            }
        }

        {
            let mut document = self.lock_document();
            if document.revision == revision {
                document.draft.mark_clean(Utc::now());
            }
        }
        self.set_state(SyncState::Saved);
        FlushOutcome::Synced
    }

    fn set_state(&self, state: SyncState) {
        self.inner.status.send_replace(state);
    }

    fn lock_document(&self) -> MutexGuard<'_, DocumentState> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
