//! In-progress document model

use chrono::{DateTime, Utc};

use super::note::{Note, NoteId, NotePayload};

/// The document currently being edited.
///
/// Field values belong to the editor; `dirty` and `last_persisted_at` are only
/// changed by the sync engine, so they have no public setters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftDocument {
    pub identity: Option<NoteId>,
    pub title: String,
    pub body: String,
    dirty: bool,
    last_persisted_at: Option<DateTime<Utc>>,
}

impl DraftDocument {
    /// An empty, never-synced document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A clean copy of a note freshly loaded from the server.
    #[must_use]
    pub fn from_note(note: &Note) -> Self {
        Self {
            identity: Some(note.id.clone()),
            title: note.title.clone(),
            body: note.body.clone(),
            dirty: false,
            last_persisted_at: note.updated_at,
        }
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        self.last_persisted_at
    }

    #[must_use]
    pub fn payload(&self) -> NotePayload {
        NotePayload {
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }

    pub(crate) fn restored(
        identity: Option<NoteId>,
        title: String,
        body: String,
        last_saved_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            identity,
            title,
            body,
            dirty: true,
            last_persisted_at: last_saved_at,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self, at: DateTime<Utc>) {
        self.dirty = false;
        self.last_persisted_at = Some(at);
    }
}
