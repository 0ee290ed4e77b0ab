//! Persisted draft of the active document.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::KeyValueStore;
use crate::error::Result;
use crate::models::{DraftDocument, NoteId};

/// Fixed store keys shared by every front end.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const ACCESS_EXPIRY: &str = "accessExpiry";
    pub const REFRESH_EXPIRY: &str = "refreshExpiry";
    pub const NOTE_ID: &str = "note_id";
    pub const NOTE_TITLE: &str = "note_title";
    pub const NOTE_CONTENT: &str = "note_content";
    pub const NOTE_LAST_SAVED: &str = "note_last_saved";
}

/// Whatever subset of the draft keys was found in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredDraft {
    pub identity: Option<NoteId>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Write the complete field values of `draft`.
    pub fn save(&self, draft: &DraftDocument, at: DateTime<Utc>) -> Result<()> {
        self.store.set(keys::NOTE_TITLE, &draft.title)?;
        self.store.set(keys::NOTE_CONTENT, &draft.body)?;
        self.store.set(keys::NOTE_LAST_SAVED, &at.to_rfc3339())?;
        self.save_identity(draft.identity.as_ref())
    }

    pub fn save_identity(&self, identity: Option<&NoteId>) -> Result<()> {
        match identity {
            Some(id) => self.store.set(keys::NOTE_ID, id.as_str()),
            None => self.store.remove(keys::NOTE_ID),
        }
    }

    /// Read the persisted draft. Missing or unreadable keys are treated as
    /// absent; `None` means no draft field was stored at all.
    pub fn load(&self) -> Result<Option<StoredDraft>> {
        let identity = self
            .store
            .get(keys::NOTE_ID)?
            .and_then(|raw| raw.parse::<NoteId>().ok());
        let title = self.store.get(keys::NOTE_TITLE)?;
        let body = self.store.get(keys::NOTE_CONTENT)?;
        let last_saved_at = self
            .store
            .get(keys::NOTE_LAST_SAVED)?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(error) => {
                    tracing::warn!("Ignoring unreadable draft timestamp: {}", error);
                    None
                }
            });

        if identity.is_none() && title.is_none() && body.is_none() {
            return Ok(None);
        }
        Ok(Some(StoredDraft {
            identity,
            title,
            body,
            last_saved_at,
        }))
    }

    pub fn clear(&self) -> Result<()> {
        for key in [
            keys::NOTE_ID,
            keys::NOTE_TITLE,
            keys::NOTE_CONTENT,
            keys::NOTE_LAST_SAVED,
        ] {
            self.store.remove(key)?;
        }
        Ok(())
    }
}
