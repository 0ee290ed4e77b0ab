//! scrawl-core - Core library for Scrawl
//!
//! This crate owns the client-side session and synchronization logic shared by
//! every Scrawl front end: the access/refresh token lifecycle, the local draft
//! store, and the debounced note sync engine.

pub mod api;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{Credential, DraftDocument, Note, NoteId, NotePayload};
pub use session::{Session, SessionStart, SessionStores};
pub use state::{Connectivity, SyncState};
pub use sync::{FlushOutcome, NoteSyncEngine};
