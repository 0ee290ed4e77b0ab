//! Data models for Scrawl

mod credential;
mod draft;
mod note;

pub use credential::{Credential, TokenPair};
pub use draft::DraftDocument;
pub use note::{strip_markup, Note, NoteId, NotePayload};
