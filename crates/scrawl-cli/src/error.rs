use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] scrawl_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("A title is required to save a note")]
    MissingTitle,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found: {0}")]
    NoteNotFound(String),
    #[error("No password provided")]
    EmptyPassword,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `scrawl auth login` first.")]
    NotSignedIn,
    #[error("The local draft could not be sent ({0}). Run `scrawl sync` or `scrawl draft discard` first.")]
    UnsyncedDraft(String),
}
