//! Note synchronization.
//!
//! [`NoteSyncEngine`] turns editor keystrokes into debounced local saves and
//! remote writes for one active document at a time.

mod debounce;
mod engine;

pub use debounce::DebounceTimer;
pub use engine::{FlushOutcome, NoteSyncEngine};
