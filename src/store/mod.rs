//! Local persistence for news stories.
//!
//! The repository only ever reads from a store. Writing is left to whoever
//! composes the application (see the `ingest` command of the binary).

mod storage;

pub use storage::{NoopStore, SqliteStore, StoryStore};
