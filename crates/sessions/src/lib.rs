//! Session Store & Persistence (C12): durable `session`/`event` rows and
//! MessageHistory snapshots behind a pluggable file store, backing C3/C7/C9.

pub mod event_store;
pub mod history_store;
pub mod session_store;

pub use event_store::EventStore;
pub use history_store::HistoryStore;
pub use session_store::SessionStore;
