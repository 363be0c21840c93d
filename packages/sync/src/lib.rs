//! # Bindery Sync
//!
//! Keeps an `EditSession` in step with a storage backend.
//!
//! - `backend`: the contract every storage provider satisfies
//! - `memory` / `file`: bundled backends
//! - `orchestrator`: load, store, save, revert and clear flows, permission
//!   wiring, auto-save
//! - `notices` / `debounce`: expiring error notices and the quiet-window timer

mod backend;
mod config;
mod debounce;
mod errors;
mod file;
mod memory;
mod notices;
mod orchestrator;

pub use backend::{AuthInfo, Backend, BackendError, Fetched, StoredRecord};
pub use config::{AppConfig, BackendSpec, DEFAULT_CONFIG_NAME};
pub use debounce::Debouncer;
pub use errors::{ConfigError, LoadOutcome, SyncError};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use notices::{Notice, NoticeId, Notices};
pub use orchestrator::{Affordances, Status, SyncEvent, SyncOrchestrator};
