//! mural-core - Core library for Mural
//!
//! This crate contains the collection models, the local cache, the remote
//! store adapters and the reconciliation engine used by every Mural
//! interface.

pub mod capability;
pub mod config;
pub mod db;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod remote;
pub mod search;
pub mod state;
pub mod summary;
pub mod task;
pub mod util;
pub mod watch;

pub use capability::Capability;
pub use config::{EngineConfig, RemoteConfig};
pub use db::LocalCache;
pub use engine::{Engine, MigrationReport, PendingWrite};
pub use error::{Error, Result};
pub use models::{Collection, Record, RecordId};
pub use notify::{ChangeNotifier, Subscription, Topic};
pub use remote::{RemoteError, RemoteStore};
pub use search::{SearchDebouncer, SearchInput, SearchQuery};
pub use state::{LoadPhase, PageView, Source};
