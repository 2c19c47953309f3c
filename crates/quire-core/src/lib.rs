//! quire-core - Core library for Quire
//!
//! Article model, the local and hosted article stores, and the hybrid
//! synchronizer that keeps them consistent while the network comes and goes.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod retry;
pub mod search;
pub mod state;
pub mod storage;
pub mod sync;
mod util;

pub use config::SyncSettings;
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use error::{Error, ErrorKind, Result};
pub use models::{Article, ArticleId, ArticleStatus, ConflictPolicy, Visibility};
pub use remote::{ArticleStore, SupabaseArticleStore, SupabaseConfig};
pub use search::ArticleQuery;
pub use storage::{KeyValueStore, LocalArticleStore};
pub use sync::HybridStorage;
