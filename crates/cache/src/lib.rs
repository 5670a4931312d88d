//! Generation context cache with a bounded retry budget per key.

pub mod client;
mod error;
mod pool;
pub mod protocol;
pub mod service;
mod sqlite;
mod store;

pub use client::CacheClient;
pub use error::*;
pub use pool::*;
pub use service::{cache_router, CacheApiDoc};
pub use sqlite::SqliteContextStore;
pub use store::{ContextCache, RETRY_BUDGET};
