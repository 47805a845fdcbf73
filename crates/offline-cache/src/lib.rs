//! Versioned cache stores for the offline cache controller.
//!
//! This crate provides:
//! - `CacheStorage` / `CacheStore` - Named stores keyed by request identity
//! - `CacheKey` / `CacheKeyBuilder` - Request identity with content-negotiation headers
//! - `MemoryCacheStorage` - Process-local backend
//! - `DiskCacheStorage` - One JSON file per store
//! - `add_all` - Atomic bulk prefetch
//! - `CacheStatus` - How a response was produced
//!
//! # Example
//!
//! ```ignore
//! use offline_cache::{CacheKeyBuilder, CacheStorage, MemoryCacheStorage};
//! use offline_core::RequestRecord;
//!
//! let storage = MemoryCacheStorage::new();
//! let store = storage.open("gearloom-pwa-v4").await?;
//! let key = CacheKeyBuilder::new().build(&RequestRecord::get("/api/price"));
//! let cached = store.match_key(&key).await?;
//! ```

mod disk;
mod error;
mod install;
mod key;
mod memory;
mod status;
mod storage;

pub use disk::*;
pub use error::*;
pub use install::*;
pub use key::*;
pub use memory::*;
pub use status::*;
pub use storage::*;
