//! Core records and configuration for the storefront offline cache controller.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `VersionTag` - Name of the current cache generation
//! - `StaticAssetManifest` - Paths that must always be available offline
//! - `RequestRecord` / `ResponseRecord` - Request identity and single-read responses
//! - `RequestClass` - The handling class assigned to each request
//! - `WorkerConfig` - Deployment-fixed configuration
//! - `WorkerPhase` - Worker lifecycle tracking

mod class;
mod config;
mod lifecycle;
mod manifest;
mod request;
mod response;
mod version;

pub use class::*;
pub use config::*;
pub use lifecycle::*;
pub use manifest::*;
pub use request::*;
pub use response::*;
pub use version::*;
