//! Network access for the offline cache controller.
//!
//! This crate provides:
//! - `NetworkFetcher` - The transport seam the controller fetches through
//! - `FetchError` - Transport failures (HTTP error statuses are not errors)
//! - `HttpFetcher` - reqwest-backed transport
//! - `FixtureFetcher` - Canned responses with an offline switch, for replay and tests

mod error;
mod fetcher;
mod fixture;
mod transport;

pub use error::*;
pub use fetcher::*;
pub use fixture::*;
pub use transport::*;
