//! The network seam.

use std::sync::Arc;

use async_trait::async_trait;
use offline_core::{RequestRecord, ResponseRecord};

use crate::FetchError;

/// Issues network requests on behalf of the controller.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Fetch a request. Fails only on transport error.
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError>;
}

#[async_trait]
impl<T: NetworkFetcher + ?Sized> NetworkFetcher for Arc<T> {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError> {
        (**self).fetch(request).await
    }
}
