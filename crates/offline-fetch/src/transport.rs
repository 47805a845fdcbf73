//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use offline_core::{RequestRecord, ResponseRecord, ResponseType};
use reqwest::Url;
use tracing::debug;
use url::ParseError;

use crate::{FetchError, NetworkFetcher};

/// HTTP transport for live origins.
///
/// Relative request URLs are resolved against the base URL. Responses from
/// the base origin are classified as same-origin (`basic`); anything else is
/// `cors`. Timeouts are whatever the underlying client is configured with.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: None,
        }
    }

    /// Create a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self::new().with_client(client))
    }

    /// Use a preconfigured client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Resolve relative URLs against this base.
    ///
    /// The base is parsed once, so later origin checks compare normalised
    /// hosts and ports.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        self.base_url = Some(base);
        Ok(self)
    }

    /// Resolve a request URL to an absolute URL.
    ///
    /// Relative paths, with or without a leading `/`, are appended to the
    /// base URL's path.
    pub fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        let invalid = |e: ParseError| FetchError::InvalidUrl(format!("{}: {}", url, e));

        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(url.trim_start_matches('/')).map_err(invalid),
                None => Err(FetchError::InvalidUrl(format!(
                    "{} is relative and no base URL is configured",
                    url
                ))),
            },
            Err(e) => Err(invalid(e)),
        }
    }

    fn classify(&self, final_url: &Url) -> ResponseType {
        match &self.base_url {
            Some(base) if base.origin() == final_url.origin() => ResponseType::Basic,
            Some(_) => ResponseType::Cors,
            None => ResponseType::Basic,
        }
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError> {
        let url = self.resolve(request.url())?;

        let mut builder = self.client.request(request.method().clone(), url.clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else if e.is_connect() {
                FetchError::Connection(e.to_string())
            } else if e.is_builder() {
                FetchError::InvalidUrl(e.to_string())
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let response_type = self.classify(resp.url());
        let headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        debug!(url = %url, status, response_type = %response_type, "network fetch");

        let mut response = ResponseRecord::new(status, response_type, body);
        for (name, value) in headers {
            response = response.with_header(name, value);
        }
        Ok(response)
    }
}
