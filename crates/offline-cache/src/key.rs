//! Cache key composition.

use std::collections::BTreeMap;

use offline_core::{strip_fragment, RequestRecord};
use serde::{Deserialize, Serialize};

/// Request identity used as a cache store key.
///
/// Method plus URL (fragment removed), plus the values of any
/// content-negotiation headers the deployment varies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    method: String,
    url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    vary: BTreeMap<String, String>,
}

impl CacheKey {
    /// Key for a GET of `url` with no vary components.
    pub fn get(url: impl AsRef<str>) -> Self {
        Self {
            method: "GET".to_string(),
            url: strip_fragment(url.as_ref()).to_string(),
            vary: BTreeMap::new(),
        }
    }

    /// The request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request URL without fragment.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Vary components (lowercase header name to value).
    pub fn vary(&self) -> &BTreeMap<String, String> {
        &self.vary
    }

    /// The same key with its vary components removed.
    ///
    /// Install requests carry no headers, so precached entries live under
    /// this form.
    pub fn without_vary(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            vary: BTreeMap::new(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        for (name, value) in &self.vary {
            write!(f, "|h:{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Builder for deriving cache keys from requests.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    vary_headers: Vec<String>,
}

impl CacheKeyBuilder {
    /// Create a builder keyed on method and URL only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include a request header value in the key.
    pub fn header(mut self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref().to_ascii_lowercase();
        if !self.vary_headers.contains(&name) {
            self.vary_headers.push(name);
        }
        self
    }

    /// Include every header in `names`.
    pub fn headers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().fold(self, |builder, name| builder.header(name))
    }

    /// Build the key for a request.
    ///
    /// Headers the request does not carry are left out of the key.
    pub fn build(&self, request: &RequestRecord) -> CacheKey {
        let vary = self
            .vary_headers
            .iter()
            .filter_map(|name| {
                request
                    .header(name)
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();

        CacheKey {
            method: request.method().as_str().to_string(),
            url: strip_fragment(request.url()).to_string(),
            vary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_request() {
        let key = CacheKeyBuilder::new().build(&RequestRecord::get("/api/price"));
        assert_eq!(key.method(), "GET");
        assert_eq!(key.url(), "/api/price");
        assert_eq!(key, CacheKey::get("/api/price"));
        assert_eq!(key.to_string(), "GET /api/price");
    }

    #[test]
    fn test_key_strips_fragment_keeps_query() {
        let key = CacheKeyBuilder::new().build(&RequestRecord::get("/products?page=2#grid"));
        assert_eq!(key.url(), "/products?page=2");
    }

    #[test]
    fn test_key_ignores_unlisted_headers() {
        let builder = CacheKeyBuilder::new();
        let a = builder.build(&RequestRecord::get("/").with_header("accept-language", "en"));
        let b = builder.build(&RequestRecord::get("/").with_header("accept-language", "de"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_varies_on_listed_headers() {
        let builder = CacheKeyBuilder::new().header("Accept-Language");
        let en = builder.build(&RequestRecord::get("/").with_header("accept-language", "en"));
        let de = builder.build(&RequestRecord::get("/").with_header("accept-language", "de"));
        let none = builder.build(&RequestRecord::get("/"));

        assert_ne!(en, de);
        assert_ne!(en, none);
        assert_eq!(en.to_string(), "GET /|h:accept-language=en");
        assert_eq!(none, CacheKey::get("/"));
    }

    #[test]
    fn test_without_vary_matches_plain_key() {
        let builder = CacheKeyBuilder::new().header("accept-language");
        let key = builder.build(&RequestRecord::get("/a.css#x").with_header("accept-language", "en"));
        assert_ne!(key, CacheKey::get("/a.css"));
        assert_eq!(key.without_vary(), CacheKey::get("/a.css"));
    }

    #[test]
    fn test_builder_dedupes_headers() {
        let builder = CacheKeyBuilder::new().headers(["Accept", "accept"]);
        let key = builder.build(&RequestRecord::get("/").with_header("accept", "text/html"));
        assert_eq!(key.vary().len(), 1);
    }
}
