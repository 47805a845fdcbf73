//! Request identity as seen by the controller.

use std::collections::BTreeMap;

use http::Method;

/// How the browser issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Same-origin subresource.
    #[default]
    SameOrigin,
    /// Cross-origin request without CORS.
    NoCors,
    /// Cross-origin request with CORS.
    Cors,
}

impl RequestMode {
    /// Parse a mode name (`navigate`, `same-origin`, `no-cors`, `cors`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "same-origin" => Some(Self::SameOrigin),
            "no-cors" => Some(Self::NoCors),
            "cors" => Some(Self::Cors),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigate => write!(f, "navigate"),
            Self::SameOrigin => write!(f, "same-origin"),
            Self::NoCors => write!(f, "no-cors"),
            Self::Cors => write!(f, "cors"),
        }
    }
}

/// An intercepted request.
///
/// Immutable once built; used for classification and as the source of the
/// cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    method: Method,
    url: String,
    mode: RequestMode,
    headers: BTreeMap<String, String>,
}

impl RequestRecord {
    /// Create a request with an explicit method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            mode: RequestMode::default(),
            headers: BTreeMap::new(),
        }
    }

    /// Create a GET subresource request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a GET navigation request for an HTML document.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_header("accept", "text/html,application/xhtml+xml")
    }

    /// Set the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header. Names are stored lowercase.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL as issued.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request mode.
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// Check whether this is a top-level navigation.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get the `accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    /// All headers, lowercase names.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The URL path with origin, query and fragment removed.
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }
}

/// Reduce a URL to its path.
///
/// Absolute URLs lose their scheme and authority; query strings and
/// fragments are dropped. An absolute URL without a path yields `/`.
pub fn url_path(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);

    match without_query.find("://") {
        Some(scheme_end) => {
            let rest = &without_query[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => "/",
            }
        }
        None => without_query,
    }
}

/// Strip a trailing fragment from a URL.
pub fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_get_defaults() {
        let req = RequestRecord::get("/static/css/site.css");
        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.mode(), RequestMode::SameOrigin);
        assert!(!req.is_navigation());
        assert_eq!(req.accept(), None);
    }

    #[test]
    fn test_request_navigate() {
        let req = RequestRecord::navigate("/checkout");
        assert!(req.is_navigation());
        assert!(req.accept().unwrap().contains("text/html"));
    }

    #[test]
    fn test_request_header_case_insensitive() {
        let req = RequestRecord::get("/").with_header("Accept", "application/json");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn test_url_path_relative() {
        assert_eq!(url_path("/products/7"), "/products/7");
        assert_eq!(url_path("/products?page=2"), "/products");
        assert_eq!(url_path("/about#team"), "/about");
    }

    #[test]
    fn test_url_path_absolute() {
        assert_eq!(
            url_path("https://shop.example/static/img/logo.svg?v=3"),
            "/static/img/logo.svg"
        );
        assert_eq!(url_path("https://shop.example"), "/");
        assert_eq!(url_path("http://localhost:5000/cart"), "/cart");
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("/about#team"), "/about");
        assert_eq!(strip_fragment("/about"), "/about");
    }

    #[test]
    fn test_request_mode_parse() {
        assert_eq!(RequestMode::parse("navigate"), Some(RequestMode::Navigate));
        assert_eq!(RequestMode::parse("NO-CORS"), Some(RequestMode::NoCors));
        assert_eq!(RequestMode::parse("bogus"), None);
    }
}
