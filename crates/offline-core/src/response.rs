//! Responses with single-read bodies.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Errors raised while reading a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// The body was already consumed.
    #[error("response body already used")]
    BodyUsed,

    /// The body is not valid UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

/// Origin classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response with CORS headers.
    Cors,
    /// Cross-origin response whose contents cannot be inspected.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug)]
struct Body(Option<Bytes>);

impl Body {
    fn take(&mut self) -> Result<Bytes, ResponseError> {
        self.0.take().ok_or(ResponseError::BodyUsed)
    }

    fn peek(&self) -> Result<&Bytes, ResponseError> {
        self.0.as_ref().ok_or(ResponseError::BodyUsed)
    }
}

/// A response flowing through the controller.
///
/// The body can be read exactly once. A response that is both returned to the
/// caller and written to a cache store must be duplicated with
/// [`ResponseRecord::try_clone`] before either side reads it.
#[derive(Debug)]
pub struct ResponseRecord {
    status: u16,
    response_type: ResponseType,
    headers: BTreeMap<String, String>,
    body: Body,
}

impl ResponseRecord {
    /// Create a new response.
    pub fn new(status: u16, response_type: ResponseType, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            response_type,
            headers: BTreeMap::new(),
            body: Body(Some(body.into())),
        }
    }

    /// Create a same-origin `200 OK` response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, ResponseType::Basic, body)
    }

    /// Add a header. Names are stored lowercase.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The origin classification.
    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, lowercase names.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response is same-origin.
    pub fn is_basic(&self) -> bool {
        self.response_type == ResponseType::Basic
    }

    /// Check whether the body has been consumed.
    pub fn body_used(&self) -> bool {
        self.body.0.is_none()
    }

    /// Consume the body.
    pub fn bytes(&mut self) -> Result<Bytes, ResponseError> {
        self.body.take()
    }

    /// Consume the body as UTF-8 text.
    pub fn text(&mut self) -> Result<String, ResponseError> {
        let bytes = self.body.take()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ResponseError::InvalidUtf8(e.to_string()))
    }

    /// Duplicate the response, body included.
    ///
    /// Fails once the body has been consumed.
    pub fn try_clone(&self) -> Result<Self, ResponseError> {
        let body = self.body.peek()?.clone();
        Ok(Self {
            status: self.status,
            response_type: self.response_type,
            headers: self.headers.clone(),
            body: Body(Some(body)),
        })
    }

    /// Consume the response into a storable snapshot.
    pub fn into_stored(mut self) -> Result<StoredResponse, ResponseError> {
        let body = self.body.take()?;
        Ok(StoredResponse {
            status: self.status,
            response_type: self.response_type,
            headers: self.headers,
            body: body.to_vec(),
        })
    }
}

/// Serialisable snapshot of a response held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The origin classification.
    #[serde(default)]
    pub response_type: ResponseType,
    /// Headers, lowercase names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// Materialise a fresh response with an unread body.
    pub fn to_response(&self) -> ResponseRecord {
        ResponseRecord {
            status: self.status,
            response_type: self.response_type,
            headers: self.headers.clone(),
            body: Body(Some(Bytes::from(self.body.clone()))),
        }
    }
}
