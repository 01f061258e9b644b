//! Request descriptors and response snapshots.
//!
//! These are the only shapes the engine sees: the host hands over a
//! [`RequestDescriptor`] and receives a [`ResponseSnapshot`] back, whether it
//! came from the network or from a cache store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::url::canonicalize;

/// Destination hint supplied by the host (what the response will be used for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    #[serde(other)]
    Other,
}

/// Request mode supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
    #[serde(other)]
    Other,
}

/// An inbound request as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: Url,
    pub destination: Option<Destination>,
    pub accept: Option<String>,
    pub mode: Option<RequestMode>,
}

impl RequestDescriptor {
    /// Plain GET for a URL string, canonicalized.
    pub fn get(url: &str) -> Result<Self, Error> {
        Ok(Self::from_url(canonicalize(url)?))
    }

    /// Plain GET for an already parsed URL.
    pub fn from_url(url: Url) -> Self {
        Self { method: "GET".to_string(), url, destination: None, accept: None, mode: None }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_uppercase();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Whether the Accept header asks for HTML.
    pub fn accepts_html(&self) -> bool {
        self.accept.as_deref().is_some_and(|a| a.contains("text/html"))
    }

    /// Whether this request looks like a page navigation.
    pub fn is_document_like(&self) -> bool {
        self.mode == Some(RequestMode::Navigate)
            || self.destination == Some(Destination::Document)
            || self.accepts_html()
    }
}

/// A response held in memory: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// 200 response with a single content type.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(200, vec![("content-type".to_string(), content_type.to_string())], body)
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
