//! Request envelopes.
//!
//! A request on the wire:
//!
//! ```text
//! { "id": "0190f...", "method": "GET", "path": "/offers/42?fields=name",
//!   "body": { ... }, "params": { ... } }
//! ```
//!
//! `requester` and `pathParams` are never trusted from the wire. The
//! receiving side fills them in from the transport's sender identity and from
//! the matched route.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::envelope::Method;
use crate::error::MalformedMessage;

/// Neutral base used to split a request path into path and query.
const PATH_BASE: &str = "pipe://peerpipe.local";

// =============================================================================
// PipeRequest
// =============================================================================

/// A request envelope as seen by a route handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeRequest {
    /// Correlation id, echoed by the response.
    pub id: String,
    /// Request method.
    pub method: Method,
    /// Request path. Always starts with `/` once normalized.
    pub path: String,
    /// Identity of the peer that sent the request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub requester: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Query parameters, merged from the `params` field and the path's query string.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub params: Map<String, Value>,
    /// Values captured by the matched route's `:name` segments.
    #[serde(default, skip_serializing, deserialize_with = "null_as_default")]
    pub path_params: HashMap<String, String>,
}

impl PipeRequest {
    /// Creates a request with no body and no parameters.
    pub fn new(id: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method,
            path: path.into(),
            requester: String::new(),
            body: None,
            params: Map::new(),
            path_params: HashMap::new(),
        }
    }

    /// Decodes a request received from `requester` and normalizes its path.
    ///
    /// Whatever `requester` or `pathParams` the sender put in the payload is
    /// discarded.
    pub fn decode(raw: &str, requester: &str) -> Result<Self, MalformedMessage> {
        let mut request: Self = serde_json::from_str(raw)?;
        request.requester = requester.to_string();
        request.path_params.clear();
        request.normalize()?;
        Ok(request)
    }

    /// Encodes this request as JSON text.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Normalizes the path in place.
    ///
    /// Prepends a missing leading `/`, strips the query string and merges its
    /// pairs into [`params`](Self::params). Query values win over
    /// same-named entries that were declared in `params`.
    pub fn normalize(&mut self) -> Result<(), MalformedMessage> {
        if !self.path.starts_with('/') {
            self.path.insert(0, '/');
        }

        let url = Url::parse(&format!("{PATH_BASE}{}", self.path)).map_err(|e| {
            MalformedMessage::InvalidPath {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        for (key, value) in url.query_pairs() {
            self.params
                .insert(key.into_owned(), Value::String(value.into_owned()));
        }
        self.path = url.path().to_string();

        Ok(())
    }

    /// Returns a captured path parameter.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Returns a query parameter.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// SendRequest
// =============================================================================

/// An outbound request, before a correlation id is assigned.
///
/// ```rust,ignore
/// let req = SendRequest::get("/offers/42")
///     .param("fields", "name")
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub method: Method,
    /// Path, optionally carrying a query string.
    pub path: String,
    pub body: Option<Value>,
    pub params: Map<String, Value>,
    /// How long to wait for the reply. Local only, never serialized.
    pub timeout: Option<Duration>,
}

impl SendRequest {
    /// Creates a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            params: Map::new(),
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Sets the body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Overrides the reply timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Turns this into a request envelope carrying `id`.
    pub fn into_request(self, id: impl Into<String>) -> PipeRequest {
        PipeRequest {
            id: id.into(),
            method: self.method,
            path: self.path,
            requester: String::new(),
            body: self.body,
            params: self.params,
            path_params: HashMap::new(),
        }
    }
}
