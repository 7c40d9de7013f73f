//! Response envelopes and the vocabulary shared by requests and responses.
//!
//! Every frame on the wire is a JSON document. A response looks like:
//!
//! ```text
//! { "id": "0190f...", "code": 200, "body": { ... } }
//! ```
//!
//! The `id` always echoes the id of the request it answers.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedMessage;

// =============================================================================
// Method
// =============================================================================

/// Request method of a pipe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// All methods, in wire order.
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
    ];

    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pipe method '{s}'"))
    }
}

// =============================================================================
// ResponseCode
// =============================================================================

/// Status code of a pipe response.
///
/// The protocol pre-defines a handful of codes, but any integer decodes so
/// that a client never discards a reply because of an unexpected status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCode(pub u16);

impl ResponseCode {
    pub const OK: Self = Self(200);
    pub const BAD_REQUEST: Self = Self(400);
    pub const NOT_AUTHORIZED: Self = Self(401);
    pub const NOT_FOUND: Self = Self(404);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    /// Returns the numeric code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for 2xx codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Returns the canonical reason phrase for pre-defined codes.
    pub fn reason(&self) -> Option<&'static str> {
        match *self {
            Self::OK => Some("OK"),
            Self::BAD_REQUEST => Some("Bad Request"),
            Self::NOT_AUTHORIZED => Some("Not Authorized"),
            Self::NOT_FOUND => Some("Not Found"),
            Self::INTERNAL_SERVER_ERROR => Some("Internal Server Error"),
            _ => None,
        }
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::OK
    }
}

impl From<u16> for ResponseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} {reason}", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

// =============================================================================
// PipeResponse
// =============================================================================

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeResponse {
    /// Id of the request this response answers.
    pub id: String,
    /// Status code.
    pub code: ResponseCode,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl PipeResponse {
    /// Creates a response without a body.
    pub fn new(id: impl Into<String>, code: ResponseCode) -> Self {
        Self {
            id: id.into(),
            code,
            body: None,
        }
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Creates the 404 response for a request no route accepted.
    pub fn not_found(id: impl Into<String>, method: Method, path: &str) -> Self {
        Self::new(id, ResponseCode::NOT_FOUND).with_body(serde_json::json!({
            "message": format!("{method} {path} is not found"),
        }))
    }

    /// Creates the opaque 500 response. Details never go on the wire.
    pub fn internal_error(id: impl Into<String>) -> Self {
        Self::new(id, ResponseCode::INTERNAL_SERVER_ERROR).with_body(serde_json::json!({
            "message": "Internal server error",
        }))
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Deserializes the body into `T`. A missing body is treated as `null`.
    pub fn body_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone().unwrap_or(Value::Null))
    }

    /// Decodes a response envelope from raw message text.
    pub fn decode(raw: &str) -> Result<Self, MalformedMessage> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encodes this response as JSON text.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// HandlerResponse
// =============================================================================

/// What a route handler hands back to the dispatcher.
///
/// The dispatcher lays this over a default `{ code: 200 }` and always stamps
/// the original request id on the outgoing envelope, so a handler has no way
/// to answer under another id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerResponse {
    pub code: ResponseCode,
    pub body: Option<Value>,
}

impl HandlerResponse {
    /// A 200 response carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self {
            code: ResponseCode::OK,
            body: Some(body),
        }
    }

    /// A response with the given code and no body.
    pub fn with_code(code: ResponseCode) -> Self {
        Self { code, body: None }
    }

    /// Sets the body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Builds the wire envelope answering request `id`.
    pub fn into_response(self, id: impl Into<String>) -> PipeResponse {
        PipeResponse {
            id: id.into(),
            code: self.code,
            body: self.body,
        }
    }
}
