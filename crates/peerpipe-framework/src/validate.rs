//! Typed extraction of request bodies and parameters.
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct NewOffer { title: String, price: u64 }
//!
//! async fn create(req: PipeRequest) -> Result<HandlerResponse, PipeError> {
//!     let offer: NewOffer = parse_body(&req)?;
//!     // ...
//! }
//! ```
//!
//! A value that does not fit the target type is answered with
//! `400 { "message": "Validation error", "body": [issues] }`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_path_to_error::Segment;

use peerpipe_core::{PipeError, PipeRequest};

/// One problem found in a request value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field path from the root of the value. Empty for the value itself.
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl IntoIterator<Item = impl Into<String>>, message: impl Into<String>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// An issue about the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    fn from_serde(err: &serde_path_to_error::Error<serde_json::Error>) -> Self {
        let message = err.inner().to_string();
        let mut path: Vec<String> = err
            .path()
            .iter()
            .filter_map(|segment| match segment {
                Segment::Map { key } => Some(key.clone()),
                Segment::Seq { index } => Some(index.to_string()),
                Segment::Enum { variant } => Some(variant.clone()),
                _ => None,
            })
            .collect();

        // A missing field is reported at its parent, so append the field name.
        if let Some(field) = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            path.push(field.to_string());
        }

        Self { path, message }
    }
}

/// Additional checks a typed value runs after deserialization.
pub trait Validate {
    /// Returns every issue found. An empty list means the value is valid.
    fn validate(&self) -> Vec<ValidationIssue>;
}

/// Builds the 400 error for a list of issues.
pub fn validation_error(issues: &[ValidationIssue]) -> PipeError {
    PipeError::validation(serde_json::to_value(issues).unwrap_or(Value::Array(Vec::new())))
}

fn parse_value<T: DeserializeOwned>(value: Value) -> Result<T, PipeError> {
    serde_path_to_error::deserialize(value)
        .map_err(|e| validation_error(&[ValidationIssue::from_serde(&e)]))
}

/// Deserializes the request body. A missing body is treated as `null`.
pub fn parse_body<T: DeserializeOwned>(request: &PipeRequest) -> Result<T, PipeError> {
    parse_value(request.body.clone().unwrap_or(Value::Null))
}

/// Deserializes the request's query parameters.
pub fn parse_params<T: DeserializeOwned>(request: &PipeRequest) -> Result<T, PipeError> {
    parse_value(Value::Object(request.params.clone()))
}

/// Deserializes the request body and runs its [`Validate`] checks.
pub fn parse_validated_body<T>(request: &PipeRequest) -> Result<T, PipeError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = parse_body(request)?;
    let issues = value.validate();
    if issues.is_empty() {
        Ok(value)
    } else {
        Err(validation_error(&issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerpipe_core::{Method, ResponseCode};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct NewOffer {
        title: String,
        price: u64,
    }

    impl Validate for NewOffer {
        fn validate(&self) -> Vec<ValidationIssue> {
            let mut issues = Vec::new();
            if self.title.trim().is_empty() {
                issues.push(ValidationIssue::new(["title"], "must not be blank"));
            }
            if self.price == 0 {
                issues.push(ValidationIssue::new(["price"], "must be positive"));
            }
            issues
        }
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        limit: u32,
        #[serde(default)]
        cursor: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct OrderLine {
        sku: String,
        qty: u32,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Order {
        lines: Vec<OrderLine>,
    }

    fn with_body(body: Value) -> PipeRequest {
        let mut req = PipeRequest::new("v1", Method::Post, "/offers");
        req.body = Some(body);
        req
    }

    #[test]
    fn test_parse_body() {
        let req = with_body(json!({"title": "Bike", "price": 120}));
        let offer: NewOffer = parse_body(&req).unwrap();
        assert_eq!(offer.title, "Bike");
    }

    #[test]
    fn test_missing_field_is_reported_with_path() {
        let req = with_body(json!({"title": "Bike"}));
        let err = parse_body::<NewOffer>(&req).unwrap_err();
        assert_eq!(err.code, ResponseCode::BAD_REQUEST);

        let body = err.body.unwrap();
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["body"][0]["path"], json!(["price"]));
    }

    #[test]
    fn test_type_mismatch_is_reported_with_path() {
        let req = with_body(json!({"title": "gpu", "price": "cheap"}));
        let err = parse_body::<NewOffer>(&req).unwrap_err();

        let issue = &err.body.unwrap()["body"][0];
        assert_eq!(issue["path"], json!(["price"]));
        assert_eq!(
            issue["message"],
            "invalid type: string \"cheap\", expected u64"
        );
    }

    #[test]
    fn test_nested_field_is_reported_with_full_path() {
        let req = with_body(json!({
            "lines": [
                {"sku": "a-1", "qty": 2},
                {"sku": "b-2", "qty": -1}
            ]
        }));
        let err = parse_body::<Order>(&req).unwrap_err();
        assert_eq!(err.body.unwrap()["body"][0]["path"], json!(["lines", "1", "qty"]));

        let req = with_body(json!({"lines": [{"qty": 1}]}));
        let err = parse_body::<Order>(&req).unwrap_err();
        assert_eq!(err.body.unwrap()["body"][0]["path"], json!(["lines", "0", "sku"]));
    }

    #[test]
    fn test_missing_body_fails_validation() {
        let req = PipeRequest::new("v1", Method::Post, "/offers");
        let err = parse_body::<NewOffer>(&req).unwrap_err();
        assert_eq!(err.code, ResponseCode::BAD_REQUEST);
        assert_eq!(err.body.unwrap()["body"][0]["path"], json!([]));
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let req = with_body(json!({"title": "  ", "price": 0}));
        let err = parse_validated_body::<NewOffer>(&req).unwrap_err();
        assert_eq!(
            err.body,
            Some(json!({
                "message": "Validation error",
                "body": [
                    {"path": ["title"], "message": "must not be blank"},
                    {"path": ["price"], "message": "must be positive"}
                ]
            }))
        );
    }

    #[test]
    fn test_parse_params() {
        let mut req = PipeRequest::new("v1", Method::Get, "/offers");
        req.params.insert("limit".into(), json!(10));
        let paging: Paging = parse_params(&req).unwrap();
        assert_eq!(paging.limit, 10);
        assert!(paging.cursor.is_none());
    }
}
