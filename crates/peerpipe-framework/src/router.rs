//! Path-based routing.
//!
//! A [`Router`] holds route entries in registration order. Each entry is one
//! compiled [`PathPattern`] plus the handlers registered for it, keyed by
//! method.
//!
//! # Pattern syntax
//!
//! Literal segments plus `:name` captures, each matching exactly one
//! non-empty segment:
//!
//! ```text
//! /offers                 matches /offers and /offers/
//! /offers/:id             matches /offers/42          (id = "42")
//! /offers/:id/bids/:bid   matches /offers/7/bids/3    (id = "7", bid = "3")
//! ```
//!
//! # First path match wins
//!
//! Lookup stops at the first entry whose pattern matches the path, even if
//! that entry has no handler for the requested method. Such a request is not
//! found; later entries that would also match are never consulted.
//!
//! ```rust,ignore
//! router.get("/offers/:id", get_offer)?;
//! router.post("/offers/new", create_offer)?;
//!
//! // POST /offers/new hits the first entry, which only knows GET: not found.
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use tracing::trace;

use crate::error::RouteError;
use crate::handler::{BoxedHandler, IntoHandlerResult, into_handler};
use peerpipe_core::{Method, PipeRequest};

// =============================================================================
// PathPattern
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a pattern. A missing leading `/` is added.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let raw = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{pattern}")
        };

        if raw.contains(['?', '#']) {
            return Err(RouteError::invalid(pattern, "patterns cannot contain a query or fragment"));
        }

        let mut segments = Vec::new();
        for part in split_segments(&raw) {
            match part.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty() {
                        return Err(RouteError::invalid(pattern, "empty parameter name"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(RouteError::invalid(
                            pattern,
                            format!("parameter name '{name}' must be alphanumeric"),
                        ));
                    }
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(RouteError::invalid(
                            pattern,
                            format!("duplicate parameter name '{name}'"),
                        ));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self { raw, segments })
    }

    /// Returns the pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the capture names, in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches a normalized path, returning the captured parameters.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let decoded = percent_decode_str(part).decode_utf8_lossy();
            match segment {
                Segment::Literal(literal) => {
                    if decoded != literal.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }
        Some(params)
    }

    /// Returns true if the path matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits a path into segments, tolerating one trailing slash.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let mut parts = trimmed.split('/');
    if trimmed.is_empty() {
        // Root path: no segments at all.
        parts.next();
    }
    parts
}

// =============================================================================
// Router
// =============================================================================

struct RouteEntry {
    pattern: PathPattern,
    handlers: HashMap<Method, BoxedHandler>,
}

/// Result of a route lookup.
pub enum RouteMatch {
    /// A handler accepts the request.
    Found {
        /// The handler to invoke.
        handler: BoxedHandler,
        /// Captured path parameters.
        path_params: HashMap<String, String>,
        /// The pattern that matched.
        pattern: String,
    },
    /// No route accepts the request.
    NotFound,
}

impl RouteMatch {
    /// Returns true if a handler was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found {
                path_params,
                pattern,
                ..
            } => f
                .debug_struct("Found")
                .field("pattern", pattern)
                .field("path_params", path_params)
                .finish(),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// An ordered registry of routes.
#[derive(Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
}

/// A router shared between the session and its dispatcher.
pub type SharedRouter = Arc<RwLock<Router>>;

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `handler` for `method` on `pattern`.
    ///
    /// Registering the exact same pattern string again adds (or replaces) a
    /// method on the existing entry, keeping its original position.
    pub fn route<F, Fut, R>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route_boxed(method, pattern, into_handler(handler))
    }

    /// Registers a pre-built boxed handler.
    pub fn route_boxed(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<&mut Self, RouteError> {
        let compiled = PathPattern::parse(pattern)?;

        match self
            .entries
            .iter_mut()
            .find(|e| e.pattern.as_str() == compiled.as_str())
        {
            Some(entry) => {
                entry.handlers.insert(method, handler);
            }
            None => {
                self.entries.push(RouteEntry {
                    pattern: compiled,
                    handlers: HashMap::from([(method, handler)]),
                });
            }
        }
        Ok(self)
    }

    pub fn get<F, Fut, R>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post<F, Fut, R>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put<F, Fut, R>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Put, pattern, handler)
    }

    pub fn patch<F, Fut, R>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Patch, pattern, handler)
    }

    pub fn delete<F, Fut, R>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Delete, pattern, handler)
    }

    /// Looks up the handler for `method` on a normalized `path`.
    pub fn find(&self, method: Method, path: &str) -> RouteMatch {
        for entry in &self.entries {
            let Some(path_params) = entry.pattern.captures(path) else {
                continue;
            };

            return match entry.handlers.get(&method) {
                Some(handler) => RouteMatch::Found {
                    handler: Arc::clone(handler),
                    path_params,
                    pattern: entry.pattern.as_str().to_string(),
                },
                None => {
                    trace!(
                        pattern = %entry.pattern,
                        method = %method,
                        "Path matched but method has no handler, stopping lookup"
                    );
                    RouteMatch::NotFound
                }
            };
        }
        RouteMatch::NotFound
    }

    /// Returns the number of route entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the registered patterns, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Wraps this router for sharing.
    pub fn into_shared(self) -> SharedRouter {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_req: PipeRequest) {}

    #[test]
    fn test_pattern_captures() {
        let p = PathPattern::parse("/offers/:id/bids/:bid").unwrap();
        let params = p.captures("/offers/7/bids/3").unwrap();
        assert_eq!(params["id"], "7");
        assert_eq!(params["bid"], "3");
        assert_eq!(p.param_names().collect::<Vec<_>>(), vec!["id", "bid"]);
        assert!(p.captures("/offers/7/bids").is_none());
        assert!(p.captures("/offers/7/asks/3").is_none());
    }

    #[test]
    fn test_pattern_tolerates_trailing_slash() {
        let p = PathPattern::parse("/offers").unwrap();
        assert!(p.is_match("/offers"));
        assert!(p.is_match("/offers/"));
        assert!(!p.is_match("/offers/1"));
    }

    #[test]
    fn test_root_pattern() {
        let p = PathPattern::parse("/").unwrap();
        assert!(p.is_match("/"));
        assert!(!p.is_match("/x"));
    }

    #[test]
    fn test_pattern_leading_slash_added() {
        let p = PathPattern::parse("offers/:id").unwrap();
        assert_eq!(p.as_str(), "/offers/:id");
        assert!(p.is_match("/offers/1"));
    }

    #[test]
    fn test_capture_is_url_decoded_and_non_empty() {
        let p = PathPattern::parse("/users/:name").unwrap();
        let params = p.captures("/users/j%C3%B6rg%20m").unwrap();
        assert_eq!(params["name"], "jörg m");
        assert!(p.captures("/users//").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("/a/:").is_err());
        assert!(PathPattern::parse("/a/:id/:id").is_err());
        assert!(PathPattern::parse("/a/:na-me").is_err());
        assert!(PathPattern::parse("/a?x=1").is_err());
    }

    #[test]
    fn test_find_by_method() {
        let mut router = Router::new();
        router.get("/offers/:id", noop).unwrap();
        router.delete("/offers/:id", noop).unwrap();
        assert_eq!(router.len(), 1);

        assert!(router.find(Method::Get, "/offers/1").is_found());
        assert!(router.find(Method::Delete, "/offers/1").is_found());
        assert!(!router.find(Method::Put, "/offers/1").is_found());
        assert!(!router.find(Method::Get, "/bids/1").is_found());
    }

    #[test]
    fn test_first_path_match_wins_even_without_method() {
        let mut router = Router::new();
        router.get("/offers/:id", noop).unwrap();
        router.post("/offers/new", noop).unwrap();

        // The second entry would accept this, but the first path match ends the lookup.
        assert!(!router.find(Method::Post, "/offers/new").is_found());
        assert!(router.find(Method::Get, "/offers/new").is_found());
    }

    #[test]
    fn test_registration_order_decides() {
        let mut router = Router::new();
        router.get("/offers/new", noop).unwrap();
        router.get("/offers/:id", noop).unwrap();

        match router.find(Method::Get, "/offers/new") {
            RouteMatch::Found {
                pattern,
                path_params,
                ..
            } => {
                assert_eq!(pattern, "/offers/new");
                assert!(path_params.is_empty());
            }
            RouteMatch::NotFound => panic!("expected a match"),
        }
    }

    #[test]
    fn test_reregistering_pattern_keeps_position() {
        let mut router = Router::new();
        router.get("/a", noop).unwrap();
        router.get("/b", noop).unwrap();
        router.post("/a", noop).unwrap();
        assert_eq!(router.patterns().collect::<Vec<_>>(), vec!["/a", "/b"]);
    }
}
