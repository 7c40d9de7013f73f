//! Self-identity checks.
//!
//! Both the dispatcher and the correlator must ignore messages this endpoint
//! authored itself: the transport echoes them back on every subscription.
//! The comparison is configured once and handed to both.

use std::fmt;
use std::sync::Arc;

/// A type-erased identity comparison: `(own, sender) -> is_self`.
pub type IdentityMatchFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// The identity of the local endpoint.
#[derive(Clone)]
pub struct Identity {
    id: String,
    matches: Option<IdentityMatchFn>,
}

impl Identity {
    /// An identity compared by exact string equality.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            matches: None,
        }
    }

    /// An identity compared ignoring ASCII case, as hex account addresses are.
    pub fn case_insensitive(id: impl Into<String>) -> Self {
        Self::with_matcher(id, |own, sender| own.eq_ignore_ascii_case(sender))
    }

    /// An identity compared with a custom function.
    pub fn with_matcher<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            matches: Some(Arc::new(f)),
        }
    }

    /// Returns the identity string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if `sender` denotes this endpoint.
    pub fn is_self(&self, sender: &str) -> bool {
        match &self.matches {
            Some(f) => f(&self.id, sender),
            None => self.id == sender,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("custom_matcher", &self.matches.is_some())
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let me = Identity::new("0xAbC");
        assert!(me.is_self("0xAbC"));
        assert!(!me.is_self("0xabc"));
    }

    #[test]
    fn test_case_insensitive() {
        let me = Identity::case_insensitive("0xAbC");
        assert!(me.is_self("0xabc"));
        assert!(!me.is_self("0xabd"));
    }

    #[test]
    fn test_custom_matcher() {
        let me = Identity::with_matcher("alice", |own, sender| {
            sender.split('/').next() == Some(own)
        });
        assert!(me.is_self("alice/phone"));
        assert!(!me.is_self("bob/alice"));
    }
}
