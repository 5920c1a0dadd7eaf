//! Origin policy applied to upgrade requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::ConfigError;

/// Placeholder substituted with the (escaped) request host.
const HOST_PLACEHOLDER: &str = "{{host}}";

/// Same-host policy: the origin must be the request host over http or https.
pub const DEFAULT_ORIGIN_PATTERN: &str = "^https?://{{host}}$";

/// Distinct hosts whose compiled pattern is kept. The `Host` header is
/// client-controlled, so requests past this many hosts compile uncached.
const MAX_CACHED_HOSTS: usize = 64;

/// Predicate deciding which `Origin` headers may open a socket.
///
/// A request that carries no `Origin` header is always allowed: the check
/// exists to stop cross-site pages from hijacking a browser session, and
/// browsers always send the header.
#[derive(Clone)]
pub enum OriginPolicy {
    /// Regular expression matched against the origin. `{{host}}` is replaced
    /// with the request's `Host` header before compiling.
    Pattern(OriginPattern),
    /// Exact origins, compared case-insensitively.
    List(Vec<String>),
    /// Any origin.
    Any,
    /// Caller-supplied predicate over `(origin, host)`.
    Custom(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>),
}

impl OriginPolicy {
    /// Build a pattern policy. See [`DEFAULT_ORIGIN_PATTERN`] for the syntax.
    pub fn pattern(source: impl Into<String>) -> Self {
        Self::Pattern(OriginPattern::new(source))
    }

    /// Build a policy from a custom predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Whether `origin` may connect to a server reached as `host`.
    pub fn allows(&self, origin: Option<&str>, host: &str) -> bool {
        let Some(origin) = origin else {
            return true;
        };

        match self {
            Self::Any => true,
            Self::List(allowed) => allowed.iter().any(|o| o.eq_ignore_ascii_case(origin)),
            Self::Pattern(pattern) => pattern.is_match(origin, host),
            Self::Custom(f) => f(origin, host),
        }
    }

    /// Check that a pattern policy compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Pattern(pattern) = self {
            compile(pattern.as_str(), "localhost").map_err(|e| ConfigError::InvalidOriginPattern {
                pattern: pattern.as_str().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Origin regex with `{{host}}` substitution, compiled at most once per host.
///
/// Clones share the compiled cache.
#[derive(Clone)]
pub struct OriginPattern {
    source: String,
    host_dependent: bool,
    compiled: Arc<RwLock<HashMap<String, Regex>>>,
}

impl OriginPattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            host_dependent: source.contains(HOST_PLACEHOLDER),
            source,
            compiled: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `origin` against the pattern instantiated for `host`. A pattern
    /// that does not compile matches nothing.
    pub fn is_match(&self, origin: &str, host: &str) -> bool {
        let key = if self.host_dependent { host } else { "" };

        if let Some(re) = self.compiled.read().get(key) {
            return re.is_match(origin);
        }

        let Ok(re) = compile(&self.source, key) else {
            return false;
        };
        let matched = re.is_match(origin);

        let mut compiled = self.compiled.write();
        if compiled.len() < MAX_CACHED_HOSTS {
            compiled.insert(key.to_string(), re);
        }
        matched
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.compiled.read().len()
    }
}

fn compile(pattern: &str, host: &str) -> Result<Regex, regex::Error> {
    Regex::new(&pattern.replace(HOST_PLACEHOLDER, &regex::escape(host)))
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::pattern(DEFAULT_ORIGIN_PATTERN)
    }
}

impl fmt::Debug for OriginPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(p) => f.debug_tuple("Pattern").field(&p.as_str()).finish(),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Any => f.write_str("Any"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_same_host() {
        let policy = OriginPolicy::default();
        assert!(policy.allows(Some("http://localhost:3000"), "localhost:3000"));
        assert!(policy.allows(Some("https://localhost:3000"), "localhost:3000"));
    }

    #[test]
    fn test_default_rejects_cross_origin() {
        let policy = OriginPolicy::default();
        assert!(!policy.allows(Some("http://somewhere.com"), "localhost:3000"));
        assert!(!policy.allows(Some("http://localhost:3000.evil.com"), "localhost:3000"));
        assert!(!policy.allows(Some("ws://localhost:3000"), "localhost:3000"));
    }

    #[test]
    fn test_host_is_escaped() {
        let policy = OriginPolicy::default();
        assert!(!policy.allows(Some("http://127a0a0a1:80"), "127.0.0.1:80"));
    }

    #[test]
    fn test_missing_origin_allowed() {
        assert!(OriginPolicy::default().allows(None, "localhost"));
        assert!(OriginPolicy::List(vec![]).allows(None, "localhost"));
    }

    #[test]
    fn test_list_policy() {
        let policy = OriginPolicy::List(vec!["https://app.example.com".to_string()]);
        assert!(policy.allows(Some("https://APP.example.com"), "api.example.com"));
        assert!(!policy.allows(Some("https://other.example.com"), "api.example.com"));
    }

    #[test]
    fn test_any_policy() {
        assert!(OriginPolicy::Any.allows(Some("http://somewhere.com"), "localhost"));
    }

    #[test]
    fn test_custom_policy() {
        let policy = OriginPolicy::custom(|origin, _host| origin.ends_with(".internal"));
        assert!(policy.allows(Some("http://svc.internal"), "localhost"));
        assert!(!policy.allows(Some("http://svc.public"), "localhost"));
        assert_eq!(format!("{:?}", policy), "Custom(..)");
    }

    #[test]
    fn test_invalid_pattern() {
        let policy = OriginPolicy::pattern("^(unclosed");
        assert!(policy.validate().is_err());
        assert!(!policy.allows(Some("http://localhost"), "localhost"));
        assert!(OriginPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_pattern_compiled_once_per_host() {
        let pattern = OriginPattern::new(DEFAULT_ORIGIN_PATTERN);
        assert!(pattern.is_match("http://localhost:3000", "localhost:3000"));
        assert!(!pattern.is_match("http://evil.example", "localhost:3000"));
        assert_eq!(pattern.cached(), 1);

        assert!(pattern.is_match("https://api.example.com", "api.example.com"));
        assert_eq!(pattern.cached(), 2);

        // Clones share the cache.
        let clone = pattern.clone();
        assert!(clone.is_match("http://localhost:3000", "localhost:3000"));
        assert_eq!(pattern.cached(), 2);
    }

    #[test]
    fn test_host_independent_pattern_compiled_once() {
        let pattern = OriginPattern::new(r"^https://[a-z]+\.example\.com$");
        for host in ["a:1", "b:2", "c:3"] {
            assert!(pattern.is_match("https://app.example.com", host));
        }
        assert_eq!(pattern.cached(), 1);
    }

    #[test]
    fn test_pattern_cache_is_bounded() {
        let pattern = OriginPattern::new(DEFAULT_ORIGIN_PATTERN);
        for i in 0..MAX_CACHED_HOSTS + 10 {
            let host = format!("host{}:80", i);
            assert!(pattern.is_match(&format!("http://{}", host), &host));
        }
        assert_eq!(pattern.cached(), MAX_CACHED_HOSTS);
    }
}
