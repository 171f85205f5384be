//! Route pattern parsing.
//!
//! A pattern is a sequence of literal segments with at most one trailing
//! wildcard segment. `*` captures anonymously under the name `"*"`; a
//! `:name` segment in last position captures under `name`. The capture
//! receives the remaining path suffix verbatim, separators included.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must start with '/'")]
    MissingLeadingSlash,
    #[error("wildcard segment {0:?} is only allowed in last position")]
    InteriorWildcard(String),
    #[error("empty capture name")]
    EmptyCaptureName,
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    literals: Vec<String>,
    capture: Option<String>,
    source: String,
}

impl RoutePattern {
    /// Parse a pattern string such as `/static/*` or `/user/:id`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut literals = Vec::with_capacity(segments.len());
        let mut capture = None;

        for (index, segment) in segments.iter().enumerate() {
            let last = index == segments.len() - 1;
            if *segment == "*" || segment.starts_with(':') {
                if !last {
                    return Err(PatternError::InteriorWildcard(segment.to_string()));
                }
                let name = if *segment == "*" { "*" } else { &segment[1..] };
                if name.is_empty() {
                    return Err(PatternError::EmptyCaptureName);
                }
                capture = Some(name.to_string());
            } else {
                literals.push(segment.to_string());
            }
        }

        Ok(Self {
            literals,
            capture,
            source: pattern.to_string(),
        })
    }

    /// Literal segments, in order.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    /// Name of the trailing capture, if the pattern has one.
    pub fn capture(&self) -> Option<&str> {
        self.capture.as_deref()
    }

    /// The pattern as registered, for diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_pattern() {
        let p = RoutePattern::parse("/api/v1/users").unwrap();
        assert_eq!(p.literals(), ["api", "v1", "users"]);
        assert_eq!(p.capture(), None);
    }

    #[test]
    fn parses_trailing_star() {
        let p = RoutePattern::parse("/static/*").unwrap();
        assert_eq!(p.literals(), ["static"]);
        assert_eq!(p.capture(), Some("*"));
    }

    #[test]
    fn parses_named_capture() {
        let p = RoutePattern::parse("/user/:id").unwrap();
        assert_eq!(p.literals(), ["user"]);
        assert_eq!(p.capture(), Some("id"));
    }

    #[test]
    fn root_pattern_is_empty() {
        let p = RoutePattern::parse("/").unwrap();
        assert!(p.literals().is_empty());
        assert_eq!(p.capture(), None);
    }

    #[test]
    fn rejects_interior_wildcard() {
        assert_eq!(
            RoutePattern::parse("/a/*/b").unwrap_err(),
            PatternError::InteriorWildcard("*".to_string())
        );
        assert_eq!(
            RoutePattern::parse("/a/:x/b").unwrap_err(),
            PatternError::InteriorWildcard(":x".to_string())
        );
    }

    #[test]
    fn rejects_missing_slash_and_empty_name() {
        assert_eq!(
            RoutePattern::parse("no-slash").unwrap_err(),
            PatternError::MissingLeadingSlash
        );
        assert_eq!(
            RoutePattern::parse("/a/:").unwrap_err(),
            PatternError::EmptyCaptureName
        );
    }
}
