use regex::Regex;
use std::collections::HashMap;

/// A route pattern: literal text, `:name` captures, and `*` splats.
///
/// `:name` captures one path segment (anything up to the next `/`); `*`
/// captures lazily across segment boundaries. Patterns compile to anchored
/// regexes once, at registration time; inputs are length-bounded by the
/// codec, so matching cost stays proportional to the path.
#[derive(Debug, Clone)]
pub(crate) struct PathPattern {
    raw: String,
    regex: Regex,
    captures: Vec<CaptureKind>,
}

#[derive(Debug, Clone)]
enum CaptureKind {
    Param(String),
    Splat,
}

/// Captures extracted by a successful match.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PathMatch {
    /// Named `:param` captures.
    pub(crate) params: HashMap<String, String>,
    /// `*` captures, in pattern order.
    pub(crate) splats: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern.
    pub(crate) fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut captures = Vec::new();
        let mut rest = pattern;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix(':') {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                if end == 0 {
                    // a bare `:` is a literal
                    source.push_str(&regex::escape(":"));
                    rest = after;
                    continue;
                }
                captures.push(CaptureKind::Param(after[..end].to_owned()));
                source.push_str("([^/]+)");
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('*') {
                captures.push(CaptureKind::Splat);
                source.push_str("(.*?)");
                rest = after;
            } else {
                let end = rest.find([':', '*']).unwrap_or(rest.len());
                source.push_str(&regex::escape(&rest[..end]));
                rest = &rest[end..];
            }
        }
        source.push('$');
        Ok(Self {
            raw: pattern.to_owned(),
            regex: Regex::new(&source)?,
            captures,
        })
    }

    /// The pattern text as registered.
    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a concrete path, extracting params and splats.
    pub(crate) fn matches(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;
        let mut matched = PathMatch::default();
        for (kind, capture) in self.captures.iter().zip(caps.iter().skip(1)) {
            let text = capture.map(|m| m.as_str().to_owned()).unwrap_or_default();
            match kind {
                CaptureKind::Param(name) => {
                    matched.params.insert(name.clone(), text);
                }
                CaptureKind::Splat => matched.splats.push(text),
            }
        }
        Some(matched)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pattern(p: &str) -> PathPattern {
        PathPattern::parse(p).unwrap()
    }

    #[test]
    fn literal_patterns_match_exactly() {
        let p = pattern("/hello");
        assert_eq!(p.matches("/hello"), Some(PathMatch::default()));
        assert_eq!(p.matches("/hello/there"), None);
        assert_eq!(p.matches("/hell"), None);
        assert_eq!(p.matches("hello"), None);
    }

    #[test]
    fn params_capture_single_segments() {
        let p = pattern("/users/:id/posts/:post");
        let m = p.matches("/users/7/posts/42").unwrap();
        assert_eq!(m.params["id"], "7");
        assert_eq!(m.params["post"], "42");
        assert!(m.splats.is_empty());
        assert_eq!(p.matches("/users/7/posts"), None);
        // params never span a slash
        assert_eq!(p.matches("/users/7/8/posts/42"), None);
    }

    #[test]
    fn splats_capture_across_segments() {
        let p = pattern("/hello/:who/*");
        let m = p.matches("/hello/me/whatever").unwrap();
        assert_eq!(m.params["who"], "me");
        assert_eq!(m.splats, vec!["whatever"]);

        let m = p.matches("/hello/me/a/b/c").unwrap();
        assert_eq!(m.splats, vec!["a/b/c"]);
    }

    #[test]
    fn multiple_splats_are_ordered_and_lazy() {
        let p = pattern("/files/*/raw/*");
        let m = p.matches("/files/a/b/raw/c/d").unwrap();
        assert_eq!(m.splats, vec!["a/b", "c/d"]);
    }

    #[test]
    fn regex_metacharacters_in_literals_are_inert() {
        let p = pattern("/v1.0/items");
        assert!(p.matches("/v1.0/items").is_some());
        assert_eq!(p.matches("/v1x0/items"), None);
    }

    #[test]
    fn bare_colon_is_a_literal() {
        let p = pattern("/a/:/b");
        assert!(p.matches("/a/:/b").is_some());
        assert_eq!(p.matches("/a/x/b"), None);
    }
}
