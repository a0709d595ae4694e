//! Path normalization.
//!
//! A request path such as `/blog/read/id/5.html` becomes the canonical
//! pipe-delimited form `blog|read|id|5`, with its suffix recorded apart.

use crate::error::RouteError;

/// Canonical delimiter between path segments after normalization.
pub const DELIMITER: char = '|';

/// Which URL suffixes may be stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixPolicy {
    /// Any suffix is accepted and stripped.
    Any,
    /// Only the listed suffixes are accepted; others are rejected.
    Only(Vec<String>),
}

impl SuffixPolicy {
    /// Parses a `|`-separated list such as `html|json`; empty means any.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        let suffixes: Vec<String> = list
            .split('|')
            .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if suffixes.is_empty() {
            Self::Any
        } else {
            Self::Only(suffixes)
        }
    }

    fn allows(&self, suffix: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(list) => list.iter().any(|s| s.eq_ignore_ascii_case(suffix)),
        }
    }
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self::Only(vec!["html".to_string()])
    }
}

/// A normalized path.
///
/// # Example
///
/// ```rust
/// use tessera_router::{PathInfo, SuffixPolicy};
///
/// let path = PathInfo::parse("/blog/read/id/5.html", "/", &SuffixPolicy::default()).unwrap();
/// assert_eq!(path.url(), "blog|read|id|5");
/// assert_eq!(path.suffix(), Some("html"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    url: String,
    suffix: Option<String>,
}

impl PathInfo {
    /// Normalizes a path.
    ///
    /// `depr` is the configured segment separator. A suffix is the text after
    /// the last `.` of the final segment. Suffixes named in `always` are
    /// accepted even when the policy does not list them.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::SuffixNotAllowed`] when the path has a suffix
    /// the policy rejects.
    pub fn parse(pathinfo: &str, depr: &str, policy: &SuffixPolicy) -> Result<Self, RouteError> {
        Self::parse_with(pathinfo, depr, policy, &[])
    }

    /// Like [`parse`](Self::parse), additionally accepting `always`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::SuffixNotAllowed`] for rejected suffixes.
    pub fn parse_with(
        pathinfo: &str,
        depr: &str,
        policy: &SuffixPolicy,
        always: &[&str],
    ) -> Result<Self, RouteError> {
        let trimmed = pathinfo.trim_matches('/');
        let (path, suffix) = match split_suffix(trimmed, depr) {
            Some((path, suffix)) => {
                let accepted = policy.allows(suffix)
                    || always.iter().any(|s| s.eq_ignore_ascii_case(suffix));
                if !accepted {
                    return Err(RouteError::SuffixNotAllowed(suffix.to_string()));
                }
                (path, Some(suffix.to_ascii_lowercase()))
            }
            None => (trimmed, None),
        };

        let url = if depr.is_empty() {
            path.to_string()
        } else {
            path.replace(depr, "|")
        };
        Ok(Self {
            url: url.trim_matches(DELIMITER).to_string(),
            suffix,
        })
    }

    /// Returns the pipe-delimited path.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the stripped suffix, lower-cased.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Iterates the non-empty segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.url.split(DELIMITER).filter(|s| !s.is_empty())
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.url.is_empty()
    }
}

fn split_suffix<'a>(path: &'a str, depr: &str) -> Option<(&'a str, &'a str)> {
    let after_slash = path.rfind('/').map_or(0, |i| i + 1);
    let after_depr = if depr.is_empty() {
        0
    } else {
        path.rfind(depr).map_or(0, |i| i + depr.len())
    };
    let last_segment_start = after_slash.max(after_depr);
    let dot = path[last_segment_start..].rfind('.')? + last_segment_start;
    let suffix = &path[dot + 1..];
    if dot == last_segment_start
        || suffix.is_empty()
        || !suffix.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some((&path[..dot], suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let path = PathInfo::parse("/user/show/", "/", &SuffixPolicy::Any).unwrap();
        assert_eq!(path.url(), "user|show");
        assert_eq!(path.suffix(), None);
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["user", "show"]);
    }

    #[test]
    fn test_root_path() {
        let path = PathInfo::parse("/", "/", &SuffixPolicy::default()).unwrap();
        assert!(path.is_root());
        assert_eq!(path.segments().count(), 0);
    }

    #[test]
    fn test_custom_separator() {
        let path = PathInfo::parse("blog-read-id-5.html", "-", &SuffixPolicy::default()).unwrap();
        assert_eq!(path.url(), "blog|read|id|5");
        assert_eq!(path.suffix(), Some("html"));
    }

    #[test]
    fn test_suffix_policy() {
        let only = SuffixPolicy::parse("html|.json");
        assert_eq!(
            only,
            SuffixPolicy::Only(vec!["html".to_string(), "json".to_string()])
        );
        assert!(PathInfo::parse("user/show.JSON", "/", &only).is_ok());

        let err = PathInfo::parse("user/show.php", "/", &only).unwrap_err();
        assert_eq!(err, RouteError::SuffixNotAllowed("php".to_string()));

        assert!(PathInfo::parse("user/show.php", "/", &SuffixPolicy::parse("")).is_ok());
    }

    #[test]
    fn test_always_accepted_suffix() {
        let path =
            PathInfo::parse_with("user/list.json", "/", &SuffixPolicy::default(), &["json"]).unwrap();
        assert_eq!(path.url(), "user|list");
        assert_eq!(path.suffix(), Some("json"));
    }

    #[test]
    fn test_dot_in_earlier_segment_is_not_a_suffix() {
        let path = PathInfo::parse("admin.user/index", "/", &SuffixPolicy::default()).unwrap();
        assert_eq!(path.url(), "admin.user|index");
        assert_eq!(path.suffix(), None);
    }

    #[test]
    fn test_hidden_file_style_segment_is_not_a_suffix() {
        let path = PathInfo::parse("files/.env", "/", &SuffixPolicy::default()).unwrap();
        assert_eq!(path.url(), "files|.env");
    }
}
