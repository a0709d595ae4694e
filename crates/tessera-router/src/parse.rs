//! Default `controller|action|key|value` URL parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::RouteError;
use crate::params::Vars;
use crate::text::strip_tags;

/// Controller and action named by a URL, plus its trailing variables.
///
/// Missing segments are `None`; callers substitute their configured
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTarget {
    /// Controller segment, possibly dotted (`admin.user`).
    pub controller: Option<String>,
    /// Action segment.
    pub action: Option<String>,
    /// Variables from trailing `key|value` pairs.
    pub vars: Vars,
}

/// Splits a pipe-delimited URL into controller, action and variables.
///
/// # Example
///
/// ```rust
/// use tessera_router::parse_url;
///
/// let target = parse_url("blog|read|id|5|page|2").unwrap();
/// assert_eq!(target.controller.as_deref(), Some("blog"));
/// assert_eq!(target.action.as_deref(), Some("read"));
/// assert_eq!(target.vars.get("id"), Some("5"));
/// assert_eq!(target.vars.get("page"), Some("2"));
/// ```
///
/// # Errors
///
/// Returns [`RouteError::InvalidController`] when the controller segment
/// does not start with a letter or contains characters other than word
/// characters, `.` and `|`.
pub fn parse_url(url: &str) -> Result<UrlTarget, RouteError> {
    let normalized = url.replace('|', "/");
    let trimmed = normalized.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(UrlTarget::default());
    }

    let mut path = trimmed.split('/');
    let controller = path.next().filter(|s| !s.is_empty()).map(str::to_string);
    if let Some(name) = &controller {
        if !is_controller_name(name) {
            return Err(RouteError::InvalidController(name.clone()));
        }
    }
    let action = path.next().filter(|s| !s.is_empty()).map(str::to_string);
    let rest: Vec<&str> = path.collect();

    Ok(UrlTarget {
        controller,
        action,
        vars: parse_url_vars(&rest.join("|")),
    })
}

/// Parses `key|value|key|value` pairs.
///
/// Keys must be word characters; values lose any markup. An odd trailing
/// segment is ignored.
#[must_use]
pub fn parse_url_vars(rest: &str) -> Vars {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    let pair = PAIR.get_or_init(|| Regex::new(r"(\w+)\|([^|]+)").expect("valid regex"));

    pair.captures_iter(rest)
        .map(|caps| (caps[1].to_string(), strip_tags(&caps[2])))
        .collect()
}

fn is_controller_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '|')
}
