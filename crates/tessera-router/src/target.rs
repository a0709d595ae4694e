//! Resolution of a normalized path into a dispatch target.

use crate::bind::BindTable;
use crate::error::RouteError;
use crate::params::Vars;
use crate::parse::parse_url;
use crate::path::PathInfo;

/// What a request will execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// A controller action; `None` parts take the configured defaults.
    Controller {
        /// Controller name as it appeared in the URL or bind rule.
        controller: Option<String>,
        /// Action name.
        action: Option<String>,
    },
    /// A class resolved directly by its identifier.
    Callback {
        /// Class identifier.
        class: String,
        /// Method name.
        method: Option<String>,
    },
}

/// A resolved target together with the variables gathered on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The target.
    pub target: RouteTarget,
    /// Route variables.
    pub vars: Vars,
    /// The bind rule that produced the target, if any.
    pub rule: Option<String>,
}

/// Resolves a path, trying the bind table before the default URL layout.
///
/// # Example
///
/// ```rust
/// use tessera_router::{resolve, BindTable, PathInfo, RouteTarget, SuffixPolicy};
///
/// let table = BindTable::from_pairs([("user/:id", "@User/show?id=:id")]).unwrap();
/// let path = PathInfo::parse("/user/123", "/", &SuffixPolicy::default()).unwrap();
///
/// let resolution = resolve(&path, Some(&table)).unwrap();
/// assert_eq!(
///     resolution.target,
///     RouteTarget::Controller {
///         controller: Some("User".into()),
///         action: Some("show".into()),
///     }
/// );
/// assert_eq!(resolution.vars.get("id"), Some("123"));
/// ```
///
/// # Errors
///
/// Returns [`RouteError`] when the bind table rejects the path under
/// complete matching or the controller segment is invalid.
pub fn resolve(path: &PathInfo, binds: Option<&BindTable>) -> Result<Resolution, RouteError> {
    if let Some(table) = binds.filter(|t| !t.is_empty()) {
        let segments: Vec<&str> = path.segments().collect();
        if let Some(found) = table.find(&segments)? {
            let target = if found.controller {
                RouteTarget::Controller {
                    controller: Some(found.class),
                    action: found.method,
                }
            } else {
                RouteTarget::Callback {
                    class: found.class,
                    method: found.method,
                }
            };
            return Ok(Resolution {
                target,
                vars: found.vars,
                rule: Some(found.rule),
            });
        }
    }

    let parsed = parse_url(path.url())?;
    Ok(Resolution {
        target: RouteTarget::Controller {
            controller: parsed.controller,
            action: parsed.action,
        },
        vars: parsed.vars,
        rule: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SuffixPolicy;

    fn path(p: &str) -> PathInfo {
        PathInfo::parse(p, "/", &SuffixPolicy::Any).unwrap()
    }

    #[test]
    fn test_default_layout_without_table() {
        let resolution = resolve(&path("/blog/read/id/5"), None).unwrap();
        assert_eq!(
            resolution.target,
            RouteTarget::Controller {
                controller: Some("blog".into()),
                action: Some("read".into())
            }
        );
        assert_eq!(resolution.vars.get("id"), Some("5"));
        assert!(resolution.rule.is_none());
    }

    #[test]
    fn test_unmatched_bind_falls_back() {
        let table = BindTable::from_pairs([("user/:id", "@User/show")]).unwrap();
        let resolution = resolve(&path("/user/profile"), Some(&table)).unwrap();
        assert_eq!(
            resolution.target,
            RouteTarget::Controller {
                controller: Some("user".into()),
                action: Some("profile".into())
            }
        );
    }

    #[test]
    fn test_class_bind() {
        let table = BindTable::from_pairs([("status/:name", "\\ops\\Health::check?probe=:name")]).unwrap();
        let resolution = resolve(&path("/status/db"), Some(&table)).unwrap();
        assert_eq!(
            resolution.target,
            RouteTarget::Callback {
                class: "\\ops\\Health".into(),
                method: Some("check".into())
            }
        );
        assert_eq!(resolution.vars.get("probe"), Some("db"));
        assert_eq!(resolution.rule.as_deref(), Some("status/:name"));
    }

    #[test]
    fn test_root_resolves_to_defaults() {
        let resolution = resolve(&path("/"), None).unwrap();
        assert_eq!(
            resolution.target,
            RouteTarget::Controller {
                controller: None,
                action: None
            }
        );
    }
}
