//! Domain bind rules.
//!
//! A bind table maps rule patterns to targets:
//!
//! | Rule | Target | Effect |
//! |------|--------|--------|
//! | `user/:id` | `@User/show?id=:id` | controller `User`, action `show`, `id` from the URL |
//! | `api/:name` | `\api\Status::check` | class `\api\Status`, method `check` |
//! | `v1/:name/:name` | `:api\v1` | class `api\v1\{Studly second segment}`, method from the third |
//!
//! The first segment of a rule is its key and must equal the first URL
//! segment. The remaining segments must match one for one: literal segments
//! by equality, placeholders by their class (`:name` alphanumeric with `-`
//! and `_`, `:id` digits, `:year` a date). Rules are tried in table order and
//! the first match wins.

use std::str::FromStr;

use crate::error::RouteError;
use crate::params::Vars;
use crate::text::{is_date, studly};

/// Where a bind rule sends the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// `\path\Class` or `\path\Class::method`.
    Class {
        /// Class identifier, as registered in the container.
        class: String,
        /// Method, if fixed by the rule.
        method: Option<String>,
    },
    /// `@Controller` or `@Controller/action`.
    Controller {
        /// Controller name.
        controller: String,
        /// Action, if fixed by the rule.
        action: Option<String>,
    },
    /// `:namespace`; class and method come from the URL.
    Namespace(String),
}

impl FromStr for BindTarget {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RouteError::InvalidBind {
            rule: String::new(),
            target: s.to_string(),
        };
        let mut chars = s.chars();
        let kind = chars.next().ok_or_else(invalid)?;
        let body = chars.as_str();
        if body.is_empty() {
            return Err(invalid());
        }

        match kind {
            '\\' => {
                let (class, method) = match body.split_once("::") {
                    Some((class, method)) => (class, Some(method.to_string())),
                    None => (body, None),
                };
                Ok(Self::Class {
                    class: format!("\\{class}"),
                    method: method.filter(|m| !m.is_empty()),
                })
            }
            '@' => {
                let (controller, action) = match body.split_once('/') {
                    Some((controller, action)) => (controller, Some(action.to_string())),
                    None => (body, None),
                };
                Ok(Self::Controller {
                    controller: controller.to_string(),
                    action: action.filter(|a| !a.is_empty()),
                })
            }
            ':' => Ok(Self::Namespace(body.trim_end_matches('\\').to_string())),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Name,
    Id,
    Year,
}

impl Placeholder {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            ":name" => Some(Self::Name),
            ":id" => Some(Self::Id),
            ":year" => Some(Self::Year),
            _ => None,
        }
    }

    fn matches(self, value: &str) -> bool {
        match self {
            Self::Name => {
                !value.is_empty()
                    && value
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            }
            Self::Id => !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            Self::Year => is_date(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder, String),
    // A `:word` that is not a known placeholder never matches.
    Unknown,
}

impl Segment {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == value,
            Self::Placeholder(placeholder, _) => placeholder.matches(value),
            Self::Unknown => false,
        }
    }

    fn source(&self) -> Option<&str> {
        match self {
            Self::Placeholder(_, source) => Some(source),
            _ => None,
        }
    }
}

/// One compiled bind rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRule {
    pattern: String,
    key: String,
    segments: Vec<Segment>,
    target: BindTarget,
    append: Vec<(String, String)>,
}

impl BindRule {
    /// Compiles a rule pattern and its target.
    ///
    /// The target may end with a query string (`?id=:id&type=user`) whose
    /// pairs are appended to the route variables; a value naming one of the
    /// rule's placeholders is replaced by the matching URL segment.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidBind`] for an empty pattern or a target
    /// without a `\`, `@` or `:` marker.
    pub fn new(pattern: &str, target: &str) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidBind {
            rule: pattern.to_string(),
            target: target.to_string(),
        };

        let mut parts = pattern.trim_matches('/').split('/');
        let key = parts
            .next()
            .filter(|k| !k.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        let segments = parts
            .map(|segment| {
                if segment.starts_with(':') {
                    Placeholder::parse(segment)
                        .map_or(Segment::Unknown, |p| Segment::Placeholder(p, segment.to_string()))
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        let (target, query) = match target.split_once('?') {
            Some((target, query)) => (target, Some(query)),
            None => (target, None),
        };
        let target = target.parse::<BindTarget>().map_err(|_| invalid())?;
        let append = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            pattern: pattern.to_string(),
            key,
            segments,
            target,
            append,
        })
    }

    /// Returns the rule pattern as written.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the first segment of the pattern.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the target.
    #[must_use]
    pub const fn target(&self) -> &BindTarget {
        &self.target
    }

    /// Tests the segments following the key.
    #[must_use]
    pub fn matches(&self, rest: &[&str]) -> bool {
        rest.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(rest)
                .all(|(segment, value)| segment.matches(value))
    }

    fn appended_vars(&self, rest: &[&str]) -> Vars {
        self.append
            .iter()
            .map(|(name, value)| {
                let resolved = self
                    .segments
                    .iter()
                    .position(|s| s.source() == Some(value.as_str()))
                    .and_then(|index| rest.get(index))
                    .map_or_else(|| value.clone(), |v| (*v).to_string());
                (name.clone(), resolved)
            })
            .collect()
    }
}

/// Result of a successful bind lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMatch {
    /// Pattern of the matched rule.
    pub rule: String,
    /// Class or controller name.
    pub class: String,
    /// Method or action, if the rule or URL names one.
    pub method: Option<String>,
    /// `true` for controller targets, `false` for class and namespace targets.
    pub controller: bool,
    /// Variables appended by the rule.
    pub vars: Vars,
}

/// An ordered table of bind rules.
///
/// # Example
///
/// ```rust
/// use tessera_router::BindTable;
///
/// let mut table = BindTable::new();
/// table.bind("user/:id", "@User/show?id=:id").unwrap();
///
/// let found = table.find(&["user", "123"]).unwrap().unwrap();
/// assert_eq!(found.class, "User");
/// assert_eq!(found.method.as_deref(), Some("show"));
/// assert_eq!(found.vars.get("id"), Some("123"));
///
/// assert!(table.find(&["user", "abc"]).unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindTable {
    rules: Vec<BindRule>,
    complete_match: bool,
}

impl BindTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(pattern, target)` pairs in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RouteError::InvalidBind`].
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::new();
        for (pattern, target) in pairs {
            table.bind(pattern, target)?;
        }
        Ok(table)
    }

    /// When set, a URL whose first segment is a rule key must match one of
    /// that key's rules.
    #[must_use]
    pub const fn with_complete_match(mut self, complete_match: bool) -> Self {
        self.complete_match = complete_match;
        self
    }

    /// Appends a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidBind`] if the rule does not compile.
    pub fn bind(&mut self, pattern: &str, target: &str) -> Result<&mut Self, RouteError> {
        self.rules.push(BindRule::new(pattern, target)?);
        Ok(self)
    }

    /// Returns the rules in order.
    #[must_use]
    pub fn rules(&self) -> &[BindRule] {
        &self.rules
    }

    /// Returns `true` if the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finds the first rule matching the URL segments.
    ///
    /// # Errors
    ///
    /// With complete matching on, returns [`RouteError::BindMismatch`] when
    /// rules exist for the first segment but none matches.
    pub fn find(&self, segments: &[&str]) -> Result<Option<BindMatch>, RouteError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(None);
        };

        let mut keyed = false;
        for rule in self.rules.iter().filter(|r| r.key == *first) {
            keyed = true;
            if rule.matches(rest) {
                return Ok(Some(Self::resolve(rule, rest)));
            }
        }

        if keyed && self.complete_match {
            return Err(RouteError::BindMismatch(segments.join("/")));
        }
        Ok(None)
    }

    fn resolve(rule: &BindRule, rest: &[&str]) -> BindMatch {
        let vars = rule.appended_vars(rest);
        let (class, method, controller) = match &rule.target {
            BindTarget::Class { class, method } => (class.clone(), method.clone(), false),
            BindTarget::Controller { controller, action } => {
                (controller.clone(), action.clone(), true)
            }
            BindTarget::Namespace(namespace) => {
                let class = rest.first().map_or_else(String::new, |c| studly(c));
                (
                    format!("{namespace}\\{class}"),
                    rest.get(1).map(|m| (*m).to_string()),
                    false,
                )
            }
        };
        BindMatch {
            rule: rule.pattern.clone(),
            class,
            method,
            controller,
            vars,
        }
    }
}
