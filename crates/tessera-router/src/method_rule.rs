//! Allowed-method rules.
//!
//! A rule is written as `*` (any method), a single verb (`GET`) or a
//! pipe-separated set (`GET|POST`). Verbs are case-insensitive.

use std::fmt;
use std::str::FromStr;

use http::Method;

use crate::error::RouteError;

const KNOWN_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// The HTTP methods an action accepts.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use tessera_router::MethodRule;
///
/// let rule: MethodRule = "get|post".parse().unwrap();
///
/// assert!(rule.allows(&Method::GET));
/// assert!(rule.allows(&Method::POST));
/// assert!(!rule.allows(&Method::DELETE));
/// assert_eq!(rule.to_string(), "GET|POST");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodRule {
    /// Every method.
    Any,
    /// Only the listed methods, in declaration order.
    Only(Vec<Method>),
}

impl MethodRule {
    /// Creates a rule for a single method.
    #[must_use]
    pub fn single(method: Method) -> Self {
        Self::Only(vec![method])
    }

    /// Adds a method to the rule.
    #[must_use]
    pub fn or(mut self, method: Method) -> Self {
        if let Self::Only(methods) = &mut self {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        self
    }

    /// Returns `true` if the rule accepts the method.
    ///
    /// A rule that accepts `GET` also accepts `HEAD`.
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(methods) => {
                methods.contains(method) || (*method == Method::HEAD && methods.contains(&Method::GET))
            }
        }
    }

    /// Returns the accepted methods; every known method for [`MethodRule::Any`].
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        match self {
            Self::Any => KNOWN_METHODS.to_vec(),
            Self::Only(methods) => methods.clone(),
        }
    }
}

impl Default for MethodRule {
    fn default() -> Self {
        Self::single(Method::GET)
    }
}

impl FromStr for MethodRule {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::Any);
        }

        let mut methods = Vec::new();
        for verb in s.split('|').map(str::trim).filter(|v| !v.is_empty()) {
            if verb == "*" {
                return Ok(Self::Any);
            }
            let upper = verb.to_ascii_uppercase();
            let method = KNOWN_METHODS
                .iter()
                .find(|m| m.as_str() == upper)
                .cloned()
                .ok_or_else(|| RouteError::InvalidMethod(verb.to_string()))?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        if methods.is_empty() {
            return Err(RouteError::InvalidMethod(s.to_string()));
        }
        Ok(Self::Only(methods))
    }
}

impl fmt::Display for MethodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(methods) => {
                for (index, method) in methods.iter().enumerate() {
                    if index > 0 {
                        f.write_str("|")?;
                    }
                    f.write_str(method.as_str())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any() {
        let rule: MethodRule = "*".parse().unwrap();
        assert!(rule.allows(&Method::DELETE));
        assert_eq!(rule.allowed_methods().len(), 9);
        assert_eq!(rule.to_string(), "*");
    }

    #[test]
    fn test_single_and_default() {
        let rule: MethodRule = "post".parse().unwrap();
        assert_eq!(rule, MethodRule::single(Method::POST));
        assert!(!rule.allows(&Method::GET));
        assert_eq!(MethodRule::default(), MethodRule::single(Method::GET));
    }

    #[test]
    fn test_set_dedups_and_keeps_order() {
        let rule: MethodRule = "PUT|get|PUT".parse().unwrap();
        assert_eq!(rule.allowed_methods(), vec![Method::PUT, Method::GET]);
    }

    #[test]
    fn test_head_follows_get() {
        assert!(MethodRule::default().allows(&Method::HEAD));
        assert!(!MethodRule::single(Method::POST).allows(&Method::HEAD));
    }

    #[test]
    fn test_builder() {
        let rule = MethodRule::single(Method::GET).or(Method::POST).or(Method::GET);
        assert_eq!(rule.to_string(), "GET|POST");
        assert_eq!(MethodRule::Any.or(Method::GET), MethodRule::Any);
    }

    #[test]
    fn test_invalid() {
        assert_eq!(
            "GET|FETCH".parse::<MethodRule>().unwrap_err(),
            RouteError::InvalidMethod("FETCH".to_string())
        );
        assert!("".parse::<MethodRule>().is_err());
        assert!("|".parse::<MethodRule>().is_err());
    }
}
