//! Declarative action metadata.
//!
//! Controllers describe their actions with [`ActionMeta`]: the methods an
//! action accepts, the inputs it expects and extra middleware to run around
//! it. Metadata can be declared on the controller and on each action; the
//! two are combined with [`ActionMeta::merge`].
//!
//! ```
//! use tessera_server::{ActionMeta, InputRule};
//!
//! let class = ActionMeta::new().try_url("GET").unwrap().middleware("auth");
//! let show = ActionMeta::new()
//!     .try_url("GET|POST")
//!     .unwrap()
//!     .input("id", InputRule::new().kind("int"))
//!     .middleware("auth")
//!     .middleware("audit");
//!
//! let merged = class.merge(&show);
//! assert_eq!(merged.url_rule().unwrap().to_string(), "GET|POST");
//! assert_eq!(merged.middleware_names(), ["auth", "audit"]);
//! ```

use indexmap::IndexMap;
use tessera_core::{Params, Request, TesseraError, TesseraResult, Validate};
use tessera_router::{MethodRule, RouteError};

/// Types that accept any value.
const UNCHECKED_TYPES: &[&str] = &["string", "str", "mixed", "any"];

/// Declaration of one input parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRule {
    kind: Option<String>,
    length: Option<String>,
    default: Option<String>,
    filter: Option<String>,
    desc: Option<String>,
}

impl InputRule {
    /// An input with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Type rule, checked with [`Validate::is`].
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Length rule: `n`, `n,` or `n,m`.
    #[must_use]
    pub fn length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Value used when the input is absent.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Filter applied to the final value.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Free-form description.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// The declared default.
    #[must_use]
    pub fn declared_default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Validates one value.
    ///
    /// Absent or empty values take the default. Declared type and length
    /// rules apply to supplied values; the filter applies to the final one.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidArgument`] when the value is missing
    /// without a default or fails a rule.
    pub fn check(&self, name: &str, value: Option<&str>, validate: &Validate) -> TesseraResult<String> {
        let value = match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                if let Some(kind) = self.kind.as_deref() {
                    if !UNCHECKED_TYPES.contains(&kind) && !validate.is(value, kind) {
                        return Err(TesseraError::invalid_argument(format!(
                            "param type error: {name} must be {kind}"
                        )));
                    }
                }
                if let Some(length) = self.length.as_deref() {
                    if !validate.length(value, length) {
                        return Err(TesseraError::invalid_argument(format!(
                            "param length error: {name} must be {{{length}}}"
                        )));
                    }
                }
                value.to_string()
            }
            None => self
                .default
                .clone()
                .ok_or_else(|| TesseraError::invalid_argument(format!("param miss: {name}")))?,
        };

        match self.filter.as_deref() {
            Some(filter) => validate.apply_filter(&value, filter).ok_or_else(|| {
                TesseraError::invalid_argument(format!("param filter error: {name}"))
            }),
            None => Ok(value),
        }
    }
}

/// Metadata for a controller or one of its actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionMeta {
    url: Option<MethodRule>,
    input: IndexMap<String, InputRule>,
    middleware: Vec<String>,
    desc: Option<String>,
}

impl ActionMeta {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the accepted methods.
    #[must_use]
    pub fn url(mut self, rule: MethodRule) -> Self {
        self.url = Some(rule);
        self
    }

    /// Sets the accepted methods from a rule such as `GET|POST`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidMethod`] for unknown verbs.
    pub fn try_url(self, rule: &str) -> Result<Self, RouteError> {
        Ok(self.url(rule.parse()?))
    }

    /// Declares an input.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, rule: InputRule) -> Self {
        self.input.insert(name.into(), rule);
        self
    }

    /// Adds a middleware name. Duplicates are ignored.
    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.middleware.contains(&name) {
            self.middleware.push(name);
        }
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// The declared method rule.
    #[must_use]
    pub const fn url_rule(&self) -> Option<&MethodRule> {
        self.url.as_ref()
    }

    /// Declared inputs in declaration order.
    #[must_use]
    pub const fn inputs(&self) -> &IndexMap<String, InputRule> {
        &self.input
    }

    /// Declared middleware.
    #[must_use]
    pub fn middleware_names(&self) -> &[String] {
        &self.middleware
    }

    /// The description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Combines controller metadata (`self`) with action metadata.
    ///
    /// The action's method rule and inputs win over the controller's;
    /// middleware lists are joined without duplicates.
    #[must_use]
    pub fn merge(&self, action: &Self) -> Self {
        let mut input = self.input.clone();
        for (name, rule) in &action.input {
            input.insert(name.clone(), rule.clone());
        }

        let mut middleware = self.middleware.clone();
        for name in &action.middleware {
            if !middleware.contains(name) {
                middleware.push(name.clone());
            }
        }

        Self {
            url: action.url.clone().or_else(|| self.url.clone()),
            input,
            middleware,
            desc: action.desc.clone(),
        }
    }

    /// Validates every declared input against the request parameters.
    ///
    /// # Errors
    ///
    /// Stops at the first input that fails; see [`InputRule::check`].
    pub fn check_input(&self, request: &Request, validate: &Validate) -> TesseraResult<Params> {
        let mut valid = Params::new();
        for (name, rule) in &self.input {
            let value = rule.check(name, request.param(name), validate)?;
            valid.insert(name.clone(), value);
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_new_rule_is_unconstrained() {
        let rule = InputRule::new();
        assert_eq!(rule, InputRule::default());
        assert_eq!(rule.declared_default(), None);
        assert_eq!(
            InputRule::new().default_value("1").declared_default(),
            Some("1")
        );
    }

    #[test]
    fn test_default_substituted() {
        let rule = InputRule::new().kind("integer").default_value("1");
        let validate = Validate::new();
        assert_eq!(rule.check("page", None, &validate).unwrap(), "1");
        assert_eq!(rule.check("page", Some(""), &validate).unwrap(), "1");
        assert_eq!(rule.check("page", Some("7"), &validate).unwrap(), "7");
    }

    #[test]
    fn test_type_and_length_failures() {
        let validate = Validate::new();
        let err = InputRule::new()
            .kind("integer")
            .check("page", Some("abc"), &validate)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("page"));

        let rule = InputRule::new().length("2,4");
        assert!(rule.check("code", Some("abc"), &validate).is_ok());
        assert!(rule.check("code", Some("a"), &validate).is_err());

        assert!(InputRule::new().check("q", None, &validate).is_err());
    }

    #[test]
    fn test_string_type_accepts_anything() {
        let validate = Validate::new();
        let rule = InputRule::new().kind("string");
        assert_eq!(rule.check("name", Some("a b!"), &validate).unwrap(), "a b!");
    }

    #[test]
    fn test_filter_applies_to_final_value() {
        let validate = Validate::new();
        let rule = InputRule::new().filter("trim").default_value("  x ");
        assert_eq!(rule.check("name", None, &validate).unwrap(), "x");

        let rule = InputRule::new().filter("integer");
        assert!(rule.check("id", Some("x1"), &validate).is_err());
    }

    #[test]
    fn test_merge() {
        let class = ActionMeta::new()
            .try_url("POST")
            .unwrap()
            .input("id", InputRule::new().kind("int"))
            .input("page", InputRule::new().default_value("1"))
            .middleware("auth");
        let action = ActionMeta::new()
            .input("id", InputRule::new().kind("alphaNum"))
            .middleware("auth")
            .middleware("log")
            .desc("show");

        let merged = class.merge(&action);
        assert_eq!(merged.url_rule().unwrap().to_string(), "POST");
        assert_eq!(merged.inputs()["id"], InputRule::new().kind("alphaNum"));
        assert_eq!(merged.inputs().len(), 2);
        assert_eq!(merged.middleware_names(), ["auth", "log"]);
        assert_eq!(merged.description(), Some("show"));
        assert_eq!(ActionMeta::new().merge(&ActionMeta::new()).url_rule(), None);
    }

    #[test]
    fn test_check_input_reads_route_params() {
        let mut request = Request::new("/user/123");
        request.set_route([("id", "123")]);
        let meta = ActionMeta::new()
            .input("id", InputRule::new().kind("int"))
            .input("page", InputRule::new().default_value("1"));

        let valid = meta.check_input(&request, &Validate::new()).unwrap();
        assert_eq!(valid["id"], "123");
        assert_eq!(valid["page"], "1");
    }
}
