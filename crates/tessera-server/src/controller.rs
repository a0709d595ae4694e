//! The [`Controller`] trait and action argument binding.
//!
//! A controller lists its actions as [`ActionSignature`]s. Before an action
//! runs, its declared parameters are bound by name from the request's final
//! parameter set into [`Args`].

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use tessera_core::{BoxFuture, Params, Reply, Request, TesseraError, TesseraResult};
use tessera_middleware::MiddlewareSpec;
use tessera_router::text::{camel, snake};

use crate::annotation::ActionMeta;

/// A request handler with named actions.
///
/// Controllers are bound in the application container and built fresh for
/// every request.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tessera_core::{BoxFuture, Reply, Request, TesseraResult};
/// use tessera_server::{ActionSignature, Args, Controller};
///
/// struct Hello;
///
/// impl Controller for Hello {
///     fn actions(&self) -> Vec<ActionSignature> {
///         vec![ActionSignature::new("greet").param_or("name", "world")]
///     }
///
///     fn call<'a>(
///         &'a self,
///         _action: &'a str,
///         _request: &'a mut Request,
///         args: Args,
///     ) -> BoxFuture<'a, TesseraResult<Reply>> {
///         Box::pin(async move {
///             let name = args.require("name")?;
///             Ok(json!({ "hello": name }).into())
///         })
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// The actions this controller exposes.
    fn actions(&self) -> Vec<ActionSignature>;

    /// Runs an action listed in [`actions`](Self::actions).
    fn call<'a>(
        &'a self,
        action: &'a str,
        request: &'a mut Request,
        args: Args,
    ) -> BoxFuture<'a, TesseraResult<Reply>>;

    /// Handles actions that are not listed. `None` means the action does
    /// not exist.
    fn catch_all<'a>(
        &'a self,
        _action: &'a str,
        _request: &'a mut Request,
        _params: Params,
    ) -> Option<BoxFuture<'a, TesseraResult<Reply>>> {
        None
    }

    /// Controller-wide metadata, merged under each action's own.
    fn annotation(&self) -> ActionMeta {
        ActionMeta::default()
    }

    /// Middleware wrapping this controller's actions.
    fn middleware(&self) -> Vec<ControllerMiddleware> {
        Vec::new()
    }
}

/// A declared action parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    default: Option<String>,
}

impl ParamSpec {
    /// A parameter that must be supplied.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter with a default.
    pub fn optional(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

/// Name, parameters and metadata of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSignature {
    name: String,
    params: Vec<ParamSpec>,
    meta: ActionMeta,
}

impl ActionSignature {
    /// An action without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            meta: ActionMeta::default(),
        }
    }

    /// Adds a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec::required(name));
        self
    }

    /// Adds a parameter with a default.
    #[must_use]
    pub fn param_or(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.params.push(ParamSpec::optional(name, default));
        self
    }

    /// Sets the action metadata.
    #[must_use]
    pub fn meta(mut self, meta: ActionMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Action metadata.
    #[must_use]
    pub const fn annotation(&self) -> &ActionMeta {
        &self.meta
    }

    /// Returns `true` if this signature answers to the URL action name.
    ///
    /// Names compare case-insensitively and across snake and camel case.
    #[must_use]
    pub fn answers_to(&self, action: &str) -> bool {
        self.name.eq_ignore_ascii_case(action)
            || self.name.eq_ignore_ascii_case(&camel(action))
            || snake(&self.name) == action
    }

    /// Binds the declared parameters from a parameter set.
    ///
    /// Each parameter is looked up by name, then by its snake and camel case
    /// forms. Unmatched parameters take numerically keyed values (`0`, `1`,
    /// ...) in order, then their default.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidArgument`] for a required parameter
    /// that cannot be bound.
    pub fn bind(&self, params: &Params) -> TesseraResult<Args> {
        let mut positional: Vec<(usize, &String)> = params
            .iter()
            .filter_map(|(key, value)| key.parse::<usize>().ok().map(|index| (index, value)))
            .collect();
        positional.sort_by_key(|(index, _)| *index);
        let mut positional = positional.into_iter().map(|(_, value)| value);

        let mut values = IndexMap::new();
        for spec in &self.params {
            let named = params
                .get(&spec.name)
                .or_else(|| params.get(&snake(&spec.name)))
                .or_else(|| params.get(&camel(&spec.name)));
            let value = match named.or_else(|| positional.next()) {
                Some(value) => value.clone(),
                None => spec.default.clone().ok_or_else(|| {
                    TesseraError::invalid_argument(format!("method param miss: {}", spec.name))
                })?,
            };
            values.insert(spec.name.clone(), value);
        }
        Ok(Args { values })
    }
}

/// Arguments bound for an action call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    values: IndexMap<String, String>,
}

impl Args {
    /// Looks up an argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Looks up an argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidArgument`] when it is missing.
    pub fn require(&self, name: &str) -> TesseraResult<&str> {
        self.get(name)
            .ok_or_else(|| TesseraError::invalid_argument(format!("method param miss: {name}")))
    }

    /// Parses an argument.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidArgument`] when it is missing or does
    /// not parse.
    pub fn parse<T>(&self, name: &str) -> TesseraResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.require(name)?
            .parse()
            .map_err(|e| TesseraError::invalid_argument(format!("param type error: {name}: {e}")))
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates the arguments in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A controller middleware with optional action filters.
///
/// ```
/// use tessera_server::ControllerMiddleware;
///
/// let auth = ControllerMiddleware::new("auth").except(["login"]);
/// assert!(auth.applies_to("index"));
/// assert!(!auth.applies_to("Login"));
/// ```
#[derive(Debug, Clone)]
pub struct ControllerMiddleware {
    spec: MiddlewareSpec,
    only: Vec<String>,
    except: Vec<String>,
}

impl ControllerMiddleware {
    /// Applies to every action.
    pub fn new(spec: impl Into<MiddlewareSpec>) -> Self {
        Self {
            spec: spec.into(),
            only: Vec::new(),
            except: Vec::new(),
        }
    }

    /// Restricts to the listed actions.
    #[must_use]
    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.only = actions.into_iter().map(|a| a.as_ref().to_lowercase()).collect();
        self
    }

    /// Skips the listed actions.
    #[must_use]
    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.except = actions.into_iter().map(|a| a.as_ref().to_lowercase()).collect();
        self
    }

    /// Returns `true` if the middleware runs for the action.
    #[must_use]
    pub fn applies_to(&self, action: &str) -> bool {
        let action = action.to_lowercase();
        if !self.only.is_empty() {
            return self.only.contains(&action);
        }
        !self.except.contains(&action)
    }

    /// The middleware.
    #[must_use]
    pub fn spec(&self) -> &MiddlewareSpec {
        &self.spec
    }

    /// Consumes the filter, returning the middleware.
    #[must_use]
    pub fn into_spec(self) -> MiddlewareSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_bind_by_name_and_case_alias() {
        let signature = ActionSignature::new("list")
            .param("userId")
            .param("page_size")
            .param_or("sort", "id");

        let args = signature
            .bind(&params(&[("user_id", "7"), ("pageSize", "20")]))
            .unwrap();
        assert_eq!(args.get("userId"), Some("7"));
        assert_eq!(args.get("page_size"), Some("20"));
        assert_eq!(args.get("sort"), Some("id"));
        assert_eq!(args.parse::<u32>("page_size").unwrap(), 20);
    }

    #[test]
    fn test_bind_positional_fallback() {
        let signature = ActionSignature::new("read").param("year").param("slug");
        let args = signature
            .bind(&params(&[("1", "hello"), ("0", "2024")]))
            .unwrap();
        assert_eq!(args.iter().collect::<Vec<_>>(), vec![("year", "2024"), ("slug", "hello")]);
    }

    #[test]
    fn test_bind_missing_required() {
        let signature = ActionSignature::new("show").param("id");
        let err = signature.bind(&Params::new()).unwrap_err();
        assert!(err.to_string().contains("method param miss: id"));
        assert!(Args::default().parse::<i32>("id").is_err());
    }

    #[test]
    fn test_answers_to() {
        let signature = ActionSignature::new("userList");
        assert!(signature.answers_to("user_list"));
        assert!(signature.answers_to("USERLIST"));
        assert!(!signature.answers_to("user"));
        assert!(ActionSignature::new("show").answers_to("show"));
    }

    #[test]
    fn test_controller_middleware_filters() {
        let only = ControllerMiddleware::new("auth").only(["Edit", "save"]);
        assert!(only.applies_to("edit"));
        assert!(!only.applies_to("index"));

        let all = ControllerMiddleware::new("log");
        assert!(all.applies_to("anything"));
    }
}
