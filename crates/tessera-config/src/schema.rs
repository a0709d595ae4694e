//! Configuration sections.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Application section: dispatch defaults and URL handling.
///
/// # Example
///
/// ```
/// use tessera_config::AppConfig;
///
/// let app = AppConfig::default();
/// assert_eq!(app.default_controller, "Index");
/// assert_eq!(app.default_action, "index");
/// assert_eq!(app.pathinfo_depr, "/");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Attach diagnostics to error responses and show raw error messages.
    #[serde(default)]
    pub debug: bool,

    /// Controller used when the URL names none.
    #[serde(default = "default_controller")]
    pub default_controller: String,

    /// Action used when the URL names none.
    #[serde(default = "default_action")]
    pub default_action: String,

    /// Separator between URL segments.
    #[serde(default = "default_depr")]
    pub pathinfo_depr: String,

    /// Allowed URL suffixes, `|`-separated. Empty allows any suffix.
    #[serde(default = "default_suffix")]
    pub url_html_suffix: String,

    /// URL suffix to output type, e.g. `json = "json"`.
    #[serde(default = "default_auto_response")]
    pub auto_response: IndexMap<String, String>,

    /// Output type for actions that return plain data.
    #[serde(default = "default_return_type")]
    pub default_return_type: String,

    /// Method rule for actions that declare none.
    #[serde(default = "default_method")]
    pub default_method: String,

    /// Consult the route loader and bind table.
    #[serde(default = "default_true")]
    pub with_route: bool,

    /// Action name to method rule; overrides declared rules.
    #[serde(default)]
    pub route_rest_action: IndexMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_controller: default_controller(),
            default_action: default_action(),
            pathinfo_depr: default_depr(),
            url_html_suffix: default_suffix(),
            auto_response: default_auto_response(),
            default_return_type: default_return_type(),
            default_method: default_method(),
            with_route: true,
            route_rest_action: IndexMap::new(),
        }
    }
}

fn default_controller() -> String {
    "Index".to_string()
}

fn default_action() -> String {
    "index".to_string()
}

fn default_depr() -> String {
    "/".to_string()
}

fn default_suffix() -> String {
    "html".to_string()
}

fn default_auto_response() -> IndexMap<String, String> {
    IndexMap::from([("json".to_string(), "json".to_string())])
}

fn default_return_type() -> String {
    "json".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

/// An alias entry: one class or a group of classes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AliasTarget {
    /// A single class identifier or another alias.
    One(String),
    /// A group, imported entry by entry.
    Many(Vec<String>),
}

impl AliasTarget {
    /// Returns the entries as a list.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        match self {
            Self::One(entry) => vec![entry.clone()],
            Self::Many(entries) => entries.clone(),
        }
    }
}

/// Middleware section.
///
/// ```toml
/// [middleware]
/// priority = ["auth", "access_log"]
/// global = ["request_id", "web"]
///
/// [middleware.alias]
/// web = ["access_log", "auth"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Alias name to class identifier(s).
    #[serde(default)]
    pub alias: IndexMap<String, AliasTarget>,

    /// Class identifiers in execution priority order.
    #[serde(default)]
    pub priority: Vec<String>,

    /// Middleware registered on the route queue at boot.
    #[serde(default)]
    pub global: Vec<String>,
}

/// Route section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Bind rules in match order, e.g. `"user/:id" = "@User/show?id=:id"`.
    #[serde(default)]
    pub bind: IndexMap<String, String>,

    /// Reject URLs whose first segment is a bind key but match no rule.
    #[serde(default)]
    pub complete_match: bool,
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Level filter (trace, debug, info, warn, error) or a full filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Append backtraces to reported errors.
    #[serde(default)]
    pub record_trace: bool,

    /// Emit ANSI colors.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            record_trace: false,
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Time allowed for in-flight requests after shutdown starts.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_shutdown_timeout() -> u64 {
    30
}

const fn default_request_timeout() -> u64 {
    30_000
}

const fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_defaults() {
        let app = AppConfig::default();
        assert!(!app.debug);
        assert!(app.with_route);
        assert_eq!(app.url_html_suffix, "html");
        assert_eq!(app.auto_response.get("json").map(String::as_str), Some("json"));
        assert_eq!(app.default_method, "GET");
    }

    #[test]
    fn test_app_partial_deserialize() {
        let app: AppConfig = toml::from_str(
            r#"
            debug = true
            default_controller = "Home"

            [route_rest_action]
            save = "POST"
            delete = "DELETE|POST"
            "#,
        )
        .unwrap();
        assert!(app.debug);
        assert_eq!(app.default_controller, "Home");
        assert_eq!(app.default_action, "index");
        let actions: Vec<_> = app.route_rest_action.keys().map(String::as_str).collect();
        assert_eq!(actions, vec!["save", "delete"]);
    }

    #[test]
    fn test_alias_forms() {
        let middleware: MiddlewareConfig = toml::from_str(
            r#"
            priority = ["auth"]

            [alias]
            auth = "app.auth"
            web = ["auth", "session"]
            "#,
        )
        .unwrap();
        assert_eq!(
            middleware.alias["auth"],
            AliasTarget::One("app.auth".to_string())
        );
        assert_eq!(middleware.alias["web"].entries(), vec!["auth", "session"]);
        assert!(middleware.global.is_empty());
    }

    #[test]
    fn test_bind_order_is_kept() {
        let route: RouteConfig = toml::from_str(
            r#"
            complete_match = true
            [bind]
            "user/:id" = "@User/show?id=:id"
            "user/:name" = "@User/find?name=:name"
            "#,
        )
        .unwrap();
        assert!(route.complete_match);
        let rules: Vec<_> = route.bind.keys().map(String::as_str).collect();
        assert_eq!(rules, vec!["user/:id", "user/:name"]);
    }

    #[test]
    fn test_log_format_deserialize() {
        let log: LogSection = toml::from_str(r#"format = "pretty""#).unwrap();
        assert_eq!(log.format, LogFormat::Pretty);
        assert_eq!(log.level, "info");
        assert!(toml::from_str::<LogSection>(r#"format = "xml""#).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<ServerConfig>(r#"max_connections = 5"#).is_err());
        assert!(toml::from_str::<MetricsConfig>(r#"buckets = [1.0]"#).is_err());
    }
}
