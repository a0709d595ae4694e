//! The root [`TesseraConfig`] and its builder.

use serde::{Deserialize, Serialize};
use tessera_router::{BindRule, MethodRule};

use crate::{
    AppConfig, ConfigError, LogFormat, LogSection, MetricsConfig, MiddlewareConfig, RouteConfig,
    ServerConfig,
};

const RESPONSE_TYPES: &[&str] = &["json", "html", "text", "txt"];

/// Complete application configuration.
///
/// # Example
///
/// ```
/// use tessera_config::TesseraConfig;
///
/// let config = TesseraConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.app.default_return_type, "json");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    /// Dispatch defaults and URL handling.
    #[serde(default)]
    pub app: AppConfig,

    /// Middleware aliases, priority and global registrations.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Bind rules.
    #[serde(default)]
    pub route: RouteConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogSection,

    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metrics exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TesseraConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TesseraConfigBuilder {
        TesseraConfigBuilder::new()
    }

    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field:
    /// an unparsable socket address, an unknown output type, an invalid
    /// method rule, an empty separator or a bind rule that does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        if self.app.pathinfo_depr.is_empty() {
            return Err(ConfigError::invalid_value("app.pathinfo_depr", "must not be empty"));
        }

        if self.app.default_controller.is_empty() || self.app.default_action.is_empty() {
            return Err(ConfigError::invalid_value(
                "app.default_controller",
                "default controller and action must not be empty",
            ));
        }

        check_response_type("app.default_return_type", &self.app.default_return_type)?;
        for (suffix, response_type) in &self.app.auto_response {
            check_response_type(&format!("app.auto_response.{suffix}"), response_type)?;
        }

        self.app
            .default_method
            .parse::<MethodRule>()
            .map_err(|e| ConfigError::invalid_value("app.default_method", e.to_string()))?;
        for (action, rule) in &self.app.route_rest_action {
            rule.parse::<MethodRule>().map_err(|e| {
                ConfigError::invalid_value(format!("app.route_rest_action.{action}"), e.to_string())
            })?;
        }

        for (pattern, target) in &self.route.bind {
            BindRule::new(pattern, target).map_err(|e| {
                ConfigError::invalid_value(format!("route.bind.{pattern}"), e.to_string())
            })?;
        }

        Ok(())
    }

    /// Development preset: debug output, pretty logs at debug level.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::TesseraConfig;
    ///
    /// let config = TesseraConfig::development();
    /// assert!(config.app.debug);
    /// assert_eq!(config.log.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.app.debug = true;
        config.log.level = "debug".to_string();
        config.log.format = LogFormat::Pretty;
        config.log.ansi_enabled = true;
        config.log.include_location = true;
        config.log.record_trace = true;
        config
    }

    /// Production preset: no debug output, JSON logs, metrics on.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_config::{LogFormat, TesseraConfig};
    ///
    /// let config = TesseraConfig::production();
    /// assert!(!config.app.debug);
    /// assert_eq!(config.log.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.app.debug = false;
        config.log.level = "info".to_string();
        config.log.format = LogFormat::Json;
        config.log.ansi_enabled = false;
        config.metrics.enabled = true;
        config
    }
}

fn check_response_type(field: &str, value: &str) -> Result<(), ConfigError> {
    if RESPONSE_TYPES.contains(&value.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(
            field,
            format!("unknown output type `{value}`, expected one of json, html, text"),
        ))
    }
}

/// Builder for [`TesseraConfig`].
#[derive(Debug, Default)]
pub struct TesseraConfigBuilder {
    app: Option<AppConfig>,
    middleware: Option<MiddlewareConfig>,
    route: Option<RouteConfig>,
    log: Option<LogSection>,
    server: Option<ServerConfig>,
    metrics: Option<MetricsConfig>,
}

impl TesseraConfigBuilder {
    /// Creates a builder with every section at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application section.
    #[must_use]
    pub fn app(mut self, app: AppConfig) -> Self {
        self.app = Some(app);
        self
    }

    /// Sets the middleware section.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Sets the route section.
    #[must_use]
    pub fn route(mut self, route: RouteConfig) -> Self {
        self.route = Some(route);
        self
    }

    /// Sets the logging section.
    #[must_use]
    pub fn log(mut self, log: LogSection) -> Self {
        self.log = Some(log);
        self
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the metrics section.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TesseraConfig {
        TesseraConfig {
            app: self.app.unwrap_or_default(),
            middleware: self.middleware.unwrap_or_default(),
            route: self.route.unwrap_or_default(),
            log: self.log.unwrap_or_default(),
            server: self.server.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
        }
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn build_validated(self) -> Result<TesseraConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_default_is_valid() {
        assert!(TesseraConfig::default().validate().is_ok());
        assert!(TesseraConfig::development().validate().is_ok());
        assert!(TesseraConfig::production().validate().is_ok());
    }

    #[test]
    fn test_invalid_server_addr() {
        let err = TesseraConfig::builder()
            .server(ServerConfig {
                http_addr: "not-an-address".to_string(),
                ..Default::default()
            })
            .build_validated()
            .unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_metrics_addr_checked_only_when_enabled() {
        let disabled = TesseraConfig::builder()
            .metrics(MetricsConfig {
                enabled: false,
                addr: "invalid".to_string(),
            })
            .build();
        assert!(disabled.validate().is_ok());

        let enabled = TesseraConfig::builder()
            .metrics(MetricsConfig {
                enabled: true,
                addr: "invalid".to_string(),
            })
            .build();
        assert!(enabled.validate().unwrap_err().to_string().contains("metrics.addr"));
    }

    #[test]
    fn test_unknown_return_type() {
        let config = TesseraConfig::builder()
            .app(AppConfig {
                default_return_type: "xml".to_string(),
                ..Default::default()
            })
            .build();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("default_return_type"));
    }

    #[test]
    fn test_invalid_rest_action_rule() {
        let config = TesseraConfig::builder()
            .app(AppConfig {
                route_rest_action: IndexMap::from([("save".to_string(), "SAVE".to_string())]),
                ..Default::default()
            })
            .build();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("route_rest_action.save"));
    }

    #[test]
    fn test_invalid_bind_rule() {
        let config = TesseraConfig::builder()
            .route(RouteConfig {
                bind: IndexMap::from([("user/:id".to_string(), "User".to_string())]),
                complete_match: false,
            })
            .build();
        assert!(config.validate().unwrap_err().to_string().contains("route.bind"));
    }

    #[test]
    fn test_presets() {
        let dev = TesseraConfig::development();
        assert!(dev.app.debug);
        assert!(dev.log.record_trace);
        assert_eq!(dev.log.format, LogFormat::Pretty);

        let prod = TesseraConfig::production();
        assert!(!prod.app.debug);
        assert!(prod.metrics.enabled);
    }

    #[test]
    fn test_toml_round_sections() {
        let toml_str = toml::to_string_pretty(&TesseraConfig::default()).unwrap();
        assert!(toml_str.contains("[app]"));
        assert!(toml_str.contains("[server]"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<TesseraConfig, _> = toml::from_str("[telemetry]\nservice_name = \"x\"");
        assert!(result.is_err());
    }
}
