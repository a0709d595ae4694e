//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, TesseraConfig};

/// Configuration loader.
///
/// Layers apply in call order, later layers overriding earlier ones:
/// 1. defaults or a preset
/// 2. a TOML or JSON file, or a string
/// 3. a `.env` file, which only feeds the environment
/// 4. `PREFIX__SECTION__KEY` environment variables, applied by [`load`](Self::load)
///
/// A file replaces the whole configuration read so far; fields it leaves out
/// take their serde defaults.
///
/// # Example
///
/// ```no_run
/// use tessera_config::ConfigLoader;
///
/// # fn main() -> Result<(), tessera_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("config/app.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TESSERA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TesseraConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TesseraConfig::default(),
            env_prefix: None,
        }
    }

    /// Resets to the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = TesseraConfig::default();
        self
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(config.app.debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TesseraConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TesseraConfig::production();
        self
    }

    /// Reads a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable, has an
    /// unsupported extension or does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Reads a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses configuration from a string in `"toml"` or `"json"` format.
    ///
    /// ```
    /// use tessera_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[app]\ndefault_controller = \"Home\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.app.default_controller, "Home");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown formats and parse failures.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Sets the prefix for environment overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads `.env` from the working directory or its parents, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Dotenv`] when a `.env` file exists but is
    /// malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override does not parse or validation
    /// fails.
    pub fn load(mut self) -> Result<TesseraConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TesseraConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<TesseraConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let scoped = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&scoped)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["APP", "DEBUG"] => config.app.debug = bool_var(key, value)?,
            ["APP", "DEFAULT_CONTROLLER"] => config.app.default_controller = value.to_string(),
            ["APP", "DEFAULT_ACTION"] => config.app.default_action = value.to_string(),
            ["APP", "PATHINFO_DEPR"] => config.app.pathinfo_depr = value.to_string(),
            ["APP", "URL_HTML_SUFFIX"] => config.app.url_html_suffix = value.to_string(),
            ["APP", "DEFAULT_RETURN_TYPE"] => {
                config.app.default_return_type = value.to_lowercase();
            }
            ["APP", "DEFAULT_METHOD"] => config.app.default_method = value.to_string(),
            ["APP", "WITH_ROUTE"] => config.app.with_route = bool_var(key, value)?,

            ["MIDDLEWARE", "PRIORITY"] => config.middleware.priority = list_var(value),
            ["MIDDLEWARE", "GLOBAL"] => config.middleware.global = list_var(value),

            ["ROUTE", "COMPLETE_MATCH"] => config.route.complete_match = bool_var(key, value)?,

            ["LOG", "LEVEL"] => config.log.level = value.to_string(),
            ["LOG", "FORMAT"] => {
                config.log.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOG", "RECORD_TRACE"] => config.log.record_trace = bool_var(key, value)?,
            ["LOG", "ANSI_ENABLED"] => config.log.ansi_enabled = bool_var(key, value)?,
            ["LOG", "INCLUDE_LOCATION"] => config.log.include_location = bool_var(key, value)?,

            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = int_var(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = int_var(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => config.server.max_body_bytes = int_var(key, value)?,

            ["METRICS", "ENABLED"] => config.metrics.enabled = bool_var(key, value)?,
            ["METRICS", "ADDR"] => config.metrics.addr = value.to_string(),

            _ => {}
        }

        Ok(())
    }
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn int_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn list_var(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().with_defaults().load().unwrap();
        assert_eq!(config, TesseraConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let dev = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(dev.log.format, LogFormat::Pretty);

        let prod = ConfigLoader::new().with_production().load().unwrap();
        assert!(prod.metrics.enabled);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"app": {"debug": true}, "middleware": {"priority": ["auth", "log"]}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert!(config.app.debug);
        assert_eq!(config.middleware.priority, vec!["auth", "log"]);
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_with_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [app]
            url_html_suffix = "html|json"

            [route.bind]
            "user/:id" = "@User/show?id=:id"

            [server]
            http_addr = "127.0.0.1:3000"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.app.url_html_suffix, "html|json");
        assert_eq!(config.route.bind["user/:id"], "@User/show?id=:id");
        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_loader_file_errors() {
        assert!(matches!(
            ConfigLoader::new().with_file("/nonexistent/app.toml"),
            Err(ConfigError::FileNotFound { .. })
        ));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(ConfigLoader::new().with_file(file.path()).is_err());

        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/app.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string("[app]\ndefault_method = \"FETCH\"", "toml")
            .unwrap()
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        for truthy in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(truthy), Some(true));
        }
        for falsy in ["false", "False", "0", "no", "off"] {
            assert_eq!(parse_bool(falsy), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_apply_env_var_app() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__APP__DEBUG", "on", "T").unwrap();
        loader.apply_env_var("T__APP__DEFAULT_CONTROLLER", "Home", "T").unwrap();
        loader.apply_env_var("T__APP__DEFAULT_RETURN_TYPE", "HTML", "T").unwrap();
        assert!(loader.config.app.debug);
        assert_eq!(loader.config.app.default_controller, "Home");
        assert_eq!(loader.config.app.default_return_type, "html");
    }

    #[test]
    fn test_apply_env_var_lists() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("T__MIDDLEWARE__PRIORITY", "auth, session,,log", "T")
            .unwrap();
        assert_eq!(loader.config.middleware.priority, vec!["auth", "session", "log"]);
    }

    #[test]
    fn test_apply_env_var_numbers_and_formats() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__SERVER__REQUEST_TIMEOUT_MS", "500", "T").unwrap();
        loader.apply_env_var("T__LOG__FORMAT", "pretty", "T").unwrap();
        assert_eq!(loader.config.server.request_timeout_ms, 500);
        assert_eq!(loader.config.log.format, LogFormat::Pretty);

        assert!(loader.apply_env_var("T__SERVER__MAX_BODY_BYTES", "lots", "T").is_err());
        assert!(loader.apply_env_var("T__LOG__FORMAT", "xml", "T").is_err());
        assert!(loader.apply_env_var("T__METRICS__ENABLED", "maybe", "T").is_err());
    }

    #[test]
    fn test_apply_env_var_ignores_unknown_keys() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__CACHE__DRIVER", "redis", "T").unwrap();
        assert_eq!(loader.config, TesseraConfig::default());
        assert!(loader.apply_env_var("OTHER", "x", "T").is_err());
    }
}
