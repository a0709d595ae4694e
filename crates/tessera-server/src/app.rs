//! Application assembly.
//!
//! [`AppBuilder`] collects controllers, middleware and services into a
//! [`Container`], reads the dispatch settings from a [`TesseraConfig`] and
//! produces an immutable [`App`].

use std::sync::Arc;

use indexmap::IndexMap;
use tessera_config::{LogFormat, TesseraConfig};
use tessera_core::{
    Container, ErrorCategory, Handle, InjectionError, ResponseType, TesseraError, TesseraResult,
    Validate,
};
use tessera_middleware::{
    AccessLogMiddleware, Middleware, MiddlewareKind, MiddlewareManager, RequestIdMiddleware,
};
use tessera_router::{BindTable, MethodRule, SuffixPolicy};
use tessera_telemetry::LogConfig;

use crate::controller::Controller;
use crate::dispatch::DispatchContext;
use crate::route::{route_error, Route, RouteLoader, RouteOptions};

/// Container identifier of the built-in request id middleware.
pub const REQUEST_ID: &str = "request_id";

/// Container identifier of the built-in access log middleware.
pub const ACCESS_LOG: &str = "access_log";

/// A configured application.
///
/// # Example
///
/// ```
/// use tessera_config::TesseraConfig;
/// use tessera_server::App;
///
/// let app = App::builder(TesseraConfig::default()).build().unwrap();
/// assert!(app.container().has("request_id"));
/// assert!(!app.handle().is_debug());
/// ```
#[derive(Debug)]
pub struct App {
    config: TesseraConfig,
    container: Arc<Container>,
    handle: Arc<Handle>,
    middleware: MiddlewareManager,
    route: Route,
}

impl App {
    /// Starts building an application from configuration.
    #[must_use]
    pub fn builder(config: TesseraConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The configuration the application was built from.
    #[must_use]
    pub const fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// The container.
    #[must_use]
    pub const fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// The exception handler.
    #[must_use]
    pub const fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    /// The boot-time middleware registrations. Requests run on a copy.
    #[must_use]
    pub const fn middleware(&self) -> &MiddlewareManager {
        &self.middleware
    }

    /// The router.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Logging settings derived from the `[log]` section.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let log = &self.config.log;
        LogConfig {
            enabled: true,
            level: log.level.clone(),
            json_format: log.format == LogFormat::Json,
            ansi: log.ansi_enabled,
            file_line_info: log.include_location,
            include_target: true,
        }
    }

    /// Metrics settings derived from the `[metrics]` section.
    #[must_use]
    pub fn metrics_config(&self) -> tessera_telemetry::MetricsConfig {
        let metrics = &self.config.metrics;
        tessera_telemetry::MetricsConfig {
            enabled: metrics.enabled,
            addr: Some(metrics.addr.clone()).filter(|a| !a.is_empty()),
            ..Default::default()
        }
    }

    /// Installs the log subscriber and, when enabled, the metrics exporter.
    ///
    /// # Errors
    ///
    /// Returns an internal error when either cannot be installed.
    pub fn init_telemetry(&self) -> TesseraResult<()> {
        tessera_telemetry::init_telemetry(&self.log_config(), &self.metrics_config())
            .map_err(TesseraError::internal)
    }
}

/// Builder for [`App`].
pub struct AppBuilder {
    config: TesseraConfig,
    container: Container,
    validate: Validate,
    options: RouteOptions,
    loader: Option<Arc<dyn RouteLoader>>,
    ignore: Option<Vec<ErrorCategory>>,
}

impl AppBuilder {
    /// A builder with an empty container.
    #[must_use]
    pub fn new(config: TesseraConfig) -> Self {
        Self {
            config,
            container: Container::new(),
            validate: Validate::new(),
            options: RouteOptions::default(),
            loader: None,
            ignore: None,
        }
    }

    /// Registers a controller under `controller:{name}`.
    ///
    /// `name` is the studly name dispatch derives from the URL, e.g. `User`
    /// for `/user/show`, or `admin.User` for `/admin.user/show`. The factory
    /// runs for every request.
    #[must_use]
    pub fn controller<C, F>(mut self, name: &str, factory: F) -> Self
    where
        C: Controller,
        F: Fn(&Container) -> C + Send + Sync + 'static,
    {
        self.container
            .bind::<dyn Controller, _>(format!("controller:{name}"), move |c| {
                Ok(Arc::new(factory(c)) as Arc<dyn Controller>)
            });
        self
    }

    /// Registers a class reachable through `\Class` bind rules.
    #[must_use]
    pub fn class<C, F>(mut self, id: &str, factory: F) -> Self
    where
        C: Controller,
        F: Fn(&Container) -> C + Send + Sync + 'static,
    {
        self.container.bind::<dyn Controller, _>(id, move |c| {
            Ok(Arc::new(factory(c)) as Arc<dyn Controller>)
        });
        self
    }

    /// Registers a named middleware. The instance is created on first use
    /// and shared.
    #[must_use]
    pub fn middleware<M, F>(mut self, name: &str, factory: F) -> Self
    where
        M: Middleware,
        F: Fn(&Container) -> M + Send + Sync + 'static,
    {
        self.container.bind::<dyn Middleware, _>(name, move |c| {
            Ok(Arc::new(factory(c)) as Arc<dyn Middleware>)
        });
        self
    }

    /// Binds any other factory.
    #[must_use]
    pub fn bind<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, InjectionError> + Send + Sync + 'static,
    {
        self.container.bind::<T, _>(name, factory);
        self
    }

    /// Registers a typed service for controllers to resolve.
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.container.register(service);
        self
    }

    /// Replaces the validator used for declared inputs.
    #[must_use]
    pub fn validate(mut self, validate: Validate) -> Self {
        self.validate = validate;
        self
    }

    /// Sets options applied to every dispatch.
    #[must_use]
    pub fn route_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the route loader consulted before bind rules are checked.
    #[must_use]
    pub fn route_loader(mut self, loader: impl RouteLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Replaces the error categories that are never logged.
    #[must_use]
    pub fn ignore_errors(mut self, ignore: Vec<ErrorCategory>) -> Self {
        self.ignore = Some(ignore);
        self
    }

    /// Validates the configuration and assembles the application.
    ///
    /// # Errors
    ///
    /// Returns an internal error for invalid configuration and a server
    /// error for unknown middleware in `middleware.global`.
    pub fn build(self) -> TesseraResult<App> {
        let Self {
            config,
            mut container,
            validate,
            options,
            loader,
            ignore,
        } = self;
        config.validate().map_err(TesseraError::internal)?;

        if !container.has(REQUEST_ID) {
            container.bind::<dyn Middleware, _>(REQUEST_ID, |_| {
                Ok(Arc::new(RequestIdMiddleware::new()) as Arc<dyn Middleware>)
            });
        }
        if !container.has(ACCESS_LOG) {
            container.bind::<dyn Middleware, _>(ACCESS_LOG, |_| {
                Ok(Arc::new(AccessLogMiddleware::new()) as Arc<dyn Middleware>)
            });
        }

        let app = &config.app;
        let default_type: ResponseType = app.default_return_type.parse()?;
        let default_method: MethodRule = app.default_method.parse().map_err(route_error)?;
        let rest_actions = app
            .route_rest_action
            .iter()
            .map(|(action, rule)| Ok((action.clone(), rule.parse().map_err(route_error)?)))
            .collect::<TesseraResult<IndexMap<String, MethodRule>>>()?;
        let auto_response = app
            .auto_response
            .iter()
            .map(|(suffix, kind)| Ok((suffix.clone(), kind.parse()?)))
            .collect::<TesseraResult<Vec<(String, ResponseType)>>>()?;
        let binds = BindTable::from_pairs(
            config.route.bind.iter().map(|(rule, target)| (rule.as_str(), target.as_str())),
        )
        .map_err(route_error)?
        .with_complete_match(config.route.complete_match);

        let container = Arc::new(container);
        let mut handle = Handle::new(app.debug, config.log.record_trace);
        if let Some(ignore) = ignore {
            handle = handle.with_ignored(ignore);
        }
        let handle = Arc::new(handle);

        let context = Arc::new(DispatchContext {
            default_controller: app.default_controller.clone(),
            default_action: app.default_action.clone(),
            default_type,
            default_method,
            rest_actions,
            container: Arc::clone(&container),
            validate: Arc::new(validate),
        });

        let mut route = Route::new(context)
            .with_depr(app.pathinfo_depr.clone())
            .with_suffix(SuffixPolicy::parse(&app.url_html_suffix))
            .with_binds(binds)
            .with_route(app.with_route)
            .with_options(options);
        for (suffix, kind) in auto_response {
            route = route.with_auto_response(suffix, kind);
        }
        if let Some(loader) = loader {
            route = route.with_loader(loader);
        }

        let mut middleware = MiddlewareManager::new(Arc::clone(&container), Arc::clone(&handle))
            .with_aliases(
                config
                    .middleware
                    .alias
                    .iter()
                    .map(|(name, target)| (name.clone(), target.entries())),
            )
            .with_priority(config.middleware.priority.iter().cloned());
        middleware.import(
            config.middleware.global.iter().map(String::as_str),
            MiddlewareKind::Route,
        )?;

        tracing::debug!(
            debug = config.app.debug,
            global_middleware = config.middleware.global.len(),
            bind_rules = config.route.bind.len(),
            "application built"
        );

        Ok(App {
            config,
            container,
            handle,
            middleware,
            route,
        })
    }
}
