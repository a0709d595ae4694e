//! Route: from request path to response.
//!
//! [`Route::dispatch`] normalizes the path, consults the bind table, builds
//! the [`Dispatch`] and runs it behind the route middleware pipeline.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tessera_core::{Params, Request, Response, ResponseType, TesseraError, TesseraResult};
use tessera_middleware::{MiddlewareKind, MiddlewareSpec};
use tessera_router::{resolve, BindTable, PathInfo, RouteError, SuffixPolicy};

use crate::dispatch::{Dispatch, DispatchContext, SharedManager};

/// API code for routing failures other than not found.
pub const ROUTE_ERROR_CODE: i64 = 5020;

/// Options applied to every dispatch at initialization.
///
/// ```
/// use tessera_server::RouteOptions;
///
/// let options = RouteOptions::new()
///     .middleware("access_log")
///     .append("lang", "en")
///     .validate("id", "number");
/// assert_eq!(options.appended()["lang"], "en");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    middleware: Vec<MiddlewareSpec>,
    append: Params,
    validate: IndexMap<String, String>,
}

impl RouteOptions {
    /// No options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds route middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Into<MiddlewareSpec>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    /// Adds a parameter merged into the route variables.
    #[must_use]
    pub fn append(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append.insert(name.into(), value.into());
        self
    }

    /// Adds a rule for a route parameter. Several rules are separated by
    /// `|`; a rule starting with `/` is one regular expression.
    #[must_use]
    pub fn validate(mut self, name: impl Into<String>, rule: impl Into<String>) -> Self {
        self.validate.insert(name.into(), rule.into());
        self
    }

    /// Route middleware.
    #[must_use]
    pub fn middleware_specs(&self) -> &[MiddlewareSpec] {
        &self.middleware
    }

    /// Appended parameters.
    #[must_use]
    pub const fn appended(&self) -> &Params {
        &self.append
    }

    /// Parameter rules.
    #[must_use]
    pub const fn rules(&self) -> &IndexMap<String, String> {
        &self.validate
    }
}

/// Loads bind rules before a dispatch checks them.
///
/// Implemented for closures:
///
/// ```
/// use tessera_router::BindTable;
/// use tessera_server::RouteLoader;
///
/// let loader = |table: &mut BindTable| table.bind("about", "@Page/about").map(|_| ());
/// let mut table = BindTable::new();
/// loader.load(&mut table).unwrap();
/// assert!(!table.is_empty());
/// ```
pub trait RouteLoader: Send + Sync {
    /// Adds rules to the table.
    fn load(&self, table: &mut BindTable) -> Result<(), RouteError>;
}

impl<F> RouteLoader for F
where
    F: Fn(&mut BindTable) -> Result<(), RouteError> + Send + Sync,
{
    fn load(&self, table: &mut BindTable) -> Result<(), RouteError> {
        self(table)
    }
}

/// The router of an application.
#[derive(Clone)]
pub struct Route {
    depr: String,
    suffix: SuffixPolicy,
    auto_response: IndexMap<String, ResponseType>,
    binds: BindTable,
    with_route: bool,
    options: RouteOptions,
    loader: Option<Arc<dyn RouteLoader>>,
    context: Arc<DispatchContext>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("depr", &self.depr)
            .field("suffix", &self.suffix)
            .field("auto_response", &self.auto_response)
            .field("binds", &self.binds.rules().len())
            .field("with_route", &self.with_route)
            .field("options", &self.options)
            .field("loader", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

impl Route {
    /// A router with `/` as separator, any URL suffix and no bind rules.
    #[must_use]
    pub fn new(context: Arc<DispatchContext>) -> Self {
        Self {
            depr: "/".to_string(),
            suffix: SuffixPolicy::Any,
            auto_response: IndexMap::new(),
            binds: BindTable::new(),
            with_route: true,
            options: RouteOptions::default(),
            loader: None,
            context,
        }
    }

    /// Sets the path separator.
    #[must_use]
    pub fn with_depr(mut self, depr: impl Into<String>) -> Self {
        self.depr = depr.into();
        self
    }

    /// Sets the allowed URL suffixes.
    #[must_use]
    pub fn with_suffix(mut self, suffix: SuffixPolicy) -> Self {
        self.suffix = suffix;
        self
    }

    /// Maps a URL suffix to an output type. Mapped suffixes are always
    /// allowed.
    #[must_use]
    pub fn with_auto_response(mut self, suffix: impl Into<String>, response_type: ResponseType) -> Self {
        self.auto_response
            .insert(suffix.into().to_ascii_lowercase(), response_type);
        self
    }

    /// Sets the bind table.
    #[must_use]
    pub fn with_binds(mut self, binds: BindTable) -> Self {
        self.binds = binds;
        self
    }

    /// Turns bind checking and route loading on or off.
    #[must_use]
    pub const fn with_route(mut self, enabled: bool) -> Self {
        self.with_route = enabled;
        self
    }

    /// Sets the options applied at dispatch initialization.
    #[must_use]
    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the route loader.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn RouteLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Dispatch settings.
    #[must_use]
    pub const fn context(&self) -> &Arc<DispatchContext> {
        &self.context
    }

    /// Resolves and runs a request.
    ///
    /// Errors raised inside the route pipeline come back as rendered
    /// responses; errors before it (path, binding, initialization) are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::NotFound`] for disallowed suffixes and
    /// unmatched paths under complete matching, or the initialization error.
    pub async fn dispatch(&self, request: &mut Request, manager: &SharedManager) -> TesseraResult<Response> {
        let always: Vec<&str> = self.auto_response.keys().map(String::as_str).collect();
        let path = PathInfo::parse_with(request.pathinfo(), &self.depr, &self.suffix, &always)
            .map_err(route_error)?;
        if let Some(response_type) = path.suffix().and_then(|s| self.auto_response.get(s)) {
            request.set_response_type(*response_type);
        }

        let binds = self.bind_table()?;
        let resolution = resolve(&path, binds.as_ref()).map_err(route_error)?;
        tracing::debug!(
            rule = resolution.rule.as_deref().unwrap_or("-"),
            target = ?resolution.target,
            "route resolved"
        );

        let dispatch = Dispatch::new(resolution, Arc::clone(&self.context));
        let pipeline = {
            let mut manager = manager.lock();
            dispatch.init(request, &mut manager, &self.options)?;
            manager.pipeline(&MiddlewareKind::Route)
        };

        let manager = Arc::clone(manager);
        pipeline
            .process(request, move |request| {
                Box::pin(async move { dispatch.run(request, &manager).await })
            })
            .await
    }

    fn bind_table(&self) -> TesseraResult<Option<BindTable>> {
        if !self.with_route {
            return Ok(None);
        }
        match &self.loader {
            Some(loader) => {
                let mut table = self.binds.clone();
                loader.load(&mut table).map_err(route_error)?;
                Ok(Some(table))
            }
            None => Ok(Some(self.binds.clone())),
        }
    }
}

/// Maps a routing error into the framework taxonomy.
#[must_use]
pub fn route_error(error: RouteError) -> TesseraError {
    if error.is_not_found() {
        TesseraError::not_found(error.to_string())
    } else {
        TesseraError::server(ROUTE_ERROR_CODE, error.to_string())
    }
}
