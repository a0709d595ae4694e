//! Middleware registration and ordering.
//!
//! [`MiddlewareManager`] keeps one queue per [`MiddlewareKind`]. References
//! are normalized when they are registered:
//!
//! - a closure is stored as is;
//! - a name that appears in the alias table expands to its targets, which
//!   are registered in turn (aliases may point at other aliases);
//! - any other name must be bound to a `dyn Middleware` in the container.
//!   The instance itself is only created when a pipeline first runs it.
//!
//! Anything else fails at registration with a server error (code 5011).
//!
//! [`pipeline`](MiddlewareManager::pipeline) orders a queue by the priority
//! table and uses the exception handler as the pipeline's sink.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tessera_core::{Container, Handle, Request, Response, TesseraError, TesseraResult};

use crate::error::INVALID_MIDDLEWARE_CODE;
use crate::middleware::{Middleware, MiddlewarePipe};
use crate::pipeline::{Pipe, Pipeline};

/// Queue a middleware belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MiddlewareKind {
    /// Wraps the whole dispatch.
    #[default]
    Route,
    /// Wraps only the controller action.
    Controller,
    /// Any other queue.
    Custom(String),
}

impl MiddlewareKind {
    /// Queue name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Route => "route",
            Self::Controller => "controller",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for MiddlewareKind {
    fn from(name: &str) -> Self {
        match name {
            "route" => Self::Route,
            "controller" => Self::Controller,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a middleware, before registration.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// An instance.
    Closure(Arc<dyn Middleware>),
    /// A container identifier, or an alias if the alias table has it.
    Class(String),
    /// An alias that must exist in the alias table.
    Alias(String),
}

impl MiddlewareRef {
    /// Wraps an instance.
    pub fn closure(middleware: impl Middleware) -> Self {
        Self::Closure(Arc::new(middleware))
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(m) => f.debug_tuple("Closure").field(&m.name()).finish(),
            Self::Class(name) => f.debug_tuple("Class").field(name).finish(),
            Self::Alias(name) => f.debug_tuple("Alias").field(name).finish(),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        Self::Class(name.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        Self::Class(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Closure(middleware)
    }
}

/// A reference plus the parameter handed to the middleware on each call.
#[derive(Debug, Clone)]
pub struct MiddlewareSpec {
    reference: MiddlewareRef,
    param: Option<Value>,
}

impl MiddlewareSpec {
    /// Creates a spec without a parameter.
    pub fn new(reference: impl Into<MiddlewareRef>) -> Self {
        Self {
            reference: reference.into(),
            param: None,
        }
    }

    /// Sets the parameter.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// The reference.
    #[must_use]
    pub const fn reference(&self) -> &MiddlewareRef {
        &self.reference
    }
}

impl From<MiddlewareRef> for MiddlewareSpec {
    fn from(reference: MiddlewareRef) -> Self {
        Self::new(reference)
    }
}

impl From<&str> for MiddlewareSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MiddlewareSpec {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareSpec {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::new(middleware)
    }
}

#[derive(Clone)]
enum Handler {
    Closure(Arc<dyn Middleware>),
    Class(String),
}

/// A registered middleware.
#[derive(Clone)]
pub struct Entry {
    handler: Handler,
    param: Option<Value>,
}

impl Entry {
    /// Middleware name, or the container identifier for named entries.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.handler {
            Handler::Closure(m) => m.name(),
            Handler::Class(name) => name,
        }
    }

    /// Container identifier, for named entries.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        match &self.handler {
            Handler::Class(name) => Some(name),
            Handler::Closure(_) => None,
        }
    }

    /// Registration parameter.
    #[must_use]
    pub const fn param(&self) -> Option<&Value> {
        self.param.as_ref()
    }

    fn pipe(&self, container: &Arc<Container>) -> MiddlewarePipe {
        match &self.handler {
            Handler::Closure(m) => MiddlewarePipe::new(Arc::clone(m), self.param.clone()),
            Handler::Class(name) => {
                MiddlewarePipe::named(name.clone(), Arc::clone(container), self.param.clone())
            }
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name())
            .field("class", &self.class().is_some())
            .field("param", &self.param)
            .finish()
    }
}

/// Middleware queues.
///
/// Populated at boot and cloned for each request, so per-request additions
/// such as controller middleware never leak into other requests.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::{Container, Handle};
/// use tessera_middleware::{Middleware, MiddlewareKind, MiddlewareManager, RequestIdMiddleware};
///
/// let mut container = Container::new();
/// container.bind::<dyn Middleware, _>("request_id", |_| {
///     Ok(Arc::new(RequestIdMiddleware::new()) as Arc<dyn Middleware>)
/// });
///
/// let mut manager = MiddlewareManager::new(Arc::new(container), Arc::new(Handle::default()))
///     .with_aliases([("base", vec!["request_id"])]);
/// manager.add("base", MiddlewareKind::Route).unwrap();
///
/// assert_eq!(manager.all(&MiddlewareKind::Route)[0].name(), "request_id");
/// assert!(manager.add("nope", MiddlewareKind::Route).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareManager {
    queues: IndexMap<MiddlewareKind, Vec<Entry>>,
    aliases: IndexMap<String, Vec<String>>,
    priority: Vec<String>,
    container: Arc<Container>,
    handle: Arc<Handle>,
}

impl MiddlewareManager {
    /// Creates a manager with empty queues.
    #[must_use]
    pub fn new(container: Arc<Container>, handle: Arc<Handle>) -> Self {
        Self {
            queues: IndexMap::new(),
            aliases: IndexMap::new(),
            priority: Vec::new(),
            container,
            handle,
        }
    }

    /// Sets the alias table.
    #[must_use]
    pub fn with_aliases<I, K, V, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases
            .into_iter()
            .map(|(name, targets)| (name.into(), targets.into_iter().map(Into::into).collect()))
            .collect();
        self
    }

    /// Sets the priority table, highest priority first.
    #[must_use]
    pub fn with_priority<I, S>(mut self, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = priority.into_iter().map(Into::into).collect();
        self
    }

    /// The container used to resolve named middleware.
    #[must_use]
    pub const fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// The exception handler used as pipeline sink.
    #[must_use]
    pub const fn handle(&self) -> &Arc<Handle> {
        &self.handle
    }

    /// Appends a middleware to a queue.
    ///
    /// # Errors
    ///
    /// Returns a server error (code 5011) for unknown names and aliases,
    /// and for aliases that refer back to themselves.
    pub fn add(
        &mut self,
        middleware: impl Into<MiddlewareSpec>,
        kind: MiddlewareKind,
    ) -> TesseraResult<()> {
        let entries = self.expand(middleware.into())?;
        self.queues.entry(kind).or_default().extend(entries);
        Ok(())
    }

    /// Prepends a middleware to a queue. Alias groups keep their order.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn unshift(
        &mut self,
        middleware: impl Into<MiddlewareSpec>,
        kind: MiddlewareKind,
    ) -> TesseraResult<()> {
        let entries = self.expand(middleware.into())?;
        let queue = self.queues.entry(kind).or_default();
        queue.splice(0..0, entries);
        Ok(())
    }

    /// Appends several middleware to a queue.
    ///
    /// # Errors
    ///
    /// Stops at the first reference that fails; earlier ones stay registered.
    pub fn import<I>(&mut self, middleware: I, kind: MiddlewareKind) -> TesseraResult<()>
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareSpec>,
    {
        for item in middleware {
            self.add(item, kind.clone())?;
        }
        Ok(())
    }

    /// Appends to the controller queue.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn controller(&mut self, middleware: impl Into<MiddlewareSpec>) -> TesseraResult<()> {
        self.add(middleware, MiddlewareKind::Controller)
    }

    /// The entries of a queue, in registration order.
    #[must_use]
    pub fn all(&self, kind: &MiddlewareKind) -> &[Entry] {
        self.queues.get(kind).map_or(&[], Vec::as_slice)
    }

    /// Builds a pipeline over a queue, sorted by priority.
    #[must_use]
    pub fn pipeline(&self, kind: &MiddlewareKind) -> Pipeline {
        let mut entries: Vec<&Entry> = self.all(kind).iter().collect();
        // stable: equal scores keep registration order
        entries.sort_by_key(|entry| Reverse(self.priority_of(entry)));

        let pipes: Vec<Arc<dyn Pipe<Request, Response, TesseraError>>> = entries
            .into_iter()
            .map(|entry| Arc::new(entry.pipe(&self.container)) as Arc<dyn Pipe<_, _, _>>)
            .collect();

        let handle = Arc::clone(&self.handle);
        Pipeline::new()
            .through(pipes)
            .when_exception(move |request: &Request, error: TesseraError| {
                tessera_telemetry::record_exception(error.category().as_str());
                handle.handle(request, error)
            })
    }

    /// Runs the end hook of every named middleware, queue by queue in
    /// registration order.
    pub fn end(&self, response: &Response) {
        for entry in self.queues.values().flatten() {
            let Some(name) = entry.class() else { continue };
            match self.container.make::<dyn Middleware>(name, false) {
                Ok(middleware) => middleware.end(response),
                Err(e) => tracing::warn!(middleware = %name, error = %e, "end hook skipped"),
            }
        }
    }

    fn priority_of(&self, entry: &Entry) -> i64 {
        entry
            .class()
            .and_then(|class| self.priority.iter().rev().position(|p| p == class))
            .map_or(-1, |index| i64::try_from(index).unwrap_or(i64::MAX))
    }

    fn expand(&self, spec: MiddlewareSpec) -> TesseraResult<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut visiting = Vec::new();
        self.expand_into(spec, &mut visiting, &mut entries)?;
        Ok(entries)
    }

    fn expand_into(
        &self,
        spec: MiddlewareSpec,
        visiting: &mut Vec<String>,
        out: &mut Vec<Entry>,
    ) -> TesseraResult<()> {
        let MiddlewareSpec { reference, param } = spec;
        match reference {
            MiddlewareRef::Closure(middleware) => {
                out.push(Entry {
                    handler: Handler::Closure(middleware),
                    param,
                });
                Ok(())
            }
            MiddlewareRef::Alias(name) if self.aliases.contains_key(&name) => {
                self.expand_alias(name, param, visiting, out)
            }
            MiddlewareRef::Class(name) if self.aliases.contains_key(&name) => {
                self.expand_alias(name, param, visiting, out)
            }
            MiddlewareRef::Class(name) if self.container.has_binding_for::<dyn Middleware>(&name) => {
                out.push(Entry {
                    handler: Handler::Class(name),
                    param,
                });
                Ok(())
            }
            MiddlewareRef::Class(name) | MiddlewareRef::Alias(name) => Err(TesseraError::server(
                INVALID_MIDDLEWARE_CODE,
                format!("The middleware is invalid: {name}"),
            )),
        }
    }

    fn expand_alias(
        &self,
        name: String,
        param: Option<Value>,
        visiting: &mut Vec<String>,
        out: &mut Vec<Entry>,
    ) -> TesseraResult<()> {
        if visiting.contains(&name) {
            visiting.push(name);
            return Err(TesseraError::server(
                INVALID_MIDDLEWARE_CODE,
                format!("The middleware alias is circular: {}", visiting.join(" -> ")),
            ));
        }

        let targets = self.aliases.get(&name).cloned().unwrap_or_default();
        visiting.push(name);
        for target in targets {
            let spec = MiddlewareSpec {
                reference: MiddlewareRef::Class(target),
                param: param.clone(),
            };
            self.expand_into(spec, visiting, out)?;
        }
        visiting.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use crate::pipeline::Next;
    use http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tessera_core::{BoxFuture, Reply};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        log: Log,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle<'a>(
            &'a self,
            request: &'a mut Request,
            next: Next<'a>,
            param: Option<&'a Value>,
        ) -> BoxFuture<'a, TesseraResult<Reply>> {
            Box::pin(async move {
                let entry = match param {
                    Some(p) => format!("{}({p})", self.name),
                    None => self.name.clone(),
                };
                self.log.lock().unwrap().push(entry);
                Ok(next.run(request).await?.into())
            })
        }

        fn end(&self, response: &Response) {
            self.log
                .lock()
                .unwrap()
                .push(format!("end:{}:{}", self.name, response.status().as_u16()));
        }
    }

    fn container(names: &[&str], log: &Log, made: &Arc<AtomicUsize>) -> Arc<Container> {
        let mut container = Container::new();
        for name in names {
            let name = (*name).to_string();
            let log = Arc::clone(log);
            let made = Arc::clone(made);
            container.bind::<dyn Middleware, _>(name.clone(), move |_| {
                made.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Recorder {
                    name: name.clone(),
                    log: Arc::clone(&log),
                }) as Arc<dyn Middleware>)
            });
        }
        Arc::new(container)
    }

    fn manager(names: &[&str]) -> (MiddlewareManager, Log, Arc<AtomicUsize>) {
        let log = Log::default();
        let made = Arc::new(AtomicUsize::new(0));
        let manager = MiddlewareManager::new(
            container(names, &log, &made),
            Arc::new(Handle::default()),
        );
        (manager, log, made)
    }

    fn ok(_request: &mut Request) -> BoxFuture<'_, TesseraResult<Response>> {
        Box::pin(async { Ok(Response::json(json!({"ok": true}))) })
    }

    async fn run(manager: &MiddlewareManager, kind: &MiddlewareKind) -> Response {
        let mut request = Request::new("/");
        manager.pipeline(kind).process(&mut request, ok).await.unwrap()
    }

    fn names(manager: &MiddlewareManager, kind: &MiddlewareKind) -> Vec<String> {
        manager.all(kind).iter().map(|e| e.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_priority_pins_order() {
        let (manager, log, _) = manager(&["logger", "auth"]);
        let mut manager = manager.with_priority(["auth", "logger"]);
        manager.import(["logger", "auth"], MiddlewareKind::Route).unwrap();

        run(&manager, &MiddlewareKind::Route).await;
        assert_eq!(*log.lock().unwrap(), vec!["auth", "logger"]);
    }

    #[tokio::test]
    async fn test_order_is_deterministic() {
        let (manager, log, _) = manager(&["a", "b", "c", "d"]);
        let mut manager = manager.with_priority(["c"]);
        manager.import(["a", "b", "c", "d"], MiddlewareKind::Route).unwrap();

        for _ in 0..3 {
            run(&manager, &MiddlewareKind::Route).await;
        }
        let log = log.lock().unwrap();
        for round in log.chunks(4) {
            // unlisted entries keep registration order behind pinned ones
            assert_eq!(round, ["c", "a", "b", "d"]);
        }
    }

    #[tokio::test]
    async fn test_named_middleware_resolved_lazily_and_shared() {
        let (mut manager, _, made) = manager(&["auth"]);
        manager.add("auth", MiddlewareKind::Route).unwrap();
        assert_eq!(made.load(Ordering::SeqCst), 0);

        run(&manager, &MiddlewareKind::Route).await;
        run(&manager, &MiddlewareKind::Route).await;
        assert_eq!(made.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_alias_groups_expand_recursively() {
        let (manager, _, _) = manager(&["auth", "session", "log"]);
        let mut manager = manager.with_aliases([
            ("web", vec!["session", "secure"]),
            ("secure", vec!["auth"]),
        ]);
        manager.add("log", MiddlewareKind::Route).unwrap();
        manager.add(MiddlewareRef::Alias("web".into()), MiddlewareKind::Route).unwrap();

        assert_eq!(names(&manager, &MiddlewareKind::Route), vec!["log", "session", "auth"]);
    }

    #[test]
    fn test_invalid_references_fail_at_registration() {
        let (manager, _, _) = manager(&["auth"]);
        let mut manager = manager.with_aliases([("loop", vec!["back"]), ("back", vec!["loop"])]);

        let err = manager.add("unknown", MiddlewareKind::Route).unwrap_err();
        assert_eq!(err.api_code(), INVALID_MIDDLEWARE_CODE);

        let err = manager.add(MiddlewareRef::Alias("auth".into()), MiddlewareKind::Route).unwrap_err();
        assert_eq!(err.api_code(), INVALID_MIDDLEWARE_CODE);

        let err = manager.add("loop", MiddlewareKind::Route).unwrap_err();
        assert!(err.to_string().contains("loop -> back -> loop"));

        assert!(manager.all(&MiddlewareKind::Route).is_empty());
    }

    #[test]
    fn test_unshift_and_queues() {
        let (mut manager, _, _) = manager(&["a", "b", "c"]);
        manager.add("a", MiddlewareKind::Route).unwrap();
        manager.unshift("b", MiddlewareKind::Route).unwrap();
        manager.controller("c").unwrap();
        manager.add("a", MiddlewareKind::from("api")).unwrap();

        assert_eq!(names(&manager, &MiddlewareKind::Route), vec!["b", "a"]);
        assert_eq!(names(&manager, &MiddlewareKind::Controller), vec!["c"]);
        assert_eq!(names(&manager, &MiddlewareKind::Custom("api".into())), vec!["a"]);
        assert!(manager.all(&MiddlewareKind::Custom("none".into())).is_empty());
    }

    #[tokio::test]
    async fn test_params_reach_middleware() {
        let (mut manager, log, _) = manager(&["auth"]);
        manager
            .add(MiddlewareSpec::new("auth").with_param("admin"), MiddlewareKind::Route)
            .unwrap();
        run(&manager, &MiddlewareKind::Route).await;
        assert_eq!(*log.lock().unwrap(), vec![r#"auth("admin")"#]);
    }

    #[tokio::test]
    async fn test_errors_render_through_handle() {
        let (mut manager, _, _) = manager(&[]);
        let bad = FnMiddleware::new("bad", |_request, _next, _param| {
            Box::pin(async { Ok(Reply::Data(json!(42))) })
        });
        manager.add(MiddlewareRef::closure(bad), MiddlewareKind::Route).unwrap();

        let response = run(&manager, &MiddlewareKind::Route).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.api_code(), Some(crate::error::INVALID_RETURN_CODE));
        assert_eq!(response.message(), Some("System Exception"));
    }

    #[tokio::test]
    async fn test_end_runs_named_hooks_in_registration_order() {
        let (mut manager, log, _) = manager(&["a", "b"]);
        let closure = FnMiddleware::new("inline", |request, next, _param| {
            Box::pin(async move { Ok(next.run(request).await?.into()) })
        });
        manager.controller("b").unwrap();
        manager.add("a", MiddlewareKind::Route).unwrap();
        manager.add(MiddlewareRef::closure(closure), MiddlewareKind::Route).unwrap();

        manager.end(&Response::empty(StatusCode::NO_CONTENT));
        assert_eq!(*log.lock().unwrap(), vec!["end:b:204", "end:a:204"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let (mut template, _, _) = manager(&["a", "b"]);
        template.add("a", MiddlewareKind::Route).unwrap();

        let mut per_request = template.clone();
        per_request.controller("b").unwrap();

        assert!(template.all(&MiddlewareKind::Controller).is_empty());
        assert_eq!(per_request.all(&MiddlewareKind::Route).len(), 1);
    }
}
