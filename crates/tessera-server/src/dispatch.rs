//! Executing a resolved route.
//!
//! A [`Dispatch`] is created per request from a router [`Resolution`]. It is
//! initialized before the route pipeline is built ([`Dispatch::init`]) and run
//! as that pipeline's destination ([`Dispatch::run`]).
//!
//! Controller execution goes through these steps:
//!
//! 1. build a fresh controller from the container (`controller:{Name}`, or
//!    the class identifier for `\\Class` targets)
//! 2. merge controller and action metadata
//! 3. check the request method
//! 4. validate declared inputs into the request parameters
//! 5. register controller middleware and run the controller pipeline
//! 6. bind arguments, call the action, coerce its [`Reply`]

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tessera_core::{
    Container, Reply, Request, Response, ResponseType, TesseraError, TesseraResult, Validate,
};
use tessera_middleware::{MiddlewareKind, MiddlewareManager};
use tessera_router::text::{snake, strip_tags, studly};
use tessera_router::{MethodRule, Resolution, RouteTarget, Vars};

use crate::controller::{ActionSignature, Controller};
use crate::route::RouteOptions;

/// API code of a controller that cannot be built.
pub const CONTROLLER_MISSING_CODE: i64 = 50014;

/// A middleware manager shared between the request runner and dispatch.
///
/// Each request works on its own copy so controller middleware registered
/// during dispatch is visible to the end hooks of that request only.
pub type SharedManager = Arc<Mutex<MiddlewareManager>>;

/// Application-wide dispatch settings.
#[derive(Debug)]
pub struct DispatchContext {
    /// Controller used when the URL names none.
    pub default_controller: String,
    /// Action used when the URL names none.
    pub default_action: String,
    /// Output type when neither the action nor the URL suffix picks one.
    pub default_type: ResponseType,
    /// Method rule for actions that declare none.
    pub default_method: MethodRule,
    /// Per-action method overrides.
    pub rest_actions: IndexMap<String, MethodRule>,
    /// Factories for controllers and callback classes.
    pub container: Arc<Container>,
    /// Rules and filters for declared inputs.
    pub validate: Arc<Validate>,
}

impl DispatchContext {
    /// Settings with the stock defaults.
    #[must_use]
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            default_controller: "Index".to_string(),
            default_action: "index".to_string(),
            default_type: ResponseType::Json,
            default_method: MethodRule::default(),
            rest_actions: IndexMap::new(),
            container,
            validate: Arc::new(Validate::new()),
        }
    }
}

/// A normalized dispatch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// A controller action.
    Controller {
        /// Studly controller name, e.g. `User` or `admin.UserGroup`.
        controller: String,
        /// Snake-case action name.
        action: String,
    },
    /// A class registered in the container under its own identifier.
    Callback {
        /// Class identifier.
        class: String,
        /// Snake-case method name.
        method: String,
    },
}

impl DispatchTarget {
    /// Normalizes a router target, filling in defaults.
    #[must_use]
    pub fn from_route(target: RouteTarget, context: &DispatchContext) -> Self {
        match target {
            RouteTarget::Controller { controller, action } => Self::Controller {
                controller: controller_name(
                    controller
                        .as_deref()
                        .filter(|c| !c.is_empty())
                        .unwrap_or(&context.default_controller),
                ),
                action: snake(&strip_tags(
                    action
                        .as_deref()
                        .filter(|a| !a.is_empty())
                        .unwrap_or(&context.default_action),
                )),
            },
            RouteTarget::Callback { class, method } => Self::Callback {
                class,
                method: snake(&strip_tags(
                    method
                        .as_deref()
                        .filter(|m| !m.is_empty())
                        .unwrap_or(&context.default_action),
                )),
            },
        }
    }
}

/// Controller names are studly cased; for `admin.user_group` only the last
/// part is converted.
fn controller_name(raw: &str) -> String {
    match raw.rsplit_once('.') {
        Some((prefix, name)) => format!("{prefix}.{}", studly(name)),
        None => studly(raw),
    }
}

/// One request's dispatch.
#[derive(Debug)]
pub struct Dispatch {
    target: DispatchTarget,
    vars: Vars,
    context: Arc<DispatchContext>,
}

impl Dispatch {
    /// Creates the dispatch for a resolution.
    #[must_use]
    pub fn new(resolution: Resolution, context: Arc<DispatchContext>) -> Self {
        Self {
            target: DispatchTarget::from_route(resolution.target, &context),
            vars: resolution.vars,
            context,
        }
    }

    /// The normalized target.
    #[must_use]
    pub const fn target(&self) -> &DispatchTarget {
        &self.target
    }

    /// Route variables collected by the router.
    #[must_use]
    pub const fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Prepares the request and registers route option middleware.
    ///
    /// Sets controller and action names, stores the route variables plus
    /// appended parameters, validates them against the option rules and adds
    /// option middleware to the route queue.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidArgument`] when a route parameter
    /// fails its rule, or the registration error of unknown middleware.
    pub fn init(
        &self,
        request: &mut Request,
        manager: &mut MiddlewareManager,
        options: &RouteOptions,
    ) -> TesseraResult<()> {
        match &self.target {
            DispatchTarget::Controller { controller, action } => {
                request.set_controller(controller.clone());
                request.set_action(action.clone());
            }
            DispatchTarget::Callback { class, method } => {
                request.set_controller(class.clone());
                request.set_action(method.clone());
            }
        }

        let mut vars: IndexMap<String, String> = self
            .vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (name, value) in options.appended() {
            vars.insert(name.clone(), value.clone());
        }
        request.set_route(vars);

        for (name, rules) in options.rules() {
            check_route_param(request, name, rules, &self.context.validate)?;
        }

        manager.import(options.middleware_specs().iter().cloned(), MiddlewareKind::Route)
    }

    /// Executes the target.
    ///
    /// # Errors
    ///
    /// Returns the classified error of any failing step; errors raised
    /// inside the controller pipeline are already rendered by its sink.
    pub async fn run(self, request: &mut Request, manager: &SharedManager) -> TesseraResult<Response> {
        let Self { target, context, .. } = self;
        match target {
            DispatchTarget::Controller { controller, action } => {
                run_controller(controller, action, request, manager, context).await
            }
            DispatchTarget::Callback { class, method } => {
                run_callback(class, method, request, manager, context).await
            }
        }
    }
}

fn check_route_param(
    request: &Request,
    name: &str,
    rules: &str,
    validate: &Validate,
) -> TesseraResult<()> {
    let value = request.param(name).unwrap_or_default();
    let rules: Vec<&str> = if rules.starts_with('/') {
        vec![rules]
    } else {
        rules.split('|').map(str::trim).filter(|r| !r.is_empty()).collect()
    };
    for rule in rules {
        let passed = if value.is_empty() {
            rule != "require"
        } else {
            validate.is(value, rule)
        };
        if !passed {
            return Err(TesseraError::invalid_argument(format!(
                "route param error: {name} must be {rule}"
            )));
        }
    }
    Ok(())
}

fn make_controller(context: &DispatchContext, id: &str, shown: &str) -> TesseraResult<Arc<dyn Controller>> {
    context.container.make::<dyn Controller>(id, true).map_err(|e| {
        tracing::debug!(controller = %shown, error = %e, "controller lookup failed");
        TesseraError::api(404, CONTROLLER_MISSING_CODE, format!("controller not exists:{shown}"))
    })
}

async fn run_controller(
    controller: String,
    action: String,
    request: &mut Request,
    manager: &SharedManager,
    context: Arc<DispatchContext>,
) -> TesseraResult<Response> {
    let instance = make_controller(&context, &format!("controller:{controller}"), &controller)?;
    run_action(instance, controller, action, request, manager, context).await
}

async fn run_callback(
    class: String,
    method: String,
    request: &mut Request,
    manager: &SharedManager,
    context: Arc<DispatchContext>,
) -> TesseraResult<Response> {
    let instance = make_controller(&context, &class, &class)?;
    run_action(instance, class, method, request, manager, context).await
}

/// Method check, input validation and the controller pipeline around one
/// action. `shown` names the controller in errors.
async fn run_action(
    instance: Arc<dyn Controller>,
    shown: String,
    action: String,
    request: &mut Request,
    manager: &SharedManager,
    context: Arc<DispatchContext>,
) -> TesseraResult<Response> {
    let signature = instance.actions().into_iter().find(|s| s.answers_to(&action));
    let meta = match &signature {
        Some(signature) => instance.annotation().merge(signature.annotation()),
        None => instance.annotation(),
    };

    let rule = context
        .rest_actions
        .get(&action)
        .or_else(|| meta.url_rule())
        .unwrap_or(&context.default_method);
    if !rule.allows(request.method()) {
        return Err(TesseraError::method_not_allowed(
            request.method().as_str(),
            rule.to_string(),
        ));
    }

    let valid = meta.check_input(request, &context.validate)?;
    request.set(valid);

    let pipeline = {
        let mut manager = manager.lock();
        for middleware in instance.middleware() {
            if middleware.applies_to(&action) {
                manager.controller(middleware.into_spec())?;
            }
        }
        for name in meta.middleware_names() {
            manager.controller(name.as_str())?;
        }
        manager.pipeline(&MiddlewareKind::Controller)
    };

    let default_type = context.default_type;
    pipeline
        .process(request, move |request| {
            Box::pin(async move {
                let reply = invoke(&*instance, signature.as_ref(), &shown, &action, request).await?;
                Ok(coerce(reply, request, default_type))
            })
        })
        .await
}

async fn invoke(
    instance: &dyn Controller,
    signature: Option<&ActionSignature>,
    controller: &str,
    action: &str,
    request: &mut Request,
) -> TesseraResult<Reply> {
    let call = match signature {
        Some(signature) => {
            let args = signature.bind(&request.params())?;
            instance.call(signature.name(), request, args)
        }
        None => {
            let params = request.params();
            instance.catch_all(action, request, params).ok_or_else(|| {
                TesseraError::not_found(format!("method not exists:{controller}->{action}()"))
            })?
        }
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(TesseraError::internal(anyhow::anyhow!(
            "{controller}->{action}() panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Turns an action's reply into a response.
///
/// Responses pass through. Data is rendered with the request's output type,
/// falling back to `default_type`. An empty reply sends the buffered output:
/// `204` with no body when nothing was written, `200` otherwise.
#[must_use]
pub fn coerce(reply: Reply, request: &mut Request, default_type: ResponseType) -> Response {
    let response_type = request.response_type().unwrap_or(default_type);
    match reply {
        Reply::Response(response) => response,
        Reply::Data(data) => Response::create(data, response_type, StatusCode::OK),
        Reply::Empty => {
            let output = request.take_output();
            if output.is_empty() {
                Response::empty(StatusCode::NO_CONTENT)
            } else {
                Response::create(Value::String(output), response_type, StatusCode::OK)
            }
        }
    }
}
