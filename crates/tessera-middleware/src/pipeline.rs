//! Generic pipeline.
//!
//! A [`Pipeline`] threads one mutable value (the *passable*) through an
//! ordered list of [`Pipe`]s and finally a destination. Each pipe receives a
//! [`Next`] and decides whether to continue; not calling it short-circuits
//! everything behind it.
//!
//! Every layer, the destination included, intercepts the errors produced by
//! itself and everything below it. With a sink registered through
//! [`Pipeline::when_exception`] the error becomes an output at the nearest
//! layer; without one it propagates to the caller.
//!
//! ```text
//!   pipe[0] ── next ──▶ pipe[1] ── next ──▶ destination
//!      ▲                   ▲                    │
//!      └── sink(err) ◀─────┴──── sink(err) ◀────┘
//! ```

use std::sync::Arc;

use tessera_core::{BoxFuture, Request, Response, TesseraError};

use crate::error::PipelineError;

/// Converts an error into an output, given the passable it was raised for.
pub type SinkFn<P, O, E> = dyn Fn(&P, E) -> O + Send + Sync;

type Destination<'a, P, O, E> =
    Box<dyn for<'p> FnOnce(&'p mut P) -> BoxFuture<'p, Result<O, E>> + Send + 'a>;

/// One layer of a pipeline.
pub trait Pipe<P, O, E>: Send + Sync {
    /// Handles the passable, optionally delegating to `next`.
    fn handle<'a>(&'a self, passable: &'a mut P, next: Next<'a, P, O, E>)
        -> BoxFuture<'a, Result<O, E>>;
}

/// The remainder of a pipeline, handed to each [`Pipe`].
///
/// Consumed by [`run`](Self::run), so a layer can continue at most once.
pub struct Next<'a, P = Request, O = Response, E = TesseraError> {
    inner: NextInner<'a, P, O, E>,
    sink: Option<&'a SinkFn<P, O, E>>,
}

enum NextInner<'a, P, O, E> {
    Chain {
        pipe: &'a dyn Pipe<P, O, E>,
        next: Box<Next<'a, P, O, E>>,
    },
    Destination(Destination<'a, P, O, E>),
}

impl<'a, P, O, E> Next<'a, P, O, E>
where
    P: Send,
    O: Send,
    E: Send,
{
    fn chain(pipe: &'a dyn Pipe<P, O, E>, next: Self, sink: Option<&'a SinkFn<P, O, E>>) -> Self {
        Self {
            inner: NextInner::Chain {
                pipe,
                next: Box::new(next),
            },
            sink,
        }
    }

    fn destination(destination: Destination<'a, P, O, E>, sink: Option<&'a SinkFn<P, O, E>>) -> Self {
        Self {
            inner: NextInner::Destination(destination),
            sink,
        }
    }

    /// Runs the rest of the pipeline.
    ///
    /// Errors raised at or below this layer go to the sink when one is set.
    pub async fn run(self, passable: &mut P) -> Result<O, E> {
        let sink = self.sink;
        let result = match self.inner {
            NextInner::Chain { pipe, next } => pipe.handle(passable, *next).await,
            NextInner::Destination(destination) => destination(passable).await,
        };
        match (result, sink) {
            (Err(error), Some(sink)) => Ok(sink(passable, error)),
            (result, _) => result,
        }
    }
}

/// A pipe built from a closure.
///
/// The passable, output and error types are named on [`new`](Self::new) so
/// the closure's arguments can be inferred.
///
/// ```
/// use tessera_middleware::pipeline::{FnPipe, Pipeline};
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::new().pipe(FnPipe::new::<Vec<&str>, usize, String>(|trail, next| {
///     Box::pin(async move {
///         trail.push("outer");
///         next.run(trail).await
///     })
/// }));
///
/// let mut trail = Vec::new();
/// let len = pipeline
///     .process(&mut trail, |trail| Box::pin(async move { Ok(trail.len()) }))
///     .await;
/// assert_eq!(len, Ok(1));
/// # });
/// ```
pub struct FnPipe<F> {
    func: F,
}

impl<F> FnPipe<F> {
    /// Wraps a closure.
    pub fn new<P, O, E>(func: F) -> Self
    where
        F: for<'a> Fn(&'a mut P, Next<'a, P, O, E>) -> BoxFuture<'a, Result<O, E>> + Send + Sync,
    {
        Self { func }
    }
}

impl<P, O, E, F> Pipe<P, O, E> for FnPipe<F>
where
    F: for<'a> Fn(&'a mut P, Next<'a, P, O, E>) -> BoxFuture<'a, Result<O, E>> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        passable: &'a mut P,
        next: Next<'a, P, O, E>,
    ) -> BoxFuture<'a, Result<O, E>> {
        (self.func)(passable, next)
    }
}

/// Composes pipes around a destination.
///
/// Pipes run in the order given; ordering them is the caller's job.
pub struct Pipeline<P = Request, O = Response, E = TesseraError> {
    passable: Option<P>,
    pipes: Vec<Arc<dyn Pipe<P, O, E>>>,
    sink: Option<Arc<SinkFn<P, O, E>>>,
}

impl<P, O, E> Default for Pipeline<P, O, E> {
    fn default() -> Self {
        Self {
            passable: None,
            pipes: Vec::new(),
            sink: None,
        }
    }
}

impl<P, O, E> Pipeline<P, O, E>
where
    P: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value threaded through the pipes, replacing any earlier one.
    pub fn send(mut self, passable: P) -> Self {
        self.passable = Some(passable);
        self
    }

    /// Replaces the pipes.
    pub fn through<I>(mut self, pipes: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Pipe<P, O, E>>>,
    {
        self.pipes = pipes.into_iter().collect();
        self
    }

    /// Appends one pipe.
    pub fn pipe(mut self, pipe: impl Pipe<P, O, E> + 'static) -> Self {
        self.pipes.push(Arc::new(pipe));
        self
    }

    /// Registers the error sink.
    pub fn when_exception<F>(mut self, sink: F) -> Self
    where
        F: Fn(&P, E) -> O + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Number of pipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    /// Returns `true` when there are no pipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Runs the pipeline over the value given to [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NothingSent`] (converted into `E`) when no
    /// value was sent, or any error no sink converted.
    pub async fn then<F>(mut self, destination: F) -> Result<O, E>
    where
        F: for<'p> FnOnce(&'p mut P) -> BoxFuture<'p, Result<O, E>> + Send + 'static,
        E: From<PipelineError>,
    {
        let mut passable = self.passable.take().ok_or(PipelineError::NothingSent)?;
        self.process(&mut passable, destination).await
    }

    /// Runs the pipeline over a borrowed passable, which stays usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns any error no sink converted.
    pub async fn process<'a, F>(&'a self, passable: &'a mut P, destination: F) -> Result<O, E>
    where
        F: for<'p> FnOnce(&'p mut P) -> BoxFuture<'p, Result<O, E>> + Send + 'a,
    {
        self.chain(Box::new(destination)).run(passable).await
    }

    fn chain<'a>(&'a self, destination: Destination<'a, P, O, E>) -> Next<'a, P, O, E> {
        let sink = self.sink.as_deref();
        let mut next = Next::destination(destination, sink);
        for pipe in self.pipes.iter().rev() {
            next = Next::chain(pipe.as_ref(), next, sink);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    type Trail = Vec<String>;
    type TrailPipe = Arc<dyn Pipe<Trail, String, String>>;

    fn mark(name: &'static str) -> TrailPipe {
        Arc::new(FnPipe::new::<Trail, String, String>(move |trail, next| {
            Box::pin(async move {
                trail.push(format!("{name}:before"));
                let out = next.run(trail).await;
                trail.push(format!("{name}:after"));
                out
            })
        }))
    }

    fn reject(message: &'static str) -> TrailPipe {
        Arc::new(FnPipe::new::<Trail, String, String>(move |_trail, _next| {
            Box::pin(async move { Err(message.to_string()) })
        }))
    }

    fn finish(trail: &mut Trail) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async move {
            trail.push("destination".to_string());
            Ok("done".to_string())
        })
    }

    fn fail(_trail: &mut Trail) -> BoxFuture<'_, Result<String, String>> {
        Box::pin(async { Err("boom".to_string()) })
    }

    #[tokio::test]
    async fn test_pipes_wrap_in_order() {
        let pipeline = Pipeline::new().through(vec![mark("a"), mark("b")]);
        let mut trail = Trail::new();
        let out = pipeline.process(&mut trail, finish).await;

        assert_eq!(out, Ok("done".to_string()));
        assert_eq!(
            trail,
            vec!["a:before", "b:before", "destination", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_destination() {
        let pipeline = Pipeline::<Trail, String, String>::new();
        assert!(pipeline.is_empty());
        let mut trail = Trail::new();
        assert_eq!(pipeline.process(&mut trail, finish).await, Ok("done".to_string()));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        static REACHED: AtomicBool = AtomicBool::new(false);

        let blocker = FnPipe::new::<Trail, String, String>(|_trail, _next| {
            Box::pin(async { Ok("blocked".to_string()) })
        });
        let flagger = FnPipe::new::<Trail, String, String>(|trail, next| {
            Box::pin(async move {
                REACHED.store(true, Ordering::SeqCst);
                next.run(trail).await
            })
        });
        let pipeline = Pipeline::new().pipe(blocker).pipe(flagger);

        let mut trail = Trail::new();
        let out = pipeline.process(&mut trail, finish).await;

        assert_eq!(out, Ok("blocked".to_string()));
        assert!(!REACHED.load(Ordering::SeqCst));
        assert!(trail.is_empty());
    }

    #[tokio::test]
    async fn test_sink_contains_destination_error() {
        let pipeline = Pipeline::new()
            .through(vec![mark("a")])
            .when_exception(|trail: &Trail, err: String| format!("{err} after {}", trail.len()));

        let mut trail = Trail::new();
        let out = pipeline.process(&mut trail, fail).await;

        assert_eq!(out, Ok("boom after 1".to_string()));
        assert_eq!(trail, vec!["a:before", "a:after"]);
    }

    #[tokio::test]
    async fn test_error_without_sink_propagates() {
        let pipeline = Pipeline::new().through(vec![mark("a")]);
        let mut trail = Trail::new();
        assert_eq!(pipeline.process(&mut trail, fail).await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_layer_catches_its_own_error() {
        let pipeline = Pipeline::new()
            .through(vec![mark("outer"), reject("refused")])
            .when_exception(|_trail: &Trail, err: String| format!("sink:{err}"));

        let mut trail = Trail::new();
        let out = pipeline.process(&mut trail, finish).await;

        // outer sees the converted output, not the error
        assert_eq!(out, Ok("sink:refused".to_string()));
        assert_eq!(trail, vec!["outer:before", "outer:after"]);
    }

    #[tokio::test]
    async fn test_then_uses_sent_value() {
        let out = Pipeline::<Request, Response, TesseraError>::new()
            .send(Request::new("/index/hello"))
            .then(|request| {
                Box::pin(async move { Ok(Response::text(request.pathinfo().to_string())) })
            })
            .await
            .unwrap();
        assert_eq!(out.data(), &serde_json::json!("index/hello"));
    }

    #[tokio::test]
    async fn test_then_without_send() {
        let err = Pipeline::<Request, Response, TesseraError>::new()
            .then(|_request| Box::pin(async { Ok(Response::empty(http::StatusCode::OK)) }))
            .await
            .unwrap_err();
        assert_eq!(err.category(), tessera_core::ErrorCategory::Server);
    }
}
