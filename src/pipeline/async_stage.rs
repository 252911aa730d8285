//! Suspendable stages, their composite, and the async pipeline handle.
//!
//! These mirror [`Stage`](super::Stage), [`Then`](super::Then) and
//! [`Pipeline`](super::Pipeline) with an async `process`. The two flavors do not
//! compose with each other.

use super::builder::Compose;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A suspend-capable stage transforming one input into one output.
///
/// Several invocations may be in flight at once on the same task; implementors
/// must tolerate interleaving at their own suspension points.
#[async_trait]
pub trait AsyncStage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Error: Send + 'static;

    /// Transform a single input.
    async fn process(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error>;

    /// Get the stage name for logging and error context.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<S: AsyncStage + ?Sized> AsyncStage for Box<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    async fn process(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        (**self).process(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<S: AsyncStage + ?Sized> AsyncStage for Arc<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    async fn process(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        (**self).process(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub(crate) type SharedAsyncStage<I, O> =
    Arc<dyn AsyncStage<Input = I, Output = O, Error = PipelineError>>;

/// Leaf stage built from an async closure.
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{AsyncFnStage, AsyncStage};
///
/// let square = AsyncFnStage::new("Square", |n: i64| async move {
///     Ok::<_, chainable::PipelineError>(n * n)
/// });
/// let squared = futures::executor::block_on(square.process(9)).unwrap();
/// assert_eq!(squared, 81);
/// ```
pub struct AsyncFnStage<F, I, O, E> {
    name: String,
    func: F,
    _phantom: PhantomData<fn(I) -> std::result::Result<O, E>>,
}

impl<F, Fut, I, O, E> AsyncFnStage<F, I, O, E>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = std::result::Result<O, E>>,
{
    /// Create a new async stage with a name and function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, I, O, E> AsyncStage for AsyncFnStage<F, I, O, E>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    type Input = I;
    type Output = O;
    type Error = E;

    async fn process(&self, input: I) -> std::result::Result<O, E> {
        (self.func)(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Composite async stage awaiting `first` and then `second`.
pub struct AsyncThen<A, B> {
    first: A,
    second: B,
    name: String,
}

impl<A, B> AsyncThen<A, B>
where
    A: AsyncStage,
    B: AsyncStage<Input = A::Output>,
    A::Error: Into<PipelineError>,
    B::Error: Into<PipelineError>,
{
    /// Compose two async stages.
    pub fn new(first: A, second: B) -> Self {
        let name = format!("{} | {}", first.name(), second.name());
        Self {
            first,
            second,
            name,
        }
    }
}

#[async_trait]
impl<A, B> AsyncStage for AsyncThen<A, B>
where
    A: AsyncStage,
    B: AsyncStage<Input = A::Output>,
    A::Error: Into<PipelineError>,
    B::Error: Into<PipelineError>,
{
    type Input = A::Input;
    type Output = B::Output;
    type Error = PipelineError;

    async fn process(&self, input: Self::Input) -> Result<Self::Output> {
        let intermediate = self
            .first
            .process(input)
            .await
            .map_err(|e| PipelineError::tagged(e, self.first.name()))?;
        self.second
            .process(intermediate)
            .await
            .map_err(|e| PipelineError::tagged(e, self.second.name()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle wrapping a single async stage.
pub struct AsyncPipeline<S> {
    stage: S,
}

impl<S: AsyncStage> AsyncPipeline<S> {
    /// Wrap a stage in a handle.
    pub fn new(stage: S) -> Self {
        Self { stage }
    }

    /// Run the held stage on one input.
    pub async fn process(&self, input: S::Input) -> std::result::Result<S::Output, S::Error> {
        self.stage.process(input).await
    }

    /// Append a stage, producing a new handle.
    pub fn then<N>(self, next: N) -> AsyncPipeline<AsyncThen<S, N>>
    where
        N: AsyncStage<Input = S::Output>,
        S::Error: Into<PipelineError>,
        N::Error: Into<PipelineError>,
    {
        AsyncPipeline::new(AsyncThen::new(self.stage, next))
    }

    /// Apply `f` only if the condition holds.
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Erase the held stage type.
    pub fn boxed(
        self,
    ) -> AsyncPipeline<
        Box<dyn AsyncStage<Input = S::Input, Output = S::Output, Error = PipelineError>>,
    >
    where
        S: 'static,
        S::Error: Into<PipelineError>,
    {
        AsyncPipeline::new(Box::new(ErrIntoAsync(self.stage)))
    }

    /// Name of the held stage.
    pub fn name(&self) -> &str {
        self.stage.name()
    }

    /// Unwrap the held stage.
    pub fn into_stage(self) -> S {
        self.stage
    }
}

#[async_trait]
impl<S: AsyncStage> AsyncStage for AsyncPipeline<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    async fn process(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.stage.process(input).await
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

impl<S, N> Compose<AsyncPipeline<N>> for AsyncPipeline<S>
where
    S: AsyncStage,
    N: AsyncStage<Input = S::Output>,
    S::Error: Into<PipelineError>,
    N::Error: Into<PipelineError>,
{
    type Output = AsyncPipeline<AsyncThen<S, N>>;

    fn compose(self, rhs: AsyncPipeline<N>) -> Result<Self::Output> {
        Ok(self.then(rhs.into_stage()))
    }
}

/// Adapter converting an async stage's error into [`PipelineError`].
struct ErrIntoAsync<S>(S);

#[async_trait]
impl<S> AsyncStage for ErrIntoAsync<S>
where
    S: AsyncStage,
    S::Error: Into<PipelineError>,
{
    type Input = S::Input;
    type Output = S::Output;
    type Error = PipelineError;

    async fn process(&self, input: Self::Input) -> Result<Self::Output> {
        self.0
            .process(input)
            .await
            .map_err(|e| PipelineError::tagged(e, self.0.name()))
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}
