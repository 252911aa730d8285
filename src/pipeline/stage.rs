//! Stage abstractions for composable processing pipelines.
//!
//! This module defines the core `Stage` trait, leaf adapters for caller-supplied
//! closures, and the `Then` composite that applies two stages in sequence.

use crate::errors::PipelineError;
use std::marker::PhantomData;
use std::sync::Arc;

/// A pipeline stage that transforms one input value into one output value.
///
/// Stages are the building blocks of pipelines. Each stage has:
/// - An input type (what data it expects)
/// - An output type (what data it produces)
/// - An error type (how it can fail)
///
/// # Type Safety
///
/// The type system ensures stages can only be composed when their types align:
/// ```rust,ignore
/// Pipeline::new(stage1)  // Input: A, Output: B
///   .then(stage2)        // Input: B, Output: C - OK!
///   .then(stage3)        // Input: D, Output: E - Compile error!
/// ```
///
/// Stages used inside a [`ThreadGroup`](super::ThreadGroup) are invoked from several
/// worker threads at once with disjoint inputs; they must be `Send + Sync`.
pub trait Stage {
    type Input;
    type Output;
    type Error;

    /// Transform a single input.
    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Get the stage name for logging and error context.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        (**self).process(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: Stage + ?Sized> Stage for Arc<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        (**self).process(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A shareable, type-erased stage with the crate error type.
pub(crate) type SharedStage<I, O> =
    Arc<dyn Stage<Input = I, Output = O, Error = PipelineError> + Send + Sync>;

/// A pure stage that cannot fail.
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{PureStage, Stage};
///
/// let square = PureStage::new("Square", |n: i64| n * n);
/// assert_eq!(square.process(9).unwrap(), 81);
/// ```
pub struct PureStage<F, I, O> {
    name: String,
    func: F,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<F, I, O> PureStage<F, I, O>
where
    F: Fn(I) -> O,
{
    /// Create a new pure stage with a name and transformation function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, I, O> Stage for PureStage<F, I, O>
where
    F: Fn(I) -> O,
{
    type Input = I;
    type Output = O;
    type Error = std::convert::Infallible;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok((self.func)(input))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A stage whose function can fail.
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{FallibleStage, Stage};
///
/// let parse = FallibleStage::new("Parse", |s: String| s.parse::<i64>());
/// assert_eq!(parse.process("42".to_string()).unwrap(), 42);
/// ```
pub struct FallibleStage<F, I, O, E> {
    name: String,
    func: F,
    _phantom: PhantomData<fn(I) -> Result<O, E>>,
}

impl<F, I, O, E> FallibleStage<F, I, O, E>
where
    F: Fn(I) -> Result<O, E>,
{
    /// Create a new fallible stage with a name and function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, I, O, E> Stage for FallibleStage<F, I, O, E>
where
    F: Fn(I) -> Result<O, E>,
{
    type Input = I;
    type Output = O;
    type Error = E;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        (self.func)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Composite stage applying `first` and then `second`.
///
/// `Then` is what the composition operator builds for two ordinary stages.
/// Errors from either child are converted into [`PipelineError`] and tagged with
/// the failing child's name.
pub struct Then<A, B> {
    first: A,
    second: B,
    name: String,
}

impl<A, B> Then<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
    A::Error: Into<PipelineError>,
    B::Error: Into<PipelineError>,
{
    /// Compose two stages.
    pub fn new(first: A, second: B) -> Self {
        let name = format!("{} | {}", first.name(), second.name());
        Self {
            first,
            second,
            name,
        }
    }
}

impl<A, B> Then<A, B> {
    /// The stage applied first.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// The stage applied second.
    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A, B> Stage for Then<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
    A::Error: Into<PipelineError>,
    B::Error: Into<PipelineError>,
{
    type Input = A::Input;
    type Output = B::Output;
    type Error = PipelineError;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        let intermediate = self
            .first
            .process(input)
            .map_err(|e| PipelineError::tagged(e, self.first.name()))?;
        self.second
            .process(intermediate)
            .map_err(|e| PipelineError::tagged(e, self.second.name()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapter converting a stage's error into [`PipelineError`].
pub(crate) struct ErrInto<S>(pub(crate) S);

impl<S> Stage for ErrInto<S>
where
    S: Stage,
    S::Error: Into<PipelineError>,
{
    type Input = S::Input;
    type Output = S::Output;
    type Error = PipelineError;

    fn process(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.0
            .process(input)
            .map_err(|e| PipelineError::tagged(e, self.0.name()))
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}
