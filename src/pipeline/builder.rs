//! Pipeline handle and the composition operator.
//!
//! A [`Pipeline`] wraps one stage (leaf or composite) and exposes composition.
//! Composition is expressed through the [`Compose`] trait and the free
//! [`compose`] function:
//!
//! | left        | right       | result                                          |
//! |-------------|-------------|-------------------------------------------------|
//! | `Pipeline`  | `Pipeline`  | new `Pipeline` over [`Then`]                    |
//! | `Pipeline`  | group       | the group, with the pipeline injected upstream  |
//! | group       | `Pipeline`  | the group, with the pipeline appended           |
//! | group       | group       | [`PipelineError::Composition`]                  |
//!
//! Groups take part through [`AcceptUpstream`], which only group variants implement.

use super::stage::{Stage, Then};
use crate::errors::{PipelineError, Result};

/// The composition operator.
///
/// `compose(l, r).process(x) == r.process(l.process(x))` for ordinary stages.
/// When the right operand is a group, the group absorbs the left operand and is
/// returned instead of a new composite.
pub trait Compose<Rhs> {
    type Output;

    /// Compose `self` followed by `rhs`.
    fn compose(self, rhs: Rhs) -> Result<Self::Output>;
}

/// Compose two operands; see [`Compose`].
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{compose, Pipeline, PureStage};
///
/// let square = || Pipeline::new(PureStage::new("Square", |v: Vec<i64>| vec![v[0] * v[0]]));
/// let chain = compose(square(), square()).unwrap();
/// assert_eq!(chain.process(vec![3]).unwrap(), vec![81]);
/// ```
pub fn compose<L, R>(lhs: L, rhs: R) -> Result<L::Output>
where
    L: Compose<R>,
{
    lhs.compose(rhs)
}

/// Capability hook for operands that absorb the left side of a composition.
///
/// Implemented by group stages only. Accepting an upstream stage installs it as
/// the group's internal pipeline, or prepends it to the existing one.
pub trait AcceptUpstream<L> {
    type Output;

    /// Absorb `upstream` into this operand.
    fn accept_upstream(self, upstream: L) -> Result<Self::Output>;
}

/// Handle wrapping a single stage.
///
/// Composition produces a new handle rather than mutating this one.
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{Pipeline, PureStage};
///
/// let pipeline = Pipeline::new(PureStage::new("Add 1", |x: i32| x + 1))
///     .then(PureStage::new("Double", |x: i32| x * 2))
///     .then(PureStage::new("To String", |x: i32| x.to_string()));
///
/// assert_eq!(pipeline.process(1).unwrap(), "4");
/// ```
pub struct Pipeline<S> {
    stage: S,
}

impl<S: Stage> Pipeline<S> {
    /// Wrap a stage in a handle.
    pub fn new(stage: S) -> Self {
        Self { stage }
    }

    /// Run the held stage on one input.
    pub fn process(&self, input: S::Input) -> std::result::Result<S::Output, S::Error> {
        self.stage.process(input)
    }

    /// Append a stage, producing a new handle.
    ///
    /// The next stage's input type must match this pipeline's output type.
    ///
    /// A group passed here is treated as an ordinary stage: it runs after this
    /// pipeline on the whole output and does not absorb it. Use [`compose`] to
    /// install this pipeline upstream inside the group instead.
    pub fn then<N>(self, next: N) -> Pipeline<Then<S, N>>
    where
        N: Stage<Input = S::Output>,
        S::Error: Into<PipelineError>,
        N::Error: Into<PipelineError>,
    {
        Pipeline::new(Then::new(self.stage, next))
    }

    /// Apply `f` only if the condition holds.
    ///
    /// Both branches must produce the same pipeline type, so this is used with
    /// type-preserving stages or with boxed stages.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chainable::pipeline::{Pipeline, PureStage, Stage};
    ///
    /// fn build(normalize: bool) -> Pipeline<Box<dyn Stage<Input = i32, Output = i32, Error = chainable::PipelineError>>> {
    ///     Pipeline::new(PureStage::new("Start", |x: i32| x + 1))
    ///         .boxed()
    ///         .when(normalize, |p| p.then(PureStage::new("Abs", |x: i32| x.abs())).boxed())
    /// }
    ///
    /// assert_eq!(build(true).process(-5).unwrap(), 4);
    /// assert_eq!(build(false).process(-5).unwrap(), -4);
    /// ```
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
    ) -> Pipeline<Box<dyn Stage<Input = S::Input, Output = S::Output, Error = PipelineError>>>
    where
        S: 'static,
        S::Error: Into<PipelineError>,
    {
        Pipeline::new(Box::new(super::stage::ErrInto(self.stage)))
    }

    /// Name of the held stage.
    pub fn name(&self) -> &str {
        self.stage.name()
    }

    /// Borrow the held stage.
    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Unwrap the held stage.
    pub fn into_stage(self) -> S {
        self.stage
    }
}

impl<S: Stage> Stage for Pipeline<S> {
    type Input = S::Input;
    type Output = S::Output;
    type Error = S::Error;

    fn process(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.stage.process(input)
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

impl<S, N> Compose<Pipeline<N>> for Pipeline<S>
where
    S: Stage,
    N: Stage<Input = S::Output>,
    S::Error: Into<PipelineError>,
    N::Error: Into<PipelineError>,
{
    type Output = Pipeline<Then<S, N>>;

    fn compose(self, rhs: Pipeline<N>) -> Result<Self::Output> {
        Ok(self.then(rhs.into_stage()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::{FallibleStage, PureStage};

    fn square() -> Pipeline<impl Stage<Input = Vec<i64>, Output = Vec<i64>, Error = std::convert::Infallible>> {
        Pipeline::new(PureStage::new("Square", |v: Vec<i64>| vec![v[0] * v[0]]))
    }

    #[test]
    fn test_pipeline_then() {
        let pipeline = Pipeline::new(PureStage::new("Add 1", |x: i32| x + 1))
            .then(PureStage::new("Double", |x: i32| x * 2))
            .then(PureStage::new("To String", |x: i32| x.to_string()));

        assert_eq!(pipeline.process(0).unwrap(), "2");
        assert_eq!(pipeline.name(), "Add 1 | Double | To String");
    }

    #[test]
    fn test_compose_square_square() {
        let chain = compose(square(), square()).unwrap();
        assert_eq!(chain.process(vec![3]).unwrap(), vec![81]);
    }

    #[test]
    fn test_compose_matches_manual_chaining() {
        let a = PureStage::new("Inc", |x: i64| x + 7);
        let b = PureStage::new("Triple", |x: i64| x * 3);
        let manual = b.process(a.process(5).unwrap()).unwrap();

        let composed = compose(Pipeline::new(a), Pipeline::new(b)).unwrap();
        assert_eq!(composed.process(5).unwrap(), manual);
    }

    #[test]
    fn test_nested_pipeline_is_a_stage() {
        let inner = Pipeline::new(PureStage::new("B", |x: i32| x * 10))
            .then(PureStage::new("C", |x: i32| x - 1));
        let right_nested = Pipeline::new(PureStage::new("A", |x: i32| x + 2)).then(inner);

        let left_nested = Pipeline::new(PureStage::new("A", |x: i32| x + 2))
            .then(PureStage::new("B", |x: i32| x * 10))
            .then(PureStage::new("C", |x: i32| x - 1));

        assert_eq!(right_nested.process(4).unwrap(), left_nested.process(4).unwrap());
    }

    #[test]
    fn test_pipeline_conditional() {
        let build = |extra: bool| {
            Pipeline::new(PureStage::new("Start", |x: i32| x))
                .boxed()
                .when(extra, |p| p.then(PureStage::new("Add 10", |x: i32| x + 10)).boxed())
                .then(PureStage::new("Double", |x: i32| x * 2))
        };

        assert_eq!(build(true).process(1).unwrap(), 22); // (1 + 10) * 2
        assert_eq!(build(false).process(1).unwrap(), 2); // 1 * 2
    }

    #[test]
    fn test_pipeline_error_names_failing_stage() {
        let pipeline = Pipeline::new(PureStage::new("Start", |x: i32| x)).then(FallibleStage::new(
            "Positive",
            |x: i32| {
                if x > 0 {
                    Ok(x)
                } else {
                    Err(anyhow::anyhow!("{x} is not positive"))
                }
            },
        ));

        assert_eq!(pipeline.process(3).unwrap(), 3);
        assert_eq!(
            pipeline.process(-2).unwrap_err(),
            PipelineError::stage("Positive", "-2 is not positive")
        );
    }
}
