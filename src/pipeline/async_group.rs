//! Cooperative group stage.
//!
//! An [`AsyncGroup`] drives every item of a batch through its internal pipeline on
//! the caller's task. A counting gate (`tokio::sync::Semaphore`) bounds how many
//! items are inside the pipeline at once; suspension only happens where the
//! pipeline's stages suspend.

use super::async_stage::{AsyncFnStage, AsyncPipeline, AsyncStage, AsyncThen, SharedAsyncStage};
use super::builder::{AcceptUpstream, Compose};
use super::data::{BatchItem, Internal, SealState};
use crate::config::GroupConfig;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, debug_span, warn, Instrument};

const DEFAULT_NAME: &str = "AsyncGroup";

/// Group stage bounded by a counting admission gate.
///
/// With no concurrency limit, the bound is the batch size: every item is
/// admitted at once. This differs from [`ThreadGroup`](super::ThreadGroup),
/// whose unset bound is the platform default.
///
/// # Example
///
/// ```rust
/// use chainable::pipeline::{compose, AsyncFnStage, AsyncGroup, AsyncPipeline, BatchItem};
/// use chainable::PipelineError;
///
/// let square = || {
///     AsyncPipeline::new(AsyncFnStage::new("Square", |v: Vec<i64>| async move {
///         Ok::<_, PipelineError>(vec![v[0] * v[0]])
///     }))
/// };
///
/// let group = AsyncGroup::new(Some(2)).unwrap();
/// let group = compose(compose(group, square()).unwrap(), square()).unwrap();
///
/// let batch = BatchItem::lists([vec![1], vec![2], vec![3], vec![4]]);
/// let output = futures::executor::block_on(group.process(batch)).unwrap();
/// assert_eq!(output, vec![vec![1], vec![16], vec![81], vec![256]]);
/// ```
pub struct AsyncGroup<I, O> {
    name: String,
    config: GroupConfig,
    internal: Internal<I, O, SharedAsyncStage<Vec<I>, O>>,
    seal: SealState,
}

impl<I> AsyncGroup<I, Vec<I>> {
    /// Create an empty group with an optional concurrency limit.
    pub fn new(concurrency: Option<usize>) -> Result<Self> {
        Self::with_config(GroupConfig::from(concurrency))
    }

    /// Create an empty group from a config.
    pub fn with_config(config: GroupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            config,
            internal: Internal::empty(),
            seal: SealState::default(),
        })
    }
}

impl<I, O> AsyncGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Set the name used in logs and errors.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a stage to the internal pipeline.
    ///
    /// Fails with [`PipelineError::Sealed`] once the group has processed a batch.
    pub fn then<N>(self, next: N) -> Result<AsyncGroup<I, N::Output>>
    where
        N: AsyncStage<Input = O> + 'static,
        N::Error: Into<PipelineError>,
    {
        self.ensure_open()?;
        let (name, config, internal) = self.into_parts();
        let pipeline: SharedAsyncStage<Vec<I>, N::Output> = match internal {
            Internal::Ready(existing) => Arc::new(AsyncThen::new(existing, next)),
            Internal::Empty { identity } => {
                let next = Arc::new(next);
                let stage_name = next.name().to_string();
                Arc::new(AsyncFnStage::new(stage_name, move |items: Vec<I>| {
                    let next = Arc::clone(&next);
                    async move {
                        next.process(identity(items))
                            .await
                            .map_err(|e| PipelineError::tagged(e, next.name()))
                    }
                }))
            }
        };
        Ok(assemble(name, config, pipeline))
    }

    /// Run the internal pipeline over every item of the batch.
    ///
    /// All item futures are created up front and driven together; each holds an
    /// admission permit while inside the pipeline. Every item settles before the
    /// first failure (lowest index) is returned as [`PipelineError::Item`].
    pub async fn process(&self, batch: Vec<BatchItem<I>>) -> Result<Vec<O>> {
        let pipeline = self
            .internal
            .ready()
            .ok_or_else(|| PipelineError::unconfigured(&self.name))?;

        if self.seal.seal() {
            debug!(group = %self.name, "Group sealed");
        }

        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let bound = self.config.admission_bound(batch.len());
        let gate = Semaphore::new(bound);
        let span = debug_span!(
            "async_group",
            group = %self.name,
            limit = bound,
            items = batch.len()
        );

        let items = batch
            .into_iter()
            .enumerate()
            .map(|(index, item)| run_item(pipeline, &gate, index, item));
        let settled = join_all(items).instrument(span).await;

        let outputs = settled.into_iter().collect::<Result<Vec<O>>>()?;
        debug!(group = %self.name, outputs = outputs.len(), "Batch complete");
        Ok(outputs)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.seal.is_sealed() {
            return Err(PipelineError::sealed(&self.name));
        }
        Ok(())
    }

    fn into_parts(self) -> (String, GroupConfig, Internal<I, O, SharedAsyncStage<Vec<I>, O>>) {
        (self.name, self.config, self.internal)
    }
}

fn assemble<I, O>(
    name: String,
    config: GroupConfig,
    pipeline: SharedAsyncStage<Vec<I>, O>,
) -> AsyncGroup<I, O> {
    AsyncGroup {
        name,
        config,
        internal: Internal::Ready(pipeline),
        seal: SealState::default(),
    }
}

impl<I, O> AsyncGroup<I, O> {
    /// Configured concurrency limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.config.limit
    }

    /// Whether a pipeline has been composed into the group.
    pub fn is_configured(&self) -> bool {
        self.internal.ready().is_some()
    }

    /// Whether the group has processed a batch and stopped accepting composition.
    pub fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }
}

async fn run_item<I, O>(
    pipeline: &SharedAsyncStage<Vec<I>, O>,
    gate: &Semaphore,
    index: usize,
    item: BatchItem<I>,
) -> Result<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    // Held until this function returns, on success, error and panic alike.
    let _permit = gate
        .acquire()
        .await
        .map_err(|e| PipelineError::item(index, PipelineError::other(e.to_string())))?;

    AssertUnwindSafe(pipeline.process(item.into_list()))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(PipelineError::from_panic(payload)))
        .map_err(|e| {
            warn!(index, error = %e, "Batch item failed");
            PipelineError::item(index, e)
        })
}

#[async_trait]
impl<I, O> AsyncStage for AsyncGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = Vec<BatchItem<I>>;
    type Output = Vec<O>;
    type Error = PipelineError;

    async fn process(&self, batch: Self::Input) -> Result<Self::Output> {
        AsyncGroup::process(self, batch).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O, S, J> AcceptUpstream<S> for AsyncGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    J: Send + 'static,
    S: AsyncStage<Input = Vec<J>, Output = Vec<I>> + 'static,
    S::Error: Into<PipelineError>,
{
    type Output = AsyncGroup<J, O>;

    fn accept_upstream(self, upstream: S) -> Result<Self::Output> {
        self.ensure_open()?;
        let (name, config, internal) = self.into_parts();
        let pipeline: SharedAsyncStage<Vec<J>, O> = match internal {
            Internal::Ready(existing) => Arc::new(AsyncThen::new(upstream, existing)),
            Internal::Empty { identity } => {
                let upstream = Arc::new(upstream);
                let stage_name = upstream.name().to_string();
                Arc::new(AsyncFnStage::new(stage_name, move |items: Vec<J>| {
                    let upstream = Arc::clone(&upstream);
                    async move {
                        upstream
                            .process(items)
                            .await
                            .map(identity)
                            .map_err(|e| PipelineError::tagged(e, upstream.name()))
                    }
                }))
            }
        };
        Ok(assemble(name, config, pipeline))
    }
}

impl<I, O, N> Compose<AsyncPipeline<N>> for AsyncGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    N: AsyncStage<Input = O> + 'static,
    N::Error: Into<PipelineError>,
{
    type Output = AsyncGroup<I, N::Output>;

    fn compose(self, rhs: AsyncPipeline<N>) -> Result<Self::Output> {
        self.then(rhs.into_stage())
    }
}

impl<S, J, I, O> Compose<AsyncGroup<I, O>> for AsyncPipeline<S>
where
    I: Send + 'static,
    O: Send + 'static,
    J: Send + 'static,
    S: AsyncStage<Input = Vec<J>, Output = Vec<I>> + 'static,
    S::Error: Into<PipelineError>,
{
    type Output = AsyncGroup<J, O>;

    fn compose(self, rhs: AsyncGroup<I, O>) -> Result<Self::Output> {
        rhs.accept_upstream(self.into_stage())
    }
}

impl<I, O, I2, O2> Compose<AsyncGroup<I2, O2>> for AsyncGroup<I, O> {
    type Output = AsyncGroup<I2, O2>;

    fn compose(self, rhs: AsyncGroup<I2, O2>) -> Result<Self::Output> {
        Err(PipelineError::composition(format!(
            "cannot compose group '{}' with group '{}'",
            self.name, rhs.name
        )))
    }
}
