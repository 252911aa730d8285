//! Thread-pool group stage.
//!
//! A [`ThreadGroup`] fans a batch out over a dedicated rayon pool, running its
//! internal pipeline once per item, and returns the outputs in input order.
//!
//! # Example
//!
//! ```rust
//! use chainable::pipeline::{compose, BatchItem, Pipeline, PureStage, ThreadGroup};
//!
//! let square = || Pipeline::new(PureStage::new("Square", |v: Vec<i64>| vec![v[0] * v[0]]));
//!
//! let group = ThreadGroup::new(Some(2)).unwrap();
//! let group = compose(group, square()).unwrap();
//! let group = compose(group, square()).unwrap();
//!
//! let batch = BatchItem::lists([vec![1], vec![2], vec![3], vec![4]]);
//! assert_eq!(
//!     group.process(batch).unwrap(),
//!     vec![vec![1], vec![16], vec![81], vec![256]]
//! );
//! ```

use super::builder::{AcceptUpstream, Compose, Pipeline};
use super::data::{BatchItem, Internal, SealState};
use super::stage::{FallibleStage, SharedStage, Stage, Then};
use crate::config::GroupConfig;
use crate::errors::{PipelineError, Result};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, debug_span, warn};

const DEFAULT_NAME: &str = "ThreadGroup";

/// Group stage backed by a fixed-size worker pool.
///
/// The group owns its pool; at most `limit` items are inside the internal
/// pipeline at once. With no limit, the pool uses the platform default worker
/// count (not the batch size).
///
/// Stages composed into the group run on several threads at once and must be
/// `Send + Sync`. The group is reusable across batches once sealed.
pub struct ThreadGroup<I, O> {
    name: String,
    config: GroupConfig,
    pool: rayon::ThreadPool,
    internal: Internal<I, O, SharedStage<Vec<I>, O>>,
    seal: SealState,
}

impl<I> ThreadGroup<I, Vec<I>> {
    /// Create an empty group with an optional worker limit.
    pub fn new(limit: Option<usize>) -> Result<Self> {
        Self::with_config(GroupConfig::from(limit))
    }

    /// Create an empty group from a config.
    pub fn with_config(config: GroupConfig) -> Result<Self> {
        config.validate()?;
        let workers = config.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("chainable-group-{i}"))
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build worker pool: {e}")))?;

        debug!(workers, "Created thread group");

        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            config,
            pool,
            internal: Internal::empty(),
            seal: SealState::default(),
        })
    }
}

impl<I, O> ThreadGroup<I, O>
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
    pub fn then<N>(self, next: N) -> Result<ThreadGroup<I, N::Output>>
    where
        N: Stage<Input = O> + Send + Sync + 'static,
        N::Output: Send + 'static,
        N::Error: Into<PipelineError>,
    {
        self.ensure_open()?;
        let (group, internal) = self.into_parts();
        let pipeline: SharedStage<Vec<I>, N::Output> = match internal {
            Internal::Ready(existing) => Arc::new(Then::new(existing, next)),
            Internal::Empty { identity } => {
                let stage_name = next.name().to_string();
                Arc::new(FallibleStage::new(stage_name.clone(), move |items: Vec<I>| {
                    next.process(identity(items))
                        .map_err(|e| PipelineError::tagged(e, &stage_name))
                }))
            }
        };
        Ok(group.assemble(pipeline))
    }

    /// Run the internal pipeline over every item of the batch.
    ///
    /// Output position `i` corresponds to input position `i`. If any item fails
    /// the whole call fails with [`PipelineError::Item`]; all in-flight items
    /// settle before the error is returned.
    pub fn process(&self, batch: Vec<BatchItem<I>>) -> Result<Vec<O>> {
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

        let span = debug_span!(
            "thread_group",
            group = %self.name,
            limit = self.worker_count(),
            items = batch.len()
        );
        let _guard = span.enter();

        // Collect every result first so the reported failure is the lowest index.
        // Workers re-enter the span so per-item events carry the group fields.
        let settled: Vec<Result<O>> = self.pool.install(|| {
            batch
                .into_par_iter()
                .enumerate()
                .map(|(index, item)| span.in_scope(|| run_item(pipeline, index, item)))
                .collect()
        });
        let outputs = settled.into_iter().collect::<Result<Vec<O>>>()?;

        debug!(outputs = outputs.len(), "Batch complete");
        Ok(outputs)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.seal.is_sealed() {
            return Err(PipelineError::sealed(&self.name));
        }
        Ok(())
    }

    fn into_parts(self) -> (GroupParts, Internal<I, O, SharedStage<Vec<I>, O>>) {
        let parts = GroupParts {
            name: self.name,
            config: self.config,
            pool: self.pool,
        };
        (parts, self.internal)
    }
}

/// Everything a group carries across composition except its pipeline.
struct GroupParts {
    name: String,
    config: GroupConfig,
    pool: rayon::ThreadPool,
}

impl GroupParts {
    fn assemble<I, O>(self, pipeline: SharedStage<Vec<I>, O>) -> ThreadGroup<I, O> {
        ThreadGroup {
            name: self.name,
            config: self.config,
            pool: self.pool,
            internal: Internal::Ready(pipeline),
            seal: SealState::default(),
        }
    }
}

impl<I, O> ThreadGroup<I, O> {
    /// Configured limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.config.limit
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
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

fn run_item<I, O>(pipeline: &SharedStage<Vec<I>, O>, index: usize, item: BatchItem<I>) -> Result<O> {
    panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(item.into_list())))
        .unwrap_or_else(|payload| Err(PipelineError::from_panic(payload)))
        .map_err(|e| {
            warn!(index, error = %e, "Batch item failed");
            PipelineError::item(index, e)
        })
}

impl<I, O> Stage for ThreadGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = Vec<BatchItem<I>>;
    type Output = Vec<O>;
    type Error = PipelineError;

    fn process(&self, batch: Self::Input) -> Result<Self::Output> {
        ThreadGroup::process(self, batch)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O, S, J> AcceptUpstream<S> for ThreadGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    J: Send + 'static,
    S: Stage<Input = Vec<J>, Output = Vec<I>> + Send + Sync + 'static,
    S::Error: Into<PipelineError>,
{
    type Output = ThreadGroup<J, O>;

    fn accept_upstream(self, upstream: S) -> Result<Self::Output> {
        self.ensure_open()?;
        let (group, internal) = self.into_parts();
        let pipeline: SharedStage<Vec<J>, O> = match internal {
            Internal::Ready(existing) => Arc::new(Then::new(upstream, existing)),
            Internal::Empty { identity } => {
                let stage_name = upstream.name().to_string();
                Arc::new(FallibleStage::new(stage_name.clone(), move |items: Vec<J>| {
                    upstream
                        .process(items)
                        .map(identity)
                        .map_err(|e| PipelineError::tagged(e, &stage_name))
                }))
            }
        };
        Ok(group.assemble(pipeline))
    }
}

impl<I, O, N> Compose<Pipeline<N>> for ThreadGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    N: Stage<Input = O> + Send + Sync + 'static,
    N::Output: Send + 'static,
    N::Error: Into<PipelineError>,
{
    type Output = ThreadGroup<I, N::Output>;

    fn compose(self, rhs: Pipeline<N>) -> Result<Self::Output> {
        self.then(rhs.into_stage())
    }
}

impl<S, J, I, O> Compose<ThreadGroup<I, O>> for Pipeline<S>
where
    I: Send + 'static,
    O: Send + 'static,
    J: Send + 'static,
    S: Stage<Input = Vec<J>, Output = Vec<I>> + Send + Sync + 'static,
    S::Error: Into<PipelineError>,
{
    type Output = ThreadGroup<J, O>;

    fn compose(self, rhs: ThreadGroup<I, O>) -> Result<Self::Output> {
        rhs.accept_upstream(self.into_stage())
    }
}

impl<I, O, I2, O2> Compose<ThreadGroup<I2, O2>> for ThreadGroup<I, O> {
    type Output = ThreadGroup<I2, O2>;

    fn compose(self, rhs: ThreadGroup<I2, O2>) -> Result<Self::Output> {
        Err(PipelineError::composition(format!(
            "cannot compose group '{}' with group '{}'",
            self.name, rhs.name
        )))
    }
}
