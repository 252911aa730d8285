//! Composable processing pipelines with bounded-concurrency fan-out.
//!
//! Stages are combined into linear chains with [`compose`](pipeline::compose).
//! A group stage ([`ThreadGroup`] or [`AsyncGroup`]) absorbs the chain composed
//! into it and runs that chain once per item of a batch, at most `limit` items at
//! a time, returning results in input order.
//!
//! ```rust
//! use chainable::pipeline::{compose, BatchItem, Pipeline, PureStage, ThreadGroup};
//!
//! let square = || Pipeline::new(PureStage::new("Square", |v: Vec<i64>| vec![v[0] * v[0]]));
//!
//! // A plain chain
//! let chain = compose(square(), square())?;
//! assert_eq!(chain.process(vec![3])?, vec![81]);
//!
//! // The same chain fanned out over two workers
//! let group = compose(compose(ThreadGroup::new(Some(2))?, square())?, square())?;
//! let output = group.process(BatchItem::lists([vec![1], vec![2], vec![3], vec![4]]))?;
//! assert_eq!(output, vec![vec![1], vec![16], vec![81], vec![256]]);
//! # Ok::<(), chainable::PipelineError>(())
//! ```

pub mod config;
pub mod errors;
pub mod pipeline;

// Re-export commonly used types
pub use crate::config::GroupConfig;
pub use crate::errors::{PipelineError, Result};
pub use crate::pipeline::{
    compose, AsyncGroup, AsyncPipeline, AsyncStage, BatchItem, Compose, Pipeline, Stage,
    ThreadGroup,
};
