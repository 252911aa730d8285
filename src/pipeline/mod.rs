//! Composable pipelines and bounded-concurrency group stages.
//!
//! Two flavors share one composition algebra:
//!
//! - **Synchronous**: [`Stage`], [`Then`], [`Pipeline`], and the thread-pool
//!   [`ThreadGroup`].
//! - **Suspendable**: [`AsyncStage`], [`AsyncThen`], [`AsyncPipeline`], and the
//!   cooperative [`AsyncGroup`].
//!
//! Stages are composed left to right with [`compose`] (or `then`). A group on
//! either side of a composition absorbs the other operand into its internal
//! pipeline, so it becomes the handle for the whole chain built so far.

pub mod async_group;
pub mod async_stage;
pub mod builder;
pub mod data;
pub mod group;
pub mod stage;

pub use async_group::AsyncGroup;
pub use async_stage::{AsyncFnStage, AsyncPipeline, AsyncStage, AsyncThen};
pub use builder::{compose, AcceptUpstream, Compose, Pipeline};
pub use data::BatchItem;
pub use group::ThreadGroup;
pub use stage::{FallibleStage, PureStage, Stage, Then};
