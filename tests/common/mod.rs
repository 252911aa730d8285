// Test utility module for chainable integration tests
#![allow(dead_code)]

use chainable::pipeline::{AsyncFnStage, AsyncStage, PureStage, Stage};
use chainable::PipelineError;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `f(n) -> [n * n]` over the first element of a list.
pub fn square(
) -> impl Stage<Input = Vec<i64>, Output = Vec<i64>, Error = Infallible> + Send + Sync + 'static {
    PureStage::new("Square", |v: Vec<i64>| vec![v[0] * v[0]])
}

/// Async counterpart of [`square`].
pub fn async_square(
) -> impl AsyncStage<Input = Vec<i64>, Output = Vec<i64>, Error = PipelineError> + 'static {
    AsyncFnStage::new("Square", |v: Vec<i64>| async move {
        tokio::task::yield_now().await;
        Ok::<_, PipelineError>(vec![v[0] * v[0]])
    })
}

/// Delay used to shuffle completion order: later items finish first.
pub fn skewed_delay(value: i64) -> Duration {
    Duration::from_millis((20 - value.rem_euclid(20)) as u64)
}

/// Counters recording how many invocations run at once.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}
