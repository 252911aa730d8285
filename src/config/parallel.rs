//! Concurrency configuration for group stages.
//!
//! Both group flavors read their admission bound from [`GroupConfig`], but they
//! resolve an unset bound differently:
//!
//! - [`ThreadGroup`](crate::pipeline::ThreadGroup) sizes its worker pool to the
//!   platform default (available parallelism).
//! - [`AsyncGroup`](crate::pipeline::AsyncGroup) admits the whole batch at once.
//!
//! Callers that need identical behavior across flavors should set `limit` explicitly.

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted `limit`.
///
/// Rayon caps a pool at 65535 threads and starts every worker up front, so
/// anything larger is rejected for both flavors.
pub const MAX_LIMIT: usize = 65_535;

/// Configuration for a group stage.
///
/// # Example
///
/// ```rust
/// use chainable::config::GroupConfig;
///
/// let config: GroupConfig = GroupConfig::from_toml_str("limit = 4").unwrap();
/// assert_eq!(config.limit, Some(4));
/// assert_eq!(config.admission_bound(10), 4);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GroupConfig {
    /// Maximum number of items inside the internal pipeline at once.
    ///
    /// If None, the thread flavor uses all available CPU cores and the
    /// cooperative flavor uses the batch size.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Wrapper accepting a `[group]` table in addition to top-level keys.
#[derive(Deserialize)]
struct GroupConfigFile {
    #[serde(default)]
    group: Option<GroupConfig>,
    #[serde(default)]
    limit: Option<usize>,
}

impl GroupConfig {
    /// Create a config with no explicit bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with an explicit bound.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    /// Parse a config from TOML, either `limit = N` or a `[group]` table.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: GroupConfigFile = toml::from_str(source)?;
        let config = match file.group {
            Some(group) => group,
            None => Self { limit: file.limit },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject a zero bound or one above [`MAX_LIMIT`].
    pub fn validate(&self) -> Result<()> {
        match self.limit {
            Some(0) => Err(PipelineError::config(
                "group limit must be a positive integer",
            )),
            Some(limit) if limit > MAX_LIMIT => Err(PipelineError::config(format!(
                "group limit {limit} exceeds the maximum of {MAX_LIMIT}"
            ))),
            _ => Ok(()),
        }
    }

    /// Worker thread count for the thread-pool flavor.
    pub fn worker_threads(&self) -> usize {
        self.limit.unwrap_or_else(available_parallelism)
    }

    /// Admission bound for the cooperative flavor over a batch of `batch_len` items.
    ///
    /// Never larger than the batch; extra permits would go unused.
    pub fn admission_bound(&self, batch_len: usize) -> usize {
        self.limit
            .map_or(batch_len, |limit| limit.min(batch_len))
            .max(1)
    }
}

impl From<Option<usize>> for GroupConfig {
    fn from(limit: Option<usize>) -> Self {
        Self { limit }
    }
}

/// Returns the number of available CPU cores.
fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}
