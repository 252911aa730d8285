//! Error types for pipeline composition and execution.
//!
//! Errors fall into three groups:
//!
//! - **Composition**: rejected while the pipeline is being built
//!   (`Composition`, `Sealed`, `Config`).
//! - **Unconfigured group**: a group was invoked before anything was composed into it.
//! - **Item processing**: a stage failed (or panicked) while handling one batch item.
//!   These are never retried or swallowed; a batch is all-or-nothing.
//!
//! # Example
//!
//! ```rust
//! use chainable::errors::PipelineError;
//!
//! let err = PipelineError::item(2, PipelineError::stage("Square", "overflow"));
//! assert_eq!(err.index(), Some(2));
//! assert_eq!(err.to_string(), "Item 2 failed: Stage 'Square' failed: overflow");
//! ```

use std::convert::Infallible;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Two operands cannot be composed (e.g. group with group)
    #[error("Composition error: {0}")]
    Composition(String),

    /// A group was invoked with no internal pipeline
    #[error("Group '{0}' has no internal pipeline")]
    Unconfigured(String),

    /// Composition was attempted on a group after its first invocation
    #[error("Group '{0}' is sealed and no longer accepts composition")]
    Sealed(String),

    /// Invalid group configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stage returned an error
    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    /// A single batch item failed inside a group
    #[error("Item {index} failed: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },

    /// A stage panicked while processing an item
    #[error("Stage panicked: {0}")]
    Panicked(String),

    /// Catch-all for errors raised by caller-supplied logic
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a composition error.
    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition(message.into())
    }

    /// Create an unconfigured-group error.
    pub fn unconfigured(group: impl Into<String>) -> Self {
        Self::Unconfigured(group.into())
    }

    /// Create a sealed-group error.
    pub fn sealed(group: impl Into<String>) -> Self {
        Self::Sealed(group.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a stage failure with the stage name as context.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap an error raised while processing the batch item at `index`.
    pub fn item(index: usize, source: PipelineError) -> Self {
        Self::Item {
            index,
            source: Box::new(source),
        }
    }

    /// Create an error from any message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Build a `Panicked` error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// Attach a stage name to an uncategorized error.
    ///
    /// Errors that already carry context (stage, item, group state) pass through
    /// unchanged so nested composites report the innermost failing stage.
    pub(crate) fn in_stage(self, stage: &str) -> Self {
        match self {
            Self::Other(message) => Self::stage(stage, message),
            Self::Panicked(message) => Self::stage(stage, format!("panicked: {message}")),
            other => other,
        }
    }

    /// Convert a stage error and tag it with the stage name.
    pub(crate) fn tagged<E: Into<PipelineError>>(err: E, stage: &str) -> Self {
        let err: Self = err.into();
        err.in_stage(stage)
    }

    /// Batch index of the failing item, if this is an item error.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Item { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Whether the error was raised while building the pipeline rather than running it.
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            Self::Composition(_) | Self::Sealed(_) | Self::Config(_)
        )
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Composition(_) => "Composition",
            Self::Unconfigured(_) => "Unconfigured",
            Self::Sealed(_) => "Sealed",
            Self::Config(_) => "Config",
            Self::Stage { .. } => "Stage",
            Self::Item { .. } => "Item",
            Self::Panicked(_) => "Panic",
            Self::Other(_) => "Error",
        }
    }
}

impl From<Infallible> for PipelineError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<String> for PipelineError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<&str> for PipelineError {
    fn from(message: &str) -> Self {
        Self::Other(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display_and_index() {
        let err = PipelineError::item(3, PipelineError::other("boom"));
        assert_eq!(err.index(), Some(3));
        assert_eq!(err.to_string(), "Item 3 failed: boom");
        assert_eq!(err.category(), "Item");
    }

    #[test]
    fn test_in_stage_tags_only_uncategorized_errors() {
        let tagged = PipelineError::other("bad input").in_stage("Parse");
        assert_eq!(tagged, PipelineError::stage("Parse", "bad input"));

        let already = PipelineError::stage("Inner", "x").in_stage("Outer");
        assert_eq!(already, PipelineError::stage("Inner", "x"));

        let item = PipelineError::item(0, PipelineError::other("y")).in_stage("Outer");
        assert_eq!(item.index(), Some(0));
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        let err = anyhow::anyhow!("root cause").context("while squaring");
        let converted: PipelineError = err.into();
        assert_eq!(
            converted,
            PipelineError::other("while squaring: root cause")
        );
    }

    #[test]
    fn test_from_panic_payloads() {
        let from_str = PipelineError::from_panic(Box::new("static message"));
        assert_eq!(from_str, PipelineError::Panicked("static message".into()));

        let from_string = PipelineError::from_panic(Box::new(String::from("owned")));
        assert_eq!(from_string, PipelineError::Panicked("owned".into()));

        let unknown = PipelineError::from_panic(Box::new(42_u8));
        assert_eq!(
            unknown,
            PipelineError::Panicked("unknown panic payload".into())
        );
    }

    #[test]
    fn test_composition_classification() {
        assert!(PipelineError::composition("x").is_composition_error());
        assert!(PipelineError::sealed("g").is_composition_error());
        assert!(PipelineError::config("zero").is_composition_error());
        assert!(!PipelineError::unconfigured("g").is_composition_error());
        assert!(!PipelineError::other("x").is_composition_error());
    }
}
