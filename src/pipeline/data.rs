//! Batch items and the builder state shared by both group flavors.

use std::sync::atomic::{AtomicBool, Ordering};

/// One element of a group batch.
///
/// A group always hands its internal pipeline a list. Single values are wrapped
/// in a one-element list; lists are passed through unchanged. Deeper nesting is
/// not inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem<T> {
    /// A scalar, wrapped into `vec![value]` before processing
    Single(T),
    /// A list, passed to the internal pipeline as-is
    List(Vec<T>),
}

impl<T> BatchItem<T> {
    /// Normalize to the list form the internal pipeline receives.
    pub fn into_list(self) -> Vec<T> {
        match self {
            Self::Single(value) => vec![value],
            Self::List(values) => values,
        }
    }

    /// Build a batch of single values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chainable::pipeline::BatchItem;
    ///
    /// let batch = BatchItem::singles([1, 2]);
    /// assert_eq!(batch, vec![BatchItem::Single(1), BatchItem::Single(2)]);
    /// ```
    pub fn singles(values: impl IntoIterator<Item = T>) -> Vec<Self> {
        values.into_iter().map(Self::Single).collect()
    }

    /// Build a batch of lists.
    pub fn lists(values: impl IntoIterator<Item = Vec<T>>) -> Vec<Self> {
        values.into_iter().map(Self::List).collect()
    }
}

impl<T> From<Vec<T>> for BatchItem<T> {
    fn from(values: Vec<T>) -> Self {
        Self::List(values)
    }
}

/// Internal pipeline of a group under construction.
///
/// `Empty` carries an identity function as evidence that the group's output type
/// is still `Vec<I>`, so the first stage composed in can be typed against it.
pub(crate) enum Internal<I, O, P> {
    Empty { identity: fn(Vec<I>) -> O },
    Ready(P),
}

impl<I, P> Internal<I, Vec<I>, P> {
    pub(crate) fn empty() -> Self {
        Self::Empty {
            identity: |items| items,
        }
    }
}

impl<I, O, P> Internal<I, O, P> {
    pub(crate) fn ready(&self) -> Option<&P> {
        match self {
            Self::Ready(pipeline) => Some(pipeline),
            Self::Empty { .. } => None,
        }
    }
}

/// One-way transition from "accepting composition" to "sealed".
#[derive(Debug, Default)]
pub(crate) struct SealState(AtomicBool);

impl SealState {
    /// Seal; returns true only for the call that performed the transition.
    pub(crate) fn seal(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
