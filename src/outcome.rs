//! # Per-item outcomes
//!
//! Every per-item operation reports one of three outcomes. The assembler
//! branches on them exhaustively instead of inspecting error identities.

use crate::error::ItemFailure;

/// Result of applying an operation to a single item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    /// The item produced a value (or a tuple of values)
    Success(T),
    /// The item should be dropped from the batch; not an error
    Skip(String),
    /// The item failed unexpectedly
    Failure(ItemFailure),
}

impl<T> ItemOutcome<T> {
    pub fn skip(reason: impl Into<String>) -> Self {
        ItemOutcome::Skip(reason.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ItemOutcome::Failure(ItemFailure::error(message))
    }

    /// Convert a fallible computation, turning the error into a failure
    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: std::error::Error + 'static,
    {
        match result {
            Ok(value) => ItemOutcome::Success(value),
            Err(error) => ItemOutcome::Failure(ItemFailure::from_error(&error)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ItemOutcome::Skip(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failure(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ItemOutcome<U> {
        match self {
            ItemOutcome::Success(value) => ItemOutcome::Success(f(value)),
            ItemOutcome::Skip(reason) => ItemOutcome::Skip(reason),
            ItemOutcome::Failure(failure) => ItemOutcome::Failure(failure),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ItemOutcome<U>) -> ItemOutcome<U> {
        match self {
            ItemOutcome::Success(value) => f(value),
            ItemOutcome::Skip(reason) => ItemOutcome::Skip(reason),
            ItemOutcome::Failure(failure) => ItemOutcome::Failure(failure),
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            ItemOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ItemFailure> {
        match self {
            ItemOutcome::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl<T> From<Result<T, ItemFailure>> for ItemOutcome<T> {
    fn from(result: Result<T, ItemFailure>) -> Self {
        match result {
            Ok(value) => ItemOutcome::Success(value),
            Err(failure) => ItemOutcome::Failure(failure),
        }
    }
}

/// Counts of each outcome kind in a result list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn of<T>(results: &[ItemOutcome<T>]) -> Self {
        results.iter().fold(Self::default(), |mut counts, outcome| {
            match outcome {
                ItemOutcome::Success(_) => counts.succeeded += 1,
                ItemOutcome::Skip(_) => counts.skipped += 1,
                ItemOutcome::Failure(_) => counts.failed += 1,
            }
            counts
        })
    }
}
