//! Inclusive date/time ranges used to filter movements and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a [`DateRange`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    /// The start bound lies after the end bound.
    #[error("Invalid date range: start {start} is after end {end}")]
    StartAfterEnd {
        /// Start bound.
        start: DateTime<Utc>,
        /// End bound.
        end: DateTime<Utc>,
    },
}

/// A date/time range where both bounds are optional and inclusive.
///
/// An empty range (both bounds `None`) matches every instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a range, rejecting a start that lies after the end.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, DateRangeError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DateRangeError::StartAfterEnd { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// A range with no bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Returns true if `at` falls inside the range, bounds included.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }

    /// Returns true if neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}
