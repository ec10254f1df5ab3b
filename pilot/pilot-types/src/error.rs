//! Error types for the pilot core.
//!
//! Only construction-time validation and registry lookups produce errors.
//! Per-tick operations degrade to outcome values instead of returning `Err`.

use crate::body::BodyId;

/// Errors that can occur while building or querying pilot state.
///
/// # Example
///
/// ```
/// use pilot_types::{BodyId, PilotError};
///
/// let error = PilotError::BodyNotFound(BodyId(7));
/// assert!(error.is_not_found());
/// assert!(error.to_string().contains("7"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum PilotError {
    /// The body has no registry entry, typically because it was destroyed.
    ///
    /// Callers treat this as "no obstruction data available".
    #[error("body {0} not found")]
    BodyNotFound(BodyId),

    /// Cell sizes must be positive and finite.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    /// Body mass must be positive and finite.
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f64),

    /// A configuration parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PilotError {
    /// Creates an invalid configuration error with the given message.
    ///
    /// # Example
    ///
    /// ```
    /// use pilot_types::PilotError;
    ///
    /// let error = PilotError::invalid_config("stuck_ticks must be positive");
    /// assert!(error.to_string().contains("stuck_ticks"));
    /// ```
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns `true` if this is a missing-body error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::BodyNotFound(_))
    }
}

/// Result type for pilot operations.
pub type Result<T> = std::result::Result<T, PilotError>;
