//! Error types for semantics descriptors.

use thiserror::Error;

/// Result type for semantics operations.
pub type SemanticsResult<T> = Result<T, SemanticsError>;

/// Errors that can occur when building or mutating a semantics descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticsError {
    /// The axis identifier is not one of the four recognized axes.
    #[error("unknown semantics axis: {axis}")]
    UnknownAxis {
        /// The rejected axis identifier.
        axis: String,
    },

    /// The level is not valid for the given axis.
    #[error("invalid level {level} for semantics axis {axis}")]
    InvalidLevel {
        /// The axis the level was meant for.
        axis: &'static str,
        /// The rejected level.
        level: String,
    },

    /// The template name is not recognized.
    #[error("unknown semantics template: {name}")]
    UnknownTemplate {
        /// The rejected template name.
        name: String,
    },

    /// A semantics string could not be parsed.
    #[error("malformed semantics string: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

impl SemanticsError {
    /// Creates an unknown axis error.
    pub fn unknown_axis(axis: impl ToString) -> Self {
        Self::UnknownAxis {
            axis: axis.to_string(),
        }
    }

    /// Creates an invalid level error.
    pub fn invalid_level(axis: &'static str, level: impl ToString) -> Self {
        Self::InvalidLevel {
            axis,
            level: level.to_string(),
        }
    }

    /// Creates a malformed string error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
