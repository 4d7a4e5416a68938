//! Error types for episcope.
//!
//! Contract violations (duplicate registrations, lookups of unknown
//! identifiers, palette exhaustion, ordering before computation) are hard
//! errors: they indicate caller misuse and abort the operation immediately.
//! Sparse-data conditions are NOT errors; those degrade into sentinel
//! correlation values and auto-scaled axes (see `gallery` and `figures`).

use thiserror::Error;

/// Unified error type for all episcope operations.
#[derive(Error, Debug)]
pub enum EpiscopeError {
    /// A factor with this identifier is already registered on the axis
    #[error("duplicate {axis} factor '{id}'")]
    DuplicateFactor { axis: char, id: String },

    /// No factor with this identifier exists on the axis
    #[error("unknown {axis} factor '{id}'")]
    UnknownFactor { axis: char, id: String },

    /// A data point with this identifier is already registered
    #[error("duplicate data point '{0}'")]
    DuplicateDataPoint(String),

    /// No data point with this identifier exists
    #[error("unknown data point '{0}'")]
    UnknownDataPoint(String),

    /// More distinct category labels than palette entries
    #[error("category palette exhausted: no color left for '{0}' ({1} colors available)")]
    PaletteExhausted(String, usize),

    /// Color lookup for a label that was never registered
    #[error("category '{0}' was never registered")]
    UnregisteredCategory(String),

    /// An operation that needs the correlation matrix ran before `compute_correlations`
    #[error("correlations have not been computed yet")]
    CorrelationsNotComputed,

    /// Malformed input data (bad CSV layout, unparseable field)
    #[error("data error: {0}")]
    Data(String),

    /// I/O errors (file reading, figure writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EpiscopeError {
    /// Creates a duplicate-factor error for the given axis.
    pub fn duplicate_factor(axis: char, id: impl Into<String>) -> Self {
        EpiscopeError::DuplicateFactor { axis, id: id.into() }
    }

    /// Creates an unknown-factor error for the given axis.
    pub fn unknown_factor(axis: char, id: impl Into<String>) -> Self {
        EpiscopeError::UnknownFactor { axis, id: id.into() }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        EpiscopeError::Data(message.into())
    }
}

/// Result type alias for episcope operations.
pub type Result<T> = std::result::Result<T, EpiscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EpiscopeError::duplicate_factor('x', "NY.GDP.PCAP.CD");
        assert_eq!(err.to_string(), "duplicate x factor 'NY.GDP.PCAP.CD'");

        let err = EpiscopeError::PaletteExhausted("Oceania".to_string(), 6);
        assert!(err.to_string().contains("Oceania"));
        assert!(err.to_string().contains("6"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EpiscopeError = io.into();
        assert!(matches!(err, EpiscopeError::Io(_)));
    }
}
