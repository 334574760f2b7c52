use thiserror::Error;

/// Errors surfaced by pool construction and by fail-fast fetches.
///
/// Lost CAS races are never reported; they are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The requested capacity was zero.
    #[error("requested pool capacity must be positive, got {requested}")]
    InvalidCapacity {
        /// The rejected request.
        requested: usize,
    },

    /// A configuration knob is out of range.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: &'static str,
    },

    /// An environment variable holding a knob could not be parsed.
    #[error("environment variable {var} has unparsable value {value:?}")]
    InvalidEnv {
        /// Name of the variable.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
    },

    /// A bounded claim found no free slot and the pool is configured to fail.
    #[error("no pooled object available after {attempts} claim attempts")]
    Unavailable {
        /// Number of slots probed before giving up.
        attempts: usize,
    },
}

/// Result type used throughout the crate.
pub type Result<T, E = PoolError> = core::result::Result<T, E>;
