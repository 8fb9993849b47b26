//! Policy provider errors.

use thiserror::Error;

use crate::policy::PolicyLoadError;

/// Errors raised while loading a policy corpus. All fatal: a provider
/// either loads completely or not at all.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// A policy or policy set failed to compile.
    #[error(transparent)]
    Load(#[from] PolicyLoadError),

    /// Two policies share an (id, version) pair.
    #[error("policy conflict: two policies with id '{id}' version {version}")]
    DuplicatePolicy {
        /// The conflicting policy id.
        id: String,
        /// The conflicting version.
        version: String,
    },

    /// Two policy sets share an (id, version) pair.
    #[error("policy conflict: two policy sets with id '{id}' version {version}")]
    DuplicatePolicySet {
        /// The conflicting policy set id.
        id: String,
        /// The conflicting version.
        version: String,
    },

    /// The corpus holds neither a policy nor a policy set.
    #[error("no policy or policy set in the corpus")]
    EmptyCorpus,

    /// A policy location pattern is malformed.
    #[error("invalid policy location '{location}': {reason}")]
    InvalidLocation {
        /// The offending location.
        location: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Expanding a file pattern failed at the filesystem level.
    #[error("failed to expand policy location '{location}'")]
    LocationIo {
        /// The offending location.
        location: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
