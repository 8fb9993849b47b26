//! Policy compilation errors.

use thiserror::Error;

use crate::expr::ExprError;

/// Errors raised while compiling a policy or policy set into its
/// evaluator. All of these are fatal configuration errors: no decision can
/// be computed from a corpus that fails to load.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyLoadError {
    /// An expression inside the element failed to compile.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// The rule-combining algorithm id is not registered.
    #[error("unknown rule-combining algorithm: {id}")]
    UnknownRuleCombiningAlg {
        /// The unresolved algorithm id.
        id: String,
    },

    /// The policy-combining algorithm id is not registered.
    #[error("unknown policy-combining algorithm: {id}")]
    UnknownPolicyCombiningAlg {
        /// The unresolved algorithm id.
        id: String,
    },

    /// Two rules in one policy share an id.
    #[error("duplicate rule id: {id}")]
    DuplicateRuleId {
        /// The duplicated rule id.
        id: String,
    },

    /// A match function id does not name a registered first-order
    /// function.
    #[error("unknown match function: {id}")]
    UnknownMatchFunction {
        /// The unresolved function id.
        id: String,
    },

    /// A version string is not a dotted numeric sequence.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion {
        /// The offending version text.
        version: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A version pattern is malformed.
    #[error("invalid version pattern '{pattern}': {reason}")]
    InvalidVersionPattern {
        /// The offending pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A reference names a policy or policy set the corpus does not
    /// contain (under the given version constraints).
    #[error("unresolved {kind} reference: {id}")]
    UnresolvedReference {
        /// `"policy"` or `"policy set"`.
        kind: &'static str,
        /// The referenced id.
        id: String,
    },

    /// A `PolicySetIdReference` chain revisited an id.
    #[error("policy set reference cycle: {}", chain.join(" -> "))]
    ReferenceCycle {
        /// The chain, ending with the repeated id.
        chain: Vec<String>,
    },

    /// A reference chain grew past the configured limit.
    #[error("policy set reference chain [{}] exceeds depth limit {max}", chain.join(" -> "))]
    ReferenceDepthExceeded {
        /// The offending chain of policy set ids.
        chain: Vec<String>,
        /// The configured limit.
        max: usize,
    },

    /// Context wrapper naming the element a nested error belongs to.
    #[error("invalid {kind} '{id}' version {version}: {source}")]
    InElement {
        /// `"policy"` or `"policy set"`.
        kind: &'static str,
        /// The element id.
        id: String,
        /// The element version text.
        version: String,
        /// The underlying error.
        #[source]
        source: Box<PolicyLoadError>,
    },
}

impl PolicyLoadError {
    /// Wraps an error with the id/version of the element it occurred in.
    pub fn in_element(kind: &'static str, id: &str, version: &str, source: Self) -> Self {
        Self::InElement {
            kind,
            id: id.to_string(),
            version: version.to_string(),
            source: Box::new(source),
        }
    }
}
