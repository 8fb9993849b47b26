//! Rule, policy, and policy-set evaluators.
//!
//! Compilation turns the document model into immutable evaluator trees:
//! targets and expressions are type-checked, combining algorithms and
//! functions resolved, variables linked, and references followed through
//! a [`PolicyResolver`] with cycle and depth protection. The compiled
//! evaluators are shareable across threads and evaluate without locks.

mod error;
mod obligation;
#[allow(clippy::module_inception)]
mod policy;
mod policy_set;
mod rule;
mod target;
mod version;

pub use error::PolicyLoadError;
pub use obligation::PepActionExpressions;
pub use policy::PolicyEvaluator;
pub use policy_set::{PolicyResolver, PolicySetEvaluator, RefChain};
pub use rule::RuleEvaluator;
pub use target::Target;
pub use version::{PolicyVersion, VersionPattern, VersionPatterns};

use std::sync::Arc;

use crate::combining::{CombinerElement, CombiningAlgRegistry};
use crate::config::PdpConfig;
use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Status};
use crate::function::FunctionRegistry;
use crate::value::DatatypeRegistry;

/// The frozen registries and configuration a compile pass reads.
#[derive(Clone, Copy)]
pub struct CompileEnv<'a> {
    /// Function registry.
    pub functions: &'a FunctionRegistry,
    /// Datatype registry.
    pub datatypes: &'a DatatypeRegistry,
    /// Combining-algorithm registry.
    pub combining: &'a CombiningAlgRegistry,
    /// Engine configuration.
    pub config: &'a PdpConfig,
}

/// The root of a decision: either a policy or a policy set evaluator.
#[derive(Clone)]
pub enum TopLevelEvaluator {
    /// A root policy.
    Policy(Arc<PolicyEvaluator>),
    /// A root policy set.
    PolicySet(Arc<PolicySetEvaluator>),
}

impl TopLevelEvaluator {
    /// The root element's id.
    pub fn id(&self) -> &str {
        match self {
            Self::Policy(policy) => policy.id(),
            Self::PolicySet(policy_set) => policy_set.id(),
        }
    }

    /// The root element's version.
    pub fn version(&self) -> &PolicyVersion {
        match self {
            Self::Policy(policy) => policy.version(),
            Self::PolicySet(policy_set) => policy_set.version(),
        }
    }

    /// Evaluates the root against a request context.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> DecisionResult {
        match self {
            Self::Policy(policy) => policy.evaluate(ctx),
            Self::PolicySet(policy_set) => policy_set.evaluate(ctx),
        }
    }

    /// Target-only applicability of the root.
    ///
    /// # Errors
    ///
    /// The target's Indeterminate status.
    pub fn applicability(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        match self {
            Self::Policy(policy) => policy.applicability(ctx),
            Self::PolicySet(policy_set) => policy_set.applicability(ctx),
        }
    }
}
