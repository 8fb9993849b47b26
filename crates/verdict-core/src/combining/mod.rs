//! Combining algorithms: the reductions over child decisions.
//!
//! Each algorithm consumes a sequence of children lazily: a child is only
//! evaluated when the algorithm needs its decision, which allows the
//! short-circuits the standard mandates (deny-overrides stops at the first
//! Deny). Obligations and advice of already-evaluated children whose
//! effect contradicts the final decision are discarded.
//!
//! The `ordered-*` identifiers are registered as aliases of their
//! unordered counterparts: this engine always evaluates children in
//! document order, so the two families coincide here. The unordered ids
//! merely permit reordering, they do not require it.

mod dp_overrides;
mod dp_unless;
mod first_applicable;
mod only_one_applicable;

pub use dp_overrides::DpOverrides;
pub use dp_unless::DpUnless;
pub use first_applicable::FirstApplicable;
pub use only_one_applicable::OnlyOneApplicable;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect, Status};

/// Well-known combining-algorithm identifiers.
pub mod ids {
    /// XACML 1.0 rule-combining prefix.
    pub const RULE_PREFIX_1_0: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
    /// XACML 1.1 rule-combining prefix (ordered variants).
    pub const RULE_PREFIX_1_1: &str = "urn:oasis:names:tc:xacml:1.1:rule-combining-algorithm:";
    /// XACML 3.0 rule-combining prefix.
    pub const RULE_PREFIX_3_0: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:";
    /// XACML 1.0 policy-combining prefix.
    pub const POLICY_PREFIX_1_0: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";
    /// XACML 1.1 policy-combining prefix (ordered variants).
    pub const POLICY_PREFIX_1_1: &str = "urn:oasis:names:tc:xacml:1.1:policy-combining-algorithm:";
    /// XACML 3.0 policy-combining prefix.
    pub const POLICY_PREFIX_3_0: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:";

    /// 3.0 rule deny-overrides.
    pub const RULE_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
    /// 3.0 rule permit-overrides.
    pub const RULE_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-overrides";
    /// 1.0 rule first-applicable.
    pub const RULE_FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable";
    /// 3.0 rule deny-unless-permit.
    pub const RULE_DENY_UNLESS_PERMIT: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-unless-permit";
    /// 3.0 rule permit-unless-deny.
    pub const RULE_PERMIT_UNLESS_DENY: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-unless-deny";

    /// 3.0 policy deny-overrides.
    pub const POLICY_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides";
    /// 3.0 policy permit-overrides.
    pub const POLICY_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-overrides";
    /// 1.0 policy first-applicable.
    pub const POLICY_FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable";
    /// 1.0 policy only-one-applicable.
    pub const POLICY_ONLY_ONE_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable";
    /// 3.0 policy deny-unless-permit.
    pub const POLICY_DENY_UNLESS_PERMIT: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-unless-permit";
    /// 3.0 policy permit-unless-deny.
    pub const POLICY_PERMIT_UNLESS_DENY: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-unless-deny";
}

/// A child of a combining algorithm: a rule, or a policy/policy set.
///
/// `evaluate` never fails; failures are Indeterminate decisions.
/// `applicability` answers the target-only question `only-one-applicable`
/// asks without running the child's full evaluation.
pub trait CombinerElement: Send + Sync {
    /// The child's id, for diagnostics.
    fn element_id(&self) -> &str;

    /// Full evaluation.
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> DecisionResult;

    /// Target-only applicability.
    ///
    /// # Errors
    ///
    /// The target's Indeterminate status.
    fn applicability(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status>;
}

/// A combining algorithm.
pub trait CombiningAlg: Send + Sync {
    /// The algorithm identifier.
    fn id(&self) -> &str;

    /// Reduces the children, in document order, to one decision.
    fn combine(
        &self,
        ctx: &EvaluationContext<'_>,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult;
}

/// Registration errors.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CombiningRegistryError {
    /// The identifier is already taken in the targeted scope.
    #[error("combining algorithm already registered: {id}")]
    Duplicate {
        /// The duplicated algorithm id.
        id: String,
    },
}

/// Registry of combining algorithms, split by the element kind they may
/// combine (`only-one-applicable` is meaningful for policies only).
#[derive(Default)]
pub struct CombiningAlgRegistry {
    rule_algs: HashMap<String, Arc<dyn CombiningAlg>>,
    policy_algs: HashMap<String, Arc<dyn CombiningAlg>>,
}

impl CombiningAlgRegistry {
    /// The standard XACML 3.0 set, including the 1.x legacy and
    /// `ordered-*` identifiers.
    pub fn standard() -> Self {
        let mut registry = Self::default();

        // deny/permit-overrides under every historical prefix, ordered and
        // unordered; one implementation per overriding effect.
        for (name, effect) in [("deny-overrides", Effect::Deny), ("permit-overrides", Effect::Permit)] {
            for prefix in [ids::RULE_PREFIX_1_0, ids::RULE_PREFIX_3_0] {
                registry.add_rule(Arc::new(DpOverrides::new(format!("{prefix}{name}"), effect)));
            }
            for prefix in [ids::RULE_PREFIX_1_1, ids::RULE_PREFIX_3_0] {
                registry.add_rule(Arc::new(DpOverrides::new(format!("{prefix}ordered-{name}"), effect)));
            }
            for prefix in [ids::POLICY_PREFIX_1_0, ids::POLICY_PREFIX_3_0] {
                registry.add_policy(Arc::new(DpOverrides::new(format!("{prefix}{name}"), effect)));
            }
            for prefix in [ids::POLICY_PREFIX_1_1, ids::POLICY_PREFIX_3_0] {
                registry.add_policy(Arc::new(DpOverrides::new(format!("{prefix}ordered-{name}"), effect)));
            }
        }

        registry.add_rule(Arc::new(FirstApplicable::new(ids::RULE_FIRST_APPLICABLE)));
        registry.add_policy(Arc::new(FirstApplicable::new(ids::POLICY_FIRST_APPLICABLE)));
        registry.add_policy(Arc::new(OnlyOneApplicable::new(ids::POLICY_ONLY_ONE_APPLICABLE)));

        registry.add_rule(Arc::new(DpUnless::new(ids::RULE_DENY_UNLESS_PERMIT, Effect::Permit)));
        registry.add_rule(Arc::new(DpUnless::new(ids::RULE_PERMIT_UNLESS_DENY, Effect::Deny)));
        registry.add_policy(Arc::new(DpUnless::new(ids::POLICY_DENY_UNLESS_PERMIT, Effect::Permit)));
        registry.add_policy(Arc::new(DpUnless::new(ids::POLICY_PERMIT_UNLESS_DENY, Effect::Deny)));

        registry
    }

    /// Looks up a rule-combining algorithm.
    pub fn rule_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlg>> {
        self.rule_algs.get(id)
    }

    /// Looks up a policy-combining algorithm.
    pub fn policy_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlg>> {
        self.policy_algs.get(id)
    }

    /// Registers a custom rule-combining algorithm.
    ///
    /// # Errors
    ///
    /// [`CombiningRegistryError::Duplicate`] when the id is taken.
    pub fn register_rule_algorithm(
        &mut self,
        alg: Arc<dyn CombiningAlg>,
    ) -> Result<(), CombiningRegistryError> {
        if self.rule_algs.contains_key(alg.id()) {
            return Err(CombiningRegistryError::Duplicate { id: alg.id().to_string() });
        }
        self.add_rule(alg);
        Ok(())
    }

    /// Registers a custom policy-combining algorithm.
    ///
    /// # Errors
    ///
    /// [`CombiningRegistryError::Duplicate`] when the id is taken.
    pub fn register_policy_algorithm(
        &mut self,
        alg: Arc<dyn CombiningAlg>,
    ) -> Result<(), CombiningRegistryError> {
        if self.policy_algs.contains_key(alg.id()) {
            return Err(CombiningRegistryError::Duplicate { id: alg.id().to_string() });
        }
        self.add_policy(alg);
        Ok(())
    }

    fn add_rule(&mut self, alg: Arc<dyn CombiningAlg>) {
        self.rule_algs.insert(alg.id().to_string(), alg);
    }

    fn add_policy(&mut self, alg: Arc<dyn CombiningAlg>) {
        self.policy_algs.insert(alg.id().to_string(), alg);
    }
}

impl std::fmt::Debug for CombiningAlgRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombiningAlgRegistry")
            .field("rule_algs", &self.rule_algs.len())
            .field("policy_algs", &self.policy_algs.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub combiner children with canned results, shared by the
    //! algorithm test suites.

    use super::*;
    use crate::decision::{PepAction, PepActions};

    /// A child that returns a fixed result and counts its evaluations.
    pub struct Stub {
        pub id: String,
        pub result: DecisionResult,
        pub applicable: Result<bool, Status>,
        pub evaluations: std::sync::atomic::AtomicUsize,
    }

    impl Stub {
        pub fn with(id: &str, result: DecisionResult) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                result,
                applicable: Ok(true),
                evaluations: std::sync::atomic::AtomicUsize::new(0),
            })
        }

        pub fn applicability(id: &str, applicable: Result<bool, Status>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                result: DecisionResult::not_applicable(),
                applicable,
                evaluations: std::sync::atomic::AtomicUsize::new(0),
            })
        }

        pub fn count(&self) -> usize {
            self.evaluations.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl CombinerElement for Stub {
        fn element_id(&self) -> &str {
            &self.id
        }

        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> DecisionResult {
            self.evaluations.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.result.clone()
        }

        fn applicability(&self, _ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
            self.applicable.clone()
        }
    }

    /// A permit result with a single tagged obligation.
    pub fn permit_with_obligation(tag: &str) -> DecisionResult {
        DecisionResult::permit(PepActions {
            obligations: vec![PepAction { id: tag.to_string(), assignments: vec![] }],
            advice: vec![],
        })
    }

    /// A deny result with a single tagged obligation.
    pub fn deny_with_obligation(tag: &str) -> DecisionResult {
        DecisionResult::deny(PepActions {
            obligations: vec![PepAction { id: tag.to_string(), assignments: vec![] }],
            advice: vec![],
        })
    }

    /// Evaluation context over an empty request.
    pub fn ctx_fixture() -> (crate::context::DecisionRequest, crate::config::PdpConfig) {
        (crate::context::DecisionRequest::default(), crate::config::PdpConfig::default())
    }

    pub fn combine(
        alg: &dyn CombiningAlg,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult {
        let (request, config) = ctx_fixture();
        let ctx = EvaluationContext::new(&request, &config);
        alg.combine(&ctx, children)
    }

    pub fn as_children(stubs: &[Arc<Stub>]) -> Vec<Arc<dyn CombinerElement>> {
        stubs.iter().map(|s| Arc::clone(s) as Arc<dyn CombinerElement>).collect()
    }

    pub fn indeterminate_d() -> DecisionResult {
        DecisionResult::indeterminate(
            crate::decision::ExtendedIndeterminate::Deny,
            Status::processing_error("boom"),
        )
    }

    pub fn indeterminate_p() -> DecisionResult {
        DecisionResult::indeterminate(
            crate::decision::ExtendedIndeterminate::Permit,
            Status::processing_error("boom"),
        )
    }

    pub fn indeterminate_dp() -> DecisionResult {
        DecisionResult::indeterminate(
            crate::decision::ExtendedIndeterminate::PermitDeny,
            Status::processing_error("boom"),
        )
    }

    #[test]
    fn standard_registry_scopes() {
        let registry = CombiningAlgRegistry::standard();
        assert!(registry.rule_algorithm(ids::RULE_DENY_OVERRIDES).is_some());
        assert!(registry.policy_algorithm(ids::POLICY_ONLY_ONE_APPLICABLE).is_some());
        // only-one-applicable is not a rule-combining algorithm.
        assert!(registry.rule_algorithm(ids::POLICY_ONLY_ONE_APPLICABLE).is_none());
        // ordered aliases resolve.
        assert!(registry
            .rule_algorithm("urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:ordered-deny-overrides")
            .is_some());
        assert!(registry
            .rule_algorithm("urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides")
            .is_some());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = CombiningAlgRegistry::standard();
        let clash = Arc::new(FirstApplicable::new(ids::RULE_FIRST_APPLICABLE));
        assert!(matches!(
            registry.register_rule_algorithm(clash),
            Err(CombiningRegistryError::Duplicate { .. })
        ));
    }

}
