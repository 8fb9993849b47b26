//! The first-applicable algorithm.

use std::sync::Arc;

use super::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{Decision, DecisionResult};

/// Returns the first definite (Permit or Deny) child result in document
/// order. Indeterminate children are remembered but deferred: a later
/// definite result still wins, and only if none appears does the first
/// Indeterminate surface. All children NotApplicable → NotApplicable.
pub struct FirstApplicable {
    id: String,
}

impl FirstApplicable {
    /// Builds the algorithm under the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlg for FirstApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &EvaluationContext<'_>,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult {
        let mut deferred: Option<DecisionResult> = None;
        for child in children {
            let result = child.evaluate(ctx);
            match result.decision {
                Decision::Permit | Decision::Deny => return result,
                Decision::NotApplicable => {}
                Decision::Indeterminate(_) => {
                    deferred.get_or_insert(result);
                }
            }
        }
        deferred.unwrap_or_else(DecisionResult::not_applicable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::testing::{
        as_children, combine, deny_with_obligation, indeterminate_d, permit_with_obligation, Stub,
    };
    use crate::decision::ExtendedIndeterminate;

    fn alg() -> FirstApplicable {
        FirstApplicable::new("test:first-applicable")
    }

    #[test]
    fn first_definite_result_wins() {
        let stubs = [
            Stub::with("na", DecisionResult::not_applicable()),
            Stub::with("d", deny_with_obligation("ob-deny")),
            Stub::with("p", permit_with_obligation("ob-permit")),
        ];
        let result = combine(&alg(), &as_children(&stubs));
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.actions.obligations[0].id, "ob-deny");
        assert_eq!(stubs[2].count(), 0, "evaluation stops at the first definite result");
    }

    #[test]
    fn indeterminate_is_deferred_past_later_definite_results() {
        let stubs = [
            Stub::with("err", indeterminate_d()),
            Stub::with("p", permit_with_obligation("ob")),
        ];
        let result = combine(&alg(), &as_children(&stubs));
        assert_eq!(result.decision, Decision::Permit);
    }

    #[test]
    fn first_indeterminate_surfaces_when_nothing_applies() {
        let stubs = [
            Stub::with("na", DecisionResult::not_applicable()),
            Stub::with("err", indeterminate_d()),
            Stub::with("na2", DecisionResult::not_applicable()),
        ];
        let result = combine(&alg(), &as_children(&stubs));
        assert_eq!(result.decision, Decision::Indeterminate(ExtendedIndeterminate::Deny));
    }

    #[test]
    fn empty_children_is_not_applicable() {
        let result = combine(&alg(), &[]);
        assert_eq!(result.decision, Decision::NotApplicable);
    }
}
