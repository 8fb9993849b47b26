//! The only-one-applicable policy-combining algorithm.

use std::sync::Arc;

use super::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, ExtendedIndeterminate, Status};

/// Exactly one applicable child → that child's result; none →
/// NotApplicable; more than one, or an error while deciding applicability,
/// → Indeterminate{DP}.
///
/// Applicability is the target-only question: no child is fully evaluated
/// until uniqueness is established.
pub struct OnlyOneApplicable {
    id: String,
}

impl OnlyOneApplicable {
    /// Builds the algorithm under the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlg for OnlyOneApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &EvaluationContext<'_>,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult {
        let mut selected: Option<&Arc<dyn CombinerElement>> = None;
        for child in children {
            match child.applicability(ctx) {
                Err(status) => {
                    return DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status);
                }
                Ok(false) => {}
                Ok(true) => {
                    if let Some(previous) = selected {
                        return DecisionResult::indeterminate(
                            ExtendedIndeterminate::PermitDeny,
                            Status::processing_error(format!(
                                "more than one applicable policy: {} and {}",
                                previous.element_id(),
                                child.element_id()
                            )),
                        );
                    }
                    selected = Some(child);
                }
            }
        }
        selected.map_or_else(DecisionResult::not_applicable, |child| child.evaluate(ctx))
    }
}
