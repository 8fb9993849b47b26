//! The deny-unless-permit / permit-unless-deny family: total algorithms
//! that never return NotApplicable or Indeterminate.

use std::sync::Arc;

use super::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect, PepActions};

/// `deny-unless-permit` seeks Permit and defaults to Deny;
/// `permit-unless-deny` is the mirror. NotApplicable and Indeterminate
/// children collapse into the default.
pub struct DpUnless {
    id: String,
    sought: Effect,
}

impl DpUnless {
    /// Builds the algorithm under the given identifier; `sought` is the
    /// effect that overrides the default.
    pub fn new(id: impl Into<String>, sought: Effect) -> Self {
        Self { id: id.into(), sought }
    }
}

impl CombiningAlg for DpUnless {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &EvaluationContext<'_>,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult {
        let sought = self.sought.decision();
        let default = match self.sought {
            Effect::Permit => Effect::Deny,
            Effect::Deny => Effect::Permit,
        };

        let mut default_actions = PepActions::none();
        for child in children {
            let result = child.evaluate(ctx);
            if result.decision == sought {
                return result;
            }
            if result.decision == default.decision() {
                default_actions.merge(result.actions);
            }
        }
        match default {
            Effect::Deny => DecisionResult::deny(default_actions),
            Effect::Permit => DecisionResult::permit(default_actions),
        }
    }
}
