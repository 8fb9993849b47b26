//! The deny-overrides / permit-overrides family, one implementation
//! parameterized by the overriding effect.

use std::sync::Arc;

use super::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{
    Decision, DecisionResult, Effect, ExtendedIndeterminate, PepActions, Status,
};

/// `deny-overrides` when the overriding effect is Deny, `permit-overrides`
/// when it is Permit.
///
/// The overriding decision wins and short-circuits. Indeterminates biased
/// toward the overriding effect taint the outcome: per the standard's
/// tables, an `Indeterminate{O}` combined with any opposite-effect signal
/// widens to `Indeterminate{DP}`, because either definite outcome was
/// still reachable.
pub struct DpOverrides {
    id: String,
    overriding: Effect,
}

impl DpOverrides {
    /// Builds the algorithm under the given identifier.
    pub fn new(id: impl Into<String>, overriding: Effect) -> Self {
        Self { id: id.into(), overriding }
    }
}

impl CombiningAlg for DpOverrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &EvaluationContext<'_>,
        children: &[Arc<dyn CombinerElement>],
    ) -> DecisionResult {
        let overriding = self.overriding.decision();
        let other = match self.overriding {
            Effect::Deny => Decision::Permit,
            Effect::Permit => Decision::Deny,
        };
        let ext_overriding = ExtendedIndeterminate::from_effect(self.overriding);

        let mut other_seen = false;
        let mut other_actions = PepActions::none();
        let mut err_overriding: Option<Status> = None;
        let mut err_other: Option<Status> = None;
        let mut err_both: Option<Status> = None;

        for child in children {
            let result = child.evaluate(ctx);
            match result.decision {
                Decision::NotApplicable => {}
                Decision::Indeterminate(kind) => {
                    let status = result.status.unwrap_or_else(|| {
                        Status::processing_error(format!(
                            "indeterminate child {}",
                            child.element_id()
                        ))
                    });
                    let slot = if kind == ExtendedIndeterminate::PermitDeny {
                        &mut err_both
                    } else if kind == ext_overriding {
                        &mut err_overriding
                    } else {
                        &mut err_other
                    };
                    slot.get_or_insert(status);
                }
                definite if definite == overriding => {
                    // The overriding effect wins outright; obligations of
                    // previously evaluated opposite children are dropped.
                    return result;
                }
                _ => {
                    debug_assert_eq!(result.decision, other);
                    other_seen = true;
                    other_actions.merge(result.actions);
                }
            }
        }

        if let Some(status) = err_both {
            return DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status);
        }
        if let Some(status) = err_overriding {
            // The failed branch could have produced the overriding effect;
            // anything pointing the other way widens the uncertainty.
            if other_seen || err_other.is_some() {
                return DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status);
            }
            return DecisionResult::indeterminate(ext_overriding, status);
        }
        if other_seen {
            return match self.overriding {
                Effect::Deny => DecisionResult::permit(other_actions),
                Effect::Permit => DecisionResult::deny(other_actions),
            };
        }
        if let Some(status) = err_other {
            let ext_other = match self.overriding {
                Effect::Deny => ExtendedIndeterminate::Permit,
                Effect::Permit => ExtendedIndeterminate::Deny,
            };
            return DecisionResult::indeterminate(ext_other, status);
        }
        DecisionResult::not_applicable()
    }
}
