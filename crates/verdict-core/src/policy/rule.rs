//! Rule evaluation.

use super::error::PolicyLoadError;
use super::obligation::PepActionExpressions;
use super::target::Target;
use super::CompileEnv;
use crate::combining::CombinerElement;
use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect, ExtendedIndeterminate, Status};
use crate::doc;
use crate::expr::{Expression, ExpressionBuilder};

/// A compiled rule: the leaf of the evaluation tree.
///
/// Evaluation follows §7.11 of the XACML core: target NoMatch →
/// NotApplicable; condition false → NotApplicable; condition true → the
/// declared effect; any Indeterminate on the way is biased toward the
/// effect (`Indeterminate{D}` for a Deny rule, `Indeterminate{P}` for a
/// Permit rule), because that is the only definite outcome the rule could
/// have produced.
pub struct RuleEvaluator {
    id: String,
    effect: Effect,
    target: Target,
    condition: Option<Expression>,
    actions: PepActionExpressions,
}

impl RuleEvaluator {
    /// Compiles a rule within its policy's variable scope.
    pub(super) fn compile(
        node: &doc::Rule,
        env: &CompileEnv<'_>,
        builder: &ExpressionBuilder<'_>,
    ) -> Result<Self, PolicyLoadError> {
        let target = Target::compile(node.target.as_ref(), env.functions, builder)?;
        let condition = node
            .condition
            .as_ref()
            .map(|condition| builder.build_boolean(condition))
            .transpose()?;
        let actions = PepActionExpressions::compile(&node.obligations, &node.advice, builder)?;
        Ok(Self {
            id: node.rule_id.clone(),
            effect: node.effect,
            target,
            condition,
            actions,
        })
    }

    /// The rule id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declared effect.
    pub const fn effect(&self) -> Effect {
        self.effect
    }

    fn biased_indeterminate(&self, status: Status) -> DecisionResult {
        DecisionResult::indeterminate(ExtendedIndeterminate::from_effect(self.effect), status)
    }
}

impl CombinerElement for RuleEvaluator {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> DecisionResult {
        match self.target.matches(ctx) {
            Err(status) => return self.biased_indeterminate(status),
            Ok(false) => return DecisionResult::not_applicable(),
            Ok(true) => {}
        }

        let condition_holds = match &self.condition {
            None => true,
            Some(condition) => {
                match condition.evaluate(ctx).and_then(|value| value.expect_boolean()) {
                    Ok(value) => value,
                    Err(status) => return self.biased_indeterminate(status),
                }
            }
        };
        if !condition_holds {
            return DecisionResult::not_applicable();
        }

        match self.actions.evaluate_for(self.effect, ctx) {
            Ok(actions) => match self.effect {
                Effect::Permit => DecisionResult::permit(actions),
                Effect::Deny => DecisionResult::deny(actions),
            },
            Err(status) => self.biased_indeterminate(status),
        }
    }

    fn applicability(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        self.target.matches(ctx)
    }
}
