//! Obligation and advice expressions, and their evaluation into PEP
//! actions.

use super::error::PolicyLoadError;
use crate::context::EvaluationContext;
use crate::decision::{AttributeAssignment, Effect, PepAction, PepActions, Status};
use crate::doc;
use crate::expr::{Evaluated, Expression, ExpressionBuilder};

#[derive(Debug)]
struct AssignmentExpression {
    attribute_id: String,
    category: Option<String>,
    issuer: Option<String>,
    expression: Expression,
}

#[derive(Debug)]
struct PepActionExpression {
    id: String,
    on: Effect,
    assignments: Vec<AssignmentExpression>,
}

/// The compiled obligation and advice templates of one rule, policy, or
/// policy set.
#[derive(Debug, Default)]
pub struct PepActionExpressions {
    obligations: Vec<PepActionExpression>,
    advice: Vec<PepActionExpression>,
}

impl PepActionExpressions {
    /// Compiles the obligation/advice templates of a document element.
    pub fn compile(
        obligations: &[doc::ObligationExpression],
        advice: &[doc::AdviceExpression],
        builder: &ExpressionBuilder<'_>,
    ) -> Result<Self, PolicyLoadError> {
        let compile_assignments = |assignments: &[doc::AttributeAssignmentExpression]| {
            assignments
                .iter()
                .map(|assignment| {
                    Ok(AssignmentExpression {
                        attribute_id: assignment.attribute_id.clone(),
                        category: assignment.category.clone(),
                        issuer: assignment.issuer.clone(),
                        expression: builder.build(&assignment.expression)?,
                    })
                })
                .collect::<Result<Vec<_>, PolicyLoadError>>()
        };

        Ok(Self {
            obligations: obligations
                .iter()
                .map(|obligation| {
                    Ok(PepActionExpression {
                        id: obligation.id.clone(),
                        on: obligation.fulfill_on,
                        assignments: compile_assignments(&obligation.assignments)?,
                    })
                })
                .collect::<Result<Vec<_>, PolicyLoadError>>()?,
            advice: advice
                .iter()
                .map(|advice| {
                    Ok(PepActionExpression {
                        id: advice.id.clone(),
                        on: advice.applies_to,
                        assignments: compile_assignments(&advice.assignments)?,
                    })
                })
                .collect::<Result<Vec<_>, PolicyLoadError>>()?,
        })
    }

    /// True when no template exists for either decision.
    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    /// Evaluates the templates whose `FulfillOn`/`AppliesTo` equals the
    /// decision's effect.
    ///
    /// # Errors
    ///
    /// The first failing assignment expression; per the standard a
    /// failure to fulfill obligations makes the whole element
    /// Indeterminate.
    pub fn evaluate_for(
        &self,
        effect: Effect,
        ctx: &EvaluationContext<'_>,
    ) -> Result<PepActions, Status> {
        let evaluate_set = |templates: &[PepActionExpression]| -> Result<Vec<PepAction>, Status> {
            templates
                .iter()
                .filter(|template| template.on == effect)
                .map(|template| evaluate_template(template, ctx))
                .collect()
        };
        Ok(PepActions {
            obligations: evaluate_set(&self.obligations)?,
            advice: evaluate_set(&self.advice)?,
        })
    }
}

/// A bag-valued assignment expression fans out into one assignment per
/// element.
fn evaluate_template(
    template: &PepActionExpression,
    ctx: &EvaluationContext<'_>,
) -> Result<PepAction, Status> {
    let mut assignments = Vec::with_capacity(template.assignments.len());
    for assignment in &template.assignments {
        let assign = |value| AttributeAssignment {
            attribute_id: assignment.attribute_id.clone(),
            category: assignment.category.clone(),
            issuer: assignment.issuer.clone(),
            value,
        };
        match assignment.expression.evaluate(ctx)? {
            Evaluated::Value(value) => assignments.push(assign(value)),
            Evaluated::Bag(bag) => {
                for value in &bag {
                    assignments.push(assign(value.clone()));
                }
            }
        }
    }
    Ok(PepAction { id: template.id.clone(), assignments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::{categories, DecisionRequest};
    use crate::function::FunctionRegistry;
    use crate::value::{AttributeValue, Datatype, DatatypeRegistry};

    struct Env {
        functions: FunctionRegistry,
        datatypes: DatatypeRegistry,
        config: PdpConfig,
    }

    impl Env {
        fn new() -> Self {
            Self {
                functions: FunctionRegistry::standard(),
                datatypes: DatatypeRegistry::standard(),
                config: PdpConfig::default(),
            }
        }
    }

    fn obligation(on: Effect) -> doc::ObligationExpression {
        doc::ObligationExpression {
            id: "urn:example:obligation:log".to_string(),
            fulfill_on: on,
            assignments: vec![doc::AttributeAssignmentExpression {
                attribute_id: "who".to_string(),
                category: None,
                issuer: None,
                expression: doc::Expression::Designator(doc::AttributeDesignator {
                    category: categories::SUBJECT.to_string(),
                    attribute_id: "subject-id".to_string(),
                    datatype: Datatype::String.uri().to_string(),
                    issuer: None,
                    must_be_present: true,
                }),
            }],
        }
    }

    #[test]
    fn only_matching_fulfill_on_evaluates() {
        let env = Env::new();
        let builder = ExpressionBuilder::new(&env.functions, &env.datatypes, &env.config);
        let compiled =
            PepActionExpressions::compile(&[obligation(Effect::Permit)], &[], &builder).unwrap();

        let request = DecisionRequest::builder()
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string("alice"))
            .build();
        let ctx = EvaluationContext::new(&request, &env.config);

        let permit_actions = compiled.evaluate_for(Effect::Permit, &ctx).unwrap();
        assert_eq!(permit_actions.obligations.len(), 1);
        assert_eq!(
            permit_actions.obligations[0].assignments[0].value,
            AttributeValue::string("alice")
        );

        let deny_actions = compiled.evaluate_for(Effect::Deny, &ctx).unwrap();
        assert!(deny_actions.is_empty());
    }

    #[test]
    fn bag_valued_assignment_fans_out() {
        let env = Env::new();
        let builder = ExpressionBuilder::new(&env.functions, &env.datatypes, &env.config);
        let compiled =
            PepActionExpressions::compile(&[obligation(Effect::Permit)], &[], &builder).unwrap();

        let request = DecisionRequest::builder()
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string("alice"))
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string("bob"))
            .build();
        let ctx = EvaluationContext::new(&request, &env.config);
        let actions = compiled.evaluate_for(Effect::Permit, &ctx).unwrap();
        assert_eq!(actions.obligations[0].assignments.len(), 2);
    }

    #[test]
    fn failing_assignment_surfaces_the_status() {
        let env = Env::new();
        let builder = ExpressionBuilder::new(&env.functions, &env.datatypes, &env.config);
        let compiled =
            PepActionExpressions::compile(&[obligation(Effect::Permit)], &[], &builder).unwrap();

        let request = DecisionRequest::default();
        let ctx = EvaluationContext::new(&request, &env.config);
        let status = compiled.evaluate_for(Effect::Permit, &ctx).unwrap_err();
        assert_eq!(status.code, crate::decision::StatusCode::MissingAttribute);
    }
}
