//! Policy evaluation: target, rule combination, own obligations.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::error::PolicyLoadError;
use super::obligation::PepActionExpressions;
use super::rule::RuleEvaluator;
use super::target::Target;
use super::version::PolicyVersion;
use super::CompileEnv;
use crate::combining::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{Decision, DecisionResult, Effect, ExtendedIndeterminate, Status};
use crate::doc;
use crate::expr::ExpressionBuilder;

/// A compiled policy: a target gating a rule-combining reduction.
pub struct PolicyEvaluator {
    id: String,
    version: PolicyVersion,
    target: Target,
    algorithm: Arc<dyn CombiningAlg>,
    rules: Vec<Arc<dyn CombinerElement>>,
    actions: PepActionExpressions,
}

impl std::fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("target", &self.target)
            .field("algorithm", &self.algorithm.id())
            .field("rules", &self.rules.len())
            .field("actions", &self.actions)
            .finish()
    }
}

impl PolicyEvaluator {
    /// Compiles a policy document.
    ///
    /// # Errors
    ///
    /// Any [`PolicyLoadError`], wrapped with this policy's id and version.
    pub fn compile(node: &doc::Policy, env: &CompileEnv<'_>) -> Result<Arc<Self>, PolicyLoadError> {
        Self::compile_inner(node, env).map_err(|source| {
            PolicyLoadError::in_element("policy", &node.policy_id, &node.version, source)
        })
    }

    fn compile_inner(node: &doc::Policy, env: &CompileEnv<'_>) -> Result<Arc<Self>, PolicyLoadError> {
        let version = PolicyVersion::parse(&node.version)?;
        let algorithm = env
            .combining
            .rule_algorithm(&node.rule_combining_alg_id)
            .ok_or_else(|| PolicyLoadError::UnknownRuleCombiningAlg {
                id: node.rule_combining_alg_id.clone(),
            })?;

        let mut builder = ExpressionBuilder::new(env.functions, env.datatypes, env.config);
        for definition in &node.variable_definitions {
            builder.define_variable(definition)?;
        }

        let target = Target::compile(node.target.as_ref(), env.functions, &builder)?;

        let mut seen_rule_ids = HashSet::new();
        let mut rules: Vec<Arc<dyn CombinerElement>> = Vec::with_capacity(node.rules.len());
        for rule in &node.rules {
            if !seen_rule_ids.insert(rule.rule_id.as_str()) {
                return Err(PolicyLoadError::DuplicateRuleId { id: rule.rule_id.clone() });
            }
            rules.push(Arc::new(RuleEvaluator::compile(rule, env, &builder)?));
        }

        let actions = PepActionExpressions::compile(&node.obligations, &node.advice, &builder)?;
        debug!(policy_id = %node.policy_id, version = %version, rules = rules.len(), "compiled policy");

        Ok(Arc::new(Self {
            id: node.policy_id.clone(),
            version,
            target,
            algorithm: Arc::clone(algorithm),
            rules,
            actions,
        }))
    }

    /// The policy id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The parsed version.
    pub const fn version(&self) -> &PolicyVersion {
        &self.version
    }
}

/// Merges an element's own obligation/advice templates into a combined
/// result. Shared by policies and policy sets: actions only attach to
/// definite decisions, and a failure to evaluate them turns the element
/// Indeterminate{DP}.
pub(super) fn attach_own_actions(
    actions: &PepActionExpressions,
    mut result: DecisionResult,
    ctx: &EvaluationContext<'_>,
) -> DecisionResult {
    let effect = match result.decision {
        Decision::Permit => Effect::Permit,
        Decision::Deny => Effect::Deny,
        Decision::NotApplicable | Decision::Indeterminate(_) => return result,
    };
    if actions.is_empty() {
        return result;
    }
    match actions.evaluate_for(effect, ctx) {
        Ok(own) => {
            result.actions.merge(own);
            result
        }
        Err(status) => DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status),
    }
}

impl CombinerElement for PolicyEvaluator {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> DecisionResult {
        match self.target.matches(ctx) {
            Err(status) => {
                return DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status)
            }
            Ok(false) => return DecisionResult::not_applicable(),
            Ok(true) => {}
        }
        let combined = self.algorithm.combine(ctx, &self.rules);
        attach_own_actions(&self.actions, combined, ctx)
    }

    fn applicability(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        self.target.matches(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::{ids, CombiningAlgRegistry};
    use crate::config::PdpConfig;
    use crate::context::{categories, DecisionRequest};
    use crate::function::FunctionRegistry;
    use crate::value::{AttributeValue, Datatype, DatatypeRegistry};

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";

    struct Env {
        functions: FunctionRegistry,
        datatypes: DatatypeRegistry,
        combining: CombiningAlgRegistry,
        config: PdpConfig,
    }

    impl Env {
        fn new() -> Self {
            Self {
                functions: FunctionRegistry::standard(),
                datatypes: DatatypeRegistry::standard(),
                combining: CombiningAlgRegistry::standard(),
                config: PdpConfig::default(),
            }
        }

        fn env(&self) -> CompileEnv<'_> {
            CompileEnv {
                functions: &self.functions,
                datatypes: &self.datatypes,
                combining: &self.combining,
                config: &self.config,
            }
        }
    }

    fn rule(id: &str, effect: Effect, subject: Option<&str>) -> doc::Rule {
        doc::Rule {
            rule_id: id.to_string(),
            effect,
            description: None,
            target: subject.map(|who| doc::Target {
                any_of: vec![doc::AnyOf {
                    all_of: vec![doc::AllOf {
                        matches: vec![doc::Match {
                            match_id: STRING_EQUAL.to_string(),
                            value: doc::LiteralValue::new(Datatype::String.uri(), who),
                            source: doc::MatchSource::Designator(doc::AttributeDesignator {
                                category: categories::SUBJECT.to_string(),
                                attribute_id: "subject-id".to_string(),
                                datatype: Datatype::String.uri().to_string(),
                                issuer: None,
                                must_be_present: false,
                            }),
                        }],
                    }],
                }],
            }),
            condition: None,
            obligations: vec![],
            advice: vec![],
        }
    }

    fn policy(rules: Vec<doc::Rule>) -> doc::Policy {
        doc::Policy {
            policy_id: "urn:example:policy".to_string(),
            version: "1.0".to_string(),
            description: None,
            target: None,
            rule_combining_alg_id: ids::RULE_DENY_OVERRIDES.to_string(),
            variable_definitions: vec![],
            rules,
            obligations: vec![],
            advice: vec![],
        }
    }

    fn request(subject: &str) -> DecisionRequest {
        DecisionRequest::builder()
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string(subject))
            .build()
    }

    #[test]
    fn deny_overrides_across_rules() {
        let fixture = Env::new();
        let node = policy(vec![
            rule("permit-all", Effect::Permit, None),
            rule("deny-mallory", Effect::Deny, Some("mallory")),
        ]);
        let evaluator = PolicyEvaluator::compile(&node, &fixture.env()).unwrap();

        let mallory = request("mallory");
        let ctx = EvaluationContext::new(&mallory, &fixture.config);
        assert_eq!(evaluator.evaluate(&ctx).decision, Decision::Deny);

        let alice = request("alice");
        let ctx = EvaluationContext::new(&alice, &fixture.config);
        assert_eq!(evaluator.evaluate(&ctx).decision, Decision::Permit);
    }

    #[test]
    fn no_matching_rule_is_not_applicable() {
        let fixture = Env::new();
        let node = policy(vec![rule("deny-mallory", Effect::Deny, Some("mallory"))]);
        let evaluator = PolicyEvaluator::compile(&node, &fixture.env()).unwrap();
        let alice = request("alice");
        let ctx = EvaluationContext::new(&alice, &fixture.config);
        assert_eq!(evaluator.evaluate(&ctx).decision, Decision::NotApplicable);
    }

    #[test]
    fn duplicate_rule_id_fails_to_load() {
        let fixture = Env::new();
        let node = policy(vec![
            rule("r", Effect::Permit, None),
            rule("r", Effect::Deny, None),
        ]);
        let err = PolicyEvaluator::compile(&node, &fixture.env()).unwrap_err();
        assert!(matches!(
            err,
            PolicyLoadError::InElement { source, .. }
                if matches!(*source, PolicyLoadError::DuplicateRuleId { .. })
        ));
    }

    #[test]
    fn unknown_combining_algorithm_fails_to_load() {
        let fixture = Env::new();
        let mut node = policy(vec![rule("r", Effect::Permit, None)]);
        node.rule_combining_alg_id = "urn:nope".to_string();
        let err = PolicyEvaluator::compile(&node, &fixture.env()).unwrap_err();
        assert!(matches!(
            err,
            PolicyLoadError::InElement { source, .. }
                if matches!(*source, PolicyLoadError::UnknownRuleCombiningAlg { .. })
        ));
    }

    #[test]
    fn invalid_version_names_the_policy() {
        let fixture = Env::new();
        let mut node = policy(vec![rule("r", Effect::Permit, None)]);
        node.version = "one.zero".to_string();
        let err = PolicyEvaluator::compile(&node, &fixture.env()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("urn:example:policy"), "got: {message}");
    }

    #[test]
    fn own_obligations_attach_to_matching_decision() {
        let fixture = Env::new();
        let mut node = policy(vec![rule("permit-all", Effect::Permit, None)]);
        node.obligations = vec![
            doc::ObligationExpression {
                id: "on-permit".to_string(),
                fulfill_on: Effect::Permit,
                assignments: vec![],
            },
            doc::ObligationExpression {
                id: "on-deny".to_string(),
                fulfill_on: Effect::Deny,
                assignments: vec![],
            },
        ];
        let evaluator = PolicyEvaluator::compile(&node, &fixture.env()).unwrap();
        let anyone = request("anyone");
        let ctx = EvaluationContext::new(&anyone, &fixture.config);
        let result = evaluator.evaluate(&ctx);
        assert_eq!(result.decision, Decision::Permit);
        let ids: Vec<&str> = result.actions.obligations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["on-permit"]);
    }

    #[test]
    fn variables_are_visible_to_rules() {
        let fixture = Env::new();
        let mut node = policy(vec![doc::Rule {
            rule_id: "via-variable".to_string(),
            effect: Effect::Permit,
            description: None,
            target: None,
            condition: Some(doc::Expression::VariableReference { id: "is-anyone".to_string() }),
            obligations: vec![],
            advice: vec![],
        }]);
        node.variable_definitions = vec![doc::VariableDefinition {
            id: "is-anyone".to_string(),
            expression: doc::Expression::Value(doc::LiteralValue::new(Datatype::Boolean.uri(), "true")),
        }];
        let evaluator = PolicyEvaluator::compile(&node, &fixture.env()).unwrap();
        let anyone = request("anyone");
        let ctx = EvaluationContext::new(&anyone, &fixture.config);
        assert_eq!(evaluator.evaluate(&ctx).decision, Decision::Permit);
    }
}
