//! Target matching: the applicability predicate of rules, policies, and
//! policy sets.
//!
//! A target is a conjunction of `AnyOf` disjunctions of `AllOf`
//! conjunctions of `Match` clauses. Truth combines with the XACML tables:
//! in a conjunction a NoMatch dominates an Indeterminate, in a disjunction
//! a Match does.

use std::sync::Arc;

use super::error::PolicyLoadError;
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::doc;
use crate::expr::{Designator, ExpressionBuilder, Selector};
use crate::function::{FirstOrderFunction, FunctionRegistry};
use crate::value::{AttributeValue, Bag, Datatype, ValueType};

/// The bag-producing side of a match clause.
#[derive(Debug, Clone)]
enum MatchSource {
    Designator(Designator),
    Selector(Selector),
}

impl MatchSource {
    fn resolve(&self, ctx: &EvaluationContext<'_>) -> Result<Bag, Status> {
        match self {
            Self::Designator(designator) => designator.resolve(ctx),
            Self::Selector(selector) => selector.resolve(ctx),
        }
    }
}

/// One compiled match clause: `function(literal, element)` over the
/// elements of the source bag; the clause matches when any element does.
#[derive(Debug, Clone)]
pub struct TargetMatch {
    function: Arc<FirstOrderFunction>,
    literal: AttributeValue,
    source: MatchSource,
}

impl TargetMatch {
    fn compile(
        node: &doc::Match,
        functions: &FunctionRegistry,
        builder: &ExpressionBuilder<'_>,
    ) -> Result<Self, PolicyLoadError> {
        let function = functions
            .get(&node.match_id)
            .ok_or_else(|| PolicyLoadError::UnknownMatchFunction { id: node.match_id.clone() })?;

        let literal = builder.build_literal(&node.value)?;
        let (source, element_type) = match &node.source {
            doc::MatchSource::Designator(designator) => {
                let designator = builder.build_designator(designator)?;
                let datatype = designator.datatype.clone();
                (MatchSource::Designator(designator), datatype)
            }
            doc::MatchSource::Selector(selector) => {
                let selector = builder.build_selector(selector)?;
                let datatype = selector.datatype.clone();
                (MatchSource::Selector(selector), datatype)
            }
        };

        // A match function is a boolean binary predicate over
        // (literal, source element).
        if *function.signature().return_type() != ValueType::value(Datatype::Boolean) {
            return Err(PolicyLoadError::Expr(crate::expr::ExprError::TypeMismatch {
                detail: format!("match function {} does not return boolean", node.match_id),
            }));
        }
        function
            .signature()
            .check_args(&[
                ValueType::value(literal.datatype()),
                ValueType::value(element_type),
            ])
            .map_err(|detail| {
                PolicyLoadError::Expr(crate::expr::ExprError::TypeMismatch { detail })
            })?;

        Ok(Self { function: Arc::clone(function), literal, source })
    }

    /// True when any element of the source bag satisfies the predicate.
    /// Element-level errors are deferred and surface only if no element
    /// matched.
    fn matches(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        let bag = self.source.resolve(ctx)?;
        let mut deferred: Option<Status> = None;
        for element in &bag {
            let args = [
                crate::expr::Evaluated::Value(self.literal.clone()),
                crate::expr::Evaluated::Value(element.clone()),
            ];
            match self.function.invoke(&args, ctx) {
                Ok(result) => {
                    if result.expect_boolean()? {
                        return Ok(true);
                    }
                }
                Err(status) => {
                    deferred.get_or_insert(status);
                }
            }
        }
        match deferred {
            Some(status) => Err(status),
            None => Ok(false),
        }
    }
}

/// A compiled target.
#[derive(Debug, Clone, Default)]
pub struct Target {
    any_of: Vec<Vec<Vec<TargetMatch>>>,
}

impl Target {
    /// Compiles an optional document target; an absent or empty target
    /// matches every request.
    pub fn compile(
        node: Option<&doc::Target>,
        functions: &FunctionRegistry,
        builder: &ExpressionBuilder<'_>,
    ) -> Result<Self, PolicyLoadError> {
        let Some(node) = node else {
            return Ok(Self::default());
        };
        let any_of = node
            .any_of
            .iter()
            .map(|any_of| {
                any_of
                    .all_of
                    .iter()
                    .map(|all_of| {
                        all_of
                            .matches
                            .iter()
                            .map(|clause| TargetMatch::compile(clause, functions, builder))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { any_of })
    }

    /// Evaluates applicability against a context.
    ///
    /// # Errors
    ///
    /// The Indeterminate status when matching cannot be decided.
    pub fn matches(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        // Conjunction over AnyOf clauses: false dominates Indeterminate.
        let mut deferred: Option<Status> = None;
        for any_of in &self.any_of {
            match Self::any_of_matches(any_of, ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(status) => {
                    deferred.get_or_insert(status);
                }
            }
        }
        match deferred {
            Some(status) => Err(status),
            None => Ok(true),
        }
    }

    /// Disjunction over AllOf clauses: true dominates Indeterminate.
    fn any_of_matches(
        all_ofs: &[Vec<TargetMatch>],
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, Status> {
        let mut deferred: Option<Status> = None;
        for all_of in all_ofs {
            match Self::all_of_matches(all_of, ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(status) => {
                    deferred.get_or_insert(status);
                }
            }
        }
        match deferred {
            Some(status) => Err(status),
            None => Ok(false),
        }
    }

    /// Conjunction over match clauses: false dominates Indeterminate.
    fn all_of_matches(
        matches: &[TargetMatch],
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, Status> {
        let mut deferred: Option<Status> = None;
        for clause in matches {
            match clause.matches(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(status) => {
                    deferred.get_or_insert(status);
                }
            }
        }
        match deferred {
            Some(status) => Err(status),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::{categories, DecisionRequest};
    use crate::decision::StatusCode;
    use crate::value::DatatypeRegistry;

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";

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

        fn compile(&self, node: &doc::Target) -> Result<Target, PolicyLoadError> {
            let builder = ExpressionBuilder::new(&self.functions, &self.datatypes, &self.config);
            Target::compile(Some(node), &self.functions, &builder)
        }
    }

    fn subject_match(value: &str) -> doc::Match {
        subject_match_with(value, false)
    }

    fn subject_match_with(value: &str, must_be_present: bool) -> doc::Match {
        doc::Match {
            match_id: STRING_EQUAL.to_string(),
            value: doc::LiteralValue::new(Datatype::String.uri(), value),
            source: doc::MatchSource::Designator(doc::AttributeDesignator {
                category: categories::SUBJECT.to_string(),
                attribute_id: "subject-id".to_string(),
                datatype: Datatype::String.uri().to_string(),
                issuer: None,
                must_be_present,
            }),
        }
    }

    fn target_of(matches: Vec<doc::Match>) -> doc::Target {
        doc::Target {
            any_of: vec![doc::AnyOf { all_of: vec![doc::AllOf { matches }] }],
        }
    }

    fn request(subject: &str) -> DecisionRequest {
        DecisionRequest::builder()
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string(subject))
            .build()
    }

    #[test]
    fn empty_target_matches_everything() {
        let target = Target::default();
        let request = DecisionRequest::default();
        let ctx = EvaluationContext::new(&request, &PdpConfig::default());
        assert!(target.matches(&ctx).unwrap());
    }

    #[test]
    fn match_against_request_attribute() {
        let env = Env::new();
        let target = env.compile(&target_of(vec![subject_match("J. Hibbert")])).unwrap();

        let matching = request("J. Hibbert");
        let ctx = EvaluationContext::new(&matching, &env.config);
        assert!(target.matches(&ctx).unwrap());

        let other = request("Julius Hibbert");
        let ctx = EvaluationContext::new(&other, &env.config);
        assert!(!target.matches(&ctx).unwrap());
    }

    #[test]
    fn any_of_is_a_disjunction() {
        let env = Env::new();
        let node = doc::Target {
            any_of: vec![doc::AnyOf {
                all_of: vec![
                    doc::AllOf { matches: vec![subject_match("alice")] },
                    doc::AllOf { matches: vec![subject_match("bob")] },
                ],
            }],
        };
        let target = env.compile(&node).unwrap();
        let ctx_request = request("bob");
        let ctx = EvaluationContext::new(&ctx_request, &env.config);
        assert!(target.matches(&ctx).unwrap());
    }

    #[test]
    fn all_of_is_a_conjunction() {
        let env = Env::new();
        let target = env
            .compile(&target_of(vec![subject_match("alice"), subject_match("bob")]))
            .unwrap();
        let ctx_request = request("alice");
        let ctx = EvaluationContext::new(&ctx_request, &env.config);
        assert!(!target.matches(&ctx).unwrap());
    }

    #[test]
    fn missing_required_attribute_is_indeterminate() {
        let env = Env::new();
        let target = env
            .compile(&target_of(vec![subject_match_with("alice", true)]))
            .unwrap();
        let empty = DecisionRequest::default();
        let ctx = EvaluationContext::new(&empty, &env.config);
        let status = target.matches(&ctx).unwrap_err();
        assert_eq!(status.code, StatusCode::MissingAttribute);
    }

    #[test]
    fn missing_optional_attribute_is_no_match() {
        let env = Env::new();
        let target = env.compile(&target_of(vec![subject_match("alice")])).unwrap();
        let empty = DecisionRequest::default();
        let ctx = EvaluationContext::new(&empty, &env.config);
        assert!(!target.matches(&ctx).unwrap());
    }

    #[test]
    fn unknown_match_function_is_rejected() {
        let env = Env::new();
        let mut node = subject_match("alice");
        node.match_id = "urn:nope".to_string();
        assert!(matches!(
            env.compile(&target_of(vec![node])),
            Err(PolicyLoadError::UnknownMatchFunction { .. })
        ));
    }

    #[test]
    fn match_type_mismatch_is_rejected() {
        let env = Env::new();
        let mut node = subject_match("alice");
        node.value = doc::LiteralValue::new(Datatype::Integer.uri(), "1");
        assert!(matches!(env.compile(&target_of(vec![node])), Err(PolicyLoadError::Expr(_))));
    }
}
