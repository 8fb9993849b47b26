//! The parsed policy document model.
//!
//! This is the engine's input surface: the unvalidated in-memory form of a
//! XACML Policy or PolicySet document, as produced by an external
//! unmarshaller (§6 of the XACML core describes the XML binding; a host may
//! equally build these from JSON or construct them programmatically). Load
//! turns this tree into compiled evaluators, performing all arity, type,
//! reference, and version checking; nothing here is trusted.

use serde::{Deserialize, Serialize};

use crate::decision::Effect;

/// A literal attribute value in lexical form, not yet parsed against its
/// datatype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralValue {
    /// Datatype URI.
    pub datatype: String,
    /// Lexical value.
    pub value: String,
}

impl LiteralValue {
    /// Convenience constructor.
    pub fn new(datatype: impl Into<String>, value: impl Into<String>) -> Self {
        Self { datatype: datatype.into(), value: value.into() }
    }
}

/// An attribute designator: a bag-producing lookup against the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDesignator {
    /// Attribute category URI.
    pub category: String,
    /// Attribute identifier.
    pub attribute_id: String,
    /// Expected datatype URI.
    pub datatype: String,
    /// Optional issuer constraint.
    #[serde(default)]
    pub issuer: Option<String>,
    /// When true, an absent attribute is a `missing-attribute` error
    /// instead of an empty bag.
    #[serde(default)]
    pub must_be_present: bool,
}

/// An attribute selector: a content-tree path lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSelector {
    /// Attribute category whose content is addressed.
    pub category: String,
    /// The selection path (conformance subset of XPath).
    pub path: String,
    /// Datatype URI each selected node converts to.
    pub datatype: String,
    /// When true, an empty selection is a `missing-attribute` error.
    #[serde(default)]
    pub must_be_present: bool,
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A literal value.
    Value(LiteralValue),
    /// An attribute designator.
    Designator(AttributeDesignator),
    /// An attribute selector.
    Selector(AttributeSelector),
    /// A function application.
    Apply {
        /// Function identifier.
        function_id: String,
        /// Argument expressions, in order.
        args: Vec<Expression>,
    },
    /// A reference to a variable definition.
    VariableReference {
        /// The referenced variable id.
        id: String,
    },
    /// A function reference, valid only as a higher-order function
    /// argument.
    Function {
        /// The referenced function identifier.
        id: String,
    },
}

/// A named, reusable expression within a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// The variable id, unique within its policy.
    pub id: String,
    /// The defining expression.
    pub expression: Expression,
}

/// One Match clause: a binary predicate between a literal and a
/// designator/selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// The match function id.
    pub match_id: String,
    /// The literal operand (first function argument).
    pub value: LiteralValue,
    /// The bag-producing operand.
    pub source: MatchSource,
}

/// The bag-producing side of a Match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    /// Fetch from the request attributes.
    Designator(AttributeDesignator),
    /// Fetch from a content tree.
    Selector(AttributeSelector),
}

/// A conjunction of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllOf {
    /// The conjuncts; all must match.
    pub matches: Vec<Match>,
}

/// A disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyOf {
    /// The disjuncts; at least one must match.
    pub all_of: Vec<AllOf>,
}

/// The applicability predicate of a rule, policy, or policy set.
///
/// An empty `any_of` list matches every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Top-level conjunction of `AnyOf` disjunctions.
    #[serde(default)]
    pub any_of: Vec<AnyOf>,
}

impl Target {
    /// The empty target, which matches everything.
    pub const fn match_all() -> Self {
        Self { any_of: Vec::new() }
    }
}

/// An attribute assignment template inside an obligation/advice expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignmentExpression {
    /// The assigned attribute id.
    pub attribute_id: String,
    /// Optional category qualifier.
    #[serde(default)]
    pub category: Option<String>,
    /// Optional issuer qualifier.
    #[serde(default)]
    pub issuer: Option<String>,
    /// The value expression.
    pub expression: Expression,
}

/// An obligation template attached to a rule, policy, or policy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationExpression {
    /// The obligation id.
    pub id: String,
    /// The decision this obligation accompanies.
    pub fulfill_on: Effect,
    /// Assignment templates evaluated when the obligation fires.
    #[serde(default)]
    pub assignments: Vec<AttributeAssignmentExpression>,
}

/// An advice template attached to a rule, policy, or policy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceExpression {
    /// The advice id.
    pub id: String,
    /// The decision this advice accompanies.
    pub applies_to: Effect,
    /// Assignment templates evaluated when the advice fires.
    #[serde(default)]
    pub assignments: Vec<AttributeAssignmentExpression>,
}

/// A rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule id, unique within its policy.
    pub rule_id: String,
    /// The declared effect.
    pub effect: Effect,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Applicability target; absent means inherit (match all).
    #[serde(default)]
    pub target: Option<Target>,
    /// Optional boolean gate.
    #[serde(default)]
    pub condition: Option<Expression>,
    /// Obligation templates.
    #[serde(default)]
    pub obligations: Vec<ObligationExpression>,
    /// Advice templates.
    #[serde(default)]
    pub advice: Vec<AdviceExpression>,
}

/// A policy: a target, variable definitions, and combined rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy id.
    pub policy_id: String,
    /// Dotted numeric version.
    pub version: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Applicability target.
    #[serde(default)]
    pub target: Option<Target>,
    /// Rule-combining algorithm id.
    pub rule_combining_alg_id: String,
    /// Variable definitions, in document order.
    #[serde(default)]
    pub variable_definitions: Vec<VariableDefinition>,
    /// The rules, in document order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Obligation templates.
    #[serde(default)]
    pub obligations: Vec<ObligationExpression>,
    /// Advice templates.
    #[serde(default)]
    pub advice: Vec<AdviceExpression>,
}

/// A reference to a policy or policy set by id, with optional version
/// constraints (`*` matches one component, `+` matches any tail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyReference {
    /// The referenced id.
    pub id: String,
    /// Exact-version pattern.
    #[serde(default)]
    pub version: Option<String>,
    /// Lower-bound pattern.
    #[serde(default)]
    pub earliest_version: Option<String>,
    /// Upper-bound pattern.
    #[serde(default)]
    pub latest_version: Option<String>,
}

impl PolicyReference {
    /// A reference with no version constraints.
    pub fn to_id(id: impl Into<String>) -> Self {
        Self { id: id.into(), version: None, earliest_version: None, latest_version: None }
    }
}

/// A child of a policy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicySetChild {
    /// An inline policy.
    Policy(Policy),
    /// An inline nested policy set.
    PolicySet(PolicySet),
    /// A reference to a policy loaded elsewhere in the corpus.
    PolicyIdReference(PolicyReference),
    /// A reference to a policy set loaded elsewhere in the corpus.
    PolicySetIdReference(PolicyReference),
}

/// A policy set: a target and combined children (policies, nested policy
/// sets, or references).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Policy set id.
    pub policy_set_id: String,
    /// Dotted numeric version.
    pub version: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Applicability target.
    #[serde(default)]
    pub target: Option<Target>,
    /// Policy-combining algorithm id.
    pub policy_combining_alg_id: String,
    /// Children, in document order.
    #[serde(default)]
    pub children: Vec<PolicySetChild>,
    /// Obligation templates.
    #[serde(default)]
    pub obligations: Vec<ObligationExpression>,
    /// Advice templates.
    #[serde(default)]
    pub advice: Vec<AdviceExpression>,
}
