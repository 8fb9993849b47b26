//! Typed expressions and their evaluator.
//!
//! Expressions are compiled from the [`crate::doc`] tree by the
//! [`ExpressionBuilder`], which resolves functions and datatypes, checks
//! arity and static types, and links variable references to their
//! definitions. Evaluation therefore only surfaces runtime semantic
//! failures, carried as [`Status`] values: an expression either produces a
//! value or bag of its declared static type, or an Indeterminate status.

mod builder;

pub use builder::{ExprError, ExpressionBuilder};

use std::sync::Arc;

use crate::context::{EvaluationContext, SelectorPath};
use crate::decision::Status;
use crate::function::{FirstOrderFunction, HigherOrderKind};
use crate::value::{AttributeValue, Bag, Datatype, ValueType};

/// The result of evaluating an expression: a single value or a bag.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// A single attribute value.
    Value(AttributeValue),
    /// A bag of values.
    Bag(Bag),
}

impl Evaluated {
    /// The static type of this result.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Value(value) => ValueType::value(value.datatype()),
            Self::Bag(bag) => ValueType::bag(bag.datatype().clone()),
        }
    }

    /// The boolean payload, or a processing error for anything else.
    pub fn expect_boolean(&self) -> Result<bool, Status> {
        match self {
            Self::Value(value) => value
                .as_bool()
                .ok_or_else(|| Status::processing_error("expression did not produce a boolean")),
            Self::Bag(_) => Err(Status::processing_error("expression produced a bag, expected a boolean")),
        }
    }
}

/// A compiled attribute designator.
#[derive(Debug, Clone)]
pub struct Designator {
    pub(crate) category: String,
    pub(crate) attribute_id: String,
    pub(crate) issuer: Option<String>,
    pub(crate) datatype: Datatype,
    pub(crate) must_be_present: bool,
}

impl Designator {
    /// Resolves this designator against a context.
    pub fn resolve(&self, ctx: &EvaluationContext<'_>) -> Result<Bag, Status> {
        ctx.resolve_designator(
            &self.category,
            &self.attribute_id,
            self.issuer.as_deref(),
            &self.datatype,
            self.must_be_present,
        )
    }
}

/// A compiled attribute selector.
#[derive(Debug, Clone)]
pub struct Selector {
    pub(crate) category: String,
    pub(crate) path: SelectorPath,
    pub(crate) path_text: String,
    pub(crate) datatype: Datatype,
    pub(crate) must_be_present: bool,
}

impl Selector {
    /// Resolves this selector against a context.
    pub fn resolve(&self, ctx: &EvaluationContext<'_>) -> Result<Bag, Status> {
        ctx.resolve_selector(
            &self.category,
            &self.path,
            &self.path_text,
            &self.datatype,
            self.must_be_present,
        )
    }
}

/// A compiled variable reference, linked to its definition.
#[derive(Debug, Clone)]
pub struct VariableRef {
    id: String,
    definition: Arc<Expression>,
    return_type: ValueType,
    /// Nesting depth of variable references through this one.
    depth: usize,
}

impl VariableRef {
    /// The referenced variable id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }
}

/// A compiled first-order function application.
#[derive(Debug, Clone)]
pub struct Apply {
    function: Arc<FirstOrderFunction>,
    args: Vec<Expression>,
}

/// A compiled higher-order function application.
#[derive(Debug, Clone)]
pub struct HigherOrderApply {
    kind: HigherOrderKind,
    function: Arc<FirstOrderFunction>,
    args: Vec<Expression>,
    return_type: ValueType,
}

/// A compiled, type-checked expression.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A literal value.
    Literal(AttributeValue),
    /// A literal bag.
    BagLiteral(Bag),
    /// A request attribute lookup.
    Designator(Designator),
    /// A content tree lookup.
    Selector(Selector),
    /// A reference to a variable definition.
    VariableRef(VariableRef),
    /// A first-order function application.
    Apply(Apply),
    /// A higher-order function application.
    HigherOrderApply(HigherOrderApply),
}

impl Expression {
    /// The static return type, derived at build time.
    pub fn return_type(&self) -> ValueType {
        match self {
            Self::Literal(value) => ValueType::value(value.datatype()),
            Self::BagLiteral(bag) => ValueType::bag(bag.datatype().clone()),
            Self::Designator(designator) => ValueType::bag(designator.datatype.clone()),
            Self::Selector(selector) => ValueType::bag(selector.datatype.clone()),
            Self::VariableRef(var) => var.return_type.clone(),
            Self::Apply(apply) => apply.function.signature().return_type().clone(),
            Self::HigherOrderApply(apply) => apply.return_type.clone(),
        }
    }

    /// Evaluates the expression in a context.
    ///
    /// # Errors
    ///
    /// A [`Status`] representing the Indeterminate outcome; the first
    /// failing sub-expression wins (arguments evaluate in order).
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<Evaluated, Status> {
        match self {
            Self::Literal(value) => Ok(Evaluated::Value(value.clone())),
            Self::BagLiteral(bag) => Ok(Evaluated::Bag(bag.clone())),
            Self::Designator(designator) => designator.resolve(ctx).map(Evaluated::Bag),
            Self::Selector(selector) => selector.resolve(ctx).map(Evaluated::Bag),
            Self::VariableRef(var) => {
                if let Some(cached) = ctx.cached_variable(&var.id) {
                    return cached;
                }
                let result = var.definition.evaluate(ctx);
                ctx.store_variable(&var.id, result.clone());
                result
            }
            Self::Apply(apply) => {
                let args = Self::evaluate_args(&apply.args, ctx)?;
                apply.function.invoke(&args, ctx)
            }
            Self::HigherOrderApply(apply) => {
                let args = Self::evaluate_args(&apply.args, ctx)?;
                apply.kind.apply(&apply.function, &args, ctx)
            }
        }
    }

    /// Strict argument evaluation: the first Indeterminate argument aborts
    /// the application. Laziness lives in the higher-order combinators,
    /// which receive their function argument unevaluated by construction.
    fn evaluate_args(
        args: &[Expression],
        ctx: &EvaluationContext<'_>,
    ) -> Result<Vec<Evaluated>, Status> {
        args.iter().map(|arg| arg.evaluate(ctx)).collect()
    }

    /// The deepest chain of variable references below this expression.
    pub(crate) fn variable_depth(&self) -> usize {
        match self {
            Self::Literal(_) | Self::BagLiteral(_) | Self::Designator(_) | Self::Selector(_) => 0,
            Self::VariableRef(var) => var.depth(),
            Self::Apply(Apply { args, .. })
            | Self::HigherOrderApply(HigherOrderApply { args, .. }) => {
                args.iter().map(Self::variable_depth).max().unwrap_or(0)
            }
        }
    }
}
