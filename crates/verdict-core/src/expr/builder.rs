//! Load-time expression compilation.
//!
//! The builder resolves function and datatype identifiers, parses literal
//! values, checks arity and static types against function signatures,
//! links variable references to previously defined variables, and enforces
//! the variable-reference depth limit. Everything it rejects is a fatal
//! configuration error; nothing it accepts can fail a type check at
//! evaluation time.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::{Apply, Designator, Expression, HigherOrderApply, Selector, VariableRef};
use crate::config::PdpConfig;
use crate::context::SelectorPath;
use crate::doc;
use crate::function::FunctionRegistry;
use crate::value::{AttributeValue, Datatype, DatatypeRegistry, ValueError, ValueType};

/// Errors raised while compiling an expression tree.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExprError {
    /// A function id is not in the registry.
    #[error("unknown function: {id}")]
    UnknownFunction {
        /// The unresolved id.
        id: String,
    },

    /// A literal failed to parse, or a datatype is unknown.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// An argument list does not fit the function signature.
    #[error("type mismatch: {detail}")]
    TypeMismatch {
        /// Signature-mismatch description.
        detail: String,
    },

    /// A `<Function>` reference appeared outside a higher-order apply.
    #[error("function reference {id} is only valid as a higher-order function argument")]
    FunctionRefOutsideHigherOrder {
        /// The referenced function id.
        id: String,
    },

    /// A higher-order application is malformed.
    #[error("higher-order function {id}: {detail}")]
    HigherOrder {
        /// The higher-order function id.
        id: String,
        /// What is wrong with the application.
        detail: String,
    },

    /// A variable reference names no earlier definition.
    #[error("undefined variable: {id}")]
    UnknownVariable {
        /// The unresolved variable id.
        id: String,
    },

    /// A variable id was defined twice in one policy.
    #[error("duplicate variable definition: {id}")]
    DuplicateVariable {
        /// The duplicated variable id.
        id: String,
    },

    /// Variable references nest deeper than the configured bound.
    #[error("variable {id} exceeds the reference depth limit of {max}")]
    VariableDepthExceeded {
        /// The offending variable id.
        id: String,
        /// The configured limit.
        max: usize,
    },

    /// A selector path failed to parse.
    #[error("invalid selector path '{path}': {reason}")]
    InvalidSelectorPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An expression used where a boolean condition is required.
    #[error("condition has type {actual}, expected boolean")]
    ConditionNotBoolean {
        /// The actual static type.
        actual: String,
    },
}

struct VariableEntry {
    expression: Arc<Expression>,
    return_type: ValueType,
    depth: usize,
}

/// Compiles [`doc::Expression`] trees into typed [`Expression`]s.
///
/// One builder is scoped to one policy: variable definitions registered
/// through [`ExpressionBuilder::define_variable`] resolve in document
/// order, so a reference to a variable defined later (or never) is a load
/// error, which also rules out definition cycles.
pub struct ExpressionBuilder<'a> {
    functions: &'a FunctionRegistry,
    datatypes: &'a DatatypeRegistry,
    config: &'a PdpConfig,
    variables: HashMap<String, VariableEntry>,
}

impl<'a> ExpressionBuilder<'a> {
    /// A builder over frozen registries.
    pub fn new(
        functions: &'a FunctionRegistry,
        datatypes: &'a DatatypeRegistry,
        config: &'a PdpConfig,
    ) -> Self {
        Self { functions, datatypes, config, variables: HashMap::new() }
    }

    /// Registers a variable definition, compiling its expression.
    ///
    /// # Errors
    ///
    /// Duplicate ids, unresolvable content, or a definition whose variable
    /// reference chain exceeds the configured depth.
    pub fn define_variable(&mut self, definition: &doc::VariableDefinition) -> Result<(), ExprError> {
        if self.variables.contains_key(&definition.id) {
            return Err(ExprError::DuplicateVariable { id: definition.id.clone() });
        }
        let expression = self.build(&definition.expression)?;
        let depth = expression.variable_depth();
        if let Some(max) = self.config.max_variable_ref_depth {
            if depth > max {
                return Err(ExprError::VariableDepthExceeded { id: definition.id.clone(), max });
            }
        }
        let return_type = expression.return_type();
        self.variables.insert(definition.id.clone(), VariableEntry {
            expression: Arc::new(expression),
            return_type,
            depth,
        });
        Ok(())
    }

    /// Compiles an expression tree.
    pub fn build(&self, node: &doc::Expression) -> Result<Expression, ExprError> {
        match node {
            doc::Expression::Value(literal) => self.build_literal(literal).map(Expression::Literal),
            doc::Expression::Designator(designator) => {
                self.build_designator(designator).map(Expression::Designator)
            }
            doc::Expression::Selector(selector) => {
                self.build_selector(selector).map(Expression::Selector)
            }
            doc::Expression::VariableReference { id } => self.build_variable_ref(id),
            doc::Expression::Function { id } => {
                Err(ExprError::FunctionRefOutsideHigherOrder { id: id.clone() })
            }
            doc::Expression::Apply { function_id, args } => self.build_apply(function_id, args),
        }
    }

    /// Compiles an expression and insists on a single boolean result, the
    /// shape conditions require.
    pub fn build_boolean(&self, node: &doc::Expression) -> Result<Expression, ExprError> {
        let expression = self.build(node)?;
        let return_type = expression.return_type();
        if return_type == ValueType::value(Datatype::Boolean) {
            Ok(expression)
        } else {
            Err(ExprError::ConditionNotBoolean { actual: return_type.to_string() })
        }
    }

    pub(crate) fn build_literal(&self, literal: &doc::LiteralValue) -> Result<AttributeValue, ExprError> {
        let datatype = self.datatypes.resolve(&literal.datatype)?;
        Ok(AttributeValue::parse(&datatype, &literal.value)?)
    }

    pub(crate) fn build_designator(
        &self,
        designator: &doc::AttributeDesignator,
    ) -> Result<Designator, ExprError> {
        let datatype = self.datatypes.resolve(&designator.datatype)?;
        Ok(Designator {
            category: designator.category.clone(),
            attribute_id: designator.attribute_id.clone(),
            issuer: designator.issuer.clone(),
            datatype,
            must_be_present: designator.must_be_present,
        })
    }

    pub(crate) fn build_selector(
        &self,
        selector: &doc::AttributeSelector,
    ) -> Result<Selector, ExprError> {
        let datatype = self.datatypes.resolve(&selector.datatype)?;
        let path = SelectorPath::parse(&selector.path, self.config.extended_selector_paths)
            .map_err(|reason| ExprError::InvalidSelectorPath {
                path: selector.path.clone(),
                reason,
            })?;
        Ok(Selector {
            category: selector.category.clone(),
            path,
            path_text: selector.path.clone(),
            datatype,
            must_be_present: selector.must_be_present,
        })
    }

    fn build_variable_ref(&self, id: &str) -> Result<Expression, ExprError> {
        let entry = self
            .variables
            .get(id)
            .ok_or_else(|| ExprError::UnknownVariable { id: id.to_string() })?;
        let depth = entry.depth + 1;
        if let Some(max) = self.config.max_variable_ref_depth {
            if depth > max {
                return Err(ExprError::VariableDepthExceeded { id: id.to_string(), max });
            }
        }
        Ok(Expression::VariableRef(VariableRef {
            id: id.to_string(),
            definition: Arc::clone(&entry.expression),
            return_type: entry.return_type.clone(),
            depth,
        }))
    }

    fn build_apply(
        &self,
        function_id: &str,
        args: &[doc::Expression],
    ) -> Result<Expression, ExprError> {
        if let Some(kind) = self.functions.higher_order(function_id) {
            return self.build_higher_order(function_id, kind, args);
        }

        let function = self
            .functions
            .get(function_id)
            .ok_or_else(|| ExprError::UnknownFunction { id: function_id.to_string() })?;

        let compiled: Vec<Expression> = args.iter().map(|arg| self.build(arg)).collect::<Result<_, _>>()?;
        let arg_types: Vec<ValueType> = compiled.iter().map(Expression::return_type).collect();
        function
            .signature()
            .check_args(&arg_types)
            .map_err(|detail| ExprError::TypeMismatch { detail })?;

        Ok(Expression::Apply(Apply { function: Arc::clone(function), args: compiled }))
    }

    fn build_higher_order(
        &self,
        id: &str,
        kind: crate::function::HigherOrderKind,
        args: &[doc::Expression],
    ) -> Result<Expression, ExprError> {
        let Some((doc::Expression::Function { id: inner_id }, rest)) = args.split_first() else {
            return Err(ExprError::HigherOrder {
                id: id.to_string(),
                detail: "first argument must be a function reference".to_string(),
            });
        };
        let function = self
            .functions
            .get(inner_id)
            .ok_or_else(|| ExprError::UnknownFunction { id: inner_id.clone() })?;

        let compiled: Vec<Expression> = rest.iter().map(|arg| self.build(arg)).collect::<Result<_, _>>()?;
        let arg_types: Vec<ValueType> = compiled.iter().map(Expression::return_type).collect();
        let return_type = kind
            .check(function.signature(), &arg_types)
            .map_err(|detail| ExprError::HigherOrder { id: id.to_string(), detail })?;

        Ok(Expression::HigherOrderApply(HigherOrderApply {
            kind,
            function: Arc::clone(function),
            args: compiled,
            return_type,
        }))
    }
}
