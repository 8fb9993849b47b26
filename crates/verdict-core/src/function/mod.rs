//! The function registry and the standard XACML 3.0 function library.
//!
//! Implementations are value-level: they receive the ordered list of
//! already-evaluated argument results plus the evaluation context, and
//! return a value, a bag, or a [`Status`] error. Arity and static types are
//! checked at load time against the [`FunctionSignature`], so evaluation
//! only surfaces runtime semantic errors (overflow, division by zero,
//! one-and-only cardinality, regex compilation, …).
//!
//! Higher-order functions (`any-of`, `all-of`, `map`, …) are not
//! first-order entries; the expression builder resolves them to a
//! [`HigherOrderKind`] and applies the referenced first-order function
//! per element, short-circuiting where the standard mandates.
//!
//! The registry is closed once the engine is frozen; custom functions are
//! added before that through [`FunctionRegistry::register`].

mod arithmetic;
mod bags;
mod comparison;
mod equality;
mod higher_order;
mod logical;
mod regexp;
mod sets;
mod signature;
mod strings;
mod temporal;

pub use higher_order::HigherOrderKind;
pub use signature::FunctionSignature;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{Datatype, ValueType};

/// XACML 1.0 function identifier prefix.
pub const XACML_1_0_FUNCTION: &str = "urn:oasis:names:tc:xacml:1.0:function:";
/// XACML 2.0 function identifier prefix.
pub const XACML_2_0_FUNCTION: &str = "urn:oasis:names:tc:xacml:2.0:function:";
/// XACML 3.0 function identifier prefix.
pub const XACML_3_0_FUNCTION: &str = "urn:oasis:names:tc:xacml:3.0:function:";

/// The evaluation entry point of a first-order function.
///
/// The signature is passed back in so one generic implementation can serve
/// a whole datatype family (the bag and set functions are registered once
/// per datatype with the same function pointer).
pub type FunctionEval =
    fn(&FunctionSignature, &[Evaluated], &EvaluationContext<'_>) -> Result<Evaluated, Status>;

/// A first-order function: a signature plus its evaluator.
pub struct FirstOrderFunction {
    signature: FunctionSignature,
    eval: FunctionEval,
}

impl FirstOrderFunction {
    /// Pairs a signature with its evaluator.
    pub const fn new(signature: FunctionSignature, eval: FunctionEval) -> Self {
        Self { signature, eval }
    }

    /// The function identifier.
    pub fn id(&self) -> &str {
        self.signature.id()
    }

    /// The signature.
    pub const fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// Applies the function to already-evaluated arguments.
    pub fn invoke(
        &self,
        args: &[Evaluated],
        ctx: &EvaluationContext<'_>,
    ) -> Result<Evaluated, Status> {
        (self.eval)(&self.signature, args, ctx)
    }
}

impl std::fmt::Debug for FirstOrderFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstOrderFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Registry registration errors.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The identifier is already taken.
    #[error("function already registered: {id}")]
    Duplicate {
        /// The duplicated function id.
        id: String,
    },
}

/// The function registry: function id → implementation, plus the
/// higher-order function table.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FirstOrderFunction>>,
    higher_order: HashMap<String, HigherOrderKind>,
}

impl FunctionRegistry {
    /// A registry with no functions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry pre-populated with the standard XACML 3.0 functions.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        equality::register(&mut registry);
        arithmetic::register(&mut registry);
        comparison::register(&mut registry);
        logical::register(&mut registry);
        bags::register(&mut registry);
        sets::register(&mut registry);
        strings::register(&mut registry);
        temporal::register(&mut registry);
        regexp::register(&mut registry);
        higher_order::register(&mut registry);
        registry
    }

    /// Registers a custom first-order function.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] when the id is already present.
    pub fn register(&mut self, function: FirstOrderFunction) -> Result<(), RegistryError> {
        let id = function.id().to_string();
        if self.functions.contains_key(&id) || self.higher_order.contains_key(&id) {
            return Err(RegistryError::Duplicate { id });
        }
        self.functions.insert(id, Arc::new(function));
        Ok(())
    }

    /// Looks up a first-order function.
    pub fn get(&self, id: &str) -> Option<&Arc<FirstOrderFunction>> {
        self.functions.get(id)
    }

    /// Looks up a higher-order function.
    pub fn higher_order(&self, id: &str) -> Option<HigherOrderKind> {
        self.higher_order.get(id).copied()
    }

    /// Number of registered first-order functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when no first-order function is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Standard-set registration: ids are distinct by construction, so this
    /// inserts without the duplicate check.
    fn add(&mut self, signature: FunctionSignature, eval: FunctionEval) {
        let function = FirstOrderFunction::new(signature, eval);
        self.functions.insert(function.id().to_string(), Arc::new(function));
    }

    fn add_higher_order(&mut self, id: String, kind: HigherOrderKind) {
        self.higher_order.insert(id, kind);
    }
}

// ============================================================================
// Shared argument accessors for implementations
// ============================================================================

/// The datatypes that carry the classic 1.0 function families (equality,
/// bag, set), paired with the prefix their function ids use.
fn family_prefix(datatype: &Datatype) -> &'static str {
    match datatype {
        Datatype::YearMonthDuration | Datatype::DayTimeDuration => XACML_3_0_FUNCTION,
        Datatype::DnsName | Datatype::IpAddress => XACML_2_0_FUNCTION,
        _ => XACML_1_0_FUNCTION,
    }
}

fn argument_error(signature: &FunctionSignature, detail: impl std::fmt::Display) -> Status {
    Status::processing_error(format!("{}: {detail}", signature.id()))
}

fn value_arg<'a>(
    signature: &FunctionSignature,
    args: &'a [Evaluated],
    position: usize,
) -> Result<&'a crate::value::AttributeValue, Status> {
    match args.get(position) {
        Some(Evaluated::Value(value)) => Ok(value),
        _ => Err(argument_error(signature, format_args!("argument {position} is not a single value"))),
    }
}

fn bag_arg<'a>(
    signature: &FunctionSignature,
    args: &'a [Evaluated],
    position: usize,
) -> Result<&'a crate::value::Bag, Status> {
    match args.get(position) {
        Some(Evaluated::Bag(bag)) => Ok(bag),
        _ => Err(argument_error(signature, format_args!("argument {position} is not a bag"))),
    }
}

fn bool_arg(signature: &FunctionSignature, args: &[Evaluated], position: usize) -> Result<bool, Status> {
    value_arg(signature, args, position)?
        .as_bool()
        .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not a boolean")))
}

fn integer_arg(signature: &FunctionSignature, args: &[Evaluated], position: usize) -> Result<i64, Status> {
    value_arg(signature, args, position)?
        .as_integer()
        .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not an integer")))
}

fn double_arg(signature: &FunctionSignature, args: &[Evaluated], position: usize) -> Result<f64, Status> {
    value_arg(signature, args, position)?
        .as_double()
        .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not a double")))
}

fn string_arg<'a>(
    signature: &FunctionSignature,
    args: &'a [Evaluated],
    position: usize,
) -> Result<&'a str, Status> {
    value_arg(signature, args, position)?
        .as_str()
        .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not a string")))
}

fn boolean_result(value: bool) -> Result<Evaluated, Status> {
    Ok(Evaluated::Value(crate::value::AttributeValue::boolean(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_core_functions() {
        let registry = FunctionRegistry::standard();
        for id in [
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "urn:oasis:names:tc:xacml:1.0:function:integer-add",
            "urn:oasis:names:tc:xacml:1.0:function:integer-one-and-only",
            "urn:oasis:names:tc:xacml:1.0:function:and",
            "urn:oasis:names:tc:xacml:2.0:function:string-concatenate",
            "urn:oasis:names:tc:xacml:3.0:function:dayTimeDuration-equal",
            "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match",
            "urn:oasis:names:tc:xacml:3.0:function:string-contains",
        ] {
            assert!(registry.get(id).is_some(), "missing {id}");
        }
        assert!(registry
            .higher_order("urn:oasis:names:tc:xacml:3.0:function:any-of")
            .is_some());
    }

    #[test]
    fn custom_registration_rejects_duplicates() {
        let mut registry = FunctionRegistry::standard();
        let custom = || {
            FirstOrderFunction::new(
                FunctionSignature::new(
                    "urn:example:function:noop",
                    ValueType::value(Datatype::Boolean),
                    vec![],
                ),
                |_, _, _| boolean_result(true),
            )
        };
        registry.register(custom()).unwrap();
        assert!(matches!(
            registry.register(custom()),
            Err(RegistryError::Duplicate { .. })
        ));

        let clash = FirstOrderFunction::new(
            FunctionSignature::new(
                "urn:oasis:names:tc:xacml:3.0:function:any-of",
                ValueType::value(Datatype::Boolean),
                vec![],
            ),
            |_, _, _| boolean_result(true),
        );
        assert!(matches!(registry.register(clash), Err(RegistryError::Duplicate { .. })));
    }
}
