//! Higher-order functions: `any-of`, `all-of`, `any-of-any`, `all-of-any`,
//! `any-of-all`, `all-of-all`, and `map`.
//!
//! A higher-order application carries a first-order function handle plus a
//! mix of single values and bags; the combinator re-enters the function
//! once per element (or element combination). Quantifiers short-circuit on
//! their decisive value; an element that evaluates to an error is deferred
//! and only surfaced if no short-circuit value is found.

use super::{FirstOrderFunction, FunctionRegistry, FunctionSignature, XACML_1_0_FUNCTION, XACML_3_0_FUNCTION};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Bag, Datatype, ValueType};

/// The higher-order combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HigherOrderKind {
    /// True if the predicate holds for some element of the one bag.
    AnyOf,
    /// True if the predicate holds for every element of the one bag.
    AllOf,
    /// True if the predicate holds for some combination of elements, one
    /// from each bag.
    AnyOfAny,
    /// True if for every element of the first bag the predicate holds for
    /// some element of the second.
    AllOfAny,
    /// True if for some element of the first bag the predicate holds for
    /// every element of the second.
    AnyOfAll,
    /// True if the predicate holds for every pair of elements.
    AllOfAll,
    /// Applies the function to each element of the one bag, yielding the
    /// bag of results.
    Map,
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add_higher_order(format!("{XACML_3_0_FUNCTION}any-of"), HigherOrderKind::AnyOf);
    registry.add_higher_order(format!("{XACML_3_0_FUNCTION}all-of"), HigherOrderKind::AllOf);
    registry.add_higher_order(format!("{XACML_3_0_FUNCTION}any-of-any"), HigherOrderKind::AnyOfAny);
    registry.add_higher_order(format!("{XACML_1_0_FUNCTION}all-of-any"), HigherOrderKind::AllOfAny);
    registry.add_higher_order(format!("{XACML_1_0_FUNCTION}any-of-all"), HigherOrderKind::AnyOfAll);
    registry.add_higher_order(format!("{XACML_1_0_FUNCTION}all-of-all"), HigherOrderKind::AllOfAll);
    registry.add_higher_order(format!("{XACML_3_0_FUNCTION}map"), HigherOrderKind::Map);
}

impl HigherOrderKind {
    /// Load-time type check: validates the argument shapes against the
    /// referenced function's signature and returns the application's
    /// static type.
    ///
    /// # Errors
    ///
    /// A human-readable mismatch description for the expression builder to
    /// wrap.
    pub fn check(self, function: &FunctionSignature, args: &[ValueType]) -> Result<ValueType, String> {
        let bags = args.iter().filter(|t| t.is_bag).count();
        let effective: Vec<ValueType> = args
            .iter()
            .map(|t| ValueType::value(t.datatype.clone()))
            .collect();

        match self {
            Self::AnyOf | Self::AllOf => {
                Self::require_boolean(function)?;
                if bags != 1 {
                    return Err(format!("expected exactly one bag argument, got {bags}"));
                }
                function.check_args(&effective)?;
                Ok(ValueType::value(Datatype::Boolean))
            }
            Self::AnyOfAny => {
                Self::require_boolean(function)?;
                if bags == 0 {
                    return Err("expected at least one bag argument".to_string());
                }
                function.check_args(&effective)?;
                Ok(ValueType::value(Datatype::Boolean))
            }
            Self::AllOfAny | Self::AnyOfAll | Self::AllOfAll => {
                Self::require_boolean(function)?;
                if args.len() != 2 || bags != 2 {
                    return Err("expected exactly two bag arguments".to_string());
                }
                function.check_args(&effective)?;
                Ok(ValueType::value(Datatype::Boolean))
            }
            Self::Map => {
                if function.return_type().is_bag {
                    return Err("map requires a function returning a single value".to_string());
                }
                if bags != 1 {
                    return Err(format!("expected exactly one bag argument, got {bags}"));
                }
                function.check_args(&effective)?;
                Ok(ValueType::bag(function.return_type().datatype.clone()))
            }
        }
    }

    /// Applies the combinator over already-evaluated arguments.
    pub fn apply(
        self,
        function: &FirstOrderFunction,
        args: &[Evaluated],
        ctx: &EvaluationContext<'_>,
    ) -> Result<Evaluated, Status> {
        match self {
            Self::AnyOf | Self::AnyOfAny => quantify(function, args, ctx, true),
            Self::AllOf | Self::AllOfAll => quantify(function, args, ctx, false),
            Self::AllOfAny => nested(function, args, ctx, false, true),
            Self::AnyOfAll => nested(function, args, ctx, true, false),
            Self::Map => map(function, args, ctx),
        }
    }

    fn require_boolean(function: &FunctionSignature) -> Result<(), String> {
        if *function.return_type() == ValueType::value(Datatype::Boolean) {
            Ok(())
        } else {
            Err(format!("{} does not return boolean", function.id()))
        }
    }
}

/// Positions of the bag arguments, with their bags.
fn bag_positions<'a>(args: &'a [Evaluated]) -> Vec<(usize, &'a Bag)> {
    args.iter()
        .enumerate()
        .filter_map(|(position, arg)| match arg {
            Evaluated::Bag(bag) => Some((position, bag)),
            Evaluated::Value(_) => None,
        })
        .collect()
}

fn invoke_with(
    function: &FirstOrderFunction,
    args: &[Evaluated],
    substitutions: &[(usize, &AttributeValue)],
    ctx: &EvaluationContext<'_>,
) -> Result<bool, Status> {
    let mut call_args: Vec<Evaluated> = args.to_vec();
    for (position, value) in substitutions {
        call_args[*position] = Evaluated::Value((*value).clone());
    }
    match function.invoke(&call_args, ctx)? {
        Evaluated::Value(value) => value.as_bool().ok_or_else(|| {
            Status::processing_error(format!("{} did not return a boolean", function.id()))
        }),
        Evaluated::Bag(_) => Err(Status::processing_error(format!(
            "{} returned a bag inside a quantifier",
            function.id()
        ))),
    }
}

/// Existential (`short_circuit = true`) or universal quantification over
/// the cartesian product of every bag argument. Covers `any-of`, `all-of`,
/// `any-of-any`, and `all-of-all`.
fn quantify(
    function: &FirstOrderFunction,
    args: &[Evaluated],
    ctx: &EvaluationContext<'_>,
    short_circuit: bool,
) -> Result<Evaluated, Status> {
    let bags = bag_positions(args);
    let mut deferred: Option<Status> = None;
    let mut combination = vec![0usize; bags.len()];

    'product: loop {
        let substitutions: Vec<(usize, &AttributeValue)> = bags
            .iter()
            .zip(&combination)
            .filter_map(|((position, bag), index)| {
                bag.iter().nth(*index).map(|value| (*position, value))
            })
            .collect();
        // An empty bag yields an empty product: skip straight to the end.
        if substitutions.len() == bags.len() {
            match invoke_with(function, args, &substitutions, ctx) {
                Ok(value) if value == short_circuit => {
                    return Ok(Evaluated::Value(AttributeValue::boolean(short_circuit)));
                }
                Ok(_) => {}
                Err(status) => {
                    deferred.get_or_insert(status);
                }
            }
        } else if !bags.iter().all(|(_, bag)| !bag.is_empty()) {
            break 'product;
        }

        // Advance the mixed-radix combination counter.
        let mut slot = bags.len();
        loop {
            if slot == 0 {
                break 'product;
            }
            slot -= 1;
            combination[slot] += 1;
            if combination[slot] < bags[slot].1.len() {
                break;
            }
            combination[slot] = 0;
        }
    }

    match deferred {
        Some(status) => Err(status),
        None => Ok(Evaluated::Value(AttributeValue::boolean(!short_circuit))),
    }
}

/// The two-bag nested quantifiers: outer over the first bag, inner over
/// the second. `outer_short` is the value that resolves the outer
/// quantifier immediately; `inner_short` the inner one.
fn nested(
    function: &FirstOrderFunction,
    args: &[Evaluated],
    ctx: &EvaluationContext<'_>,
    outer_short: bool,
    inner_short: bool,
) -> Result<Evaluated, Status> {
    let bags = bag_positions(args);
    let [(outer_position, outer_bag), (inner_position, inner_bag)] = bags[..] else {
        return Err(Status::processing_error(format!(
            "{} quantifier expects two bags",
            function.id()
        )));
    };

    let mut outer_deferred: Option<Status> = None;
    for outer_value in outer_bag {
        let mut inner_deferred: Option<Status> = None;
        let mut inner_result = !inner_short;
        for inner_value in inner_bag {
            match invoke_with(
                function,
                args,
                &[(outer_position, outer_value), (inner_position, inner_value)],
                ctx,
            ) {
                Ok(value) if value == inner_short => {
                    inner_result = inner_short;
                    inner_deferred = None;
                    break;
                }
                Ok(_) => {}
                Err(status) => {
                    inner_deferred.get_or_insert(status);
                }
            }
        }

        if let Some(status) = inner_deferred {
            outer_deferred.get_or_insert(status);
        } else if inner_result == outer_short {
            return Ok(Evaluated::Value(AttributeValue::boolean(outer_short)));
        }
    }

    match outer_deferred {
        Some(status) => Err(status),
        None => Ok(Evaluated::Value(AttributeValue::boolean(!outer_short))),
    }
}

/// `map`: applies the function to each element of the one bag, collecting
/// results. Errors are not deferrable here; the first one surfaces.
fn map(
    function: &FirstOrderFunction,
    args: &[Evaluated],
    ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let bags = bag_positions(args);
    let [(position, bag)] = bags[..] else {
        return Err(Status::processing_error(format!(
            "{} map expects one bag",
            function.id()
        )));
    };

    let mut results = Vec::with_capacity(bag.len());
    for element in bag {
        let mut call_args: Vec<Evaluated> = args.to_vec();
        call_args[position] = Evaluated::Value(element.clone());
        match function.invoke(&call_args, ctx)? {
            Evaluated::Value(value) => results.push(value),
            Evaluated::Bag(_) => {
                return Err(Status::processing_error(format!(
                    "{} returned a bag inside map",
                    function.id()
                )))
            }
        }
    }
    Bag::of(function.signature().return_type().datatype.clone(), results)
        .map(Evaluated::Bag)
        .map_err(|e| Status::processing_error(e.to_string()))
}
