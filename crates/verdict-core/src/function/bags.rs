//! The bag function family, registered once per datatype:
//! `{type}-one-and-only`, `{type}-bag-size`, `{type}-is-in`, `{type}-bag`.

use super::{
    argument_error, bag_arg, boolean_result, family_prefix, value_arg, FunctionRegistry,
    FunctionSignature,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Bag, Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    for datatype in Datatype::STANDARD {
        let prefix = family_prefix(&datatype);
        let name = datatype.short_name();
        let value = || ValueType::value(datatype.clone());
        let bag = || ValueType::bag(datatype.clone());

        registry.add(
            FunctionSignature::new(format!("{prefix}{name}-one-and-only"), value(), vec![bag()]),
            one_and_only,
        );
        registry.add(
            FunctionSignature::new(
                format!("{prefix}{name}-bag-size"),
                ValueType::value(Datatype::Integer),
                vec![bag()],
            ),
            bag_size,
        );
        registry.add(
            FunctionSignature::new(
                format!("{prefix}{name}-is-in"),
                ValueType::value(Datatype::Boolean),
                vec![value(), bag()],
            ),
            is_in,
        );
        registry.add(
            FunctionSignature::varargs(format!("{prefix}{name}-bag"), bag(), vec![value()]),
            make_bag,
        );
    }
}

/// The single element of a one-element bag. An empty bag reports
/// `missing-attribute` (an empty designator result is how a missing
/// attribute reaches this wrapper); a larger bag is a processing error.
fn one_and_only(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let bag = bag_arg(signature, args, 0)?;
    match bag.len() {
        1 => Ok(Evaluated::Value(bag.iter().next().cloned().ok_or_else(|| {
            argument_error(signature, "bag changed size during read")
        })?)),
        0 => Err(Status::missing_attribute(format!(
            "{}: expected exactly one value, got an empty bag",
            signature.id()
        ))),
        n => Err(argument_error(signature, format_args!("expected exactly one value, got {n}"))),
    }
}

fn bag_size(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let bag = bag_arg(signature, args, 0)?;
    let size = i64::try_from(bag.len())
        .map_err(|_| argument_error(signature, "bag size out of range"))?;
    Ok(Evaluated::Value(AttributeValue::integer(size)))
}

fn is_in(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let value = value_arg(signature, args, 0)?;
    let bag = bag_arg(signature, args, 1)?;
    boolean_result(bag.contains(value))
}

/// Collects the arguments into a bag of the declared element datatype.
fn make_bag(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let datatype = signature.return_type().datatype.clone();
    let mut values = Vec::with_capacity(args.len());
    for position in 0..args.len() {
        values.push(value_arg(signature, args, position)?.clone());
    }
    Bag::of(datatype, values)
        .map(Evaluated::Bag)
        .map_err(|e| argument_error(signature, e))
}
