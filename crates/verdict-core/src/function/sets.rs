//! The set-theoretic bag family, registered once per datatype:
//! `{type}-intersection`, `{type}-union`, `{type}-at-least-one-member-of`,
//! `{type}-subset`, `{type}-set-equals`.
//!
//! These treat bags as sets: results carry no duplicates.

use super::{bag_arg, boolean_result, family_prefix, FunctionRegistry, FunctionSignature};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{Bag, Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    for datatype in Datatype::STANDARD {
        let prefix = family_prefix(&datatype);
        let name = datatype.short_name();
        let bag = || ValueType::bag(datatype.clone());
        let boolean = || ValueType::value(Datatype::Boolean);

        registry.add(
            FunctionSignature::new(format!("{prefix}{name}-intersection"), bag(), vec![bag(), bag()]),
            intersection,
        );
        registry.add(
            FunctionSignature::new(format!("{prefix}{name}-union"), bag(), vec![bag(), bag()]),
            union,
        );
        registry.add(
            FunctionSignature::new(
                format!("{prefix}{name}-at-least-one-member-of"),
                boolean(),
                vec![bag(), bag()],
            ),
            at_least_one_member_of,
        );
        registry.add(
            FunctionSignature::new(format!("{prefix}{name}-subset"), boolean(), vec![bag(), bag()]),
            subset,
        );
        registry.add(
            FunctionSignature::new(format!("{prefix}{name}-set-equals"), boolean(), vec![bag(), bag()]),
            set_equals,
        );
    }
}

fn pair<'a>(
    signature: &FunctionSignature,
    args: &'a [Evaluated],
) -> Result<(&'a Bag, &'a Bag), Status> {
    Ok((bag_arg(signature, args, 0)?, bag_arg(signature, args, 1)?))
}

fn collect(
    signature: &FunctionSignature,
    datatype: Datatype,
    values: Vec<crate::value::AttributeValue>,
) -> Result<Evaluated, Status> {
    Bag::of(datatype, values)
        .map(Evaluated::Bag)
        .map_err(|e| super::argument_error(signature, e))
}

fn intersection(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let (left, right) = pair(signature, args)?;
    let values = left
        .unique()
        .into_iter()
        .filter(|value| right.contains(value))
        .cloned()
        .collect();
    collect(signature, left.datatype().clone(), values)
}

fn union(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let (left, right) = pair(signature, args)?;
    let mut values: Vec<_> = left.unique().into_iter().cloned().collect();
    for value in right.unique() {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
    collect(signature, left.datatype().clone(), values)
}

fn at_least_one_member_of(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let (left, right) = pair(signature, args)?;
    boolean_result(left.iter().any(|value| right.contains(value)))
}

fn subset(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let (left, right) = pair(signature, args)?;
    boolean_result(left.iter().all(|value| right.contains(value)))
}

fn set_equals(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let (left, right) = pair(signature, args)?;
    let subset_lr = left.iter().all(|value| right.contains(value));
    let subset_rl = right.iter().all(|value| left.contains(value));
    boolean_result(subset_lr && subset_rl)
}
