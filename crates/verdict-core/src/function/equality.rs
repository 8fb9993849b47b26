//! Equality predicates and the special name-match functions.

use super::{
    boolean_result, family_prefix, string_arg, value_arg, FunctionRegistry, FunctionSignature,
    XACML_1_0_FUNCTION, XACML_3_0_FUNCTION,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    // {type}-equal across every standard datatype. One implementation
    // serves them all: arguments were type-checked at load time and
    // AttributeValue equality is datatype-specific.
    for datatype in Datatype::STANDARD {
        let id = format!("{}{}-equal", family_prefix(&datatype), datatype.short_name());
        registry.add(
            FunctionSignature::new(
                id,
                ValueType::value(Datatype::Boolean),
                vec![ValueType::value(datatype.clone()), ValueType::value(datatype.clone())],
            ),
            value_equal,
        );
    }

    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}string-equal-ignore-case"),
            ValueType::value(Datatype::Boolean),
            vec![ValueType::value(Datatype::String), ValueType::value(Datatype::String)],
        ),
        string_equal_ignore_case,
    );

    registry.add(
        FunctionSignature::new(
            format!("{XACML_1_0_FUNCTION}x500Name-match"),
            ValueType::value(Datatype::Boolean),
            vec![ValueType::value(Datatype::X500Name), ValueType::value(Datatype::X500Name)],
        ),
        x500_name_match,
    );

    registry.add(
        FunctionSignature::new(
            format!("{XACML_1_0_FUNCTION}rfc822Name-match"),
            ValueType::value(Datatype::Boolean),
            vec![ValueType::value(Datatype::String), ValueType::value(Datatype::Rfc822Name)],
        ),
        rfc822_name_match,
    );
}

fn value_equal(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let left = value_arg(signature, args, 0)?;
    let right = value_arg(signature, args, 1)?;
    boolean_result(left == right)
}

fn string_equal_ignore_case(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let left = string_arg(signature, args, 0)?;
    let right = string_arg(signature, args, 1)?;
    boolean_result(left.to_lowercase() == right.to_lowercase())
}

/// `x500Name-match(a, b)`: true when `a` is a terminal RDN sequence of `b`.
fn x500_name_match(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let wanted = value_arg(signature, args, 0)?
        .as_x500_name()
        .ok_or_else(|| super::argument_error(signature, "argument 0 is not an x500Name"))?;
    let candidate = value_arg(signature, args, 1)?
        .as_x500_name()
        .ok_or_else(|| super::argument_error(signature, "argument 1 is not an x500Name"))?;
    boolean_result(wanted.is_terminal_sequence_of(candidate))
}

/// `rfc822Name-match(pattern, name)`: full address, whole domain, or domain
/// suffix matching.
fn rfc822_name_match(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let pattern = string_arg(signature, args, 0)?;
    let name = value_arg(signature, args, 1)?
        .as_rfc822_name()
        .ok_or_else(|| super::argument_error(signature, "argument 1 is not an rfc822Name"))?;
    boolean_result(name.matches(pattern))
}
