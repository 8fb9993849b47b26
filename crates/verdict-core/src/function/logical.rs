//! Boolean connectives: and, or, n-of, not.

use super::{
    argument_error, bool_arg, boolean_result, integer_arg, FunctionRegistry, FunctionSignature,
    XACML_1_0_FUNCTION,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    let boolean = || ValueType::value(Datatype::Boolean);

    registry.add(
        FunctionSignature::varargs(format!("{XACML_1_0_FUNCTION}and"), boolean(), vec![boolean()]),
        and,
    );
    registry.add(
        FunctionSignature::varargs(format!("{XACML_1_0_FUNCTION}or"), boolean(), vec![boolean()]),
        or,
    );
    registry.add(
        FunctionSignature::varargs(
            format!("{XACML_1_0_FUNCTION}n-of"),
            boolean(),
            vec![ValueType::value(Datatype::Integer), boolean()],
        ),
        n_of,
    );
    registry.add(
        FunctionSignature::new(format!("{XACML_1_0_FUNCTION}not"), boolean(), vec![boolean()]),
        not,
    );
}

/// `and()` of zero arguments is true.
fn and(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    for position in 0..args.len() {
        if !bool_arg(signature, args, position)? {
            return boolean_result(false);
        }
    }
    boolean_result(true)
}

/// `or()` of zero arguments is false.
fn or(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    for position in 0..args.len() {
        if bool_arg(signature, args, position)? {
            return boolean_result(true);
        }
    }
    boolean_result(false)
}

/// `n-of(n, b...)`: at least `n` of the booleans are true. Requiring more
/// truths than there are arguments is a processing error.
fn n_of(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let required = integer_arg(signature, args, 0)?;
    if required <= 0 {
        return boolean_result(true);
    }
    let candidates = args.len() - 1;
    let required = usize::try_from(required)
        .map_err(|_| argument_error(signature, "threshold out of range"))?;
    if required > candidates {
        return Err(argument_error(
            signature,
            format_args!("threshold {required} exceeds {candidates} arguments"),
        ));
    }

    let mut seen = 0usize;
    for position in 1..args.len() {
        if bool_arg(signature, args, position)? {
            seen += 1;
            if seen >= required {
                return boolean_result(true);
            }
        }
    }
    boolean_result(false)
}

fn not(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    boolean_result(!bool_arg(signature, args, 0)?)
}
