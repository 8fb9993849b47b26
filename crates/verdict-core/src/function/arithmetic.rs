//! Numeric arithmetic and conversion functions.
//!
//! Integer arithmetic is checked: overflow, division by zero, and a
//! non-representable double-to-integer conversion are processing errors,
//! never wraps or panics.

use super::{
    argument_error, double_arg, integer_arg, FunctionRegistry, FunctionSignature, XACML_1_0_FUNCTION,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    let integer = || ValueType::value(Datatype::Integer);
    let double = || ValueType::value(Datatype::Double);

    let int_variadic = |name: &str, eval: super::FunctionEval| {
        (
            FunctionSignature::varargs(
                format!("{XACML_1_0_FUNCTION}{name}"),
                integer(),
                vec![integer(), integer()],
            ),
            eval,
        )
    };
    let entries: Vec<(FunctionSignature, super::FunctionEval)> = vec![
        int_variadic("integer-add", integer_add),
        int_variadic("integer-multiply", integer_multiply),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}integer-subtract"),
                integer(),
                vec![integer(), integer()],
            ),
            integer_subtract,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}integer-divide"),
                integer(),
                vec![integer(), integer()],
            ),
            integer_divide,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}integer-mod"),
                integer(),
                vec![integer(), integer()],
            ),
            integer_mod,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}integer-abs"),
                integer(),
                vec![integer()],
            ),
            integer_abs,
        ),
        (
            FunctionSignature::varargs(
                format!("{XACML_1_0_FUNCTION}double-add"),
                double(),
                vec![double(), double()],
            ),
            double_add,
        ),
        (
            FunctionSignature::varargs(
                format!("{XACML_1_0_FUNCTION}double-multiply"),
                double(),
                vec![double(), double()],
            ),
            double_multiply,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}double-subtract"),
                double(),
                vec![double(), double()],
            ),
            double_subtract,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}double-divide"),
                double(),
                vec![double(), double()],
            ),
            double_divide,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}double-abs"),
                double(),
                vec![double()],
            ),
            double_abs,
        ),
        (
            FunctionSignature::new(format!("{XACML_1_0_FUNCTION}round"), double(), vec![double()]),
            round,
        ),
        (
            FunctionSignature::new(format!("{XACML_1_0_FUNCTION}floor"), double(), vec![double()]),
            floor,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}integer-to-double"),
                double(),
                vec![integer()],
            ),
            integer_to_double,
        ),
        (
            FunctionSignature::new(
                format!("{XACML_1_0_FUNCTION}double-to-integer"),
                integer(),
                vec![double()],
            ),
            double_to_integer,
        ),
    ];
    for (signature, eval) in entries {
        registry.add(signature, eval);
    }
}

fn integers(signature: &FunctionSignature, args: &[Evaluated]) -> Result<Vec<i64>, Status> {
    (0..args.len()).map(|i| integer_arg(signature, args, i)).collect()
}

fn doubles(signature: &FunctionSignature, args: &[Evaluated]) -> Result<Vec<f64>, Status> {
    (0..args.len()).map(|i| double_arg(signature, args, i)).collect()
}

fn integer_result(value: i64) -> Result<Evaluated, Status> {
    Ok(Evaluated::Value(AttributeValue::integer(value)))
}

fn double_result(value: f64) -> Result<Evaluated, Status> {
    Ok(Evaluated::Value(AttributeValue::double(value)))
}

fn integer_fold(
    signature: &FunctionSignature,
    args: &[Evaluated],
    fold: impl Fn(i64, i64) -> Option<i64>,
    identity: i64,
) -> Result<Evaluated, Status> {
    let operands = integers(signature, args)?;
    let mut acc = identity;
    for operand in operands {
        acc = fold(acc, operand).ok_or_else(|| argument_error(signature, "integer overflow"))?;
    }
    integer_result(acc)
}

fn integer_add(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    integer_fold(signature, args, i64::checked_add, 0)
}

fn integer_multiply(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    integer_fold(signature, args, i64::checked_mul, 1)
}

fn integer_subtract(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let a = integer_arg(signature, args, 0)?;
    let b = integer_arg(signature, args, 1)?;
    a.checked_sub(b)
        .map_or_else(|| Err(argument_error(signature, "integer overflow")), integer_result)
}

fn integer_divide(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let a = integer_arg(signature, args, 0)?;
    let b = integer_arg(signature, args, 1)?;
    a.checked_div(b)
        .map_or_else(|| Err(argument_error(signature, "division by zero or overflow")), integer_result)
}

fn integer_mod(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let a = integer_arg(signature, args, 0)?;
    let b = integer_arg(signature, args, 1)?;
    a.checked_rem(b)
        .map_or_else(|| Err(argument_error(signature, "modulo by zero or overflow")), integer_result)
}

fn integer_abs(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let a = integer_arg(signature, args, 0)?;
    a.checked_abs()
        .map_or_else(|| Err(argument_error(signature, "integer overflow")), integer_result)
}

fn double_add(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    double_result(doubles(signature, args)?.into_iter().sum())
}

fn double_multiply(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    double_result(doubles(signature, args)?.into_iter().product())
}

fn double_subtract(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    Ok(Evaluated::Value(AttributeValue::double(
        double_arg(signature, args, 0)? - double_arg(signature, args, 1)?,
    )))
}

fn double_divide(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let divisor = double_arg(signature, args, 1)?;
    if divisor == 0.0 {
        return Err(argument_error(signature, "division by zero"));
    }
    double_result(double_arg(signature, args, 0)? / divisor)
}

fn double_abs(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    double_result(double_arg(signature, args, 0)?.abs())
}

fn round(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    // round-half-to-even, the XML Schema rounding used by XACML round().
    let x = double_arg(signature, args, 0)?;
    let rounded = if (x - x.floor() - 0.5).abs() < f64::EPSILON {
        let floor = x.floor();
        if (floor % 2.0).abs() < f64::EPSILON {
            floor
        } else {
            floor + 1.0
        }
    } else {
        x.round()
    };
    double_result(rounded)
}

fn floor(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    double_result(double_arg(signature, args, 0)?.floor())
}

fn integer_to_double(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    #[allow(clippy::cast_precision_loss)]
    double_result(integer_arg(signature, args, 0)? as f64)
}

fn double_to_integer(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let x = double_arg(signature, args, 0)?.trunc();
    #[allow(clippy::cast_possible_truncation)]
    if x.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(&x) {
        integer_result(x as i64)
    } else {
        Err(argument_error(signature, "double not representable as integer"))
    }
}
