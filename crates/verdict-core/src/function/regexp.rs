//! The `*-regexp-match` family.
//!
//! XACML regular expressions are implicitly anchored (XML Schema regex
//! semantics): the pattern must match the whole value, so the pattern is
//! compiled wrapped in `^(?:…)$`. Compilation happens per call because the
//! pattern is an argument value; in practice it is a literal, and the cost
//! is dwarfed by the rest of the decision.

use regex::Regex;

use super::{
    argument_error, string_arg, value_arg, FunctionRegistry, FunctionSignature, XACML_1_0_FUNCTION,
    XACML_2_0_FUNCTION,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Datatype, ValueType};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        FunctionSignature::new(
            format!("{XACML_1_0_FUNCTION}string-regexp-match"),
            ValueType::value(Datatype::Boolean),
            vec![ValueType::value(Datatype::String), ValueType::value(Datatype::String)],
        ),
        regexp_match,
    );

    for datatype in [
        Datatype::AnyUri,
        Datatype::IpAddress,
        Datatype::DnsName,
        Datatype::Rfc822Name,
        Datatype::X500Name,
    ] {
        registry.add(
            FunctionSignature::new(
                format!("{XACML_2_0_FUNCTION}{}-regexp-match", datatype.short_name()),
                ValueType::value(Datatype::Boolean),
                vec![ValueType::value(Datatype::String), ValueType::value(datatype)],
            ),
            regexp_match,
        );
    }
}

/// Shared implementation: the second argument is matched in its canonical
/// string form, which makes the one body serve every datatype variant.
fn regexp_match(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let pattern = string_arg(signature, args, 0)?;
    let subject = value_arg(signature, args, 1)?.canonical();

    let anchored = format!("^(?:{pattern})$");
    let regex = Regex::new(&anchored)
        .map_err(|e| argument_error(signature, format_args!("invalid pattern: {e}")))?;
    Ok(Evaluated::Value(AttributeValue::boolean(regex.is_match(&subject))))
}
