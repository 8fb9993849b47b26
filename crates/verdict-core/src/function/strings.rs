//! String functions: concatenation, normalization, containment, substring,
//! and the `string-from-{type}` / `{type}-from-string` conversion families.

use super::{
    argument_error, string_arg, value_arg, FunctionRegistry, FunctionSignature, XACML_1_0_FUNCTION,
    XACML_2_0_FUNCTION, XACML_3_0_FUNCTION,
};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Datatype, ValueType};

/// Datatypes with the 3.0 string conversion pair.
const CONVERTIBLE: [Datatype; 13] = [
    Datatype::Boolean,
    Datatype::Integer,
    Datatype::Double,
    Datatype::Time,
    Datatype::Date,
    Datatype::DateTime,
    Datatype::AnyUri,
    Datatype::DayTimeDuration,
    Datatype::YearMonthDuration,
    Datatype::X500Name,
    Datatype::Rfc822Name,
    Datatype::DnsName,
    Datatype::IpAddress,
];

pub(super) fn register(registry: &mut FunctionRegistry) {
    let string = || ValueType::value(Datatype::String);
    let integer = || ValueType::value(Datatype::Integer);
    let boolean = || ValueType::value(Datatype::Boolean);
    let uri = || ValueType::value(Datatype::AnyUri);

    registry.add(
        FunctionSignature::varargs(
            format!("{XACML_2_0_FUNCTION}string-concatenate"),
            string(),
            vec![string(), string()],
        ),
        concatenate,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_1_0_FUNCTION}string-normalize-space"),
            string(),
            vec![string()],
        ),
        normalize_space,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_1_0_FUNCTION}string-normalize-to-lower-case"),
            string(),
            vec![string()],
        ),
        normalize_to_lower_case,
    );

    // Containment family; the needle is the first argument.
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}string-contains"),
            boolean(),
            vec![string(), string()],
        ),
        contains,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}string-starts-with"),
            boolean(),
            vec![string(), string()],
        ),
        starts_with,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}string-ends-with"),
            boolean(),
            vec![string(), string()],
        ),
        ends_with,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}string-substring"),
            string(),
            vec![string(), integer(), integer()],
        ),
        substring,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}anyURI-contains"),
            boolean(),
            vec![string(), uri()],
        ),
        contains,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}anyURI-starts-with"),
            boolean(),
            vec![string(), uri()],
        ),
        starts_with,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}anyURI-ends-with"),
            boolean(),
            vec![string(), uri()],
        ),
        ends_with,
    );
    registry.add(
        FunctionSignature::new(
            format!("{XACML_3_0_FUNCTION}anyURI-substring"),
            string(),
            vec![uri(), integer(), integer()],
        ),
        substring,
    );

    for datatype in CONVERTIBLE {
        registry.add(
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}string-from-{}", datatype.short_name()),
                string(),
                vec![ValueType::value(datatype.clone())],
            ),
            string_from,
        );
        registry.add(
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}{}-from-string", datatype.short_name()),
                ValueType::value(datatype.clone()),
                vec![string()],
            ),
            from_string,
        );
    }
}

/// Either of the two text-bearing payloads, for the shared containment
/// implementations that serve both `string-*` and `anyURI-*` ids.
fn text<'a>(
    signature: &FunctionSignature,
    args: &'a [Evaluated],
    position: usize,
) -> Result<&'a str, Status> {
    let value = value_arg(signature, args, position)?;
    value
        .as_str()
        .or_else(|| value.as_uri())
        .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not text")))
}

fn string_result(value: impl Into<String>) -> Result<Evaluated, Status> {
    Ok(Evaluated::Value(AttributeValue::string(value)))
}

fn concatenate(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let mut out = String::new();
    for position in 0..args.len() {
        out.push_str(string_arg(signature, args, position)?);
    }
    string_result(out)
}

fn normalize_space(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    string_result(string_arg(signature, args, 0)?.trim())
}

fn normalize_to_lower_case(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    string_result(string_arg(signature, args, 0)?.to_lowercase())
}

fn contains(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let needle = string_arg(signature, args, 0)?;
    let haystack = text(signature, args, 1)?;
    Ok(Evaluated::Value(AttributeValue::boolean(haystack.contains(needle))))
}

fn starts_with(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let needle = string_arg(signature, args, 0)?;
    let haystack = text(signature, args, 1)?;
    Ok(Evaluated::Value(AttributeValue::boolean(haystack.starts_with(needle))))
}

fn ends_with(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let needle = string_arg(signature, args, 0)?;
    let haystack = text(signature, args, 1)?;
    Ok(Evaluated::Value(AttributeValue::boolean(haystack.ends_with(needle))))
}

/// `substring(text, begin, end)` in character positions; `end = -1` means
/// to the end of the string. Out-of-range positions are processing errors.
fn substring(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let source = text(signature, args, 0)?;
    let begin = super::integer_arg(signature, args, 1)?;
    let end = super::integer_arg(signature, args, 2)?;

    let chars: Vec<char> = source.chars().collect();
    let begin = usize::try_from(begin)
        .map_err(|_| argument_error(signature, "negative begin index"))?;
    let end = if end == -1 {
        chars.len()
    } else {
        usize::try_from(end).map_err(|_| argument_error(signature, "negative end index"))?
    };
    if begin > end || end > chars.len() {
        return Err(argument_error(
            signature,
            format_args!("substring range {begin}..{end} out of bounds for length {}", chars.len()),
        ));
    }
    string_result(chars[begin..end].iter().collect::<String>())
}

/// `string-from-X`: the canonical form of the argument.
fn string_from(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    string_result(value_arg(signature, args, 0)?.canonical())
}

/// `X-from-string`: parse into the declared return datatype; a value
/// outside the lexical space is a syntax error.
fn from_string(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let lexical = string_arg(signature, args, 0)?;
    AttributeValue::parse(&signature.return_type().datatype, lexical)
        .map(Evaluated::Value)
        .map_err(|e| Status::syntax_error(format!("{}: {e}", signature.id())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::DecisionRequest;
    use crate::decision::StatusCode;

    fn invoke(id: &str, args: &[Evaluated]) -> Result<Evaluated, Status> {
        let registry = FunctionRegistry::standard();
        let request = DecisionRequest::default();
        let ctx = EvaluationContext::new(&request, &PdpConfig::default());
        registry.get(id).expect("registered").invoke(args, &ctx)
    }

    fn s(v: &str) -> Evaluated {
        Evaluated::Value(AttributeValue::string(v))
    }

    fn int(v: i64) -> Evaluated {
        Evaluated::Value(AttributeValue::integer(v))
    }

    fn truth(v: bool) -> Evaluated {
        Evaluated::Value(AttributeValue::boolean(v))
    }

    #[test]
    fn concatenate_is_variadic() {
        let id = "urn:oasis:names:tc:xacml:2.0:function:string-concatenate";
        assert_eq!(invoke(id, &[s("foo"), s("-"), s("bar")]).unwrap(), s("foo-bar"));
    }

    #[test]
    fn normalization() {
        let space = "urn:oasis:names:tc:xacml:1.0:function:string-normalize-space";
        let lower = "urn:oasis:names:tc:xacml:1.0:function:string-normalize-to-lower-case";
        assert_eq!(invoke(space, &[s("  padded  ")]).unwrap(), s("padded"));
        assert_eq!(invoke(lower, &[s("MiXeD")]).unwrap(), s("mixed"));
    }

    #[test]
    fn containment_needle_is_first_argument() {
        let contains = "urn:oasis:names:tc:xacml:3.0:function:string-contains";
        let starts = "urn:oasis:names:tc:xacml:3.0:function:string-starts-with";
        let ends = "urn:oasis:names:tc:xacml:3.0:function:string-ends-with";
        assert_eq!(invoke(contains, &[s("ell"), s("hello")]).unwrap(), truth(true));
        assert_eq!(invoke(starts, &[s("he"), s("hello")]).unwrap(), truth(true));
        assert_eq!(invoke(ends, &[s("lo"), s("hello")]).unwrap(), truth(true));
        assert_eq!(invoke(contains, &[s("hello"), s("ell")]).unwrap(), truth(false));
    }

    #[test]
    fn substring_character_positions() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:string-substring";
        assert_eq!(invoke(id, &[s("hello"), int(1), int(3)]).unwrap(), s("el"));
        assert_eq!(invoke(id, &[s("hello"), int(2), int(-1)]).unwrap(), s("llo"));
        let err = invoke(id, &[s("hello"), int(4), int(2)]).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
        let err = invoke(id, &[s("hello"), int(0), int(9)]).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
    }

    #[test]
    fn conversion_pair_round_trips() {
        let to_string = "urn:oasis:names:tc:xacml:3.0:function:string-from-integer";
        let from_string = "urn:oasis:names:tc:xacml:3.0:function:integer-from-string";
        assert_eq!(invoke(to_string, &[int(42)]).unwrap(), s("42"));
        assert_eq!(invoke(from_string, &[s("42")]).unwrap(), int(42));
    }

    #[test]
    fn from_string_failure_is_syntax_error() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:date-from-string";
        let err = invoke(id, &[s("not-a-date")]).unwrap_err();
        assert_eq!(err.code, StatusCode::SyntaxError);
    }

    #[test]
    fn any_uri_containment() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:anyURI-starts-with";
        let uri = Evaluated::Value(AttributeValue::any_uri("urn:example:doc"));
        assert_eq!(invoke(id, &[s("urn:example"), uri]).unwrap(), truth(true));
    }
}
