//! Order predicates for the comparable datatypes.

use std::cmp::Ordering;

use super::{argument_error, value_arg, FunctionRegistry, FunctionSignature, XACML_1_0_FUNCTION};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Datatype, ValueType};

/// Datatypes with a standard order predicate family.
const ORDERED: [Datatype; 6] = [
    Datatype::Integer,
    Datatype::Double,
    Datatype::String,
    Datatype::Date,
    Datatype::Time,
    Datatype::DateTime,
];

pub(super) fn register(registry: &mut FunctionRegistry) {
    let relations = ["greater-than", "greater-than-or-equal", "less-than", "less-than-or-equal"];
    for datatype in ORDERED {
        for relation in relations {
            registry.add(
                FunctionSignature::new(
                    format!("{XACML_1_0_FUNCTION}{}-{relation}", datatype.short_name()),
                    ValueType::value(Datatype::Boolean),
                    vec![ValueType::value(datatype.clone()), ValueType::value(datatype.clone())],
                ),
                compare,
            );
        }
    }
}

/// Shared comparator: the relation is recovered from the function id
/// suffix, the ordering from the datatype-specific [`AttributeValue`]
/// comparison. An unordered pair (NaN) is a processing error.
fn compare(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let left = value_arg(signature, args, 0)?;
    let right = value_arg(signature, args, 1)?;
    let ordering = left
        .compare(right)
        .ok_or_else(|| argument_error(signature, "arguments do not compare"))?;

    let id = signature.id();
    let result = if id.ends_with("greater-than-or-equal") {
        ordering != Ordering::Less
    } else if id.ends_with("less-than-or-equal") {
        ordering != Ordering::Greater
    } else if id.ends_with("greater-than") {
        ordering == Ordering::Greater
    } else {
        ordering == Ordering::Less
    };
    Ok(Evaluated::Value(AttributeValue::boolean(result)))
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
        registry
            .get(&format!("{XACML_1_0_FUNCTION}{id}"))
            .expect("registered")
            .invoke(args, &ctx)
    }

    fn int(v: i64) -> Evaluated {
        Evaluated::Value(AttributeValue::integer(v))
    }

    fn truth(v: bool) -> Evaluated {
        Evaluated::Value(AttributeValue::boolean(v))
    }

    #[test]
    fn integer_relations() {
        assert_eq!(invoke("integer-greater-than", &[int(2), int(1)]).unwrap(), truth(true));
        assert_eq!(invoke("integer-greater-than-or-equal", &[int(2), int(2)]).unwrap(), truth(true));
        assert_eq!(invoke("integer-less-than", &[int(2), int(2)]).unwrap(), truth(false));
        assert_eq!(invoke("integer-less-than-or-equal", &[int(1), int(2)]).unwrap(), truth(true));
    }

    #[test]
    fn string_relation_is_lexicographic() {
        let s = |v: &str| Evaluated::Value(AttributeValue::string(v));
        assert_eq!(invoke("string-less-than", &[s("abc"), s("abd")]).unwrap(), truth(true));
    }

    #[test]
    fn date_relation_is_timeline() {
        let d = |v: &str| Evaluated::Value(AttributeValue::parse(&Datatype::Date, v).unwrap());
        assert_eq!(
            invoke("date-less-than", &[d("2002-03-22"), d("2002-03-23")]).unwrap(),
            truth(true)
        );
    }

    #[test]
    fn nan_comparison_is_processing_error() {
        let nan = Evaluated::Value(AttributeValue::double(f64::NAN));
        let err = invoke("double-less-than", &[nan.clone(), nan]).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
    }
}
