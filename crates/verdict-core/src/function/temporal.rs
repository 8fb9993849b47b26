//! Temporal arithmetic: duration addition/subtraction and `time-in-range`.

use super::{argument_error, value_arg, FunctionRegistry, FunctionSignature, XACML_2_0_FUNCTION, XACML_3_0_FUNCTION};
use crate::context::EvaluationContext;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{
    date_add_months, date_time_add_months, time_in_range, AttributeValue, Datatype, ValueType,
};

pub(super) fn register(registry: &mut FunctionRegistry) {
    let date_time = || ValueType::value(Datatype::DateTime);
    let date = || ValueType::value(Datatype::Date);
    let time = || ValueType::value(Datatype::Time);
    let dtd = || ValueType::value(Datatype::DayTimeDuration);
    let ymd = || ValueType::value(Datatype::YearMonthDuration);

    let entries: Vec<(FunctionSignature, super::FunctionEval)> = vec![
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}dateTime-add-dayTimeDuration"),
                date_time(),
                vec![date_time(), dtd()],
            ),
            date_time_day_time(false),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}dateTime-subtract-dayTimeDuration"),
                date_time(),
                vec![date_time(), dtd()],
            ),
            date_time_day_time(true),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}dateTime-add-yearMonthDuration"),
                date_time(),
                vec![date_time(), ymd()],
            ),
            date_time_year_month(false),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}dateTime-subtract-yearMonthDuration"),
                date_time(),
                vec![date_time(), ymd()],
            ),
            date_time_year_month(true),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}date-add-yearMonthDuration"),
                date(),
                vec![date(), ymd()],
            ),
            date_year_month(false),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_3_0_FUNCTION}date-subtract-yearMonthDuration"),
                date(),
                vec![date(), ymd()],
            ),
            date_year_month(true),
        ),
        (
            FunctionSignature::new(
                format!("{XACML_2_0_FUNCTION}time-in-range"),
                ValueType::value(Datatype::Boolean),
                vec![time(), time(), time()],
            ),
            in_range,
        ),
    ];
    for (signature, eval) in entries {
        registry.add(signature, eval);
    }
}

/// The fn-pointer table pattern: each registered variant is a distinct
/// monomorphic function, selected here by direction.
const fn date_time_day_time(subtract: bool) -> super::FunctionEval {
    if subtract {
        date_time_subtract_day_time_eval
    } else {
        date_time_add_day_time_eval
    }
}

const fn date_time_year_month(subtract: bool) -> super::FunctionEval {
    if subtract {
        date_time_subtract_year_month_eval
    } else {
        date_time_add_year_month_eval
    }
}

const fn date_year_month(subtract: bool) -> super::FunctionEval {
    if subtract {
        date_subtract_year_month_eval
    } else {
        date_add_year_month_eval
    }
}

fn date_time_with_delta(
    signature: &FunctionSignature,
    args: &[Evaluated],
    negate: bool,
) -> Result<Evaluated, Status> {
    let base = value_arg(signature, args, 0)?
        .as_date_time()
        .ok_or_else(|| argument_error(signature, "argument 0 is not a dateTime"))?;
    let duration = value_arg(signature, args, 1)?
        .as_day_time_duration()
        .ok_or_else(|| argument_error(signature, "argument 1 is not a dayTimeDuration"))?;
    let delta = if negate { -duration.delta() } else { duration.delta() };
    base.checked_add_signed(delta)
        .map(|result| Evaluated::Value(AttributeValue::DateTime(result)))
        .ok_or_else(|| argument_error(signature, "dateTime out of range"))
}

fn date_time_add_day_time_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_time_with_delta(signature, args, false)
}

fn date_time_subtract_day_time_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_time_with_delta(signature, args, true)
}

fn date_time_with_months(
    signature: &FunctionSignature,
    args: &[Evaluated],
    negate: bool,
) -> Result<Evaluated, Status> {
    let base = value_arg(signature, args, 0)?
        .as_date_time()
        .ok_or_else(|| argument_error(signature, "argument 0 is not a dateTime"))?;
    let duration = value_arg(signature, args, 1)?
        .as_year_month_duration()
        .ok_or_else(|| argument_error(signature, "argument 1 is not a yearMonthDuration"))?;
    let months = if negate { -duration.months() } else { duration.months() };
    date_time_add_months(base, months)
        .map(|result| Evaluated::Value(AttributeValue::DateTime(result)))
        .ok_or_else(|| argument_error(signature, "dateTime out of range"))
}

fn date_time_add_year_month_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_time_with_months(signature, args, false)
}

fn date_time_subtract_year_month_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_time_with_months(signature, args, true)
}

fn date_with_months(
    signature: &FunctionSignature,
    args: &[Evaluated],
    negate: bool,
) -> Result<Evaluated, Status> {
    let base = value_arg(signature, args, 0)?
        .as_date()
        .ok_or_else(|| argument_error(signature, "argument 0 is not a date"))?;
    let duration = value_arg(signature, args, 1)?
        .as_year_month_duration()
        .ok_or_else(|| argument_error(signature, "argument 1 is not a yearMonthDuration"))?;
    let months = if negate { -duration.months() } else { duration.months() };
    date_add_months(base, months)
        .map(|result| Evaluated::Value(AttributeValue::Date(result)))
        .ok_or_else(|| argument_error(signature, "date out of range"))
}

fn date_add_year_month_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_with_months(signature, args, false)
}

fn date_subtract_year_month_eval(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    date_with_months(signature, args, true)
}

/// `time-in-range(t, low, high)`; the range wraps midnight when
/// `low > high`.
fn in_range(
    signature: &FunctionSignature,
    args: &[Evaluated],
    _ctx: &EvaluationContext<'_>,
) -> Result<Evaluated, Status> {
    let fetch = |position: usize| {
        value_arg(signature, args, position)?
            .as_time()
            .ok_or_else(|| argument_error(signature, format_args!("argument {position} is not a time")))
    };
    let (value, low, high) = (fetch(0)?, fetch(1)?, fetch(2)?);
    Ok(Evaluated::Value(AttributeValue::boolean(time_in_range(value, low, high))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::DecisionRequest;

    fn invoke(id: &str, args: &[Evaluated]) -> Result<Evaluated, Status> {
        let registry = FunctionRegistry::standard();
        let request = DecisionRequest::default();
        let ctx = EvaluationContext::new(&request, &PdpConfig::default());
        registry.get(id).expect("registered").invoke(args, &ctx)
    }

    fn parse(datatype: Datatype, lexical: &str) -> Evaluated {
        Evaluated::Value(AttributeValue::parse(&datatype, lexical).unwrap())
    }

    #[test]
    fn date_time_plus_day_time_duration() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:dateTime-add-dayTimeDuration";
        let result = invoke(id, &[
            parse(Datatype::DateTime, "2002-03-22T08:00:00Z"),
            parse(Datatype::DayTimeDuration, "P1DT2H"),
        ]);
        assert_eq!(result.unwrap(), parse(Datatype::DateTime, "2002-03-23T10:00:00Z"));
    }

    #[test]
    fn date_time_minus_year_month_duration() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:dateTime-subtract-yearMonthDuration";
        let result = invoke(id, &[
            parse(Datatype::DateTime, "2002-03-31T08:00:00Z"),
            parse(Datatype::YearMonthDuration, "P1M"),
        ]);
        assert_eq!(result.unwrap(), parse(Datatype::DateTime, "2002-02-28T08:00:00Z"));
    }

    #[test]
    fn date_plus_year_month_duration() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:date-add-yearMonthDuration";
        let result = invoke(id, &[
            parse(Datatype::Date, "2002-01-31"),
            parse(Datatype::YearMonthDuration, "P1Y1M"),
        ]);
        assert_eq!(result.unwrap(), parse(Datatype::Date, "2003-02-28"));
    }

    #[test]
    fn time_in_range_wraps_midnight() {
        let id = "urn:oasis:names:tc:xacml:2.0:function:time-in-range";
        let truth = |v| Evaluated::Value(AttributeValue::boolean(v));
        let t = |s: &str| parse(Datatype::Time, s);
        assert_eq!(invoke(id, &[t("12:00:00"), t("09:00:00"), t("17:00:00")]).unwrap(), truth(true));
        assert_eq!(invoke(id, &[t("02:00:00"), t("22:00:00"), t("06:00:00")]).unwrap(), truth(true));
        assert_eq!(invoke(id, &[t("12:00:00"), t("22:00:00"), t("06:00:00")]).unwrap(), truth(false));
    }
}
