//! Temporal payloads: XML Schema durations and date/time parsing.
//!
//! Durations are decomposed per XML Schema: a year-month duration is a
//! signed month count, a day-time duration is a signed millisecond count.
//! The two decompositions are never compared or combined with each other.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use super::error::ValueError;

// ============================================================================
// Durations
// ============================================================================

/// An `xs:yearMonthDuration`: a signed number of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonthDuration {
    months: i64,
}

impl YearMonthDuration {
    /// Builds a duration from a signed month count.
    pub const fn from_months(months: i64) -> Self {
        Self { months }
    }

    /// Total months, signed.
    pub const fn months(self) -> i64 {
        self.months
    }

    /// Parses the lexical form `-?PnYnM` (at least one field present).
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::lexical("yearMonthDuration", lexical, reason);
        let (negative, rest) = match lexical.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, lexical),
        };
        let rest = rest.strip_prefix('P').ok_or_else(|| err("expected 'P'"))?;

        let mut cursor = Cursor::new(rest);
        let years = cursor.take_number_before('Y')?;
        let months = cursor.take_number_before('M')?;
        if !cursor.is_empty() || (years.is_none() && months.is_none()) {
            return Err(err("expected PnYnM with at least one field"));
        }

        let total = years
            .unwrap_or(0)
            .checked_mul(12)
            .and_then(|y| y.checked_add(months.unwrap_or(0)))
            .ok_or_else(|| err("month count overflows"))?;
        Ok(Self { months: if negative { -total } else { total } })
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.months.unsigned_abs();
        if self.months < 0 {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let (years, months) = (total / 12, total % 12);
        if years > 0 {
            write!(f, "{years}Y")?;
        }
        if months > 0 || years == 0 {
            write!(f, "{months}M")?;
        }
        Ok(())
    }
}

/// An `xs:dayTimeDuration`: a signed number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayTimeDuration {
    millis: i64,
}

impl DayTimeDuration {
    /// Builds a duration from a signed millisecond count.
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Builds a duration from a signed second count.
    pub const fn from_seconds(seconds: i64) -> Self {
        Self { millis: seconds * 1000 }
    }

    /// Total milliseconds, signed.
    pub const fn millis(self) -> i64 {
        self.millis
    }

    /// The duration as a chrono [`TimeDelta`].
    pub fn delta(self) -> TimeDelta {
        TimeDelta::milliseconds(self.millis)
    }

    /// Parses the lexical form `-?PnDTnHnMn(.nnn)?S` (at least one field,
    /// `T` only when a time field follows).
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::lexical("dayTimeDuration", lexical, reason);
        let (negative, rest) = match lexical.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, lexical),
        };
        let rest = rest.strip_prefix('P').ok_or_else(|| err("expected 'P'"))?;

        let mut cursor = Cursor::new(rest);
        let days = cursor.take_number_before('D')?;
        let mut hours = None;
        let mut minutes = None;
        let mut seconds = None;
        let mut sub_millis = 0i64;
        if let Some(time_part) = cursor.rest().strip_prefix('T') {
            let mut time_cursor = Cursor::new(time_part);
            hours = time_cursor.take_number_before('H')?;
            minutes = time_cursor.take_number_before('M')?;
            (seconds, sub_millis) = time_cursor.take_seconds()?;
            if !time_cursor.is_empty() || (hours.is_none() && minutes.is_none() && seconds.is_none()) {
                return Err(err("expected at least one of H, M, S after 'T'"));
            }
        } else if !cursor.is_empty() {
            return Err(err("unexpected trailing input"));
        } else if days.is_none() {
            return Err(err("expected at least one field"));
        }

        let total = [
            days.unwrap_or(0).checked_mul(86_400_000),
            hours.unwrap_or(0).checked_mul(3_600_000),
            minutes.unwrap_or(0).checked_mul(60_000),
            seconds.unwrap_or(0).checked_mul(1000),
            Some(sub_millis),
        ]
        .into_iter()
        .try_fold(0i64, |acc, part| part.and_then(|p| acc.checked_add(p)))
        .ok_or_else(|| err("duration overflows"))?;

        Ok(Self { millis: if negative { -total } else { total } })
    }
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut total = self.millis.unsigned_abs();
        if self.millis < 0 {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let days = total / 86_400_000;
        total %= 86_400_000;
        let hours = total / 3_600_000;
        total %= 3_600_000;
        let minutes = total / 60_000;
        total %= 60_000;
        let seconds = total / 1000;
        let millis = total % 1000;

        if days > 0 {
            write!(f, "{days}D")?;
        }
        let has_time = hours > 0 || minutes > 0 || seconds > 0 || millis > 0;
        if has_time || days == 0 {
            f.write_str("T")?;
            if hours > 0 {
                write!(f, "{hours}H")?;
            }
            if minutes > 0 {
                write!(f, "{minutes}M")?;
            }
            if millis > 0 {
                write!(f, "{seconds}.{millis:03}S")?;
            } else if seconds > 0 || (hours == 0 && minutes == 0) {
                write!(f, "{seconds}S")?;
            }
        }
        Ok(())
    }
}

/// Lexical cursor over a duration body.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a str) -> Self {
        Self { rest }
    }

    fn rest(&self) -> &'a str {
        self.rest
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Consumes `<digits><marker>` if the next field uses `marker`.
    fn take_number_before(&mut self, marker: char) -> Result<Option<i64>, ValueError> {
        let digits_len = self.rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            return Ok(None);
        }
        let after = &self.rest[digits_len..];
        if !after.starts_with(marker) {
            return Ok(None);
        }
        let number = self.rest[..digits_len]
            .parse::<i64>()
            .map_err(|_| ValueError::lexical("duration", self.rest, "field overflows"))?;
        self.rest = &after[marker.len_utf8()..];
        Ok(Some(number))
    }

    /// Consumes `<digits>(.<digits>)?S`, returning whole seconds and the
    /// fractional part truncated to milliseconds.
    fn take_seconds(&mut self) -> Result<(Option<i64>, i64), ValueError> {
        let digits_len = self.rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            return Ok((None, 0));
        }
        let whole = self.rest[..digits_len]
            .parse::<i64>()
            .map_err(|_| ValueError::lexical("duration", self.rest, "seconds overflow"))?;
        let mut after = &self.rest[digits_len..];
        let mut millis = 0i64;
        if let Some(frac) = after.strip_prefix('.') {
            let frac_len = frac.bytes().take_while(u8::is_ascii_digit).count();
            if frac_len == 0 {
                return Err(ValueError::lexical("duration", self.rest, "empty fraction"));
            }
            let scaled: String = frac[..frac_len].chars().chain("000".chars()).take(3).collect();
            millis = scaled.parse::<i64>().unwrap_or(0);
            after = &frac[frac_len..];
        }
        let after = after
            .strip_prefix('S')
            .ok_or_else(|| ValueError::lexical("duration", self.rest, "expected 'S'"))?;
        self.rest = after;
        Ok((Some(whole), millis))
    }
}

// ============================================================================
// Date / time / dateTime lexical forms
// ============================================================================

/// Parses an `xs:date`, tolerating and discarding a trailing timezone.
pub fn parse_date(lexical: &str) -> Result<NaiveDate, ValueError> {
    let body = strip_timezone(lexical);
    NaiveDate::parse_from_str(body, "%Y-%m-%d")
        .map_err(|e| ValueError::lexical("date", lexical, e.to_string()))
}

/// Parses an `xs:time`. An explicit offset is normalized away by shifting
/// the value to UTC.
pub fn parse_time(lexical: &str) -> Result<NaiveTime, ValueError> {
    let (body, offset) = split_timezone(lexical);
    let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f")
        .map_err(|e| ValueError::lexical("time", lexical, e.to_string()))?;
    match offset {
        None => Ok(time),
        Some(offset) => {
            let offset = parse_offset(offset)
                .ok_or_else(|| ValueError::lexical("time", lexical, "invalid timezone offset"))?;
            Ok(time.overflowing_sub_signed(TimeDelta::seconds(i64::from(offset))).0)
        }
    }
}

/// Parses an `xs:dateTime`. Values without a timezone are taken as UTC.
pub fn parse_date_time(lexical: &str) -> Result<DateTime<FixedOffset>, ValueError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
        return Ok(dt);
    }
    NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| ValueError::lexical("dateTime", lexical, e.to_string()))
}

/// Canonical form of a dateTime value.
pub fn format_date_time(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

fn strip_timezone(lexical: &str) -> &str {
    split_timezone(lexical).0
}

/// Splits `2002-03-22T08:23:47-05:00` style input into body and offset.
/// Only a suffix of the form `Z`, `+hh:mm`, or `-hh:mm` counts as an offset;
/// the date's own `-` separators are left alone.
fn split_timezone(lexical: &str) -> (&str, Option<&str>) {
    if let Some(body) = lexical.strip_suffix('Z') {
        return (body, Some("Z"));
    }
    if lexical.len() > 6 {
        let (body, suffix) = lexical.split_at(lexical.len() - 6);
        let bytes = suffix.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            return (body, Some(suffix));
        }
    }
    (lexical, None)
}

/// Parses `Z` / `+hh:mm` / `-hh:mm` into seconds east of UTC.
fn parse_offset(offset: &str) -> Option<i32> {
    if offset == "Z" {
        return Some(0);
    }
    let sign = match offset.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = offset.get(1..3)?.parse().ok()?;
    let minutes: i32 = offset.get(4..6)?.parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

// ============================================================================
// Temporal arithmetic
// ============================================================================

/// Adds a signed month count to a dateTime, clamping the day-of-month the
/// way XML Schema month arithmetic does.
pub fn date_time_add_months(
    value: &DateTime<FixedOffset>,
    months: i64,
) -> Option<DateTime<FixedOffset>> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        value.checked_add_months(Months::new(magnitude))
    } else {
        value.checked_sub_months(Months::new(magnitude))
    }
}

/// Adds a signed month count to a date.
pub fn date_add_months(value: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        value.checked_add_months(Months::new(magnitude))
    } else {
        value.checked_sub_months(Months::new(magnitude))
    }
}

/// Compares two times as positions on a 24h dial, used by `time-in-range`.
/// The range wraps midnight when `low > high`.
pub fn time_in_range(value: NaiveTime, low: NaiveTime, high: NaiveTime) -> bool {
    match low.cmp(&high) {
        Ordering::Less | Ordering::Equal => low <= value && value <= high,
        Ordering::Greater => value >= low || value <= high,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_duration_parse_and_canonical() {
        let d = YearMonthDuration::parse("P1Y2M").unwrap();
        assert_eq!(d.months(), 14);
        assert_eq!(d.to_string(), "P1Y2M");

        assert_eq!(YearMonthDuration::parse("-P3M").unwrap().months(), -3);
        assert_eq!(YearMonthDuration::parse("P2Y").unwrap().months(), 24);
        assert_eq!(YearMonthDuration::parse("P0M").unwrap().to_string(), "P0M");
    }

    #[test]
    fn year_month_duration_rejects_bad_forms() {
        for bad in ["", "P", "1Y", "P1H", "P1Y2M3D", "PY"] {
            assert!(YearMonthDuration::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn day_time_duration_parse_and_canonical() {
        let d = DayTimeDuration::parse("P1DT2H3M4S").unwrap();
        assert_eq!(d.millis(), ((26 * 60 + 3) * 60 + 4) * 1000);
        assert_eq!(d.to_string(), "P1DT2H3M4S");

        assert_eq!(DayTimeDuration::parse("PT0.5S").unwrap().millis(), 500);
        assert_eq!(DayTimeDuration::parse("-PT90S").unwrap().millis(), -90_000);
        assert_eq!(DayTimeDuration::parse("P2D").unwrap().millis(), 2 * 86_400_000);
        assert_eq!(DayTimeDuration::parse("PT0S").unwrap().to_string(), "PT0S");
    }

    #[test]
    fn day_time_duration_rejects_bad_forms() {
        for bad in ["", "P", "PT", "P1Y", "PT1X", "P1DT", "T1S"] {
            assert!(DayTimeDuration::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn date_parsing_tolerates_timezone() {
        assert_eq!(
            parse_date("2002-03-22").unwrap(),
            NaiveDate::from_ymd_opt(2002, 3, 22).unwrap()
        );
        assert_eq!(parse_date("2002-03-22Z").unwrap(), parse_date("2002-03-22").unwrap());
        assert_eq!(
            parse_date("2002-03-22-05:00").unwrap(),
            parse_date("2002-03-22").unwrap()
        );
        assert!(parse_date("03/22/2002").is_err());
    }

    #[test]
    fn time_offset_normalizes_to_utc() {
        let plain = parse_time("08:23:47").unwrap();
        assert_eq!(plain, NaiveTime::from_hms_opt(8, 23, 47).unwrap());

        let shifted = parse_time("08:23:47-05:00").unwrap();
        assert_eq!(shifted, NaiveTime::from_hms_opt(13, 23, 47).unwrap());
    }

    #[test]
    fn date_time_parsing_assumes_utc_when_naive() {
        let with_zone = parse_date_time("2002-03-22T08:23:47-05:00").unwrap();
        let naive = parse_date_time("2002-03-22T13:23:47").unwrap();
        assert_eq!(with_zone, naive);
    }

    #[test]
    fn month_arithmetic_clamps_end_of_month() {
        let jan31 = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            date_add_months(jan31, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            date_add_months(jan31, -2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 11, 30).unwrap()
        );
    }

    #[test]
    fn time_in_range_handles_wrap() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(time_in_range(t(12), t(9), t(17)));
        assert!(!time_in_range(t(18), t(9), t(17)));
        // Range wrapping midnight: 22:00..06:00
        assert!(time_in_range(t(23), t(22), t(6)));
        assert!(time_in_range(t(3), t(22), t(6)));
        assert!(!time_in_range(t(12), t(22), t(6)));
    }
}
