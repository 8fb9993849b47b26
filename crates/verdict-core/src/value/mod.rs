//! The XACML value model: typed attribute values and bags.
//!
//! Every value carries its datatype; parsing goes from the canonical
//! lexical form defined by XML Schema / XACML, and serialization returns
//! the canonical form. Equality and ordering are datatype-specific:
//! lexicographic for strings, numeric for integers and doubles, timeline
//! order for dates and times, and multiset equality for bags. Doubles keep
//! IEEE-754 semantics, so NaN compares unequal to itself.

mod bag;
mod datatype;
mod error;
mod name;
mod temporal;

pub use bag::Bag;
pub use datatype::{Datatype, DatatypeRegistry, ValueType};
pub use error::ValueError;
pub use name::{DnsName, IpAddressValue, PortRange, Rfc822Name, X500Name};
pub use temporal::{
    date_add_months, date_time_add_months, format_date_time, parse_date, parse_date_time,
    parse_time, time_in_range, DayTimeDuration, YearMonthDuration,
};

use std::cmp::Ordering;
use std::fmt;

use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single typed XACML attribute value.
///
/// Immutable after construction; the payload representation is the parsed
/// (value-space) form, not the lexical string.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// `xs:string`.
    String(String),
    /// `xs:boolean`.
    Boolean(bool),
    /// `xs:integer`, long-backed.
    Integer(i64),
    /// `xs:double`.
    Double(f64),
    /// `xs:date`.
    Date(NaiveDate),
    /// `xs:time`, normalized to UTC.
    Time(NaiveTime),
    /// `xs:dateTime`.
    DateTime(DateTime<FixedOffset>),
    /// `xs:yearMonthDuration`.
    YearMonthDuration(YearMonthDuration),
    /// `xs:dayTimeDuration`.
    DayTimeDuration(DayTimeDuration),
    /// `xs:anyURI`, kept verbatim.
    AnyUri(String),
    /// `xs:hexBinary`.
    HexBinary(Vec<u8>),
    /// `xs:base64Binary`.
    Base64Binary(Vec<u8>),
    /// XACML x500Name.
    X500Name(X500Name),
    /// XACML rfc822Name.
    Rfc822Name(Rfc822Name),
    /// XACML dnsName.
    DnsName(DnsName),
    /// XACML ipAddress.
    IpAddress(IpAddressValue),
    /// A registered non-standard datatype, kept in canonical string form.
    Other {
        /// The datatype identifier.
        datatype: Datatype,
        /// Canonical lexical form; equality is string equality.
        canonical: String,
    },
}

impl AttributeValue {
    // -- constructors ------------------------------------------------------

    /// A string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// A boolean value.
    pub const fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    /// An integer value.
    pub const fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    /// A double value.
    pub const fn double(value: f64) -> Self {
        Self::Double(value)
    }

    /// An anyURI value.
    pub fn any_uri(value: impl Into<String>) -> Self {
        Self::AnyUri(value.into())
    }

    // -- datatype & parsing ------------------------------------------------

    /// The value's datatype.
    pub fn datatype(&self) -> Datatype {
        match self {
            Self::String(_) => Datatype::String,
            Self::Boolean(_) => Datatype::Boolean,
            Self::Integer(_) => Datatype::Integer,
            Self::Double(_) => Datatype::Double,
            Self::Date(_) => Datatype::Date,
            Self::Time(_) => Datatype::Time,
            Self::DateTime(_) => Datatype::DateTime,
            Self::YearMonthDuration(_) => Datatype::YearMonthDuration,
            Self::DayTimeDuration(_) => Datatype::DayTimeDuration,
            Self::AnyUri(_) => Datatype::AnyUri,
            Self::HexBinary(_) => Datatype::HexBinary,
            Self::Base64Binary(_) => Datatype::Base64Binary,
            Self::X500Name(_) => Datatype::X500Name,
            Self::Rfc822Name(_) => Datatype::Rfc822Name,
            Self::DnsName(_) => Datatype::DnsName,
            Self::IpAddress(_) => Datatype::IpAddress,
            Self::Other { datatype, .. } => datatype.clone(),
        }
    }

    /// Parses a lexical form into a value of the given datatype.
    ///
    /// Non-standard datatypes parse by keeping the trimmed lexical form as
    /// the canonical payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidLexicalForm`] when the input is not in
    /// the datatype's lexical space.
    pub fn parse(datatype: &Datatype, lexical: &str) -> Result<Self, ValueError> {
        match datatype {
            Datatype::String => Ok(Self::String(lexical.to_string())),
            Datatype::Boolean => match lexical.trim() {
                "true" | "1" => Ok(Self::Boolean(true)),
                "false" | "0" => Ok(Self::Boolean(false)),
                _ => Err(ValueError::lexical("boolean", lexical, "expected true/false/1/0")),
            },
            Datatype::Integer => {
                let trimmed = lexical.trim();
                let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
                digits
                    .parse::<i64>()
                    .map(Self::Integer)
                    .map_err(|e| ValueError::lexical("integer", lexical, e.to_string()))
            }
            Datatype::Double => parse_double(lexical).map(Self::Double),
            Datatype::Date => parse_date(lexical.trim()).map(Self::Date),
            Datatype::Time => parse_time(lexical.trim()).map(Self::Time),
            Datatype::DateTime => parse_date_time(lexical.trim()).map(Self::DateTime),
            Datatype::YearMonthDuration => {
                YearMonthDuration::parse(lexical.trim()).map(Self::YearMonthDuration)
            }
            Datatype::DayTimeDuration => {
                DayTimeDuration::parse(lexical.trim()).map(Self::DayTimeDuration)
            }
            Datatype::AnyUri => Ok(Self::AnyUri(lexical.trim().to_string())),
            Datatype::HexBinary => parse_hex(lexical.trim())
                .map(Self::HexBinary)
                .ok_or_else(|| ValueError::lexical("hexBinary", lexical, "expected hex digit pairs")),
            Datatype::Base64Binary => base64::engine::general_purpose::STANDARD
                .decode(lexical.trim())
                .map(Self::Base64Binary)
                .map_err(|e| ValueError::lexical("base64Binary", lexical, e.to_string())),
            Datatype::X500Name => X500Name::parse(lexical).map(Self::X500Name),
            Datatype::Rfc822Name => Rfc822Name::parse(lexical.trim()).map(Self::Rfc822Name),
            Datatype::DnsName => DnsName::parse(lexical.trim()).map(Self::DnsName),
            Datatype::IpAddress => IpAddressValue::parse(lexical.trim()).map(Self::IpAddress),
            Datatype::Other(_) => Ok(Self::Other {
                datatype: datatype.clone(),
                canonical: lexical.trim().to_string(),
            }),
        }
    }

    /// The canonical lexical form.
    pub fn canonical(&self) -> String {
        match self {
            Self::String(s) | Self::AnyUri(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Double(d) => format_double(*d),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Self::DateTime(dt) => format_date_time(dt),
            Self::YearMonthDuration(d) => d.to_string(),
            Self::DayTimeDuration(d) => d.to_string(),
            Self::HexBinary(bytes) => format_hex(bytes),
            Self::Base64Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Self::X500Name(n) => n.to_string(),
            Self::Rfc822Name(n) => n.to_string(),
            Self::DnsName(n) => n.to_string(),
            Self::IpAddress(n) => n.to_string(),
            Self::Other { canonical, .. } => canonical.clone(),
        }
    }

    // -- accessors ---------------------------------------------------------

    /// The string payload, for string-typed values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The anyURI payload.
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Self::AnyUri(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The double payload.
    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// The date payload.
    pub const fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// The time payload.
    pub const fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// The dateTime payload.
    pub const fn as_date_time(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// The yearMonthDuration payload.
    pub const fn as_year_month_duration(&self) -> Option<YearMonthDuration> {
        match self {
            Self::YearMonthDuration(d) => Some(*d),
            _ => None,
        }
    }

    /// The dayTimeDuration payload.
    pub const fn as_day_time_duration(&self) -> Option<DayTimeDuration> {
        match self {
            Self::DayTimeDuration(d) => Some(*d),
            _ => None,
        }
    }

    /// The x500Name payload.
    pub const fn as_x500_name(&self) -> Option<&X500Name> {
        match self {
            Self::X500Name(n) => Some(n),
            _ => None,
        }
    }

    /// The rfc822Name payload.
    pub const fn as_rfc822_name(&self) -> Option<&Rfc822Name> {
        match self {
            Self::Rfc822Name(n) => Some(n),
            _ => None,
        }
    }

    // -- ordering ----------------------------------------------------------

    /// Datatype-specific total order, where one exists.
    ///
    /// Strings order lexicographically by code point, numerics numerically,
    /// temporal values along the timeline, durations within their own
    /// decomposition. Returns `None` for unordered datatypes, for values of
    /// different datatypes, and for NaN comparisons.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::YearMonthDuration(a), Self::YearMonthDuration(b)) => Some(a.cmp(b)),
            (Self::DayTimeDuration(a), Self::DayTimeDuration(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Serialized as `{ "datatype": <uri>, "value": <canonical form> }`.
impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AttributeValue", 2)?;
        s.serialize_field("datatype", self.datatype().uri())?;
        s.serialize_field("value", &self.canonical())?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Lexical {
            datatype: Datatype,
            value: String,
        }
        let lexical = Lexical::deserialize(deserializer)?;
        Self::parse(&lexical.datatype, &lexical.value).map_err(D::Error::custom)
    }
}

/// XML Schema double lexical space, including `INF`, `-INF`, and `NaN`.
fn parse_double(lexical: &str) -> Result<f64, ValueError> {
    match lexical.trim() {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other
            .parse::<f64>()
            .map_err(|e| ValueError::lexical("double", lexical, e.to_string())),
    }
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        value.to_string()
    }
}

/// Case-insensitive hex decode; canonical form is uppercase.
fn parse_hex(lexical: &str) -> Option<Vec<u8>> {
    if lexical.len() % 2 != 0 {
        return None;
    }
    let digit = |b: u8| -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    };
    lexical
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| Some(digit(pair[0])? << 4 | digit(pair[1])?))
        .collect()
}

fn format_hex(bytes: &[u8]) -> String {
    use fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
