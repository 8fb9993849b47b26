//! Datatype identifiers and the datatype registry.
//!
//! XACML identifies datatypes by URI. The sixteen standard datatypes are
//! modelled as enum variants; anything else resolves to [`Datatype::Other`]
//! and must be registered with the [`DatatypeRegistry`] before the engine is
//! frozen. Values of a registered non-standard datatype carry their
//! canonical string form and compare by string equality.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ValueError;

/// XML Schema namespace prefix shared by most standard datatype URIs.
const XS: &str = "http://www.w3.org/2001/XMLSchema#";

/// URI of the x500Name datatype.
pub const X500_NAME_URI: &str = "urn:oasis:names:tc:xacml:1.0:data-type:x500Name";
/// URI of the rfc822Name datatype.
pub const RFC822_NAME_URI: &str = "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name";
/// URI of the dnsName datatype.
pub const DNS_NAME_URI: &str = "urn:oasis:names:tc:xacml:2.0:data-type:dnsName";
/// URI of the ipAddress datatype.
pub const IP_ADDRESS_URI: &str = "urn:oasis:names:tc:xacml:2.0:data-type:ipAddress";

/// A XACML datatype identifier.
///
/// `Datatype` resolution from a URI is total: unrecognized URIs map to
/// [`Datatype::Other`]. Whether such a datatype is *accepted* is decided by
/// the [`DatatypeRegistry`] at load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// `xs:string`.
    String,
    /// `xs:boolean`.
    Boolean,
    /// `xs:integer` (long-backed).
    Integer,
    /// `xs:double` (IEEE-754 binary64).
    Double,
    /// `xs:date`.
    Date,
    /// `xs:time`.
    Time,
    /// `xs:dateTime`.
    DateTime,
    /// `xs:yearMonthDuration`.
    YearMonthDuration,
    /// `xs:dayTimeDuration`.
    DayTimeDuration,
    /// `xs:anyURI`.
    AnyUri,
    /// `xs:hexBinary`.
    HexBinary,
    /// `xs:base64Binary`.
    Base64Binary,
    /// XACML x500Name.
    X500Name,
    /// XACML rfc822Name.
    Rfc822Name,
    /// XACML dnsName.
    DnsName,
    /// XACML ipAddress.
    IpAddress,
    /// A non-standard datatype, identified by its URI.
    Other(Arc<str>),
}

impl Datatype {
    /// Resolves a datatype URI. Never fails; unknown URIs become
    /// [`Datatype::Other`].
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            "http://www.w3.org/2001/XMLSchema#string" => Self::String,
            "http://www.w3.org/2001/XMLSchema#boolean" => Self::Boolean,
            "http://www.w3.org/2001/XMLSchema#integer" => Self::Integer,
            "http://www.w3.org/2001/XMLSchema#double" => Self::Double,
            "http://www.w3.org/2001/XMLSchema#date" => Self::Date,
            "http://www.w3.org/2001/XMLSchema#time" => Self::Time,
            "http://www.w3.org/2001/XMLSchema#dateTime" => Self::DateTime,
            "http://www.w3.org/2001/XMLSchema#yearMonthDuration" => Self::YearMonthDuration,
            "http://www.w3.org/2001/XMLSchema#dayTimeDuration" => Self::DayTimeDuration,
            "http://www.w3.org/2001/XMLSchema#anyURI" => Self::AnyUri,
            "http://www.w3.org/2001/XMLSchema#hexBinary" => Self::HexBinary,
            "http://www.w3.org/2001/XMLSchema#base64Binary" => Self::Base64Binary,
            X500_NAME_URI => Self::X500Name,
            RFC822_NAME_URI => Self::Rfc822Name,
            DNS_NAME_URI => Self::DnsName,
            IP_ADDRESS_URI => Self::IpAddress,
            other => Self::Other(Arc::from(other)),
        }
    }

    /// The full datatype URI.
    pub fn uri(&self) -> &str {
        match self {
            Self::String => "http://www.w3.org/2001/XMLSchema#string",
            Self::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            Self::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            Self::Double => "http://www.w3.org/2001/XMLSchema#double",
            Self::Date => "http://www.w3.org/2001/XMLSchema#date",
            Self::Time => "http://www.w3.org/2001/XMLSchema#time",
            Self::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            Self::YearMonthDuration => "http://www.w3.org/2001/XMLSchema#yearMonthDuration",
            Self::DayTimeDuration => "http://www.w3.org/2001/XMLSchema#dayTimeDuration",
            Self::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            Self::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            Self::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            Self::X500Name => X500_NAME_URI,
            Self::Rfc822Name => RFC822_NAME_URI,
            Self::DnsName => DNS_NAME_URI,
            Self::IpAddress => IP_ADDRESS_URI,
            Self::Other(uri) => uri,
        }
    }

    /// Short name used in standard function identifiers
    /// (e.g. `string` in `…:function:string-equal`).
    pub fn short_name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "dateTime",
            Self::YearMonthDuration => "yearMonthDuration",
            Self::DayTimeDuration => "dayTimeDuration",
            Self::AnyUri => "anyURI",
            Self::HexBinary => "hexBinary",
            Self::Base64Binary => "base64Binary",
            Self::X500Name => "x500Name",
            Self::Rfc822Name => "rfc822Name",
            Self::DnsName => "dnsName",
            Self::IpAddress => "ipAddress",
            Self::Other(uri) => uri,
        }
    }

    /// Returns true for the sixteen standard datatypes.
    pub const fn is_standard(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// The sixteen standard datatypes, in declaration order.
    pub const STANDARD: [Self; 16] = [
        Self::String,
        Self::Boolean,
        Self::Integer,
        Self::Double,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::YearMonthDuration,
        Self::DayTimeDuration,
        Self::AnyUri,
        Self::HexBinary,
        Self::Base64Binary,
        Self::X500Name,
        Self::Rfc822Name,
        Self::DnsName,
        Self::IpAddress,
    ];
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl Serialize for Datatype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.uri())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Ok(Self::from_uri(&uri))
    }
}

/// The static type of an expression: a datatype plus a cardinality
/// (single value or bag). Derived once at load time and used for
/// arity/type checking of function applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Element datatype.
    pub datatype: Datatype,
    /// True when the expression produces a bag.
    pub is_bag: bool,
}

impl ValueType {
    /// A single-value type.
    pub const fn value(datatype: Datatype) -> Self {
        Self { datatype, is_bag: false }
    }

    /// A bag type.
    pub const fn bag(datatype: Datatype) -> Self {
        Self { datatype, is_bag: true }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bag {
            write!(f, "bag of {}", self.datatype)
        } else {
            self.datatype.fmt(f)
        }
    }
}

/// Registry of accepted datatypes.
///
/// The standard datatypes are always accepted. Custom datatypes may be
/// registered before the engine is frozen; their values are kept in
/// canonical string form and compare by string equality.
#[derive(Debug, Clone, Default)]
pub struct DatatypeRegistry {
    custom: Vec<Arc<str>>,
}

impl DatatypeRegistry {
    /// Registry accepting exactly the standard datatypes.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Registers a custom datatype URI.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::DuplicateDatatype`] if the URI is already
    /// present (standard or custom).
    pub fn register(&mut self, uri: &str) -> Result<(), ValueError> {
        if Datatype::from_uri(uri).is_standard() || self.custom.iter().any(|c| &**c == uri) {
            return Err(ValueError::DuplicateDatatype { uri: uri.to_string() });
        }
        self.custom.push(Arc::from(uri));
        Ok(())
    }

    /// Resolves a URI to an accepted datatype.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownDatatype`] for URIs that are neither
    /// standard nor registered.
    pub fn resolve(&self, uri: &str) -> Result<Datatype, ValueError> {
        match Datatype::from_uri(uri) {
            Datatype::Other(id) => {
                if self.custom.iter().any(|c| *c == id) {
                    Ok(Datatype::Other(id))
                } else {
                    Err(ValueError::UnknownDatatype { uri: uri.to_string() })
                }
            }
            standard => Ok(standard),
        }
    }
}
