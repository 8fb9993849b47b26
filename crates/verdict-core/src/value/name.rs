//! Name-shaped payloads: x500Name, rfc822Name, dnsName, ipAddress.

use std::fmt;
use std::net::IpAddr;

use super::error::ValueError;

/// An X.500 distinguished name, kept as its RDN sequence.
///
/// Equality is case-insensitive per component with surrounding whitespace
/// ignored. Escaped commas inside attribute values are not supported.
#[derive(Debug, Clone)]
pub struct X500Name {
    original: String,
    rdns: Vec<String>,
}

impl X500Name {
    /// Parses a comma-separated RDN sequence such as
    /// `cn=John Doe, o=Medico Corp, c=US`.
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let rdns: Vec<String> = lexical
            .split(',')
            .map(|rdn| rdn.trim().to_lowercase())
            .collect();
        if rdns.iter().any(|rdn| rdn.is_empty() || !rdn.contains('=')) {
            return Err(ValueError::lexical("x500Name", lexical, "expected attr=value RDNs"));
        }
        Ok(Self { original: lexical.trim().to_string(), rdns })
    }

    /// True when `self` is a terminal (least-significant-first suffix)
    /// RDN sequence of `other`, the `x500Name-match` relation.
    pub fn is_terminal_sequence_of(&self, other: &Self) -> bool {
        self.rdns.len() <= other.rdns.len() && other.rdns[other.rdns.len() - self.rdns.len()..] == self.rdns[..]
    }
}

impl PartialEq for X500Name {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// An RFC 822 (email-style) name. The local part is case-sensitive, the
/// domain is not.
#[derive(Debug, Clone)]
pub struct Rfc822Name {
    local: String,
    domain: String,
}

impl Rfc822Name {
    /// Parses `local@domain`.
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let mut parts = lexical.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => Ok(Self {
                local: local.to_string(),
                domain: domain.to_string(),
            }),
            _ => Err(ValueError::lexical("rfc822Name", lexical, "expected local@domain")),
        }
    }

    /// The `rfc822Name-match` relation: `pattern` is a full address
    /// (`Anne.Anderson@sun.com`), a whole domain (`sun.com`), or a domain
    /// suffix (`.east.sun.com`).
    pub fn matches(&self, pattern: &str) -> bool {
        let domain_lower = self.domain.to_lowercase();
        if let Some((local, domain)) = pattern.split_once('@') {
            return self.local == local && domain_lower == domain.to_lowercase();
        }
        let pattern_lower = pattern.to_lowercase();
        if pattern_lower.starts_with('.') {
            domain_lower.ends_with(&pattern_lower)
        } else {
            domain_lower == pattern_lower
        }
    }
}

impl PartialEq for Rfc822Name {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.domain.eq_ignore_ascii_case(&other.domain)
    }
}

impl fmt::Display for Rfc822Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// A DNS host name with an optional leading wildcard and port range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsName {
    host: String,
    port_range: Option<PortRange>,
}

impl DnsName {
    /// Parses `host[:portrange]`, where host may start with `*.`.
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let (host, port_range) = match lexical.split_once(':') {
            Some((host, range)) => (host, Some(PortRange::parse(range).map_err(|reason| {
                ValueError::lexical("dnsName", lexical, reason)
            })?)),
            None => (lexical, None),
        };
        let label_part = host.strip_prefix("*.").unwrap_or(host);
        let valid = !label_part.is_empty()
            && label_part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
        if !valid {
            return Err(ValueError::lexical("dnsName", lexical, "invalid host name"));
        }
        Ok(Self { host: host.to_lowercase(), port_range })
    }

    /// The host part, lowercased.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port_range {
            Some(range) => write!(f, "{}:{range}", self.host),
            None => f.write_str(&self.host),
        }
    }
}

/// An IP address with optional mask and port range.
///
/// IPv6 forms use brackets: `[::1]/[ffff::]:8080-8090`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddressValue {
    address: IpAddr,
    mask: Option<IpAddr>,
    port_range: Option<PortRange>,
}

impl IpAddressValue {
    /// Parses the XACML ipAddress lexical form.
    pub fn parse(lexical: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::lexical("ipAddress", lexical, reason);
        let (address, mask, range) = if lexical.starts_with('[') {
            Self::split_v6(lexical).ok_or_else(|| err("malformed IPv6 form"))?
        } else {
            Self::split_v4(lexical)
        };

        let address: IpAddr = address.parse().map_err(|_| err("invalid address"))?;
        let mask = match mask {
            Some(mask) => Some(mask.parse().map_err(|_| err("invalid mask"))?),
            None => None,
        };
        let port_range = match range {
            Some(range) => Some(PortRange::parse(range).map_err(|reason| err(&reason))?),
            None => None,
        };
        Ok(Self { address, mask, port_range })
    }

    fn split_v4(lexical: &str) -> (&str, Option<&str>, Option<&str>) {
        let (addr_mask, range) = match lexical.split_once(':') {
            Some((head, range)) => (head, Some(range)),
            None => (lexical, None),
        };
        match addr_mask.split_once('/') {
            Some((addr, mask)) => (addr, Some(mask), range),
            None => (addr_mask, None, range),
        }
    }

    /// `[addr]` `[addr]/[mask]` `[addr]:range` `[addr]/[mask]:range`
    fn split_v6(lexical: &str) -> Option<(&str, Option<&str>, Option<&str>)> {
        let rest = lexical.strip_prefix('[')?;
        let (addr, rest) = rest.split_once(']')?;
        if rest.is_empty() {
            return Some((addr, None, None));
        }
        if let Some(rest) = rest.strip_prefix("/[") {
            let (mask, rest) = rest.split_once(']')?;
            return match rest.strip_prefix(':') {
                Some(range) => Some((addr, Some(mask), Some(range))),
                None if rest.is_empty() => Some((addr, Some(mask), None)),
                None => None,
            };
        }
        rest.strip_prefix(':').map(|range| (addr, None, Some(range)))
    }

    /// The bare address.
    pub const fn address(&self) -> IpAddr {
        self.address
    }
}

impl fmt::Display for IpAddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v6 = self.address.is_ipv6();
        if v6 {
            write!(f, "[{}]", self.address)?;
        } else {
            write!(f, "{}", self.address)?;
        }
        if let Some(mask) = &self.mask {
            if v6 {
                write!(f, "/[{mask}]")?;
            } else {
                write!(f, "/{mask}")?;
            }
        }
        if let Some(range) = &self.port_range {
            write!(f, ":{range}")?;
        }
        Ok(())
    }
}

/// A port or inclusive port range: `80`, `80-443`, `-443`, `1024-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    lower: Option<u16>,
    upper: Option<u16>,
}

impl PortRange {
    fn parse(lexical: &str) -> Result<Self, String> {
        let parse_port = |s: &str| -> Result<Option<u16>, String> {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u16>().map(Some).map_err(|_| format!("invalid port '{s}'"))
            }
        };
        match lexical.split_once('-') {
            Some((low, high)) => {
                let range = Self { lower: parse_port(low)?, upper: parse_port(high)? };
                if range.lower.is_none() && range.upper.is_none() {
                    return Err("empty port range".to_string());
                }
                Ok(range)
            }
            None => {
                let port = parse_port(lexical)?.ok_or_else(|| "empty port".to_string())?;
                Ok(Self { lower: Some(port), upper: Some(port) })
            }
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(low), Some(high)) if low == high => write!(f, "{low}"),
            (low, high) => {
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                f.write_str("-")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x500_equality_is_case_insensitive() {
        let a = X500Name::parse("CN=John Doe, O=Medico Corp, C=US").unwrap();
        let b = X500Name::parse("cn=john doe,o=medico corp,c=us").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn x500_terminal_sequence_match() {
        let whole = X500Name::parse("cn=John Doe, o=Medico Corp, c=US").unwrap();
        let suffix = X500Name::parse("o=Medico Corp, c=US").unwrap();
        let other = X500Name::parse("o=Other Corp, c=US").unwrap();

        assert!(suffix.is_terminal_sequence_of(&whole));
        assert!(whole.is_terminal_sequence_of(&whole));
        assert!(!other.is_terminal_sequence_of(&whole));
        assert!(!whole.is_terminal_sequence_of(&suffix));
    }

    #[test]
    fn x500_rejects_junk() {
        assert!(X500Name::parse("no rdn here").is_err());
        assert!(X500Name::parse("cn=a,,c=us").is_err());
    }

    #[test]
    fn rfc822_match_forms() {
        let name = Rfc822Name::parse("Anne.Anderson@East.Sun.COM").unwrap();
        assert!(name.matches("Anne.Anderson@east.sun.com"));
        assert!(!name.matches("anne.anderson@east.sun.com"), "local part is case-sensitive");
        assert!(name.matches("east.sun.com"));
        assert!(name.matches(".sun.com"));
        assert!(!name.matches("sun.com"));
    }

    #[test]
    fn dns_name_with_wildcard_and_range() {
        let name = DnsName::parse("*.example.com:8080-8090").unwrap();
        assert_eq!(name.host(), "*.example.com");
        assert_eq!(name.to_string(), "*.example.com:8080-8090");
        assert!(DnsName::parse("bad host").is_err());
    }

    #[test]
    fn ip_address_forms() {
        let v4 = IpAddressValue::parse("10.0.0.1/255.0.0.0:80-443").unwrap();
        assert_eq!(v4.to_string(), "10.0.0.1/255.0.0.0:80-443");

        let v6 = IpAddressValue::parse("[::1]:8080").unwrap();
        assert_eq!(v6.to_string(), "[::1]:8080");

        let v6_masked = IpAddressValue::parse("[2001:db8::1]/[ffff:ffff::]").unwrap();
        assert_eq!(v6_masked.to_string(), "[2001:db8::1]/[ffff:ffff::]");

        assert!(IpAddressValue::parse("not-an-ip").is_err());
        assert!(IpAddressValue::parse("[::1").is_err());
    }

    #[test]
    fn port_range_forms() {
        assert_eq!(PortRange::parse("80").unwrap().to_string(), "80");
        assert_eq!(PortRange::parse("80-443").unwrap().to_string(), "80-443");
        assert_eq!(PortRange::parse("-443").unwrap().to_string(), "-443");
        assert_eq!(PortRange::parse("1024-").unwrap().to_string(), "1024-");
        assert!(PortRange::parse("-").is_err());
        assert!(PortRange::parse("99999").is_err());
    }
}
