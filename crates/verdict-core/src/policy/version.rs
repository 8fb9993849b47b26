//! Policy versions and version match patterns.
//!
//! A version is a dotted sequence of numbers compared component-wise, the
//! shorter sequence ordering first on a tie (`1.0 < 1.0.0 < 1.1`). A
//! pattern adds `*` (matches exactly one number) and `+` (matches any
//! sequence of numbers, including none).

use std::cmp::Ordering;
use std::fmt;

use super::error::PolicyLoadError;
use crate::doc;

/// A parsed policy version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyVersion {
    components: Vec<u64>,
    text: String,
}

impl PolicyVersion {
    /// Parses a dotted numeric version such as `1.2.3`.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::InvalidVersion`] on empty or non-numeric
    /// components.
    pub fn parse(text: &str) -> Result<Self, PolicyLoadError> {
        let components = text
            .split('.')
            .map(|component| {
                component.parse::<u64>().map_err(|_| PolicyLoadError::InvalidVersion {
                    version: text.to_string(),
                    reason: format!("component '{component}' is not a number"),
                })
            })
            .collect::<Result<Vec<u64>, _>>()?;
        if components.is_empty() {
            return Err(PolicyLoadError::InvalidVersion {
                version: text.to_string(),
                reason: "empty version".to_string(),
            });
        }
        Ok(Self { components, text: text.to_string() })
    }

    /// The numeric components.
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl PartialOrd for PolicyVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PolicyVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternComponent {
    Number(u64),
    /// `*`: exactly one number, any value.
    AnyOne,
    /// `+`: any sequence of numbers, including none.
    AnySequence,
}

/// A version match pattern (`1.*.+`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPattern {
    components: Vec<PatternComponent>,
    text: String,
}

impl VersionPattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::InvalidVersionPattern`] on malformed input.
    pub fn parse(text: &str) -> Result<Self, PolicyLoadError> {
        let components = text
            .split('.')
            .map(|component| match component {
                "*" => Ok(PatternComponent::AnyOne),
                "+" => Ok(PatternComponent::AnySequence),
                number => number.parse::<u64>().map(PatternComponent::Number).map_err(|_| {
                    PolicyLoadError::InvalidVersionPattern {
                        pattern: text.to_string(),
                        reason: format!("component '{component}' is not a number, '*', or '+'"),
                    }
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if components.is_empty() {
            return Err(PolicyLoadError::InvalidVersionPattern {
                pattern: text.to_string(),
                reason: "empty pattern".to_string(),
            });
        }
        Ok(Self { components, text: text.to_string() })
    }

    /// True when the version matches this pattern.
    pub fn matches(&self, version: &PolicyVersion) -> bool {
        Self::matches_at(&self.components, version.components())
    }

    fn matches_at(pattern: &[PatternComponent], version: &[u64]) -> bool {
        match pattern.split_first() {
            None => version.is_empty(),
            Some((PatternComponent::AnySequence, rest)) => (0..=version.len())
                .any(|consumed| Self::matches_at(rest, &version[consumed..])),
            Some((head, rest)) => match version.split_first() {
                None => false,
                Some((value, tail)) => {
                    let head_matches = match head {
                        PatternComponent::Number(number) => number == value,
                        // AnySequence never reaches this arm; the match
                        // above consumes it.
                        PatternComponent::AnyOne | PatternComponent::AnySequence => true,
                    };
                    head_matches && Self::matches_at(rest, tail)
                }
            },
        }
    }

    /// The smallest version this pattern can match: `*` bottoms out at 0,
    /// `+` at the empty tail. Used for `EarliestVersion` bounds.
    pub fn min_version(&self) -> PolicyVersion {
        let mut components = Vec::new();
        for component in &self.components {
            match component {
                PatternComponent::Number(number) => components.push(*number),
                PatternComponent::AnyOne => components.push(0),
                PatternComponent::AnySequence => break,
            }
        }
        let text = components
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        PolicyVersion { components, text }
    }

    /// True when the version is at or below every version the pattern can
    /// match would allow, the `LatestVersion` bound; `*` and `+` are
    /// unbounded at their position.
    pub fn allows_as_latest(&self, version: &PolicyVersion) -> bool {
        let mut components = version.components().iter();
        for pattern_component in &self.components {
            match pattern_component {
                PatternComponent::AnyOne | PatternComponent::AnySequence => return true,
                PatternComponent::Number(bound) => match components.next() {
                    // Exhausted version: a shorter version orders earlier.
                    None => return true,
                    Some(value) if value < bound => return true,
                    Some(value) if value > bound => return false,
                    Some(_) => {}
                },
            }
        }
        // Pattern exhausted: any remaining version components order later.
        components.next().is_none()
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The version constraint triple a policy reference may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPatterns {
    /// Exact-match pattern (`Version`).
    pub version: Option<VersionPattern>,
    /// Lower bound (`EarliestVersion`).
    pub earliest: Option<VersionPattern>,
    /// Upper bound (`LatestVersion`).
    pub latest: Option<VersionPattern>,
}

impl VersionPatterns {
    /// Parses the constraints of a document reference. `None` when the
    /// reference is unconstrained.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::InvalidVersionPattern`] on malformed patterns.
    pub fn from_reference(reference: &doc::PolicyReference) -> Result<Option<Self>, PolicyLoadError> {
        if reference.version.is_none()
            && reference.earliest_version.is_none()
            && reference.latest_version.is_none()
        {
            return Ok(None);
        }
        let parse = |text: &Option<String>| -> Result<Option<VersionPattern>, PolicyLoadError> {
            text.as_deref().map(VersionPattern::parse).transpose()
        };
        Ok(Some(Self {
            version: parse(&reference.version)?,
            earliest: parse(&reference.earliest_version)?,
            latest: parse(&reference.latest_version)?,
        }))
    }

    /// True when a version satisfies all three constraints.
    pub fn matches(&self, version: &PolicyVersion) -> bool {
        if let Some(pattern) = &self.version {
            if !pattern.matches(version) {
                return false;
            }
        }
        if let Some(earliest) = &self.earliest {
            if *version < earliest.min_version() {
                return false;
            }
        }
        if let Some(latest) = &self.latest {
            if !latest.allows_as_latest(version) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(text: &str) -> PolicyVersion {
        PolicyVersion::parse(text).unwrap()
    }

    fn pattern(text: &str) -> VersionPattern {
        VersionPattern::parse(text).unwrap()
    }

    #[test]
    fn version_ordering_is_component_wise() {
        assert!(version("1.0") < version("1.1"));
        assert!(version("1.0") < version("1.0.0"));
        assert!(version("1.9") < version("1.10"));
        assert!(version("2") > version("1.9.9"));
        assert_eq!(version("1.0"), version("1.0"));
    }

    #[test]
    fn version_rejects_junk() {
        assert!(PolicyVersion::parse("").is_err());
        assert!(PolicyVersion::parse("1..2").is_err());
        assert!(PolicyVersion::parse("1.a").is_err());
        assert!(PolicyVersion::parse("-1").is_err());
    }

    #[test]
    fn star_matches_exactly_one_component() {
        let p = pattern("1.*");
        assert!(p.matches(&version("1.0")));
        assert!(p.matches(&version("1.42")));
        assert!(!p.matches(&version("1")));
        assert!(!p.matches(&version("1.0.0")));
        assert!(!p.matches(&version("2.0")));
    }

    #[test]
    fn plus_matches_any_tail() {
        let p = pattern("1.+");
        assert!(p.matches(&version("1")));
        assert!(p.matches(&version("1.0")));
        assert!(p.matches(&version("1.2.3")));
        assert!(!p.matches(&version("2.0")));

        let p = pattern("1.+.5");
        assert!(p.matches(&version("1.5")));
        assert!(p.matches(&version("1.2.3.5")));
        assert!(!p.matches(&version("1.5.2")));
    }

    #[test]
    fn pattern_rejects_junk() {
        assert!(VersionPattern::parse("").is_err());
        assert!(VersionPattern::parse("1.**").is_err());
        assert!(VersionPattern::parse("x").is_err());
    }

    #[test]
    fn earliest_bound_uses_min_version() {
        let constraints = VersionPatterns {
            earliest: Some(pattern("1.1")),
            ..VersionPatterns::default()
        };
        assert!(!constraints.matches(&version("1.0")));
        assert!(constraints.matches(&version("1.1")));
        assert!(constraints.matches(&version("2.0")));
    }

    #[test]
    fn latest_bound_is_pattern_aware() {
        let constraints = VersionPatterns {
            latest: Some(pattern("1.*")),
            ..VersionPatterns::default()
        };
        assert!(constraints.matches(&version("1.0")));
        assert!(constraints.matches(&version("1.9")));
        assert!(constraints.matches(&version("0.5")));
        assert!(!constraints.matches(&version("2.0")));

        let fixed = VersionPatterns {
            latest: Some(pattern("1.3")),
            ..VersionPatterns::default()
        };
        assert!(fixed.matches(&version("1.3")));
        assert!(fixed.matches(&version("1.2.9")));
        assert!(!fixed.matches(&version("1.3.1")));
        assert!(!fixed.matches(&version("1.4")));
    }

    #[test]
    fn triple_constraint() {
        let reference = doc::PolicyReference {
            id: "p".to_string(),
            version: Some("1.+".to_string()),
            earliest_version: Some("1.2".to_string()),
            latest_version: Some("1.5".to_string()),
        };
        let constraints = VersionPatterns::from_reference(&reference).unwrap().unwrap();
        assert!(!constraints.matches(&version("1.1")));
        assert!(constraints.matches(&version("1.2")));
        assert!(constraints.matches(&version("1.4.7")));
        assert!(!constraints.matches(&version("1.6")));
        assert!(!constraints.matches(&version("2.0")));
    }

    #[test]
    fn unconstrained_reference_yields_none() {
        let reference = doc::PolicyReference::to_id("p");
        assert!(VersionPatterns::from_reference(&reference).unwrap().is_none());
    }
}
