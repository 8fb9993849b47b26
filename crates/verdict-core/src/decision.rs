//! The decision lattice, status codes, and PEP actions.
//!
//! Indeterminate is a value, not an exception: failures at evaluation time
//! flow through the expression, rule, policy, and combiner layers as
//! [`Status`] values and surface as [`Decision::Indeterminate`] with an
//! extended kind recording which definite outcomes were still possible when
//! the failure occurred. Combining algorithms pattern-match on this lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::AttributeValue;

/// The effect a rule declares: Permit or Deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Access is granted.
    Permit,
    /// Access is refused.
    Deny,
}

impl Effect {
    /// The decision produced when a rule with this effect applies.
    pub const fn decision(self) -> Decision {
        match self {
            Self::Permit => Decision::Permit,
            Self::Deny => Decision::Deny,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => f.write_str("Permit"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// The sub-kind of an Indeterminate decision: which definite outcomes the
/// failed computation could have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedIndeterminate {
    /// Could only have been Permit: `Indeterminate{P}`.
    Permit,
    /// Could only have been Deny: `Indeterminate{D}`.
    Deny,
    /// Could have been either: `Indeterminate{DP}`.
    PermitDeny,
}

impl ExtendedIndeterminate {
    /// The kind an Indeterminate rule with the given effect produces.
    pub const fn from_effect(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }

    /// True when a Permit was still possible.
    pub const fn permit_possible(self) -> bool {
        matches!(self, Self::Permit | Self::PermitDeny)
    }

    /// True when a Deny was still possible.
    pub const fn deny_possible(self) -> bool {
        matches!(self, Self::Deny | Self::PermitDeny)
    }
}

/// An authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The request is permitted.
    Permit,
    /// The request is denied.
    Deny,
    /// No policy applies to the request.
    NotApplicable,
    /// Evaluation failed; the payload records what was still possible.
    Indeterminate(ExtendedIndeterminate),
}

impl Decision {
    /// True for Permit.
    pub const fn is_permit(self) -> bool {
        matches!(self, Self::Permit)
    }

    /// True for Deny.
    pub const fn is_deny(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// True for any Indeterminate kind.
    pub const fn is_indeterminate(self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => f.write_str("Permit"),
            Self::Deny => f.write_str("Deny"),
            Self::NotApplicable => f.write_str("NotApplicable"),
            Self::Indeterminate(ExtendedIndeterminate::Permit) => f.write_str("Indeterminate{P}"),
            Self::Indeterminate(ExtendedIndeterminate::Deny) => f.write_str("Indeterminate{D}"),
            Self::Indeterminate(ExtendedIndeterminate::PermitDeny) => f.write_str("Indeterminate{DP}"),
        }
    }
}

/// XACML status codes, in the standard code hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Evaluation succeeded.
    Ok,
    /// A required attribute was absent from the request.
    MissingAttribute,
    /// A value or path was not in its lexical space.
    SyntaxError,
    /// Any other runtime evaluation failure.
    ProcessingError,
}

impl StatusCode {
    /// The XACML status-code URN.
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            Self::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            Self::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            Self::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Serialized as the status-code URN, the only form peers see.
impl Serialize for StatusCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.uri())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        match uri.as_str() {
            "urn:oasis:names:tc:xacml:1.0:status:ok" => Ok(Self::Ok),
            "urn:oasis:names:tc:xacml:1.0:status:missing-attribute" => Ok(Self::MissingAttribute),
            "urn:oasis:names:tc:xacml:1.0:status:syntax-error" => Ok(Self::SyntaxError),
            "urn:oasis:names:tc:xacml:1.0:status:processing-error" => Ok(Self::ProcessingError),
            other => Err(serde::de::Error::custom(format!("unknown status code: {other}"))),
        }
    }
}

/// An evaluation status: a code plus an optional diagnostic message.
///
/// Used both as the payload of Indeterminate results and as an error value
/// inside the evaluator (`Result<_, Status>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub code: StatusCode,
    /// Optional human-readable detail. Never required for correctness.
    pub message: Option<String>,
}

impl Status {
    /// An `ok` status.
    pub const fn ok() -> Self {
        Self { code: StatusCode::Ok, message: None }
    }

    /// A `missing-attribute` status.
    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self { code: StatusCode::MissingAttribute, message: Some(message.into()) }
    }

    /// A `syntax-error` status.
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self { code: StatusCode::SyntaxError, message: Some(message.into()) }
    }

    /// A `processing-error` status.
    pub fn processing_error(message: impl Into<String>) -> Self {
        Self { code: StatusCode::ProcessingError, message: Some(message.into()) }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.code),
            None => self.code.fmt(f),
        }
    }
}

impl std::error::Error for Status {}

/// A fulfilled obligation or advice handed to the enforcement point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepAction {
    /// The obligation/advice identifier.
    pub id: String,
    /// Evaluated attribute assignments.
    pub assignments: Vec<AttributeAssignment>,
}

/// One evaluated attribute assignment inside a PEP action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    /// The assigned attribute id.
    pub attribute_id: String,
    /// Optional category qualifier.
    pub category: Option<String>,
    /// Optional issuer qualifier.
    pub issuer: Option<String>,
    /// The assigned value.
    pub value: AttributeValue,
}

/// The obligations and advice accompanying a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PepActions {
    /// Mandatory directives.
    pub obligations: Vec<PepAction>,
    /// Optional directives.
    pub advice: Vec<PepAction>,
}

impl PepActions {
    /// No actions.
    pub const fn none() -> Self {
        Self { obligations: Vec::new(), advice: Vec::new() }
    }

    /// True when there is neither an obligation nor an advice.
    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    /// Appends all actions from `other`.
    pub fn merge(&mut self, other: Self) {
        self.obligations.extend(other.obligations);
        self.advice.extend(other.advice);
    }
}

/// The outcome of evaluating a rule, policy, or policy set: a decision plus
/// the status and PEP actions that accompany it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    /// The decision.
    pub decision: Decision,
    /// Status detail; `None` stands for `ok`.
    pub status: Option<Status>,
    /// Obligations and advice whose `FulfillOn` matched the decision.
    pub actions: PepActions,
}

impl DecisionResult {
    /// A Permit carrying the given actions.
    pub const fn permit(actions: PepActions) -> Self {
        Self { decision: Decision::Permit, status: None, actions }
    }

    /// A Deny carrying the given actions.
    pub const fn deny(actions: PepActions) -> Self {
        Self { decision: Decision::Deny, status: None, actions }
    }

    /// The NotApplicable result. Carries nothing.
    pub const fn not_applicable() -> Self {
        Self {
            decision: Decision::NotApplicable,
            status: None,
            actions: PepActions::none(),
        }
    }

    /// An Indeterminate result with the given extended kind and status.
    pub const fn indeterminate(kind: ExtendedIndeterminate, status: Status) -> Self {
        Self {
            decision: Decision::Indeterminate(kind),
            status: Some(status),
            actions: PepActions::none(),
        }
    }

    /// The extended Indeterminate kind, when the decision is Indeterminate.
    pub const fn extended_indeterminate(&self) -> Option<ExtendedIndeterminate> {
        match self.decision {
            Decision::Indeterminate(kind) => Some(kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_bias_maps_to_extended_kind() {
        assert_eq!(
            ExtendedIndeterminate::from_effect(Effect::Deny),
            ExtendedIndeterminate::Deny
        );
        assert_eq!(
            ExtendedIndeterminate::from_effect(Effect::Permit),
            ExtendedIndeterminate::Permit
        );
        assert!(ExtendedIndeterminate::PermitDeny.permit_possible());
        assert!(ExtendedIndeterminate::PermitDeny.deny_possible());
        assert!(!ExtendedIndeterminate::Permit.deny_possible());
    }

    #[test]
    fn decision_display() {
        assert_eq!(Decision::Permit.to_string(), "Permit");
        assert_eq!(
            Decision::Indeterminate(ExtendedIndeterminate::PermitDeny).to_string(),
            "Indeterminate{DP}"
        );
    }

    #[test]
    fn status_display_includes_code_uri() {
        let status = Status::missing_attribute("no subject-id");
        assert!(status.to_string().contains("missing-attribute"));
        assert!(status.to_string().contains("no subject-id"));
    }

    #[test]
    fn status_code_serde_uses_urns() {
        let json = serde_json::to_string(&StatusCode::MissingAttribute).unwrap();
        assert_eq!(json, r#""urn:oasis:names:tc:xacml:1.0:status:missing-attribute""#);
        let back: StatusCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusCode::MissingAttribute);
        assert!(serde_json::from_str::<StatusCode>(r#""urn:other""#).is_err());
    }

    #[test]
    fn not_applicable_carries_nothing() {
        let result = DecisionResult::not_applicable();
        assert!(result.actions.is_empty());
        assert!(result.status.is_none());
    }

    #[test]
    fn pep_actions_merge() {
        let action = |id: &str| PepAction { id: id.to_string(), assignments: vec![] };
        let mut left = PepActions { obligations: vec![action("a")], advice: vec![] };
        let right = PepActions { obligations: vec![action("b")], advice: vec![action("c")] };
        left.merge(right);
        assert_eq!(left.obligations.len(), 2);
        assert_eq!(left.advice.len(), 1);
    }
}
