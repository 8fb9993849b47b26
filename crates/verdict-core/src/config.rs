//! Engine configuration knobs.

use serde::{Deserialize, Serialize};

/// Tunable limits and toggles for policy loading and evaluation.
///
/// All knobs have conservative defaults; a host can deserialize this from
/// its own configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    /// Maximum depth of nested variable-definition references. `None`
    /// disables the check.
    pub max_variable_ref_depth: Option<usize>,

    /// Maximum length of a `PolicySetIdReference` chain, counted in policy
    /// set ids including the root. `None` disables the check.
    pub max_policy_ref_depth: Option<usize>,

    /// Keep only the highest version per policy id at load time.
    pub ignore_old_policy_versions: bool,

    /// When true, a request attribute without an issuer does not satisfy a
    /// designator that names one.
    pub strict_attribute_issuer_match: bool,

    /// Allow `//` descendant steps in attribute-selector paths, beyond the
    /// conformance subset.
    pub extended_selector_paths: bool,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            max_variable_ref_depth: Some(10),
            max_policy_ref_depth: Some(10),
            ignore_old_policy_versions: false,
            strict_attribute_issuer_match: false,
            extended_selector_paths: false,
        }
    }
}
