//! The static policy provider: corpus indexing and reference resolution.
//!
//! Loading is a two-phase pass over an already-parsed corpus. Policies
//! compile immediately into an id → versions table. Policy sets are first
//! collected raw (they may refer to each other in any order) and then
//! eagerly compiled through a bootstrap resolver that follows
//! `Policy(Set)IdReference`s, building referents on demand, caching every
//! finished evaluator, and guarding the active reference chain against
//! cycles and depth overflow. After a successful load every reference is
//! a direct handle; evaluation never resolves anything again.

mod error;
mod location;

pub use error::ProviderError;
pub use location::PolicyLocation;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::doc;
use crate::policy::{
    CompileEnv, PolicyEvaluator, PolicyLoadError, PolicyResolver, PolicySetEvaluator,
    PolicyVersion, RefChain, TopLevelEvaluator, VersionPatterns,
};

/// The versions of one policy id, iterated newest first for tie-breaks.
#[derive(Debug, Clone)]
pub struct PolicyVersions<P> {
    versions: BTreeMap<PolicyVersion, P>,
}

impl<P> Default for PolicyVersions<P> {
    fn default() -> Self {
        Self { versions: BTreeMap::new() }
    }
}

impl<P> PolicyVersions<P> {
    fn insert(&mut self, version: PolicyVersion, value: P) -> Option<P> {
        self.versions.insert(version, value)
    }

    /// The newest version satisfying the constraints, if any.
    pub fn latest(&self, constraints: Option<&VersionPatterns>) -> Option<(&PolicyVersion, &P)> {
        self.versions
            .iter()
            .rev()
            .find(|(version, _)| constraints.map_or(true, |c| c.matches(version)))
    }

    /// All versions, newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = (&PolicyVersion, &P)> {
        self.versions.iter().rev()
    }

    fn holds_at_or_above(&self, version: &PolicyVersion) -> bool {
        self.versions.keys().any(|existing| existing >= version)
    }

    fn clear(&mut self) {
        self.versions.clear();
    }
}

/// Mapping from policy id to its versions, preserving first-seen id order
/// so candidate-root probing and diagnostics stay deterministic.
#[derive(Debug, Clone)]
pub struct PolicyMap<P> {
    entries: IndexMap<String, PolicyVersions<P>>,
}

impl<P> Default for PolicyMap<P> {
    fn default() -> Self {
        Self { entries: IndexMap::new() }
    }
}

impl<P> PolicyMap<P> {
    fn insert(&mut self, id: &str, version: PolicyVersion, value: P) -> Option<P> {
        self.entries.entry(id.to_string()).or_default().insert(version, value)
    }

    /// The versions loaded for an id.
    pub fn versions(&self, id: &str) -> Option<&PolicyVersions<P>> {
        self.entries.get(id)
    }

    /// The newest version of `id` satisfying the constraints.
    pub fn latest(&self, id: &str, constraints: Option<&VersionPatterns>) -> Option<(&PolicyVersion, &P)> {
        self.entries.get(id).and_then(|versions| versions.latest(constraints))
    }

    /// Iterates ids in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyVersions<P>)> {
        self.entries.iter().map(|(id, versions)| (id.as_str(), versions))
    }

    /// True when no id is loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn single_id(&self) -> Option<&str> {
        if self.entries.len() == 1 {
            self.entries.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    fn clear_id(&mut self, id: &str) {
        if let Some(versions) = self.entries.get_mut(id) {
            versions.clear();
        }
    }
}

/// The frozen, fully-linked policy corpus.
pub struct StaticPolicyProvider {
    policies: PolicyMap<Arc<PolicyEvaluator>>,
    policy_sets: PolicyMap<Arc<PolicySetEvaluator>>,
    max_ref_depth: Option<usize>,
}

impl StaticPolicyProvider {
    /// Loads a corpus: compiles every policy, then every policy set
    /// (resolving references eagerly), rejecting duplicates, cycles, and
    /// over-deep chains.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; load failures are fatal and name the
    /// offending element.
    pub fn load(
        policies: &[doc::Policy],
        policy_sets: &[doc::PolicySet],
        env: CompileEnv<'_>,
    ) -> Result<Self, ProviderError> {
        if policies.is_empty() && policy_sets.is_empty() {
            return Err(ProviderError::EmptyCorpus);
        }
        let ignore_old = env.config.ignore_old_policy_versions;

        let mut policy_map: PolicyMap<Arc<PolicyEvaluator>> = PolicyMap::default();
        for node in policies {
            let version = parse_version("policy", &node.policy_id, &node.version)?;
            if ignore_old {
                if let Some(versions) = policy_map.versions(&node.policy_id) {
                    if versions.holds_at_or_above(&version) {
                        debug!(policy_id = %node.policy_id, version = %version, "skipping old policy version");
                        continue;
                    }
                }
                policy_map.clear_id(&node.policy_id);
            }
            let evaluator = PolicyEvaluator::compile(node, &env)?;
            if policy_map.insert(&node.policy_id, version, evaluator).is_some() {
                return Err(ProviderError::DuplicatePolicy {
                    id: node.policy_id.clone(),
                    version: node.version.clone(),
                });
            }
        }

        let mut raw_sets: PolicyMap<doc::PolicySet> = PolicyMap::default();
        for node in policy_sets {
            let version = parse_version("policy set", &node.policy_set_id, &node.version)?;
            if ignore_old {
                if let Some(versions) = raw_sets.versions(&node.policy_set_id) {
                    if versions.holds_at_or_above(&version) {
                        debug!(policy_set_id = %node.policy_set_id, version = %version, "skipping old policy set version");
                        continue;
                    }
                }
                raw_sets.clear_id(&node.policy_set_id);
            }
            // Policy sets cannot compile until all are collected: any of
            // them may refer to any other.
            if raw_sets.insert(&node.policy_set_id, version, node.clone()).is_some() {
                return Err(ProviderError::DuplicatePolicySet {
                    id: node.policy_set_id.clone(),
                    version: node.version.clone(),
                });
            }
        }

        let bootstrap = BootstrapResolver {
            env,
            policies: &policy_map,
            raw_sets: &raw_sets,
            compiled: RefCell::new(HashMap::new()),
        };

        let mut set_map: PolicyMap<Arc<PolicySetEvaluator>> = PolicyMap::default();
        for (id, versions) in raw_sets.iter() {
            for (version, raw) in versions.newest_first() {
                // A reference from an earlier policy set may already have
                // built this one.
                let evaluator = match bootstrap.cached(id, version) {
                    Some(evaluator) => evaluator,
                    None => {
                        let mut chain = RefChain::new(env.config.max_policy_ref_depth);
                        chain.push(id).map_err(ProviderError::Load)?;
                        let evaluator = PolicySetEvaluator::compile(raw, &env, &bootstrap, &mut chain)?;
                        bootstrap.cache(id, version, &evaluator);
                        evaluator
                    }
                };
                set_map.insert(id, version.clone(), evaluator);
            }
        }

        debug!(
            policies = policy_map.len(),
            policy_sets = set_map.len(),
            "policy corpus loaded"
        );
        Ok(Self {
            policies: policy_map,
            policy_sets: set_map,
            max_ref_depth: env.config.max_policy_ref_depth,
        })
    }

    /// The newest loaded policy matching the constraints.
    pub fn policy(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
    ) -> Option<Arc<PolicyEvaluator>> {
        self.policies.latest(id, constraints).map(|(_, evaluator)| Arc::clone(evaluator))
    }

    /// The newest loaded policy set matching the constraints, re-checking
    /// that joining it onto `active_chain` stays within the depth limit.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::ReferenceDepthExceeded`] (or a cycle) on the
    /// joined chain; an evaluation-time caller maps this to a
    /// `processing-error` Indeterminate.
    pub fn policy_set(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
        active_chain: &mut RefChain,
    ) -> Result<Option<Arc<PolicySetEvaluator>>, PolicyLoadError> {
        let Some((_, evaluator)) = self.policy_sets.latest(id, constraints) else {
            return Ok(None);
        };
        active_chain.push(id)?;
        let check = active_chain.join_check(evaluator.longest_ref_chain());
        active_chain.pop();
        check?;
        Ok(Some(Arc::clone(evaluator)))
    }

    /// A fresh reference chain under this provider's depth limit.
    pub fn new_ref_chain(&self) -> RefChain {
        RefChain::new(self.max_ref_depth)
    }

    /// The candidate root: the latest version of the one and only policy
    /// (when the corpus has no policy sets), else the latest version of
    /// the one and only policy set, else `None`; the host must configure
    /// the root explicitly.
    pub fn candidate_root(&self) -> Option<TopLevelEvaluator> {
        if self.policy_sets.is_empty() {
            let id = self.policies.single_id()?;
            let (_, evaluator) = self.policies.latest(id, None)?;
            return Some(TopLevelEvaluator::Policy(Arc::clone(evaluator)));
        }
        let id = self.policy_sets.single_id()?;
        let (_, evaluator) = self.policy_sets.latest(id, None)?;
        Some(TopLevelEvaluator::PolicySet(Arc::clone(evaluator)))
    }

    /// The loaded policies.
    pub const fn policies(&self) -> &PolicyMap<Arc<PolicyEvaluator>> {
        &self.policies
    }

    /// The loaded policy sets.
    pub const fn policy_sets(&self) -> &PolicyMap<Arc<PolicySetEvaluator>> {
        &self.policy_sets
    }
}

impl std::fmt::Debug for StaticPolicyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPolicyProvider")
            .field("policies", &self.policies.len())
            .field("policy_sets", &self.policy_sets.len())
            .finish_non_exhaustive()
    }
}

fn parse_version(kind: &'static str, id: &str, text: &str) -> Result<PolicyVersion, ProviderError> {
    PolicyVersion::parse(text)
        .map_err(|source| ProviderError::Load(PolicyLoadError::in_element(kind, id, text, source)))
}

/// The load-time resolver: resolves references against the corpus being
/// built, compiling referents on first use.
struct BootstrapResolver<'a> {
    env: CompileEnv<'a>,
    policies: &'a PolicyMap<Arc<PolicyEvaluator>>,
    raw_sets: &'a PolicyMap<doc::PolicySet>,
    compiled: RefCell<HashMap<(String, PolicyVersion), Arc<PolicySetEvaluator>>>,
}

impl BootstrapResolver<'_> {
    fn cached(&self, id: &str, version: &PolicyVersion) -> Option<Arc<PolicySetEvaluator>> {
        self.compiled.borrow().get(&(id.to_string(), version.clone())).cloned()
    }

    fn cache(&self, id: &str, version: &PolicyVersion, evaluator: &Arc<PolicySetEvaluator>) {
        self.compiled
            .borrow_mut()
            .insert((id.to_string(), version.clone()), Arc::clone(evaluator));
    }
}

impl PolicyResolver for BootstrapResolver<'_> {
    fn policy(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
    ) -> Result<Option<Arc<PolicyEvaluator>>, PolicyLoadError> {
        Ok(self.policies.latest(id, constraints).map(|(_, evaluator)| Arc::clone(evaluator)))
    }

    fn policy_set(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
        chain: &mut RefChain,
    ) -> Result<Option<Arc<PolicySetEvaluator>>, PolicyLoadError> {
        let Some((version, raw)) = self.raw_sets.latest(id, constraints) else {
            return Ok(None);
        };

        if let Some(evaluator) = self.cached(id, version) {
            // Already built: the join of the active chain with this
            // evaluator's longest downstream chain must still fit.
            chain.push(id)?;
            let check = chain.join_check(evaluator.longest_ref_chain());
            chain.pop();
            check?;
            return Ok(Some(evaluator));
        }

        chain.push(id)?;
        let result = PolicySetEvaluator::compile(raw, &self.env, self, chain);
        chain.pop();
        let evaluator = result?;
        self.cache(id, version, &evaluator);
        Ok(Some(evaluator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::{ids, CombiningAlgRegistry};
    use crate::config::PdpConfig;
    use crate::context::{categories, DecisionRequest, EvaluationContext};
    use crate::decision::{Decision, Effect};
    use crate::function::FunctionRegistry;
    use crate::value::{AttributeValue, DatatypeRegistry};

    struct Fixture {
        functions: FunctionRegistry,
        datatypes: DatatypeRegistry,
        combining: CombiningAlgRegistry,
        config: PdpConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(PdpConfig::default())
        }

        fn with_config(config: PdpConfig) -> Self {
            Self {
                functions: FunctionRegistry::standard(),
                datatypes: DatatypeRegistry::standard(),
                combining: CombiningAlgRegistry::standard(),
                config,
            }
        }

        fn env(&self) -> CompileEnv<'_> {
            CompileEnv {
                functions: &self.functions,
                datatypes: &self.datatypes,
                combining: &self.combining,
                config: &self.config,
            }
        }
    }

    fn permit_policy(id: &str, version: &str) -> doc::Policy {
        doc::Policy {
            policy_id: id.to_string(),
            version: version.to_string(),
            description: None,
            target: None,
            rule_combining_alg_id: ids::RULE_PERMIT_OVERRIDES.to_string(),
            variable_definitions: vec![],
            rules: vec![doc::Rule {
                rule_id: "permit".to_string(),
                effect: Effect::Permit,
                description: None,
                target: None,
                condition: None,
                obligations: vec![],
                advice: vec![],
            }],
            obligations: vec![],
            advice: vec![],
        }
    }

    fn referencing_set(id: &str, target: &str) -> doc::PolicySet {
        doc::PolicySet {
            policy_set_id: id.to_string(),
            version: "1.0".to_string(),
            description: None,
            target: None,
            policy_combining_alg_id: ids::POLICY_DENY_OVERRIDES.to_string(),
            children: vec![doc::PolicySetChild::PolicySetIdReference(
                doc::PolicyReference::to_id(target),
            )],
            obligations: vec![],
            advice: vec![],
        }
    }

    fn leaf_set(id: &str) -> doc::PolicySet {
        doc::PolicySet {
            policy_set_id: id.to_string(),
            version: "1.0".to_string(),
            description: None,
            target: None,
            policy_combining_alg_id: ids::POLICY_DENY_OVERRIDES.to_string(),
            children: vec![doc::PolicySetChild::Policy(permit_policy("leaf-policy", "1.0"))],
            obligations: vec![],
            advice: vec![],
        }
    }

    #[test]
    fn duplicate_policy_version_is_fatal() {
        let fixture = Fixture::new();
        let err = StaticPolicyProvider::load(
            &[permit_policy("p", "1.0"), permit_policy("p", "1.0")],
            &[],
            fixture.env(),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::DuplicatePolicy { .. }));
    }

    #[test]
    fn empty_corpus_is_fatal() {
        let fixture = Fixture::new();
        let err = StaticPolicyProvider::load(&[], &[], fixture.env()).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyCorpus));
    }

    #[test]
    fn ignore_old_versions_keeps_only_newest() {
        let fixture = Fixture::with_config(PdpConfig {
            ignore_old_policy_versions: true,
            ..PdpConfig::default()
        });
        let provider = StaticPolicyProvider::load(
            &[
                permit_policy("p", "1.0"),
                permit_policy("p", "2.0"),
                permit_policy("p", "1.5"),
            ],
            &[],
            fixture.env(),
        )
        .unwrap();
        let versions = provider.policies().versions("p").unwrap();
        let loaded: Vec<String> = versions.newest_first().map(|(v, _)| v.to_string()).collect();
        assert_eq!(loaded, ["2.0"]);
    }

    #[test]
    fn version_constraints_select_the_latest_match() {
        let fixture = Fixture::new();
        let provider = StaticPolicyProvider::load(
            &[
                permit_policy("p", "1.0"),
                permit_policy("p", "1.5"),
                permit_policy("p", "2.0"),
            ],
            &[],
            fixture.env(),
        )
        .unwrap();

        let constraints = VersionPatterns::from_reference(&doc::PolicyReference {
            id: "p".to_string(),
            version: Some("1.+".to_string()),
            earliest_version: None,
            latest_version: None,
        })
        .unwrap();
        let (version, _) = provider
            .policies()
            .latest("p", constraints.as_ref())
            .unwrap();
        assert_eq!(version.to_string(), "1.5");
    }

    #[test]
    fn references_link_across_policy_sets() {
        let fixture = Fixture::new();
        let provider = StaticPolicyProvider::load(
            &[],
            &[referencing_set("a", "b"), leaf_set("b")],
            fixture.env(),
        )
        .unwrap();

        let root = provider
            .policy_set("a", None, &mut provider.new_ref_chain())
            .unwrap()
            .unwrap();
        assert_eq!(root.longest_ref_chain(), ["b".to_string()]);

        let request = DecisionRequest::builder()
            .attribute(categories::SUBJECT, "subject-id", AttributeValue::string("x"))
            .build();
        let ctx = EvaluationContext::new(&request, &fixture.config);
        assert_eq!(
            crate::combining::CombinerElement::evaluate(&*root, &ctx).decision,
            Decision::Permit
        );
    }

    #[test]
    fn reference_cycle_is_fatal() {
        let fixture = Fixture::new();
        let err = StaticPolicyProvider::load(
            &[],
            &[referencing_set("a", "b"), referencing_set("b", "a")],
            fixture.env(),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cycle"), "got: {message}");
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let fixture = Fixture::new();
        let err = StaticPolicyProvider::load(&[], &[referencing_set("a", "a")], fixture.env())
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn reference_chain_depth_is_bounded() {
        let fixture = Fixture::with_config(PdpConfig {
            max_policy_ref_depth: Some(2),
            ..PdpConfig::default()
        });
        // a -> b -> c is a chain of three ids.
        let err = StaticPolicyProvider::load(
            &[],
            &[
                referencing_set("a", "b"),
                referencing_set("b", "c"),
                leaf_set("c"),
            ],
            fixture.env(),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains('a') && message.contains('b') && message.contains('c'));
        assert!(message.contains("depth"), "got: {message}");
    }

    #[test]
    fn depth_two_chain_loads_under_limit_two() {
        let fixture = Fixture::with_config(PdpConfig {
            max_policy_ref_depth: Some(2),
            ..PdpConfig::default()
        });
        let provider = StaticPolicyProvider::load(
            &[],
            &[referencing_set("a", "b"), leaf_set("b")],
            fixture.env(),
        )
        .unwrap();
        assert_eq!(provider.policy_sets().len(), 2);
    }

    #[test]
    fn disabled_depth_limit_allows_long_chains() {
        let fixture = Fixture::with_config(PdpConfig {
            max_policy_ref_depth: None,
            ..PdpConfig::default()
        });
        let mut sets: Vec<doc::PolicySet> = (0..20)
            .map(|i| referencing_set(&format!("s{i}"), &format!("s{}", i + 1)))
            .collect();
        sets.push(leaf_set("s20"));
        let provider = StaticPolicyProvider::load(&[], &sets, fixture.env()).unwrap();
        assert_eq!(provider.policy_sets().len(), 21);
    }

    #[test]
    fn shared_reference_is_compiled_once_and_join_checked() {
        // a -> shared, b -> shared: the second resolution hits the cache
        // and only re-checks the joined chain.
        let fixture = Fixture::new();
        let provider = StaticPolicyProvider::load(
            &[],
            &[
                referencing_set("a", "shared"),
                referencing_set("b", "shared"),
                leaf_set("shared"),
            ],
            fixture.env(),
        )
        .unwrap();
        assert_eq!(provider.policy_sets().len(), 3);
    }

    #[test]
    fn candidate_root_prefers_single_policy_then_single_set() {
        let fixture = Fixture::new();
        let provider =
            StaticPolicyProvider::load(&[permit_policy("only", "1.0")], &[], fixture.env()).unwrap();
        let root = provider.candidate_root().unwrap();
        assert_eq!(root.id(), "only");

        let provider = StaticPolicyProvider::load(
            &[permit_policy("p1", "1.0"), permit_policy("p2", "1.0")],
            &[],
            fixture.env(),
        )
        .unwrap();
        assert!(provider.candidate_root().is_none());

        let provider = StaticPolicyProvider::load(
            &[permit_policy("p1", "1.0")],
            &[leaf_set("the-set")],
            fixture.env(),
        )
        .unwrap();
        // A policy set exists, so the single policy is not the candidate;
        // the single policy set is.
        let root = provider.candidate_root().unwrap();
        assert_eq!(root.id(), "the-set");
    }

    #[test]
    fn candidate_root_uses_latest_version() {
        let fixture = Fixture::new();
        let provider = StaticPolicyProvider::load(
            &[permit_policy("only", "1.0"), permit_policy("only", "3.2")],
            &[],
            fixture.env(),
        )
        .unwrap();
        let root = provider.candidate_root().unwrap();
        assert_eq!(root.version().to_string(), "3.2");
    }
}
