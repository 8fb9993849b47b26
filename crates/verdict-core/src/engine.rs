//! Engine assembly: builder, freeze, and the decide entry point.
//!
//! The builder collects registries (datatypes, functions, combining
//! algorithms), configuration, and the policy corpus, then freezes into an
//! immutable [`PdpEngine`]. A frozen engine is `Send + Sync`; distinct
//! requests may be decided concurrently, each on its own single-threaded
//! evaluation context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::combining::{CombiningAlg, CombiningAlgRegistry, CombiningRegistryError};
use crate::config::PdpConfig;
use crate::context::{DecisionRequest, EvaluationContext, RequestAttribute, RequestCategory};
use crate::decision::{Decision, PepAction, Status};
use crate::doc;
use crate::function::{FirstOrderFunction, FunctionRegistry, RegistryError};
use crate::policy::{CompileEnv, TopLevelEvaluator};
use crate::provider::{ProviderError, StaticPolicyProvider};
use crate::value::{DatatypeRegistry, ValueError};

/// Errors raised while assembling an engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PdpBuildError {
    /// The policy corpus failed to load.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A custom function clashed with an existing registration.
    #[error(transparent)]
    Function(#[from] RegistryError),

    /// A custom combining algorithm clashed with an existing
    /// registration.
    #[error(transparent)]
    Combining(#[from] CombiningRegistryError),

    /// A custom datatype clashed with an existing registration.
    #[error(transparent)]
    Datatype(#[from] ValueError),

    /// No root was configured and the corpus has no unambiguous
    /// candidate.
    #[error("no root policy configured and the corpus has no single candidate")]
    AmbiguousRoot,

    /// The configured root does not exist in the corpus.
    #[error("configured root {kind} '{id}' not found in the corpus")]
    RootNotFound {
        /// `"policy"` or `"policy set"`.
        kind: &'static str,
        /// The configured root id.
        id: String,
    },
}

/// How the engine picks its root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum RootSelector {
    /// Use the corpus's single candidate.
    #[default]
    Autodetect,
    /// A policy by id (latest version).
    Policy(String),
    /// A policy set by id (latest version).
    PolicySet(String),
}

/// Builder for a [`PdpEngine`].
///
/// Registries start from the standard XACML 3.0 sets; custom entries may
/// be added until [`PdpEngineBuilder::build`] freezes everything.
#[derive(Debug)]
pub struct PdpEngineBuilder {
    config: PdpConfig,
    datatypes: DatatypeRegistry,
    functions: FunctionRegistry,
    combining: CombiningAlgRegistry,
    policies: Vec<doc::Policy>,
    policy_sets: Vec<doc::PolicySet>,
    root: RootSelector,
}

impl Default for PdpEngineBuilder {
    fn default() -> Self {
        Self {
            config: PdpConfig::default(),
            datatypes: DatatypeRegistry::standard(),
            functions: FunctionRegistry::standard(),
            combining: CombiningAlgRegistry::standard(),
            policies: Vec::new(),
            policy_sets: Vec::new(),
            root: RootSelector::Autodetect,
        }
    }
}

impl PdpEngineBuilder {
    /// A builder with standard registries and default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PdpConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a parsed policy to the corpus.
    #[must_use]
    pub fn with_policy(mut self, policy: doc::Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Adds parsed policies to the corpus.
    #[must_use]
    pub fn with_policies(mut self, policies: impl IntoIterator<Item = doc::Policy>) -> Self {
        self.policies.extend(policies);
        self
    }

    /// Adds a parsed policy set to the corpus.
    #[must_use]
    pub fn with_policy_set(mut self, policy_set: doc::PolicySet) -> Self {
        self.policy_sets.push(policy_set);
        self
    }

    /// Adds parsed policy sets to the corpus.
    #[must_use]
    pub fn with_policy_sets(mut self, policy_sets: impl IntoIterator<Item = doc::PolicySet>) -> Self {
        self.policy_sets.extend(policy_sets);
        self
    }

    /// Selects a root policy by id (latest loaded version).
    #[must_use]
    pub fn with_root_policy(mut self, id: impl Into<String>) -> Self {
        self.root = RootSelector::Policy(id.into());
        self
    }

    /// Selects a root policy set by id (latest loaded version).
    #[must_use]
    pub fn with_root_policy_set(mut self, id: impl Into<String>) -> Self {
        self.root = RootSelector::PolicySet(id.into());
        self
    }

    /// Registers a custom first-order function.
    ///
    /// # Errors
    ///
    /// [`PdpBuildError::Function`] on a duplicate id.
    pub fn register_function(mut self, function: FirstOrderFunction) -> Result<Self, PdpBuildError> {
        self.functions.register(function)?;
        Ok(self)
    }

    /// Registers a custom datatype URI.
    ///
    /// # Errors
    ///
    /// [`PdpBuildError::Datatype`] on a duplicate URI.
    pub fn register_datatype(mut self, uri: &str) -> Result<Self, PdpBuildError> {
        self.datatypes.register(uri)?;
        Ok(self)
    }

    /// Registers a custom rule-combining algorithm.
    ///
    /// # Errors
    ///
    /// [`PdpBuildError::Combining`] on a duplicate id.
    pub fn register_rule_combining_algorithm(
        mut self,
        algorithm: Arc<dyn CombiningAlg>,
    ) -> Result<Self, PdpBuildError> {
        self.combining.register_rule_algorithm(algorithm)?;
        Ok(self)
    }

    /// Registers a custom policy-combining algorithm.
    ///
    /// # Errors
    ///
    /// [`PdpBuildError::Combining`] on a duplicate id.
    pub fn register_policy_combining_algorithm(
        mut self,
        algorithm: Arc<dyn CombiningAlg>,
    ) -> Result<Self, PdpBuildError> {
        self.combining.register_policy_algorithm(algorithm)?;
        Ok(self)
    }

    /// Freezes the registries, loads the corpus, and selects the root.
    ///
    /// # Errors
    ///
    /// Any load failure; all are fatal with a structured diagnostic.
    pub fn build(self) -> Result<PdpEngine, PdpBuildError> {
        let env = CompileEnv {
            functions: &self.functions,
            datatypes: &self.datatypes,
            combining: &self.combining,
            config: &self.config,
        };
        let provider = StaticPolicyProvider::load(&self.policies, &self.policy_sets, env)?;

        let root = match &self.root {
            RootSelector::Autodetect => {
                provider.candidate_root().ok_or(PdpBuildError::AmbiguousRoot)?
            }
            RootSelector::Policy(id) => provider
                .policy(id, None)
                .map(TopLevelEvaluator::Policy)
                .ok_or_else(|| PdpBuildError::RootNotFound { kind: "policy", id: id.clone() })?,
            RootSelector::PolicySet(id) => provider
                .policy_set(id, None, &mut provider.new_ref_chain())
                .map_err(|source| PdpBuildError::Provider(ProviderError::Load(source)))?
                .map(TopLevelEvaluator::PolicySet)
                .ok_or_else(|| PdpBuildError::RootNotFound { kind: "policy set", id: id.clone() })?,
        };

        debug!(root = root.id(), version = %root.version(), "engine frozen");
        Ok(PdpEngine { root, provider, config: self.config })
    }
}

/// One result entry of a decision response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// The decision.
    pub decision: Decision,
    /// Status detail; `None` stands for `ok`.
    pub status: Option<Status>,
    /// Obligations the enforcement point must discharge.
    pub obligations: Vec<PepAction>,
    /// Advice the enforcement point may act on.
    pub advice: Vec<PepAction>,
    /// Request attributes echoed because they were flagged
    /// `IncludeInResult`.
    pub attributes: Vec<RequestCategory>,
}

/// A decision response: one result per decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// The result entries.
    pub results: Vec<ResultEntry>,
}

impl DecisionResponse {
    /// The single result of a single-decision request.
    pub fn result(&self) -> Option<&ResultEntry> {
        self.results.first()
    }
}

/// The frozen policy decision point.
///
/// Shareable across threads; `decide` is a pure function of the engine
/// and the request.
pub struct PdpEngine {
    root: TopLevelEvaluator,
    provider: StaticPolicyProvider,
    config: PdpConfig,
}

impl PdpEngine {
    /// Starts a builder.
    pub fn builder() -> PdpEngineBuilder {
        PdpEngineBuilder::new()
    }

    /// The root element's id.
    pub fn root_id(&self) -> &str {
        self.root.id()
    }

    /// The loaded policy corpus.
    pub const fn provider(&self) -> &StaticPolicyProvider {
        &self.provider
    }

    /// The engine configuration.
    pub const fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Computes the authorization decision for a request.
    pub fn decide(&self, request: &DecisionRequest) -> DecisionResponse {
        let ctx = EvaluationContext::new(request, &self.config);
        let result = self.root.evaluate(&ctx);
        debug!(root = self.root.id(), decision = %result.decision, "decision computed");

        DecisionResponse {
            results: vec![ResultEntry {
                decision: result.decision,
                status: result.status,
                obligations: result.actions.obligations,
                advice: result.actions.advice,
                attributes: echoed_attributes(request),
            }],
        }
    }
}

impl std::fmt::Debug for PdpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdpEngine")
            .field("root", &self.root.id())
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Collects `IncludeInResult` attributes, grouped per category.
fn echoed_attributes(request: &DecisionRequest) -> Vec<RequestCategory> {
    let mut echoed: Vec<RequestCategory> = Vec::new();
    for (category, attribute) in request.included_in_result() {
        let attribute: RequestAttribute = attribute.clone();
        match echoed.iter_mut().find(|entry| entry.category == category) {
            Some(entry) => entry.attributes.push(attribute),
            None => echoed.push(RequestCategory {
                category: category.to_string(),
                attributes: vec![attribute],
                content: None,
            }),
        }
    }
    echoed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::ids;
    use crate::context::{attribute_ids, categories};
    use crate::decision::Effect;
    use crate::value::{AttributeValue, Datatype};

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";

    fn deny_policy(id: &str) -> doc::Policy {
        doc::Policy {
            policy_id: id.to_string(),
            version: "1.0".to_string(),
            description: None,
            target: None,
            rule_combining_alg_id: ids::RULE_DENY_OVERRIDES.to_string(),
            variable_definitions: vec![],
            rules: vec![doc::Rule {
                rule_id: "deny-hibbert".to_string(),
                effect: Effect::Deny,
                description: None,
                target: Some(doc::Target {
                    any_of: vec![doc::AnyOf {
                        all_of: vec![doc::AllOf {
                            matches: vec![doc::Match {
                                match_id: STRING_EQUAL.to_string(),
                                value: doc::LiteralValue::new(Datatype::String.uri(), "J. Hibbert"),
                                source: doc::MatchSource::Designator(doc::AttributeDesignator {
                                    category: categories::SUBJECT.to_string(),
                                    attribute_id: attribute_ids::SUBJECT_ID.to_string(),
                                    datatype: Datatype::String.uri().to_string(),
                                    issuer: None,
                                    must_be_present: false,
                                }),
                            }],
                        }],
                    }],
                }),
                condition: None,
                obligations: vec![],
                advice: vec![],
            }],
            obligations: vec![],
            advice: vec![],
        }
    }

    fn request(subject: &str) -> DecisionRequest {
        DecisionRequest::builder()
            .attribute(
                categories::SUBJECT,
                attribute_ids::SUBJECT_ID,
                AttributeValue::string(subject),
            )
            .build()
    }

    #[test]
    fn single_policy_autodetects_as_root() {
        let engine = PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap();
        assert_eq!(engine.root_id(), "p");
    }

    #[test]
    fn decide_matches_and_denies() {
        let engine = PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap();
        let response = engine.decide(&request("J. Hibbert"));
        assert_eq!(response.result().unwrap().decision, Decision::Deny);
    }

    #[test]
    fn decide_not_applicable_for_other_subject() {
        let engine = PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap();
        let response = engine.decide(&request("Julius Hibbert"));
        assert_eq!(response.result().unwrap().decision, Decision::NotApplicable);
    }

    #[test]
    fn ambiguous_corpus_requires_explicit_root() {
        let err = PdpEngine::builder()
            .with_policy(deny_policy("p1"))
            .with_policy(deny_policy("p2"))
            .build()
            .unwrap_err();
        assert!(matches!(err, PdpBuildError::AmbiguousRoot));

        let engine = PdpEngine::builder()
            .with_policy(deny_policy("p1"))
            .with_policy(deny_policy("p2"))
            .with_root_policy("p2")
            .build()
            .unwrap();
        assert_eq!(engine.root_id(), "p2");
    }

    #[test]
    fn missing_configured_root_is_an_error() {
        let err = PdpEngine::builder()
            .with_policy(deny_policy("p"))
            .with_root_policy("absent")
            .build()
            .unwrap_err();
        assert!(matches!(err, PdpBuildError::RootNotFound { .. }));
    }

    #[test]
    fn include_in_result_attributes_are_echoed() {
        let engine = PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap();
        let request = DecisionRequest::builder()
            .attribute_entry(categories::RESOURCE, RequestAttribute {
                id: attribute_ids::RESOURCE_ID.to_string(),
                issuer: None,
                values: vec![AttributeValue::string("doc-1")],
                include_in_result: true,
            })
            .build();
        let response = engine.decide(&request);
        let entry = response.result().unwrap();
        assert_eq!(entry.attributes.len(), 1);
        assert_eq!(entry.attributes[0].attributes[0].id, attribute_ids::RESOURCE_ID);
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let engine = Arc::new(PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.decide(&request("J. Hibbert")).result().unwrap().decision
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Decision::Deny);
        }
    }

    #[test]
    fn determinism_same_request_same_decision() {
        let engine = PdpEngine::builder().with_policy(deny_policy("p")).build().unwrap();
        let request = request("J. Hibbert");
        let first = engine.decide(&request);
        let second = engine.decide(&request);
        assert_eq!(first, second);
    }
}
