//! Policy set evaluation and reference linking.
//!
//! A policy set's children are nested policies/policy sets or references
//! into the loaded corpus. References are resolved at load time through a
//! [`PolicyResolver`]; the active [`RefChain`] catches cycles and depth
//! overflows while the graph is linked, so evaluation never walks
//! references again; children are direct handles to already-finalized
//! evaluators.

use std::sync::Arc;

use tracing::debug;

use super::error::PolicyLoadError;
use super::obligation::PepActionExpressions;
use super::policy::{attach_own_actions, PolicyEvaluator};
use super::target::Target;
use super::version::{PolicyVersion, VersionPatterns};
use super::CompileEnv;
use crate::combining::{CombinerElement, CombiningAlg};
use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, ExtendedIndeterminate, Status};
use crate::doc;
use crate::expr::ExpressionBuilder;

/// Resolves `Policy(Set)IdReference`s during load.
///
/// Implemented by the policy provider; [`PolicyResolver::policy_set`]
/// receives the active reference chain and must keep it consistent
/// (push before building a referent, pop after).
pub trait PolicyResolver {
    /// Resolves a policy reference to its evaluator, or `None` when the
    /// corpus has no match.
    ///
    /// # Errors
    ///
    /// Load failures of the referent.
    fn policy(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
    ) -> Result<Option<Arc<PolicyEvaluator>>, PolicyLoadError>;

    /// Resolves a policy set reference, building the referent on demand.
    ///
    /// # Errors
    ///
    /// Load failures of the referent, reference cycles, and depth
    /// overflows.
    fn policy_set(
        &self,
        id: &str,
        constraints: Option<&VersionPatterns>,
        chain: &mut RefChain,
    ) -> Result<Option<Arc<PolicySetEvaluator>>, PolicyLoadError>;
}

/// The active chain of policy set ids entered via references (the root
/// counts). Pushing checks both the cycle and the depth invariant.
#[derive(Debug, Clone)]
pub struct RefChain {
    ids: Vec<String>,
    max: Option<usize>,
}

impl RefChain {
    /// An empty chain under the given depth limit (`None` disables).
    pub const fn new(max: Option<usize>) -> Self {
        Self { ids: Vec::new(), max }
    }

    /// The ids currently on the chain.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Appends an id.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::ReferenceCycle`] when the id is already on the
    /// chain; [`PolicyLoadError::ReferenceDepthExceeded`] when the chain
    /// would outgrow the limit.
    pub fn push(&mut self, id: &str) -> Result<(), PolicyLoadError> {
        if self.ids.iter().any(|existing| existing == id) {
            let mut chain = self.ids.clone();
            chain.push(id.to_string());
            return Err(PolicyLoadError::ReferenceCycle { chain });
        }
        if let Some(max) = self.max {
            if self.ids.len() + 1 > max {
                let mut chain = self.ids.clone();
                chain.push(id.to_string());
                return Err(PolicyLoadError::ReferenceDepthExceeded { chain, max });
            }
        }
        self.ids.push(id.to_string());
        Ok(())
    }

    /// Removes the most recent id.
    pub fn pop(&mut self) {
        self.ids.pop();
    }

    /// Checks that joining a cached evaluator's downstream chain onto
    /// this one stays within the limit, without rebuilding the referent.
    ///
    /// # Errors
    ///
    /// [`PolicyLoadError::ReferenceDepthExceeded`] with the combined
    /// chain.
    pub fn join_check(&self, downstream: &[String]) -> Result<(), PolicyLoadError> {
        if let Some(max) = self.max {
            if self.ids.len() + downstream.len() > max {
                let mut chain = self.ids.clone();
                chain.extend(downstream.iter().cloned());
                return Err(PolicyLoadError::ReferenceDepthExceeded { chain, max });
            }
        }
        Ok(())
    }
}

/// A compiled policy set.
pub struct PolicySetEvaluator {
    id: String,
    version: PolicyVersion,
    target: Target,
    algorithm: Arc<dyn CombiningAlg>,
    children: Vec<Arc<dyn CombinerElement>>,
    actions: PepActionExpressions,
    /// The longest chain of reference-entered policy set ids below this
    /// one (not counting this set). Lets a later join re-check depth
    /// without rewalking the graph.
    longest_ref_chain: Vec<String>,
}

impl std::fmt::Debug for PolicySetEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySetEvaluator")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("target", &self.target)
            .field("algorithm", &self.algorithm.id())
            .field("children", &self.children.len())
            .field("actions", &self.actions)
            .field("longest_ref_chain", &self.longest_ref_chain)
            .finish()
    }
}

impl PolicySetEvaluator {
    /// Compiles a policy set document, resolving references through
    /// `resolver` under the active `chain`.
    ///
    /// # Errors
    ///
    /// Any [`PolicyLoadError`], wrapped with this set's id and version.
    pub fn compile(
        node: &doc::PolicySet,
        env: &CompileEnv<'_>,
        resolver: &dyn PolicyResolver,
        chain: &mut RefChain,
    ) -> Result<Arc<Self>, PolicyLoadError> {
        Self::compile_inner(node, env, resolver, chain).map_err(|source| {
            PolicyLoadError::in_element("policy set", &node.policy_set_id, &node.version, source)
        })
    }

    fn compile_inner(
        node: &doc::PolicySet,
        env: &CompileEnv<'_>,
        resolver: &dyn PolicyResolver,
        chain: &mut RefChain,
    ) -> Result<Arc<Self>, PolicyLoadError> {
        let version = PolicyVersion::parse(&node.version)?;
        let algorithm = env
            .combining
            .policy_algorithm(&node.policy_combining_alg_id)
            .ok_or_else(|| PolicyLoadError::UnknownPolicyCombiningAlg {
                id: node.policy_combining_alg_id.clone(),
            })?;

        let builder = ExpressionBuilder::new(env.functions, env.datatypes, env.config);
        let target = Target::compile(node.target.as_ref(), env.functions, &builder)?;

        let mut children: Vec<Arc<dyn CombinerElement>> = Vec::with_capacity(node.children.len());
        let mut longest_ref_chain: Vec<String> = Vec::new();
        let consider = |candidate: Vec<String>, longest: &mut Vec<String>| {
            if candidate.len() > longest.len() {
                *longest = candidate;
            }
        };

        for child in &node.children {
            match child {
                doc::PolicySetChild::Policy(policy) => {
                    children.push(PolicyEvaluator::compile(policy, env)?);
                }
                doc::PolicySetChild::PolicySet(nested) => {
                    let nested = Self::compile(nested, env, resolver, chain)?;
                    consider(nested.longest_ref_chain.clone(), &mut longest_ref_chain);
                    children.push(nested);
                }
                doc::PolicySetChild::PolicyIdReference(reference) => {
                    let constraints = VersionPatterns::from_reference(reference)?;
                    let target_policy = resolver
                        .policy(&reference.id, constraints.as_ref())?
                        .ok_or_else(|| PolicyLoadError::UnresolvedReference {
                            kind: "policy",
                            id: reference.id.clone(),
                        })?;
                    children.push(target_policy);
                }
                doc::PolicySetChild::PolicySetIdReference(reference) => {
                    let constraints = VersionPatterns::from_reference(reference)?;
                    let target_set = resolver
                        .policy_set(&reference.id, constraints.as_ref(), chain)?
                        .ok_or_else(|| PolicyLoadError::UnresolvedReference {
                            kind: "policy set",
                            id: reference.id.clone(),
                        })?;
                    let mut candidate = vec![target_set.id.clone()];
                    candidate.extend(target_set.longest_ref_chain.iter().cloned());
                    consider(candidate, &mut longest_ref_chain);
                    children.push(target_set);
                }
            }
        }

        let actions = PepActionExpressions::compile(&node.obligations, &node.advice, &builder)?;
        debug!(
            policy_set_id = %node.policy_set_id,
            version = %version,
            children = children.len(),
            "compiled policy set"
        );

        Ok(Arc::new(Self {
            id: node.policy_set_id.clone(),
            version,
            target,
            algorithm: Arc::clone(algorithm),
            children,
            actions,
            longest_ref_chain,
        }))
    }

    /// The policy set id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The parsed version.
    pub const fn version(&self) -> &PolicyVersion {
        &self.version
    }

    /// The longest downstream reference chain (excluding this set).
    pub fn longest_ref_chain(&self) -> &[String] {
        &self.longest_ref_chain
    }
}

impl CombinerElement for PolicySetEvaluator {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> DecisionResult {
        match self.target.matches(ctx) {
            Err(status) => {
                return DecisionResult::indeterminate(ExtendedIndeterminate::PermitDeny, status)
            }
            Ok(false) => return DecisionResult::not_applicable(),
            Ok(true) => {}
        }
        let combined = self.algorithm.combine(ctx, &self.children);
        attach_own_actions(&self.actions, combined, ctx)
    }

    fn applicability(&self, ctx: &EvaluationContext<'_>) -> Result<bool, Status> {
        self.target.matches(ctx)
    }
}
