//! # verdict-core
//!
//! An XACML 3.0 Policy Decision Point (PDP): given an authorization request
//! describing a subject, resource, action, and environment, the engine
//! evaluates a tree of policies, policy sets, and rules and returns a
//! decision (Permit, Deny, NotApplicable, or Indeterminate) together with
//! obligations and advice.
//!
//! ## Features
//!
//! - **Typed value model**: the XACML datatypes and the bag multiset, with
//!   canonical parsing and datatype-specific ordering
//! - **Expression evaluation**: attribute designators/selectors, variable
//!   references, and function application, type-checked at load time
//! - **Combining algorithms**: deny/permit-overrides, first-applicable,
//!   only-one-applicable, deny-unless-permit/permit-unless-deny, and their
//!   ordered variants, with precise Indeterminate propagation
//! - **Static policy resolution**: `Policy(Set)IdReference` linking with
//!   version patterns, cycle detection, and reference-depth limits
//!
//! Document unmarshalling (XML), protocol adapters, and remote attribute
//! providers are external collaborators: the engine consumes an
//! already-parsed [`doc`] tree and an in-memory [`context::DecisionRequest`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use verdict_core::engine::PdpEngine;
//! use verdict_core::context::DecisionRequest;
//!
//! # fn load_policy() -> verdict_core::doc::Policy { unimplemented!() }
//! let engine = PdpEngine::builder()
//!     .with_policy(load_policy())
//!     .build()
//!     .expect("valid policy corpus");
//!
//! let request = DecisionRequest::builder().build();
//! let response = engine.decide(&request);
//! ```
//!
//! ## Concurrency
//!
//! A built [`engine::PdpEngine`] is immutable and `Send + Sync`: distinct
//! requests may be decided concurrently from multiple threads. Evaluation of
//! a single request is synchronous and single-threaded; the per-request
//! [`context::EvaluationContext`] is not shared.

pub mod combining;
pub mod config;
pub mod context;
pub mod decision;
pub mod doc;
pub mod engine;
pub mod expr;
pub mod function;
pub mod policy;
pub mod provider;
pub mod value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PdpConfig;
    pub use crate::context::{DecisionRequest, EvaluationContext};
    pub use crate::decision::{Decision, DecisionResult, Effect, Status, StatusCode};
    pub use crate::engine::{DecisionResponse, PdpEngine};
    pub use crate::value::{AttributeValue, Bag, Datatype};
}

pub use config::PdpConfig;
pub use decision::{Decision, DecisionResult, Effect, Status, StatusCode};
pub use engine::{DecisionResponse, PdpEngine};
pub use value::{AttributeValue, Bag, Datatype};
