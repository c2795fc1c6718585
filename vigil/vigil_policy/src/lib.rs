//! # Vigil Policy
//!
//! `vigil_policy` provides the policy engine of the Vigil decision point:
//! the document model, the evaluation of policies and policy sets into
//! decision streams, and the combining algorithms that reduce several
//! decisions to one.
//!
//! Key concepts:
//!
//! 1. **Document**: A policy or a policy set, with a target deciding
//!    whether it applies to a request.
//!
//! 2. **Evaluation**: Matching the target, then evaluating body statements,
//!    obligations, advice and transform against an evaluation context.
//!
//! 3. **Combining algorithm**: One of six rules reducing the decisions of
//!    all applicable documents to one decision.
//!
//! 4. **Document store**: The scan/update interface documents are loaded
//!    from.

pub mod engine;
pub mod expression;
pub mod model;
pub mod store;

// Re-export key types and traits for convenience
pub use engine::{
    DecisionAudit, DecisionRecord, Kind, ObligationAdviceCollector, PolicyElement,
    PolicyRetrievalResult,
};
pub use expression::{CompareOp, Expr};
pub use model::{
    CombiningAlgorithm, Document, Entitlement, Policy, PolicySet, Statement, ValueDefinition,
};
pub use store::{DocumentStore, InMemoryDocumentStore};
