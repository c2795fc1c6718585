//! # Vigil Index
//!
//! `vigil_index` selects the documents applicable to a request without
//! evaluating every target in full.
//!
//! Targets are expanded into disjunctive normal form over opaque boolean
//! predicates and reduced. Predicates shared between documents are scored
//! and resolved once per request, highest score first, pruning every clause
//! they falsify. The [`PolicyRetrievalPoint`] keeps the document set and its
//! index in one immutable snapshot that mutations replace atomically.
//!
//! ## Crate Structure
//!
//! - **formula**: Predicates, literals, clauses, DNF expansion and reduction
//! - **scoring**: Per-predicate statistics and the score ordering
//! - **index**: The `PolicyIndex` trait and index strategy selection
//! - **canonical**: The predicate-sharing formula index
//! - **naive**: The evaluate-everything index
//! - **prp**: The snapshot-swapping retrieval point

pub mod canonical;
pub mod formula;
pub mod index;
pub mod naive;
pub mod prp;
pub mod scoring;

// Re-export key types for convenience
pub use canonical::CanonicalIndex;
pub use formula::{
    reduce_constants, reduce_formula, Bool, ConjunctiveClause, DisjunctiveFormula, Literal,
    DEFAULT_CLAUSE_LIMIT,
};
pub use index::{IndexType, PolicyIndex};
pub use naive::NaiveIndex;
pub use prp::PolicyRetrievalPoint;
pub use scoring::{PredicateInfo, SCORE_EPSILON};
