//! Policy models.
//!
//! This module defines the document types the engine evaluates.

pub mod algorithm;
pub mod document;
pub mod policy;
pub mod policy_set;

pub use algorithm::CombiningAlgorithm;
pub use document::Document;
pub use policy::{Entitlement, Policy, Statement, ValueDefinition};
pub use policy_set::PolicySet;
