//! # Vigil Core
//!
//! `vigil_core` provides the building blocks shared by every part of the
//! Vigil policy decision point: the value and decision model, authorization
//! subscriptions, the evaluation context, the root error hierarchy and the
//! reactive stream operators decision pipelines are made of.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Vigil components
//! - **value**: The evaluation value, a JSON value or an error marker
//! - **decision**: Authorization decisions and their multi-subscription forms
//! - **subscription**: Authorization subscriptions
//! - **context**: Evaluation context with copy-on-write variable scoping
//! - **reactive**: combine-latest, switch-map and distinct-until-changed

pub mod context;
pub mod decision;
pub mod error;
pub mod reactive;
pub mod subscription;
pub mod value;

// Re-export key types and traits for convenience
pub use context::{
    AttributeResolver, EvaluationContext, FunctionLibrary, FunctionResolver, NoAttributes,
};
pub use decision::{
    AuthorizationDecision, Decision, IdentifiableAuthorizationDecision,
    MultiAuthorizationDecision,
};
pub use error::{ConfigError, Error, EvaluationError, IndexError, Result, StoreError};
pub use reactive::{combine_latest, just, BoxStream, DecisionStream, ReactiveExt, ValStream};
pub use subscription::{AuthorizationSubscription, MultiAuthorizationSubscription};
pub use value::Val;
