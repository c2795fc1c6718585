//! Policy evaluation engine.
//!
//! This module provides document evaluation, the combining algorithms and
//! the obligation/advice collector they share.

mod audit;
mod collector;
mod combinator;
mod evaluator;
mod retrieval;

pub use audit::{DecisionAudit, DecisionRecord};
pub use collector::{Kind, ObligationAdviceCollector};
pub use evaluator::PolicyElement;
pub use retrieval::PolicyRetrievalResult;
