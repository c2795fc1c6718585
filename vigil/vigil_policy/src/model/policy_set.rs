//! Policy set model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::algorithm::CombiningAlgorithm;
use super::policy::{Policy, ValueDefinition};
use crate::expression::Expr;

/// An ordered group of policies combined by one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    /// The name of this policy set.
    pub name: String,

    /// The algorithm combining the decisions of the member policies.
    pub algorithm: CombiningAlgorithm,

    /// The applicability condition. `None` matches every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Expr>,

    /// Set-scoped values, evaluated in order before any member policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<ValueDefinition>,

    /// Member policies in document order.
    pub policies: Vec<Arc<Policy>>,
}

impl PolicySet {
    pub fn new(name: impl Into<String>, algorithm: CombiningAlgorithm) -> Self {
        Self {
            name: name.into(),
            algorithm,
            target: None,
            variables: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: Expr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.variables.push(ValueDefinition::new(name, expr));
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }
}
