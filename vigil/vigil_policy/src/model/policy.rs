//! Policy model.

use serde::{Deserialize, Serialize};
use vigil_core::Decision;

use crate::expression::Expr;

/// The decision a policy grants when its target matches and its body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entitlement {
    Permit,
    Deny,
}

impl Entitlement {
    pub fn decision(&self) -> Decision {
        match self {
            Entitlement::Permit => Decision::Permit,
            Entitlement::Deny => Decision::Deny,
        }
    }
}

/// A named value definition, `var name = expr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDefinition {
    /// The name the value is bound to.
    pub name: String,

    /// The expression producing the value.
    pub expr: Expr,
}

impl ValueDefinition {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// One statement of a policy body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// A condition that must evaluate to `true`
    Condition(Expr),

    /// A value definition visible to the following statements
    Value(ValueDefinition),
}

/// A policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// The name of this policy.
    pub name: String,

    /// The decision this policy grants.
    pub entitlement: Entitlement,

    /// The applicability condition. `None` matches every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Expr>,

    /// Ordered body statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Statement>,

    /// Obligation expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Expr>,

    /// Advice expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Expr>,

    /// Resource transformation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Expr>,
}

impl Policy {
    /// Create a policy without target, body or extras.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the policy.
    /// * `entitlement` - The decision the policy grants.
    ///
    /// # Returns
    ///
    /// A new policy that applies to every request.
    pub fn new(name: impl Into<String>, entitlement: Entitlement) -> Self {
        Self {
            name: name.into(),
            entitlement,
            target: None,
            body: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
            transform: None,
        }
    }

    pub fn permit(name: impl Into<String>) -> Self {
        Self::new(name, Entitlement::Permit)
    }

    pub fn deny(name: impl Into<String>) -> Self {
        Self::new(name, Entitlement::Deny)
    }

    pub fn with_target(mut self, target: Expr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.body.push(Statement::Condition(condition));
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.body.push(Statement::Value(ValueDefinition::new(name, expr)));
        self
    }

    pub fn with_obligation(mut self, obligation: Expr) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: Expr) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn with_transform(mut self, transform: Expr) -> Self {
        self.transform = Some(transform);
        self
    }
}
