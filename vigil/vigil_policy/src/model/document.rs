//! Policy documents.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::policy::Policy;
use super::policy_set::PolicySet;
use crate::expression::Expr;

/// A top-level document: a single policy or a policy set.
///
/// Both variants are reference counted, so cloning a document is cheap and
/// decision pipelines can own the documents they evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Document {
    Policy(Arc<Policy>),
    PolicySet(Arc<PolicySet>),
}

impl Document {
    pub fn name(&self) -> &str {
        match self {
            Document::Policy(p) => &p.name,
            Document::PolicySet(s) => &s.name,
        }
    }

    pub fn target(&self) -> Option<&Expr> {
        match self {
            Document::Policy(p) => p.target.as_ref(),
            Document::PolicySet(s) => s.target.as_ref(),
        }
    }

    /// Parse a document from its JSON form.
    pub fn from_json(json: &str) -> vigil_core::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Policy> for Document {
    fn from(policy: Policy) -> Self {
        Document::Policy(Arc::new(policy))
    }
}

impl From<PolicySet> for Document {
    fn from(set: PolicySet) -> Self {
        Document::PolicySet(Arc::new(set))
    }
}
