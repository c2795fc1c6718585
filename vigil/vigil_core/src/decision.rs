//! Authorization decisions.
//!
//! This module defines the decision outcome enum and the immutable decision
//! value handed to callers, together with the identifiable and aggregated
//! variants used by multi-subscriptions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Access is granted
    Permit,

    /// Access is denied
    Deny,

    /// No policy applies
    NotApplicable,

    /// The decision could not be made
    Indeterminate,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Permit => "PERMIT",
            Decision::Deny => "DENY",
            Decision::NotApplicable => "NOT_APPLICABLE",
            Decision::Indeterminate => "INDETERMINATE",
        };
        f.write_str(s)
    }
}

/// An authorization decision together with its obligations, advice and
/// optionally transformed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    /// The decision outcome.
    pub decision: Decision,

    /// The transformed resource, if a policy defined a transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// Obligations the caller must fulfil.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obligations: Option<Vec<Value>>,

    /// Advice the caller may act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Vec<Value>>,
}

impl AuthorizationDecision {
    pub const PERMIT: AuthorizationDecision = AuthorizationDecision::of(Decision::Permit);
    pub const DENY: AuthorizationDecision = AuthorizationDecision::of(Decision::Deny);
    pub const NOT_APPLICABLE: AuthorizationDecision =
        AuthorizationDecision::of(Decision::NotApplicable);
    pub const INDETERMINATE: AuthorizationDecision =
        AuthorizationDecision::of(Decision::Indeterminate);

    /// A decision without obligations, advice or resource.
    pub const fn of(decision: Decision) -> Self {
        Self {
            decision,
            resource: None,
            obligations: None,
            advice: None,
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = decision;
        self
    }

    pub fn with_resource(mut self, resource: Option<Value>) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_obligations(mut self, obligations: Option<Vec<Value>>) -> Self {
        self.obligations = obligations;
        self
    }

    pub fn with_advice(mut self, advice: Option<Vec<Value>>) -> Self {
        self.advice = advice;
        self
    }

    /// Whether this decision carries a transformed resource.
    pub fn has_transform(&self) -> bool {
        self.resource.is_some()
    }
}

impl Default for AuthorizationDecision {
    fn default() -> Self {
        Self::INDETERMINATE
    }
}

/// A decision tagged with the id of the subscription it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiableAuthorizationDecision {
    /// Id of the subscription within a multi-subscription, absent for the
    /// indeterminate answer to an empty multi-subscription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    pub decision: AuthorizationDecision,
}

impl IdentifiableAuthorizationDecision {
    pub fn new(subscription_id: impl Into<String>, decision: AuthorizationDecision) -> Self {
        Self {
            subscription_id: Some(subscription_id.into()),
            decision,
        }
    }

    /// The answer to a multi-subscription without any subscriptions.
    pub fn indeterminate() -> Self {
        Self {
            subscription_id: None,
            decision: AuthorizationDecision::INDETERMINATE,
        }
    }
}

/// The latest decision for every subscription of a multi-subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAuthorizationDecision {
    decisions: BTreeMap<String, AuthorizationDecision>,
}

impl MultiAuthorizationDecision {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer to a multi-subscription without any subscriptions.
    pub fn indeterminate() -> Self {
        let mut multi = Self::new();
        multi.put("", AuthorizationDecision::INDETERMINATE);
        multi
    }

    pub fn put(&mut self, subscription_id: impl Into<String>, decision: AuthorizationDecision) {
        self.decisions.insert(subscription_id.into(), decision);
    }

    pub fn get(&self, subscription_id: &str) -> Option<&AuthorizationDecision> {
        self.decisions.get(subscription_id)
    }

    /// The decision outcome for a subscription, if one was recorded.
    pub fn decision_for(&self, subscription_id: &str) -> Option<Decision> {
        self.decisions.get(subscription_id).map(|d| d.decision)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AuthorizationDecision)> {
        self.decisions.iter()
    }
}

impl FromIterator<IdentifiableAuthorizationDecision> for MultiAuthorizationDecision {
    fn from_iter<I: IntoIterator<Item = IdentifiableAuthorizationDecision>>(iter: I) -> Self {
        let mut multi = Self::new();
        for item in iter {
            multi.put(item.subscription_id.unwrap_or_default(), item.decision);
        }
        multi
    }
}
