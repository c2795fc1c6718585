//! Authorization subscriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decision request: who wants to do what to which resource, in which
/// environment. A subscription stays open and may be re-evaluated any
/// number of times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSubscription {
    pub subject: Value,
    pub action: Value,
    pub resource: Value,
    #[serde(default)]
    pub environment: Value,
}

impl AuthorizationSubscription {
    pub fn new(subject: Value, action: Value, resource: Value) -> Self {
        Self {
            subject,
            action,
            resource,
            environment: Value::Null,
        }
    }

    pub fn with_environment(mut self, environment: Value) -> Self {
        self.environment = environment;
        self
    }

    /// Look up one of the four top-level fields by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match name {
            "subject" => Some(&self.subject),
            "action" => Some(&self.action),
            "resource" => Some(&self.resource),
            "environment" => Some(&self.environment),
            _ => None,
        }
    }
}

/// Several subscriptions keyed by a caller-supplied id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAuthorizationSubscription {
    subscriptions: Vec<(String, AuthorizationSubscription)>,
}

impl MultiAuthorizationSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription, replacing any previous one with the same id.
    pub fn add(
        mut self,
        subscription_id: impl Into<String>,
        subscription: AuthorizationSubscription,
    ) -> Self {
        let id = subscription_id.into();
        match self.subscriptions.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = subscription,
            None => self.subscriptions.push((id, subscription)),
        }
        self
    }

    pub fn get(&self, subscription_id: &str) -> Option<&AuthorizationSubscription> {
        self.subscriptions
            .iter()
            .find(|(id, _)| id == subscription_id)
            .map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AuthorizationSubscription)> {
        self.subscriptions.iter().map(|(id, s)| (id, s))
    }
}
