//! Decision auditing.
//!
//! This module records the decisions emitted on open subscriptions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vigil_core::{AuthorizationDecision, AuthorizationSubscription, Decision};

/// One emitted decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// The id of the subscription the decision was emitted on.
    pub subscription_id: String,

    /// The subscription that was decided.
    pub subscription: AuthorizationSubscription,

    /// The emitted decision.
    pub decision: AuthorizationDecision,

    /// When the decision was emitted.
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        subscription_id: impl Into<String>,
        subscription: AuthorizationSubscription,
        decision: AuthorizationDecision,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            subscription,
            decision,
            timestamp: Utc::now(),
        }
    }
}

/// A decision audit.
///
/// This audit keeps the most recent decisions of every subscription.
#[derive(Clone)]
pub struct DecisionAudit {
    /// The audit entries, by subscription id.
    entries: Arc<DashMap<String, Vec<DecisionRecord>>>,

    /// The maximum number of entries to keep per subscription.
    max_entries_per_subscription: usize,
}

impl DecisionAudit {
    /// Create a new decision audit.
    ///
    /// # Arguments
    ///
    /// * `max_entries_per_subscription` - The maximum number of entries to keep per subscription.
    ///
    /// # Returns
    ///
    /// A new decision audit.
    pub fn new(max_entries_per_subscription: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries_per_subscription,
        }
    }

    /// Record an emitted decision, dropping the oldest entries of its
    /// subscription beyond the limit.
    pub fn record(&self, record: DecisionRecord) {
        let mut entries = self
            .entries
            .entry(record.subscription_id.clone())
            .or_default();
        entries.push(record);

        if entries.len() > self.max_entries_per_subscription {
            let to_remove = entries.len() - self.max_entries_per_subscription;
            entries.drain(0..to_remove);
        }
    }

    /// Get the recorded decisions of a subscription, oldest first.
    pub fn get_records(&self, subscription_id: &str) -> Vec<DecisionRecord> {
        match self.entries.get(subscription_id) {
            Some(entries) => entries.clone(),
            None => Vec::new(),
        }
    }

    /// The most recent decision of a subscription.
    pub fn latest(&self, subscription_id: &str) -> Option<DecisionRecord> {
        self.entries
            .get(subscription_id)
            .and_then(|entries| entries.last().cloned())
    }

    /// Clear the records of a subscription.
    pub fn clear_records(&self, subscription_id: &str) {
        self.entries.remove(subscription_id);
    }

    /// Get all records with the given decision outcome.
    pub fn get_records_by_decision(&self, decision: Decision) -> Vec<DecisionRecord> {
        let mut records = Vec::new();

        for entry in self.entries.iter() {
            for record in entry.value() {
                if record.decision.decision == decision {
                    records.push(record.clone());
                }
            }
        }

        records
    }

    /// Number of subscriptions with at least one record.
    pub fn subscription_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for DecisionAudit {
    fn default() -> Self {
        Self::new(100)
    }
}
