//! Obligation and advice collection.
//!
//! While several policy decisions are folded into one, the obligations and
//! advice of each are recorded in a bucket per decision outcome. The final
//! decision then takes only the bucket matching its own outcome, so a PERMIT
//! never carries obligations that were attached to a DENY.

use std::collections::HashMap;

use serde_json::Value;
use vigil_core::{AuthorizationDecision, Decision};

/// Whether an entry is an obligation or advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Obligation,
    Advice,
}

/// Accumulates obligations and advice keyed by decision outcome.
#[derive(Debug, Default, Clone)]
pub struct ObligationAdviceCollector {
    buckets: HashMap<(Decision, Kind), Vec<Value>>,
}

impl ObligationAdviceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the obligations and advice of `authz` to the buckets of
    /// `decision`, preserving the order decisions are added in.
    pub fn add(&mut self, decision: Decision, authz: &AuthorizationDecision) {
        if let Some(obligations) = &authz.obligations {
            self.buckets
                .entry((decision, Kind::Obligation))
                .or_default()
                .extend(obligations.iter().cloned());
        }
        if let Some(advice) = &authz.advice {
            self.buckets
                .entry((decision, Kind::Advice))
                .or_default()
                .extend(advice.iter().cloned());
        }
    }

    /// The accumulated entries, or `None` if nothing was collected.
    pub fn get(&self, kind: Kind, decision: Decision) -> Option<Vec<Value>> {
        self.buckets
            .get(&(decision, kind))
            .filter(|entries| !entries.is_empty())
            .cloned()
    }

    /// A decision of the given outcome carrying this outcome's buckets.
    pub fn decision(&self, decision: Decision, resource: Option<Value>) -> AuthorizationDecision {
        AuthorizationDecision::of(decision)
            .with_resource(resource)
            .with_obligations(self.get(Kind::Obligation, decision))
            .with_advice(self.get(Kind::Advice, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_buckets_are_scoped_by_decision() {
        let mut collector = ObligationAdviceCollector::new();
        collector.add(
            Decision::Deny,
            &AuthorizationDecision::DENY.with_obligations(Some(vec![json!("log-deny")])),
        );
        collector.add(
            Decision::Permit,
            &AuthorizationDecision::PERMIT
                .with_obligations(Some(vec![json!("audit")]))
                .with_advice(Some(vec![json!("hint")])),
        );

        let permit = collector.decision(Decision::Permit, None);
        assert_eq!(permit.obligations, Some(vec![json!("audit")]));
        assert_eq!(permit.advice, Some(vec![json!("hint")]));
        assert_eq!(
            collector.get(Kind::Obligation, Decision::Deny),
            Some(vec![json!("log-deny")])
        );
        assert_eq!(collector.get(Kind::Advice, Decision::Deny), None);
    }

    #[test]
    fn test_order_is_preserved() {
        let mut collector = ObligationAdviceCollector::new();
        for name in ["first", "second", "third"] {
            collector.add(
                Decision::Permit,
                &AuthorizationDecision::PERMIT.with_obligations(Some(vec![json!(name)])),
            );
        }
        assert_eq!(
            collector.get(Kind::Obligation, Decision::Permit),
            Some(vec![json!("first"), json!("second"), json!("third")])
        );
    }

    #[test]
    fn test_empty_bucket_is_absent() {
        let mut collector = ObligationAdviceCollector::new();
        collector.add(
            Decision::Permit,
            &AuthorizationDecision::PERMIT.with_obligations(Some(vec![])),
        );
        assert_eq!(collector.get(Kind::Obligation, Decision::Permit), None);
        assert_eq!(collector.get(Kind::Advice, Decision::NotApplicable), None);
    }
}
