//! Combining algorithms.
//!
//! Each algorithm is a pure reduction of the current per-document decisions
//! to one decision ([`CombiningAlgorithm::combine_decisions`]). The stream
//! forms re-run that reduction whenever any document's decision changes,
//! always over the latest decision of every document.
//!
//! A combined PERMIT carries at most one resource transformation. When more
//! than one permitting decision carries a transform, the resource would be
//! ambiguous and the combination is downgraded to DENY.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, trace};
use vigil_core::reactive::{combine_latest, just, DecisionStream, ReactiveExt};
use vigil_core::{AuthorizationDecision, Decision, EvaluationContext, Val};

use super::collector::ObligationAdviceCollector;
use super::evaluator::PolicyElement;
use super::retrieval::PolicyRetrievalResult;
use crate::model::{CombiningAlgorithm, Document, Policy};

impl CombiningAlgorithm {
    /// Reduce a snapshot of decisions to one.
    ///
    /// # Arguments
    ///
    /// * `decisions` - The current decision of every matching document, in
    ///   document order.
    /// * `errors_in_target` - Whether matching any candidate failed.
    ///
    /// # Returns
    ///
    /// The combined decision. This never fails; every failure path ends in
    /// INDETERMINATE or the algorithm's default.
    pub fn combine_decisions(
        &self,
        decisions: &[AuthorizationDecision],
        errors_in_target: bool,
    ) -> AuthorizationDecision {
        let combined = match self {
            CombiningAlgorithm::DenyOverrides => overrides(decisions, Decision::Deny),
            CombiningAlgorithm::PermitOverrides => overrides(decisions, Decision::Permit),
            CombiningAlgorithm::DenyUnlessPermit => unless(decisions, Decision::Permit),
            CombiningAlgorithm::PermitUnlessDeny => unless(decisions, Decision::Deny),
            CombiningAlgorithm::OnlyOneApplicable => only_one(decisions, errors_in_target),
            CombiningAlgorithm::FirstApplicable => first(decisions, errors_in_target),
        };
        trace!(
            "{} combined {} decisions to {}",
            self,
            decisions.len(),
            combined.decision
        );
        combined
    }

    /// Combine documents the retrieval point found matching.
    pub fn combine_matching_documents(
        &self,
        result: PolicyRetrievalResult,
        ctx: &EvaluationContext,
    ) -> DecisionStream {
        let algorithm = *self;
        let errors_in_target = result.errors_in_target;
        debug!(
            "combining {:?} with {} (errors in target: {})",
            result.names(),
            algorithm,
            errors_in_target
        );

        let candidates = match algorithm {
            CombiningAlgorithm::OnlyOneApplicable
                if errors_in_target || result.matching.len() > 1 =>
            {
                return just(AuthorizationDecision::INDETERMINATE);
            }
            CombiningAlgorithm::FirstApplicable if errors_in_target => {
                return just(AuthorizationDecision::INDETERMINATE);
            }
            // Only the first match is ever evaluated.
            CombiningAlgorithm::OnlyOneApplicable | CombiningAlgorithm::FirstApplicable => {
                result.matching.into_iter().take(1).collect()
            }
            _ => result.matching,
        };

        let decisions = candidates.iter().map(|doc| doc.evaluate(ctx)).collect();
        combine_latest(decisions)
            .map(move |decisions| algorithm.combine_decisions(&decisions, errors_in_target))
            .distinct_until_changed()
            .boxed()
    }

    /// Match and combine the policies of a policy set.
    pub fn combine_policies(
        &self,
        policies: &[Arc<Policy>],
        ctx: &EvaluationContext,
    ) -> DecisionStream {
        let algorithm = *self;
        let policies = policies.to_vec();
        let ctx = ctx.clone();

        stream::once(async move {
            let result = algorithm.match_policies(&policies, &ctx).await;
            (result, ctx)
        })
        .switch_map(move |(result, ctx)| algorithm.combine_matching_documents(result, &ctx))
        .boxed()
    }

    async fn match_policies(
        &self,
        policies: &[Arc<Policy>],
        ctx: &EvaluationContext,
    ) -> PolicyRetrievalResult {
        let first_applicable = *self == CombiningAlgorithm::FirstApplicable;
        let mut result = PolicyRetrievalResult::new();

        for policy in policies {
            match policy.matches(ctx).await {
                Val::Error(err) => {
                    trace!("target of '{}' failed: {}", policy.name, err);
                    result = result.with_error();
                    // An undecidable target hides whether later policies
                    // come first.
                    if first_applicable {
                        break;
                    }
                }
                value if value.as_bool() == Some(true) => {
                    result = result.with_match(Document::Policy(Arc::clone(policy)));
                    if first_applicable {
                        break;
                    }
                }
                _ => {}
            }
        }
        result
    }
}

/// deny-overrides (`winner` DENY) and permit-overrides (`winner` PERMIT).
fn overrides(decisions: &[AuthorizationDecision], winner: Decision) -> AuthorizationDecision {
    let loser = match winner {
        Decision::Deny => Decision::Permit,
        _ => Decision::Deny,
    };

    let mut collector = ObligationAdviceCollector::new();
    let mut transforms = Transforms::default();
    let mut has_winner = false;
    let mut has_loser = false;
    let mut has_indeterminate = false;

    for decision in decisions {
        transforms.observe(decision);
        match decision.decision {
            d if d == winner => {
                has_winner = true;
                collector.add(winner, decision);
            }
            d if d == loser => {
                has_loser = true;
                collector.add(loser, decision);
            }
            Decision::Indeterminate => has_indeterminate = true,
            _ => {}
        }
    }

    let outcome = if has_winner {
        winner
    } else if has_loser {
        loser
    } else if has_indeterminate {
        return AuthorizationDecision::INDETERMINATE;
    } else {
        return AuthorizationDecision::NOT_APPLICABLE;
    };

    finish(outcome, &collector, transforms)
}

/// deny-unless-permit (`favored` PERMIT) and permit-unless-deny (`favored`
/// DENY). The result is never NOT_APPLICABLE or INDETERMINATE.
fn unless(decisions: &[AuthorizationDecision], favored: Decision) -> AuthorizationDecision {
    let fallback = match favored {
        Decision::Permit => Decision::Deny,
        _ => Decision::Permit,
    };

    let mut collector = ObligationAdviceCollector::new();
    let mut transforms = Transforms::default();
    let mut running = fallback;

    for decision in decisions {
        transforms.observe(decision);
        if decision.decision == favored {
            running = favored;
            collector.add(favored, decision);
        } else if decision.decision == fallback && running != favored {
            collector.add(fallback, decision);
        }
    }

    finish(running, &collector, transforms)
}

fn only_one(decisions: &[AuthorizationDecision], errors_in_target: bool) -> AuthorizationDecision {
    match decisions {
        _ if errors_in_target => AuthorizationDecision::INDETERMINATE,
        [] => AuthorizationDecision::NOT_APPLICABLE,
        [single] => single.clone(),
        _ => AuthorizationDecision::INDETERMINATE,
    }
}

fn first(decisions: &[AuthorizationDecision], errors_in_target: bool) -> AuthorizationDecision {
    if errors_in_target {
        return AuthorizationDecision::INDETERMINATE;
    }
    decisions
        .first()
        .cloned()
        .unwrap_or(AuthorizationDecision::NOT_APPLICABLE)
}

/// Resource transformations seen on permitting decisions.
#[derive(Default)]
struct Transforms {
    count: usize,
    resource: Option<Value>,
}

impl Transforms {
    fn observe(&mut self, decision: &AuthorizationDecision) {
        if decision.decision == Decision::Permit && decision.has_transform() {
            self.count += 1;
            self.resource = decision.resource.clone();
        }
    }
}

fn finish(
    outcome: Decision,
    collector: &ObligationAdviceCollector,
    transforms: Transforms,
) -> AuthorizationDecision {
    match outcome {
        Decision::Permit if transforms.count > 1 => {
            trace!("{} permits carry a transform, denying", transforms.count);
            collector.decision(Decision::Deny, None)
        }
        Decision::Permit => collector.decision(Decision::Permit, transforms.resource),
        other => collector.decision(other, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::CombiningAlgorithm::*;

    fn permit_with(resource: Value) -> AuthorizationDecision {
        AuthorizationDecision::PERMIT.with_resource(Some(resource))
    }

    fn combine(algorithm: CombiningAlgorithm, decisions: &[AuthorizationDecision]) -> Decision {
        algorithm.combine_decisions(decisions, false).decision
    }

    #[test]
    fn test_single_decision_is_identity() {
        for algorithm in CombiningAlgorithm::ALL {
            for decision in [
                AuthorizationDecision::PERMIT,
                AuthorizationDecision::DENY,
                permit_with(json!("t")),
            ] {
                assert_eq!(
                    algorithm.combine_decisions(&[decision.clone()], false),
                    decision,
                    "{}",
                    algorithm
                );
            }
        }
        for algorithm in [DenyOverrides, PermitOverrides, OnlyOneApplicable, FirstApplicable] {
            for decision in [
                AuthorizationDecision::NOT_APPLICABLE,
                AuthorizationDecision::INDETERMINATE,
            ] {
                assert_eq!(
                    algorithm.combine_decisions(&[decision.clone()], false),
                    decision
                );
            }
        }
    }

    #[test]
    fn test_overrides() {
        let both = [AuthorizationDecision::DENY, AuthorizationDecision::PERMIT];
        assert_eq!(combine(DenyOverrides, &both), Decision::Deny);
        assert_eq!(combine(PermitOverrides, &both), Decision::Permit);
        assert_eq!(combine(DenyOverrides, &[]), Decision::NotApplicable);
        assert_eq!(combine(PermitOverrides, &[]), Decision::NotApplicable);

        let mixed = [
            AuthorizationDecision::PERMIT,
            AuthorizationDecision::INDETERMINATE,
            AuthorizationDecision::NOT_APPLICABLE,
        ];
        assert_eq!(combine(DenyOverrides, &mixed), Decision::Permit);
        assert_eq!(
            combine(
                DenyOverrides,
                &[AuthorizationDecision::INDETERMINATE, AuthorizationDecision::NOT_APPLICABLE]
            ),
            Decision::Indeterminate
        );
    }

    #[test]
    fn test_overrides_ignore_target_errors() {
        assert_eq!(
            DenyOverrides.combine_decisions(&[], true),
            AuthorizationDecision::NOT_APPLICABLE
        );
        assert_eq!(
            PermitOverrides.combine_decisions(&[AuthorizationDecision::PERMIT], true),
            AuthorizationDecision::PERMIT
        );
    }

    #[test]
    fn test_unless() {
        assert_eq!(combine(DenyUnlessPermit, &[]), Decision::Deny);
        assert_eq!(combine(DenyUnlessPermit, &[AuthorizationDecision::PERMIT]), Decision::Permit);
        assert_eq!(
            combine(
                DenyUnlessPermit,
                &[AuthorizationDecision::DENY, AuthorizationDecision::INDETERMINATE]
            ),
            Decision::Deny
        );
        assert_eq!(combine(PermitUnlessDeny, &[]), Decision::Permit);
        assert_eq!(combine(PermitUnlessDeny, &[AuthorizationDecision::DENY]), Decision::Deny);
        assert_eq!(
            combine(
                PermitUnlessDeny,
                &[AuthorizationDecision::INDETERMINATE, AuthorizationDecision::NOT_APPLICABLE]
            ),
            Decision::Permit
        );
        assert_eq!(DenyUnlessPermit.combine_decisions(&[], true), AuthorizationDecision::DENY);
    }

    #[test]
    fn test_only_one_applicable() {
        assert_eq!(combine(OnlyOneApplicable, &[]), Decision::NotApplicable);
        assert_eq!(
            combine(
                OnlyOneApplicable,
                &[AuthorizationDecision::PERMIT, AuthorizationDecision::PERMIT]
            ),
            Decision::Indeterminate
        );
        assert_eq!(
            OnlyOneApplicable.combine_decisions(&[AuthorizationDecision::PERMIT], true),
            AuthorizationDecision::INDETERMINATE
        );
    }

    #[test]
    fn test_first_applicable() {
        let decisions = [AuthorizationDecision::DENY, AuthorizationDecision::PERMIT];
        assert_eq!(combine(FirstApplicable, &decisions), Decision::Deny);
        assert_eq!(combine(FirstApplicable, &[]), Decision::NotApplicable);
        assert_eq!(
            FirstApplicable.combine_decisions(&decisions, true),
            AuthorizationDecision::INDETERMINATE
        );
    }

    #[test]
    fn test_transform_ambiguity() {
        let one_transform = [AuthorizationDecision::PERMIT, permit_with(json!({"masked": true}))];
        for algorithm in [DenyOverrides, PermitOverrides, DenyUnlessPermit, PermitUnlessDeny] {
            let combined = algorithm.combine_decisions(&one_transform, false);
            assert_eq!(combined.decision, Decision::Permit, "{}", algorithm);
            assert_eq!(combined.resource, Some(json!({"masked": true})), "{}", algorithm);
        }

        let two_transforms = [permit_with(json!(1)), permit_with(json!(2))];
        for algorithm in [DenyOverrides, PermitOverrides, DenyUnlessPermit, PermitUnlessDeny] {
            let combined = algorithm.combine_decisions(&two_transforms, false);
            assert_eq!(combined.decision, Decision::Deny, "{}", algorithm);
            assert_eq!(combined.resource, None);
        }
    }

    #[test]
    fn test_obligations_follow_final_decision() {
        let decisions = [
            AuthorizationDecision::DENY
                .with_obligations(Some(vec![json!("obligation1")]))
                .with_advice(Some(vec![json!("advice1")])),
            AuthorizationDecision::DENY
                .with_obligations(Some(vec![json!("obligation2")]))
                .with_advice(Some(vec![json!("advice2")])),
            AuthorizationDecision::PERMIT
                .with_obligations(Some(vec![json!("obligation3")]))
                .with_advice(Some(vec![json!("advice3")])),
        ];

        let denied = DenyOverrides.combine_decisions(&decisions, false);
        assert_eq!(
            denied.obligations,
            Some(vec![json!("obligation1"), json!("obligation2")])
        );
        assert_eq!(denied.advice, Some(vec![json!("advice1"), json!("advice2")]));

        let permitted = PermitOverrides.combine_decisions(&decisions, false);
        assert_eq!(permitted.obligations, Some(vec![json!("obligation3")]));
        assert_eq!(permitted.advice, Some(vec![json!("advice3")]));
    }

    #[test]
    fn test_unless_drops_deny_obligations_once_permitted() {
        let decisions = [
            AuthorizationDecision::DENY.with_obligations(Some(vec![json!("deny-1")])),
            AuthorizationDecision::PERMIT.with_obligations(Some(vec![json!("permit")])),
            AuthorizationDecision::DENY.with_obligations(Some(vec![json!("deny-2")])),
        ];
        let combined = DenyUnlessPermit.combine_decisions(&decisions, false);
        assert_eq!(combined.decision, Decision::Permit);
        assert_eq!(combined.obligations, Some(vec![json!("permit")]));

        let denied = DenyUnlessPermit.combine_decisions(&decisions[..1], false);
        assert_eq!(denied.obligations, Some(vec![json!("deny-1")]));
    }

    #[tokio::test]
    async fn test_combine_policies_first_applicable_stops_at_first_match() {
        let policies = vec![
            Arc::new(Policy::permit("never").with_target(crate::expression::Expr::boolean(false))),
            Arc::new(Policy::deny("first-match")),
            Arc::new(Policy::permit("second-match")),
        ];
        let decision = FirstApplicable
            .combine_policies(&policies, &EvaluationContext::default())
            .next()
            .await;
        assert_eq!(decision, Some(AuthorizationDecision::DENY));
    }
}
