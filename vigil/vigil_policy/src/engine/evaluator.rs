//! Policy evaluation.
//!
//! This module turns documents into decision streams. A policy's body is
//! evaluated as a chain of statements: each condition narrows
//! applicability, each value definition extends the context seen by the
//! statements after it. Obligations, advice and the transform are evaluated
//! last, in the context the body produced. Every evaluation failure ends in
//! an INDETERMINATE decision for the policy at hand.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tracing::trace;
use vigil_core::reactive::{combine_latest, just, BoxStream, DecisionStream, ReactiveExt};
use vigil_core::{AuthorizationDecision, EvaluationContext, Val};

use crate::expression::{evaluate_target, Expr};
use crate::model::{Document, Entitlement, Policy, PolicySet, Statement, ValueDefinition};

/// A document element that can be matched against and evaluated.
pub trait PolicyElement: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn target(&self) -> Option<&Expr>;

    /// Evaluate the target to a boolean, see [`evaluate_target`].
    ///
    /// A missing target matches. A target producing anything other than a
    /// boolean yields an error value, never `false`.
    fn matches(&self, ctx: &EvaluationContext) -> BoxFuture<'static, Val> {
        let target = self.target().cloned();
        let ctx = ctx.clone();
        async move {
            match target {
                None => Val::TRUE,
                Some(target) => evaluate_target(&target, &ctx).await,
            }
        }
        .boxed()
    }

    /// Evaluate an element whose target already matched.
    fn evaluate(self: Arc<Self>, ctx: &EvaluationContext) -> DecisionStream;
}

/// Where a policy body left the evaluation.
#[derive(Clone)]
enum BodyOutcome {
    /// Every condition held; the context carries the body's values.
    Holds(EvaluationContext),
    NotApplicable,
    Indeterminate,
}

impl PolicyElement for Policy {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<&Expr> {
        self.target.as_ref()
    }

    fn evaluate(self: Arc<Self>, ctx: &EvaluationContext) -> DecisionStream {
        let policy = Arc::clone(&self);
        evaluate_body(self, 0, ctx.clone())
            .switch_map(move |outcome| match outcome {
                BodyOutcome::Holds(ctx) => evaluate_extras(Arc::clone(&policy), &ctx),
                BodyOutcome::NotApplicable => just(AuthorizationDecision::NOT_APPLICABLE),
                BodyOutcome::Indeterminate => just(AuthorizationDecision::INDETERMINATE),
            })
            .distinct_until_changed()
            .boxed()
    }
}

fn evaluate_body(
    policy: Arc<Policy>,
    index: usize,
    ctx: EvaluationContext,
) -> BoxStream<BodyOutcome> {
    let statement = match policy.body.get(index) {
        Some(statement) => statement.clone(),
        None => return just(BodyOutcome::Holds(ctx)),
    };

    match statement {
        Statement::Condition(condition) => condition
            .evaluate(&ctx)
            .switch_map(move |value| match value.as_bool() {
                Some(true) => evaluate_body(Arc::clone(&policy), index + 1, ctx.clone()),
                Some(false) => just(BodyOutcome::NotApplicable),
                None => {
                    trace!("condition {} of '{}' failed: {}", index, policy.name, value);
                    just(BodyOutcome::Indeterminate)
                }
            })
            .boxed(),
        Statement::Value(ValueDefinition { name, expr }) => expr
            .evaluate(&ctx)
            .switch_map(move |value| match value {
                Val::Defined(v) => {
                    let scoped = ctx.with_variable(name.clone(), v);
                    evaluate_body(Arc::clone(&policy), index + 1, scoped)
                }
                other => {
                    trace!("value '{}' of '{}' is {}", name, policy.name, other);
                    just(BodyOutcome::Indeterminate)
                }
            })
            .boxed(),
    }
}

/// Obligations, advice and (for permits) the transform, combined into the
/// policy's decision.
fn evaluate_extras(policy: Arc<Policy>, ctx: &EvaluationContext) -> DecisionStream {
    let transform = match policy.entitlement {
        Entitlement::Permit => policy.transform.as_ref(),
        Entitlement::Deny => None,
    };
    let streams = policy
        .obligations
        .iter()
        .chain(policy.advice.iter())
        .chain(transform)
        .map(|expr| expr.evaluate(ctx))
        .collect();

    combine_latest(streams)
        .map(move |values| build_decision(&policy, values))
        .boxed()
}

fn build_decision(policy: &Policy, values: Vec<Val>) -> AuthorizationDecision {
    let mut defined = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Val::Defined(v) => defined.push(v),
            // An obligation that cannot be computed must not be dropped.
            other => {
                trace!("extras of '{}' failed: {}", policy.name, other);
                return AuthorizationDecision::INDETERMINATE;
            }
        }
    }

    let mut rest = defined.into_iter();
    let obligations: Vec<Value> = rest.by_ref().take(policy.obligations.len()).collect();
    let advice: Vec<Value> = rest.by_ref().take(policy.advice.len()).collect();
    let resource = rest.next();

    AuthorizationDecision::of(policy.entitlement.decision())
        .with_resource(resource)
        .with_obligations(Some(obligations).filter(|o| !o.is_empty()))
        .with_advice(Some(advice).filter(|a| !a.is_empty()))
}

impl PolicyElement for PolicySet {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<&Expr> {
        self.target.as_ref()
    }

    fn evaluate(self: Arc<Self>, ctx: &EvaluationContext) -> DecisionStream {
        let set = Arc::clone(&self);
        evaluate_set_variables(self, 0, ctx.clone())
            .switch_map(move |scoped| match scoped {
                Some(ctx) => set.algorithm.combine_policies(&set.policies, &ctx),
                None => just(AuthorizationDecision::INDETERMINATE),
            })
            .distinct_until_changed()
            .boxed()
    }
}

/// The set's context with all its values bound, or `None` if one of them
/// is undefined or an error.
fn evaluate_set_variables(
    set: Arc<PolicySet>,
    index: usize,
    ctx: EvaluationContext,
) -> BoxStream<Option<EvaluationContext>> {
    let definition = match set.variables.get(index) {
        Some(definition) => definition.clone(),
        None => return just(Some(ctx)),
    };

    definition
        .expr
        .evaluate(&ctx)
        .switch_map(move |value| match value {
            Val::Defined(v) => {
                let scoped = ctx.with_variable(definition.name.clone(), v);
                evaluate_set_variables(Arc::clone(&set), index + 1, scoped)
            }
            other => {
                trace!("variable '{}' of '{}' is {}", definition.name, set.name, other);
                just(None)
            }
        })
        .boxed()
}

impl Document {
    pub fn matches(&self, ctx: &EvaluationContext) -> BoxFuture<'static, Val> {
        match self {
            Document::Policy(p) => p.matches(ctx),
            Document::PolicySet(s) => s.matches(ctx),
        }
    }

    pub fn evaluate(&self, ctx: &EvaluationContext) -> DecisionStream {
        trace!("evaluating '{}'", self.name());
        match self {
            Document::Policy(p) => Arc::clone(p).evaluate(ctx),
            Document::PolicySet(s) => Arc::clone(s).evaluate(ctx),
        }
    }
}
