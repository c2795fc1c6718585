//! Embedded decision point.
//!
//! Every subscription is served by its own task. The task drives the
//! decision pipeline of the subscription and forwards each new decision
//! through a bounded channel to the stream handed to the caller. Dropping
//! that stream aborts the task, which drops the pipeline and with it every
//! attribute subscription the pipeline holds.
//!
//! The pipeline combines the latest variables, the latest top-level
//! combining algorithm and the latest document version. Any change to one of
//! them discards the running evaluation and starts a new retrieval and
//! combination; consecutive equal decisions are emitted once.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, select_all, Stream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tracing::{debug, error, info_span, trace, Instrument};
use uuid::Uuid;
use vigil_core::{
    combine_latest, just, AttributeResolver, AuthorizationDecision, AuthorizationSubscription,
    BoxStream, DecisionStream, EvaluationContext, FunctionLibrary, FunctionResolver,
    IdentifiableAuthorizationDecision, MultiAuthorizationDecision, MultiAuthorizationSubscription,
    NoAttributes, ReactiveExt,
};
use vigil_index::PolicyRetrievalPoint;
use vigil_policy::{CombiningAlgorithm, DecisionAudit, DecisionRecord};

use crate::config::PdpConfig;
use crate::provider::{ConfigurationProvider, Variables, WatchConfigurationProvider};

/// Decisions buffered per subscription before the task waits for the
/// consumer.
const DECISION_BUFFER: usize = 16;

/// One input of the decision pipeline.
#[derive(Clone)]
enum Input {
    Variables(Variables),
    Algorithm(CombiningAlgorithm),
    Documents(u64),
}

/// A policy decision point running inside the caller's tokio runtime.
#[derive(Clone)]
pub struct EmbeddedPdp {
    prp: Arc<PolicyRetrievalPoint>,
    config: Arc<dyn ConfigurationProvider>,
    attributes: Arc<dyn AttributeResolver>,
    functions: Arc<dyn FunctionResolver>,
    audit: Option<DecisionAudit>,
}

impl EmbeddedPdp {
    pub fn builder() -> EmbeddedPdpBuilder {
        EmbeddedPdpBuilder::default()
    }

    /// A decision point with an empty retrieval point, configured by
    /// `config`.
    pub fn from_config(config: PdpConfig) -> Self {
        let prp = PolicyRetrievalPoint::new(config.index);
        Self::builder()
            .with_prp(Arc::new(prp))
            .with_configuration(Arc::new(WatchConfigurationProvider::new(config)))
            .build()
    }

    /// The retrieval point holding the documents this decision point
    /// evaluates.
    pub fn prp(&self) -> &Arc<PolicyRetrievalPoint> {
        &self.prp
    }

    pub fn audit(&self) -> Option<&DecisionAudit> {
        self.audit.as_ref()
    }

    /// Subscribe to the decisions for one subscription.
    ///
    /// The returned stream emits a decision whenever the inputs of the
    /// subscription change the outcome, and never ends on its own. Must be
    /// called within a tokio runtime.
    pub fn decide(&self, subscription: AuthorizationSubscription) -> DecisionStream {
        let id = Uuid::new_v4().to_string();
        self.spawn(id, subscription).boxed()
    }

    /// The first decision for `subscription`.
    pub async fn decide_once(&self, subscription: AuthorizationSubscription) -> AuthorizationDecision {
        self.decide(subscription)
            .next()
            .await
            .unwrap_or(AuthorizationDecision::INDETERMINATE)
    }

    /// Subscribe to several subscriptions at once, receiving each decision
    /// tagged with the id of the subscription it answers.
    ///
    /// The subscriptions are decided independently. Without any
    /// subscriptions a single untagged INDETERMINATE decision is emitted.
    pub fn decide_multi(
        &self,
        multi: MultiAuthorizationSubscription,
    ) -> BoxStream<IdentifiableAuthorizationDecision> {
        if multi.is_empty() {
            return just(IdentifiableAuthorizationDecision::indeterminate());
        }

        let streams = multi.iter().map(|(id, subscription)| {
            let id = id.clone();
            self.spawn(id.clone(), subscription.clone())
                .map(move |decision| IdentifiableAuthorizationDecision::new(id.clone(), decision))
                .boxed()
        });
        select_all(streams).boxed()
    }

    /// Subscribe to several subscriptions at once, receiving the latest
    /// decision of every subscription on each change.
    ///
    /// The first snapshot is emitted once every subscription has a
    /// decision. Without any subscriptions a single indeterminate snapshot is
    /// emitted.
    pub fn decide_all(
        &self,
        multi: MultiAuthorizationSubscription,
    ) -> BoxStream<MultiAuthorizationDecision> {
        if multi.is_empty() {
            return just(MultiAuthorizationDecision::indeterminate());
        }

        let ids: Vec<String> = multi.iter().map(|(id, _)| id.clone()).collect();
        let streams = multi
            .iter()
            .map(|(id, subscription)| self.spawn(id.clone(), subscription.clone()).boxed())
            .collect();

        combine_latest(streams)
            .map(move |decisions| {
                ids.iter()
                    .cloned()
                    .zip(decisions)
                    .map(|(id, decision)| IdentifiableAuthorizationDecision::new(id, decision))
                    .collect::<MultiAuthorizationDecision>()
            })
            .distinct_until_changed()
            .boxed()
    }

    /// Build the decision pipeline of one subscription.
    fn pipeline(&self, subscription: AuthorizationSubscription) -> DecisionStream {
        let inputs = vec![
            self.config.variables().map(Input::Variables).boxed(),
            self.config.algorithm().map(Input::Algorithm).boxed(),
            WatchStream::new(self.prp.changes())
                .map(Input::Documents)
                .boxed(),
        ];
        let base = EvaluationContext::new(Arc::clone(&self.attributes), Arc::clone(&self.functions));
        let prp = Arc::clone(&self.prp);

        combine_latest(inputs)
            .switch_map(move |inputs| {
                let mut variables = Variables::default();
                let mut algorithm = CombiningAlgorithm::default();
                for input in inputs {
                    match input {
                        Input::Variables(v) => variables = v,
                        Input::Algorithm(a) => algorithm = a,
                        Input::Documents(version) => trace!("documents at version {}", version),
                    }
                }

                let ctx = base
                    .with_variables(variables.iter().map(|(k, v)| (k.clone(), v.clone())))
                    .with_subscription(&subscription);
                let prp = Arc::clone(&prp);
                stream::once(async move {
                    let result = prp.retrieve_policies(&ctx).await;
                    (result, ctx)
                })
                .switch_map(move |(result, ctx)| algorithm.combine_matching_documents(result, &ctx))
                .boxed()
            })
            .distinct_until_changed()
            .boxed()
    }

    /// Start the task serving one subscription.
    fn spawn(&self, id: String, subscription: AuthorizationSubscription) -> SubscriptionStream {
        let (sender, receiver) = mpsc::channel(DECISION_BUFFER);
        let pipeline = self.pipeline(subscription.clone());
        let audit = self.audit.clone();
        let span = info_span!("subscription", id = %id);

        let handle = tokio::spawn(
            async move {
                debug!("subscription opened");
                let mut decisions = AssertUnwindSafe(pipeline).catch_unwind();
                let mut last: Option<AuthorizationDecision> = None;

                while let Some(outcome) = decisions.next().await {
                    let decision = match outcome {
                        Ok(decision) => decision,
                        Err(_) => {
                            error!("decision pipeline panicked");
                            AuthorizationDecision::INDETERMINATE
                        }
                    };
                    if last.as_ref() == Some(&decision) {
                        continue;
                    }
                    debug!("decision {}", decision.decision);
                    last = Some(decision.clone());

                    if let Some(audit) = &audit {
                        audit.record(DecisionRecord::new(
                            id.clone(),
                            subscription.clone(),
                            decision.clone(),
                        ));
                    }
                    if sender.send(decision).await.is_err() {
                        break;
                    }
                }
                debug!("subscription closed");
            }
            .instrument(span),
        );

        SubscriptionStream {
            decisions: ReceiverStream::new(receiver),
            task: handle,
        }
    }
}

impl std::fmt::Debug for EmbeddedPdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedPdp")
            .field("prp", &self.prp)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

/// The decisions of one subscription. Dropping it cancels the
/// subscription.
struct SubscriptionStream {
    decisions: ReceiverStream<AuthorizationDecision>,
    task: JoinHandle<()>,
}

impl Stream for SubscriptionStream {
    type Item = AuthorizationDecision;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.decisions.poll_next_unpin(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Builder for [`EmbeddedPdp`].
#[derive(Default)]
pub struct EmbeddedPdpBuilder {
    prp: Option<Arc<PolicyRetrievalPoint>>,
    config: Option<Arc<dyn ConfigurationProvider>>,
    attributes: Option<Arc<dyn AttributeResolver>>,
    functions: Option<Arc<dyn FunctionResolver>>,
    audit: Option<DecisionAudit>,
}

impl EmbeddedPdpBuilder {
    pub fn with_prp(mut self, prp: Arc<PolicyRetrievalPoint>) -> Self {
        self.prp = Some(prp);
        self
    }

    pub fn with_configuration(mut self, config: Arc<dyn ConfigurationProvider>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn AttributeResolver>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_functions(mut self, functions: Arc<dyn FunctionResolver>) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Record every emitted decision in `audit`.
    pub fn with_audit(mut self, audit: DecisionAudit) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the decision point. Missing parts default to an empty
    /// retrieval point, the default configuration, no attributes and no
    /// functions.
    pub fn build(self) -> EmbeddedPdp {
        EmbeddedPdp {
            prp: self.prp.unwrap_or_default(),
            config: self
                .config
                .unwrap_or_else(|| Arc::new(WatchConfigurationProvider::default())),
            attributes: self.attributes.unwrap_or_else(|| Arc::new(NoAttributes)),
            functions: self
                .functions
                .unwrap_or_else(|| Arc::new(FunctionLibrary::new())),
            audit: self.audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_core::Decision;
    use vigil_policy::{Document, Expr, Policy};

    fn subscription(role: &str) -> AuthorizationSubscription {
        AuthorizationSubscription::new(json!({"role": role}), json!("read"), json!("doc"))
    }

    #[tokio::test]
    async fn test_no_documents() {
        let pdp = EmbeddedPdp::from_config(
            PdpConfig::default().with_algorithm(CombiningAlgorithm::DenyUnlessPermit),
        );
        assert_eq!(pdp.decide_once(subscription("any")).await, AuthorizationDecision::DENY);

        let pdp = EmbeddedPdp::builder().build();
        assert_eq!(
            pdp.decide_once(subscription("any")).await,
            AuthorizationDecision::NOT_APPLICABLE
        );
    }

    #[tokio::test]
    async fn test_variables_are_visible_to_documents() {
        let pdp = EmbeddedPdp::from_config(
            PdpConfig::default().with_variable("tenant", json!("acme")),
        );
        pdp.prp().put(
            "tenant",
            Document::from(
                Policy::permit("tenant").with_target(Expr::variable("tenant").equals(Expr::value("acme"))),
            ),
        );
        assert_eq!(
            pdp.decide_once(subscription("any")).await.decision,
            Decision::Permit
        );
    }

    #[tokio::test]
    async fn test_audit_records_emitted_decisions() {
        let audit = DecisionAudit::new(10);
        let pdp = EmbeddedPdp::builder().with_audit(audit.clone()).build();
        pdp.prp().put("open", Document::from(Policy::permit("open")));

        let mut decisions = pdp.decide_multi(
            MultiAuthorizationSubscription::new().add("request-1", subscription("any")),
        );
        let first = decisions.next().await.unwrap();
        assert_eq!(first.subscription_id.as_deref(), Some("request-1"));

        let latest = audit.latest("request-1").unwrap();
        assert_eq!(latest.decision, AuthorizationDecision::PERMIT);
    }

    #[tokio::test]
    async fn test_panicking_function_yields_indeterminate() {
        let functions = FunctionLibrary::new().register("explode", |_args: &[vigil_core::Val]| {
            panic!("boom");
        });
        let pdp = EmbeddedPdp::builder()
            .with_functions(Arc::new(functions))
            .build();
        pdp.prp().put(
            "explosive",
            Document::from(Policy::permit("explosive").with_condition(Expr::function("explode", vec![]))),
        );

        let mut decisions = pdp.decide(subscription("any"));
        assert_eq!(decisions.next().await, Some(AuthorizationDecision::INDETERMINATE));
    }
}
