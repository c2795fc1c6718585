//! Index that matches every target in full.

use std::collections::BTreeMap;

use futures::future::{join_all, BoxFuture};
use tracing::trace;
use vigil_core::{EvaluationContext, Val};
use vigil_policy::{Document, PolicyRetrievalResult};

use crate::index::PolicyIndex;

/// Evaluates the target of every document for every request.
#[derive(Debug, Clone, Default)]
pub struct NaiveIndex {
    documents: Vec<Document>,
}

impl NaiveIndex {
    pub fn new(documents: &BTreeMap<String, Document>) -> Self {
        Self {
            documents: documents.values().cloned().collect(),
        }
    }
}

impl PolicyIndex for NaiveIndex {
    fn retrieve<'a>(&'a self, ctx: &'a EvaluationContext) -> BoxFuture<'a, PolicyRetrievalResult> {
        Box::pin(async move {
            let outcomes = join_all(self.documents.iter().map(|doc| doc.matches(ctx))).await;

            let mut result = PolicyRetrievalResult::new();
            for (doc, outcome) in self.documents.iter().zip(outcomes) {
                match outcome {
                    Val::Defined(serde_json::Value::Bool(true)) => {
                        result = result.with_match(doc.clone());
                    }
                    Val::Defined(serde_json::Value::Bool(false)) => {}
                    other => {
                        trace!("target of '{}' is {}", doc.name(), other);
                        result = result.with_error();
                    }
                }
            }
            result
        })
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_core::AuthorizationSubscription;
    use vigil_policy::{Expr, Policy};

    fn ctx() -> EvaluationContext {
        let sub = AuthorizationSubscription::new(json!({"role": "admin"}), json!("read"), json!("doc"));
        EvaluationContext::default().with_subscription(&sub)
    }

    #[tokio::test]
    async fn test_retrieve() {
        let mut documents = BTreeMap::new();
        documents.insert(
            "b".to_string(),
            Document::from(Policy::permit("admin").with_target(
                Expr::path("subject", "role").equals(Expr::value("admin")),
            )),
        );
        documents.insert("a".to_string(), Document::from(Policy::deny("open")));
        documents.insert(
            "c".to_string(),
            Document::from(Policy::permit("guest").with_target(
                Expr::path("subject", "role").equals(Expr::value("guest")),
            )),
        );
        documents.insert(
            "d".to_string(),
            Document::from(Policy::permit("broken").with_target(Expr::variable("missing"))),
        );

        let index = NaiveIndex::new(&documents);
        let result = index.retrieve(&ctx()).await;

        assert_eq!(result.names(), vec!["open", "admin"]);
        assert!(result.errors_in_target);
    }
}
