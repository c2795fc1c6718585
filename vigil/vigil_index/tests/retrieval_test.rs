//! Integration tests for policy retrieval.
//!
//! These tests compare the formula index with the naive index and check the
//! snapshot guarantees of the retrieval point under concurrent mutation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use vigil_core::{AuthorizationSubscription, EvaluationContext};
use vigil_index::{CanonicalIndex, IndexType, NaiveIndex, PolicyIndex, PolicyRetrievalPoint};
use vigil_policy::{Document, Expr, Policy};

fn ctx(subject: Value, action: &str, resource: Value) -> EvaluationContext {
    let sub = AuthorizationSubscription::new(subject, json!(action), resource);
    EvaluationContext::default().with_subscription(&sub)
}

fn role(name: &str) -> Expr {
    Expr::path("subject", "role").equals(Expr::value(name))
}

fn action(name: &str) -> Expr {
    Expr::variable("action").equals(Expr::value(name))
}

fn public() -> Expr {
    Expr::path("resource", "public").equals(Expr::value(true))
}

fn document_set() -> BTreeMap<String, Document> {
    let policies = vec![
        Policy::permit("admin-all").with_target(role("admin")),
        Policy::permit("read-public").with_target(Expr::and(action("read"), public())),
        Policy::deny("guest-write").with_target(Expr::and(role("guest"), Expr::negation(action("read")))),
        Policy::permit("staff-or-public").with_target(Expr::or(role("staff"), public())),
        Policy::deny("not-admin-delete")
            .with_target(Expr::negation(Expr::or(role("admin"), Expr::negation(action("delete"))))),
        Policy::permit("open"),
        Policy::deny("nested").with_target(Expr::and(
            Expr::or(role("guest"), role("staff")),
            Expr::or(action("write"), Expr::and(action("delete"), Expr::negation(public()))),
        )),
    ];
    policies
        .into_iter()
        .enumerate()
        .map(|(i, p)| (format!("{:02}", i), Document::from(p)))
        .collect()
}

fn requests() -> Vec<EvaluationContext> {
    let mut contexts = Vec::new();
    for subject in ["admin", "staff", "guest", "nobody"] {
        for act in ["read", "write", "delete"] {
            for public in [true, false] {
                contexts.push(ctx(
                    json!({"role": subject}),
                    act,
                    json!({"public": public}),
                ));
            }
        }
    }
    contexts
}

#[tokio::test]
async fn test_canonical_index_agrees_with_naive_index() {
    let documents = document_set();
    let naive = NaiveIndex::new(&documents);
    let canonical = CanonicalIndex::new(&documents);
    assert!(canonical.indexing_errors().is_empty());

    for ctx in requests() {
        let expected = naive.retrieve(&ctx).await;
        let actual = canonical.retrieve(&ctx).await;
        assert_eq!(actual, expected, "mismatch for {:?}", ctx);
    }
}

#[tokio::test]
async fn test_indexes_agree_on_target_errors() {
    let mut documents = document_set();
    documents.insert(
        "99".to_string(),
        Document::from(Policy::permit("needs-tenant").with_target(Expr::variable("tenant"))),
    );
    let naive = NaiveIndex::new(&documents);
    let canonical = CanonicalIndex::new(&documents);

    let ctx = ctx(json!({"role": "staff"}), "read", json!({"public": false}));
    let expected = naive.retrieve(&ctx).await;
    let actual = canonical.retrieve(&ctx).await;
    assert!(expected.errors_in_target);
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_indexes_agree_on_masked_and_falsified_errors() {
    let missing = || Expr::variable("missing");
    let targets = vec![
        ("masked", Expr::or(missing(), role("admin"))),
        ("masked-right", Expr::or(role("admin"), missing())),
        ("falsified", Expr::and(missing(), role("guest"))),
        ("falsified-right", Expr::and(role("guest"), missing())),
        ("unknown", Expr::and(missing(), role("admin"))),
        ("negated", Expr::negation(Expr::and(missing(), role("guest")))),
    ];

    for (name, target) in targets {
        let documents: BTreeMap<String, Document> = [
            ("a".to_string(), Document::from(Policy::permit(name).with_target(target))),
            ("b".to_string(), Document::from(Policy::deny("staff").with_target(role("staff")))),
        ]
        .into_iter()
        .collect();
        let naive = NaiveIndex::new(&documents);
        let canonical = CanonicalIndex::new(&documents);

        for subject in ["admin", "staff", "guest"] {
            let ctx = ctx(json!({"role": subject}), "read", json!({}));
            let expected = naive.retrieve(&ctx).await;
            let actual = canonical.retrieve(&ctx).await;
            assert_eq!(actual, expected, "{} as {}", name, subject);
        }
    }

    // An operand that fails does not matter once the other one decides.
    let documents: BTreeMap<String, Document> = [(
        "a".to_string(),
        Document::from(Policy::permit("masked").with_target(Expr::or(missing(), role("admin")))),
    )]
    .into_iter()
    .collect();
    let ctx = ctx(json!({"role": "admin"}), "read", json!({}));
    for index in [IndexType::Naive, IndexType::Canonical] {
        let result = index.build(&documents).retrieve(&ctx).await;
        assert_eq!(result.names(), vec!["masked"], "{}", index);
        assert!(!result.errors_in_target, "{}", index);
    }

    let documents: BTreeMap<String, Document> = [(
        "a".to_string(),
        Document::from(Policy::permit("unknown").with_target(Expr::and(missing(), role("admin")))),
    )]
    .into_iter()
    .collect();
    for index in [IndexType::Naive, IndexType::Canonical] {
        let result = index.build(&documents).retrieve(&ctx).await;
        assert!(result.is_empty(), "{}", index);
        assert!(result.errors_in_target, "{}", index);
    }
}

#[tokio::test]
async fn test_put_then_remove_restores_candidates() {
    for index_type in [IndexType::Naive, IndexType::Canonical] {
        let prp = PolicyRetrievalPoint::new(index_type);
        prp.put_all(document_set());

        let mut before = Vec::new();
        for ctx in requests() {
            before.push(prp.retrieve_policies(&ctx).await);
        }

        prp.put("50", Document::from(Policy::permit("extra").with_target(role("guest"))));
        prp.remove("50");

        for (ctx, expected) in requests().iter().zip(before) {
            assert_eq!(prp.retrieve_policies(ctx).await, expected);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_updates() {
    fn generation(tag: &str) -> Vec<(String, Document)> {
        vec![
            ("a".to_string(), Document::from(Policy::permit(format!("a-{}", tag)))),
            ("b".to_string(), Document::from(Policy::permit(format!("b-{}", tag)))),
        ]
    }

    let prp = Arc::new(PolicyRetrievalPoint::new(IndexType::Canonical));
    prp.put_all(generation("0"));

    let writer = {
        let prp = Arc::clone(&prp);
        tokio::spawn(async move {
            for round in 1..=200 {
                prp.put_all(generation(&round.to_string()));
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let prp = Arc::clone(&prp);
        readers.push(tokio::spawn(async move {
            let ctx = ctx(json!({}), "read", json!({}));
            for _ in 0..200 {
                let result = prp.retrieve_policies(&ctx).await;
                let names = result.names();
                assert_eq!(names.len(), 2);
                let a = names[0].trim_start_matches("a-");
                let b = names[1].trim_start_matches("b-");
                assert_eq!(a, b, "mixed snapshot: {:?}", names);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(prp.version(), 201);
}
