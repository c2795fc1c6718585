//! Policy retrieval point.
//!
//! The retrieval point owns the document set and the index built from it.
//! Both live in one immutable snapshot behind an [`ArcSwap`]: a retrieval
//! loads the current snapshot once and works on it to the end, while a
//! mutation builds a complete new snapshot on the side and swaps it in.
//! Readers therefore see the document set either before or after a
//! mutation, never in between. Mutations are serialized by a write lock so
//! no update is lost; readers never take it.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};
use vigil_core::{EvaluationContext, IndexError, Result};
use vigil_policy::{Document, DocumentStore, PolicyRetrievalResult};

use crate::index::{IndexType, PolicyIndex};

/// One consistent state of the retrieval point.
struct Snapshot {
    documents: BTreeMap<String, Document>,
    index: Arc<dyn PolicyIndex>,
    version: u64,
}

impl Snapshot {
    fn build(index_type: IndexType, documents: BTreeMap<String, Document>, version: u64) -> Self {
        let index = index_type.build(&documents);
        Self {
            documents,
            index,
            version,
        }
    }
}

/// Indexed store of the documents a decision point evaluates.
pub struct PolicyRetrievalPoint {
    index_type: IndexType,
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    changes: watch::Sender<u64>,
}

impl PolicyRetrievalPoint {
    /// Create an empty retrieval point.
    pub fn new(index_type: IndexType) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            index_type,
            snapshot: ArcSwap::from_pointee(Snapshot::build(index_type, BTreeMap::new(), 0)),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Create a retrieval point holding every document of `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - The store to load from.
    /// * `index_type` - The index strategy to use.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyRetrievalPoint)` - The loaded retrieval point.
    /// * `Err` - If the store could not be read.
    pub fn from_store(store: &dyn DocumentStore, index_type: IndexType) -> Result<Self> {
        let prp = Self::new(index_type);
        prp.put_all(store.list_documents()?);
        Ok(prp)
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Add or replace a document, returning the one it replaced.
    pub fn put(&self, id: impl Into<String>, document: Document) -> Option<Document> {
        let id = id.into();
        let mut previous = None;
        self.mutate(|documents| {
            previous = documents.insert(id.clone(), document);
            true
        });
        debug!("put document '{}'", id);
        previous
    }

    /// Parse a document from JSON and add or replace it.
    ///
    /// # Returns
    ///
    /// * `Ok(Option<Document>)` - The document that was replaced, if any.
    /// * `Err` - If the JSON is not a valid document. The retrieval point
    ///   is left unchanged.
    pub fn put_json(&self, id: impl Into<String>, json: &str) -> Result<Option<Document>> {
        let document = Document::from_json(json)?;
        Ok(self.put(id, document))
    }

    /// Add or replace several documents with a single rebuild.
    pub fn put_all<I>(&self, documents: I)
    where
        I: IntoIterator<Item = (String, Document)>,
    {
        self.mutate(|current| {
            let mut count = 0usize;
            for (id, document) in documents {
                current.insert(id, document);
                count += 1;
            }
            debug!("put {} documents", count);
            count > 0
        });
    }

    /// Remove a document, returning it if it was present.
    pub fn remove(&self, id: &str) -> Option<Document> {
        let mut removed = None;
        self.mutate(|documents| {
            removed = documents.remove(id);
            removed.is_some()
        });
        removed
    }

    /// Find the documents matching the request in `ctx`.
    pub async fn retrieve_policies(&self, ctx: &EvaluationContext) -> PolicyRetrievalResult {
        let snapshot = self.snapshot.load_full();
        snapshot.index.retrieve(ctx).await
    }

    /// Get a document by id.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.snapshot.load().documents.get(id).cloned()
    }

    /// Ids of all documents, in order.
    pub fn ids(&self) -> Vec<String> {
        self.snapshot.load().documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents the current index had to leave out.
    pub fn indexing_errors(&self) -> Vec<(String, IndexError)> {
        self.snapshot.load().index.indexing_errors().to_vec()
    }

    /// Version of the current snapshot, incremented by every mutation.
    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    /// Receiver of the snapshot version, notified after every mutation.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Apply `f` to a copy of the document set and publish the result.
    ///
    /// Nothing is rebuilt when `f` reports no change.
    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut BTreeMap<String, Document>) -> bool,
    {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();

        let mut documents = current.documents.clone();
        if !f(&mut documents) {
            return;
        }

        let version = current.version + 1;
        let snapshot = Snapshot::build(self.index_type, documents, version);
        info!(
            "rebuilt {} index: {} documents, {} indexing errors, version {}",
            self.index_type,
            snapshot.documents.len(),
            snapshot.index.indexing_errors().len(),
            version
        );
        self.snapshot.store(Arc::new(snapshot));
        self.changes.send_replace(version);
    }
}

impl Default for PolicyRetrievalPoint {
    fn default() -> Self {
        Self::new(IndexType::default())
    }
}

impl std::fmt::Debug for PolicyRetrievalPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("PolicyRetrievalPoint")
            .field("index_type", &self.index_type)
            .field("documents", &snapshot.documents.len())
            .field("version", &snapshot.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_core::{AuthorizationSubscription, Error};
    use vigil_policy::{Expr, InMemoryDocumentStore, Policy};

    fn ctx(role: &str) -> EvaluationContext {
        let sub = AuthorizationSubscription::new(json!({"role": role}), json!("read"), json!("doc"));
        EvaluationContext::default().with_subscription(&sub)
    }

    fn for_role(name: &str, role: &str) -> Document {
        Document::from(
            Policy::permit(name).with_target(Expr::path("subject", "role").equals(Expr::value(role))),
        )
    }

    #[tokio::test]
    async fn test_put_and_remove() {
        let prp = PolicyRetrievalPoint::new(IndexType::Canonical);
        assert!(prp.is_empty());
        assert_eq!(prp.version(), 0);

        assert!(prp.put("admin", for_role("admin", "admin")).is_none());
        assert_eq!(prp.version(), 1);
        assert_eq!(prp.retrieve_policies(&ctx("admin")).await.names(), vec!["admin"]);

        let replaced = prp.put("admin", for_role("admin-2", "admin"));
        assert_eq!(replaced.map(|d| d.name().to_string()), Some("admin".to_string()));
        assert_eq!(prp.retrieve_policies(&ctx("admin")).await.names(), vec!["admin-2"]);

        assert!(prp.remove("admin").is_some());
        assert!(prp.remove("admin").is_none());
        assert_eq!(prp.version(), 3);
        assert!(prp.retrieve_policies(&ctx("admin")).await.is_empty());
    }

    #[tokio::test]
    async fn test_put_json() {
        let prp = PolicyRetrievalPoint::default();
        let json = r#"{"policy": {"name": "open", "entitlement": "permit"}}"#;
        assert!(prp.put_json("open", json).unwrap().is_none());

        let err = prp.put_json("broken", "{ not json");
        assert!(matches!(err, Err(Error::Serialization(_))));
        assert_eq!(prp.ids(), vec!["open".to_string()]);
        assert_eq!(prp.version(), 1);
        assert_eq!(prp.retrieve_policies(&ctx("any")).await.names(), vec!["open"]);
    }

    #[tokio::test]
    async fn test_from_store() {
        let store = InMemoryDocumentStore::new();
        store.add_document("b", for_role("b", "user")).unwrap();
        store.add_document("a", for_role("a", "user")).unwrap();

        let prp = PolicyRetrievalPoint::from_store(&store, IndexType::Naive).unwrap();
        assert_eq!(prp.index_type(), IndexType::Naive);
        assert_eq!(prp.len(), 2);
        assert_eq!(prp.version(), 1);
        assert_eq!(prp.retrieve_policies(&ctx("user")).await.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_changes_are_signalled() {
        let prp = PolicyRetrievalPoint::default();
        let mut changes = prp.changes();
        assert_eq!(*changes.borrow_and_update(), 0);

        prp.put("a", for_role("a", "user"));
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 1);

        // Removing an unknown id does not publish a new version.
        prp.remove("missing");
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_indexing_errors_are_reported() {
        let prp = PolicyRetrievalPoint::default();
        prp.put("bad", Document::from(Policy::permit("bad").with_target(Expr::value("x"))));
        prp.put("good", for_role("good", "user"));

        let errors = prp.indexing_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "bad");
        assert_eq!(prp.retrieve_policies(&ctx("user")).await.names(), vec!["good"]);
    }
}
