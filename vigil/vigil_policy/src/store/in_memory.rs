//! In-memory document store.

use dashmap::DashMap;
use std::sync::Arc;
use vigil_core::error::{Result, StoreError};

use super::DocumentStore;
use crate::model::Document;

/// An in-memory document store.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    /// The documents, indexed by id.
    documents: Arc<DashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    /// Create a new in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn add_document(&self, id: &str, document: Document) -> Result<()> {
        if self.documents.contains_key(id) {
            return Err(StoreError::Conflict(format!("Document {} already exists", id)).into());
        }

        self.documents.insert(id.to_string(), document);

        Ok(())
    }

    fn get_document(&self, id: &str) -> Result<Document> {
        let document = self
            .documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .clone();

        Ok(document)
    }

    fn put_document(&self, id: &str, document: Document) -> Result<()> {
        self.documents.insert(id.to_string(), document);

        Ok(())
    }

    fn remove_document(&self, id: &str) -> Result<()> {
        if self.documents.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()).into());
        }

        Ok(())
    }

    fn list_documents(&self) -> Result<Vec<(String, Document)>> {
        let mut documents: Vec<_> = self
            .documents
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        documents.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(documents)
    }

    fn clear_documents(&self) -> Result<()> {
        self.documents.clear();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Policy;
    use vigil_core::Error;

    #[test]
    fn test_add_and_get_document() {
        let store = InMemoryDocumentStore::new();
        store.add_document("p1", Policy::permit("read").into()).unwrap();

        let retrieved = store.get_document("p1").unwrap();
        assert_eq!(retrieved.name(), "read");
    }

    #[test]
    fn test_add_conflict() {
        let store = InMemoryDocumentStore::new();
        store.add_document("p1", Policy::permit("a").into()).unwrap();

        let result = store.add_document("p1", Policy::deny("b").into());
        assert!(matches!(result, Err(Error::Store(StoreError::Conflict(_)))));

        store.put_document("p1", Policy::deny("b").into()).unwrap();
        assert_eq!(store.get_document("p1").unwrap().name(), "b");
    }

    #[test]
    fn test_remove_document() {
        let store = InMemoryDocumentStore::new();
        store.add_document("p1", Policy::permit("a").into()).unwrap();
        store.remove_document("p1").unwrap();

        assert!(store.get_document("p1").is_err());
        assert!(matches!(
            store.remove_document("p1"),
            Err(Error::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let store = InMemoryDocumentStore::new();
        store.add_document("b", Policy::permit("b").into()).unwrap();
        store.add_document("a", Policy::permit("a").into()).unwrap();
        store.add_document("c", Policy::permit("c").into()).unwrap();

        let ids: Vec<_> = store
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        store.clear_documents().unwrap();
        assert!(store.list_documents().unwrap().is_empty());
    }
}
