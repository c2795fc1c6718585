//! Document storage.
//!
//! This module provides the scan/update interface over stored policy
//! documents that the retrieval point loads from.

mod in_memory;

pub use in_memory::InMemoryDocumentStore;

use crate::model::Document;
use vigil_core::Result;

/// Trait for document storage.
///
/// A document store is responsible for storing and retrieving documents by
/// id.
pub trait DocumentStore: Send + Sync {
    /// Add a document to the store.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the document.
    /// * `document` - The document to add.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was successfully added.
    /// * `Err` - If a document with this id already exists.
    fn add_document(&self, id: &str, document: Document) -> Result<()>;

    /// Get a document from the store.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the document to get.
    ///
    /// # Returns
    ///
    /// * `Ok(Document)` - The document.
    /// * `Err` - If the document could not be found.
    fn get_document(&self, id: &str) -> Result<Document>;

    /// Replace a document, adding it if it does not exist yet.
    fn put_document(&self, id: &str, document: Document) -> Result<()>;

    /// Remove a document from the store.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the document to remove.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was successfully removed.
    /// * `Err` - If the document could not be found.
    fn remove_document(&self, id: &str) -> Result<()>;

    /// List all documents with their ids, ordered by id.
    fn list_documents(&self) -> Result<Vec<(String, Document)>>;

    /// Clear all documents from the store.
    fn clear_documents(&self) -> Result<()>;
}
