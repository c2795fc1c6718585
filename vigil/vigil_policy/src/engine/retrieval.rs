//! Policy retrieval results.

use crate::model::Document;

/// The documents whose targets matched a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRetrievalResult {
    /// Matching documents, in a stable order.
    pub matching: Vec<Document>,

    /// Whether evaluating any target failed.
    pub errors_in_target: bool,
}

impl PolicyRetrievalResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match(mut self, document: Document) -> Self {
        self.matching.push(document);
        self
    }

    pub fn with_error(mut self) -> Self {
        self.errors_in_target = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.matching.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.matching.iter().map(Document::name).collect()
    }
}
