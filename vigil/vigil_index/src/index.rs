//! Policy index abstraction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use vigil_core::{EvaluationContext, IndexError};
use vigil_policy::{Document, PolicyRetrievalResult};

use crate::canonical::CanonicalIndex;
use crate::naive::NaiveIndex;

/// Trait for policy indexes.
///
/// An index is built once for a fixed set of documents and is read-only
/// afterwards, so one instance can serve any number of concurrent
/// retrievals.
pub trait PolicyIndex: Send + Sync {
    /// Find the documents whose targets match the request in `ctx`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The evaluation context of the request.
    ///
    /// # Returns
    ///
    /// The matching documents ordered by document id, and whether any target
    /// could not be evaluated.
    fn retrieve<'a>(&'a self, ctx: &'a EvaluationContext) -> BoxFuture<'a, PolicyRetrievalResult>;

    /// Documents that could not be indexed, with the reason.
    fn indexing_errors(&self) -> &[(String, IndexError)] {
        &[]
    }

    /// Number of documents taking part in retrieval.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The available index strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Evaluate every target on every request.
    Naive,

    /// Resolve shared predicates once, in score order.
    #[default]
    Canonical,
}

impl IndexType {
    /// Build an index of this type over `documents`.
    pub fn build(&self, documents: &BTreeMap<String, Document>) -> Arc<dyn PolicyIndex> {
        match self {
            IndexType::Naive => Arc::new(NaiveIndex::new(documents)),
            IndexType::Canonical => Arc::new(CanonicalIndex::new(documents)),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Naive => write!(f, "naive"),
            IndexType::Canonical => write!(f, "canonical"),
        }
    }
}
