//! Literals: possibly negated predicates.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use vigil_core::{EvaluationContext, Val};

use super::predicate::Bool;

/// A predicate together with a negation flag.
#[derive(Clone)]
pub struct Literal {
    predicate: Arc<Bool>,
    negated: bool,
    hash: u64,
}

impl Literal {
    pub fn new(predicate: Arc<Bool>, negated: bool) -> Self {
        let mut hasher = DefaultHasher::new();
        predicate.hash(&mut hasher);
        negated.hash(&mut hasher);
        Self {
            predicate,
            negated,
            hash: hasher.finish(),
        }
    }

    pub fn positive(predicate: Arc<Bool>) -> Self {
        Self::new(predicate, false)
    }

    /// The same predicate with the opposite polarity.
    pub fn negate(&self) -> Self {
        Self::new(Arc::clone(&self.predicate), !self.negated)
    }

    pub fn predicate(&self) -> &Arc<Bool> {
        &self.predicate
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_immutable(&self) -> bool {
        self.predicate.is_immutable()
    }

    pub fn evaluate_constant(&self) -> Option<bool> {
        self.predicate.evaluate_constant().map(|b| b != self.negated)
    }

    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Val {
        let value = self.predicate.evaluate(ctx).await;
        match value.as_bool() {
            Some(b) => Val::boolean(b != self.negated),
            None => value,
        }
    }

    /// Ordering key used to keep clauses canonical.
    pub(crate) fn sort_key(&self) -> (&str, bool) {
        (self.predicate.key(), self.negated)
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.negated == other.negated && self.predicate == other.predicate
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.predicate)
        } else {
            write!(f, "{}", self.predicate)
        }
    }
}
