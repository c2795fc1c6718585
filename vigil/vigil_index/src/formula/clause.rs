//! Conjunctive clauses.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::literal::Literal;

/// A conjunction of literals, kept as a duplicate-free set in canonical
/// order.
#[derive(Clone)]
pub struct ConjunctiveClause {
    literals: Vec<Literal>,
    hash: u64,
}

impl ConjunctiveClause {
    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Self {
        let mut literals: Vec<Literal> = literals.into_iter().collect();
        literals.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        literals.dedup();

        let mut hasher = DefaultHasher::new();
        for literal in &literals {
            literal.hash(&mut hasher);
        }
        Self {
            literals,
            hash: hasher.finish(),
        }
    }

    /// The empty conjunction, which is always true.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn size(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn is_immutable(&self) -> bool {
        self.literals.iter().all(Literal::is_immutable)
    }

    /// Value of an immutable clause; `None` while any literal needs a
    /// context.
    pub fn evaluate(&self) -> Option<bool> {
        let mut result = true;
        for literal in &self.literals {
            result &= literal.evaluate_constant()?;
        }
        Some(result)
    }

    /// Whether every literal of this clause also appears in `other`.
    pub fn is_subset_of(&self, other: &ConjunctiveClause) -> bool {
        self.size() <= other.size() && self.literals.iter().all(|l| other.literals.contains(l))
    }

    /// Conjunction of two clauses.
    pub fn and(&self, other: &ConjunctiveClause) -> Self {
        Self::new(self.literals.iter().chain(other.literals.iter()).cloned())
    }
}

impl PartialEq for ConjunctiveClause {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.literals == other.literals
    }
}

impl Eq for ConjunctiveClause {}

impl Hash for ConjunctiveClause {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for ConjunctiveClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ConjunctiveClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.literals.is_empty() {
            return write!(f, "true");
        }
        for (i, literal) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            write!(f, "{}", literal)?;
        }
        Ok(())
    }
}
