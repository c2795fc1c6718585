//! Disjunctive normal form of targets.
//!
//! A target expression is expanded along `&&`, `||` and `!` into an OR of
//! AND-clauses over literals. Negations are pushed to the leaves with De
//! Morgan's laws; every non-connective node becomes a predicate.

use std::fmt;
use std::sync::Arc;

use vigil_core::IndexError;
use vigil_policy::Expr;

use super::clause::ConjunctiveClause;
use super::literal::Literal;
use super::predicate::Bool;
use super::reduction::{reduce_constants, reduce_formula};

/// Upper bound on the clauses one target may expand to.
pub const DEFAULT_CLAUSE_LIMIT: usize = 256;

/// A target as an ordered disjunction of conjunctive clauses.
#[derive(Clone, PartialEq, Eq)]
pub struct DisjunctiveFormula {
    clauses: Vec<ConjunctiveClause>,
}

impl DisjunctiveFormula {
    pub fn new(clauses: Vec<ConjunctiveClause>) -> Self {
        Self { clauses }
    }

    /// The formula of a document without a target, which always holds.
    pub fn always() -> Self {
        Self::new(vec![ConjunctiveClause::empty()])
    }

    /// Expand a target into DNF.
    ///
    /// # Arguments
    ///
    /// * `name` - The document name, for error reporting.
    /// * `target` - The target expression, `None` for documents without one.
    /// * `limit` - The maximum number of clauses the expansion may produce.
    ///
    /// # Returns
    ///
    /// * `Ok(DisjunctiveFormula)` - The unreduced formula.
    /// * `Err` - If the expansion exceeds `limit` or a leaf is a constant
    ///   that is not a boolean.
    pub fn from_target(
        name: &str,
        target: Option<&Expr>,
        limit: usize,
    ) -> Result<Self, IndexError> {
        match target {
            None => Ok(Self::always()),
            Some(expr) => {
                let clauses = expand(name, expr, false, limit)?;
                Ok(Self::new(clauses))
            }
        }
    }

    /// Apply constant folding, then subsumption elimination.
    pub fn reduce(self) -> Self {
        let clauses = reduce_formula(reduce_constants(self.clauses));
        Self::new(clauses)
    }

    pub fn clauses(&self) -> &[ConjunctiveClause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the formula under an assignment of its predicates.
    pub fn evaluate_with<F>(&self, mut assignment: F) -> bool
    where
        F: FnMut(&Bool) -> bool,
    {
        self.clauses.iter().any(|clause| {
            clause
                .literals()
                .iter()
                .all(|l| assignment(l.predicate()) != l.is_negated())
        })
    }
}

fn expand(
    name: &str,
    expr: &Expr,
    negated: bool,
    limit: usize,
) -> Result<Vec<ConjunctiveClause>, IndexError> {
    match (expr, negated) {
        (Expr::Not(inner), _) => expand(name, inner, !negated, limit),
        (Expr::Or(l, r), false) | (Expr::And(l, r), true) => {
            let mut clauses = expand(name, l, negated, limit)?;
            clauses.extend(expand(name, r, negated, limit)?);
            check_limit(clauses.len(), limit)?;
            Ok(clauses)
        }
        (Expr::And(l, r), false) | (Expr::Or(l, r), true) => {
            let left = expand(name, l, negated, limit)?;
            let right = expand(name, r, negated, limit)?;
            check_limit(left.len().saturating_mul(right.len()), limit)?;
            let mut clauses = Vec::with_capacity(left.len() * right.len());
            for a in &left {
                for b in &right {
                    clauses.push(a.and(b));
                }
            }
            Ok(clauses)
        }
        (leaf, _) => {
            if let Some(value) = leaf.evaluate_constant() {
                if value.as_bool().is_none() {
                    return Err(IndexError::NonBooleanConstant(name.to_string()));
                }
            }
            let literal = Literal::new(Arc::new(Bool::new(leaf.clone())), negated);
            Ok(vec![ConjunctiveClause::new(vec![literal])])
        }
    }
}

fn check_limit(clauses: usize, limit: usize) -> Result<(), IndexError> {
    if clauses > limit {
        return Err(IndexError::FormulaTooLarge { clauses, limit });
    }
    Ok(())
}

impl fmt::Debug for DisjunctiveFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for DisjunctiveFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "false");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "({})", clause)?;
        }
        Ok(())
    }
}
