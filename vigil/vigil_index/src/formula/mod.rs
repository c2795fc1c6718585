//! Boolean formulas over target predicates.

mod clause;
mod disjunctive;
mod literal;
mod predicate;
mod reduction;

pub use clause::ConjunctiveClause;
pub use disjunctive::{DisjunctiveFormula, DEFAULT_CLAUSE_LIMIT};
pub use literal::Literal;
pub use predicate::Bool;
pub use reduction::{reduce_constants, reduce_formula};
