//! Formula reduction.
//!
//! Two passes shrink a formula before it is indexed: constant folding of
//! clauses that need no context, and pairwise subsumption elimination.
//! Neither pass merges complementary literals, so the result is smaller but
//! not necessarily minimal.

use super::clause::ConjunctiveClause;

/// Fold clauses made only of constant literals.
///
/// A constant-true clause makes the whole formula true and replaces it; a
/// constant-false clause is dropped. Scanning stops once a single clause is
/// left, so a formula never reduces to nothing.
pub fn reduce_constants(mut clauses: Vec<ConjunctiveClause>) -> Vec<ConjunctiveClause> {
    let mut i = 0;
    while i < clauses.len() && clauses.len() > 1 {
        if clauses[i].is_immutable() {
            if clauses[i].evaluate() == Some(true) {
                return vec![clauses.swap_remove(i)];
            }
            clauses.remove(i);
        } else {
            i += 1;
        }
    }
    clauses
}

/// Remove every clause that is a superset of another clause.
///
/// For `i < j`, if clause `i` is a subset of clause `j`, clause `j` is
/// implied and dropped; if `j` is a subset of `i`, clause `i` is dropped and
/// the scan moves on to the next `i`.
pub fn reduce_formula(clauses: Vec<ConjunctiveClause>) -> Vec<ConjunctiveClause> {
    let mut slots: Vec<Option<ConjunctiveClause>> = clauses.into_iter().map(Some).collect();

    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            let (lhs_in_rhs, rhs_in_lhs) = match (&slots[i], &slots[j]) {
                (Some(lhs), Some(rhs)) => (lhs.is_subset_of(rhs), rhs.is_subset_of(lhs)),
                (None, _) => break,
                (_, None) => continue,
            };
            if lhs_in_rhs {
                slots[j] = None;
            } else if rhs_in_lhs {
                slots[i] = None;
                break;
            }
        }
    }

    slots.into_iter().flatten().collect()
}
