//! The formula index.
//!
//! Every indexed target is expanded into a reduced DNF formula. All clauses
//! of all formulas are flattened into one table, and every distinct
//! predicate records the clauses it falsifies for either truth value. A
//! retrieval then walks the predicates in score order, evaluates each at
//! most once for the request, and prunes clauses as values become known.
//!
//! The state of one retrieval is:
//!
//! - `remaining[c]`: literals of clause `c` not yet known to hold.
//! - `dead[c]`: clause `c` has a literal known to be false.
//! - `tainted[c]`: a predicate of clause `c` failed to evaluate.
//! - `satisfied[d]`: some clause of document `d` holds.
//!
//! A clause holds once `remaining` reaches zero without being tainted. A
//! document is a candidate iff one of its clauses holds. A document with no
//! holding clause but a live tainted one has an unknown target and is
//! reported through `errors_in_target`. This is the three-valued value of
//! the formula, so the outcome does not depend on the order predicates are
//! resolved in, and equals full evaluation of the target with
//! `vigil_policy::expression::evaluate_target`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, trace, warn};
use vigil_core::{EvaluationContext, IndexError};
use vigil_policy::{Document, PolicyRetrievalResult};

use crate::formula::{Bool, DisjunctiveFormula, DEFAULT_CLAUSE_LIMIT};
use crate::index::PolicyIndex;
use crate::scoring::{sort_by_score, PredicateInfo};

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: Document,
    formula: DisjunctiveFormula,
    clauses: Range<usize>,
}

#[derive(Debug, Clone, Copy)]
struct IndexedClause {
    document: usize,
    size: usize,
}

/// Predicate-sharing index over reduced target formulas.
#[derive(Debug, Clone, Default)]
pub struct CanonicalIndex {
    documents: Vec<IndexedDocument>,
    clauses: Vec<IndexedClause>,
    predicates: Vec<PredicateInfo>,
    errors: Vec<(String, IndexError)>,
}

impl CanonicalIndex {
    /// Build the index with the default clause limit.
    pub fn new(documents: &BTreeMap<String, Document>) -> Self {
        Self::with_clause_limit(documents, DEFAULT_CLAUSE_LIMIT)
    }

    /// Build the index, rejecting targets that expand to more than `limit`
    /// clauses.
    ///
    /// A document whose target cannot be indexed is left out and recorded
    /// in [`PolicyIndex::indexing_errors`]; the other documents are not
    /// affected.
    pub fn with_clause_limit(documents: &BTreeMap<String, Document>, limit: usize) -> Self {
        let mut index = Self::default();
        let mut positions: HashMap<Arc<Bool>, usize> = HashMap::new();

        for (id, document) in documents {
            let formula = match DisjunctiveFormula::from_target(document.name(), document.target(), limit)
            {
                Ok(formula) => formula.reduce(),
                Err(e) => {
                    warn!("failed to index document '{}': {}", id, e);
                    index.errors.push((id.clone(), e));
                    continue;
                }
            };

            let doc = index.documents.len();
            let start = index.clauses.len();
            let mut polarities: HashSet<(usize, bool)> = HashSet::new();

            for clause in formula.clauses() {
                let c = index.clauses.len();
                index.clauses.push(IndexedClause {
                    document: doc,
                    size: clause.size(),
                });
                for literal in clause.literals() {
                    let position = *positions
                        .entry(Arc::clone(literal.predicate()))
                        .or_insert_with(|| {
                            index
                                .predicates
                                .push(PredicateInfo::new(Arc::clone(literal.predicate())));
                            index.predicates.len() - 1
                        });
                    let info = &mut index.predicates[position];
                    info.add_occurrence(c, clause.size(), literal.is_negated());
                    if polarities.insert((position, literal.is_negated())) {
                        info.add_formula_occurrence(literal.is_negated());
                    }
                }
            }

            trace!("indexed '{}' as {}", id, formula);
            index.documents.push(IndexedDocument {
                document: document.clone(),
                formula,
                clauses: start..index.clauses.len(),
            });
        }

        for info in &mut index.predicates {
            info.compute_score();
        }
        sort_by_score(&mut index.predicates);

        debug!(
            "built index of {} documents, {} clauses, {} predicates",
            index.documents.len(),
            index.clauses.len(),
            index.predicates.len()
        );
        index
    }

    /// Predicates in the order retrieval resolves them.
    pub fn predicates(&self) -> &[PredicateInfo] {
        &self.predicates
    }

    /// The reduced formula of every indexed document, by document name.
    pub fn formulas(&self) -> impl Iterator<Item = (&str, &DisjunctiveFormula)> {
        self.documents
            .iter()
            .map(|d| (d.document.name(), &d.formula))
    }

    async fn find_matches(&self, ctx: &EvaluationContext) -> PolicyRetrievalResult {
        let mut remaining: Vec<usize> = self.clauses.iter().map(|c| c.size).collect();
        let mut dead = vec![false; self.clauses.len()];
        let mut tainted = vec![false; self.clauses.len()];
        let mut satisfied = vec![false; self.documents.len()];

        for clause in &self.clauses {
            if clause.size == 0 {
                satisfied[clause.document] = true;
            }
        }

        let mut evaluated = 0usize;
        for info in &self.predicates {
            let relevant = info
                .clauses()
                .any(|c| !dead[c] && !satisfied[self.clauses[c].document]);
            if !relevant {
                continue;
            }

            evaluated += 1;
            let value = info.predicate().evaluate(ctx).await;
            match value.as_bool() {
                Some(holds) => {
                    for &c in info.unsatisfiable_if(holds) {
                        dead[c] = true;
                    }
                    for &c in info.unsatisfiable_if(!holds) {
                        if dead[c] {
                            continue;
                        }
                        remaining[c] -= 1;
                        if remaining[c] == 0 && !tainted[c] {
                            satisfied[self.clauses[c].document] = true;
                        }
                    }
                }
                None => {
                    trace!("predicate {} is {}", info.predicate(), value);
                    for c in info.clauses() {
                        tainted[c] = true;
                    }
                }
            }
        }

        let mut result = PolicyRetrievalResult::new();
        for (d, indexed) in self.documents.iter().enumerate() {
            if satisfied[d] {
                result = result.with_match(indexed.document.clone());
            } else if indexed.clauses.clone().any(|c| tainted[c] && !dead[c]) {
                trace!("target of '{}' is unknown", indexed.document.name());
                result = result.with_error();
            }
        }

        debug!(
            "retrieved {} of {} documents after {} of {} predicates",
            result.matching.len(),
            self.documents.len(),
            evaluated,
            self.predicates.len()
        );
        result
    }
}

impl PolicyIndex for CanonicalIndex {
    fn retrieve<'a>(&'a self, ctx: &'a EvaluationContext) -> BoxFuture<'a, PolicyRetrievalResult> {
        Box::pin(self.find_matches(ctx))
    }

    fn indexing_errors(&self) -> &[(String, IndexError)] {
        &self.errors
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}
