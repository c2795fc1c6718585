//! Predicate statistics and scoring.
//!
//! Every distinct predicate of the indexed formulas gets a [`PredicateInfo`]
//! recording which clauses it can falsify and how often it occurs. The
//! derived score orders predicates so the retrieval point evaluates the
//! ones that eliminate the most clauses first.

use std::cmp::{Ordering, Reverse};
use std::sync::Arc;

use crate::formula::Bool;

/// Scores closer than this are considered equal.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Occurrence statistics of one predicate.
#[derive(Debug, Clone)]
pub struct PredicateInfo {
    predicate: Arc<Bool>,
    unsatisfiable_if_true: Vec<usize>,
    unsatisfiable_if_false: Vec<usize>,
    number_of_positives: usize,
    number_of_negatives: usize,
    grouped_number_of_positives: usize,
    grouped_number_of_negatives: usize,
    clause_relevance: Vec<f64>,
    relevance: f64,
    score: f64,
}

impl PredicateInfo {
    pub fn new(predicate: Arc<Bool>) -> Self {
        Self {
            predicate,
            unsatisfiable_if_true: Vec::new(),
            unsatisfiable_if_false: Vec::new(),
            number_of_positives: 0,
            number_of_negatives: 0,
            grouped_number_of_positives: 0,
            grouped_number_of_negatives: 0,
            clause_relevance: Vec::new(),
            relevance: 0.0,
            score: 0.0,
        }
    }

    /// Record one occurrence of the predicate in clause `clause` of
    /// `clause_size` literals.
    pub fn add_occurrence(&mut self, clause: usize, clause_size: usize, negated: bool) {
        if negated {
            self.number_of_negatives += 1;
            self.unsatisfiable_if_true.push(clause);
        } else {
            self.number_of_positives += 1;
            self.unsatisfiable_if_false.push(clause);
        }
        self.clause_relevance.push(1.0 / clause_size.max(1) as f64);
    }

    /// Record that some formula uses the predicate with the given polarity.
    /// Called once per formula and polarity.
    pub fn add_formula_occurrence(&mut self, negated: bool) {
        if negated {
            self.grouped_number_of_negatives += 1;
        } else {
            self.grouped_number_of_positives += 1;
        }
    }

    /// Derive relevance and score from the recorded occurrences.
    ///
    /// Relevance is the mean of `1 / |clause|` over all occurrences, so
    /// predicates in short clauses weigh more. The score grows with the
    /// number of formulas using the predicate. Its `2 - balance²` factor is
    /// highest when the predicate appears equally often with either
    /// polarity and lowest when it appears with one polarity only.
    pub fn compute_score(&mut self) {
        if self.clause_relevance.is_empty() {
            self.relevance = 0.0;
            self.score = 0.0;
            return;
        }
        self.relevance =
            self.clause_relevance.iter().sum::<f64>() / self.clause_relevance.len() as f64;

        let positives = self.grouped_number_of_positives as f64;
        let negatives = self.grouped_number_of_negatives as f64;
        let total = positives + negatives;
        let balance = (positives - negatives) / total;

        self.score = self.relevance.powf(2.0 - self.relevance) * total * (2.0 - balance * balance);
    }

    pub fn predicate(&self) -> &Arc<Bool> {
        &self.predicate
    }

    /// Clauses falsified once the predicate is known to be `value`.
    pub fn unsatisfiable_if(&self, value: bool) -> &[usize] {
        if value {
            &self.unsatisfiable_if_true
        } else {
            &self.unsatisfiable_if_false
        }
    }

    /// Clauses containing the predicate with either polarity.
    pub fn clauses(&self) -> impl Iterator<Item = usize> + '_ {
        self.unsatisfiable_if_true
            .iter()
            .chain(self.unsatisfiable_if_false.iter())
            .copied()
    }

    pub fn number_of_positives(&self) -> usize {
        self.number_of_positives
    }

    pub fn number_of_negatives(&self) -> usize {
        self.number_of_negatives
    }

    pub fn grouped_number_of_positives(&self) -> usize {
        self.grouped_number_of_positives
    }

    pub fn grouped_number_of_negatives(&self) -> usize {
        self.grouped_number_of_negatives
    }

    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Compare two scores, treating values within [`SCORE_EPSILON`] as equal.
pub fn fuzzy_cmp(lhs: f64, rhs: f64) -> Ordering {
    if (lhs - rhs).abs() <= SCORE_EPSILON {
        Ordering::Equal
    } else if lhs < rhs {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl PartialEq for PredicateInfo {
    fn eq(&self, other: &Self) -> bool {
        fuzzy_cmp(self.score, other.score) == Ordering::Equal
    }
}

impl PartialOrd for PredicateInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(fuzzy_cmp(self.score, other.score))
    }
}

/// Sort by descending score.
///
/// Fuzzy equality is not transitive, so the sort key is the score snapped
/// to the epsilon grid. Ties keep their input order.
pub fn sort_by_score(infos: &mut [PredicateInfo]) {
    infos.sort_by_key(|info| Reverse((info.score / SCORE_EPSILON).round() as i64));
}
