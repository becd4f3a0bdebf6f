//! Greedy K2 parent search over a fixed variable ordering.
//!
//! Each variable may only take parents from the variables before it in the
//! ordering, so the learned graph is acyclic by construction. For every
//! variable the learner starts from the empty parent set and repeatedly adds
//! the single candidate that maximizes the family's K2 log score, stopping
//! when no candidate strictly improves it.

use std::collections::HashSet;

use bn_common::{Error, Result};
use bn_math::{log_k2_score, relative_weight};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{Condition, FrequencyStore};
use crate::logging::targets;
use crate::structure::AdjacencyTable;

/// Search limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K2Config {
    /// Upper bound on parents per variable; unbounded when `None`.
    pub max_parents: Option<usize>,
}

/// One accepted greedy step.
#[derive(Debug, Clone, Serialize)]
pub struct K2Step {
    pub parent: String,
    /// Family log score after adding `parent`.
    pub log_score: f64,
    /// Improvement over the previous parent set.
    pub gain: f64,
    /// Share of the step's alternatives (including "stop here") held by
    /// the accepted family, normalized in log space.
    pub weight: f64,
}

/// Search outcome for one variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariableReport {
    pub variable: String,
    pub states: usize,
    /// Log score with no parents.
    pub base_log_score: f64,
    /// Log score of the committed parent set.
    pub log_score: f64,
    pub parents: Vec<String>,
    pub steps: Vec<K2Step>,
}

/// Learned adjacency table plus the per-variable report.
#[derive(Debug, Clone, Serialize)]
pub struct LearnedStructure {
    pub adjacency: AdjacencyTable,
    pub ordering: Vec<String>,
    pub report: Vec<VariableReport>,
}

impl LearnedStructure {
    /// Log score of the whole structure (families are independent).
    pub fn total_log_score(&self) -> f64 {
        self.report.iter().map(|r| r.log_score).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.report.iter().map(|r| r.parents.len()).sum()
    }
}

/// K2 structure learner.
#[derive(Debug, Clone, Default)]
pub struct StructureLearner {
    config: K2Config,
}

impl StructureLearner {
    pub fn new(config: K2Config) -> Self {
        StructureLearner { config }
    }

    pub fn config(&self) -> &K2Config {
        &self.config
    }

    /// Learn parent sets for every variable of `ordering`.
    ///
    /// `None` uses the store's header order. The returned adjacency table is
    /// labelled with the ordering in both dimensions.
    pub fn learn(
        &self,
        store: &FrequencyStore,
        ordering: Option<&[String]>,
    ) -> Result<LearnedStructure> {
        if store.row_count() == 0 {
            return Err(Error::EmptySource);
        }
        let ordering: Vec<String> = match ordering {
            Some(order) => order.to_vec(),
            None => store.variables().to_vec(),
        };
        let mut seen = HashSet::new();
        for variable in &ordering {
            if !store.has_variable(variable) {
                return Err(Error::unknown_variable(variable.clone()));
            }
            if !seen.insert(variable.as_str()) {
                return Err(Error::MalformedStructure(format!(
                    "'{}' appears twice in the ordering",
                    variable
                )));
            }
        }

        info!(
            target: targets::LEARN,
            variables = ordering.len(),
            rows = store.row_count(),
            max_parents = ?self.config.max_parents,
            "K2 search started"
        );

        let mut adjacency = AdjacencyTable::empty(ordering.clone());
        let mut report = Vec::with_capacity(ordering.len());
        for (position, variable) in ordering.iter().enumerate() {
            let family = self.search_parents(store, variable, &ordering[..position])?;
            for parent in &family.parents {
                adjacency.add_edge(parent, variable)?;
            }
            report.push(family);
        }

        let learned = LearnedStructure {
            adjacency,
            ordering,
            report,
        };
        info!(
            target: targets::LEARN,
            edges = learned.edge_count(),
            log_score = learned.total_log_score(),
            "K2 search complete"
        );
        Ok(learned)
    }

    /// K2 log score of `variable` with the given parent set.
    pub fn family_log_score(
        &self,
        store: &FrequencyStore,
        variable: &str,
        parents: &[String],
    ) -> Result<f64> {
        let r = store.unique_states(variable)?.len();
        let mut parent_states = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_states.push((parent.clone(), store.unique_states(parent)?));
        }

        let mut counts = Vec::new();
        for cond in Condition::cartesian(&parent_states) {
            counts.push(store.frequency(variable, &cond, false)?.count_vector());
        }
        Ok(log_k2_score(r, &counts))
    }

    fn search_parents(
        &self,
        store: &FrequencyStore,
        variable: &str,
        predecessors: &[String],
    ) -> Result<VariableReport> {
        let base = self.family_log_score(store, variable, &[])?;
        let mut best = base;
        let mut parents: Vec<String> = Vec::new();
        let mut candidates: Vec<String> = predecessors.to_vec();
        let mut steps = Vec::new();

        loop {
            if candidates.is_empty() {
                break;
            }
            if let Some(limit) = self.config.max_parents {
                if parents.len() >= limit {
                    debug!(target: targets::LEARN, variable, limit, "parent limit reached");
                    break;
                }
            }

            let mut scores = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                let mut trial = parents.clone();
                trial.push(candidate.clone());
                let score = self.family_log_score(store, variable, &trial)?;
                debug!(target: targets::LEARN, variable, candidate = %candidate, log_score = score, "candidate scored");
                scores.push(score);
            }

            // strict comparison keeps the earliest of tied candidates
            let mut top = 0;
            for (idx, &score) in scores.iter().enumerate().skip(1) {
                if score > scores[top] {
                    top = idx;
                }
            }

            if scores[top] > best {
                let mut alternatives = Vec::with_capacity(scores.len() + 1);
                alternatives.push(best);
                alternatives.extend_from_slice(&scores);
                let weight = relative_weight(&alternatives, top + 1);

                let parent = candidates.remove(top);
                info!(
                    target: targets::LEARN,
                    variable,
                    parent = %parent,
                    log_score = scores[top],
                    gain = scores[top] - best,
                    "parent committed"
                );
                steps.push(K2Step {
                    parent: parent.clone(),
                    log_score: scores[top],
                    gain: scores[top] - best,
                    weight,
                });
                best = scores[top];
                parents.push(parent);
            } else {
                debug!(target: targets::LEARN, variable, log_score = best, "no improving candidate");
                break;
            }
        }

        Ok(VariableReport {
            variable: variable.to_string(),
            states: store.unique_states(variable)?.len(),
            base_log_score: base,
            log_score: best,
            parents,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(text: &str) -> FrequencyStore {
        FrequencyStore::from_text(text).unwrap()
    }

    /// B copies A exactly; C is independent noise.
    fn copied_column() -> FrequencyStore {
        let mut text = String::from("A,B,C\n");
        for (i, a) in ["0", "1", "0", "1", "0", "1", "0", "1"].iter().enumerate() {
            let c = if i < 4 { "0" } else { "1" };
            text.push_str(&format!("{},{},{}\n", a, a, c));
        }
        store(&text)
    }

    #[test]
    fn empty_parent_score_matches_closed_form() {
        let s = store("A\n0\n0\n1\n");
        let learner = StructureLearner::default();
        // (r-1)!/(N+r-1)! * 2! * 1! = 1/24 * 2
        let expected = (2.0f64 / 24.0).ln();
        let got = learner.family_log_score(&s, "A", &[]).unwrap();
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn learns_dependency_of_copied_column() {
        let learned = StructureLearner::default()
            .learn(&copied_column(), None)
            .unwrap();
        assert_eq!(learned.adjacency.edges(), vec![("A", "B")]);
        assert_eq!(learned.report[1].parents, vec!["A".to_string()]);
        assert!(learned.report[2].parents.is_empty());
    }

    #[test]
    fn committed_scores_never_decrease() {
        let learned = StructureLearner::default()
            .learn(&copied_column(), None)
            .unwrap();
        for family in &learned.report {
            let mut previous = family.base_log_score;
            for step in &family.steps {
                assert!(step.log_score > previous);
                assert!(step.gain > 0.0);
                assert!(step.weight > 0.0 && step.weight <= 1.0);
                previous = step.log_score;
            }
            assert_eq!(family.log_score, previous);
        }
    }

    #[test]
    fn ties_keep_the_earliest_candidate() {
        // A and B are identical, so C scores the same with either parent
        let mut text = String::from("A,B,C\n");
        for v in ["0", "1", "0", "1", "0", "1"] {
            text.push_str(&format!("{},{},{}\n", v, v, v));
        }
        let order: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let learned = StructureLearner::default()
            .learn(&store(&text), Some(&order))
            .unwrap();
        assert_eq!(learned.report[2].parents, vec!["A".to_string()]);

        let swapped: Vec<String> = ["B", "A", "C"].iter().map(|s| s.to_string()).collect();
        let learned = StructureLearner::default()
            .learn(&store(&text), Some(&swapped))
            .unwrap();
        assert_eq!(learned.report[2].parents, vec!["B".to_string()]);
    }

    #[test]
    fn max_parents_bounds_each_family() {
        let mut text = String::from("A,B,C\n");
        for (a, b) in [("0", "0"), ("0", "1"), ("1", "0"), ("1", "1")] {
            for _ in 0..5 {
                let c = if a == "1" && b == "1" { "1" } else { "0" };
                text.push_str(&format!("{},{},{}\n", a, b, c));
            }
        }
        let unbounded = StructureLearner::default().learn(&store(&text), None).unwrap();
        assert_eq!(unbounded.report[2].parents.len(), 2);

        let bounded = StructureLearner::new(K2Config {
            max_parents: Some(1),
        })
        .learn(&store(&text), None)
        .unwrap();
        assert_eq!(bounded.report[2].parents.len(), 1);
    }

    #[test]
    fn first_variable_has_no_candidates() {
        let learned = StructureLearner::default()
            .learn(&copied_column(), None)
            .unwrap();
        assert!(learned.report[0].parents.is_empty());
        assert!(learned.report[0].steps.is_empty());
        assert_eq!(learned.report[0].log_score, learned.report[0].base_log_score);
    }

    #[test]
    fn rejects_empty_and_bad_orderings() {
        let empty = store("A,B\n");
        assert!(matches!(
            StructureLearner::default().learn(&empty, None),
            Err(Error::EmptySource)
        ));

        let s = copied_column();
        let unknown = vec!["A".to_string(), "Z".to_string()];
        assert!(matches!(
            StructureLearner::default().learn(&s, Some(&unknown)),
            Err(Error::UnknownVariable { .. })
        ));
        let twice = vec!["A".to_string(), "A".to_string()];
        assert!(matches!(
            StructureLearner::default().learn(&s, Some(&twice)),
            Err(Error::MalformedStructure(_))
        ));
    }

    #[test]
    fn partial_ordering_labels_only_listed_variables() {
        let order = vec!["B".to_string(), "A".to_string()];
        let learned = StructureLearner::default()
            .learn(&copied_column(), Some(&order))
            .unwrap();
        assert_eq!(learned.adjacency.labels(), &order[..]);
        assert_eq!(learned.adjacency.edges(), vec![("B", "A")]);
    }
}
