//! No-mock propagation tests.
//!
//! Every posterior produced by message passing is compared against brute-force
//! enumeration of the joint distribution factorized with the same conditional
//! tables the store hands to the network.

use std::collections::BTreeMap;

use bn_common::Error;
use bn_core::data::{Condition, FrequencyStore};
use bn_core::inference::{BeliefNetwork, StateMap};
use bn_core::structure::AdjacencyTable;

const TOL: f64 = 1e-9;

/// Deterministic uniform draws in [0, 1).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn bit(&mut self, p_one: f64) -> u8 {
        u8::from(self.next() < p_one)
    }
}

/// A → B → C
fn chain_store(rows: usize) -> FrequencyStore {
    let mut rng = Lcg(7);
    let mut text = String::from("A,B,C\n");
    for _ in 0..rows {
        let a = rng.bit(0.4);
        let b = rng.bit(if a == 1 { 0.8 } else { 0.3 });
        let c = rng.bit(if b == 1 { 0.7 } else { 0.1 });
        text.push_str(&format!("{},{},{}\n", a, b, c));
    }
    FrequencyStore::from_text(&text).unwrap()
}

/// A → C ← B, C → D
fn collider_store(rows: usize) -> FrequencyStore {
    let mut rng = Lcg(11);
    let mut text = String::from("A,B,C,D\n");
    for _ in 0..rows {
        let a = rng.bit(0.5);
        let b = rng.bit(0.3);
        let c = rng.bit(match (a, b) {
            (1, 1) => 0.9,
            (1, 0) => 0.6,
            (0, 1) => 0.4,
            _ => 0.05,
        });
        let d = rng.bit(if c == 1 { 0.75 } else { 0.2 });
        text.push_str(&format!("{},{},{},{}\n", a, b, c, d));
    }
    FrequencyStore::from_text(&text).unwrap()
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn chain_table() -> AdjacencyTable {
    AdjacencyTable::from_edges(labels(&["A", "B", "C"]), [("A", "B"), ("B", "C")]).unwrap()
}

fn collider_table() -> AdjacencyTable {
    AdjacencyTable::from_edges(
        labels(&["A", "B", "C", "D"]),
        [("A", "C"), ("B", "C"), ("C", "D")],
    )
    .unwrap()
}

/// Posterior of every variable by summing the factorized joint.
fn enumerate(
    store: &FrequencyStore,
    table: &AdjacencyTable,
    evidence: &[(&str, &str)],
) -> BTreeMap<String, StateMap> {
    let mut domains = Vec::new();
    for variable in store.variables() {
        let mut states = store.unique_states(variable).unwrap();
        states.sort();
        domains.push((variable.clone(), states));
    }

    let mut acc: BTreeMap<String, StateMap> = BTreeMap::new();
    for assignment in Condition::cartesian(&domains) {
        if evidence
            .iter()
            .any(|(v, s)| assignment.get(v) != Some(*s))
        {
            continue;
        }
        let mut p = 1.0;
        for variable in store.variables() {
            let parents = table.parents_of(variable).unwrap_or_default();
            let cond: Condition = parents
                .iter()
                .map(|parent| (*parent, assignment.get(parent).unwrap()))
                .collect();
            let dist = store.frequency(variable, &cond, true).unwrap().distribution();
            p *= dist[assignment.get(variable).unwrap()];
        }
        for (variable, state) in assignment.iter() {
            *acc.entry(variable.to_string())
                .or_default()
                .entry(state.to_string())
                .or_insert(0.0) += p;
        }
    }

    for belief in acc.values_mut() {
        let total: f64 = belief.values().sum();
        for value in belief.values_mut() {
            *value /= total;
        }
    }
    acc
}

fn assert_matches_enumeration(network: &BeliefNetwork, expected: &BTreeMap<String, StateMap>) {
    for (variable, exact) in expected {
        let belief = network.get_belief(variable).unwrap();
        for (state, p) in exact {
            let got = belief[state];
            assert!(
                (got - p).abs() < TOL,
                "P({}={}) = {} but enumeration gives {}",
                variable,
                state,
                got,
                p
            );
        }
    }
}

fn assert_normalized(network: &BeliefNetwork) {
    for (variable, belief) in network.beliefs() {
        let total: f64 = belief.values().sum();
        assert!((total - 1.0).abs() < TOL, "{} sums to {}", variable, total);
    }
}

#[test]
fn baseline_equals_marginals() {
    let store = chain_store(400);
    let table = chain_table();
    let expected = enumerate(&store, &table, &[]);
    let network = BeliefNetwork::new(store, &table, true).unwrap();

    assert_normalized(&network);
    assert_matches_enumeration(&network, &expected);
}

#[test]
fn priors_are_normalized() {
    let network = BeliefNetwork::new(collider_store(300), &collider_table(), true).unwrap();
    for node in network.nodes() {
        let total: f64 = node.prior().values().sum();
        assert!((total - 1.0).abs() < TOL);
    }
}

#[test]
fn chain_evidence_at_leaf_from_either_end() {
    let store = chain_store(400);
    let table = chain_table();
    let expected = enumerate(&store, &table, &[("C", "1")]);

    for root in ["C", "A", "B"] {
        let mut network = BeliefNetwork::new(chain_store(400), &table, true).unwrap();
        network.set_evidence("C", "1").unwrap();
        network.calc_probs(root).unwrap();
        assert_normalized(&network);
        assert_matches_enumeration(&network, &expected);
    }
}

/// P(A=1)=0.5, P(B=1|A=1)=0.8, P(B=1|A=0)=0.2, P(C=1|B=1)=0.9, P(C=1|B=0)=0.1
fn textbook_chain() -> FrequencyStore {
    let mut text = String::from("A,B,C\n");
    for (row, n) in [
        ("1,1,1", 8),
        ("0,1,1", 1),
        ("0,1,0", 1),
        ("1,0,0", 2),
        ("0,0,0", 7),
        ("0,0,1", 1),
    ] {
        for _ in 0..n {
            text.push_str(row);
            text.push('\n');
        }
    }
    FrequencyStore::from_text(&text).unwrap()
}

#[test]
fn textbook_chain_gives_point_seven_four() {
    for root in ["C", "A"] {
        let mut network = BeliefNetwork::new(textbook_chain(), &chain_table(), true).unwrap();
        network.set_evidence("A", "1").unwrap();
        network.calc_probs(root).unwrap();
        let belief = network.get_belief("C").unwrap();
        assert!((belief["1"] - 0.74).abs() < TOL, "from {}: {}", root, belief["1"]);
        assert!((belief["0"] - 0.26).abs() < TOL);
    }
}

#[test]
fn chain_evidence_at_root_reaches_leaf() {
    let store = chain_store(400);
    let table = chain_table();
    let expected = enumerate(&store, &table, &[("A", "0")]);

    let mut network = BeliefNetwork::new(store, &table, true).unwrap();
    network.set_evidence("A", "0").unwrap();
    network.calc_probs("C").unwrap();
    assert_matches_enumeration(&network, &expected);
}

#[test]
fn collider_explains_away() {
    let store = collider_store(600);
    let table = collider_table();
    let evidence = [("D", "1"), ("A", "0")];
    let expected = enumerate(&store, &table, &evidence);

    for root in ["A", "B", "C", "D"] {
        let mut network = BeliefNetwork::new(collider_store(600), &table, true).unwrap();
        for (variable, state) in evidence {
            network.set_evidence(variable, state).unwrap();
        }
        network.calc_probs(root).unwrap();
        assert_matches_enumeration(&network, &expected);
    }
}

#[test]
fn collider_parents_stay_independent_without_evidence_below() {
    let store = collider_store(600);
    let table = collider_table();
    let mut network = BeliefNetwork::new(store, &table, true).unwrap();
    let before = network.get_belief("B").unwrap();

    network.set_evidence("A", "1").unwrap();
    network.calc_probs("A").unwrap();
    let after = network.get_belief("B").unwrap();
    for (state, p) in &before {
        assert!((after[state] - p).abs() < TOL);
    }
}

#[test]
fn hard_evidence_is_idempotent() {
    let mut network = BeliefNetwork::new(chain_store(200), &chain_table(), true).unwrap();
    for _ in 0..2 {
        network.set_evidence("B", "1").unwrap();
        network.calc_probs("B").unwrap();
        let belief = network.get_belief("B").unwrap();
        assert!((belief["1"] - 1.0).abs() < TOL);
        assert!(belief["0"].abs() < TOL);
    }
    assert_eq!(
        network.evidence(),
        BTreeMap::from([("B".to_string(), "1".to_string())])
    );
}

#[test]
fn every_node_is_visited_once_from_any_root() {
    let table = collider_table();
    let mut network = BeliefNetwork::new(collider_store(100), &table, true).unwrap();
    network.set_evidence("D", "0").unwrap();

    for root in ["A", "B", "C", "D"] {
        let trace = network.calc_probs(root).unwrap();
        assert_eq!(trace.query, root);
        assert_eq!(trace.visited.first().map(String::as_str), Some(root));
        let mut visited = trace.visited.clone();
        visited.sort();
        assert_eq!(visited, labels(&["A", "B", "C", "D"]));
        // two messages per edge while collecting, one more while distributing
        assert_eq!(trace.messages, 3 * 3);
    }
}

#[test]
fn isolated_variables_keep_their_prior() {
    let store = chain_store(200);
    let table = AdjacencyTable::from_edges(labels(&["A", "B"]), [("A", "B")]).unwrap();
    let mut network = BeliefNetwork::new(store, &table, true).unwrap();
    let prior = network.node("C").unwrap().prior().clone();

    network.set_evidence("A", "1").unwrap();
    let trace = network.calc_probs("A").unwrap();
    assert_eq!(trace.visited, labels(&["A", "B"]));
    let belief = network.get_belief("C").unwrap();
    for (state, p) in prior {
        assert!((belief[&state] - p).abs() < TOL);
    }
}

#[test]
fn clear_evidence_restores_baseline() {
    let mut network = BeliefNetwork::new(chain_store(300), &chain_table(), true).unwrap();
    let baseline = network.beliefs();

    network.set_evidence("C", "0").unwrap();
    network.calc_probs("A").unwrap();
    assert_ne!(network.beliefs(), baseline);

    network.clear_evidence().unwrap();
    assert!(network.evidence().is_empty());
    for (variable, belief) in network.beliefs() {
        for (state, p) in belief {
            assert!((baseline[&variable][&state] - p).abs() < TOL);
        }
    }
}

#[test]
fn unseen_parent_combination_uses_uniform_fallback() {
    // A=1,B=1 never occurs, so P(C | A=1,B=1) falls back to uniform
    let store =
        FrequencyStore::from_text("A,B,C\n0,0,0\n0,1,1\n1,0,1\n0,0,0\n").unwrap();
    let table = AdjacencyTable::from_edges(labels(&["A", "B", "C"]), [("A", "C"), ("B", "C")])
        .unwrap();
    let mut network = BeliefNetwork::new(store, &table, true).unwrap();
    network.set_evidence("A", "1").unwrap();
    network.set_evidence("B", "1").unwrap();
    network.calc_probs("C").unwrap();
    let belief = network.get_belief("C").unwrap();
    assert!((belief["0"] - 0.5).abs() < TOL);
    assert!((belief["1"] - 0.5).abs() < TOL);
}

/// A → B and C → D, two independent trees.
fn forest_store(rows: usize) -> FrequencyStore {
    let mut rng = Lcg(23);
    let mut text = String::from("A,B,C,D\n");
    for _ in 0..rows {
        let a = rng.bit(0.5);
        let b = rng.bit(if a == 1 { 0.85 } else { 0.25 });
        let c = rng.bit(0.4);
        let d = rng.bit(if c == 1 { 0.9 } else { 0.1 });
        text.push_str(&format!("{},{},{},{}\n", a, b, c, d));
    }
    FrequencyStore::from_text(&text).unwrap()
}

#[test]
fn evidence_in_every_tree_of_a_forest_is_propagated() {
    let table = AdjacencyTable::from_edges(
        labels(&["A", "B", "C", "D"]),
        [("A", "B"), ("C", "D")],
    )
    .unwrap();
    let evidence = [("A", "1"), ("D", "1")];
    let expected = enumerate(&forest_store(500), &table, &evidence);

    let mut network = BeliefNetwork::new(forest_store(500), &table, true).unwrap();
    for (variable, state) in evidence {
        network.set_evidence(variable, state).unwrap();
    }
    let traces = network.propagate_evidence().unwrap();

    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].visited, labels(&["A", "B"]));
    assert_eq!(traces[1].visited, labels(&["D", "C"]));
    assert_normalized(&network);
    assert_matches_enumeration(&network, &expected);
}

#[test]
fn one_walk_covers_evidence_in_the_same_tree() {
    let mut network = BeliefNetwork::new(chain_store(300), &chain_table(), true).unwrap();
    network.set_evidence("A", "1").unwrap();
    network.set_evidence("C", "0").unwrap();
    let traces = network.propagate_evidence().unwrap();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].query, "A");

    let expected = enumerate(&chain_store(300), &chain_table(), &[("A", "1"), ("C", "0")]);
    assert_matches_enumeration(&network, &expected);
}

#[test]
fn no_evidence_means_no_walks() {
    let mut network = BeliefNetwork::new(chain_store(100), &chain_table(), true).unwrap();
    let baseline = network.beliefs();
    assert!(network.propagate_evidence().unwrap().is_empty());
    assert_eq!(network.beliefs(), baseline);
}

#[test]
fn unknown_names_are_errors() {
    let mut network = BeliefNetwork::new(chain_store(50), &chain_table(), true).unwrap();
    assert!(matches!(
        network.get_belief("Q"),
        Err(Error::UnknownVariable { .. })
    ));
    assert!(matches!(
        network.set_evidence("A", "2"),
        Err(Error::UnknownState { .. })
    ));
}
