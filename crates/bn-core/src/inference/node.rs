//! One discrete variable and its π/λ message state.
//!
//! A node never holds another node. Parents and children are names resolved
//! by the owning [`BeliefNetwork`](super::network::BeliefNetwork), which also
//! delivers every computed message into the receiver's slot.
//!
//! Slot layout:
//! - `msg_pi[parent][parent_state]`: π message received from a parent
//! - `msg_lambda[child][own_state]`: λ message received from a child

use std::collections::BTreeMap;

use bn_common::{Error, Result};
use serde::Serialize;

use crate::data::{Condition, FrequencyStore};

/// Per-state values of one variable.
pub type StateMap = BTreeMap<String, f64>;

/// P(node | one joint assignment of its parents).
#[derive(Debug, Clone)]
struct CptRow {
    /// Parent states, aligned with `BeliefNode::parents`.
    assignment: Vec<String>,
    probs: StateMap,
}

fn ones(states: &[String]) -> StateMap {
    states.iter().map(|s| (s.clone(), 1.0)).collect()
}

/// A variable in the network.
#[derive(Debug, Clone)]
pub struct BeliefNode {
    name: String,
    elements: Vec<String>,
    prior: StateMap,
    parents: Vec<String>,
    parent_states: Vec<Vec<String>>,
    children: Vec<String>,
    evi_pi: StateMap,
    evi_lambda: StateMap,
    msg_pi: BTreeMap<String, StateMap>,
    msg_lambda: BTreeMap<String, StateMap>,
    posterior: StateMap,
    evidence: Option<String>,
    depth: usize,
    cpt: Option<Vec<CptRow>>,
}

/// Serializable view of a node's full message state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub depth: usize,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub elements: Vec<String>,
    pub evidence: Option<String>,
    pub prior: StateMap,
    pub evi_pi: StateMap,
    pub evi_lambda: StateMap,
    pub msg_pi: BTreeMap<String, StateMap>,
    pub msg_lambda: BTreeMap<String, StateMap>,
    pub posterior: StateMap,
}

impl BeliefNode {
    /// Create a node from the unconditional counts of `name`.
    pub fn new(name: impl Into<String>, store: &FrequencyStore) -> Result<Self> {
        let name = name.into();
        let freq = store.frequency(&name, &Condition::new(), false)?;
        let prior = freq.distribution();
        let elements = prior.keys().cloned().collect();

        Ok(BeliefNode {
            name,
            elements,
            prior,
            parents: Vec::new(),
            parent_states: Vec::new(),
            children: Vec::new(),
            evi_pi: StateMap::new(),
            evi_lambda: StateMap::new(),
            msg_pi: BTreeMap::new(),
            msg_lambda: BTreeMap::new(),
            posterior: StateMap::new(),
            evidence: None,
            depth: 0,
            cpt: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State labels in sorted order.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn prior(&self) -> &StateMap {
        &self.prior
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn posterior(&self) -> &StateMap {
        &self.posterior
    }

    pub fn evi_pi(&self) -> &StateMap {
        &self.evi_pi
    }

    pub fn evi_lambda(&self) -> &StateMap {
        &self.evi_lambda
    }

    /// π message currently held from `parent`.
    pub fn msg_pi_from(&self, parent: &str) -> Option<&StateMap> {
        self.msg_pi.get(parent)
    }

    /// λ message currently held from `child`.
    pub fn msg_lambda_from(&self, child: &str) -> Option<&StateMap> {
        self.msg_lambda.get(child)
    }

    pub fn evidence(&self) -> Option<&str> {
        self.evidence.as_deref()
    }

    /// Topological level; roots are 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub(crate) fn add_parent(&mut self, parent: &str, states: Vec<String>) {
        if self.parents.iter().any(|p| p == parent) {
            return;
        }
        self.parents.push(parent.to_string());
        self.parent_states.push(states);
        self.cpt = None;
    }

    pub(crate) fn add_child(&mut self, child: &str) {
        if !self.children.iter().any(|c| c == child) {
            self.children.push(child.to_string());
        }
    }

    /// P(state), or `UnknownState`.
    pub fn cal_prior(&self, state: &str) -> Result<f64> {
        self.prior
            .get(state)
            .copied()
            .ok_or_else(|| Error::unknown_state(&self.name, state))
    }

    /// Clear evidence and seed every map for a fresh sweep.
    ///
    /// Roots start with π evidence equal to the prior, other nodes with 1.
    /// All received messages start at 1; the network then overwrites the
    /// slots fed by root parents with those parents' priors.
    pub(crate) fn reset(&mut self) {
        self.evidence = None;
        self.cpt = None;
        self.posterior = self.prior.clone();
        self.evi_lambda = ones(&self.elements);
        self.evi_pi = if self.is_root() {
            self.prior.clone()
        } else {
            ones(&self.elements)
        };
        self.msg_pi = self
            .parents
            .iter()
            .zip(&self.parent_states)
            .map(|(p, states)| (p.clone(), ones(states)))
            .collect();
        self.msg_lambda = self
            .children
            .iter()
            .map(|c| (c.clone(), ones(&self.elements)))
            .collect();
    }

    /// Recompute π evidence from the incoming π messages.
    ///
    /// `π(x) = Σ_u P(x | u) · Π_i msg_pi[U_i](u_i)` over every joint parent
    /// assignment `u`. A root's π evidence is its prior.
    pub fn cal_evi_pi(&mut self, store: &FrequencyStore, uniform_fallback: bool) -> Result<()> {
        if self.is_root() {
            self.evi_pi = self.prior.clone();
            return Ok(());
        }
        self.ensure_cpt(store, uniform_fallback)?;

        let mut acc: StateMap = self.elements.iter().map(|s| (s.clone(), 0.0)).collect();
        for row in self.cpt.as_deref().unwrap_or_default() {
            let mut weight = 1.0;
            for (parent, state) in self.parents.iter().zip(&row.assignment) {
                weight *= self.pi_message(parent, state)?;
            }
            if weight == 0.0 {
                continue;
            }
            for (state, value) in acc.iter_mut() {
                *value += row.probs.get(state).copied().unwrap_or(0.0) * weight;
            }
        }
        self.evi_pi = acc;
        Ok(())
    }

    /// Recompute λ evidence as the product of the children's λ messages,
    /// masked by hard evidence when present. A leaf without evidence gets 1.
    pub fn cal_evi_lambda(&mut self) -> Result<()> {
        let mut out = StateMap::new();
        for state in &self.elements {
            let mut value = match &self.evidence {
                Some(observed) if observed != state => 0.0,
                _ => 1.0,
            };
            for child in &self.children {
                value *= self.lambda_message(child, state)?;
            }
            out.insert(state.clone(), value);
        }
        self.evi_lambda = out;
        Ok(())
    }

    /// Normalizer `α = 1 / Σ_x π(x)·λ(x)`, or 0 when the sum is 0.
    pub fn cal_normal(&self) -> Result<f64> {
        let mut sum = 0.0;
        for state in &self.elements {
            sum += self.pi_evidence(state)? * self.lambda_evidence(state)?;
        }
        Ok(if sum > 0.0 { 1.0 / sum } else { 0.0 })
    }

    /// `posterior(x) = α·π(x)·λ(x)`. Returns α.
    pub fn cal_prob(&mut self) -> Result<f64> {
        let alpha = self.cal_normal()?;
        let mut out = StateMap::new();
        for state in &self.elements {
            let value = alpha * self.pi_evidence(state)? * self.lambda_evidence(state)?;
            out.insert(state.clone(), value);
        }
        self.posterior = out;
        Ok(alpha)
    }

    /// π evidence, λ evidence, then posterior.
    pub fn refresh(&mut self, store: &FrequencyStore, uniform_fallback: bool) -> Result<()> {
        self.cal_evi_pi(store, uniform_fallback)?;
        self.cal_evi_lambda()?;
        self.cal_prob()?;
        Ok(())
    }

    /// π message for `child`: `posterior(x) / λ_child(x)`, 0 where that λ is 0.
    pub fn cal_msg_pi(&self, child: &str) -> Result<StateMap> {
        if !self.children.iter().any(|c| c == child) {
            return Err(Error::MalformedStructure(format!(
                "'{}' is not a child of '{}'",
                child, self.name
            )));
        }
        let mut out = StateMap::new();
        for state in &self.elements {
            let lambda = self.lambda_message(child, state)?;
            let posterior = self.posterior.get(state).copied().ok_or_else(|| {
                Error::MissingEvidence {
                    node: self.name.clone(),
                    state: state.clone(),
                }
            })?;
            out.insert(
                state.clone(),
                if lambda == 0.0 { 0.0 } else { posterior / lambda },
            );
        }
        Ok(out)
    }

    /// λ message for `parent`, keyed by the parent's states.
    ///
    /// `λ(u) = Σ_{w} Π_{k≠parent} msg_pi[U_k](w_k) · Σ_x P(x | u, w) · λ(x)`
    /// where `w` ranges over joint assignments of the other parents.
    pub fn cal_msg_lambda(
        &mut self,
        parent: &str,
        store: &FrequencyStore,
        uniform_fallback: bool,
    ) -> Result<StateMap> {
        let idx = self
            .parents
            .iter()
            .position(|p| p == parent)
            .ok_or_else(|| {
                Error::MalformedStructure(format!(
                    "'{}' is not a parent of '{}'",
                    parent, self.name
                ))
            })?;
        self.ensure_cpt(store, uniform_fallback)?;

        let mut out: StateMap = self.parent_states[idx]
            .iter()
            .map(|s| (s.clone(), 0.0))
            .collect();
        for row in self.cpt.as_deref().unwrap_or_default() {
            let mut weight = 1.0;
            for (k, (other, state)) in self.parents.iter().zip(&row.assignment).enumerate() {
                if k != idx {
                    weight *= self.pi_message(other, state)?;
                }
            }
            if weight == 0.0 {
                continue;
            }
            let mut inner = 0.0;
            for state in &self.elements {
                inner += row.probs.get(state).copied().unwrap_or(0.0)
                    * self.lambda_evidence(state)?;
            }
            if let Some(slot) = out.get_mut(&row.assignment[idx]) {
                *slot += weight * inner;
            }
        }
        Ok(out)
    }

    /// Store a π message from `parent`.
    pub(crate) fn receive_pi(&mut self, parent: &str, message: StateMap) -> Result<()> {
        match self.msg_pi.get_mut(parent) {
            Some(slot) => {
                *slot = message;
                Ok(())
            }
            None => Err(Error::MalformedStructure(format!(
                "'{}' is not a parent of '{}'",
                parent, self.name
            ))),
        }
    }

    /// Store a λ message from `child`.
    pub(crate) fn receive_lambda(&mut self, child: &str, message: StateMap) -> Result<()> {
        match self.msg_lambda.get_mut(child) {
            Some(slot) => {
                *slot = message;
                Ok(())
            }
            None => Err(Error::MalformedStructure(format!(
                "'{}' is not a child of '{}'",
                child, self.name
            ))),
        }
    }

    /// Fix the node to `state`. Returns the indicator vector that becomes the
    /// π message to every child.
    pub(crate) fn fix(&mut self, state: &str) -> Result<StateMap> {
        if !self.elements.iter().any(|s| s == state) {
            return Err(Error::unknown_state(&self.name, state));
        }
        let indicator: StateMap = self
            .elements
            .iter()
            .map(|s| (s.clone(), if s == state { 1.0 } else { 0.0 }))
            .collect();
        self.evidence = Some(state.to_string());
        self.evi_lambda = indicator.clone();
        self.posterior = indicator.clone();
        Ok(indicator)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            name: self.name.clone(),
            depth: self.depth,
            parents: self.parents.clone(),
            children: self.children.clone(),
            elements: self.elements.clone(),
            evidence: self.evidence.clone(),
            prior: self.prior.clone(),
            evi_pi: self.evi_pi.clone(),
            evi_lambda: self.evi_lambda.clone(),
            msg_pi: self.msg_pi.clone(),
            msg_lambda: self.msg_lambda.clone(),
            posterior: self.posterior.clone(),
        }
    }

    fn ensure_cpt(&mut self, store: &FrequencyStore, uniform_fallback: bool) -> Result<()> {
        if self.cpt.is_some() {
            return Ok(());
        }
        let vars: Vec<(String, Vec<String>)> = self
            .parents
            .iter()
            .cloned()
            .zip(self.parent_states.iter().cloned())
            .collect();
        let mut rows = Vec::new();
        for cond in Condition::cartesian(&vars) {
            let probs = store.frequency(&self.name, &cond, uniform_fallback)?.distribution();
            let assignment = self
                .parents
                .iter()
                .map(|p| cond.get(p).unwrap_or_default().to_string())
                .collect();
            rows.push(CptRow { assignment, probs });
        }
        self.cpt = Some(rows);
        Ok(())
    }

    fn pi_message(&self, parent: &str, state: &str) -> Result<f64> {
        self.msg_pi
            .get(parent)
            .and_then(|m| m.get(state))
            .copied()
            .ok_or_else(|| Error::MissingMessage {
                node: self.name.clone(),
                peer: parent.to_string(),
                state: state.to_string(),
            })
    }

    fn lambda_message(&self, child: &str, state: &str) -> Result<f64> {
        self.msg_lambda
            .get(child)
            .and_then(|m| m.get(state))
            .copied()
            .ok_or_else(|| Error::MissingMessage {
                node: self.name.clone(),
                peer: child.to_string(),
                state: state.to_string(),
            })
    }

    fn pi_evidence(&self, state: &str) -> Result<f64> {
        self.evi_pi
            .get(state)
            .copied()
            .ok_or_else(|| Error::MissingEvidence {
                node: self.name.clone(),
                state: state.to_string(),
            })
    }

    fn lambda_evidence(&self, state: &str) -> Result<f64> {
        self.evi_lambda
            .get(state)
            .copied()
            .ok_or_else(|| Error::MissingEvidence {
                node: self.name.clone(),
                state: state.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// P(A=1)=0.5, P(B=1|A=1)=0.8, P(B=1|A=0)=0.2 over 10 rows.
    fn two_node_store() -> FrequencyStore {
        let mut text = String::from("A,B\n");
        for (a, b, n) in [("1", "1", 4), ("1", "0", 1), ("0", "1", 1), ("0", "0", 4)] {
            for _ in 0..n {
                text.push_str(&format!("{},{}\n", a, b));
            }
        }
        FrequencyStore::from_text(&text).unwrap()
    }

    fn wired(store: &FrequencyStore) -> (BeliefNode, BeliefNode) {
        let mut a = BeliefNode::new("A", store).unwrap();
        let mut b = BeliefNode::new("B", store).unwrap();
        b.add_parent("A", a.elements().to_vec());
        a.add_child("B");
        a.reset();
        b.reset();
        b.receive_pi("A", a.prior().clone()).unwrap();
        (a, b)
    }

    #[test]
    fn prior_sums_to_one() {
        let store = two_node_store();
        let a = BeliefNode::new("A", &store).unwrap();
        let total: f64 = a.prior().values().sum();
        assert!(approx(total, 1.0));
        assert!(approx(a.cal_prior("1").unwrap(), 0.5));
        assert!(matches!(
            a.cal_prior("7"),
            Err(Error::UnknownState { .. })
        ));
    }

    #[test]
    fn unknown_variable_fails_construction() {
        let store = two_node_store();
        assert!(matches!(
            BeliefNode::new("Z", &store),
            Err(Error::UnknownVariable { .. })
        ));
    }

    #[test]
    fn evi_pi_marginalizes_over_parent_messages() {
        let store = two_node_store();
        let (_, mut b) = wired(&store);
        b.refresh(&store, true).unwrap();
        assert!(approx(b.posterior()["1"], 0.5));

        b.receive_pi("A", StateMap::from([("0".into(), 0.0), ("1".into(), 1.0)]))
            .unwrap();
        b.refresh(&store, true).unwrap();
        assert!(approx(b.evi_pi()["1"], 0.8));
        assert!(approx(b.posterior()["1"], 0.8));
    }

    #[test]
    fn lambda_message_to_parent_is_likelihood_of_evidence() {
        let store = two_node_store();
        let (_, mut b) = wired(&store);
        b.fix("1").unwrap();
        let msg = b.cal_msg_lambda("A", &store, true).unwrap();
        assert!(approx(msg["1"], 0.8));
        assert!(approx(msg["0"], 0.2));
    }

    #[test]
    fn pi_message_divides_out_the_childs_lambda() {
        let store = two_node_store();
        let (mut a, _) = wired(&store);
        a.receive_lambda("B", StateMap::from([("0".into(), 0.2), ("1".into(), 0.8)]))
            .unwrap();
        a.refresh(&store, true).unwrap();
        let msg = a.cal_msg_pi("B").unwrap();
        // posterior ∝ 0.5*λ, divided by λ again leaves α*0.5 for both states
        assert!(approx(msg["0"], msg["1"]));

        a.receive_lambda("B", StateMap::from([("0".into(), 0.0), ("1".into(), 1.0)]))
            .unwrap();
        a.refresh(&store, true).unwrap();
        let msg = a.cal_msg_pi("B").unwrap();
        assert_eq!(msg["0"], 0.0);
    }

    #[test]
    fn evidence_masks_lambda_and_survives_refresh() {
        let store = two_node_store();
        let (mut a, _) = wired(&store);
        let indicator = a.fix("0").unwrap();
        assert_eq!(indicator["0"], 1.0);
        assert_eq!(indicator["1"], 0.0);
        assert_eq!(a.posterior()["0"], 1.0);

        a.refresh(&store, true).unwrap();
        assert!(approx(a.posterior()["0"], 1.0));
        assert!(approx(a.posterior()["1"], 0.0));
        assert!(matches!(a.fix("9"), Err(Error::UnknownState { .. })));
    }

    #[test]
    fn zero_normalizer_gives_zero_posterior() {
        let store = two_node_store();
        let (_, mut b) = wired(&store);
        b.receive_pi("A", StateMap::from([("0".into(), 0.0), ("1".into(), 0.0)]))
            .unwrap();
        b.refresh(&store, true).unwrap();
        assert_eq!(b.cal_normal().unwrap(), 0.0);
        assert!(b.posterior().values().all(|&p| p == 0.0));
    }

    #[test]
    fn unformatted_node_reports_missing_state() {
        let store = two_node_store();
        let mut b = BeliefNode::new("B", &store).unwrap();
        b.add_parent("A", vec!["0".into(), "1".into()]);
        assert!(matches!(
            b.cal_evi_pi(&store, true),
            Err(Error::MissingMessage { .. })
        ));
        assert!(matches!(b.cal_normal(), Err(Error::MissingEvidence { .. })));
    }

    #[test]
    fn messages_to_strangers_are_rejected() {
        let store = two_node_store();
        let (a, mut b) = wired(&store);
        assert!(matches!(a.cal_msg_pi("Q"), Err(Error::MalformedStructure(_))));
        assert!(matches!(
            b.cal_msg_lambda("Q", &store, true),
            Err(Error::MalformedStructure(_))
        ));
    }
}
