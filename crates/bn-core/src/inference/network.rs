//! Network construction, initialization and evidence propagation.
//!
//! Propagation for one query runs in two passes over the undirected tree:
//!
//! 1. **Collect** (`transmit`): a depth-first walk from the query node. On
//!    entering a neighbour the current node sends it a message; when the
//!    recursion returns, the neighbour answers with a message computed from
//!    its now up-to-date subtree. Every node's body runs once per request.
//! 2. **Distribute**: a second walk from the query node pushes the settled
//!    messages back outward so every posterior, not only the query's,
//!    reflects all evidence.
//!
//! Both passes are exact on singly-connected networks. Construction logs a
//! warning when the undirected skeleton has a loop.

use std::collections::{BTreeMap, HashSet};

use bn_common::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::node::{BeliefNode, NodeSnapshot, StateMap};
use crate::data::FrequencyStore;
use crate::logging::targets;
use crate::structure::AdjacencyTable;

/// Nodes visited by one propagation request, in visiting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationTrace {
    pub query: String,
    pub visited: Vec<String>,
    /// Messages delivered across both passes.
    pub messages: usize,
}

/// Serializable dump of the whole network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub max_depth: usize,
    pub singly_connected: bool,
    pub nodes: Vec<NodeSnapshot>,
}

/// Per-request traversal state.
#[derive(Debug, Default)]
struct Propagation {
    visited: HashSet<String>,
    order: Vec<String>,
    messages: usize,
}

/// A discrete Bayesian network over the columns of a [`FrequencyStore`].
#[derive(Debug)]
pub struct BeliefNetwork {
    store: FrequencyStore,
    nodes: BTreeMap<String, BeliefNode>,
    max_depth: usize,
    uniform_fallback: bool,
    singly_connected: bool,
}

fn node_ref<'a>(nodes: &'a BTreeMap<String, BeliefNode>, name: &str) -> Result<&'a BeliefNode> {
    nodes.get(name).ok_or_else(|| Error::unknown_variable(name))
}

fn node_mut<'a>(
    nodes: &'a mut BTreeMap<String, BeliefNode>,
    name: &str,
) -> Result<&'a mut BeliefNode> {
    nodes.get_mut(name).ok_or_else(|| Error::unknown_variable(name))
}

impl BeliefNetwork {
    /// Build one node per store column, wire the edges of `structure`,
    /// assign depths and run [`format`](Self::format).
    ///
    /// Every label of `structure` must be a store column. Columns the table
    /// does not mention become isolated nodes.
    pub fn new(
        store: FrequencyStore,
        structure: &AdjacencyTable,
        uniform_fallback: bool,
    ) -> Result<Self> {
        structure.validate()?;
        for label in structure.labels() {
            if !store.has_variable(label) {
                return Err(Error::unknown_variable(label.clone()));
            }
        }

        let mut nodes = BTreeMap::new();
        for variable in store.variables() {
            nodes.insert(variable.clone(), BeliefNode::new(variable.clone(), &store)?);
        }

        let edges = structure.edges();
        for &(parent, child) in &edges {
            let states = node_ref(&nodes, parent)?.elements().to_vec();
            node_mut(&mut nodes, child)?.add_parent(parent, states);
            node_mut(&mut nodes, parent)?.add_child(child);
        }

        let mut network = BeliefNetwork {
            store,
            nodes,
            max_depth: 0,
            uniform_fallback,
            singly_connected: true,
        };
        network.assign_depths(structure)?;
        network.singly_connected = network.check_singly_connected(&edges);
        if !network.singly_connected {
            warn!(
                target: targets::NETWORK,
                "network has an undirected loop; posteriors are approximate"
            );
        }

        info!(
            target: targets::NETWORK,
            nodes = network.nodes.len(),
            edges = edges.len(),
            max_depth = network.max_depth,
            "network built"
        );
        network.format()?;
        Ok(network)
    }

    /// Reset every node and run the forward π sweep, level by level.
    ///
    /// Clears all evidence. Afterwards each posterior is the node's marginal
    /// under the learned tables.
    pub fn format(&mut self) -> Result<()> {
        for node in self.nodes.values_mut() {
            node.reset();
        }

        let root_seeds: Vec<(String, String, StateMap)> = self
            .nodes
            .values()
            .filter(|n| n.is_root())
            .flat_map(|root| {
                root.children()
                    .iter()
                    .map(|c| (c.clone(), root.name().to_string(), root.prior().clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (child, root, prior) in root_seeds {
            node_mut(&mut self.nodes, &child)?.receive_pi(&root, prior)?;
        }

        for level in 1..=self.max_depth {
            let names: Vec<String> = self
                .nodes
                .values()
                .filter(|n| n.depth() == level)
                .map(|n| n.name().to_string())
                .collect();
            for name in names {
                let node = node_mut(&mut self.nodes, &name)?;
                node.cal_evi_pi(&self.store, self.uniform_fallback)?;
                node.cal_prob()?;

                let children = node.children().to_vec();
                for child in children {
                    let msg = node_ref(&self.nodes, &name)?.cal_msg_pi(&child)?;
                    node_mut(&mut self.nodes, &child)?.receive_pi(&name, msg)?;
                }
            }
        }

        debug!(target: targets::NETWORK, levels = self.max_depth, "format sweep complete");
        Ok(())
    }

    /// Fix `variable` to `state` (hard evidence).
    ///
    /// The node's λ evidence and posterior become the indicator of `state`,
    /// and so does the π message each child holds from it.
    pub fn set_evidence(&mut self, variable: &str, state: &str) -> Result<()> {
        let node = node_mut(&mut self.nodes, variable)?;
        let indicator = node.fix(state)?;
        let children = node.children().to_vec();
        for child in children {
            node_mut(&mut self.nodes, &child)?.receive_pi(variable, indicator.clone())?;
        }
        info!(target: targets::NETWORK, variable, state, "evidence set");
        Ok(())
    }

    /// Drop all evidence and return to the baseline state.
    pub fn clear_evidence(&mut self) -> Result<()> {
        self.format()?;
        info!(target: targets::NETWORK, "evidence cleared");
        Ok(())
    }

    /// Propagate the current evidence with `query` as the root of the walk.
    pub fn calc_probs(&mut self, query: &str) -> Result<PropagationTrace> {
        node_ref(&self.nodes, query)?;
        self.refresh(query)?;

        let mut collect = Propagation::default();
        self.transmit(query, None, &mut collect)?;

        let mut spread = Propagation::default();
        self.distribute(query, &mut spread)?;

        let trace = PropagationTrace {
            query: query.to_string(),
            visited: collect.order,
            messages: collect.messages + spread.messages,
        };
        info!(
            target: targets::NETWORK,
            query,
            visited = trace.visited.len(),
            messages = trace.messages,
            "propagation complete"
        );
        Ok(trace)
    }

    /// Propagate every evidence variable's component.
    ///
    /// Runs [`calc_probs`](Self::calc_probs) rooted at each evidence variable
    /// not already reached by an earlier walk, so a forest with evidence in
    /// several trees is fully updated. Returns one trace per walk.
    pub fn propagate_evidence(&mut self) -> Result<Vec<PropagationTrace>> {
        let mut reached: HashSet<String> = HashSet::new();
        let mut traces = Vec::new();
        for variable in self.evidence().into_keys() {
            if reached.contains(&variable) {
                continue;
            }
            let trace = self.calc_probs(&variable)?;
            reached.extend(trace.visited.iter().cloned());
            traces.push(trace);
        }
        debug!(target: targets::NETWORK, walks = traces.len(), "evidence propagated");
        Ok(traces)
    }

    /// Current posterior of `variable`.
    pub fn get_belief(&self, variable: &str) -> Result<StateMap> {
        Ok(node_ref(&self.nodes, variable)?.posterior().clone())
    }

    /// Current posterior of every variable.
    pub fn beliefs(&self) -> BTreeMap<String, StateMap> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.posterior().clone()))
            .collect()
    }

    /// Variables currently fixed by evidence.
    pub fn evidence(&self) -> BTreeMap<String, String> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| node.evidence().map(|s| (name.clone(), s.to_string())))
            .collect()
    }

    pub fn node(&self, name: &str) -> Option<&BeliefNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BeliefNode> {
        self.nodes.values()
    }

    pub fn store(&self) -> &FrequencyStore {
        &self.store
    }

    /// Deepest topological level.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether the undirected skeleton is a forest.
    pub fn is_singly_connected(&self) -> bool {
        self.singly_connected
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            max_depth: self.max_depth,
            singly_connected: self.singly_connected,
            nodes: self.nodes.values().map(BeliefNode::snapshot).collect(),
        }
    }

    fn transmit(&mut self, name: &str, from: Option<&str>, prop: &mut Propagation) -> Result<()> {
        if !prop.visited.insert(name.to_string()) {
            return Ok(());
        }
        prop.order.push(name.to_string());
        trace!(target: targets::MESSAGE, node = name, from = ?from, "transmit");

        let node = node_ref(&self.nodes, name)?;
        let parents = node.parents().to_vec();
        let children = node.children().to_vec();

        for parent in &parents {
            if prop.visited.contains(parent) {
                continue;
            }
            self.send_lambda(name, parent)?;
            self.refresh(parent)?;
            prop.messages += 1;
            self.transmit(parent, Some(name), prop)?;
            self.send_pi(parent, name)?;
            self.refresh(name)?;
            prop.messages += 1;
        }

        for child in &children {
            if prop.visited.contains(child) {
                continue;
            }
            self.send_pi(name, child)?;
            self.refresh(child)?;
            prop.messages += 1;
            self.transmit(child, Some(name), prop)?;
            self.send_lambda(child, name)?;
            self.refresh(name)?;
            prop.messages += 1;
        }
        Ok(())
    }

    fn distribute(&mut self, name: &str, prop: &mut Propagation) -> Result<()> {
        prop.visited.insert(name.to_string());

        let node = node_ref(&self.nodes, name)?;
        let parents = node.parents().to_vec();
        let children = node.children().to_vec();

        for parent in &parents {
            if prop.visited.contains(parent) {
                continue;
            }
            self.send_lambda(name, parent)?;
            self.refresh(parent)?;
            prop.messages += 1;
            self.distribute(parent, prop)?;
        }
        for child in &children {
            if prop.visited.contains(child) {
                continue;
            }
            self.send_pi(name, child)?;
            self.refresh(child)?;
            prop.messages += 1;
            self.distribute(child, prop)?;
        }
        Ok(())
    }

    fn send_pi(&mut self, parent: &str, child: &str) -> Result<()> {
        let msg = node_ref(&self.nodes, parent)?.cal_msg_pi(child)?;
        trace!(target: targets::MESSAGE, from = parent, to = child, msg = ?msg, "pi");
        node_mut(&mut self.nodes, child)?.receive_pi(parent, msg)
    }

    fn send_lambda(&mut self, child: &str, parent: &str) -> Result<()> {
        let msg = node_mut(&mut self.nodes, child)?.cal_msg_lambda(
            parent,
            &self.store,
            self.uniform_fallback,
        )?;
        trace!(target: targets::MESSAGE, from = child, to = parent, msg = ?msg, "lambda");
        node_mut(&mut self.nodes, parent)?.receive_lambda(child, msg)
    }

    fn refresh(&mut self, name: &str) -> Result<()> {
        node_mut(&mut self.nodes, name)?.refresh(&self.store, self.uniform_fallback)
    }

    /// Depth = 1 + deepest parent; nodes outside the table are roots.
    fn assign_depths(&mut self, structure: &AdjacencyTable) -> Result<()> {
        let order: Vec<String> = structure
            .topological_order()?
            .into_iter()
            .map(str::to_string)
            .collect();

        for node in self.nodes.values_mut() {
            node.set_depth(1);
        }
        for name in &order {
            let parents = node_ref(&self.nodes, name)?.parents().to_vec();
            let mut depth = 1;
            for parent in &parents {
                depth = depth.max(node_ref(&self.nodes, parent)?.depth() + 1);
            }
            node_mut(&mut self.nodes, name)?.set_depth(depth);
        }
        self.max_depth = self.nodes.values().map(BeliefNode::depth).max().unwrap_or(0);
        Ok(())
    }

    /// Union-find over the undirected edges; any edge joining an already
    /// connected pair closes a loop.
    fn check_singly_connected(&self, edges: &[(&str, &str)]) -> bool {
        let index: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect();
        let mut parent: Vec<usize> = (0..index.len()).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (a, b) in edges {
            let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) else {
                continue;
            };
            let ra = find(&mut parent, ia);
            let rb = find(&mut parent, ib);
            if ra == rb {
                return false;
            }
            parent[ra] = rb;
        }
        true
    }
}
