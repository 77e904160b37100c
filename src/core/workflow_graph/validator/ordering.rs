//! Which nodes are guaranteed to run before which, derived from the edge graph.
//!
//! Execution starts at the first declared node and follows edges, so a
//! producer runs before a consumer when it is reachable from the start node
//! and has an edge path to the consumer.

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use pflow_types::WorkflowIr;
use std::collections::HashMap;

/// Relationship between a referenced node and the node referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Predecessor,
    SelfReference,
    /// Both nodes sit on a cycle; carries the cycle members in declaration order.
    Circular(Vec<String>),
    NotPredecessor,
}

pub struct ExecutionOrder {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    start: Option<NodeIndex>,
    component: HashMap<NodeIndex, usize>,
    cycles: Vec<Vec<String>>,
}

impl ExecutionOrder {
    pub fn new(ir: &WorkflowIr) -> Self {
        let mut graph = DiGraph::<String, ()>::new();
        let mut index = HashMap::new();
        for node in &ir.nodes {
            index
                .entry(node.id.clone())
                .or_insert_with(|| graph.add_node(node.id.clone()));
        }
        for edge in &ir.edges {
            if let (Some(from), Some(to)) = (index.get(&edge.from), index.get(&edge.to)) {
                graph.add_edge(*from, *to, ());
            }
        }

        let mut component = HashMap::new();
        let mut cycles = Vec::new();
        for scc in tarjan_scc(&graph) {
            let cyclic = scc.len() > 1;
            if cyclic {
                let slot = cycles.len();
                let mut members: Vec<NodeIndex> = scc.clone();
                members.sort();
                cycles.push(members.iter().map(|idx| graph[*idx].clone()).collect());
                for idx in scc {
                    component.insert(idx, slot);
                }
            }
        }

        let start = ir.nodes.first().and_then(|node| index.get(&node.id).copied());
        Self {
            graph,
            index,
            start,
            component,
            cycles,
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    /// Classify a reference from `consumer` to `producer`; `None` if either is unknown.
    pub fn classify(&self, producer: &str, consumer: &str) -> Option<Reference> {
        let producer_idx = *self.index.get(producer)?;
        let consumer_idx = *self.index.get(consumer)?;

        if producer_idx == consumer_idx {
            return Some(Reference::SelfReference);
        }
        if let (Some(a), Some(b)) = (
            self.component.get(&producer_idx),
            self.component.get(&consumer_idx),
        ) {
            if a == b {
                return Some(Reference::Circular(self.cycles[*a].clone()));
            }
        }

        let reachable_from_start = self
            .start
            .map(|start| has_path_connecting(&self.graph, start, producer_idx, None))
            .unwrap_or(false);
        if reachable_from_start && has_path_connecting(&self.graph, producer_idx, consumer_idx, None) {
            Some(Reference::Predecessor)
        } else {
            Some(Reference::NotPredecessor)
        }
    }

    pub fn has_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }
}
