use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

/// A graph node owned by the caller.
///
/// The simulation mutates `x`, `y`, `vx`, `vy` and `degree` in place and never creates or
/// destroys nodes. A node starts without a position (`NAN`); `initialize_elements` or the
/// entry sanitization of `step` assigns a jittered near-center default.
#[derive(Debug, Clone)]
pub struct Node {
    /// Opaque caller-assigned identity, unique within the graph.
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Sum of incident edge weights plus the self-similarity floor of 1.
    /// Recomputed from the edge set on every tick.
    pub degree: f64,
    /// Optional explicit mass; gravity uses `degree + 1` when unset.
    pub mass: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: f64::NAN,
            y: f64::NAN,
            vx: 0.0,
            vy: 0.0,
            degree: 1.0,
            mass: None,
        }
    }

    /// A node with an explicit starting position and zero velocity.
    pub fn at(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::new(id)
        }
    }

    /// Mass used by gravity: the explicit mass when set, `degree + 1` otherwise.
    pub fn effective_mass(&self) -> f64 {
        self.mass.unwrap_or(self.degree + 1.0)
    }
}

/// An edge between two nodes of the same graph.
///
/// Endpoints are indices into the graph's dense node array, so endpoint positions are read
/// and written without id lookup. `weight` is a similarity in `[-1, 1]` in practice, but any
/// finite value is accepted; non-finite weights are replaced with 1 during sanitization.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Caller-owned node/edge set.
///
/// `nodes` and `edges` are public so a renderer can read positions directly after each tick.
/// The `add_node`/`add_edge` helpers keep the internal id index current; edges pushed into
/// `edges` by hand are still checked by `validate` before a step runs.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    ids: IndexMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index.
    pub fn add_node(&mut self, node: Node) -> Result<usize> {
        if node.id.is_empty() {
            return Err(Error::MissingNodeId {
                index: self.nodes.len(),
            });
        }
        if self.ids.contains_key(&node.id) {
            return Err(Error::DuplicateNodeId { id: node.id });
        }
        let index = self.nodes.len();
        self.ids.insert(node.id.clone(), index);
        self.nodes.push(node);
        Ok(index)
    }

    /// Append an edge between two existing nodes identified by id and return its index.
    pub fn add_edge(&mut self, source: &str, target: &str, weight: f64) -> Result<usize> {
        let edge = self.edges.len();
        let (Some(&source), Some(&target)) = (self.ids.get(source), self.ids.get(target)) else {
            return Err(Error::MissingEndpoint { edge });
        };
        self.edges.push(Edge {
            source,
            target,
            weight,
        });
        Ok(edge)
    }

    /// Index of the node added under `id`, if any.
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.ids.get(id).copied()
    }

    /// Check the structural invariants a step relies on: every node carries a non-empty
    /// unique id and every edge endpoint indexes a node in the array.
    ///
    /// Derived from the current `nodes`/`edges` contents, not the insertion helpers, so
    /// hand-built edges are covered too.
    pub fn validate(&self) -> Result<()> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.is_empty() {
                return Err(Error::MissingNodeId { index });
            }
            if !seen.insert(node.id.as_str()) {
                return Err(Error::DuplicateNodeId {
                    id: node.id.clone(),
                });
            }
        }
        for (edge, e) in self.edges.iter().enumerate() {
            if e.source >= self.nodes.len() || e.target >= self.nodes.len() {
                return Err(Error::MissingEndpoint { edge });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_resolves_ids_to_indices() {
        let mut g = Graph::new();
        g.add_node(Node::new("a")).unwrap();
        g.add_node(Node::new("b")).unwrap();
        let e = g.add_edge("b", "a", 0.5).unwrap();

        assert_eq!(g.edges[e].source, 1);
        assert_eq!(g.edges[e].target, 0);
        assert_eq!(g.node_index("b"), Some(1));
    }

    #[test]
    fn add_node_rejects_duplicate_and_empty_ids() {
        let mut g = Graph::new();
        g.add_node(Node::new("a")).unwrap();
        assert!(matches!(
            g.add_node(Node::new("a")),
            Err(Error::DuplicateNodeId { .. })
        ));
        assert!(matches!(
            g.add_node(Node::new("")),
            Err(Error::MissingNodeId { .. })
        ));
    }

    #[test]
    fn validate_catches_hand_built_edge_with_unknown_endpoint() {
        let mut g = Graph::new();
        g.add_node(Node::new("a")).unwrap();
        g.edges.push(Edge {
            source: 0,
            target: 3,
            weight: 1.0,
        });
        assert!(matches!(
            g.validate(),
            Err(Error::MissingEndpoint { edge: 0 })
        ));
    }
}
