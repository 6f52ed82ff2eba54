use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::version::VersionConstraint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Installed version, empty for a dependency nobody provides.
    pub version: String,
    pub present: bool,
    /// Intersection of every range requested of this node. Only tracked for absent nodes.
    pub required_version: VersionConstraint,
    /// True when at least one requester marked this dependency as required.
    pub required: bool,
}

impl Node {
    pub fn present(id: &str, name: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            present: true,
            required_version: VersionConstraint::any(),
            required: false,
        }
    }

    pub fn absent(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            version: String::new(),
            present: false,
            required_version: VersionConstraint::any(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub required: bool,
}

/// Directed dependency graph. Edges point from a mod to what it depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphRecord")]
pub struct Graph {
    pub nodes: BTreeMap<String, Node>,
    #[serde(rename = "links")]
    edges: Vec<Edge>,
    /// `(source, target)` of every entry in `edges`.
    #[serde(skip)]
    edge_keys: HashSet<(String, String)>,
}

#[derive(Deserialize)]
struct GraphRecord {
    nodes: BTreeMap<String, Node>,
    links: Vec<Edge>,
}

impl From<GraphRecord> for Graph {
    fn from(record: GraphRecord) -> Self {
        let edge_keys = record
            .links
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        Self {
            nodes: record.nodes,
            edges: record.links,
            edge_keys,
        }
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the node with the same id.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Adds `source -> target` and returns whether the edge was added. Self edges,
    /// duplicates and edges to unknown nodes are ignored.
    pub fn add_edge(&mut self, source: &str, target: &str, required: bool) -> bool {
        if source.is_empty() || target.is_empty() || source == target {
            return false;
        }
        if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
            return false;
        }
        if !self
            .edge_keys
            .insert((source.to_string(), target.to_string()))
        {
            return false;
        }
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            required,
        });
        true
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edge_keys
            .contains(&(source.to_string(), target.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_node(Node::present(id, id, "1.0"));
        }
        graph
    }

    #[test]
    fn test_edge_to_missing_node_is_noop() {
        let mut graph = graph_with(&["a"]);
        assert!(!graph.add_edge("a", "ghost", true));
        assert!(!graph.add_edge("ghost", "a", true));
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_duplicate_and_self_edges_are_noops() {
        let mut graph = graph_with(&["a", "b"]);
        assert!(graph.add_edge("a", "b", true));
        assert!(!graph.add_edge("a", "b", false));
        assert!(!graph.add_edge("a", "a", true));
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.edges[0].required);
        assert!(graph.has_edge("a", "b"));
        assert!(!graph.has_edge("b", "a"));
    }

    #[test]
    fn test_serializes_edges_as_links() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_edge("a", "b", false);
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["links"][0]["source"], "a");
        assert_eq!(json["nodes"]["b"]["present"], true);
    }

    #[test]
    fn test_deserialized_graph_still_rejects_duplicates() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_edge("a", "b", true);
        let json = serde_json::to_string(&graph).unwrap();

        let mut loaded: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, graph);
        assert!(loaded.has_edge("a", "b"));
        assert!(!loaded.add_edge("a", "b", false));
        assert!(loaded.add_edge("b", "a", false));
    }
}
