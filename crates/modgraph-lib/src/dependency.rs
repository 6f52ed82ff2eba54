use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{Dependency, Graph, ModMetadata, Node};
use crate::version::VersionConstraint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingDependency {
    pub mod_id: String,
    pub dependency_id: String,
    pub required: bool,
    pub version_range: VersionConstraint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionConflict {
    pub mod_id: String,
    pub dependency_id: String,
    pub required_range: VersionConstraint,
    pub actual_version: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyResult {
    pub graph: Graph,
    pub missing_dependencies: Vec<MissingDependency>,
    pub version_conflicts: Vec<VersionConflict>,
    pub circular_deps: Vec<Vec<String>>,
}

/// Mods keyed by id, last writer wins, plus the input positions that won.
fn index_mods(mods: &[ModMetadata]) -> (HashMap<&str, &ModMetadata>, Vec<&ModMetadata>) {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (i, m) in mods.iter().enumerate() {
        by_id.insert(m.id.as_str(), i);
    }
    let winners: Vec<&ModMetadata> = mods
        .iter()
        .enumerate()
        .filter(|(i, m)| by_id.get(m.id.as_str()) == Some(i))
        .map(|(_, m)| m)
        .collect();
    let lookup = winners.iter().map(|&m| (m.id.as_str(), m)).collect();
    (lookup, winners)
}

pub fn analyze(mods: &[ModMetadata]) -> DependencyResult {
    let (by_id, present) = index_mods(mods);
    let mut graph = Graph::new();
    for m in &present {
        graph.add_node(Node::present(&m.id, &m.name, &m.version));
    }

    let mut missing_dependencies = Vec::new();
    let mut version_conflicts = Vec::new();

    for m in &present {
        for dep in &m.dependencies {
            if dep.dependency_id == m.id {
                continue;
            }
            match by_id.get(dep.dependency_id.as_str()) {
                Some(target) => {
                    graph.add_edge(&m.id, &dep.dependency_id, dep.required);
                    if !dep.version_range.satisfies(&target.version) {
                        version_conflicts.push(VersionConflict {
                            mod_id: m.id.clone(),
                            dependency_id: dep.dependency_id.clone(),
                            required_range: dep.version_range.clone(),
                            actual_version: target.version.clone(),
                        });
                    }
                }
                None if m.embeds(&dep.dependency_id).is_some() => {
                    log::debug!(
                        "[DependencyAnalyzer] {} bundles its own copy of {}",
                        m.id,
                        dep.dependency_id
                    );
                }
                None => {
                    add_absent_requirement(&mut graph, dep);
                    graph.add_edge(&m.id, &dep.dependency_id, dep.required);
                    missing_dependencies.push(MissingDependency {
                        mod_id: m.id.clone(),
                        dependency_id: dep.dependency_id.clone(),
                        required: dep.required,
                        version_range: dep.version_range.clone(),
                    });
                }
            }
        }
    }

    let circular_deps = detect_cycles(&graph);
    log::info!(
        "[DependencyAnalyzer] {} nodes, {} edges, {} missing, {} version conflicts, {} cycles",
        graph.nodes.len(),
        graph.edges().len(),
        missing_dependencies.len(),
        version_conflicts.len(),
        circular_deps.len()
    );

    DependencyResult {
        graph,
        missing_dependencies,
        version_conflicts,
        circular_deps,
    }
}

/// Absent nodes accumulate the intersection of every range asked of them.
fn add_absent_requirement(graph: &mut Graph, dep: &Dependency) {
    if graph.node(&dep.dependency_id).is_none() {
        let mut node = Node::absent(&dep.dependency_id);
        node.required_version = dep.version_range.clone();
        node.required = dep.required;
        graph.add_node(node);
    } else if let Some(node) = graph.node_mut(&dep.dependency_id) {
        node.required_version = node.required_version.intersect(&dep.version_range);
        node.required |= dep.required;
    }
}

pub fn build_graph(mods: &[ModMetadata]) -> Graph {
    analyze(mods).graph
}

/// Elementary cycles found by an iterative depth-first search.
///
/// Roots are visited in id order and a node is never expanded twice, so a cycle that
/// is only reachable through an already finished node is not reported. Each cycle is
/// listed in traversal order starting from the node that closed it; rotations of a
/// cycle already found are dropped.
pub fn detect_cycles(graph: &Graph) -> Vec<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges() {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    let mut cycles = Vec::new();

    for root in graph.nodes.keys() {
        let root = root.as_str();
        if visited.contains(root) {
            continue;
        }

        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        let mut path: Vec<&str> = vec![root];
        let mut on_path: HashMap<&str, usize> = HashMap::from([(root, 0)]);
        visited.insert(root);

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let next = frame.1;
            let children = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);

            if next >= children.len() {
                stack.pop();
                path.pop();
                on_path.remove(node);
                continue;
            }
            frame.1 += 1;
            let child = children[next];

            if let Some(&start) = on_path.get(child) {
                let cycle = &path[start..];
                if seen.insert(canonical_rotation(cycle)) {
                    cycles.push(cycle.iter().map(|s| s.to_string()).collect());
                }
            } else if visited.insert(child) {
                on_path.insert(child, path.len());
                path.push(child);
                stack.push((child, 0));
            }
        }
    }

    cycles
}

fn canonical_rotation<'a>(cycle: &[&'a str]) -> Vec<&'a str> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..]
        .iter()
        .chain(cycle[..start].iter())
        .copied()
        .collect()
}

/// Ids of mods that declare a dependency on `mod_id`.
pub fn dependents_of(mod_id: &str, mods: &[ModMetadata]) -> Vec<String> {
    mods.iter()
        .filter(|m| m.dependencies.iter().any(|d| d.dependency_id == mod_id))
        .map(|m| m.id.clone())
        .collect()
}

pub fn dependencies_of(mod_id: &str, mods: &[ModMetadata]) -> Vec<Dependency> {
    mods.iter()
        .rev()
        .find(|m| m.id == mod_id)
        .map(|m| m.dependencies.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModIdentity;
    use crate::storage::memory::test_support::{requires, sample_mod};

    #[test]
    fn test_three_cycle_is_found_once() {
        let mods = vec![
            requires(sample_mod("a", "1.0", "ha"), "b", "", true),
            requires(sample_mod("b", "1.0", "hb"), "c", "", true),
            requires(sample_mod("c", "1.0", "hc"), "a", "", true),
        ];
        let result = analyze(&mods);
        assert_eq!(result.circular_deps, vec![vec!["a", "b", "c"]]);
        assert!(result.missing_dependencies.is_empty());
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let mods = vec![
            requires(requires(sample_mod("a", "1.0", "ha"), "b", "", true), "c", "", false),
            requires(sample_mod("b", "1.0", "hb"), "c", "", true),
            sample_mod("c", "1.0", "hc"),
        ];
        let result = analyze(&mods);
        assert!(result.circular_deps.is_empty());
        assert_eq!(result.graph.edges().len(), 3);
    }

    #[test]
    fn test_separate_cycles_share_traversal() {
        let mods = vec![
            requires(requires(sample_mod("a", "1", "1"), "b", "", true), "d", "", true),
            requires(sample_mod("b", "1", "2"), "a", "", true),
            requires(sample_mod("d", "1", "3"), "e", "", true),
            requires(sample_mod("e", "1", "4"), "d", "", true),
        ];
        let result = analyze(&mods);
        assert_eq!(
            result.circular_deps,
            vec![vec!["a".to_string(), "b".to_string()], vec!["d".to_string(), "e".to_string()]]
        );
    }

    #[test]
    fn test_missing_dependency_creates_absent_node() {
        let mods = vec![
            requires(sample_mod("m1", "1.0", "h1"), "m2", ">=1.0.0", true),
            requires(sample_mod("m3", "1.0", "h3"), "m2", "<3.0", false),
        ];
        let result = analyze(&mods);
        assert_eq!(result.missing_dependencies.len(), 2);
        let node = result.graph.node("m2").unwrap();
        assert!(!node.present);
        assert!(node.required);
        assert_eq!(node.required_version.format(), "[1.0.0,3.0)");
        assert!(result.graph.has_edge("m1", "m2"));
        assert!(result.graph.has_edge("m3", "m2"));
    }

    #[test]
    fn test_version_conflict_detected() {
        let mods = vec![
            requires(sample_mod("m1", "1.0", "h1"), "m2", "[1.0.0,2.0.0)", true),
            sample_mod("m2", "2.0.0", "h2"),
        ];
        let result = analyze(&mods);
        assert_eq!(result.version_conflicts.len(), 1);
        assert_eq!(result.version_conflicts[0].actual_version, "2.0.0");
        assert_eq!(result.version_conflicts[0].required_range.format(), "[1.0.0,2.0.0)");
    }

    #[test]
    fn test_embedded_dependency_is_silent() {
        let mut host = requires(sample_mod("host", "1.0", "h"), "bundled", ">=2.0", true);
        host.embedded.push(ModIdentity {
            id: "bundled".into(),
            version: "2.1".into(),
        });
        let result = analyze(&[host]);
        assert!(result.missing_dependencies.is_empty());
        assert!(result.graph.edges().is_empty());
        assert!(result.graph.node("bundled").is_none());
    }

    #[test]
    fn test_duplicate_ids_last_writer_wins() {
        let mods = vec![
            requires(sample_mod("dup", "1.0", "h1"), "ghost", "", true),
            sample_mod("dup", "2.0", "h2"),
        ];
        let result = analyze(&mods);
        assert_eq!(result.graph.node("dup").unwrap().version, "2.0");
        assert!(result.missing_dependencies.is_empty());
        assert_eq!(dependencies_of("dup", &mods).len(), 0);
    }

    #[test]
    fn test_dependents_of() {
        let mods = vec![
            requires(sample_mod("a", "1", "1"), "lib", "", true),
            requires(sample_mod("b", "1", "2"), "lib", "", false),
            sample_mod("lib", "1", "3"),
        ];
        assert_eq!(dependents_of("lib", &mods), vec!["a", "b"]);
    }
}
