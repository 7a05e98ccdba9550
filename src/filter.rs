//! Bounded, connectivity-aware sampling of a dataset around a focus node.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{GraphDataset, Link, Node, connection_counts, links_between};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    pub focus_id: Option<String>,
    /// Values `<= 0` mean "no limit".
    pub max_visible_nodes: i64,
    /// Normalized connectivity cutoff in `[0, 1]` for nodes picked by importance.
    pub importance_threshold: f32,
    /// Number of neighbor rings around the focus ranked ahead of the rest.
    pub max_relationship_depth: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            focus_id: None,
            max_visible_nodes: 300,
            importance_threshold: 0.0,
            max_relationship_depth: 1,
        }
    }
}

impl FilterConfig {
    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.max_visible_nodes)
            .ok()
            .filter(|&limit| limit > 0)
    }

    pub fn threshold(&self) -> f32 {
        if self.importance_threshold.is_nan() {
            0.0
        } else {
            self.importance_threshold.clamp(0.0, 1.0)
        }
    }
}

/// The node/link subset chosen for one rendering pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    /// Whether the sampler dropped anything.
    pub sampled: bool,
}

impl VisibleGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }
}

/// Picks at most `config.max_visible_nodes` nodes (the focus always survives)
/// and the links among them. Output order is deterministic: focus, neighbor
/// rings, then the remaining nodes by connection count, ties by input order.
pub fn select(dataset: &GraphDataset, focus_id: Option<&str>, config: &FilterConfig) -> VisibleGraph {
    let nodes = dataset.nodes();
    let Some(limit) = config.limit().filter(|&limit| nodes.len() > limit) else {
        return VisibleGraph {
            nodes: nodes.to_vec(),
            links: dataset.links().to_vec(),
            sampled: false,
        };
    };

    let count_by_id = connection_counts(nodes, dataset.links());
    let counts = nodes
        .iter()
        .map(|node| count_by_id.get(&node.id).copied().unwrap_or(0))
        .collect::<Vec<_>>();
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let by_connectivity = |a: &usize, b: &usize| counts[*b].cmp(&counts[*a]).then(a.cmp(b));

    let mut chosen = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(limit);

    let focus_index = focus_id.and_then(|id| dataset.index_of(id));
    if let Some(id) = focus_id
        && focus_index.is_none()
    {
        debug!(focus = id, "focus not in dataset, ranking by importance only");
    }

    if let Some(focus_index) = focus_index {
        chosen[focus_index] = true;
        order.push(focus_index);

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for link in dataset.links() {
            if let (Some(source), Some(target)) = (
                dataset.index_of(&link.source_id),
                dataset.index_of(&link.target_id),
            ) && source != target
            {
                adjacency[source].push(target);
                adjacency[target].push(source);
            }
        }

        let mut queued = vec![false; nodes.len()];
        queued[focus_index] = true;
        let mut frontier = vec![focus_index];

        for _ in 0..config.max_relationship_depth {
            if order.len() >= limit || frontier.is_empty() {
                break;
            }

            let mut ring = Vec::new();
            for &index in &frontier {
                for &neighbor in &adjacency[index] {
                    if !queued[neighbor] {
                        queued[neighbor] = true;
                        ring.push(neighbor);
                    }
                }
            }
            ring.sort_by(by_connectivity);

            for &index in &ring {
                if order.len() >= limit {
                    break;
                }
                chosen[index] = true;
                order.push(index);
            }
            frontier = ring;
        }
    }

    let threshold = config.threshold();
    let mut rest = (0..nodes.len())
        .filter(|&index| !chosen[index])
        .filter(|&index| {
            let importance = if max_count == 0 {
                0.0
            } else {
                counts[index] as f32 / max_count as f32
            };
            importance >= threshold
        })
        .collect::<Vec<_>>();
    rest.sort_by(by_connectivity);

    for index in rest {
        if order.len() >= limit {
            break;
        }
        order.push(index);
    }

    let visible_nodes = order
        .into_iter()
        .map(|index| nodes[index].clone())
        .collect::<Vec<_>>();
    let visible_links = links_between(&visible_nodes, dataset.links());

    debug!(
        total = nodes.len(),
        visible = visible_nodes.len(),
        links = visible_links.len(),
        "sampled visible graph"
    );

    VisibleGraph {
        nodes: visible_nodes,
        links: visible_links,
        sampled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: usize) -> GraphDataset {
        let nodes = (0..len)
            .map(|index| Node::new(format!("n{index}"), format!("Node {index}"), "t"))
            .collect::<Vec<_>>();
        let links = (1..len)
            .map(|index| Link::new(format!("n{}", index - 1), format!("n{index}"), "NEXT"))
            .collect::<Vec<_>>();
        GraphDataset::new(nodes, links)
    }

    fn ids(graph: &VisibleGraph) -> Vec<&str> {
        graph.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn small_dataset_is_returned_unchanged() {
        let dataset = chain(5);
        let config = FilterConfig {
            max_visible_nodes: 10,
            ..FilterConfig::default()
        };

        let visible = select(&dataset, Some("n2"), &config);
        assert!(!visible.sampled);
        assert_eq!(visible.nodes, dataset.nodes());
        assert_eq!(visible.links, dataset.links());
    }

    #[test]
    fn non_positive_limit_means_no_limit() {
        let dataset = chain(50);
        for limit in [0, -3] {
            let config = FilterConfig {
                max_visible_nodes: limit,
                ..FilterConfig::default()
            };
            assert_eq!(select(&dataset, None, &config).node_count(), 50);
        }
    }

    #[test]
    fn focus_survives_tiny_limit() {
        let dataset = chain(20);
        let config = FilterConfig {
            max_visible_nodes: 1,
            ..FilterConfig::default()
        };

        let visible = select(&dataset, Some("n19"), &config);
        assert_eq!(ids(&visible), vec!["n19"]);
        assert!(visible.links.is_empty());
    }

    #[test]
    fn neighbor_rings_come_before_importance() {
        let dataset = chain(30);
        let config = FilterConfig {
            max_visible_nodes: 5,
            max_relationship_depth: 2,
            ..FilterConfig::default()
        };

        let visible = select(&dataset, Some("n10"), &config);
        assert_eq!(ids(&visible), vec!["n10", "n9", "n11", "n8", "n12"]);
        assert_eq!(visible.links.len(), 4);
    }

    #[test]
    fn unknown_focus_falls_back_to_importance() {
        let dataset = chain(10);
        let config = FilterConfig {
            max_visible_nodes: 3,
            ..FilterConfig::default()
        };

        let visible = select(&dataset, Some("missing"), &config);
        // Interior nodes all have two links; input order breaks the tie.
        assert_eq!(ids(&visible), vec!["n1", "n2", "n3"]);
    }

    #[test]
    fn importance_threshold_excludes_weak_nodes() {
        let dataset = chain(10);
        let config = FilterConfig {
            max_visible_nodes: 9,
            importance_threshold: 1.0,
            ..FilterConfig::default()
        };

        let visible = select(&dataset, None, &config);
        assert_eq!(visible.node_count(), 8);
        assert!(!ids(&visible).contains(&"n0"));
        assert!(!ids(&visible).contains(&"n9"));
    }

    #[test]
    fn empty_dataset_yields_empty_selection() {
        let dataset = GraphDataset::default();
        let config = FilterConfig {
            max_visible_nodes: 1,
            ..FilterConfig::default()
        };
        let visible = select(&dataset, Some("x"), &config);
        assert!(visible.nodes.is_empty());
        assert!(visible.links.is_empty());
    }
}
