use std::collections::{BTreeMap, HashMap};

use super::{Link, Node};

const MAX_RADIUS_FACTOR: f32 = 2.5;

/// Incident link count per node id, in one pass over the links.
///
/// Self-links count once. Ids that appear only in links are ignored.
pub fn connection_counts(nodes: &[Node], links: &[Link]) -> HashMap<String, usize> {
    let mut counts = nodes
        .iter()
        .map(|node| (node.id.clone(), 0usize))
        .collect::<HashMap<_, _>>();

    for link in links {
        if let Some(count) = counts.get_mut(&link.source_id) {
            *count += 1;
        }
        if link.target_id != link.source_id
            && let Some(count) = counts.get_mut(&link.target_id)
        {
            *count += 1;
        }
    }

    counts
}

/// Square-root connectivity scale, bounded to `[base, base * 2.5]`.
#[derive(Clone, Debug)]
pub struct SizeScale {
    counts: HashMap<String, usize>,
    max_count: usize,
    base_size: f32,
}

impl SizeScale {
    pub fn build(nodes: &[Node], links: &[Link], base_size: f32) -> Self {
        let counts = connection_counts(nodes, links);
        let max_count = counts.values().copied().max().unwrap_or(0);
        let base_size = if base_size.is_finite() && base_size > 0.0 {
            base_size
        } else {
            4.0
        };

        Self {
            counts,
            max_count,
            base_size,
        }
    }

    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    pub fn max_radius(&self) -> f32 {
        self.base_size * MAX_RADIUS_FACTOR
    }

    pub fn connections(&self, id: &str) -> usize {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Connectivity normalized to `[0, 1]` against the best connected node.
    pub fn importance(&self, id: &str) -> f32 {
        if self.max_count == 0 {
            return 0.0;
        }
        self.connections(id) as f32 / self.max_count as f32
    }

    pub fn radius_for_count(&self, count: usize) -> f32 {
        if count == 0 || self.max_count == 0 {
            return self.base_size;
        }

        let t = (count.min(self.max_count) as f32 / self.max_count as f32).sqrt();
        self.base_size * (1.0 + (MAX_RADIUS_FACTOR - 1.0) * t)
    }

    pub fn radius(&self, node: &Node) -> f32 {
        self.radius_for_count(self.connections(&node.id))
    }
}

/// Presentation read-out for the metrics panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub link_count: usize,
    /// Directed density, `E / (N (N - 1))`.
    pub density: f64,
    pub average_degree: f64,
    pub most_connected: Option<(String, usize)>,
    pub type_counts: BTreeMap<String, usize>,
}

impl GraphMetrics {
    pub fn compute(nodes: &[Node], links: &[Link]) -> Self {
        let node_count = nodes.len();
        let link_count = links.len();

        let density = if node_count < 2 {
            0.0
        } else {
            link_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        };
        let average_degree = if node_count == 0 {
            0.0
        } else {
            (2 * link_count) as f64 / node_count as f64
        };

        let counts = connection_counts(nodes, links);
        let mut most_connected: Option<(String, usize)> = None;
        for node in nodes {
            let count = counts.get(&node.id).copied().unwrap_or(0);
            if most_connected
                .as_ref()
                .is_none_or(|(_, best)| count > *best)
            {
                most_connected = Some((node.id.clone(), count));
            }
        }

        let mut type_counts = BTreeMap::new();
        for node in nodes {
            *type_counts.entry(node.type_tag.clone()).or_insert(0) += 1;
        }

        Self {
            node_count,
            link_count,
            density,
            average_degree,
            most_connected,
            type_counts,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} nodes · {} links · density {:.4} · avg degree {:.2}",
            self.node_count, self.link_count, self.density, self.average_degree
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> (Vec<Node>, Vec<Link>) {
        let nodes = ["hub", "a", "b", "c", "d", "lonely"]
            .iter()
            .map(|id| Node::new(*id, *id, "t"))
            .collect::<Vec<_>>();
        let links = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Link::new("hub", *id, "R"))
            .collect::<Vec<_>>();
        (nodes, links)
    }

    #[test]
    fn counts_incident_links() {
        let (nodes, links) = star();
        let counts = connection_counts(&nodes, &links);
        assert_eq!(counts["hub"], 4);
        assert_eq!(counts["a"], 1);
        assert_eq!(counts["lonely"], 0);
    }

    #[test]
    fn size_scale_is_bounded_and_monotonic() {
        let (nodes, links) = star();
        let scale = SizeScale::build(&nodes, &links, 4.0);

        assert_eq!(scale.radius(&nodes[5]), 4.0);
        assert_eq!(scale.radius(&nodes[0]), 10.0);

        let mut previous = 0.0;
        for count in 0..=4 {
            let radius = scale.radius_for_count(count);
            assert!(radius >= previous);
            assert!((4.0..=10.0).contains(&radius));
            previous = radius;
        }
    }

    #[test]
    fn degenerate_base_size_falls_back() {
        let (nodes, links) = star();
        let scale = SizeScale::build(&nodes, &links, f32::NAN);
        assert!(scale.base_size() > 0.0);
    }

    #[test]
    fn metrics_read_out() {
        let (nodes, links) = star();
        let metrics = GraphMetrics::compute(&nodes, &links);
        assert_eq!(metrics.node_count, 6);
        assert_eq!(metrics.link_count, 4);
        assert!((metrics.density - 4.0 / 30.0).abs() < 1e-9);
        assert_eq!(metrics.most_connected, Some(("hub".to_owned(), 4)));
        assert_eq!(metrics.type_counts.get("t"), Some(&6));
    }
}
