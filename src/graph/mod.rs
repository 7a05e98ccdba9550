//! Graph data model: nodes, links and the immutable dataset the engine consumes.

mod metrics;

use std::collections::{HashMap, HashSet};

use emath::Vec2;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use metrics::{GraphMetrics, SizeScale, connection_counts};

fn default_type_tag() -> String {
    "entity".to_owned()
}

fn default_relation_type() -> String {
    "RELATED_TO".to_owned()
}

/// A graph vertex. Runtime fields are skipped by serde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default, alias = "name", alias = "label")]
    pub display_name: String,
    #[serde(default = "default_type_tag", alias = "type", alias = "group")]
    pub type_tag: String,
    #[serde(skip)]
    pub position: Vec2,
    #[serde(skip)]
    pub velocity: Vec2,
    /// Set while the node is held by a drag; the simulator leaves it alone.
    #[serde(skip)]
    pub pinned_position: Option<Vec2>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            type_tag: type_tag.into(),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            pinned_position: None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_position.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(alias = "source")]
    pub source_id: String,
    #[serde(alias = "target")]
    pub target_id: String,
    #[serde(default = "default_relation_type", alias = "type", alias = "label")]
    pub relation_type: String,
}

impl Link {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type: relation_type.into(),
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    /// The endpoint opposite to `id`, if `id` is one of the endpoints.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// What ingestion threw away to keep the dataset consistent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub duplicate_nodes: usize,
    pub dangling_links: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_nodes == 0 && self.dangling_links == 0
    }
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default, alias = "edges", alias = "relationships")]
    links: Vec<Link>,
}

impl From<RawDataset> for GraphDataset {
    fn from(raw: RawDataset) -> Self {
        Self::new(raw.nodes, raw.links)
    }
}

/// An owned, sanitized set of nodes and links.
///
/// Node ids are unique and every link references two nodes of the set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "RawDataset")]
pub struct GraphDataset {
    nodes: Vec<Node>,
    links: Vec<Link>,
    #[serde(skip)]
    index_by_id: HashMap<String, usize>,
}

impl GraphDataset {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        Self::ingest(nodes, links).0
    }

    /// Builds a dataset, dropping duplicate node ids (first one wins) and links
    /// whose endpoints are unknown.
    pub fn ingest(nodes: Vec<Node>, links: Vec<Link>) -> (Self, IngestReport) {
        let mut report = IngestReport::default();
        let mut index_by_id = HashMap::with_capacity(nodes.len());
        let mut kept_nodes = Vec::with_capacity(nodes.len());

        for mut node in nodes {
            if index_by_id.contains_key(&node.id) {
                report.duplicate_nodes += 1;
                continue;
            }
            if node.display_name.trim().is_empty() {
                node.display_name = node.id.clone();
            }
            index_by_id.insert(node.id.clone(), kept_nodes.len());
            kept_nodes.push(node);
        }

        let kept_links = links
            .into_iter()
            .filter(|link| {
                let known = index_by_id.contains_key(&link.source_id)
                    && index_by_id.contains_key(&link.target_id);
                if !known {
                    report.dangling_links += 1;
                }
                known
            })
            .collect::<Vec<_>>();

        if !report.is_clean() {
            warn!(
                duplicate_nodes = report.duplicate_nodes,
                dangling_links = report.dangling_links,
                "dropped inconsistent elements while ingesting dataset"
            );
        }

        (
            Self {
                nodes: kept_nodes,
                links: kept_links,
                index_by_id,
            },
            report,
        )
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).and_then(|index| self.nodes.get(index))
    }
}

/// Keeps, in input order, the links whose endpoints are both in `nodes`.
///
/// Shared by the sampler and the reveal scheduler so both views agree.
pub fn links_between(nodes: &[Node], links: &[Link]) -> Vec<Link> {
    let present = nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();

    links
        .iter()
        .filter(|link| {
            present.contains(link.source_id.as_str()) && present.contains(link.target_id.as_str())
        })
        .cloned()
        .collect()
}
