//! User-facing settings, deserialized from partial JSON with defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::FilterConfig;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub filter: FilterConfig,
    pub visual: VisualSettings,
    pub layout: LayoutTuning,
    pub reveal: RevealSettings,
    pub navigation: NavigationSettings,
}

impl EngineSettings {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Toggles owned by the surrounding page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualSettings {
    pub show_labels: bool,
    pub cluster_by_type: bool,
    pub dark_mode: bool,
    pub show_relationship_labels: bool,
    /// Radius of an unconnected node, in world units.
    pub node_size_base: f32,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            show_labels: true,
            cluster_by_type: false,
            dark_mode: true,
            show_relationship_labels: false,
            node_size_base: 5.0,
        }
    }
}

impl VisualSettings {
    pub fn node_size_base(&self) -> f32 {
        if self.node_size_base.is_finite() && self.node_size_base > 0.0 {
            self.node_size_base.clamp(1.0, 40.0)
        } else {
            Self::default().node_size_base
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutTuning {
    pub link_distance_scale: f32,
    pub charge_scale: f32,
    /// Above this many nodes the layout settles before it is shown.
    pub large_graph_threshold: usize,
    /// Time budget for one synchronous settle chunk.
    pub settle_budget_ms: u64,
    /// Ceiling on ticks without settling before the layout is force-stopped.
    pub max_ticks: usize,
    /// Run the simulation on a worker thread.
    pub offload: bool,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            link_distance_scale: 1.0,
            charge_scale: 1.0,
            large_graph_threshold: 500,
            settle_budget_ms: 12,
            max_ticks: 3000,
            offload: false,
        }
    }
}

impl LayoutTuning {
    pub fn link_distance_scale(&self) -> f32 {
        sanitize_scale(self.link_distance_scale)
    }

    pub fn charge_scale(&self) -> f32 {
        sanitize_scale(self.charge_scale)
    }

    pub fn settle_budget(&self) -> Duration {
        Duration::from_millis(self.settle_budget_ms.clamp(1, 50))
    }
}

fn sanitize_scale(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value.clamp(0.25, 4.0)
    } else {
        1.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevealSettings {
    pub enabled: bool,
    /// Visible sets up to this size are shown at once.
    pub threshold: usize,
    pub batch_size: usize,
    pub interval_ms: u64,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 200,
            batch_size: 50,
            interval_ms: 120,
        }
    }
}

impl RevealSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigationSettings {
    /// Wrap to the opposite end instead of stopping at the boundary.
    pub wrap: bool,
    /// Hops used to enrich focus announcements.
    pub announce_depth: usize,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            wrap: false,
            announce_depth: 2,
        }
    }
}
