//! Zoom and element count in, rendering fidelity out.

use crate::settings::VisualSettings;

const BASE_LABEL_PX: f32 = 12.0;
const BASE_BORDER_PX: f32 = 1.5;
const EMPHASIS_BORDER_PX: f32 = 3.0;
const MAX_LABEL_THRESHOLD: f32 = 3.0;

/// How much detail to draw. Sizes are in world units unless noted, so the
/// canvas transform brings them back to a stable on-screen size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelOfDetailProfile {
    pub zoom: f32,
    pub show_labels: bool,
    pub show_relationship_labels: bool,
    pub label_font_size: f32,
    pub node_border_width: f32,
    pub link_opacity: f32,
    /// On-screen scale applied to a node's radius. Non-decreasing in zoom.
    pub node_radius_multiplier: f32,
}

/// Per-node drawing decisions after applying the focus/selection exemption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeDecoration {
    pub show_label: bool,
    pub border_width: f32,
    pub emphasized: bool,
}

fn sanitize_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() && zoom > 0.0 {
        zoom
    } else {
        1.0
    }
}

/// Zoom below which labels are hidden. Grows with the element count so dense
/// graphs drop labels sooner.
pub fn label_zoom_threshold(node_count: usize) -> f32 {
    let growth = (1.0 + node_count as f32 / 100.0).ln();
    (0.5 * (1.0 + growth)).min(MAX_LABEL_THRESHOLD)
}

pub fn compute_profile(zoom: f32, node_count: usize) -> LevelOfDetailProfile {
    let zoom = sanitize_zoom(zoom);
    let show_labels = zoom >= label_zoom_threshold(node_count);

    let count_opacity = (0.9 / (1.0 + node_count as f32 / 500.0).sqrt()).clamp(0.12, 0.9);
    let zoom_opacity = 0.6 + 0.4 * zoom.clamp(0.0, 1.0);

    LevelOfDetailProfile {
        zoom,
        show_labels,
        show_relationship_labels: false,
        label_font_size: BASE_LABEL_PX / zoom,
        node_border_width: BASE_BORDER_PX / zoom,
        link_opacity: count_opacity * zoom_opacity,
        node_radius_multiplier: zoom.powf(0.4).clamp(0.35, 2.5),
    }
}

impl LevelOfDetailProfile {
    /// Applies the user toggles. They can only remove detail.
    pub fn with_toggles(mut self, visual: &VisualSettings) -> Self {
        self.show_labels &= visual.show_labels;
        self.show_relationship_labels = self.show_labels && visual.show_relationship_labels;
        self
    }

    /// Radius in world units for a node whose scaled radius is `radius`.
    pub fn world_radius(&self, radius: f32) -> f32 {
        radius * self.node_radius_multiplier / self.zoom
    }

    /// Focused and selected nodes always keep their label and get a heavier
    /// stroke.
    pub fn decorate(&self, focused: bool, selected: bool) -> NodeDecoration {
        let emphasized = focused || selected;
        NodeDecoration {
            show_label: self.show_labels || emphasized,
            border_width: if emphasized {
                EMPHASIS_BORDER_PX / self.zoom
            } else {
                self.node_border_width
            },
            emphasized,
        }
    }
}
