use tracing::debug;

use crate::settings::EngineSettings;

/// Steps run before showing a large graph.
pub const LARGE_GRAPH_ITERATIONS: usize = 200;
const COLLISION_PADDING: f32 = 2.0;

/// Simulation constants for one layout pass. Derived, never edited in place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceParameters {
    pub link_distance: f32,
    /// Repulsion magnitude between two bodies (always positive).
    pub charge_strength: f32,
    /// Upper bound on a body's collision radius.
    pub collision_radius: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    pub alpha_min: f32,
    /// Steps of the synchronous settle; unused in interactive mode.
    pub iterations: usize,
    pub settle_synchronously: bool,
    pub cluster_by_type: bool,
    pub max_ticks: usize,
}

/// `1` for tiny graphs, falling toward `0` as the graph grows.
fn sparsity(node_count: usize) -> f32 {
    1.0 / (1.0 + node_count as f32 / 100.0).sqrt()
}

/// Derives simulation constants from the element count.
///
/// Link distance and charge shrink with `node_count`, alpha decay grows, and
/// graphs above the large-graph threshold settle before they are drawn.
pub fn optimize(node_count: usize, settings: &EngineSettings) -> ForceParameters {
    let tuning = &settings.layout;
    let sparsity = sparsity(node_count);
    let density = 1.0 - sparsity;
    let node_size_base = settings.visual.node_size_base();

    let params = ForceParameters {
        link_distance: (30.0 + 90.0 * sparsity) * tuning.link_distance_scale(),
        charge_strength: (30.0 + 270.0 * sparsity) * tuning.charge_scale(),
        collision_radius: node_size_base * 2.5 + COLLISION_PADDING,
        alpha_decay: 0.0228 + 0.05 * density,
        velocity_decay: 0.4 + 0.2 * density,
        alpha_min: 0.001,
        iterations: LARGE_GRAPH_ITERATIONS,
        settle_synchronously: node_count > tuning.large_graph_threshold,
        cluster_by_type: settings.visual.cluster_by_type,
        max_ticks: tuning.max_ticks.max(LARGE_GRAPH_ITERATIONS),
    };

    debug!(node_count, ?params, "derived force parameters");
    params
}

impl ForceParameters {
    pub fn collision_padding(&self) -> f32 {
        COLLISION_PADDING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_monotone_in_node_count() {
        let settings = EngineSettings::default();
        let mut previous = optimize(0, &settings);

        for node_count in [1, 10, 50, 200, 501, 1000, 5000, 20_000] {
            let next = optimize(node_count, &settings);
            assert!(next.link_distance <= previous.link_distance);
            assert!(next.charge_strength <= previous.charge_strength);
            assert!(next.alpha_decay >= previous.alpha_decay);
            assert_eq!(next.collision_radius, previous.collision_radius);
            previous = next;
        }
    }

    #[test]
    fn large_graphs_settle_synchronously() {
        let settings = EngineSettings::default();
        assert!(!optimize(500, &settings).settle_synchronously);

        let large = optimize(501, &settings);
        assert!(large.settle_synchronously);
        assert!((150..=300).contains(&large.iterations));

        // The settle finishes cooling within its iteration budget.
        let ticks_to_cool = (large.alpha_min.ln() / (1.0 - large.alpha_decay).ln()).ceil();
        assert!(ticks_to_cool as usize <= large.iterations);
    }

    #[test]
    fn collision_radius_follows_node_size() {
        let mut settings = EngineSettings::default();
        settings.visual.node_size_base = 4.0;
        let small = optimize(100, &settings);
        settings.visual.node_size_base = 8.0;
        let large = optimize(100, &settings);

        assert!(large.collision_radius > small.collision_radius);
        assert!(small.collision_radius >= 4.0 * 2.5);
    }
}
