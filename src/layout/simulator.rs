use std::collections::HashMap;
use std::time::{Duration, Instant};

use emath::{Vec2, vec2};
use tracing::{debug, warn};

use crate::graph::{Link, Node, SizeScale};
use crate::util::stable_pair;

use super::ForceParameters;
use super::forces::{accumulate_charge, accumulate_collisions};
use super::quadtree::BodyTree;

const SETTLING_ALPHA: f32 = 0.1;
const DRAG_ALPHA_TARGET: f32 = 0.3;
const COLLISION_STRENGTH: f32 = 0.7;
const CENTER_STRENGTH: f32 = 0.03;
const CLUSTER_STRENGTH: f32 = 0.1;
const MAX_SPEED: f32 = 80.0;
const INITIAL_RADIUS: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Idle,
    Running,
    /// Still moving, alpha below the settling threshold.
    Settling,
    Settled,
}

impl SimulationState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Settling)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Positions changed and the simulation keeps going.
    Moved,
    /// Positions changed for the last time.
    Settled,
    /// Nothing was written.
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleProgress {
    Pending { completed: usize, total: usize },
    Done,
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    deltas: Vec<Vec2>,
    centroids: Vec<(Vec2, f32)>,
}

/// Force-directed layout over an owned copy of the visible nodes.
///
/// Links are resolved to index pairs once; callers only ever see ids.
pub struct LayoutSimulator {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
    edge_strength: Vec<(f32, f32)>,
    radii: Vec<f32>,
    groups: Vec<usize>,
    group_count: usize,
    params: ForceParameters,
    alpha: f32,
    alpha_target: f32,
    state: SimulationState,
    ticks: usize,
    settle_steps: usize,
    partial: bool,
    revision: u64,
    scratch: Scratch,
}

impl LayoutSimulator {
    pub fn new(
        nodes: Vec<Node>,
        links: &[Link],
        size_scale: &SizeScale,
        params: ForceParameters,
    ) -> Self {
        let mut nodes = nodes;
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();

        let edges = links
            .iter()
            .filter_map(|link| {
                Some((
                    *index_by_id.get(&link.source_id)?,
                    *index_by_id.get(&link.target_id)?,
                ))
            })
            .filter(|(source, target)| source != target)
            .collect::<Vec<_>>();

        let mut degree = vec![0usize; nodes.len()];
        for &(source, target) in &edges {
            degree[source] += 1;
            degree[target] += 1;
        }
        let edge_strength = edges
            .iter()
            .map(|&(source, target)| {
                let (source_degree, target_degree) = (degree[source] as f32, degree[target] as f32);
                let strength = 1.0 / source_degree.min(target_degree).max(1.0);
                let bias = source_degree / (source_degree + target_degree);
                (strength, bias)
            })
            .collect::<Vec<_>>();

        let radii = nodes
            .iter()
            .map(|node| {
                (size_scale.radius(node) + params.collision_padding()).min(params.collision_radius)
            })
            .collect::<Vec<_>>();

        let mut group_by_type = HashMap::new();
        let groups = nodes
            .iter()
            .map(|node| {
                let next = group_by_type.len();
                *group_by_type.entry(node.type_tag.clone()).or_insert(next)
            })
            .collect::<Vec<_>>();

        let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
        for (index, node) in nodes.iter_mut().enumerate() {
            let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
            let angle = index as f32 * golden_angle;
            let (jx, jy) = stable_pair(&node.id);
            node.position = vec2(angle.cos(), angle.sin()) * radius + vec2(jx, jy) * 2.0;
            node.velocity = Vec2::ZERO;
            node.pinned_position = None;
        }

        Self {
            nodes,
            index_by_id,
            edges,
            edge_strength,
            radii,
            groups,
            group_count: group_by_type.len(),
            params,
            alpha: 1.0,
            alpha_target: 0.0,
            state: SimulationState::Idle,
            ticks: 0,
            settle_steps: 0,
            partial: false,
            revision: 0,
            scratch: Scratch::default(),
        }
    }

    /// Copies positions from a previous layout by id. Nodes without a seed are
    /// placed next to a seeded neighbor when one exists.
    pub fn seed_positions(&mut self, seed: &HashMap<String, Vec2>) {
        let mut seeded = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if let Some(position) = seed.get(&node.id).filter(|p| p.x.is_finite() && p.y.is_finite())
            {
                node.position = *position;
                seeded[index] = true;
            }
        }

        for &(source, target) in &self.edges {
            let (anchor, placed) = match (seeded[source], seeded[target]) {
                (true, false) => (source, target),
                (false, true) => (target, source),
                _ => continue,
            };
            let (jx, jy) = stable_pair(&self.nodes[placed].id);
            let offset = vec2(jx, jy) * (self.params.link_distance * 0.5);
            self.nodes[placed].position = self.nodes[anchor].position + offset;
            seeded[placed] = true;
        }
    }

    /// `idle`/`settled` → `running` with a full alpha.
    pub fn start(&mut self) {
        self.reheat(1.0);
    }

    pub fn reheat(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(self.params.alpha_min, 1.0);
        self.ticks = 0;
        self.settle_steps = 0;
        self.partial = false;
        if self.nodes.is_empty() {
            self.state = SimulationState::Settled;
            return;
        }
        self.state = SimulationState::Running;
        debug!(nodes = self.nodes.len(), alpha = self.alpha, "layout running");
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn params(&self) -> &ForceParameters {
        &self.params
    }

    /// Set when the layout was force-stopped before cooling down.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Bumped on every position write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn position_of(&self, id: &str) -> Option<Vec2> {
        self.index_by_id.get(id).map(|&index| self.nodes[index].position)
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.nodes.iter().map(|node| node.position).collect()
    }

    pub fn snapshot(&self) -> HashMap<String, Vec2> {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.position))
            .collect()
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) -> StepOutcome {
        if !self.state.is_active() {
            return StepOutcome::Idle;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.params.alpha_decay;
        self.integrate();
        self.ticks += 1;
        self.revision = self.revision.wrapping_add(1);

        if self.alpha < self.params.alpha_min {
            self.state = SimulationState::Settled;
            debug!(ticks = self.ticks, "layout settled");
            return StepOutcome::Settled;
        }

        if self.ticks >= self.params.max_ticks {
            self.state = SimulationState::Settled;
            self.partial = true;
            warn!(
                ticks = self.ticks,
                alpha = self.alpha,
                "layout did not converge, stopping with a partial layout"
            );
            return StepOutcome::Settled;
        }

        self.state = if self.alpha < SETTLING_ALPHA {
            SimulationState::Settling
        } else {
            SimulationState::Running
        };
        StepOutcome::Moved
    }

    /// Runs the non-animated settle for at most `budget`, resuming where the
    /// previous call stopped. At least one step runs per call.
    pub fn settle(&mut self, budget: Duration) -> SettleProgress {
        let total = self.params.iterations;
        let started = Instant::now();

        while self.state.is_active() && self.settle_steps < total {
            self.step();
            self.settle_steps += 1;
            if started.elapsed() >= budget {
                break;
            }
        }

        if self.state.is_active() && self.settle_steps >= total {
            self.state = SimulationState::Settled;
            self.partial = self.alpha >= self.params.alpha_min;
            if self.partial {
                warn!(alpha = self.alpha, "settle ran out of iterations");
            }
        }

        if self.state.is_active() {
            SettleProgress::Pending {
                completed: self.settle_steps,
                total,
            }
        } else {
            SettleProgress::Done
        }
    }

    /// Pins `id` at `at` and keeps the layout warm while it is held.
    pub fn begin_drag(&mut self, id: &str, at: Vec2) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };

        self.pin(index, at);
        self.alpha_target = DRAG_ALPHA_TARGET;
        if !self.state.is_active() {
            self.state = SimulationState::Running;
            self.alpha = self.alpha.max(self.params.alpha_min * 2.0);
        }
        self.ticks = 0;
        self.partial = false;
        true
    }

    pub fn drag_to(&mut self, id: &str, at: Vec2) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        if !self.nodes[index].is_pinned() {
            return false;
        }

        self.pin(index, at);
        self.ticks = 0;
        true
    }

    /// Releases the pin; the layout cools down once no node is held.
    pub fn end_drag(&mut self, id: &str) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        if self.nodes[index].pinned_position.take().is_none() {
            return false;
        }

        if !self.nodes.iter().any(Node::is_pinned) {
            self.alpha_target = 0.0;
        }
        true
    }

    pub fn is_dragging(&self, id: &str) -> bool {
        self.index_by_id
            .get(id)
            .is_some_and(|&index| self.nodes[index].is_pinned())
    }

    /// Held nodes and their anchors.
    pub fn pins(&self) -> HashMap<String, Vec2> {
        self.nodes
            .iter()
            .filter_map(|node| Some((node.id.clone(), node.pinned_position?)))
            .collect()
    }

    fn pin(&mut self, index: usize, at: Vec2) {
        if !(at.x.is_finite() && at.y.is_finite()) {
            return;
        }
        let node = &mut self.nodes[index];
        node.pinned_position = Some(at);
        node.position = at;
        node.velocity = Vec2::ZERO;
        self.revision = self.revision.wrapping_add(1);
    }

    fn integrate(&mut self) {
        let node_count = self.nodes.len();
        if node_count == 0 {
            return;
        }

        let alpha = self.alpha;
        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch
            .positions
            .extend(self.nodes.iter().map(|node| node.position));
        scratch.deltas.clear();
        scratch.deltas.resize(node_count, Vec2::ZERO);
        let positions = &scratch.positions;
        let deltas = &mut scratch.deltas;

        for (&(source, target), &(strength, bias)) in self.edges.iter().zip(&self.edge_strength) {
            let delta = (positions[target] + self.nodes[target].velocity)
                - (positions[source] + self.nodes[source].velocity);
            let distance = delta.length().max(0.01);
            let pull =
                delta * ((distance - self.params.link_distance) / distance * alpha * strength);
            deltas[target] -= pull * bias;
            deltas[source] += pull * (1.0 - bias);
        }

        if let Some(tree) = BodyTree::build(positions, &self.radii) {
            let root = tree.root();
            for (index, delta) in deltas.iter_mut().enumerate() {
                let mut charge = Vec2::ZERO;
                accumulate_charge(&tree, root, index, positions, self.params.charge_strength, &mut charge);
                *delta += charge * alpha;
            }
            accumulate_collisions(
                &tree,
                (root, root),
                true,
                positions,
                &self.radii,
                COLLISION_STRENGTH,
                deltas,
            );
        }

        for (index, delta) in deltas.iter_mut().enumerate() {
            *delta -= positions[index] * (CENTER_STRENGTH * alpha);
        }

        if self.params.cluster_by_type {
            cluster_pull(
                positions,
                &self.groups,
                self.group_count,
                CLUSTER_STRENGTH * alpha,
                &mut scratch.centroids,
                deltas,
            );
        }

        let retain = 1.0 - self.params.velocity_decay;
        for (node, delta) in self.nodes.iter_mut().zip(deltas.iter()) {
            if let Some(pinned) = node.pinned_position {
                node.position = pinned;
                node.velocity = Vec2::ZERO;
                continue;
            }

            let mut velocity = (node.velocity + *delta) * retain;
            let speed = velocity.length();
            if !speed.is_finite() {
                velocity = Vec2::ZERO;
            } else if speed > MAX_SPEED {
                velocity *= MAX_SPEED / speed;
            }

            node.velocity = velocity;
            node.position += velocity;
        }
    }
}

/// Pulls each body toward the centroid of its group, computed from the
/// current positions.
fn cluster_pull(
    positions: &[Vec2],
    groups: &[usize],
    group_count: usize,
    strength: f32,
    centroids: &mut Vec<(Vec2, f32)>,
    deltas: &mut [Vec2],
) {
    centroids.clear();
    centroids.resize(group_count, (Vec2::ZERO, 0.0));
    for (position, &group) in positions.iter().zip(groups) {
        let entry = &mut centroids[group];
        entry.0 += *position;
        entry.1 += 1.0;
    }

    for ((position, &group), delta) in positions.iter().zip(groups).zip(deltas.iter_mut()) {
        let (sum, count) = centroids[group];
        if count < 2.0 {
            continue;
        }
        *delta += (sum / count - *position) * strength;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EngineSettings;

    fn ring(len: usize) -> (Vec<Node>, Vec<Link>) {
        let nodes = (0..len)
            .map(|index| Node::new(format!("n{index}"), format!("N{index}"), if index % 2 == 0 { "even" } else { "odd" }))
            .collect::<Vec<_>>();
        let links = (0..len)
            .map(|index| Link::new(format!("n{index}"), format!("n{}", (index + 1) % len), "R"))
            .collect::<Vec<_>>();
        (nodes, links)
    }

    fn simulator(len: usize) -> LayoutSimulator {
        let (nodes, links) = ring(len);
        let settings = EngineSettings::default();
        let scale = SizeScale::build(&nodes, &links, settings.visual.node_size_base());
        let params = super::super::optimize(len, &settings);
        LayoutSimulator::new(nodes, &links, &scale, params)
    }

    #[test]
    fn walks_through_every_state_and_stops_writing() {
        let mut sim = simulator(12);
        assert_eq!(sim.state(), SimulationState::Idle);
        assert_eq!(sim.step(), StepOutcome::Idle);

        sim.start();
        assert_eq!(sim.state(), SimulationState::Running);

        let mut saw_settling = false;
        let mut outcome = StepOutcome::Moved;
        for _ in 0..sim.params().max_ticks {
            outcome = sim.step();
            saw_settling |= sim.state() == SimulationState::Settling;
            if outcome == StepOutcome::Settled {
                break;
            }
        }

        assert_eq!(outcome, StepOutcome::Settled);
        assert!(saw_settling);
        assert!(!sim.is_partial());
        assert!(sim.alpha() < sim.params().alpha_min);

        let revision = sim.revision();
        let before = sim.positions();
        assert_eq!(sim.step(), StepOutcome::Idle);
        assert_eq!(sim.revision(), revision);
        assert_eq!(sim.positions(), before);
    }

    #[test]
    fn layout_spreads_nodes_apart() {
        let mut sim = simulator(10);
        sim.start();
        while sim.step() != StepOutcome::Settled {}

        let positions = sim.positions();
        for (index, a) in positions.iter().enumerate() {
            assert!(a.x.is_finite() && a.y.is_finite());
            for b in &positions[index + 1..] {
                assert!((*a - *b).length() > 1.0);
            }
        }
    }

    #[test]
    fn pinned_node_is_not_moved() {
        let mut sim = simulator(8);
        sim.start();
        let anchor = vec2(250.0, -40.0);
        assert!(sim.begin_drag("n3", anchor));
        assert!(sim.is_dragging("n3"));

        for _ in 0..50 {
            sim.step();
            assert_eq!(sim.position_of("n3"), Some(anchor));
        }

        let moved = vec2(-10.0, 10.0);
        assert!(sim.drag_to("n3", moved));
        sim.step();
        assert_eq!(sim.position_of("n3"), Some(moved));

        // Held nodes keep the layout warm.
        assert!(sim.state().is_active());

        assert!(sim.end_drag("n3"));
        assert!(!sim.is_dragging("n3"));
        assert!(!sim.drag_to("n3", anchor));
    }

    #[test]
    fn drag_wakes_a_settled_layout() {
        let mut sim = simulator(6);
        sim.start();
        while sim.step() != StepOutcome::Settled {}

        assert!(sim.begin_drag("n0", vec2(5.0, 5.0)));
        assert!(sim.state().is_active());
        assert_eq!(sim.step(), StepOutcome::Moved);
        assert!(!sim.begin_drag("missing", Vec2::ZERO));
    }

    #[test]
    fn non_convergence_raises_partial_flag() {
        let (nodes, links) = ring(5);
        let scale = SizeScale::build(&nodes, &links, 5.0);
        let mut params = super::super::optimize(5, &EngineSettings::default());
        params.alpha_decay = 0.0;
        params.max_ticks = 40;
        let mut sim = LayoutSimulator::new(nodes, &links, &scale, params);
        sim.start();

        let steps = std::iter::repeat_with(|| sim.step())
            .take_while(|outcome| *outcome == StepOutcome::Moved)
            .count();

        assert_eq!(steps, 39);
        assert_eq!(sim.state(), SimulationState::Settled);
        assert!(sim.is_partial());
    }

    #[test]
    fn settle_completes_in_chunks() {
        let mut sim = simulator(40);
        sim.start();

        let mut calls = 0;
        loop {
            calls += 1;
            match sim.settle(Duration::ZERO) {
                SettleProgress::Pending { completed, total } => {
                    assert_eq!(completed, calls);
                    assert!(completed < total);
                }
                SettleProgress::Done => break,
            }
        }

        assert!(calls > 1);
        assert_eq!(sim.state(), SimulationState::Settled);
        assert_eq!(sim.settle(Duration::ZERO), SettleProgress::Done);
    }

    #[test]
    fn seeding_copies_positions_by_id() {
        let mut sim = simulator(4);
        let mut seed = HashMap::new();
        seed.insert("n1".to_owned(), vec2(100.0, 100.0));
        sim.seed_positions(&seed);

        assert_eq!(sim.position_of("n1"), Some(vec2(100.0, 100.0)));
        let neighbor = sim.position_of("n0").expect("n0 exists");
        assert!((neighbor - vec2(100.0, 100.0)).length() <= sim.params().link_distance);
    }

    #[test]
    fn cluster_pull_points_toward_group_centroid() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0), vec2(50.0, 50.0)];
        let groups = vec![0, 0, 1];
        let mut centroids = Vec::new();
        let mut deltas = vec![Vec2::ZERO; 3];

        cluster_pull(&positions, &groups, 2, 0.5, &mut centroids, &mut deltas);

        assert_eq!(deltas[0], vec2(2.5, 0.0));
        assert_eq!(deltas[1], vec2(-2.5, 0.0));
        assert_eq!(deltas[2], Vec2::ZERO);
    }
}
