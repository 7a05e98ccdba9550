//! The engine facade: one session per dataset on screen.
//!
//! A session owns the full dataset, the visible subset picked by the sampler,
//! the reveal schedule, the running layout and the navigation cursor. Anything
//! that changes which nodes are simulated (dataset, focus, filter, a reveal
//! batch) starts a new layout pass and bumps the generation, which invalidates
//! outstanding frame tickets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use emath::Vec2;
use tracing::{debug, info};

use crate::export::{ExportFormat, serialize};
use crate::filter::{FilterConfig, VisibleGraph, select};
use crate::graph::{GraphDataset, GraphMetrics, Link, Node, SizeScale, links_between};
use crate::layout::{
    DragPhase, ForceParameters, LayoutSimulator, LayoutWorker, SimulationState, StepOutcome,
    optimize,
};
use crate::lod::{LevelOfDetailProfile, compute_profile};
use crate::navigation::{
    AnnouncementSink, BoundaryBehavior, FocusObserver, NavigationCommand, NavigationContext,
    NavigationCursor,
};
use crate::reveal::{RevealPacer, RevealState};
use crate::search::search;
use crate::settings::{EngineSettings, VisualSettings};
use crate::theme::{Rgb, Theme, blend};
use crate::util::short_label;

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 12.0;
const LABEL_CHARS: usize = 28;
const PICK_SLOP_PX: f32 = 4.0;
const WORKER_SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Zoom and pan of the drawing surface. `pan` is in screen units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl ViewportState {
    pub fn zoom(&self) -> f32 {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        }
    }

    pub fn world_to_screen(&self, origin: Vec2, world: Vec2) -> Vec2 {
        origin + self.pan + world * self.zoom()
    }

    pub fn screen_to_world(&self, origin: Vec2, screen: Vec2) -> Vec2 {
        (screen - origin - self.pan) / self.zoom()
    }

    /// Scales the zoom by `factor`, keeping the world point under `anchor`
    /// where it is on screen.
    pub fn zoom_around(&mut self, origin: Vec2, anchor: Vec2, factor: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let world = self.screen_to_world(origin, anchor);
        self.zoom = (self.zoom() * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = anchor - origin - world * self.zoom;
    }
}

/// Handle for one requested frame callback. Only the latest ticket of the
/// current generation is honored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTicket {
    generation: u64,
    serial: u64,
}

impl FrameTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderNode {
    pub id: String,
    pub label: Option<String>,
    pub type_tag: String,
    pub position: Vec2,
    /// World units.
    pub radius: f32,
    pub fill: Rgb,
    pub stroke: Rgb,
    pub stroke_width: f32,
    pub focused: bool,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderLink {
    pub source_id: String,
    pub target_id: String,
    pub source: Vec2,
    pub target: Vec2,
    pub label: Option<String>,
}

/// Everything needed to draw one frame.
#[derive(Clone, Debug)]
pub struct RenderFrame {
    pub generation: u64,
    pub nodes: Vec<RenderNode>,
    pub links: Vec<RenderLink>,
    pub lod: LevelOfDetailProfile,
    pub theme: Theme,
    pub layout_state: SimulationState,
    /// False while a large graph is still settling; nothing is drawn then.
    pub layout_ready: bool,
    pub partial_layout: bool,
    pub revealed: usize,
    pub visible: usize,
    pub total: usize,
    pub sampled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionMetrics {
    pub full: GraphMetrics,
    pub visible: GraphMetrics,
}

struct Offloaded {
    positions: Vec<Vec2>,
    state: SimulationState,
    partial: bool,
    awaiting: bool,
    /// Nodes the worker was told to hold, with their last anchor.
    pins: HashMap<String, Vec2>,
}

/// What one layout pass hands to the next: positions by id and the nodes
/// still held by a drag.
#[derive(Default)]
struct Carry {
    seed: HashMap<String, Vec2>,
    pins: HashMap<String, Vec2>,
}

enum LayoutPass {
    Inline(LayoutSimulator),
    Offloaded(Offloaded),
}

pub struct GraphSession {
    dataset: GraphDataset,
    settings: EngineSettings,
    /// Filter the session was opened with; a new dataset starts from it again.
    initial_filter: FilterConfig,
    viewport: ViewportState,
    visible: VisibleGraph,
    scale: SizeScale,
    reveal: RevealState,
    pacer: RevealPacer,
    rendered_links: Vec<Link>,
    layout_index: HashMap<String, usize>,
    params: ForceParameters,
    pass: LayoutPass,
    worker: Option<LayoutWorker>,
    cursor: NavigationCursor,
    selected: Option<String>,
    theme: Theme,
    generation: u64,
    frame_serial: u64,
    pending_frame: Option<FrameTicket>,
}

fn navigation_context<'a>(
    visible: &'a [Node],
    links: &'a [Link],
    settings: &EngineSettings,
) -> NavigationContext<'a> {
    NavigationContext {
        visible,
        links,
        boundary: BoundaryBehavior::from_wrap(settings.navigation.wrap),
        announce_depth: settings.navigation.announce_depth,
    }
}

impl GraphSession {
    pub fn new(dataset: GraphDataset, mut settings: EngineSettings) -> Self {
        let initial_filter = settings.filter.clone();
        settings.filter.focus_id = initial_filter
            .focus_id
            .clone()
            .filter(|id| dataset.contains(id));
        let scale = SizeScale::build(&[], &[], settings.visual.node_size_base());
        let params = optimize(0, &settings);
        let empty = LayoutSimulator::new(Vec::new(), &[], &scale, params);

        let mut session = Self {
            theme: Theme::new(settings.visual.dark_mode),
            pacer: RevealPacer::new(settings.reveal.interval()),
            dataset,
            settings,
            initial_filter,
            viewport: ViewportState::default(),
            visible: VisibleGraph::default(),
            scale,
            reveal: RevealState::complete(0),
            rendered_links: Vec::new(),
            layout_index: HashMap::new(),
            params,
            pass: LayoutPass::Inline(empty),
            worker: None,
            cursor: NavigationCursor::default(),
            selected: None,
            generation: 0,
            frame_serial: 0,
            pending_frame: None,
        };
        session.rebuild(false);
        session
    }

    pub fn dataset(&self) -> &GraphDataset {
        &self.dataset
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn visible(&self) -> &VisibleGraph {
        &self.visible
    }

    /// Prefix of the visible set currently handed to the layout and renderer.
    pub fn rendered_nodes(&self) -> &[Node] {
        self.reveal.revealed(&self.visible.nodes)
    }

    pub fn rendered_links(&self) -> &[Link] {
        &self.rendered_links
    }

    pub fn focus_id(&self) -> Option<&str> {
        self.settings.filter.focus_id.as_deref()
    }

    /// Keyboard focus, as opposed to the sampler focus.
    pub fn focused(&self) -> Option<&str> {
        self.cursor.focused()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reveal_state(&self) -> RevealState {
        self.reveal
    }

    pub fn params(&self) -> &ForceParameters {
        &self.params
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.viewport = viewport;
    }

    pub fn layout_state(&self) -> SimulationState {
        match &self.pass {
            LayoutPass::Inline(simulator) => simulator.state(),
            LayoutPass::Offloaded(offloaded) => offloaded.state,
        }
    }

    pub fn is_partial_layout(&self) -> bool {
        match &self.pass {
            LayoutPass::Inline(simulator) => simulator.is_partial(),
            LayoutPass::Offloaded(offloaded) => offloaded.partial,
        }
    }

    pub fn layout_ready(&self) -> bool {
        !self.params.settle_synchronously || !self.layout_state().is_active()
    }

    /// True while the layout moves or batches remain to be revealed.
    pub fn needs_frame(&self) -> bool {
        self.layout_state().is_active() || !self.reveal.is_complete()
    }

    /// Swaps in a new dataset. Sampling starts over from the initial filter.
    pub fn replace_dataset(&mut self, dataset: GraphDataset) {
        info!(
            nodes = dataset.node_count(),
            links = dataset.link_count(),
            "dataset replaced"
        );
        let mut filter = self.initial_filter.clone();
        filter.focus_id = filter.focus_id.filter(|id| dataset.contains(id));
        self.settings.filter = filter;
        self.dataset = dataset;
        self.cursor.reset();
        self.selected = None;
        self.viewport = ViewportState::default();
        self.rebuild(false);
    }

    /// Re-centers the sampler on `id`. Unknown ids clear the focus.
    pub fn set_focus(&mut self, id: Option<&str>) -> bool {
        let focus = id.filter(|id| self.dataset.contains(id)).map(str::to_owned);
        if focus == self.settings.filter.focus_id {
            return false;
        }
        info!(focus = ?focus, "sampler focus changed");
        self.settings.filter.focus_id = focus;
        self.rebuild(true);
        true
    }

    /// Focuses the best fuzzy match for `query`.
    pub fn focus_on_query(&mut self, query: &str) -> Option<String> {
        let hit = search(self.dataset.nodes(), query, 1).into_iter().next()?;
        self.set_focus(Some(&hit.id));
        Some(hit.id)
    }

    /// Like [`Self::set_focus`], a focus id missing from the dataset clears
    /// the focus.
    pub fn set_filter(&mut self, mut config: FilterConfig) {
        config.focus_id = config.focus_id.filter(|id| self.dataset.contains(id));
        if config == self.settings.filter {
            return;
        }
        self.settings.filter = config;
        self.rebuild(true);
    }

    pub fn set_visual_settings(&mut self, visual: VisualSettings) {
        let previous = &self.settings.visual;
        let relayout = previous.cluster_by_type != visual.cluster_by_type
            || previous.node_size_base() != visual.node_size_base();

        self.theme = Theme::new(visual.dark_mode);
        self.settings.visual = visual;

        if relayout {
            self.scale = SizeScale::build(
                &self.visible.nodes,
                &self.visible.links,
                self.settings.visual.node_size_base(),
            );
            let carry = self.carry();
            self.restart_layout(carry);
        }
    }

    /// Reveals the next batch right away. Returns whether anything changed.
    pub fn reveal_more(&mut self) -> bool {
        if !self.reveal.advance() {
            return false;
        }
        debug!(
            revealed = self.reveal.revealed_count(),
            total = self.reveal.total(),
            "revealed another batch"
        );
        let carry = self.carry();
        self.restart_layout(carry);
        true
    }

    pub fn request_frame(&mut self) -> FrameTicket {
        self.frame_serial += 1;
        let ticket = FrameTicket {
            generation: self.generation,
            serial: self.frame_serial,
        };
        self.pending_frame = Some(ticket);
        ticket
    }

    /// Runs the callback for `ticket` unless it was superseded.
    pub fn on_frame(&mut self, ticket: FrameTicket, now: Instant) -> bool {
        if self.pending_frame != Some(ticket) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "dropping stale frame"
            );
            return false;
        }
        self.pending_frame = None;
        self.tick(now);
        true
    }

    /// One scheduling turn: paced reveal, then one layout step (or one settle
    /// chunk for large graphs). Returns whether anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if !self.reveal.is_complete() && self.pacer.due(now) {
            changed |= self.reveal_more();
        }
        changed | self.advance_layout()
    }

    /// Reveals everything and runs the layout to rest. Blocks.
    pub fn settle_now(&mut self) {
        while self.reveal_more() {}

        let settle_synchronously = self.params.settle_synchronously;
        match &mut self.pass {
            LayoutPass::Inline(simulator) => {
                if settle_synchronously {
                    simulator.settle(Duration::MAX);
                }
                while simulator.step() != StepOutcome::Idle {}
            }
            LayoutPass::Offloaded(offloaded) => {
                let Some(worker) = self.worker.as_mut() else {
                    return;
                };
                if !offloaded.state.is_active() {
                    return;
                }
                worker.settle();
                while let Some(snapshot) = worker.wait(WORKER_SETTLE_TIMEOUT) {
                    offloaded.positions = snapshot.positions;
                    offloaded.state = snapshot.state;
                    offloaded.partial = snapshot.partial;
                    if !snapshot.state.is_active() {
                        break;
                    }
                }
                offloaded.awaiting = false;
            }
        }
    }

    pub fn navigate(
        &mut self,
        command: NavigationCommand,
        sink: &mut dyn AnnouncementSink,
        observer: &mut dyn FocusObserver,
    ) -> Option<String> {
        let visible = self.reveal.revealed(&self.visible.nodes);
        let context = navigation_context(visible, &self.rendered_links, &self.settings);
        self.cursor
            .apply(command, context, sink, observer)
            .map(str::to_owned)
    }

    /// Pointer selection; also moves keyboard focus.
    pub fn select(
        &mut self,
        id: Option<&str>,
        sink: &mut dyn AnnouncementSink,
        observer: &mut dyn FocusObserver,
    ) {
        let visible = self.reveal.revealed(&self.visible.nodes);
        self.selected = id
            .filter(|id| visible.iter().any(|node| node.id == *id))
            .map(str::to_owned);
        let context = navigation_context(visible, &self.rendered_links, &self.settings);
        self.cursor.select(self.selected.as_deref(), context, sink, observer);
    }

    pub fn begin_drag(&mut self, id: &str, world: Vec2) -> bool {
        self.drag(DragPhase::Begin, id, world)
    }

    pub fn drag_to(&mut self, id: &str, world: Vec2) -> bool {
        self.drag(DragPhase::Move, id, world)
    }

    pub fn end_drag(&mut self, id: &str) -> bool {
        self.drag(DragPhase::End, id, Vec2::ZERO)
    }

    fn drag(&mut self, phase: DragPhase, id: &str, world: Vec2) -> bool {
        match &mut self.pass {
            LayoutPass::Inline(simulator) => match phase {
                DragPhase::Begin => simulator.begin_drag(id, world),
                DragPhase::Move => simulator.drag_to(id, world),
                DragPhase::End => simulator.end_drag(id),
            },
            LayoutPass::Offloaded(offloaded) => {
                let (Some(&index), Some(worker)) = (self.layout_index.get(id), self.worker.as_ref())
                else {
                    return false;
                };
                match phase {
                    DragPhase::Begin => {}
                    DragPhase::Move if offloaded.pins.contains_key(id) => {}
                    DragPhase::Move => return false,
                    DragPhase::End => {
                        return offloaded.pins.remove(id).is_some() && worker.drag(phase, id, world);
                    }
                }
                if world.x.is_finite() && world.y.is_finite() {
                    offloaded.pins.insert(id.to_owned(), world);
                    offloaded.positions[index] = world;
                }
                offloaded.state = SimulationState::Running;
                worker.drag(phase, id, world)
            }
        }
    }

    /// Topmost rendered node under a world-space point.
    pub fn pick(&self, world: Vec2) -> Option<&str> {
        let lod = self.lod();
        let slop = PICK_SLOP_PX / lod.zoom;
        self.rendered_nodes()
            .iter()
            .enumerate()
            .rev()
            .find(|(index, node)| {
                let radius = lod.world_radius(self.scale.radius(node)).max(slop);
                (self.node_position(*index) - world).length() <= radius
            })
            .map(|(_, node)| node.id.as_str())
    }

    /// Export of the full dataset, whatever is on screen.
    pub fn export(&self, format: ExportFormat) -> String {
        serialize(&self.dataset, format)
    }

    pub fn metrics(&self) -> SessionMetrics {
        SessionMetrics {
            full: GraphMetrics::compute(self.dataset.nodes(), self.dataset.links()),
            visible: GraphMetrics::compute(&self.visible.nodes, &self.visible.links),
        }
    }

    pub fn lod(&self) -> LevelOfDetailProfile {
        compute_profile(self.viewport.zoom(), self.reveal.revealed_count())
            .with_toggles(&self.settings.visual)
    }

    pub fn positions(&self) -> Vec<(String, Vec2)> {
        self.rendered_nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), self.node_position(index)))
            .collect()
    }

    pub fn frame(&self) -> RenderFrame {
        let lod = self.lod();
        let layout_ready = self.layout_ready();
        let mut frame = RenderFrame {
            generation: self.generation,
            nodes: Vec::new(),
            links: Vec::new(),
            lod,
            theme: self.theme,
            layout_state: self.layout_state(),
            layout_ready,
            partial_layout: self.is_partial_layout(),
            revealed: self.reveal.revealed_count(),
            visible: self.visible.node_count(),
            total: self.dataset.node_count(),
            sampled: self.visible.sampled,
        };
        if !layout_ready {
            return frame;
        }

        let focused = self.cursor.focused();
        let selected = self.selected.as_deref();
        frame.nodes = self
            .rendered_nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let is_focused = focused == Some(node.id.as_str());
                let is_selected = selected == Some(node.id.as_str());
                let decoration = lod.decorate(is_focused, is_selected);
                let fill = self.theme.type_color(&node.type_tag);

                RenderNode {
                    id: node.id.clone(),
                    label: decoration
                        .show_label
                        .then(|| short_label(&node.display_name, LABEL_CHARS)),
                    type_tag: node.type_tag.clone(),
                    position: self.node_position(index),
                    radius: lod.world_radius(self.scale.radius(node)),
                    fill: if decoration.emphasized {
                        blend(fill, self.theme.emphasis, 0.25)
                    } else {
                        fill
                    },
                    stroke: if decoration.emphasized {
                        self.theme.emphasis
                    } else {
                        self.theme.node_border
                    },
                    stroke_width: decoration.border_width,
                    focused: is_focused,
                    selected: is_selected,
                }
            })
            .collect();

        frame.links = self
            .rendered_links
            .iter()
            .filter_map(|link| {
                let source = *self.layout_index.get(&link.source_id)?;
                let target = *self.layout_index.get(&link.target_id)?;
                Some(RenderLink {
                    source_id: link.source_id.clone(),
                    target_id: link.target_id.clone(),
                    source: frame.nodes[source].position,
                    target: frame.nodes[target].position,
                    label: lod
                        .show_relationship_labels
                        .then(|| link.relation_type.clone()),
                })
            })
            .collect();

        frame
    }

    fn node_position(&self, index: usize) -> Vec2 {
        match &self.pass {
            LayoutPass::Inline(simulator) => simulator
                .nodes()
                .get(index)
                .map_or(Vec2::ZERO, |node| node.position),
            LayoutPass::Offloaded(offloaded) => {
                offloaded.positions.get(index).copied().unwrap_or(Vec2::ZERO)
            }
        }
    }

    fn carry(&self) -> Carry {
        match &self.pass {
            LayoutPass::Inline(simulator) => Carry {
                seed: simulator.snapshot(),
                pins: simulator.pins(),
            },
            LayoutPass::Offloaded(offloaded) => Carry {
                seed: self
                    .layout_index
                    .iter()
                    .filter_map(|(id, &index)| Some((id.clone(), *offloaded.positions.get(index)?)))
                    .collect(),
                pins: offloaded.pins.clone(),
            },
        }
    }

    /// Resamples the dataset and starts a fresh layout pass.
    fn rebuild(&mut self, keep_positions: bool) {
        let carry = if keep_positions {
            self.carry()
        } else {
            Carry::default()
        };

        self.visible = select(
            &self.dataset,
            self.settings.filter.focus_id.as_deref(),
            &self.settings.filter,
        );
        self.scale = SizeScale::build(
            &self.visible.nodes,
            &self.visible.links,
            self.settings.visual.node_size_base(),
        );
        self.reveal = RevealState::new(self.visible.node_count(), &self.settings.reveal);
        if !self.reveal.is_complete() {
            self.reveal.advance();
        }
        self.pacer = RevealPacer::new(self.settings.reveal.interval());

        if let Some(selected) = self.selected.as_deref()
            && self.visible.position_of(selected).is_none()
        {
            self.selected = None;
        }

        self.restart_layout(carry);
    }

    /// Replaces the layout pass for the current revealed prefix. Pending frame
    /// tickets die with the old generation; held nodes stay held if they are
    /// still rendered.
    fn restart_layout(&mut self, carry: Carry) {
        self.generation += 1;
        self.pending_frame = None;

        let nodes = self.reveal.revealed(&self.visible.nodes).to_vec();
        self.rendered_links = links_between(&nodes, &self.visible.links);
        self.layout_index = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.params = optimize(nodes.len(), &self.settings);

        let mut simulator = LayoutSimulator::new(nodes, &self.rendered_links, &self.scale, self.params);
        simulator.seed_positions(&carry.seed);
        simulator.start();
        for (id, at) in &carry.pins {
            simulator.begin_drag(id, *at);
        }
        let pins = simulator.pins();

        debug!(
            generation = self.generation,
            nodes = simulator.nodes().len(),
            links = self.rendered_links.len(),
            held = pins.len(),
            settle = self.params.settle_synchronously,
            "layout pass started"
        );

        self.pass = if self.settings.layout.offload {
            let worker = self.worker.get_or_insert_with(LayoutWorker::spawn);
            worker.start(
                simulator.nodes().to_vec(),
                self.rendered_links.clone(),
                self.params,
                self.scale.clone(),
                simulator.snapshot(),
            );
            for (id, at) in &pins {
                worker.drag(DragPhase::Begin, id.as_str(), *at);
            }
            LayoutPass::Offloaded(Offloaded {
                positions: simulator.positions(),
                state: simulator.state(),
                partial: false,
                awaiting: false,
                pins,
            })
        } else {
            LayoutPass::Inline(simulator)
        };
    }

    fn advance_layout(&mut self) -> bool {
        let settle_synchronously = self.params.settle_synchronously;
        let budget = self.settings.layout.settle_budget();

        match &mut self.pass {
            LayoutPass::Inline(simulator) => {
                if !simulator.state().is_active() {
                    return false;
                }
                if settle_synchronously {
                    let revision = simulator.revision();
                    simulator.settle(budget);
                    simulator.revision() != revision
                } else {
                    simulator.step() != StepOutcome::Idle
                }
            }
            LayoutPass::Offloaded(offloaded) => {
                let Some(worker) = self.worker.as_mut() else {
                    return false;
                };

                let mut changed = false;
                if let Some(snapshot) = worker.poll() {
                    offloaded.positions = snapshot.positions;
                    offloaded.state = snapshot.state;
                    offloaded.partial = snapshot.partial;
                    offloaded.awaiting = false;
                    changed = true;
                }

                if offloaded.state.is_active() && !offloaded.awaiting {
                    offloaded.awaiting = if settle_synchronously {
                        worker.settle()
                    } else {
                        worker.step()
                    };
                }
                changed
            }
        }
    }
}
