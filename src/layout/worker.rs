use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use emath::Vec2;
use tracing::{debug, warn};

use crate::graph::{Link, Node, SizeScale};

use super::{ForceParameters, LayoutSimulator, SimulationState, StepOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Begin,
    Move,
    End,
}

enum Command {
    Start {
        generation: u64,
        nodes: Vec<Node>,
        links: Vec<Link>,
        params: ForceParameters,
        scale: SizeScale,
        seed: HashMap<String, Vec2>,
    },
    Step,
    Settle,
    Drag {
        phase: DragPhase,
        id: String,
        at: Vec2,
    },
    Shutdown,
}

/// Positions after one worker step, in the order the nodes were handed over.
#[derive(Clone, Debug)]
pub struct LayoutSnapshot {
    pub generation: u64,
    pub positions: Vec<Vec2>,
    pub state: SimulationState,
    pub partial: bool,
}

/// Runs a [`LayoutSimulator`] on its own thread. Node and link arrays go in by
/// message, position snapshots come back; nothing mutable is shared.
pub struct LayoutWorker {
    commands: Sender<Command>,
    snapshots: Receiver<LayoutSnapshot>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl LayoutWorker {
    pub fn spawn() -> Self {
        let (commands, command_rx) = mpsc::channel();
        let (snapshot_tx, snapshots) = mpsc::channel();

        let handle = thread::spawn(move || run(command_rx, snapshot_tx));

        Self {
            commands,
            snapshots,
            generation: 0,
            handle: Some(handle),
        }
    }

    /// Replaces whatever the worker was simulating. Snapshots of earlier
    /// generations are dropped from then on.
    pub fn start(
        &mut self,
        nodes: Vec<Node>,
        links: Vec<Link>,
        params: ForceParameters,
        scale: SizeScale,
        seed: HashMap<String, Vec2>,
    ) -> u64 {
        self.generation += 1;
        self.send(Command::Start {
            generation: self.generation,
            nodes,
            links,
            params,
            scale,
            seed,
        });
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every step is answered, with an idle snapshot if nothing moved.
    pub fn step(&self) -> bool {
        self.send(Command::Step)
    }

    /// Runs the pass to rest the way an inline settle would and answers with
    /// one snapshot.
    pub fn settle(&self) -> bool {
        self.send(Command::Settle)
    }

    pub fn drag(&self, phase: DragPhase, id: impl Into<String>, at: Vec2) -> bool {
        self.send(Command::Drag {
            phase,
            id: id.into(),
            at,
        })
    }

    /// Latest snapshot of the current generation, without blocking.
    pub fn poll(&mut self) -> Option<LayoutSnapshot> {
        let mut latest = None;
        loop {
            match self.snapshots.try_recv() {
                Ok(snapshot) if snapshot.generation == self.generation => latest = Some(snapshot),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return latest,
                Err(TryRecvError::Disconnected) => {
                    warn!("layout worker disconnected");
                    return latest;
                }
            }
        }
    }

    /// Blocks for the next snapshot of the current generation.
    pub fn wait(&mut self, timeout: Duration) -> Option<LayoutSnapshot> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.snapshots.recv_timeout(remaining) {
                Ok(snapshot) if snapshot.generation == self.generation => return Some(snapshot),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

impl Drop for LayoutWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("layout worker panicked");
        }
    }
}

/// One step, or the whole pass to rest. Large graphs get the bounded
/// non-animated settle; the rest step until the alpha floor or tick ceiling.
fn advance(simulator: &mut LayoutSimulator, to_rest: bool) {
    if !to_rest {
        simulator.step();
        return;
    }
    if simulator.params().settle_synchronously {
        simulator.settle(Duration::MAX);
    }
    while simulator.step() != StepOutcome::Idle {}
}

fn run(commands: Receiver<Command>, snapshots: Sender<LayoutSnapshot>) {
    let mut current: Option<(u64, LayoutSimulator)> = None;

    while let Ok(command) = commands.recv() {
        match command {
            Command::Start {
                generation,
                nodes,
                links,
                params,
                scale,
                seed,
            } => {
                let mut simulator = LayoutSimulator::new(nodes, &links, &scale, params);
                simulator.seed_positions(&seed);
                simulator.start();
                debug!(generation, "layout worker started a pass");
                current = Some((generation, simulator));
            }
            Command::Step | Command::Settle => {
                let to_rest = matches!(command, Command::Settle);
                let Some((generation, simulator)) = current.as_mut() else {
                    continue;
                };
                advance(simulator, to_rest);
                let snapshot = LayoutSnapshot {
                    generation: *generation,
                    positions: simulator.positions(),
                    state: simulator.state(),
                    partial: simulator.is_partial(),
                };
                if snapshots.send(snapshot).is_err() {
                    break;
                }
            }
            Command::Drag { phase, id, at } => {
                if let Some((_, simulator)) = current.as_mut() {
                    match phase {
                        DragPhase::Begin => simulator.begin_drag(&id, at),
                        DragPhase::Move => simulator.drag_to(&id, at),
                        DragPhase::End => simulator.end_drag(&id),
                    };
                }
            }
            Command::Shutdown => break,
        }
    }

    debug!("layout worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::optimize;
    use crate::settings::EngineSettings;

    fn path(len: usize) -> (Vec<Node>, Vec<Link>) {
        let nodes = (0..len)
            .map(|index| Node::new(format!("p{index}"), "", "entity"))
            .collect::<Vec<_>>();
        let links = (1..len)
            .map(|index| Link::new(format!("p{}", index - 1), format!("p{index}"), "NEXT"))
            .collect::<Vec<_>>();
        (nodes, links)
    }

    fn start(worker: &mut LayoutWorker, len: usize) -> u64 {
        let (nodes, links) = path(len);
        let params = optimize(len, &EngineSettings::default());
        let scale = SizeScale::build(&nodes, &links, 5.0);
        worker.start(nodes, links, params, scale, HashMap::new())
    }

    #[test]
    fn steps_produce_snapshots() {
        let mut worker = LayoutWorker::spawn();
        let generation = start(&mut worker, 6);

        assert!(worker.step());
        let snapshot = worker
            .wait(Duration::from_secs(5))
            .expect("worker answers a step");

        assert_eq!(snapshot.generation, generation);
        assert_eq!(snapshot.positions.len(), 6);
        assert!(snapshot.state.is_active());
    }

    #[test]
    fn superseded_generations_are_dropped() {
        let mut worker = LayoutWorker::spawn();
        start(&mut worker, 4);
        worker.step();
        worker.step();

        let current = start(&mut worker, 9);
        worker.step();

        let snapshot = worker
            .wait(Duration::from_secs(5))
            .expect("worker answers a step");
        assert_eq!(snapshot.generation, current);
        assert_eq!(snapshot.positions.len(), 9);
        assert!(worker.poll().is_none());
    }

    #[test]
    fn drag_pins_inside_the_worker() {
        let mut worker = LayoutWorker::spawn();
        start(&mut worker, 5);
        let anchor = emath::vec2(42.0, -7.0);

        worker.drag(DragPhase::Begin, "p2", anchor);
        worker.step();
        let snapshot = worker
            .wait(Duration::from_secs(5))
            .expect("worker answers a step");

        assert_eq!(snapshot.positions[2], anchor);
    }

    #[test]
    fn settle_answers_once_with_a_final_layout() {
        let mut worker = LayoutWorker::spawn();
        start(&mut worker, 7);
        worker.settle();

        let snapshot = worker
            .wait(Duration::from_secs(10))
            .expect("worker answers a settle");
        assert_eq!(snapshot.state, SimulationState::Settled);
        assert!(worker.wait(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn settle_runs_small_passes_to_convergence() {
        let mut worker = LayoutWorker::spawn();
        start(&mut worker, 15);
        worker.settle();

        let snapshot = worker
            .wait(Duration::from_secs(10))
            .expect("worker answers a settle");
        assert_eq!(snapshot.state, SimulationState::Settled);
        assert!(!snapshot.partial);
    }

    #[test]
    fn settled_pass_still_answers_steps() {
        let mut worker = LayoutWorker::spawn();
        let generation = start(&mut worker, 5);
        worker.settle();
        worker
            .wait(Duration::from_secs(10))
            .expect("worker answers a settle");

        worker.step();
        let snapshot = worker
            .wait(Duration::from_secs(5))
            .expect("idle passes still answer");
        assert_eq!(snapshot.generation, generation);
        assert_eq!(snapshot.state, SimulationState::Settled);
        assert_eq!(snapshot.positions.len(), 5);
    }

    #[test]
    fn steps_before_start_are_ignored() {
        let mut worker = LayoutWorker::spawn();
        worker.step();
        assert!(worker.wait(Duration::from_millis(50)).is_none());
    }
}
