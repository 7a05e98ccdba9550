//! Incremental reveal of large visible sets.

use std::time::{Duration, Instant};

use crate::graph::{Link, Node, links_between};
use crate::settings::RevealSettings;

/// Next revealed count: grows by one batch, never past `total`.
pub fn advance(revealed: usize, batch_size: usize, total: usize) -> usize {
    revealed.saturating_add(batch_size.max(1)).min(total)
}

/// How much of the visible set has been handed downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealState {
    revealed_count: usize,
    batch_size: usize,
    total: usize,
}

impl RevealState {
    /// Sets up reveal for `total` visible nodes. Small sets, or a disabled
    /// reveal, are complete immediately; otherwise nothing is revealed until
    /// the first [`advance`](Self::advance).
    pub fn new(total: usize, settings: &RevealSettings) -> Self {
        let staged = settings.enabled && total > settings.threshold;
        Self {
            revealed_count: if staged { 0 } else { total },
            batch_size: settings.batch_size.max(1),
            total,
        }
    }

    pub fn complete(total: usize) -> Self {
        Self {
            revealed_count: total,
            batch_size: total.max(1),
            total,
        }
    }

    /// Reveals one more batch. Returns whether the count changed.
    pub fn advance(&mut self) -> bool {
        let next = advance(self.revealed_count, self.batch_size, self.total);
        let changed = next != self.revealed_count;
        self.revealed_count = next;
        changed
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.revealed_count >= self.total
    }

    pub fn revealed<'a>(&self, nodes: &'a [Node]) -> &'a [Node] {
        &nodes[..self.revealed_count.min(nodes.len())]
    }
}

/// Links whose endpoints are both in the revealed prefix.
pub fn revealed_links(revealed: &[Node], links: &[Link]) -> Vec<Link> {
    links_between(revealed, links)
}

/// Decides when the next automatic batch is due.
#[derive(Clone, Debug)]
pub struct RevealPacer {
    interval: Duration,
    last: Option<Instant>,
}

impl RevealPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True at most once per interval. The first call only arms the pacer.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            Some(_) => {
                self.last = Some(now);
                true
            }
            None => {
                self.last = Some(now);
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
