//! Keyboard focus over the visible set, with spoken-style announcements.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::Sender;

use tracing::debug;

use crate::graph::{Link, Node};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryBehavior {
    #[default]
    Stop,
    Wrap,
}

impl BoundaryBehavior {
    pub fn from_wrap(wrap: bool) -> Self {
        if wrap { Self::Wrap } else { Self::Stop }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationCommand {
    Next,
    Previous,
    First,
    Last,
    /// Cycles through the direct neighbors of the node focus started from.
    NextRelated,
    Clear,
}

/// Receives one short message per focus change.
pub trait AnnouncementSink {
    fn announce(&mut self, message: &str);
}

impl AnnouncementSink for () {
    fn announce(&mut self, _message: &str) {}
}

impl AnnouncementSink for Vec<String> {
    fn announce(&mut self, message: &str) {
        self.push(message.to_owned());
    }
}

impl AnnouncementSink for Sender<String> {
    fn announce(&mut self, message: &str) {
        let _ = self.send(message.to_owned());
    }
}

pub trait FocusObserver {
    fn focus_changed(&mut self, focused: Option<&Node>);
}

impl FocusObserver for () {
    fn focus_changed(&mut self, _focused: Option<&Node>) {}
}

impl FocusObserver for Vec<Option<String>> {
    fn focus_changed(&mut self, focused: Option<&Node>) {
        self.push(focused.map(|node| node.id.clone()));
    }
}

/// Neighbor of `current` in visible-set order. Without a current focus the
/// walk starts at the matching end.
pub fn next<'a>(
    current: Option<&str>,
    visible: &'a [Node],
    direction: Direction,
    boundary: BoundaryBehavior,
) -> Option<&'a Node> {
    let last = visible.len().checked_sub(1)?;
    let position = current.and_then(|id| visible.iter().position(|node| node.id == id));

    let index = match (position, direction) {
        (None, Direction::Forward) => 0,
        (None, Direction::Backward) => last,
        (Some(index), Direction::Forward) if index < last => index + 1,
        (Some(index), Direction::Backward) if index > 0 => index - 1,
        (Some(_), Direction::Forward) => match boundary {
            BoundaryBehavior::Stop => return None,
            BoundaryBehavior::Wrap => 0,
        },
        (Some(_), Direction::Backward) => match boundary {
            BoundaryBehavior::Stop => return None,
            BoundaryBehavior::Wrap => last,
        },
    };

    visible.get(index)
}

/// Ids reachable from `node_id` within `depth` hops, in breadth-first order.
/// Links are followed in both directions and only between listed nodes.
pub fn related_within_depth(node_id: &str, nodes: &[Node], links: &[Link], depth: usize) -> Vec<String> {
    let known = nodes.iter().map(|node| node.id.as_str()).collect::<HashSet<_>>();
    if depth == 0 || !known.contains(node_id) {
        return Vec::new();
    }

    let mut adjacency = HashMap::<&str, Vec<&str>>::new();
    for link in links {
        let (source, target) = (link.source_id.as_str(), link.target_id.as_str());
        if source == target || !known.contains(source) || !known.contains(target) {
            continue;
        }
        adjacency.entry(source).or_default().push(target);
        adjacency.entry(target).or_default().push(source);
    }

    let mut queue = VecDeque::from([(node_id, 0usize)]);
    let mut visited = HashSet::from([node_id]);
    let mut related = Vec::new();

    while let Some((current, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }

        let Some(neighbors) = adjacency.get(current) else {
            continue;
        };

        for &neighbor in neighbors {
            if visited.insert(neighbor) {
                related.push(neighbor.to_owned());
                queue.push_back((neighbor, hops + 1));
            }
        }
    }

    related
}

/// What a navigation command works against.
#[derive(Clone, Copy)]
pub struct NavigationContext<'a> {
    pub visible: &'a [Node],
    pub links: &'a [Link],
    pub boundary: BoundaryBehavior,
    pub announce_depth: usize,
}

#[derive(Clone, Debug, Default)]
pub struct NavigationCursor {
    focused: Option<String>,
    related: Option<RelatedWalk>,
}

#[derive(Clone, Debug)]
struct RelatedWalk {
    anchor: String,
    next: usize,
}

impl NavigationCursor {
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Drops focus silently, used when the dataset is replaced.
    pub fn reset(&mut self) {
        self.focused = None;
        self.related = None;
    }

    /// Runs `command` and returns the new focus, if any.
    pub fn apply(
        &mut self,
        command: NavigationCommand,
        context: NavigationContext<'_>,
        sink: &mut dyn AnnouncementSink,
        observer: &mut dyn FocusObserver,
    ) -> Option<&str> {
        let visible = context.visible;
        let target = match command {
            NavigationCommand::Next | NavigationCommand::Previous => {
                let direction = if command == NavigationCommand::Next {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                match next(self.focused(), visible, direction, context.boundary) {
                    Some(node) => Some(node.id.clone()),
                    None => {
                        sink.announce(match direction {
                            Direction::Forward => "End of list",
                            Direction::Backward => "Start of list",
                        });
                        return self.focused();
                    }
                }
            }
            NavigationCommand::First => visible.first().map(|node| node.id.clone()),
            NavigationCommand::Last => visible.last().map(|node| node.id.clone()),
            NavigationCommand::NextRelated => {
                let Some(target) = self.next_related(context) else {
                    sink.announce("No related nodes");
                    return self.focused();
                };
                self.focus(Some(target), context, sink, observer);
                return self.focused();
            }
            NavigationCommand::Clear => None,
        };

        self.related = None;
        self.focus(target, context, sink, observer);
        self.focused()
    }

    /// Pointer selection. Ids outside the visible set clear focus.
    pub fn select(
        &mut self,
        id: Option<&str>,
        context: NavigationContext<'_>,
        sink: &mut dyn AnnouncementSink,
        observer: &mut dyn FocusObserver,
    ) {
        let target = id
            .filter(|id| context.visible.iter().any(|node| node.id == *id))
            .map(str::to_owned);
        self.related = None;
        self.focus(target, context, sink, observer);
    }

    fn next_related(&mut self, context: NavigationContext<'_>) -> Option<String> {
        let focused = self.focused.clone()?;
        let walk = self.related.take().unwrap_or(RelatedWalk {
            anchor: focused,
            next: 0,
        });

        let neighbors = related_within_depth(&walk.anchor, context.visible, context.links, 1);
        if neighbors.is_empty() {
            return None;
        }

        let target = neighbors[walk.next % neighbors.len()].clone();
        self.related = Some(RelatedWalk {
            anchor: walk.anchor,
            next: walk.next + 1,
        });
        Some(target)
    }

    fn focus(
        &mut self,
        target: Option<String>,
        context: NavigationContext<'_>,
        sink: &mut dyn AnnouncementSink,
        observer: &mut dyn FocusObserver,
    ) {
        if target == self.focused {
            return;
        }
        self.focused = target;
        debug!(focused = ?self.focused, "focus changed");

        let node = self
            .focused
            .as_deref()
            .and_then(|id| context.visible.iter().find(|node| node.id == id));
        match node {
            Some(node) => sink.announce(&describe(node, context)),
            None => sink.announce("Focus cleared"),
        }
        observer.focus_changed(node);
    }
}

/// Name, type, list position, connection count and related count.
pub fn describe(node: &Node, context: NavigationContext<'_>) -> String {
    let position = context
        .visible
        .iter()
        .position(|candidate| candidate.id == node.id)
        .map_or(0, |index| index + 1);
    let connections = context
        .links
        .iter()
        .filter(|link| link.touches(&node.id))
        .count();

    let mut message = format!(
        "{}, {}, {} of {}, {} connections",
        node.display_name,
        node.type_tag,
        position,
        context.visible.len(),
        connections
    );

    if context.announce_depth > 0 {
        let related = related_within_depth(&node.id, context.visible, context.links, context.announce_depth);
        message.push_str(&format!(
            ", {} related within {} hops",
            related.len(),
            context.announce_depth
        ));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter()
            .map(|id| Node::new(*id, id.to_uppercase(), "entity"))
            .collect()
    }

    fn context<'a>(visible: &'a [Node], links: &'a [Link], boundary: BoundaryBehavior) -> NavigationContext<'a> {
        NavigationContext {
            visible,
            links,
            boundary,
            announce_depth: 2,
        }
    }

    #[test]
    fn next_walks_in_visible_order_and_stops() {
        let visible = nodes(&["a", "b", "c"]);
        let stop = BoundaryBehavior::Stop;

        assert_eq!(next(None, &visible, Direction::Forward, stop).map(|n| n.id.as_str()), Some("a"));
        assert_eq!(next(None, &visible, Direction::Backward, stop).map(|n| n.id.as_str()), Some("c"));
        assert_eq!(next(Some("a"), &visible, Direction::Forward, stop).map(|n| n.id.as_str()), Some("b"));
        assert!(next(Some("c"), &visible, Direction::Forward, stop).is_none());
        assert!(next(Some("a"), &visible, Direction::Backward, stop).is_none());
        assert!(next(Some("a"), &[], Direction::Forward, stop).is_none());
    }

    #[test]
    fn wrap_returns_to_the_opposite_end() {
        let visible = nodes(&["a", "b", "c"]);
        let wrap = BoundaryBehavior::Wrap;

        assert_eq!(next(Some("c"), &visible, Direction::Forward, wrap).map(|n| n.id.as_str()), Some("a"));
        assert_eq!(next(Some("a"), &visible, Direction::Backward, wrap).map(|n| n.id.as_str()), Some("c"));
    }

    #[test]
    fn related_within_depth_is_breadth_first_and_undirected() {
        let all = nodes(&["a", "b", "c", "d", "e"]);
        let links = vec![
            Link::new("a", "b", "R"),
            Link::new("c", "a", "R"),
            Link::new("b", "d", "R"),
            Link::new("d", "e", "R"),
            Link::new("a", "ghost", "R"),
        ];
        let before = links.clone();

        assert_eq!(related_within_depth("a", &all, &links, 1), vec!["b", "c"]);
        assert_eq!(related_within_depth("a", &all, &links, 2), vec!["b", "c", "d"]);
        assert!(related_within_depth("a", &all, &links, 0).is_empty());
        assert!(related_within_depth("ghost", &all, &links, 3).is_empty());
        assert_eq!(links, before);
    }

    #[test]
    fn commands_announce_focus_changes() {
        let visible = nodes(&["a", "b", "c"]);
        let links = vec![Link::new("a", "b", "R")];
        let context = context(&visible, &links, BoundaryBehavior::Stop);
        let mut cursor = NavigationCursor::default();
        let mut messages = Vec::<String>::new();
        let mut focus_log = Vec::<Option<String>>::new();

        cursor.apply(NavigationCommand::Next, context, &mut messages, &mut focus_log);
        assert_eq!(cursor.focused(), Some("a"));
        assert_eq!(messages[0], "A, entity, 1 of 3, 1 connections, 1 related within 2 hops");

        cursor.apply(NavigationCommand::Last, context, &mut messages, &mut focus_log);
        cursor.apply(NavigationCommand::Next, context, &mut messages, &mut focus_log);
        assert_eq!(cursor.focused(), Some("c"));
        assert_eq!(messages.last().map(String::as_str), Some("End of list"));

        cursor.apply(NavigationCommand::Clear, context, &mut messages, &mut focus_log);
        assert_eq!(cursor.focused(), None);
        assert_eq!(
            focus_log,
            vec![Some("a".to_owned()), Some("c".to_owned()), None]
        );
    }

    #[test]
    fn next_related_cycles_neighbors_of_the_anchor() {
        let visible = nodes(&["hub", "x", "y", "z"]);
        let links = vec![Link::new("hub", "x", "R"), Link::new("y", "hub", "R")];
        let context = context(&visible, &links, BoundaryBehavior::Stop);
        let mut cursor = NavigationCursor::default();

        cursor.apply(NavigationCommand::First, context, &mut (), &mut ());
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(
                cursor
                    .apply(NavigationCommand::NextRelated, context, &mut (), &mut ())
                    .map(str::to_owned),
            );
        }
        assert_eq!(
            seen,
            vec![Some("x".to_owned()), Some("y".to_owned()), Some("x".to_owned())]
        );

        let mut messages = Vec::<String>::new();
        cursor.apply(NavigationCommand::Last, context, &mut messages, &mut ());
        cursor.apply(NavigationCommand::NextRelated, context, &mut messages, &mut ());
        assert_eq!(cursor.focused(), Some("z"));
        assert_eq!(messages.last().map(String::as_str), Some("No related nodes"));
    }

    #[test]
    fn select_ignores_hidden_ids() {
        let visible = nodes(&["a", "b"]);
        let context = context(&visible, &[], BoundaryBehavior::Stop);
        let mut cursor = NavigationCursor::default();
        let (tx, rx) = std::sync::mpsc::channel();
        let mut sink = tx;

        cursor.select(Some("b"), context, &mut sink, &mut ());
        assert_eq!(cursor.focused(), Some("b"));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("B, entity, 2 of 2, 0 connections, 0 related within 2 hops"));

        cursor.select(Some("hidden"), context, &mut sink, &mut ());
        assert_eq!(cursor.focused(), None);
    }
}
