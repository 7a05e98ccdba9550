use std::collections::HashSet;

use graph_lens::export::{ExportFormat, serialize};
use graph_lens::filter::{FilterConfig, select};
use graph_lens::reveal::RevealState;
use graph_lens::settings::RevealSettings;
use graph_lens::{EngineSettings, GraphDataset, GraphSession, Link, Node, compute_profile};

/// 1000 nodes and 2000 links. `n1` links to `n2..=n6` and nothing else.
fn thousand_node_dataset() -> GraphDataset {
    let nodes = (0..1000)
        .map(|index| Node::new(format!("n{index}"), format!("Node {index}"), "entity"))
        .collect::<Vec<_>>();

    let mut links = (2..=6)
        .map(|index| Link::new("n1", format!("n{index}"), "NEAR"))
        .collect::<Vec<_>>();
    for step in 0..1995usize {
        let source = 7 + step % 993;
        let mut target = 7 + (step * 7 + 3) % 993;
        if target == source {
            target = 7 + (target - 6) % 993;
        }
        links.push(Link::new(
            format!("n{source}"),
            format!("n{target}"),
            "RELATED",
        ));
    }

    GraphDataset::new(nodes, links)
}

#[test]
fn focused_sample_keeps_focus_neighbors_and_induced_links() {
    let dataset = thousand_node_dataset();
    assert_eq!(dataset.node_count(), 1000);
    assert_eq!(dataset.link_count(), 2000);

    let config = FilterConfig {
        max_visible_nodes: 100,
        ..FilterConfig::default()
    };
    let visible = select(&dataset, Some("n1"), &config);

    assert_eq!(visible.node_count(), 100);
    let ids = visible
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(&ids[..6], &["n1", "n2", "n3", "n4", "n5", "n6"]);

    let chosen = ids.iter().copied().collect::<HashSet<_>>();
    let expected_links = dataset
        .links()
        .iter()
        .filter(|link| {
            chosen.contains(link.source_id.as_str()) && chosen.contains(link.target_id.as_str())
        })
        .count();
    assert_eq!(visible.links.len(), expected_links);
}

#[test]
fn labels_wait_for_zoom_on_dense_graphs() {
    assert!(!compute_profile(1.0, 5000).show_labels);
    assert!(compute_profile(4.0, 5000).show_labels);
}

#[test]
fn reveal_caps_at_the_visible_count() {
    let settings = RevealSettings {
        enabled: true,
        threshold: 100,
        batch_size: 50,
        ..RevealSettings::default()
    };
    let mut reveal = RevealState::new(237, &settings);

    reveal.advance();
    assert_eq!(reveal.revealed_count(), 50);
    for _ in 0..4 {
        reveal.advance();
    }
    assert_eq!(reveal.revealed_count(), 237);
    assert!(reveal.is_complete());
    assert!(!reveal.advance());
}

#[test]
fn csv_export_has_one_row_per_element() {
    let dataset = GraphDataset::new(
        vec![
            Node::new("a", "Alice", "Person"),
            Node::new("b", "Bob", "Person"),
            Node::new("c", "Acme", "Company"),
        ],
        vec![Link::new("a", "b", "KNOWS"), Link::new("b", "c", "WORKS_AT")],
    );
    let text = serialize(&dataset, ExportFormat::Csv);
    let (nodes, links) = text
        .split_once("\n\n")
        .expect("sections are separated by a blank line");

    assert_eq!(nodes.lines().skip(1).count(), 3);
    assert_eq!(links.lines().skip(1).count(), 2);
}

#[test]
fn headless_session_settles_the_sampled_graph() {
    let mut settings = EngineSettings::default();
    settings.filter.max_visible_nodes = 100;
    settings.filter.focus_id = Some("n1".to_owned());
    let mut session = GraphSession::new(thousand_node_dataset(), settings);

    session.settle_now();

    assert!(!session.needs_frame());
    assert_eq!(session.focus_id(), Some("n1"));
    assert_eq!(session.rendered_nodes().len(), 100);

    let frame = session.frame();
    assert!(frame.layout_ready);
    assert_eq!(frame.nodes.len(), 100);
    assert!(frame.sampled);
    assert!(
        frame
            .nodes
            .iter()
            .all(|node| node.position.x.is_finite() && node.position.y.is_finite())
    );

    let exported = GraphDataset::from_json(&session.export(ExportFormat::Json))
        .expect("json export parses");
    assert_eq!(exported.node_count(), 1000);
    assert_eq!(exported.link_count(), 2000);
}
