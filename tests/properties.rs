use std::collections::HashSet;

use graph_lens::export::{ExportFormat, serialize};
use graph_lens::filter::{FilterConfig, select};
use graph_lens::navigation::{BoundaryBehavior, Direction, next};
use graph_lens::reveal::{RevealState, revealed_links};
use graph_lens::settings::RevealSettings;
use graph_lens::{GraphDataset, Link, Node, compute_profile};
use proptest::prelude::*;

fn dataset_strategy() -> impl Strategy<Value = GraphDataset> {
    (0usize..40).prop_flat_map(|node_count| {
        let links = if node_count == 0 {
            Just(Vec::new()).boxed()
        } else {
            prop::collection::vec((0..node_count, 0..node_count), 0..80).boxed()
        };
        links.prop_map(move |pairs| {
            let nodes = (0..node_count)
                .map(|index| Node::new(format!("n{index}"), format!("Node {index}"), format!("t{}", index % 3)))
                .collect::<Vec<_>>();
            let links = pairs
                .into_iter()
                .map(|(source, target)| Link::new(format!("n{source}"), format!("n{target}"), "R"))
                .collect::<Vec<_>>();
            GraphDataset::new(nodes, links)
        })
    })
}

fn filter_strategy() -> impl Strategy<Value = (FilterConfig, Option<usize>)> {
    (-5i64..50, 0.0f32..1.0, 0usize..3, prop::option::of(0usize..45)).prop_map(
        |(max_visible_nodes, importance_threshold, max_relationship_depth, focus)| {
            (
                FilterConfig {
                    focus_id: None,
                    max_visible_nodes,
                    importance_threshold,
                    max_relationship_depth,
                },
                focus,
            )
        },
    )
}

fn ids(nodes: &[Node]) -> HashSet<&str> {
    nodes.iter().map(|node| node.id.as_str()).collect()
}

fn assert_no_dangling(nodes: &[Node], links: &[Link]) {
    let known = ids(nodes);
    for link in links {
        assert!(known.contains(link.source_id.as_str()));
        assert!(known.contains(link.target_id.as_str()));
    }
}

proptest! {
    #[test]
    fn visible_set_respects_the_budget(dataset in dataset_strategy(), (config, focus) in filter_strategy()) {
        let focus_id = focus.map(|index| format!("n{index}"));
        let visible = select(&dataset, focus_id.as_deref(), &config);

        if config.max_visible_nodes > 0 {
            prop_assert!(visible.node_count() <= config.max_visible_nodes as usize);
        } else {
            prop_assert_eq!(visible.node_count(), dataset.node_count());
        }

        if let Some(id) = focus_id.as_deref()
            && dataset.contains(id)
        {
            prop_assert!(visible.position_of(id).is_some());
        }

        let unique = ids(&visible.nodes);
        prop_assert_eq!(unique.len(), visible.node_count());
    }

    #[test]
    fn sampling_and_reveal_never_leave_dangling_links(
        dataset in dataset_strategy(),
        (config, focus) in filter_strategy(),
        batch_size in 1usize..10,
        batches in 0usize..6,
    ) {
        let focus_id = focus.map(|index| format!("n{index}"));
        let visible = select(&dataset, focus_id.as_deref(), &config);
        assert_no_dangling(&visible.nodes, &visible.links);

        let settings = RevealSettings { enabled: true, threshold: 0, batch_size, ..RevealSettings::default() };
        let mut reveal = RevealState::new(visible.node_count(), &settings);
        for _ in 0..batches {
            reveal.advance();
        }
        let prefix = reveal.revealed(&visible.nodes);
        assert_no_dangling(prefix, &revealed_links(prefix, &visible.links));
    }

    #[test]
    fn sampling_is_deterministic(dataset in dataset_strategy(), (config, focus) in filter_strategy()) {
        let focus_id = focus.map(|index| format!("n{index}"));
        let first = select(&dataset, focus_id.as_deref(), &config);
        let second = select(&dataset, focus_id.as_deref(), &config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn detail_only_grows_with_zoom(low in 0.01f32..10.0, extra in 0.0f32..10.0, node_count in 0usize..20_000) {
        let near = compute_profile(low + extra, node_count);
        let far = compute_profile(low, node_count);

        prop_assert!(near.node_radius_multiplier >= far.node_radius_multiplier);
        prop_assert!(!far.show_labels || near.show_labels);
    }

    #[test]
    fn reveal_grows_until_complete(total in 0usize..2_000, batch_size in 0usize..300) {
        let settings = RevealSettings { enabled: true, threshold: 0, batch_size, ..RevealSettings::default() };
        let mut reveal = RevealState::new(total, &settings);
        let max_steps = total.div_ceil(batch_size.max(1));

        let mut previous = reveal.revealed_count();
        let mut steps = 0;
        while reveal.advance() {
            prop_assert!(reveal.revealed_count() > previous);
            prop_assert!(reveal.revealed_count() <= total);
            previous = reveal.revealed_count();
            steps += 1;
        }
        prop_assert!(steps <= max_steps);
        prop_assert!(reveal.is_complete());
        prop_assert_eq!(reveal.revealed_count(), total);
    }

    #[test]
    fn navigation_stays_inside_the_visible_set(count in 0usize..30, wrap in any::<bool>()) {
        let visible = (0..count)
            .map(|index| Node::new(format!("v{index}"), "v", "t"))
            .collect::<Vec<_>>();
        let boundary = BoundaryBehavior::from_wrap(wrap);

        let mut current: Option<String> = None;
        let mut visited = Vec::new();
        for _ in 0..count + 2 {
            match next(current.as_deref(), &visible, Direction::Forward, boundary) {
                Some(node) => {
                    prop_assert!(visible.iter().any(|candidate| candidate.id == node.id));
                    visited.push(node.id.clone());
                    current = Some(node.id.clone());
                }
                None => {
                    prop_assert!(!wrap || count == 0);
                    break;
                }
            }
        }

        let in_order = visible.iter().map(|node| node.id.clone()).collect::<Vec<_>>();
        prop_assert_eq!(&visited[..count.min(visited.len())], &in_order[..count.min(visited.len())]);
        if !wrap {
            prop_assert_eq!(visited.len(), count);
        }
    }

    #[test]
    fn json_export_keeps_every_element(dataset in dataset_strategy()) {
        let text = serialize(&dataset, ExportFormat::Json);
        let parsed = GraphDataset::from_json(&text).expect("export parses");
        prop_assert_eq!(parsed.node_count(), dataset.node_count());
        prop_assert_eq!(parsed.link_count(), dataset.link_count());
    }
}
