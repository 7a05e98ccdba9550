use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::graph::Node;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub score: i64,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Fuzzy-ranks nodes by display name and id, best first. Equal scores keep
/// input order.
pub fn search(nodes: &[Node], query: &str, limit: usize) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut hits = nodes
        .iter()
        .filter_map(|node| {
            let by_name = fuzzy_match_score(&matcher, &node.display_name, query);
            let by_id = fuzzy_match_score(&matcher, &node.id, query);
            let score = by_name.max(by_id)?;
            Some(SearchHit {
                id: node.id.clone(),
                score,
            })
        })
        .collect::<Vec<_>>();

    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(limit);
    hits
}
