//! Quota planner: per-category, score-ranked truncation.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use corpusfetch_shared::CandidateItem;

/// Cap `items` at `per_category_limit` per category.
///
/// Groups come out in ascending category order. Within a group items are
/// ranked by score, highest first, with missing scores last and ties in input
/// order. The first occurrence of a URL wins across the whole plan.
pub fn plan(items: Vec<CandidateItem>, per_category_limit: usize) -> Vec<CandidateItem> {
    let mut groups: BTreeMap<String, Vec<CandidateItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.category.clone()).or_default().push(item);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut planned = Vec::new();

    for (category, mut group) in groups {
        // `sort_by` is stable, so equal scores keep input order.
        group.sort_by(|a, b| match (a.score, b.score) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        let total = group.len();
        group.truncate(per_category_limit);
        debug!(category = %category, total, kept = group.len(), "category capped");

        for item in group {
            if seen.insert(item.url.clone()) {
                planned.push(item);
            }
        }
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, category: &str, score: Option<f64>) -> CandidateItem {
        CandidateItem {
            url: url.into(),
            title: String::new(),
            category: category.into(),
            source_domain: String::new(),
            publish_date: String::new(),
            score,
        }
    }

    fn urls(items: &[CandidateItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn quota_keeps_top_scores_per_category() {
        let items = vec![
            item("a1", "A", Some(0.1)),
            item("a2", "A", Some(0.9)),
            item("a3", "A", Some(0.5)),
            item("b1", "B", Some(0.3)),
        ];
        let planned = plan(items, 2);
        assert_eq!(urls(&planned), ["a2", "a3", "b1"]);
    }

    #[test]
    fn categories_come_out_sorted() {
        let items = vec![item("z", "Zeta", None), item("a", "Alpha", None), item("e", "", None)];
        assert_eq!(urls(&plan(items, 10)), ["e", "a", "z"]);
    }

    #[test]
    fn ties_keep_input_order_and_missing_scores_sink() {
        let items = vec![
            item("none", "A", None),
            item("first", "A", Some(0.5)),
            item("second", "A", Some(0.5)),
            item("top", "A", Some(0.7)),
        ];
        assert_eq!(urls(&plan(items, 10)), ["top", "first", "second", "none"]);
    }

    #[test]
    fn duplicate_urls_are_dropped_after_capping() {
        let items = vec![
            item("dup", "A", Some(0.9)),
            item("dup", "B", Some(0.9)),
            item("dup", "A", Some(0.1)),
            item("other", "B", Some(0.2)),
        ];
        let planned = plan(items, 10);
        assert_eq!(urls(&planned), ["dup", "other"]);
        assert_eq!(planned[0].category, "A");
    }

    #[test]
    fn per_category_count_never_exceeds_limit() {
        let items: Vec<_> = (0..50)
            .map(|i| item(&format!("u{i}"), if i % 3 == 0 { "A" } else { "B" }, Some(i as f64)))
            .collect();
        let planned = plan(items, 7);
        for cat in ["A", "B"] {
            assert!(planned.iter().filter(|i| i.category == cat).count() <= 7);
        }
        assert_eq!(planned.len(), 14);
    }

    #[test]
    fn zero_limit_plans_nothing() {
        assert!(plan(vec![item("a", "A", Some(1.0))], 0).is_empty());
    }
}
