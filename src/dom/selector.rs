//! Stable, low-cardinality selectors for attribution targets.
//!
//! Class names are sorted so `div.b.a` and `div.a.b` report the same
//! string, and the walk stops at the first ancestor with an id.

use crate::dom::{NodeType, TargetNode};

/// Longest selector reported before ancestor parts are dropped.
pub const MAX_SELECTOR_LEN: usize = 100;

pub fn selector(node: &TargetNode) -> String {
    selector_with_max_len(node, MAX_SELECTOR_LEN)
}

pub fn selector_with_max_len(node: &TargetNode, max_len: usize) -> String {
    let mut sel = String::new();

    for current in node.ancestors() {
        if current.node_type == NodeType::Document {
            break;
        }
        let part = selector_part(current);
        if sel.len() + part.len() > max_len.saturating_sub(1) {
            return if sel.is_empty() { part } else { sel };
        }
        sel = if sel.is_empty() {
            part
        } else {
            format!("{part}>{sel}")
        };
        if has_id(current) {
            break;
        }
    }
    sel
}

fn has_id(node: &TargetNode) -> bool {
    node.id.as_deref().is_some_and(|id| !id.is_empty())
}

fn selector_part(node: &TargetNode) -> String {
    if let Some(id) = node.id.as_deref().filter(|id| !id.is_empty()) {
        return format!("#{id}");
    }
    let mut classes: Vec<&str> = node.classes.iter().map(String::as_str).collect();
    classes.sort_unstable();
    std::iter::once(node_name(node))
        .chain(classes.into_iter().map(str::to_string))
        .collect::<Vec<_>>()
        .join(".")
}

fn node_name(node: &TargetNode) -> String {
    match node.node_type {
        NodeType::Element => node.name.to_lowercase(),
        _ => node.name.to_uppercase().trim_start_matches('#').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn body() -> Arc<TargetNode> {
        TargetNode::element("BODY", Some(TargetNode::document())).into_arc()
    }

    #[test]
    fn classes_are_sorted() {
        let a = TargetNode::element("div", Some(body()))
            .with_class("zeta")
            .with_class("alpha");
        let b = TargetNode::element("div", Some(body()))
            .with_class("alpha")
            .with_class("zeta");
        assert_eq!(selector(&a), "body>div.alpha.zeta");
        assert_eq!(selector(&a), selector(&b));
    }

    #[test]
    fn stops_at_first_id() {
        let app = TargetNode::element("div", Some(body())).with_id("app").into_arc();
        let btn = TargetNode::element("button", Some(app)).with_class("cta");
        assert_eq!(selector(&btn), "#app>button.cta");
    }

    #[test]
    fn text_nodes_use_upper_case_name() {
        let p = TargetNode::element("p", Some(body())).into_arc();
        let text = TargetNode::text(p);
        assert_eq!(selector(&text), "body>p>TEXT");
    }

    #[test]
    fn long_chains_drop_outer_ancestors() {
        let mut node = body();
        for i in 0..20 {
            node = TargetNode::element("div", Some(node))
                .with_class(format!("level-{i}"))
                .into_arc();
        }
        let sel = selector(&node);
        assert!(sel.len() < MAX_SELECTOR_LEN);
        assert!(sel.ends_with("div.level-19"));
        assert!(!sel.starts_with("body"));
    }

    #[test]
    fn single_oversized_part_is_kept() {
        let long_class = "x".repeat(150);
        let node = TargetNode::element("span", Some(body())).with_class(long_class.clone());
        assert_eq!(selector(&node), format!("span.{long_class}"));
    }
}
