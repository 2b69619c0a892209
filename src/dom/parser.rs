use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::dom::{NodeType, TargetNode};

/// Snapshot a parsed element together with its full ancestor chain.
pub fn target_from_element(el: ElementRef<'_>) -> Arc<TargetNode> {
    let mut chain: Vec<ElementRef<'_>> = el.ancestors().filter_map(ElementRef::wrap).collect();
    chain.reverse();

    let mut parent = TargetNode::document();
    for ancestor in chain {
        parent = Arc::new(convert_element(ancestor, parent));
    }
    Arc::new(convert_element(el, parent))
}

/// Parse `html` and snapshot the first element matching `css`.
///
/// Returns `None` for an invalid selector or no match.
pub fn select_target(html: &str, css: &str) -> Option<Arc<TargetNode>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(css).ok()?;
    let found = document.select(&selector).next()?;
    Some(target_from_element(found))
}

fn convert_element(el: ElementRef<'_>, parent: Arc<TargetNode>) -> TargetNode {
    let value = el.value();
    TargetNode {
        node_type: NodeType::Element,
        name: value.name().to_string(),
        id: value.id().map(str::to_string),
        classes: value.classes().map(str::to_string).collect(),
        parent: Some(parent),
    }
}
