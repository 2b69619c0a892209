#[cfg(feature = "html")]
pub mod parser;
pub mod selector;

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
}

/// Owned snapshot of a DOM node referenced by a timing entry.
///
/// Unlike a live DOM, the ancestor chain is frozen at the time the host
/// captured the entry, so a node that was later detached still describes
/// where it used to be.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetNode {
    pub node_type: NodeType,
    /// Tag name for elements, `#text` / `#comment` / `#document` otherwise
    pub name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub parent: Option<Arc<TargetNode>>,
}

impl TargetNode {
    pub fn document() -> Arc<Self> {
        Arc::new(Self {
            node_type: NodeType::Document,
            name: "#document".into(),
            id: None,
            classes: Vec::new(),
            parent: None,
        })
    }

    pub fn element(tag: impl Into<String>, parent: Option<Arc<TargetNode>>) -> Self {
        Self {
            node_type: NodeType::Element,
            name: tag.into(),
            id: None,
            classes: Vec::new(),
            parent,
        }
    }

    pub fn text(parent: Arc<TargetNode>) -> Arc<Self> {
        Arc::new(Self {
            node_type: NodeType::Text,
            name: "#text".into(),
            id: None,
            classes: Vec::new(),
            parent: Some(parent),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// This node followed by each of its ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Number of nodes between this one and the root, inclusive
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }
}

pub struct Ancestors<'a> {
    next: Option<&'a TargetNode>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TargetNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}
