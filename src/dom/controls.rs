use crate::dom::element::NodeRef;
use crate::dom::tree::{DomNode, DomTree, NodeId};
use indexmap::IndexMap;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// A disclosure control found in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Control {
    /// Reference of the live element to activate
    pub node_ref: NodeRef,

    /// Element's tag name
    pub tag_name: String,

    /// Element's text content
    pub text: String,

    /// Comment node enclosing the control, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<NodeRef>,
}

impl Control {
    pub fn new(node_ref: NodeRef, tag_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_ref,
            tag_name: tag_name.into(),
            text: text.into(),
            owner: None,
        }
    }

    /// Builder method: set the enclosing comment node
    pub fn with_owner(mut self, owner: NodeRef) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Controls matched in one snapshot, in document order
#[derive(Debug, Clone, Default)]
pub struct ControlMap {
    map: IndexMap<NodeRef, Control>,
}

impl ControlMap {
    pub fn new() -> Self {
        Self { map: IndexMap::new() }
    }

    /// Collect every control whose text matches `patterns`.
    ///
    /// Candidates are `div[role=button]`, `span[role=button]`, `a[href]` and
    /// plain `span`. Anchors pointing at fragments or absolute URLs are
    /// navigation, not disclosure, and are skipped. A match nested inside an
    /// earlier match is the same control and is skipped.
    pub fn scan(tree: &DomTree, patterns: &RegexSet) -> Self {
        let mut controls = Self::new();
        let mut matched: Vec<NodeId> = Vec::new();

        for id in tree.select(tree.root(), is_candidate) {
            let node = tree.node(id);
            let Some(node_ref) = node.node_ref else {
                continue;
            };
            if matched.iter().any(|&outer| tree.contains(outer, id)) {
                continue;
            }

            let text = tree.text_content(id);
            if !patterns.is_match(&text) {
                continue;
            }

            let mut control = Control::new(node_ref, node.tag_name.clone(), text.trim());
            if let Some(owner) = tree
                .ancestors(id)
                .find(|&a| tree.node(a).has_role("article"))
                .and_then(|a| tree.node_ref(a))
            {
                control = control.with_owner(owner);
            }

            matched.push(id);
            controls.register(control);
        }

        controls
    }

    /// Register a control, keeping the first registration for a reference
    fn register(&mut self, control: Control) {
        self.map.entry(control.node_ref).or_insert(control);
    }

    /// Iterate over controls in document order
    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.map.values()
    }
}

fn is_candidate(node: &DomNode) -> bool {
    if node.is_tag("a") {
        return node
            .attr("href")
            .is_some_and(|href| !href.starts_with('#') && !href.starts_with("http"));
    }
    node.is_tag("span") || (node.is_tag("div") && node.has_role("button"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementNode;
    use crate::patterns::{MORE_COMMENT_CONTROLS, REPLY_CONTROLS};

    fn thread() -> DomTree {
        let root = ElementNode::new("div")
            .with_attr("role", "dialog")
            .with_ref(1)
            .with_child(
                ElementNode::new("div")
                    .with_attr("role", "article")
                    .with_attr("aria-label", "Comment by Ann")
                    .with_ref(2)
                    .with_child(
                        ElementNode::new("div")
                            .with_attr("role", "button")
                            .with_ref(3)
                            .with_child(ElementNode::new("span").with_ref(4).with_text("View 2 replies")),
                    ),
            )
            .with_child(ElementNode::new("a").with_attr("href", "https://example.com/3-replies").with_ref(5).with_text("3 replies"))
            .with_child(ElementNode::new("a").with_attr("href", "#").with_ref(6).with_text("4 replies"))
            .with_child(ElementNode::new("span").with_ref(7).with_text("View more comments"))
            .with_child(ElementNode::new("p").with_ref(8).with_text("View 9 replies"));
        DomTree::new(root)
    }

    #[test]
    fn test_scan_activates_outer_control_once() {
        let controls: Vec<_> = ControlMap::scan(&thread(), &REPLY_CONTROLS).iter().cloned().collect();

        // The nested span 4 and the navigation anchors 5 and 6 are not controls
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].node_ref, NodeRef(3));
        assert_eq!(controls[0].text, "View 2 replies");
        assert_eq!(controls[0].owner, Some(NodeRef(2)));
    }

    #[test]
    fn test_scan_more_comments() {
        let controls: Vec<_> = ControlMap::scan(&thread(), &MORE_COMMENT_CONTROLS).iter().cloned().collect();
        assert_eq!(controls, vec![Control::new(NodeRef(7), "span", "View more comments")]);
    }

    #[test]
    fn test_register_keeps_first() {
        let mut map = ControlMap::new();
        map.register(Control::new(NodeRef(1), "span", "first"));
        map.register(Control::new(NodeRef(1), "span", "second"));

        let texts: Vec<_> = map.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first"]);
    }
}
