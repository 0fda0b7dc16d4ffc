use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag name used for text nodes in a snapshot
pub const TEXT_TAG: &str = "#text";

/// Stable reference to a live element, stamped on it as `data-ce-ref`.
///
/// The stamp survives across snapshots, so the same live element keeps the same
/// reference for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub u64);

impl NodeRef {
    /// Attribute the reference is stamped under in the live document
    pub const ATTRIBUTE: &'static str = "data-ce-ref";

    /// CSS selector matching the live element
    pub fn selector(&self) -> String {
        format!("[{}=\"{}\"]", Self::ATTRIBUTE, self.0)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Computed left spacing of a comment node
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoxStyle {
    pub padding_left: f64,
    pub margin_left: f64,
}

impl BoxStyle {
    pub fn new(padding_left: f64, margin_left: f64) -> Self {
        Self { padding_left, margin_left }
    }

    /// Combined left offset
    pub fn indent(&self) -> f64 {
        self.padding_left + self.margin_left
    }
}

/// One node of a document snapshot, as serialized by the snapshot script.
///
/// Text nodes use the tag name `#text` and carry their text in `text_content`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// Lowercase tag name (e.g., "div", "span", "a"), or `#text`
    pub tag_name: String,

    /// Attributes in document order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Text of a text node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child nodes in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Reference stamped on the live element
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<NodeRef>,

    /// Computed left spacing (recorded for comment nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_style: Option<BoxStyle>,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: IndexMap::new(),
            text_content: None,
            children: Vec::new(),
            node_ref: None,
            box_style: None,
        }
    }

    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        let mut node = Self::new(TEXT_TAG);
        node.text_content = Some(text.into());
        node
    }

    /// Builder method: add one attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: append a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Self::text(text));
        self
    }

    /// Builder method: append a child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: set the live reference
    pub fn with_ref(mut self, node_ref: u64) -> Self {
        self.node_ref = Some(NodeRef(node_ref));
        self
    }

    /// Builder method: set the computed left spacing
    pub fn with_box_style(mut self, padding_left: f64, margin_left: f64) -> Self {
        self.box_style = Some(BoxStyle::new(padding_left, margin_left));
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Add a child node
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Check if this is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    pub fn is_text(&self) -> bool {
        self.tag_name == TEXT_TAG
    }

    /// Drop script-like children that never carry visible text
    pub fn simplify(&mut self) {
        self.children.retain(|child| {
            !matches!(child.tag_name.as_str(), "script" | "style" | "noscript" | "template")
        });

        for child in &mut self.children {
            child.simplify();
        }
    }

    /// Stamp a fresh reference on every element that lacks one, the way the
    /// snapshot script stamps live elements.
    pub fn stamp_refs(&mut self, next: &mut u64) {
        if !self.is_text() && self.node_ref.is_none() {
            self.node_ref = Some(NodeRef(*next));
            *next += 1;
        }
        for child in &mut self.children {
            child.stamp_refs(next);
        }
    }

    /// Highest reference stamped in this subtree
    pub fn max_ref(&self) -> Option<NodeRef> {
        self.children
            .iter()
            .filter_map(ElementNode::max_ref)
            .chain(self.node_ref)
            .max()
    }

    /// Find a node in this subtree by reference
    pub fn find_by_ref(&self, node_ref: NodeRef) -> Option<&ElementNode> {
        if self.node_ref == Some(node_ref) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_ref(node_ref))
    }

    /// Find a node in this subtree by reference, mutably
    pub fn find_by_ref_mut(&mut self, node_ref: NodeRef) -> Option<&mut ElementNode> {
        if self.node_ref == Some(node_ref) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_by_ref_mut(node_ref))
    }

    /// Replace the node with the given reference by `replacement`, in place.
    /// Returns false when no such node is below `self`.
    pub fn replace_by_ref(&mut self, node_ref: NodeRef, replacement: Vec<ElementNode>) -> bool {
        if let Some(pos) = self.children.iter().position(|c| c.node_ref == Some(node_ref)) {
            self.children.splice(pos..=pos, replacement);
            return true;
        }
        let mut replacement = Some(replacement);
        for child in &mut self.children {
            if child.find_by_ref(node_ref).is_some() {
                return child.replace_by_ref(node_ref, replacement.take().unwrap_or_default());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let element = ElementNode::new("div")
            .with_attr("role", "article")
            .with_attr("aria-label", "Comment by Ann")
            .with_text("Hello")
            .with_ref(7)
            .with_box_style(40.0, 0.0);

        assert_eq!(element.tag_name, "div");
        assert_eq!(element.attributes.get("role").map(String::as_str), Some("article"));
        assert_eq!(element.children.len(), 1);
        assert!(element.children[0].is_text());
        assert_eq!(element.node_ref, Some(NodeRef(7)));
        assert_eq!(element.box_style.map(|s| s.indent()), Some(40.0));
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let element = ElementNode::new("a")
            .with_attr("href", "/ann")
            .with_attr("class", "x1")
            .with_attr("aria-label", "Ann");

        let keys: Vec<_> = element.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["href", "class", "aria-label"]);
    }

    #[test]
    fn test_simplify() {
        let mut parent = ElementNode::new("div")
            .with_child(ElementNode::new("p").with_text("Content"))
            .with_child(ElementNode::new("script").with_text("alert('test')"))
            .with_child(ElementNode::new("style").with_text(".test { color: red; }"))
            .with_child(ElementNode::new("span").with_text("More content"));

        parent.simplify();

        assert_eq!(parent.children.len(), 2);
        assert!(parent.children[0].is_tag("p"));
        assert!(parent.children[1].is_tag("span"));
    }

    #[test]
    fn test_stamp_refs_skips_text_and_existing() {
        let mut root = ElementNode::new("div")
            .with_child(ElementNode::new("span").with_ref(100).with_text("x"))
            .with_child(ElementNode::new("span"));

        let mut next = 1;
        root.stamp_refs(&mut next);

        assert_eq!(root.node_ref, Some(NodeRef(1)));
        assert_eq!(root.children[0].node_ref, Some(NodeRef(100)));
        assert_eq!(root.children[0].children[0].node_ref, None);
        assert_eq!(root.children[1].node_ref, Some(NodeRef(2)));
        assert_eq!(root.max_ref(), Some(NodeRef(100)));
    }

    #[test]
    fn test_replace_by_ref() {
        let mut root = ElementNode::new("div").with_ref(1).with_child(
            ElementNode::new("ul")
                .with_ref(2)
                .with_child(ElementNode::new("span").with_ref(3).with_text("View 2 replies")),
        );

        let replaced = root.replace_by_ref(
            NodeRef(3),
            vec![ElementNode::new("li").with_ref(4), ElementNode::new("li").with_ref(5)],
        );

        assert!(replaced);
        assert!(root.find_by_ref(NodeRef(3)).is_none());
        assert_eq!(root.children[0].children.len(), 2);
        assert!(!root.replace_by_ref(NodeRef(99), Vec::new()));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = r##"{
            "tag_name": "div",
            "attributes": {"role": "article", "aria-label": "Comment by Ann"},
            "ref": 12,
            "box_style": {"padding_left": 0, "margin_left": 40},
            "children": [{"tag_name": "#text", "text_content": "Hi"}]
        }"##;

        let node: ElementNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.node_ref, Some(NodeRef(12)));
        assert_eq!(node.box_style, Some(BoxStyle::new(0.0, 40.0)));
        assert_eq!(node.children[0].text_content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_node_ref_selector() {
        assert_eq!(NodeRef(42).selector(), r#"[data-ce-ref="42"]"#);
        assert_eq!(NodeRef(42).to_string(), "#42");
    }
}
