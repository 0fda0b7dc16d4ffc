use crate::dom::element::{BoxStyle, ElementNode, NodeRef, TEXT_TAG};
use crate::error::{Result, ScrapeError};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Position of a node inside a [`DomTree`]. Ids follow document order.
pub type NodeId = usize;

/// A flattened snapshot node with parent/child links
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag_name: String,
    pub attributes: IndexMap<String, String>,
    /// Text of a text node
    pub text: Option<String>,
    pub node_ref: Option<NodeRef>,
    pub box_style: Option<BoxStyle>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// One past the last id of this node's subtree
    subtree_end: NodeId,
}

impl DomNode {
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    pub fn is_text(&self) -> bool {
        self.tag_name == TEXT_TAG
    }

    pub fn is_element(&self) -> bool {
        !self.is_text()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.attr("role") == Some(role)
    }

    pub fn aria_label(&self) -> Option<&str> {
        self.attr("aria-label")
    }

    pub fn class_name(&self) -> &str {
        self.attr("class").unwrap_or("")
    }
}

/// Snapshot of a document subtree, stored in document order.
///
/// The snapshot root (normally the thread container) has id 0. Because ids are
/// assigned in pre-order, the descendants of a node form the contiguous id range
/// right after it.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    by_ref: HashMap<NodeRef, NodeId>,
}

impl DomTree {
    /// Build a tree from a snapshot root
    pub fn new(mut root: ElementNode) -> Self {
        root.simplify();
        let mut tree = Self {
            nodes: Vec::new(),
            by_ref: HashMap::new(),
        };
        tree.push_node(root, None);
        tree
    }

    /// Parse the JSON produced by the snapshot script
    pub fn from_json(json: &str) -> Result<Self> {
        let root: ElementNode = serde_json::from_str(json)
            .map_err(|e| ScrapeError::SnapshotFailed(format!("Failed to parse snapshot JSON: {}", e)))?;
        Ok(Self::new(root))
    }

    fn push_node(&mut self, element: ElementNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        let ElementNode {
            tag_name,
            attributes,
            text_content,
            children,
            node_ref,
            box_style,
        } = element;

        if let Some(node_ref) = node_ref {
            self.by_ref.entry(node_ref).or_insert(id);
        }

        self.nodes.push(DomNode {
            tag_name,
            attributes,
            text: text_content,
            node_ref,
            box_style,
            parent,
            children: Vec::new(),
            subtree_end: id + 1,
        });

        for child in children {
            let child_id = self.push_node(child, Some(id));
            self.nodes[id].children.push(child_id);
        }

        self.nodes[id].subtree_end = self.nodes.len();
        id
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by id
    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    /// Get a node by id. Ids handed out by this tree are always valid.
    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id]
    }

    /// Find the node stamped with a live reference
    pub fn find_by_ref(&self, node_ref: NodeRef) -> Option<NodeId> {
        self.by_ref.get(&node_ref).copied()
    }

    pub fn node_ref(&self, id: NodeId) -> Option<NodeRef> {
        self.get(id).and_then(|n| n.node_ref)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Ancestors from the parent up to the snapshot root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Descendants in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        let end = self.get(id).map_or(id + 1, |n| n.subtree_end);
        (id + 1)..end
    }

    /// Element descendants matching a predicate, in document order
    pub fn select<'a, F>(&'a self, scope: NodeId, predicate: F) -> impl Iterator<Item = NodeId> + 'a
    where
        F: Fn(&DomNode) -> bool + 'a,
    {
        self.descendants(scope).filter(move |&id| {
            let node = &self.nodes[id];
            node.is_element() && predicate(node)
        })
    }

    /// Whether `node` lies strictly inside `ancestor`'s subtree
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.get(ancestor)
            .is_some_and(|a| node > ancestor && node < a.subtree_end)
    }

    /// Concatenated text of all text nodes below `id` (like `textContent`)
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        if let Some(text) = &node.text {
            return text.clone();
        }
        self.descendants(id)
            .filter_map(|d| self.nodes[d].text.as_deref())
            .collect()
    }

    /// Serialize a subtree back to markup. Live reference stamps are not part of
    /// the snapshot attributes, so the output is stable across snapshots.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        if let Some(text) = &node.text {
            out.push_str(&escape_html(text, false));
            return;
        }
        out.push('<');
        out.push_str(&node.tag_name);
        for (key, value) in &node.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_html(value, true));
            out.push('"');
        }
        out.push('>');
        for &child in &node.children {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag_name);
        out.push('>');
    }

    /// Count element nodes in the tree
    pub fn count_elements(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_element()).count()
    }
}

fn escape_html(raw: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' if !attribute => escaped.push_str("&lt;"),
            '>' if !attribute => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
