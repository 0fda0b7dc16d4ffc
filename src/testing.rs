//! A scripted [`LiveDocument`] for driving the scraper without a browser.
//!
//! The document is an [`ElementNode`] tree whose root plays the thread
//! container. Activating a control can replace it with new nodes or, for a
//! pager, insert the next page in front of it. Some nodes can
//! be kept outside the viewport, and scrolling to the bottom can append batches
//! of new content, which covers everything the expansion driver reacts to.

use crate::document::{LiveDocument, ScrollMetrics};
use crate::dom::{DomTree, ElementNode, NodeRef};
use crate::error::{Result, ScrapeError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Visible height of the scripted container
pub const VIEWPORT_HEIGHT: f64 = 800.0;

/// Content height added by every loaded batch
pub const BATCH_HEIGHT: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct ScriptedDocument {
    root: ElementNode,
    next_ref: u64,
    url: String,
    reactions: HashMap<NodeRef, Vec<ElementNode>>,
    pages: HashMap<NodeRef, VecDeque<Vec<ElementNode>>>,
    hidden: HashSet<NodeRef>,
    failing: HashSet<NodeRef>,
    growth: VecDeque<Vec<ElementNode>>,
    scroll_top: f64,
    scroll_height: f64,
    /// Controls activated, in order
    pub activations: Vec<NodeRef>,
    /// Every settle requested by the driver
    pub settles: Vec<Duration>,
    pub snapshots: usize,
    pub highlights: Vec<(NodeRef, u32)>,
}

impl ScriptedDocument {
    /// Create a document. Elements without a reference get one, numbered after
    /// the highest reference already present.
    pub fn new(mut root: ElementNode) -> Self {
        let mut next_ref = root.max_ref().map_or(1, |r| r.0 + 1);
        root.stamp_refs(&mut next_ref);
        Self {
            root,
            next_ref,
            url: "https://www.facebook.com/example/posts/1".to_string(),
            reactions: HashMap::new(),
            pages: HashMap::new(),
            hidden: HashSet::new(),
            failing: HashSet::new(),
            growth: VecDeque::new(),
            scroll_top: 0.0,
            scroll_height: BATCH_HEIGHT,
            activations: Vec::new(),
            settles: Vec::new(),
            snapshots: 0,
            highlights: Vec::new(),
        }
    }

    /// Builder method: set the page address
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Builder method: activating `control` replaces it by `revealed`
    pub fn on_activate(mut self, control: u64, revealed: Vec<ElementNode>) -> Self {
        for node in &revealed {
            if let Some(max) = node.max_ref() {
                self.next_ref = self.next_ref.max(max.0 + 1);
            }
        }
        self.reactions.insert(NodeRef(control), revealed);
        self
    }

    /// Builder method: `control` is a pager. It stays in place and every
    /// activation inserts the next page in front of it; once the pages run out
    /// activating it does nothing.
    pub fn paginated(mut self, control: u64, pages: Vec<Vec<ElementNode>>) -> Self {
        for node in pages.iter().flatten() {
            if let Some(max) = node.max_ref() {
                self.next_ref = self.next_ref.max(max.0 + 1);
            }
        }
        self.pages.insert(NodeRef(control), pages.into());
        self
    }

    /// Builder method: keep `node` outside the viewport
    pub fn hidden(mut self, node: u64) -> Self {
        self.hidden.insert(NodeRef(node));
        self
    }

    /// Builder method: activating `node` fails
    pub fn failing(mut self, node: u64) -> Self {
        self.failing.insert(NodeRef(node));
        self
    }

    /// Builder method: append `batch` to the container the next time it is
    /// scrolled to the bottom
    pub fn with_growth(mut self, batch: Vec<ElementNode>) -> Self {
        for node in &batch {
            if let Some(max) = node.max_ref() {
                self.next_ref = self.next_ref.max(max.0 + 1);
            }
        }
        self.growth.push_back(batch);
        self
    }

    pub fn root(&self) -> &ElementNode {
        &self.root
    }

    pub fn container_ref(&self) -> Option<NodeRef> {
        self.root.node_ref
    }

    /// Total time the driver asked to wait
    pub fn settled(&self) -> Duration {
        self.settles.iter().sum()
    }

    fn stamp(&mut self, mut nodes: Vec<ElementNode>) -> Vec<ElementNode> {
        for node in &mut nodes {
            node.stamp_refs(&mut self.next_ref);
        }
        nodes
    }

    fn present(&self, node: NodeRef) -> Result<()> {
        match self.root.find_by_ref(node) {
            Some(_) => Ok(()),
            None => Err(ScrapeError::ElementNotFound(format!("no element {}", node))),
        }
    }

    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - VIEWPORT_HEIGHT).max(0.0)
    }
}

impl LiveDocument for ScriptedDocument {
    fn locate_container(&mut self, _selector: &str) -> Result<Option<NodeRef>> {
        let has_comments = DomTree::new(self.root.clone())
            .select(0, |n| n.has_role("article"))
            .next()
            .is_some();
        Ok(self.root.node_ref.filter(|_| has_comments))
    }

    fn snapshot(&mut self, container: NodeRef) -> Result<DomTree> {
        self.snapshots += 1;
        let subtree = self
            .root
            .find_by_ref(container)
            .ok_or_else(|| ScrapeError::SnapshotFailed(format!("container {} is gone", container)))?;
        Ok(DomTree::new(subtree.clone()))
    }

    fn scroll_into_view(&mut self, node: NodeRef) -> Result<()> {
        self.present(node)
    }

    fn is_in_viewport(&mut self, node: NodeRef, _container: NodeRef) -> Result<bool> {
        self.present(node)?;
        Ok(!self.hidden.contains(&node))
    }

    fn activate(&mut self, node: NodeRef) -> Result<()> {
        self.present(node)?;
        if self.failing.contains(&node) {
            return Err(ScrapeError::ActivationFailed {
                node,
                reason: "scripted failure".to_string(),
            });
        }
        self.activations.push(node);
        if let Some(revealed) = self.reactions.remove(&node) {
            let revealed = self.stamp(revealed);
            self.root.replace_by_ref(node, revealed);
        } else if let Some(page) = self.pages.get_mut(&node).and_then(VecDeque::pop_front) {
            let mut revealed = self.stamp(page);
            if let Some(pager) = self.root.find_by_ref(node).cloned() {
                revealed.push(pager);
                self.root.replace_by_ref(node, revealed);
            }
        }
        Ok(())
    }

    fn scroll_metrics(&mut self, _container: NodeRef) -> Result<ScrollMetrics> {
        Ok(ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height,
        })
    }

    fn scroll_to(&mut self, _container: NodeRef, top: f64) -> Result<()> {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
        if self.scroll_top < self.max_scroll_top() {
            return Ok(());
        }
        if let Some(batch) = self.growth.pop_front() {
            let batch = self.stamp(batch);
            for node in batch {
                self.root.add_child(node);
            }
            self.scroll_height += BATCH_HEIGHT;
        }
        Ok(())
    }

    fn highlight(&mut self, node: NodeRef, depth: u32) -> Result<()> {
        self.highlights.push((node, depth));
        Ok(())
    }

    fn page_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn settle(&mut self, duration: Duration) {
        self.settles.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ScriptedDocument {
        ScriptedDocument::new(
            ElementNode::new("div")
                .with_attr("role", "dialog")
                .with_child(ElementNode::new("div").with_attr("role", "article").with_ref(10))
                .with_child(ElementNode::new("span").with_ref(11).with_text("View 1 reply")),
        )
        .on_activate(11, vec![ElementNode::new("div").with_attr("role", "article").with_ref(20)])
    }

    #[test]
    fn test_refs_are_stamped_after_existing_ones() {
        let doc = page();
        assert_eq!(doc.container_ref(), Some(NodeRef(12)));
    }

    #[test]
    fn test_activation_replaces_control() {
        let mut doc = page();
        let container = doc.locate_container("[role=dialog]").unwrap().unwrap();

        doc.activate(NodeRef(11)).unwrap();
        let tree = doc.snapshot(container).unwrap();

        assert!(tree.find_by_ref(NodeRef(11)).is_none());
        assert!(tree.find_by_ref(NodeRef(20)).is_some());
        assert_eq!(doc.activations, vec![NodeRef(11)]);
        assert!(matches!(doc.activate(NodeRef(11)), Err(ScrapeError::ElementNotFound(_))));
    }

    #[test]
    fn test_pager_stays_in_place() {
        let mut doc = ScriptedDocument::new(
            ElementNode::new("div")
                .with_child(ElementNode::new("div").with_attr("role", "article").with_ref(10))
                .with_child(ElementNode::new("span").with_ref(11).with_text("View more replies")),
        )
        .paginated(11, vec![vec![ElementNode::new("div").with_attr("role", "article").with_ref(30)]]);
        let container = doc.container_ref().unwrap();

        doc.activate(NodeRef(11)).unwrap();
        doc.activate(NodeRef(11)).unwrap();
        let tree = doc.snapshot(container).unwrap();

        assert!(tree.find_by_ref(NodeRef(11)).is_some());
        assert!(tree.find_by_ref(NodeRef(30)).is_some());
        assert_eq!(doc.root().children.len(), 3);
        assert_eq!(doc.activations, vec![NodeRef(11), NodeRef(11)]);
    }

    #[test]
    fn test_scroll_to_bottom_loads_growth() {
        let mut doc = page().with_growth(vec![ElementNode::new("div").with_attr("role", "article")]);
        let container = doc.container_ref().unwrap();

        doc.scroll_to(container, 100.0).unwrap();
        assert_eq!(doc.scroll_metrics(container).unwrap().scroll_height, BATCH_HEIGHT);

        doc.scroll_to(container, BATCH_HEIGHT).unwrap();
        let metrics = doc.scroll_metrics(container).unwrap();
        assert_eq!(metrics.scroll_top, BATCH_HEIGHT - VIEWPORT_HEIGHT);
        assert_eq!(metrics.scroll_height, 2.0 * BATCH_HEIGHT);
        assert_eq!(doc.root().children.len(), 3);
    }

    #[test]
    fn test_locate_container_requires_comments() {
        let mut doc = ScriptedDocument::new(ElementNode::new("div").with_attr("role", "dialog"));
        assert_eq!(doc.locate_container("[role=dialog]").unwrap(), None);
    }
}
