//! The live document seam
//!
//! Everything the scraper does to the page goes through [`LiveDocument`]: reads
//! are snapshots, writes are scrolls and activations, and waiting is
//! [`LiveDocument::settle`]. `ChromeDocument` drives a real tab;
//! `testing::ScriptedDocument` replays a scripted page.

use crate::dom::{DomTree, NodeRef};
use crate::error::Result;
use std::time::Duration;

/// Scroll position of a scrollable container
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
}

/// A document that can be snapshotted and mutated by user-like actions
pub trait LiveDocument {
    /// Reference of the first element matching `selector` that contains a
    /// comment node, or `None` when no thread view is open
    fn locate_container(&mut self, selector: &str) -> Result<Option<NodeRef>>;

    /// Snapshot the subtree under `container`
    fn snapshot(&mut self, container: NodeRef) -> Result<DomTree>;

    fn scroll_into_view(&mut self, node: NodeRef) -> Result<()>;

    /// Whether `node` lies within the container's viewport plus the buffer
    fn is_in_viewport(&mut self, node: NodeRef, container: NodeRef) -> Result<bool>;

    /// Activate a control as a user click would
    fn activate(&mut self, node: NodeRef) -> Result<()>;

    fn scroll_metrics(&mut self, container: NodeRef) -> Result<ScrollMetrics>;

    fn scroll_to(&mut self, container: NodeRef, top: f64) -> Result<()>;

    /// Outline a captured comment node, colored by depth
    fn highlight(&mut self, _node: NodeRef, _depth: u32) -> Result<()> {
        Ok(())
    }

    /// Address of the page, used to name export files
    fn page_url(&mut self) -> Result<String>;

    /// Give the page time to react. The only suspension point of a run.
    fn settle(&mut self, duration: Duration);
}

impl<D: LiveDocument + ?Sized> LiveDocument for &mut D {
    fn locate_container(&mut self, selector: &str) -> Result<Option<NodeRef>> {
        (**self).locate_container(selector)
    }

    fn snapshot(&mut self, container: NodeRef) -> Result<DomTree> {
        (**self).snapshot(container)
    }

    fn scroll_into_view(&mut self, node: NodeRef) -> Result<()> {
        (**self).scroll_into_view(node)
    }

    fn is_in_viewport(&mut self, node: NodeRef, container: NodeRef) -> Result<bool> {
        (**self).is_in_viewport(node, container)
    }

    fn activate(&mut self, node: NodeRef) -> Result<()> {
        (**self).activate(node)
    }

    fn scroll_metrics(&mut self, container: NodeRef) -> Result<ScrollMetrics> {
        (**self).scroll_metrics(container)
    }

    fn scroll_to(&mut self, container: NodeRef, top: f64) -> Result<()> {
        (**self).scroll_to(container, top)
    }

    fn highlight(&mut self, node: NodeRef, depth: u32) -> Result<()> {
        (**self).highlight(node, depth)
    }

    fn page_url(&mut self) -> Result<String> {
        (**self).page_url()
    }

    fn settle(&mut self, duration: Duration) {
        (**self).settle(duration)
    }
}
