//! Depth and parent inference
//!
//! The host does not reliably nest replies inside their parents, so the
//! resolver tries an ordered list of [`DepthStrategy`] implementations and takes
//! the first one that reports a depth above zero. Later strategies are weaker
//! guesses than earlier ones.

use crate::dom::{DomTree, NodeId};
use crate::extract;
use crate::patterns::AT_MENTION;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest chain followed by the author-mention strategy
const MAX_MENTION_CHAIN: u32 = 5;

/// Mentions further into the text than this are not reply prefixes
const EARLY_MENTION_CHARS: usize = 100;

/// Indent (px) above which a node counts as visually indented
const INDENT_THRESHOLD_PX: f64 = 20.0;

/// Indent (px) of one reply level
const INDENT_STEP_PX: f64 = 40.0;

const MAX_REPLY_WRAPPERS: u32 = 5;

/// Which strategy produced a node's depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    NestedDomStructure,
    AriaLabelReply,
    AuthorMentionLink,
    Mention,
    VisualIndent,
    ContainerGrouping,
    None,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::NestedDomStructure => "nested-dom-structure",
            DetectionMethod::AriaLabelReply => "aria-label-reply",
            DetectionMethod::AuthorMentionLink => "author-mention-link",
            DetectionMethod::Mention => "mention",
            DetectionMethod::VisualIndent => "visual-indent",
            DetectionMethod::ContainerGrouping => "container-grouping",
            DetectionMethod::None => "none",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy's verdict for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub depth: u32,
    /// The raw parent node, if the strategy identified one
    pub parent: Option<NodeId>,
    pub method: DetectionMethod,
}

impl Resolution {
    pub fn new(depth: u32, parent: Option<NodeId>, method: DetectionMethod) -> Self {
        Self { depth, parent, method }
    }

    /// Top-level verdict when no strategy applies
    pub fn none() -> Self {
        Self::new(0, None, DetectionMethod::None)
    }
}

/// Everything a strategy may look at for one node
pub struct ResolveContext<'a> {
    pub tree: &'a DomTree,
    /// All comment nodes of the snapshot, in document order
    pub raw_nodes: &'a [NodeId],
    /// Author identity of each entry of `raw_nodes`
    pub authors: &'a [Option<String>],
    /// Position of the node being resolved in `raw_nodes`
    pub index: usize,
}

impl<'a> ResolveContext<'a> {
    pub fn new(tree: &'a DomTree, raw_nodes: &'a [NodeId], authors: &'a [Option<String>], index: usize) -> Self {
        Self { tree, raw_nodes, authors, index }
    }

    pub fn node(&self) -> NodeId {
        self.raw_nodes[self.index]
    }

    fn author_at(&self, at: usize) -> Option<&str> {
        self.authors.get(at).and_then(|a| a.as_deref()).filter(|a| !a.is_empty())
    }

    /// Nearest preceding raw node satisfying a predicate on its position
    fn find_before<F>(&self, before: usize, predicate: F) -> Option<usize>
    where
        F: Fn(usize) -> bool,
    {
        (0..before.min(self.raw_nodes.len())).rev().find(|&i| predicate(i))
    }
}

/// Author identities for every raw node of a snapshot
pub fn author_identities(tree: &DomTree, raw_nodes: &[NodeId]) -> Vec<Option<String>> {
    raw_nodes.iter().map(|&node| extract::author_identity(tree, node)).collect()
}

/// One way of inferring depth and parent
pub trait DepthStrategy: Send + Sync {
    fn method(&self) -> DetectionMethod;

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution>;
}

/// Counts enclosing comment nodes; the nearest is the parent
pub struct StructuralContainment;

impl DepthStrategy for StructuralContainment {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::NestedDomStructure
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let enclosing: Vec<NodeId> = cx
            .tree
            .ancestors(cx.node())
            .filter(|&a| cx.tree.node(a).has_role("article"))
            .collect();
        let parent = *enclosing.first()?;
        Some(Resolution::new(enclosing.len() as u32, Some(parent), self.method()))
    }
}

/// Reads the parent's name from a localized "reply to comment from" label
pub struct ReplyLabel;

impl DepthStrategy for ReplyLabel {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::AriaLabelReply
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let label = cx.tree.node(cx.node()).aria_label()?;
        let parent_name = extract::labelled_parent(label)?;
        let found = cx.find_before(cx.index, |i| cx.author_at(i).is_some_and(|a| parent_name.contains(a)))?;
        Some(Resolution::new(1, Some(cx.raw_nodes[found]), self.method()))
    }
}

/// Replies open with a link to the author they answer
pub struct AuthorMentionLink;

impl AuthorMentionLink {
    /// Names linked near the start of a node's text, other than its own author
    fn early_mentions(cx: &ResolveContext<'_>, at: usize) -> Vec<String> {
        let node = cx.raw_nodes[at];
        let own = cx.author_at(at);
        let text = cx.tree.text_content(node);

        extract::profile_links(cx.tree, node)
            .filter_map(|link| extract::name_from_link(cx.tree, link))
            .filter(|name| Some(name.as_str()) != own)
            .filter(|name| {
                text.find(name.as_str())
                    .is_some_and(|byte| text[..byte].chars().count() <= EARLY_MENTION_CHARS)
            })
            .collect()
    }
}

impl DepthStrategy for AuthorMentionLink {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::AuthorMentionLink
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let (name, found) = Self::early_mentions(cx, cx.index).into_iter().find_map(|name| {
            let found = cx.find_before(cx.index, |i| cx.author_at(i).is_some_and(|a| name.contains(a)))?;
            Some((name, found))
        })?;
        log::debug!("Node {} mentions prior author {:?} at {}", cx.index, name, found);

        // Follow the chain upwards while each parent in turn opens with a
        // mention of the node right before it.
        let mut depth = 1;
        let mut current = found;
        for candidate in (0..found).rev() {
            if depth >= MAX_MENTION_CHAIN {
                break;
            }
            let Some(author) = cx.author_at(candidate) else {
                break;
            };
            if !Self::early_mentions(cx, current).iter().any(|m| m.contains(author)) {
                break;
            }
            depth += 1;
            current = candidate;
        }

        Some(Resolution::new(depth, Some(cx.raw_nodes[found]), self.method()))
    }
}

/// `@name` in the body names the parent's author. Only the node's own body
/// is searched; author links and nested replies are not.
pub struct AtMention;

impl DepthStrategy for AtMention {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Mention
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let author = cx.author_at(cx.index).unwrap_or_default();
        let body = extract::body_text(cx.tree, cx.node(), author)?;
        let caps = AT_MENTION.captures(&body)?;
        let mention = caps[1].trim().to_lowercase();
        if mention.is_empty() {
            return None;
        }
        let found = cx.find_before(cx.index, |i| {
            cx.author_at(i).is_some_and(|a| mention.contains(&a.to_lowercase()))
        })?;
        Some(Resolution::new(1, Some(cx.raw_nodes[found]), self.method()))
    }
}

/// Replies are indented in steps of 40px
pub struct VisualIndent;

impl VisualIndent {
    fn indent(cx: &ResolveContext<'_>, at: usize) -> f64 {
        cx.tree.node(cx.raw_nodes[at]).box_style.map_or(0.0, |s| s.indent())
    }
}

impl DepthStrategy for VisualIndent {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::VisualIndent
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let style = cx.tree.node(cx.node()).box_style?;
        if style.padding_left <= INDENT_THRESHOLD_PX && style.margin_left <= INDENT_THRESHOLD_PX {
            return None;
        }
        let indent = style.indent();
        let depth = (indent / INDENT_STEP_PX).floor() as u32;
        let parent = cx
            .find_before(cx.index, |i| Self::indent(cx, i) < indent)
            .map(|i| cx.raw_nodes[i]);
        Some(Resolution::new(depth, parent, self.method()))
    }
}

/// Counts enclosing reply-list wrappers
pub struct ContainerGrouping;

impl ContainerGrouping {
    fn wrappers(tree: &DomTree, node: NodeId) -> u32 {
        let mut count = 0;
        // The snapshot root is the thread container itself.
        for ancestor in tree.ancestors(node).filter(|&a| a != tree.root()) {
            if count >= MAX_REPLY_WRAPPERS {
                break;
            }
            let n = tree.node(ancestor);
            let class = n.class_name();
            if class.contains("comment_replies") || class.contains("reply") || n.has_role("list") {
                count += 1;
            }
        }
        count
    }
}

impl DepthStrategy for ContainerGrouping {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::ContainerGrouping
    }

    fn detect(&self, cx: &ResolveContext<'_>) -> Option<Resolution> {
        let depth = Self::wrappers(cx.tree, cx.node());
        if depth == 0 {
            return None;
        }
        let parent = cx
            .find_before(cx.index, |i| Self::wrappers(cx.tree, cx.raw_nodes[i]) < depth)
            .map(|i| cx.raw_nodes[i]);
        Some(Resolution::new(depth, parent, self.method()))
    }
}

/// Runs strategies in priority order
pub struct Resolver {
    strategies: Vec<Box<dyn DepthStrategy>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StructuralContainment),
            Box::new(ReplyLabel),
            Box::new(AuthorMentionLink),
            Box::new(AtMention),
            Box::new(VisualIndent),
            Box::new(ContainerGrouping),
        ])
    }
}

impl Resolver {
    pub fn new(strategies: Vec<Box<dyn DepthStrategy>>) -> Self {
        Self { strategies }
    }

    /// First verdict with a depth above zero, or a top-level verdict
    pub fn resolve(&self, cx: &ResolveContext<'_>) -> Resolution {
        for strategy in &self.strategies {
            if let Some(resolution) = strategy.detect(cx).filter(|r| r.depth > 0) {
                log::debug!(
                    "Node {} resolved by {}: depth {}, parent {:?}",
                    cx.index,
                    resolution.method,
                    resolution.depth,
                    resolution.parent
                );
                return resolution;
            }
        }
        Resolution::none()
    }
}
