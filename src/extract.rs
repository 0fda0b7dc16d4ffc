//! Field extraction for a single comment node
//!
//! Every field has an ordered list of fallbacks and the first plausible value
//! wins. Extraction only reads the snapshot.

use crate::dom::{DomNode, DomTree, NodeId};
use crate::error::{Result, ScrapeError};
use crate::patterns::{
    self, AUTHOR_DENYLIST, BODY_CHROME, HOST_ORIGIN, LABEL_TIMESTAMP, LEADING_RELATIVE_TIME, LINK_DURATION,
    MEDIA_CDN, PURE_NUMBER, RELATIVE_TIME_WORD, REPLY_RELATION_LABELS, STATIC_ASSET_HOST, TIME_FRAGMENT,
    UNRESOLVED_REPLIES,
};

/// Body text shorter than this is UI chrome
const MIN_BODY_CHARS: usize = 5;

const MAX_LIKES: u32 = 1_000_000;

/// Fields read from one comment node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub author: String,
    pub profile_url: String,
    pub profile_image: String,
    pub text: String,
    pub timestamp: String,
    pub likes: u32,
    pub has_unresolved_replies: bool,
    /// Parent display name named by the node's own reply-relation label
    pub labelled_parent: Option<String>,
}

/// Whether a node is a comment or reply node worth capturing
pub fn is_qualifying(node: &DomNode) -> bool {
    node.has_role("article") && node.aria_label().is_some_and(patterns::is_comment_label)
}

/// Qualifying nodes under the snapshot root, in document order
pub fn qualifying_nodes(tree: &DomTree) -> Vec<NodeId> {
    tree.select(tree.root(), is_qualifying).collect()
}

/// Number of comment nodes that already show body text
pub fn count_visible_comments(tree: &DomTree) -> usize {
    tree.select(tree.root(), |n| {
        n.has_role("article")
            && n.aria_label()
                .is_some_and(|label| patterns::VISIBLE_COMMENT_LABEL_WORDS.iter().any(|w| label.contains(w)))
    })
    .filter(|&article| {
        tree.select(article, is_text_block)
            .any(|div| trimmed_text(tree, div).chars().count() > MIN_BODY_CHARS)
    })
    .count()
}

/// Extract the fields of one comment node.
///
/// Returns `Ok(None)` when the node has no body text; such nodes are skipped,
/// not failed.
pub fn extract_fields(tree: &DomTree, node: NodeId) -> Result<Option<ExtractedFields>> {
    let article = tree
        .get(node)
        .ok_or_else(|| ScrapeError::ExtractionFailed(format!("node {} is not in the snapshot", node)))?;

    let (author, profile_url) = match author_from_links(tree, node) {
        Some((name, url)) => (name, url),
        None => (author_from_headings(tree, node).unwrap_or_default(), String::new()),
    };

    let Some(text) = body_text(tree, node, &author) else {
        return Ok(None);
    };

    let label = article.aria_label().unwrap_or("");
    let timestamp = LABEL_TIMESTAMP
        .find(label)
        .map(|m| m.as_str().to_string())
        .or_else(|| timestamp_from_links(tree, node))
        .unwrap_or_default();

    Ok(Some(ExtractedFields {
        profile_image: avatar(tree, node).unwrap_or_default(),
        timestamp,
        likes: likes(tree, node),
        has_unresolved_replies: UNRESOLVED_REPLIES.is_match(&tree.text_content(node)),
        labelled_parent: labelled_parent(label),
        author,
        profile_url,
        text,
    }))
}

/// Display name used to match nodes against each other: the first link whose
/// label reads like a name
pub fn author_identity(tree: &DomTree, node: NodeId) -> Option<String> {
    profile_links(tree, node).find_map(|link| name_from_link(tree, link))
}

/// Links to profile-shaped paths: absolute host links or site-relative paths
pub fn profile_links(tree: &DomTree, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.select(node, |n| {
        n.is_tag("a")
            && n.attr("href")
                .is_some_and(|href| href.contains("facebook.com") || href.starts_with('/'))
    })
}

/// Name shown by a link, trying `span[dir=auto]`, then any non-time span, then
/// the link text
pub fn name_from_link(tree: &DomTree, link: NodeId) -> Option<String> {
    let href = tree.node(link).attr("href")?;
    if href.starts_with('#') || href == "/" {
        return None;
    }
    let path = strip_query(href);
    if path.contains("/comment/") || path.contains("/reply/") {
        return None;
    }

    let spans: Vec<NodeId> = tree.select(link, |n| n.is_tag("span")).collect();

    let labelled = spans
        .iter()
        .filter(|&&span| tree.node(span).attr("dir") == Some("auto"))
        .map(|&span| trimmed_text(tree, span))
        .find(|text| has_name_length(text));
    if labelled.is_some() {
        return labelled;
    }

    let plain = spans
        .iter()
        .map(|&span| trimmed_text(tree, span))
        .find(|text| has_name_length(text) && !RELATIVE_TIME_WORD.is_match(text) && !TIME_FRAGMENT.is_match(text) && text != "u");
    if plain.is_some() {
        return plain;
    }

    let text = trimmed_text(tree, link);
    (has_name_length(&text) && !RELATIVE_TIME_WORD.is_match(&text)).then_some(text)
}

fn author_from_links(tree: &DomTree, node: NodeId) -> Option<(String, String)> {
    profile_links(tree, node).find_map(|link| {
        let href = tree.node(link).attr("href")?;
        let path = strip_query(href);
        if ["/comment/", "/reply/", "/photo/", "/photos/", "/hashtag/"]
            .iter()
            .any(|p| path.contains(p))
        {
            return None;
        }

        let name = tree
            .select(link, |n| n.is_tag("span"))
            .map(|span| trimmed_text(tree, span))
            .find(|text| has_name_length(text))
            .unwrap_or_else(|| trimmed_text(tree, link));

        is_plausible_author(&name).then(|| (name, profile_url(href)))
    })
}

fn author_from_headings(tree: &DomTree, node: NodeId) -> Option<String> {
    tree.select(node, |n| ["strong", "b", "h3", "h4"].iter().any(|t| n.is_tag(t)))
        .map(|id| trimmed_text(tree, id))
        .find(|text| {
            has_name_length(text)
                && !RELATIVE_TIME_WORD.is_match(text)
                && !text.starts_with(|c: char| c.is_ascii_digit())
        })
}

/// Whether link text reads like a display name rather than UI chrome
pub fn is_plausible_author(text: &str) -> bool {
    has_name_length(text)
        && !AUTHOR_DENYLIST.is_match(text)
        && !LEADING_RELATIVE_TIME.is_match(text)
        && !PURE_NUMBER.is_match(text)
}

/// First text block of `node` that reads as comment body rather than author,
/// timestamp or reply chrome
pub fn body_text(tree: &DomTree, node: NodeId, author: &str) -> Option<String> {
    tree.select(node, is_text_block)
        .map(|div| trimmed_text(tree, div))
        .find(|text| {
            text.chars().count() > MIN_BODY_CHARS
                && text != author
                && !LEADING_RELATIVE_TIME.is_match(text)
                && !BODY_CHROME.is_match(text)
        })
}

fn timestamp_from_links(tree: &DomTree, node: NodeId) -> Option<String> {
    tree.select(node, |n| n.is_tag("a") && n.attr("href").is_some_and(|h| h.contains("comment_id")))
        .map(|link| trimmed_text(tree, link))
        .find(|text| LINK_DURATION.is_match(text))
}

fn avatar(tree: &DomTree, node: NodeId) -> Option<String> {
    tree.select(node, |n| n.is_tag("image") || n.is_tag("img"))
        .filter_map(|id| {
            let n = tree.node(id);
            if n.is_tag("img") {
                n.attr("src")
            } else {
                n.attr("xlink:href").or_else(|| n.attr("href"))
            }
        })
        .find(|src| src.contains(MEDIA_CDN) && !src.contains(STATIC_ASSET_HOST))
        .map(|src| strip_query(src).to_string())
}

fn likes(tree: &DomTree, node: NodeId) -> u32 {
    tree.select(node, |n| n.has_role("button"))
        .filter_map(|id| {
            let text = trimmed_text(tree, id);
            if PURE_NUMBER.is_match(&text) { text.parse::<u32>().ok() } else { None }
        })
        .find(|&n| n > 0 && n < MAX_LIKES)
        .unwrap_or(0)
}

/// Parent display name from a reply-relation label, if the label has one
pub fn labelled_parent(label: &str) -> Option<String> {
    REPLY_RELATION_LABELS
        .iter()
        .find_map(|re| re.captures(label))
        .map(|caps| caps["parent"].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Absolute profile address without its query string
pub fn profile_url(href: &str) -> String {
    let path = strip_query(href);
    if path.starts_with('/') {
        format!("{}{}", HOST_ORIGIN, path)
    } else {
        path.to_string()
    }
}

fn strip_query(href: &str) -> &str {
    href.split('?').next().unwrap_or(href)
}

fn is_text_block(node: &DomNode) -> bool {
    node.is_tag("div") && node.attr("dir") == Some("auto")
}

fn has_name_length(text: &str) -> bool {
    (1..100).contains(&text.chars().count())
}

fn trimmed_text(tree: &DomTree, id: NodeId) -> String {
    tree.text_content(id).trim().to_string()
}
