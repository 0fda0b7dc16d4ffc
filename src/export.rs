//! Tree assembly and export serializations
//!
//! Captured comments are kept flat with parent references. This module turns
//! them into a forest and renders hierarchical JSON, flat JSON and CSV, plus the
//! filename convention shared by every export.

use crate::comment::CommentNode;
use crate::error::{Result, ScrapeError};
use crate::patterns::POST_URL;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

/// A comment with its replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentTree {
    #[serde(flatten)]
    pub comment: CommentNode,
    pub children: Vec<CommentTree>,
}

impl CommentTree {
    /// Number of comments in this subtree, itself included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(CommentTree::size).sum::<usize>()
    }
}

/// Assemble a forest from parent references.
///
/// Nodes whose parent is missing become roots. So does any node whose parent
/// chain loops back to itself. Sibling order follows input order, and the
/// forest holds every input node exactly once.
pub fn build_forest(comments: &[CommentNode]) -> Vec<CommentTree> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(comments.len());
    for (i, comment) in comments.iter().enumerate() {
        index.entry(comment.id.as_str()).or_insert(i);
    }

    let mut parents: Vec<Option<usize>> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| {
            c.parent_id
                .as_deref()
                .and_then(|p| index.get(p).copied())
                .filter(|&p| p != i)
        })
        .collect();

    for i in 0..parents.len() {
        let mut current = parents[i];
        let mut steps = 0;
        while let Some(p) = current {
            if p == i {
                log::warn!("Parent chain of {} loops; treating it as top-level", comments[i].id);
                parents[i] = None;
                break;
            }
            // A loop further up is cut when its own members are visited.
            if steps > parents.len() {
                break;
            }
            current = parents[p];
            steps += 1;
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    fn assemble(at: usize, comments: &[CommentNode], children: &[Vec<usize>]) -> CommentTree {
        CommentTree {
            comment: comments[at].clone(),
            children: children[at].iter().map(|&c| assemble(c, comments, children)).collect(),
        }
    }

    roots.into_iter().map(|r| assemble(r, comments, &children)).collect()
}

/// Shape of a JSON export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Hierarchical,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportedComments {
    Tree(Vec<CommentTree>),
    Flat(Vec<CommentNode>),
}

/// JSON export document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadExport {
    pub format: ExportFormat,
    pub total_comments: usize,
    pub main_comments: usize,
    pub replies: usize,
    #[serde(serialize_with = "iso_millis")]
    pub exported_at: DateTime<Utc>,
    pub comments: ExportedComments,
}

fn iso_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl ThreadExport {
    pub fn new(format: ExportFormat, comments: &[CommentNode]) -> Self {
        let main_comments = comments.iter().filter(|c| c.depth == 0).count();
        Self {
            format,
            total_comments: comments.len(),
            main_comments,
            replies: comments.len() - main_comments,
            exported_at: Utc::now(),
            comments: match format {
                ExportFormat::Hierarchical => ExportedComments::Tree(build_forest(comments)),
                ExportFormat::Flat => ExportedComments::Flat(comments.to_vec()),
            },
        }
    }

    pub fn hierarchical(comments: &[CommentNode]) -> Self {
        Self::new(ExportFormat::Hierarchical, comments)
    }

    pub fn flat(comments: &[CommentNode]) -> Self {
        Self::new(ExportFormat::Flat, comments)
    }

    /// Builder method: pin the export time
    pub fn exported_at(mut self, at: DateTime<Utc>) -> Self {
        self.exported_at = at;
        self
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub const CSV_HEADERS: [&str; 14] = [
    "ID",
    "Parent ID",
    "Thread",
    "Author",
    "Author Name",
    "Profile URL",
    "Profile Image",
    "Text",
    "Timestamp",
    "Likes",
    "Depth",
    "Is Reply",
    "Reply To",
    "Has Unloaded Replies",
];

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Thread column: indented branch glyph and author
fn thread_label(comment: &CommentNode) -> String {
    let author = if comment.author.is_empty() { "[NO AUTHOR]" } else { comment.author.as_str() };
    let glyph = if comment.depth == 0 { '┌' } else { '└' };
    format!("{}{} {}", "  ".repeat(comment.depth as usize), glyph, author)
}

/// Render comments as CSV, one row per comment in capture order
pub fn to_csv(comments: &[CommentNode]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for c in comments {
        let thread = thread_label(c);
        let text = c.text.replace(['\r', '\n'], " ");
        let likes = c.likes.to_string();
        let depth = c.depth.to_string();
        let record: [&str; 14] = [
            &c.id,
            c.parent_id.as_deref().unwrap_or(""),
            &thread,
            &c.author,
            &c.author_name,
            &c.profile_url,
            &c.profile_image,
            &text,
            &c.timestamp,
            &likes,
            &depth,
            yes_no(c.is_reply),
            c.reply_target_author.as_deref().unwrap_or(""),
            yes_no(c.has_unresolved_replies),
        ];
        writer.write_record(record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ScrapeError::ExportFailed(e.error().to_string()))
}

/// Export filename `{account}__{postId}__{YYYY-MM-DD_HHMM}.{ext}` for a post
/// address. Account and post are `unknown` when the address is not a post.
pub fn export_filename<Tz>(page_url: &str, at: DateTime<Tz>, ext: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let (account, post) = POST_URL
        .captures(page_url)
        .map(|caps| (caps[1].replace('.', "-"), caps[2].to_string()))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
    format!("{}__{}__{}.{}", account, post, at.format("%Y-%m-%d_%H%M"), ext)
}

/// Any export the tool can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// JSON forest with nested `children`
    Hierarchical,
    /// JSON list with parent references
    Flat,
    Csv,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Hierarchical => "json",
            ExportKind::Flat => "flat.json",
            ExportKind::Csv => "csv",
        }
    }

    /// Serialize `comments` in this form
    pub fn render(self, comments: &[CommentNode]) -> Result<Vec<u8>> {
        match self {
            ExportKind::Hierarchical => Ok(ThreadExport::hierarchical(comments).to_json_pretty()?.into_bytes()),
            ExportKind::Flat => Ok(ThreadExport::flat(comments).to_json_pretty()?.into_bytes()),
            ExportKind::Csv => to_csv(comments),
        }
    }

    pub fn filename<Tz>(self, page_url: &str, at: DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        export_filename(page_url, at, self.extension())
    }
}

/// Write an export under `dir`, creating it if needed
pub fn write_export(dir: impl AsRef<Path>, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::DetectionMethod;
    use chrono::FixedOffset;

    fn comment(id: &str, parent: Option<&str>, depth: u32, author: &str) -> CommentNode {
        CommentNode {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            author: author.to_string(),
            author_name: author.to_string(),
            profile_url: String::new(),
            profile_image: String::new(),
            text: format!("Text from {}", author),
            timestamp: "3 h".to_string(),
            likes: 0,
            depth,
            is_reply: depth > 0,
            has_unresolved_replies: false,
            reply_target_author: None,
            detection_method: DetectionMethod::None,
        }
    }

    fn ids(forest: &[CommentTree]) -> Vec<&str> {
        forest.iter().map(|t| t.comment.id.as_str()).collect()
    }

    #[test]
    fn test_forest_attaches_replies() {
        let comments = vec![
            comment("1", None, 0, "Ann"),
            comment("2", Some("1"), 1, "Bob"),
            comment("3", None, 0, "Cat"),
        ];
        let forest = build_forest(&comments);

        assert_eq!(ids(&forest), vec!["1", "3"]);
        assert_eq!(ids(&forest[0].children), vec!["2"]);
        assert!(forest[1].children.is_empty());
        assert_eq!(forest.iter().map(CommentTree::size).sum::<usize>(), 3);
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let comments = vec![comment("1", None, 0, "Ann"), comment("2", Some("gone"), 1, "Bob")];
        assert_eq!(ids(&build_forest(&comments)), vec!["1", "2"]);
    }

    #[test]
    fn test_cycles_are_broken() {
        let comments = vec![
            comment("1", Some("2"), 1, "Ann"),
            comment("2", Some("1"), 1, "Bob"),
            comment("3", Some("3"), 1, "Cat"),
        ];
        let forest = build_forest(&comments);

        assert_eq!(ids(&forest), vec!["1", "3"]);
        assert_eq!(ids(&forest[0].children), vec!["2"]);
        assert_eq!(forest.iter().map(CommentTree::size).sum::<usize>(), 3);
    }

    #[test]
    fn test_hierarchical_json_shape() {
        let comments = vec![comment("1", None, 0, "Ann"), comment("2", Some("1"), 1, "Bob")];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let json = ThreadExport::hierarchical(&comments).exported_at(at).to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["format"], "hierarchical");
        assert_eq!(value["totalComments"], 2);
        assert_eq!(value["mainComments"], 1);
        assert_eq!(value["replies"], 1);
        assert_eq!(value["exportedAt"], "2024-05-01T12:30:00.000Z");
        assert_eq!(value["comments"][0]["id"], "1");
        assert_eq!(value["comments"][0]["children"][0]["parentId"], "1");
        assert_eq!(value["comments"][0]["children"][0]["children"], serde_json::json!([]));
    }

    #[test]
    fn test_flat_json_shape() {
        let comments = vec![comment("1", None, 0, "Ann"), comment("2", Some("1"), 1, "Bob")];
        let value = serde_json::to_value(ThreadExport::flat(&comments)).unwrap();

        assert_eq!(value["format"], "flat");
        assert_eq!(value["comments"].as_array().map(Vec::len), Some(2));
        assert!(value["comments"][1].get("children").is_none());
        assert_eq!(value["comments"][0]["parentId"], serde_json::Value::Null);
    }

    #[test]
    fn test_csv_rows() {
        let mut reply = comment("c2", Some("c1"), 1, "");
        reply.text = "Line one\nline \"two\"".to_string();
        reply.likes = 4;
        reply.reply_target_author = Some("Ann".to_string());
        reply.has_unresolved_replies = true;
        let csv = String::from_utf8(to_csv(&[comment("c1", None, 0, "Ann"), reply]).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(r#""ID","Parent ID","Thread""#));
        assert!(lines[1].starts_with(r#""c1","","┌ Ann","Ann","Ann""#));
        assert!(lines[1].ends_with(r#"0,0,"No","","No""#));
        assert!(lines[2].contains(r#""  └ [NO AUTHOR]""#));
        assert!(lines[2].contains(r#""Line one line ""two""""#));
        assert!(lines[2].ends_with(r#"4,1,"Yes","Ann","Yes""#));
    }

    #[test]
    fn test_export_filename() {
        let at = FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();

        assert_eq!(
            export_filename("https://www.facebook.com/some.page/posts/pfbid02abc?comment_id=1", at, "json"),
            "some-page__pfbid02abc__2024-03-09_0705.json"
        );
        assert_eq!(
            export_filename("https://www.facebook.com/photo/?fbid=1", at, "csv"),
            "unknown__unknown__2024-03-09_0705.csv"
        );
    }

    #[test]
    fn test_export_kinds() {
        let comments = vec![comment("c1", None, 0, "Ann"), comment("c2", Some("c1"), 1, "Bob")];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        let flat: serde_json::Value = serde_json::from_slice(&ExportKind::Flat.render(&comments).unwrap()).unwrap();
        assert_eq!(flat["format"], "flat");
        let csv = String::from_utf8(ExportKind::Csv.render(&comments).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert_eq!(
            ExportKind::Flat.filename("https://www.facebook.com/page/posts/7", at),
            "page__7__2024-05-01_0900.flat.json"
        );
        assert_eq!(serde_json::from_str::<ExportKind>(r#""csv""#).unwrap(), ExportKind::Csv);
    }

    #[test]
    fn test_write_export_creates_dir() {
        let dir = std::env::temp_dir().join(format!("comment-export-{}", std::process::id()));
        let path = write_export(dir.join("nested"), "a.json", b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        fs::remove_dir_all(&dir).unwrap();
    }
}
