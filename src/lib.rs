//! # comment-exporter
//!
//! Exports a social-media comment thread, with its full reply structure, from a
//! live page driven over the Chrome DevTools Protocol (CDP).
//!
//! The host renders a thread progressively: replies hide behind disclosure
//! controls and older comments load on demand. A run first expands the thread
//! until it stops changing, then captures every comment node once, infers each
//! node's depth and parent, and exports the result as a tree.
//!
//! ## Binaries
//!
//! ```bash
//! # Open a post, wait for the comment view to be opened, export JSON and CSV
//! cargo run --bin comment-export -- --headed --url https://www.facebook.com/page/posts/1 --wait --csv
//!
//! # Serve the scraper to MCP clients
//! cargo run --bin mcp-server --features mcp-server -- --headed
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use comment_exporter::{BrowserSession, CommentScraper, ExportKind, LaunchOptions, LogProgress, ScrapeConfig};
//!
//! # fn main() -> comment_exporter::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::new().headless(false))?;
//! session.navigate("https://www.facebook.com/page/posts/1")?;
//!
//! let config = ScrapeConfig::new().max_comments(200);
//! let mut doc = session.document(&config)?;
//! let outcome = CommentScraper::new(config).run(&mut doc, &mut LogProgress)?;
//!
//! let json = ExportKind::Hierarchical.render(&outcome.comments)?;
//! println!("{} comments, {} bytes", outcome.comments.len(), json.len());
//! # Ok(())
//! # }
//! ```
//!
//! Anything implementing [`LiveDocument`] can be scraped. With the `testing`
//! feature, `testing::ScriptedDocument` replays a scripted page without a
//! browser.
//!
//! ## Module Overview
//!
//! - [`browser`]: Chrome session management and the tab-backed [`LiveDocument`]
//! - [`dom`]: snapshots of the thread container and control detection
//! - [`expand`]: the expansion driver
//! - [`extract`]: per-node field extraction
//! - [`resolve`]: depth and parent inference strategies
//! - [`scraper`]: run orchestration, dedup and identity
//! - [`export`]: tree assembly, JSON and CSV
//! - [`mcp`]: Model Context Protocol server (requires `mcp-handler` feature)

pub mod browser;
pub mod comment;
pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod expand;
pub mod export;
pub mod extract;
pub mod patterns;
pub mod progress;
pub mod resolve;
pub mod scraper;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(feature = "mcp-handler")]
pub mod mcp;

pub use browser::{BrowserSession, ChromeDocument, ConnectionOptions, LaunchOptions};
pub use comment::CommentNode;
pub use config::{Limits, ScrapeConfig, Timings};
pub use document::{LiveDocument, ScrollMetrics};
pub use dom::{DomTree, ElementNode, NodeRef};
pub use error::{Result, ScrapeError};
pub use expand::{ExpansionDriver, ExpansionReport};
pub use export::{build_forest, export_filename, to_csv, CommentTree, ExportFormat, ExportKind, ThreadExport};
pub use progress::{LogProgress, NoProgress, Progress, ProgressSink, Stage};
pub use resolve::{DepthStrategy, DetectionMethod, Resolver};
pub use scraper::{CommentScraper, QualityReport, ScrapeOutcome};

#[cfg(feature = "mcp-handler")]
pub use mcp::CommentServer;
#[cfg(feature = "mcp-handler")]
pub use rmcp::ServiceExt;
