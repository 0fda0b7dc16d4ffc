//! MCP (Model Context Protocol) tools for exporting comment threads

pub mod handler;
pub use handler::CommentServer;

use crate::error::ScrapeError;
use crate::export::ExportKind;
use crate::progress::LogProgress;
use crate::scraper::ScrapeOutcome;
use chrono::Local;
use rmcp::{
    tool_router, tool,
    ErrorData as McpError,
    model::{CallToolResult, Content},
    handler::server::wrapper::Parameters,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Navigate tool parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavigateParams {
    /// URL to navigate to
    pub url: String,
    /// Wait for navigation to complete (default: true)
    #[serde(default = "default_true")]
    pub wait_for_load: bool,
}

/// Scrape tool parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeParams {
    /// Stop after this many comments (0 or absent: no limit)
    #[serde(default)]
    pub max_comments: Option<usize>,
    /// Shape of the returned thread (default: hierarchical)
    #[serde(default)]
    pub format: Option<ExportKind>,
}

/// Export tool parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportParams {
    /// hierarchical, flat or csv
    pub format: ExportKind,
    /// Directory to write the export to; the export is returned inline when absent
    #[serde(default)]
    pub output_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

fn to_mcp_error(error: ScrapeError) -> McpError {
    match error {
        ScrapeError::ContainerNotFound(_)
        | ScrapeError::NoComments
        | ScrapeError::AlreadyRunning
        | ScrapeError::InvalidConfig(_) => McpError::invalid_request(error.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn render_text(outcome: &ScrapeOutcome, kind: ExportKind) -> Result<String, McpError> {
    let bytes = kind.render(&outcome.comments).map_err(to_mcp_error)?;
    String::from_utf8(bytes).map_err(|e| McpError::internal_error(e.to_string(), None))
}

fn summary(outcome: &ScrapeOutcome) -> Result<String, McpError> {
    let value = serde_json::json!({
        "pageUrl": outcome.page_url,
        "totalComments": outcome.comments.len(),
        "stats": outcome.stats,
        "expansion": outcome.expansion,
        "quality": outcome.quality,
    });
    serde_json::to_string_pretty(&value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

#[tool_router]
impl CommentServer {
    /// Navigate to a URL
    #[tool(description = "Navigate to a specified URL in the browser")]
    fn browser_navigate(
        &self,
        params: Parameters<NavigateParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.session();
        let url = session.navigate(&params.0.url).map_err(to_mcp_error)?;
        if params.0.wait_for_load {
            session.wait_for_navigation().map_err(to_mcp_error)?;
        }
        let current = session.current_url().map_err(to_mcp_error)?;

        let text = serde_json::to_string_pretty(&serde_json::json!({
            "url": url,
            "currentUrl": current,
        }))
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Expand and capture the open comment thread
    #[tool(description = "Expand every reply in the open comment view and capture the thread. Returns a run summary and the comments")]
    fn scrape_comments(
        &self,
        params: Parameters<ScrapeParams>,
    ) -> Result<CallToolResult, McpError> {
        if self.scraper().is_running() {
            return Err(to_mcp_error(ScrapeError::AlreadyRunning));
        }

        let mut config = self.scraper().config().clone();
        if let Some(max) = params.0.max_comments {
            config.max_comments = max;
        }

        let outcome = {
            let session = self.session();
            let mut doc = session.document(&config).map_err(to_mcp_error)?;
            self.scraper()
                .run_with_config(&config, &mut doc, &mut LogProgress)
                .map_err(to_mcp_error)?
        };

        let kind = params.0.format.unwrap_or(ExportKind::Hierarchical);
        let contents = vec![Content::text(summary(&outcome)?), Content::text(render_text(&outcome, kind)?)];
        self.store_outcome(outcome);
        Ok(CallToolResult::success(contents))
    }

    /// Re-render the last scrape
    #[tool(description = "Export the comments of the last scrape as hierarchical JSON, flat JSON or CSV, inline or to a file")]
    fn export_comments(
        &self,
        params: Parameters<ExportParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self
            .last_outcome()
            .ok_or_else(|| McpError::invalid_request("No scrape results yet; run scrape_comments first", None))?;
        let kind = params.0.format;

        let Some(dir) = params.0.output_dir else {
            return Ok(CallToolResult::success(vec![Content::text(render_text(&outcome, kind)?)]));
        };

        let bytes = kind.render(&outcome.comments).map_err(to_mcp_error)?;
        let name = kind.filename(&outcome.page_url, Local::now());
        let path: PathBuf = crate::export::write_export(&dir, &name, &bytes).map_err(to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Wrote {} comments to {}",
            outcome.comments.len(),
            path.display()
        ))]))
    }
}
