use crate::browser::{BrowserSession, ConnectionOptions, LaunchOptions};
use crate::config::ScrapeConfig;
use crate::scraper::{CommentScraper, ScrapeOutcome};
use rmcp::{
    handler::server::router::tool::ToolRouter,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool_handler, ServerHandler,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// MCP server exposing the comment scraper over one browser session
#[derive(Clone)]
pub struct CommentServer {
    session: Arc<Mutex<BrowserSession>>,
    scraper: Arc<CommentScraper>,
    /// Result of the most recent successful scrape, re-rendered by exports
    last_outcome: Arc<Mutex<Option<ScrapeOutcome>>>,
    pub(super) tool_router: ToolRouter<Self>,
}

impl CommentServer {
    pub fn new(session: BrowserSession, config: ScrapeConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            scraper: Arc::new(CommentScraper::new(config)),
            last_outcome: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    /// Launch a browser and serve it
    pub fn with_options(options: LaunchOptions, config: ScrapeConfig) -> crate::error::Result<Self> {
        Ok(Self::new(BrowserSession::launch(options)?, config))
    }

    /// Attach to a running browser and serve it
    pub fn connect(options: ConnectionOptions, config: ScrapeConfig) -> crate::error::Result<Self> {
        Ok(Self::new(BrowserSession::connect(options)?, config))
    }

    pub(super) fn session(&self) -> MutexGuard<'_, BrowserSession> {
        // A panicked tool call leaves the browser usable.
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn scraper(&self) -> &CommentScraper {
        &self.scraper
    }

    pub(super) fn store_outcome(&self, outcome: ScrapeOutcome) {
        *self.last_outcome.lock().unwrap_or_else(|p| p.into_inner()) = Some(outcome);
    }

    pub(super) fn last_outcome(&self) -> Option<ScrapeOutcome> {
        self.last_outcome.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[tool_handler]
impl ServerHandler for CommentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Exports comment threads from an open post. Use 'browser_navigate' to open the post, \
                 open its comment view, then call 'scrape_comments'. The scrape expands every reply \
                 and returns the thread as JSON. 'export_comments' re-renders the last scrape as \
                 hierarchical JSON, flat JSON or CSV."
                    .to_string(),
            ),
        }
    }
}
