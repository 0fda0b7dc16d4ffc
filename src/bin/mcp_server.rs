//! Comment-export MCP Server
//!
//! Exposes the comment-thread scraper to MCP clients over stdio or streamable
//! HTTP. Each HTTP session gets its own browser.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use comment_exporter::browser::{ConnectionOptions, LaunchOptions};
use comment_exporter::config::ScrapeConfig;
use comment_exporter::mcp::CommentServer;
use rmcp::{ServiceExt, transport::stdio};
use rmcp::transport::streamable_http_server::{StreamableHttpService, session::local::LocalSessionManager};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Standard input/output transport (default)
    Stdio,
    /// HTTP streamable transport
    Http,
}

#[derive(Parser)]
#[command(name = "mcp-server")]
#[command(version)]
#[command(about = "Comment thread export MCP server", long_about = None)]
struct Cli {
    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// WebSocket endpoint URL of a running browser to attach to
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Scrape settings as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Transport type to use
    #[arg(long, short = 't', value_enum, default_value = "stdio")]
    transport: Transport,

    /// Port for HTTP transport
    #[arg(long, short = 'p', default_value = "3000")]
    port: u16,

    /// HTTP streamable endpoint path
    #[arg(long, default_value = "/mcp")]
    http_path: String,
}

impl Cli {
    fn launch_options(&self) -> LaunchOptions {
        let mut options = LaunchOptions::new().headless(!self.headed);
        options.chrome_path = self.executable_path.clone();
        options.user_data_dir = self.user_data_dir.clone();
        options
    }

    fn server(&self, config: ScrapeConfig) -> comment_exporter::Result<CommentServer> {
        match &self.ws_endpoint {
            Some(endpoint) => CommentServer::connect(ConnectionOptions::new(endpoint.clone()), config),
            None => CommentServer::with_options(self.launch_options(), config),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ScrapeConfig::from_json_file(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => ScrapeConfig::default(),
    };

    log::info!("Comment-export MCP Server v{}", env!("CARGO_PKG_VERSION"));
    match &cli.ws_endpoint {
        Some(endpoint) => log::info!("Attaching to browser at {}", endpoint),
        None => log::info!("Browser mode: {}", if cli.headed { "headed" } else { "headless" }),
    }

    match cli.transport {
        Transport::Stdio => {
            log::info!("Ready to accept MCP connections via stdio");
            let service = cli.server(config).context("Failed to create comment server")?;
            let server = service.serve(stdio()).await?;
            let quit_reason = server.waiting().await?;
            log::info!("Server quit with reason: {:?}", quit_reason);
        }
        Transport::Http => {
            let bind_addr = format!("127.0.0.1:{}", cli.port);
            let http_path = cli.http_path.clone();

            let service_factory = move || cli.server(config.clone()).map_err(std::io::Error::other);

            let http_service = StreamableHttpService::new(
                service_factory,
                LocalSessionManager::default().into(),
                Default::default(),
            );

            let router = axum::Router::new().nest_service(&http_path, http_service);

            log::info!("Ready to accept MCP connections at http://{}{}", bind_addr, http_path);

            let listener = tokio::net::TcpListener::bind(bind_addr).await?;
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
