//! comment-export
//!
//! Opens (or attaches to) Chrome, expands the comment view the operator has
//! open and writes the thread to JSON and CSV files.

use anyhow::Context;
use chrono::Local;
use clap::{Parser, ValueEnum};
use comment_exporter::browser::{BrowserSession, ConnectionOptions, LaunchOptions};
use comment_exporter::config::ScrapeConfig;
use comment_exporter::export::{write_export, ExportKind};
use comment_exporter::progress::LogProgress;
use comment_exporter::scraper::CommentScraper;
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum JsonFormat {
    Hierarchical,
    Flat,
    Both,
}

impl JsonFormat {
    fn kinds(self) -> Vec<ExportKind> {
        match self {
            JsonFormat::Hierarchical => vec![ExportKind::Hierarchical],
            JsonFormat::Flat => vec![ExportKind::Flat],
            JsonFormat::Both => vec![ExportKind::Hierarchical, ExportKind::Flat],
        }
    }
}

#[derive(Parser)]
#[command(name = "comment-export")]
#[command(version)]
#[command(about = "Export a comment thread with its full reply structure", long_about = None)]
struct Cli {
    /// Page to open before scraping
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// WebSocket endpoint URL of a running browser to attach to
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Wait for Enter before scraping, so the comment view can be opened by hand
    #[arg(long, short = 'w')]
    wait: bool,

    /// Stop after this many comments (0 = unlimited)
    #[arg(long, short = 'n', value_name = "N")]
    max_comments: Option<usize>,

    /// JSON export shape
    #[arg(long, short = 'f', value_enum, default_value = "hierarchical")]
    format: JsonFormat,

    /// Also write a CSV export
    #[arg(long)]
    csv: bool,

    /// Do not outline captured comments in the page
    #[arg(long)]
    no_highlight: bool,

    /// Directory for export files
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,

    /// Scrape settings as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn scrape_config(&self) -> anyhow::Result<ScrapeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                ScrapeConfig::from_json_file(path).with_context(|| format!("Failed to load {}", path.display()))?
            }
            None => ScrapeConfig::default(),
        };
        if let Some(max) = self.max_comments {
            config.max_comments = max;
        }
        if self.no_highlight {
            config.highlight = false;
        }
        Ok(config)
    }

    fn browser(&self) -> comment_exporter::Result<BrowserSession> {
        match &self.ws_endpoint {
            Some(endpoint) => BrowserSession::connect(ConnectionOptions::new(endpoint.clone())),
            None => {
                let mut options = LaunchOptions::new().headless(!self.headed);
                options.chrome_path = self.executable_path.clone();
                options.user_data_dir = self.user_data_dir.clone();
                BrowserSession::launch(options)
            }
        }
    }

    fn kinds(&self) -> Vec<ExportKind> {
        let mut kinds = self.format.kinds();
        if self.csv {
            kinds.push(ExportKind::Csv);
        }
        kinds
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = cli.scrape_config()?;

    let session = cli.browser().context("Failed to start browser")?;

    if let Some(url) = &cli.url {
        let url = session.navigate(url)?;
        session.wait_for_navigation()?;
        log::info!("Opened {}", url);
    }

    if cli.wait {
        eprintln!("Open the post's comments in the browser, then press Enter to start.");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
    }

    let mut doc = session.document(&config)?;
    let scraper = CommentScraper::new(config);
    let outcome = scraper.run(&mut doc, &mut LogProgress)?;

    let now = Local::now();
    for kind in cli.kinds() {
        let bytes = kind.render(&outcome.comments)?;
        let path = write_export(&cli.output_dir, &kind.filename(&outcome.page_url, now), &bytes)?;
        println!("{}", path.display());
    }

    log::info!(
        "Exported {} comments ({} main, {} replies) after {} expansion cycles",
        outcome.comments.len(),
        outcome.stats.main_comments,
        outcome.stats.replies,
        outcome.expansion.cycles
    );
    if outcome.quality.unresolved_replies > 0 {
        log::warn!(
            "{} comments still show unloaded replies; run again to pick them up",
            outcome.quality.unresolved_replies
        );
    }

    Ok(())
}
