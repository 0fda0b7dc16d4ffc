//! Scrape orchestration
//!
//! [`CommentScraper::run`] performs one full session: locate the thread
//! container, expand it, let it settle, then walk every comment node in
//! document order through dedup, extraction and depth resolution.

use crate::comment::CommentNode;
use crate::config::{ms, ScrapeConfig};
use crate::document::LiveDocument;
use crate::dom::{DomTree, NodeId, NodeRef};
use crate::error::{Result, ScrapeError};
use crate::expand::{ExpansionDriver, ExpansionReport};
use crate::extract::{self, extract_fields};
use crate::patterns::preview;
use crate::progress::{Progress, ProgressSink, Stage};
use crate::resolve::{author_identities, DetectionMethod, ResolveContext, Resolver};
use crate::session::{Registered, ScrapeSession, SessionStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a completed scrape
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutcome {
    pub comments: Vec<CommentNode>,
    pub stats: SessionStats,
    pub expansion: ExpansionReport,
    pub quality: QualityReport,
    pub page_url: String,
    pub started_at: DateTime<Utc>,
}

/// Structure and completeness of the captured comments
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub depth_distribution: BTreeMap<u32, usize>,
    pub detection_methods: BTreeMap<DetectionMethod, usize>,
    pub missing_author: usize,
    pub missing_profile_url: usize,
    pub missing_timestamp: usize,
    pub unresolved_replies: usize,
    /// Comment nodes whose reply controls were expanded
    pub expanded_parents: usize,
}

impl QualityReport {
    pub fn new(comments: &[CommentNode], expanded_parents: usize) -> Self {
        let mut report = Self {
            expanded_parents,
            ..Self::default()
        };
        for comment in comments {
            *report.depth_distribution.entry(comment.depth).or_default() += 1;
            *report.detection_methods.entry(comment.detection_method).or_default() += 1;
            report.missing_author += usize::from(comment.author.is_empty());
            report.missing_profile_url += usize::from(comment.profile_url.is_empty());
            report.missing_timestamp += usize::from(comment.timestamp.is_empty());
            report.unresolved_replies += usize::from(comment.has_unresolved_replies);
        }
        report
    }

    fn log(&self, total: usize) {
        let pct = |n: usize| if total == 0 { 0.0 } else { n as f64 * 100.0 / total as f64 };
        log::info!(
            "Data quality: missing author {} ({:.1}%), missing profile {} ({:.1}%), missing timestamp {} ({:.1}%)",
            self.missing_author,
            pct(self.missing_author),
            self.missing_profile_url,
            pct(self.missing_profile_url),
            self.missing_timestamp,
            pct(self.missing_timestamp)
        );
        log::info!("Depth distribution: {:?}", self.depth_distribution);
        log::info!("Detection methods: {:?}", self.detection_methods);
        log::info!("Tracked {} parent comments with expanded replies", self.expanded_parents);
        if self.unresolved_replies > 0 {
            log::warn!("{} comments may have unloaded replies", self.unresolved_replies);
        }
    }
}

/// Clears the in-flight flag when a run ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScrapeError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scrapes comment threads, one run at a time
pub struct CommentScraper {
    config: ScrapeConfig,
    resolver: Resolver,
    in_flight: AtomicBool,
}

impl CommentScraper {
    pub fn new(config: ScrapeConfig) -> Self {
        Self {
            config,
            resolver: Resolver::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Builder method: replace the depth resolver
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one scrape session against `doc`.
    ///
    /// Fails with [`ScrapeError::AlreadyRunning`] while another run is in
    /// flight, with [`ScrapeError::ContainerNotFound`] when no thread view is
    /// open and with [`ScrapeError::NoComments`] when nothing was captured.
    pub fn run<D, P>(&self, doc: &mut D, progress: &mut P) -> Result<ScrapeOutcome>
    where
        D: LiveDocument + ?Sized,
        P: ProgressSink + ?Sized,
    {
        self.run_with_config(&self.config, doc, progress)
    }

    /// Like [`CommentScraper::run`], with settings other than the scraper's own
    pub fn run_with_config<D, P>(&self, config: &ScrapeConfig, doc: &mut D, progress: &mut P) -> Result<ScrapeOutcome>
    where
        D: LiveDocument + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let _guard = InFlight::acquire(&self.in_flight)?;
        config.validate()?;

        let result = self.run_session(config, doc, progress);
        match &result {
            Ok(outcome) => {
                let status = format!("Captured {} comments", outcome.comments.len());
                let mut done = progress_of(config, Stage::Done, status, &outcome.stats);
                done.scraped = outcome.comments.len();
                progress.update(&done);
            }
            Err(e) => progress.update(&Progress::new(Stage::Failed, e.to_string())),
        }
        result
    }

    fn run_session<D, P>(&self, config: &ScrapeConfig, doc: &mut D, progress: &mut P) -> Result<ScrapeOutcome>
    where
        D: LiveDocument + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let selector = &config.container_selector;
        let container = doc
            .locate_container(selector)?
            .ok_or_else(|| ScrapeError::ContainerNotFound(selector.clone()))?;

        let mut session = ScrapeSession::new();
        log::info!(
            "Scraping thread {} (cap: {})",
            container,
            if config.max_comments == 0 { "unlimited".to_string() } else { config.max_comments.to_string() }
        );
        progress.update(&progress_of(config, Stage::Starting, "Starting".to_string(), &session.stats));

        let expansion = ExpansionDriver::new(config).run(doc, container, &mut session, progress)?;

        progress.update(&progress_of(config, Stage::Settling, "Settling".to_string(), &session.stats));
        doc.settle(ms(config.timings.final_settle_ms));

        let tree = doc.snapshot(container)?;
        let captured = collect_comments(&tree, &mut session, &self.resolver, config, progress);
        let comments: Vec<CommentNode> = captured.iter().map(|(_, c)| c.clone()).collect();

        log::info!(
            "Scraped {} comments (main: {}, replies: {}, skipped duplicates: {}, skipped empty: {})",
            comments.len(),
            session.stats.main_comments,
            session.stats.replies,
            session.stats.skipped_duplicates,
            session.stats.skipped_empty
        );
        let quality = QualityReport::new(&comments, session.expanded_parents());
        quality.log(comments.len());

        if comments.is_empty() {
            return Err(ScrapeError::NoComments);
        }

        if config.highlight {
            for (node, comment) in &captured {
                if let Err(e) = doc.highlight(*node, comment.depth) {
                    log::warn!("Failed to highlight {}: {}", node, e);
                }
            }
        }

        let page_url = doc.page_url().unwrap_or_else(|e| {
            log::warn!("Could not read page address: {}", e);
            String::new()
        });

        Ok(ScrapeOutcome {
            comments,
            stats: session.stats,
            expansion,
            quality,
            page_url,
            started_at: session.started_at(),
        })
    }
}

fn progress_of(config: &ScrapeConfig, stage: Stage, status: String, stats: &SessionStats) -> Progress {
    Progress {
        status,
        stage,
        main_comments: stats.main_comments,
        replies: stats.replies,
        controls_activated: stats.controls_activated,
        scraped: stats.captured(),
        cap: config.max_comments,
    }
}

/// Dedup fingerprint: a bounded prefix of the node's markup
pub fn fingerprint(tree: &DomTree, node: NodeId, len: usize) -> String {
    preview(&tree.outer_html(node), len)
}

/// Capture every comment node of a snapshot that the session has not seen,
/// in document order, stopping at the cap.
///
/// Returns each captured comment with the live reference of its node.
pub fn collect_comments<P>(
    tree: &DomTree,
    session: &mut ScrapeSession,
    resolver: &Resolver,
    config: &ScrapeConfig,
    progress: &mut P,
) -> Vec<(NodeRef, CommentNode)>
where
    P: ProgressSink + ?Sized,
{
    let raw: Vec<NodeId> = tree.select(tree.root(), |n| n.has_role("article")).collect();
    let authors = author_identities(tree, &raw);
    let cap = config.max_comments;
    let mut captured = Vec::new();

    for (index, &node) in raw.iter().enumerate() {
        if cap > 0 && captured.len() >= cap {
            log::info!("Reached the cap of {} comments", cap);
            break;
        }

        let dom = tree.node(node);
        if !extract::is_qualifying(dom) {
            continue;
        }
        let Some(node_ref) = dom.node_ref else {
            log::warn!("Comment node {} has no live reference, skipping", node);
            continue;
        };

        if !session.observe(fingerprint(tree, node, config.fingerprint_len)) {
            session.stats.skipped_duplicates += 1;
            continue;
        }

        let fields = match extract_fields(tree, node) {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                session.stats.skipped_empty += 1;
                log::debug!("Skipped comment node without text: {}", preview(dom.aria_label().unwrap_or(""), 50));
                continue;
            }
            Err(e) => {
                session.stats.skipped_empty += 1;
                log::warn!("Skipped comment node {}: {}", node_ref, e);
                continue;
            }
        };

        let resolution = resolver.resolve(&ResolveContext::new(tree, &raw, &authors, index));
        let parent = resolution
            .parent
            .and_then(|p| tree.node_ref(p))
            .and_then(|r| session.lookup(r))
            .cloned();
        if parent.is_none() && resolution.depth > 0 {
            log::debug!(
                "{} reported depth {} for {} but its parent was not captured; treating as top-level",
                resolution.method,
                resolution.depth,
                node_ref
            );
        }

        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        let reply_target_author = parent
            .as_ref()
            .map(|p| p.author.clone())
            .filter(|a| !a.is_empty())
            .or_else(|| fields.labelled_parent.clone());

        let id = session.next_identity();
        session.register(
            node_ref,
            Registered {
                id: id.clone(),
                depth,
                author: fields.author.clone(),
            },
        );

        let comment = CommentNode {
            id,
            parent_id: parent.map(|p| p.id),
            author_name: fields.author.clone(),
            author: fields.author,
            profile_url: fields.profile_url,
            profile_image: fields.profile_image,
            text: fields.text,
            timestamp: fields.timestamp,
            likes: fields.likes,
            depth,
            is_reply: depth > 0,
            has_unresolved_replies: fields.has_unresolved_replies,
            reply_target_author,
            detection_method: resolution.method,
        };

        log::info!(
            "{}/{} depth {} ({}): {} - \"{}\"",
            captured.len() + 1,
            if cap == 0 { "∞".to_string() } else { cap.to_string() },
            comment.depth,
            comment.detection_method,
            if comment.author.is_empty() { "[NO AUTHOR]" } else { comment.author.as_str() },
            preview(&comment.text, 50)
        );
        if comment.has_unresolved_replies {
            log::warn!("{} has unloaded replies", comment.author);
        }

        captured.push((node_ref, comment));
        progress.update(&Progress {
            status: "Extracting".to_string(),
            stage: Stage::Extracting,
            main_comments: session.stats.main_comments,
            replies: session.stats.replies,
            controls_activated: session.stats.controls_activated,
            scraped: captured.len(),
            cap,
        });
    }

    captured
}
