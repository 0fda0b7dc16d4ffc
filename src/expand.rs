//! Progressive expansion of a comment thread
//!
//! The host only renders part of a thread. [`ExpansionDriver`] repeatedly
//! activates reply disclosure controls, then "more comments" controls and
//! scroll-triggered loading, until a few consecutive cycles change nothing.
//!
//! One cycle:
//! 1. ExpandingReplies: activate every visible reply control, re-snapshotting
//!    before each pass, until a pass finds nothing left to do. Paging controls
//!    stay in place and are activated again on every pass until a pass
//!    activating them reveals no new comment nodes.
//! 2. LoadingMore: unless enough comments are visible for the cap, activate
//!    "more comments" controls and probe the bottom of the container.
//! 3. Settling: wait before the next cycle.

use crate::config::{ms, ScrapeConfig};
use crate::document::LiveDocument;
use crate::dom::{Control, ControlMap, DomTree, NodeRef};
use crate::error::Result;
use crate::extract::{count_visible_comments, qualifying_nodes};
use crate::patterns::{preview, MORE_COMMENT_CONTROLS, REPLY_CONTROLS};
use crate::progress::{Progress, ProgressSink, Stage};
use crate::session::{ExpansionRecord, ScrapeSession};
use chrono::Utc;
use serde::Serialize;

/// Phase of the expansion driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionState {
    Idle,
    ExpandingReplies,
    LoadingMore,
    Settling,
    Done,
}

impl ExpansionState {
    fn stage(self) -> Stage {
        match self {
            ExpansionState::Idle => Stage::Starting,
            ExpansionState::ExpandingReplies => Stage::ExpandingReplies,
            ExpansionState::LoadingMore => Stage::LoadingMore,
            ExpansionState::Settling => Stage::Settling,
            ExpansionState::Done => Stage::Done,
        }
    }
}

/// What an expansion run did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionReport {
    pub cycles: usize,
    pub reply_activations: usize,
    pub more_activations: usize,
    /// Cycles in which probing the bottom loaded new content
    pub growth_cycles: usize,
    pub failed_activations: usize,
    /// Comment nodes visible when expansion finished
    pub visible_comments: usize,
    pub state: ExpansionState,
}

impl ExpansionReport {
    fn new() -> Self {
        Self {
            cycles: 0,
            reply_activations: 0,
            more_activations: 0,
            growth_cycles: 0,
            failed_activations: 0,
            visible_comments: 0,
            state: ExpansionState::Idle,
        }
    }

    pub fn activations(&self) -> usize {
        self.reply_activations + self.more_activations
    }
}

/// Outcome of trying one control
enum Attempt {
    Activated,
    Hidden,
    Skipped,
}

/// Drives a document until no more content appears
pub struct ExpansionDriver<'a> {
    config: &'a ScrapeConfig,
}

impl<'a> ExpansionDriver<'a> {
    pub fn new(config: &'a ScrapeConfig) -> Self {
        Self { config }
    }

    /// Expand the thread under `container` until it stops changing
    pub fn run<D, P>(
        &self,
        doc: &mut D,
        container: NodeRef,
        session: &mut ScrapeSession,
        progress: &mut P,
    ) -> Result<ExpansionReport>
    where
        D: LiveDocument + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let limits = &self.config.limits;
        let mut report = ExpansionReport::new();
        let mut idle_cycles = 0;

        while report.cycles < limits.max_cycles {
            report.cycles += 1;

            report.state = ExpansionState::ExpandingReplies;
            let replies = self.expand_replies(doc, container, session, progress, &mut report)?;

            let visible = count_visible_comments(&doc.snapshot(container)?);
            let (more, grew) = if self.config.has_enough(visible) {
                log::info!(
                    "{} comments visible, enough for a cap of {}; not loading more",
                    visible,
                    self.config.max_comments
                );
                (0, false)
            } else {
                report.state = ExpansionState::LoadingMore;
                self.report(progress, session, report.state, format!("Cycle {}: loading more", report.cycles), visible);
                let more = self.load_more(doc, container, session, &mut report)?;
                let grew = self.probe_bottom(doc, container);
                (more, grew)
            };
            if grew {
                report.growth_cycles += 1;
            }

            if replies == 0 && more == 0 && !grew {
                idle_cycles += 1;
                log::info!("Cycle {}: no activity ({}/{})", report.cycles, idle_cycles, limits.idle_cycles_to_finish);
                if idle_cycles >= limits.idle_cycles_to_finish {
                    break;
                }
            } else {
                idle_cycles = 0;
                log::info!(
                    "Cycle {}: {} replies expanded, {} more-comment controls, growth: {}",
                    report.cycles,
                    replies,
                    more,
                    grew
                );
            }

            report.state = ExpansionState::Settling;
            doc.settle(ms(self.config.timings.cycle_ms));
        }

        report.state = ExpansionState::Done;
        report.visible_comments = count_visible_comments(&doc.snapshot(container)?);
        log::info!(
            "Expansion done after {} cycles: {} controls activated, {} comments visible",
            report.cycles,
            report.activations(),
            report.visible_comments
        );
        Ok(report)
    }

    /// Activate reply controls until a pass finds none left. Returns the number
    /// of controls activated.
    fn expand_replies<D, P>(
        &self,
        doc: &mut D,
        container: NodeRef,
        session: &mut ScrapeSession,
        progress: &mut P,
        report: &mut ExpansionReport,
    ) -> Result<usize>
    where
        D: LiveDocument + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let timings = &self.config.timings;
        let mut total = 0;

        for iteration in 1..=self.config.limits.max_reply_iterations {
            let tree = doc.snapshot(container)?;
            let comments_before = count_visible_comments(&tree);
            let nodes_before = qualifying_nodes(&tree).len();
            let controls = ControlMap::scan(&tree, &REPLY_CONTROLS);

            let pending: Vec<&Control> = controls.iter().filter(|c| !session.is_spent(c.node_ref, &c.text)).collect();

            let mut activated = Vec::new();
            let mut hidden = 0;
            for control in pending {
                if let Err(e) = doc.scroll_into_view(control.node_ref) {
                    log::warn!("Could not scroll to control {}: {}", control.node_ref, e);
                    continue;
                }
                doc.settle(ms(timings.reply_scroll_ms));

                match self.try_activate(doc, container, control, report) {
                    Attempt::Activated => {
                        activated.push(control);
                        session.record_activation();
                        if let Some(owner) = control.owner {
                            session.record_expansion(
                                owner,
                                ExpansionRecord {
                                    activated_at: Utc::now(),
                                    comments_before,
                                    control_text: control.text.clone(),
                                },
                            );
                        }
                        doc.settle(ms(timings.reply_activate_ms));
                    }
                    Attempt::Hidden => hidden += 1,
                    Attempt::Skipped => {}
                }
            }
            total += activated.len();
            report.reply_activations += activated.len();

            let tree = doc.snapshot(container)?;
            retire_if_unproductive(session, &activated, nodes_before, &tree);
            let visible = count_visible_comments(&tree);
            self.report(
                progress,
                session,
                ExpansionState::ExpandingReplies,
                format!("Cycle {}: replies, pass {}", report.cycles, iteration),
                visible,
            );
            log::debug!(
                "Reply pass {}: {} activated, {} outside the viewport, {} comments visible",
                iteration,
                activated.len(),
                hidden,
                visible
            );

            if activated.is_empty() && hidden == 0 {
                break;
            }
            if activated.is_empty() && !self.scroll_down(doc, container) {
                log::debug!("Reply controls remain hidden and the container cannot scroll further");
                break;
            }

            doc.settle(ms(timings.reply_iteration_ms));
        }

        Ok(total)
    }

    /// Scroll the container one step to reveal hidden controls. Returns false
    /// when the scroll position did not move.
    fn scroll_down<D: LiveDocument + ?Sized>(&self, doc: &mut D, container: NodeRef) -> bool {
        let mut step = || -> Result<bool> {
            let before = doc.scroll_metrics(container)?.scroll_top;
            doc.scroll_to(container, before + self.config.limits.hidden_scroll_step_px)?;
            doc.settle(ms(self.config.timings.hidden_scroll_ms));
            let after = doc.scroll_metrics(container)?.scroll_top;
            Ok(after != before)
        };
        step().unwrap_or_else(|e| {
            log::warn!("Failed to scroll container {}: {}", container, e);
            false
        })
    }

    /// Activate visible "more comments" controls
    fn load_more<D: LiveDocument + ?Sized>(
        &self,
        doc: &mut D,
        container: NodeRef,
        session: &mut ScrapeSession,
        report: &mut ExpansionReport,
    ) -> Result<usize> {
        let timings = &self.config.timings;
        let tree = doc.snapshot(container)?;
        let nodes_before = qualifying_nodes(&tree).len();
        let controls = ControlMap::scan(&tree, &MORE_COMMENT_CONTROLS);

        let pending: Vec<&Control> = controls.iter().filter(|c| !session.is_spent(c.node_ref, &c.text)).collect();

        let mut activated = Vec::new();
        for control in pending {
            match doc.is_in_viewport(control.node_ref, container) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    log::warn!("Could not check control {}: {}", control.node_ref, e);
                    continue;
                }
            }
            if let Err(e) = doc.scroll_into_view(control.node_ref) {
                log::warn!("Could not scroll to control {}: {}", control.node_ref, e);
                continue;
            }
            doc.settle(ms(timings.more_scroll_ms));

            match doc.activate(control.node_ref) {
                Ok(()) => {
                    log::debug!("Activated \"{}\"", preview(&control.text, 50));
                    activated.push(control);
                    session.record_activation();
                    doc.settle(ms(timings.more_activate_ms));
                }
                Err(e) => {
                    report.failed_activations += 1;
                    log::warn!("Failed to activate \"{}\": {}", preview(&control.text, 50), e);
                }
            }
        }
        if !activated.is_empty() {
            retire_if_unproductive(session, &activated, nodes_before, &doc.snapshot(container)?);
        }
        report.more_activations += activated.len();
        Ok(activated.len())
    }

    /// Scroll to the bottom a few times and report whether content grew. The
    /// container is scrolled back to the top afterwards.
    fn probe_bottom<D: LiveDocument + ?Sized>(&self, doc: &mut D, container: NodeRef) -> bool {
        let timings = &self.config.timings;
        let mut probe = || -> Result<bool> {
            let before = doc.scroll_metrics(container)?.scroll_height;
            for _ in 0..self.config.limits.scroll_probes {
                let height = doc.scroll_metrics(container)?.scroll_height;
                doc.scroll_to(container, height)?;
                doc.settle(ms(timings.scroll_probe_ms));
            }
            let after = doc.scroll_metrics(container)?.scroll_height;
            if after > before {
                log::debug!("Content grew from {} to {}", before, after);
            }

            doc.scroll_to(container, 0.0)?;
            doc.settle(ms(timings.scroll_reset_ms));
            Ok(after > before)
        };
        probe().unwrap_or_else(|e| {
            log::warn!("Failed to probe container {}: {}", container, e);
            false
        })
    }

    fn try_activate<D: LiveDocument + ?Sized>(
        &self,
        doc: &mut D,
        container: NodeRef,
        control: &Control,
        report: &mut ExpansionReport,
    ) -> Attempt {
        match doc.is_in_viewport(control.node_ref, container) {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Still outside the viewport: \"{}\"", preview(&control.text, 40));
                return Attempt::Hidden;
            }
            Err(e) => {
                log::warn!("Could not check control {}: {}", control.node_ref, e);
                return Attempt::Skipped;
            }
        }

        match doc.activate(control.node_ref) {
            Ok(()) => {
                log::debug!("Activated \"{}\"", preview(&control.text, 50));
                Attempt::Activated
            }
            Err(e) => {
                report.failed_activations += 1;
                log::warn!("Failed to activate \"{}\": {}", preview(&control.text, 50), e);
                Attempt::Skipped
            }
        }
    }

    fn report<P: ProgressSink + ?Sized>(
        &self,
        progress: &mut P,
        session: &ScrapeSession,
        state: ExpansionState,
        status: String,
        visible: usize,
    ) {
        progress.update(&Progress {
            status,
            stage: state.stage(),
            main_comments: session.stats.main_comments,
            replies: session.stats.replies,
            controls_activated: session.stats.controls_activated,
            scraped: visible,
            cap: self.config.max_comments,
        });
    }
}

/// Retire the controls of a pass that added no comment nodes. A control still
/// in the tree after a productive pass is a pager and stays live.
fn retire_if_unproductive(session: &mut ScrapeSession, activated: &[&Control], nodes_before: usize, after: &DomTree) {
    if activated.is_empty() || qualifying_nodes(after).len() > nodes_before {
        return;
    }
    for control in activated {
        log::debug!("\"{}\" revealed nothing; not activating it again", preview(&control.text, 50));
        session.mark_spent(control.node_ref, &control.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementNode;
    use crate::progress::NoProgress;
    use crate::testing::ScriptedDocument;

    fn comment(author: &str) -> ElementNode {
        ElementNode::new("div")
            .with_attr("role", "article")
            .with_attr("aria-label", format!("Comment by {}", author))
            .with_child(ElementNode::new("div").with_attr("dir", "auto").with_text(format!("Words from {}", author)))
    }

    fn run(doc: &mut ScriptedDocument, config: &ScrapeConfig) -> (ExpansionReport, ScrapeSession) {
        let container = doc.container_ref().unwrap();
        let mut session = ScrapeSession::new();
        let report = ExpansionDriver::new(config)
            .run(doc, container, &mut session, &mut NoProgress)
            .unwrap();
        (report, session)
    }

    #[test]
    fn test_quiet_thread_finishes_after_idle_cycles() {
        let mut doc = ScriptedDocument::new(ElementNode::new("div").with_child(comment("Ann")));
        let (report, session) = run(&mut doc, &ScrapeConfig::instant());

        assert_eq!(report.cycles, 3);
        assert_eq!(report.activations(), 0);
        assert_eq!(report.state, ExpansionState::Done);
        assert_eq!(session.stats.controls_activated, 0);
        assert!(doc.activations.is_empty());
    }

    #[test]
    fn test_expands_nested_replies() {
        let root = ElementNode::new("div").with_child(
            comment("Ann").with_child(ElementNode::new("div").with_attr("role", "button").with_ref(50).with_text("View 2 replies")),
        );
        let mut doc = ScriptedDocument::new(root)
            .on_activate(
                50,
                vec![
                    comment("Bob"),
                    comment("Cat").with_child(ElementNode::new("span").with_ref(60).with_text("1 reply")),
                ],
            )
            .on_activate(60, vec![comment("Dan")]);

        let (report, session) = run(&mut doc, &ScrapeConfig::instant());

        assert_eq!(doc.activations, vec![NodeRef(50), NodeRef(60)]);
        assert_eq!(report.reply_activations, 2);
        assert_eq!(report.visible_comments, 4);
        assert_eq!(session.expanded_parents(), 2);
        // One active cycle, then three idle ones
        assert_eq!(report.cycles, 4);
    }

    #[test]
    fn test_reply_pager_is_activated_until_exhausted() {
        let root = ElementNode::new("div").with_child(
            comment("Ann").with_child(ElementNode::new("span").with_ref(50).with_text("View more replies")),
        );
        let mut doc = ScriptedDocument::new(root).paginated(
            50,
            vec![vec![comment("Bob")], vec![comment("Cat")], vec![comment("Dan")]],
        );

        let (report, session) = run(&mut doc, &ScrapeConfig::instant());

        // Three productive pages, then one activation that reveals nothing
        assert_eq!(doc.activations, vec![NodeRef(50); 4]);
        assert_eq!(report.reply_activations, 4);
        assert_eq!(report.visible_comments, 4);
        assert_eq!(session.stats.controls_activated, 4);
        assert_eq!(session.expanded_parents(), 1);
        assert!(session.is_spent(NodeRef(50), "View more replies"));
        assert_eq!(report.cycles, 4);
    }

    #[test]
    fn test_more_comments_pager_is_activated_every_cycle() {
        let root = ElementNode::new("div")
            .with_child(comment("Ann"))
            .with_child(ElementNode::new("span").with_ref(70).with_text("View more comments"));
        let mut doc = ScriptedDocument::new(root).paginated(70, vec![vec![comment("Bob")], vec![comment("Cat")]]);

        let (report, _) = run(&mut doc, &ScrapeConfig::instant());

        assert_eq!(doc.activations, vec![NodeRef(70); 3]);
        assert_eq!(report.more_activations, 3);
        assert_eq!(report.visible_comments, 3);
        // Three cycles activating the pager, then three idle ones
        assert_eq!(report.cycles, 6);
    }

    #[test]
    fn test_failed_activation_is_a_no_op() {
        let root = ElementNode::new("div")
            .with_child(comment("Ann").with_child(ElementNode::new("span").with_ref(50).with_text("3 replies")));
        let mut doc = ScriptedDocument::new(root).failing(50);

        let (report, session) = run(&mut doc, &ScrapeConfig::instant());

        assert_eq!(report.activations(), 0);
        assert!(report.failed_activations >= 1);
        assert_eq!(session.stats.controls_activated, 0);
        assert_eq!(report.state, ExpansionState::Done);
    }

    #[test]
    fn test_hidden_controls_stop_when_scroll_is_stuck() {
        let root = ElementNode::new("div")
            .with_child(comment("Ann").with_child(ElementNode::new("span").with_ref(50).with_text("View 4 replies")));
        let mut doc = ScriptedDocument::new(root).hidden(50);

        let (report, _) = run(&mut doc, &ScrapeConfig::instant());

        assert!(doc.activations.is_empty());
        assert_eq!(report.cycles, 3);
    }

    #[test]
    fn test_loads_more_comments_and_growth() {
        let root = ElementNode::new("div")
            .with_child(comment("Ann"))
            .with_child(ElementNode::new("div").with_attr("role", "button").with_ref(70).with_text("View more comments"));
        let mut doc = ScriptedDocument::new(root)
            .on_activate(70, vec![comment("Bob")])
            .with_growth(vec![comment("Cat")]);

        let (report, _) = run(&mut doc, &ScrapeConfig::instant());

        assert_eq!(report.more_activations, 1);
        assert_eq!(report.growth_cycles, 1);
        assert_eq!(report.visible_comments, 3);
        assert_eq!(report.cycles, 4);
    }

    #[test]
    fn test_enough_comments_skips_loading_more() {
        let root = ElementNode::new("div")
            .with_child(comment("Ann"))
            .with_child(comment("Bob"))
            .with_child(ElementNode::new("span").with_ref(70).with_text("View more comments"));
        let mut doc = ScriptedDocument::new(root).with_growth(vec![comment("Cat")]);
        let config = ScrapeConfig::instant().max_comments(1);

        let (report, _) = run(&mut doc, &config);

        assert!(doc.activations.is_empty());
        assert_eq!(report.growth_cycles, 0);
        assert_eq!(report.visible_comments, 2);
    }

    #[test]
    fn test_settles_use_configured_delays() {
        let mut doc = ScriptedDocument::new(ElementNode::new("div").with_child(comment("Ann")));
        let config = ScrapeConfig::default();

        run(&mut doc, &config);

        // Per idle cycle: 3 probes, 1 reset; plus 2 cycle settles between 3 cycles
        let probes = 3 * (3 * config.timings.scroll_probe_ms + config.timings.scroll_reset_ms);
        let cycles = 2 * config.timings.cycle_ms;
        assert_eq!(doc.settled(), ms(probes + cycles));
    }
}
