//! Per-run scrape state
//!
//! A [`ScrapeSession`] is created fresh at the start of every run and owns the
//! dedup fingerprints, the identity map and the record of expanded controls.
//!
//! Paging controls ("View more replies") stay in place and reveal another page
//! on every activation, so a control is only retired once activating it stops
//! revealing anything. A retired control whose text changes is live again.

use crate::dom::NodeRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A captured node as seen by later nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Registered {
    pub id: String,
    pub depth: u32,
    pub author: String,
}

/// What activating a control revealed under its comment node
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionRecord {
    pub activated_at: DateTime<Utc>,
    /// Comment nodes visible before the activation
    pub comments_before: usize,
    pub control_text: String,
}

/// Running counters of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub main_comments: usize,
    pub replies: usize,
    pub controls_activated: usize,
    pub skipped_duplicates: usize,
    pub skipped_empty: usize,
}

impl SessionStats {
    pub fn captured(&self) -> usize {
        self.main_comments + self.replies
    }
}

/// State of one scrape run
#[derive(Debug)]
pub struct ScrapeSession {
    started_at: DateTime<Utc>,
    fingerprints: HashSet<String>,
    identities: HashMap<NodeRef, Registered>,
    expanded: HashMap<NodeRef, ExpansionRecord>,
    spent: HashMap<NodeRef, String>,
    ordinal: usize,
    pub stats: SessionStats,
}

impl Default for ScrapeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeSession {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            fingerprints: HashSet::new(),
            identities: HashMap::new(),
            expanded: HashMap::new(),
            spent: HashMap::new(),
            ordinal: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record a fingerprint. Returns false if it was already seen.
    pub fn observe(&mut self, fingerprint: String) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    /// Allocate the identity of the next captured node
    pub fn next_identity(&mut self) -> String {
        let id = format!("comment_{}_{}", self.ordinal, self.started_at.timestamp_millis());
        self.ordinal += 1;
        id
    }

    /// Register a captured node under its live reference and count it. A node
    /// registers once; later registrations are ignored.
    pub fn register(&mut self, node: NodeRef, entry: Registered) {
        if self.identities.contains_key(&node) {
            return;
        }
        if entry.depth == 0 {
            self.stats.main_comments += 1;
        } else {
            self.stats.replies += 1;
        }
        self.identities.insert(node, entry);
    }

    pub fn lookup(&self, node: NodeRef) -> Option<&Registered> {
        self.identities.get(&node)
    }

    /// Count one activation of a control
    pub fn record_activation(&mut self) {
        self.stats.controls_activated += 1;
    }

    /// Retire a control whose last activation revealed nothing
    pub fn mark_spent(&mut self, control: NodeRef, text: &str) {
        self.spent.insert(control, text.to_string());
    }

    /// Whether `control` was retired while showing `text`
    pub fn is_spent(&self, control: NodeRef, text: &str) -> bool {
        self.spent.get(&control).is_some_and(|t| t == text)
    }

    /// Remember what the first activated control under `owner` revealed
    pub fn record_expansion(&mut self, owner: NodeRef, record: ExpansionRecord) {
        self.expanded.entry(owner).or_insert(record);
    }

    /// Number of comment nodes whose controls were expanded
    pub fn expanded_parents(&self) -> usize {
        self.expanded.len()
    }

    pub fn captured(&self) -> usize {
        self.identities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> ScrapeSession {
        ScrapeSession::starting_at(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    #[test]
    fn test_identity_format() {
        let mut session = session();
        assert_eq!(session.next_identity(), "comment_0_1700000000000");
        assert_eq!(session.next_identity(), "comment_1_1700000000000");
    }

    #[test]
    fn test_observe_dedups() {
        let mut session = session();
        assert!(session.observe("<div>a".to_string()));
        assert!(!session.observe("<div>a".to_string()));
    }

    #[test]
    fn test_register_counts_once() {
        let mut session = session();
        let entry = |depth| Registered {
            id: "comment_0_1".to_string(),
            depth,
            author: "Ann".to_string(),
        };

        session.register(NodeRef(1), entry(0));
        session.register(NodeRef(1), entry(1));
        session.register(NodeRef(2), entry(1));

        assert_eq!(session.captured(), 2);
        assert_eq!(session.stats.main_comments, 1);
        assert_eq!(session.stats.replies, 1);
        assert_eq!(session.lookup(NodeRef(1)).map(|r| r.depth), Some(0));
    }

    #[test]
    fn test_expansion_records() {
        let mut session = session();
        let record = ExpansionRecord {
            activated_at: session.started_at(),
            comments_before: 3,
            control_text: "View 2 replies".to_string(),
        };

        session.record_activation();
        session.record_activation();
        session.record_expansion(NodeRef(5), record.clone());
        session.record_expansion(NodeRef(5), record);

        assert_eq!(session.expanded_parents(), 1);
        assert_eq!(session.stats.controls_activated, 2);
    }

    #[test]
    fn test_spent_controls_revive_when_text_changes() {
        let mut session = session();
        assert!(!session.is_spent(NodeRef(6), "View more replies"));

        session.mark_spent(NodeRef(6), "View more replies");
        assert!(session.is_spent(NodeRef(6), "View more replies"));
        assert!(!session.is_spent(NodeRef(6), "View 3 more replies"));
        assert!(!session.is_spent(NodeRef(7), "View more replies"));
    }
}
