//! Scrape configuration
//!
//! [`ScrapeConfig`] carries the collection cap, the container selector and the
//! pacing of the expansion driver. Every field has a serde default so a JSON
//! config file only needs the keys it overrides.

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one scrape run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Maximum number of comments to collect (0 = unlimited)
    pub max_comments: usize,

    /// CSS selector for candidate thread containers
    pub container_selector: String,

    /// Number of characters of serialized markup used to fingerprint a node
    pub fingerprint_len: usize,

    /// Outline captured nodes in the page, colored by depth
    pub highlight: bool,

    /// Settle delays between document interactions
    pub timings: Timings,

    /// Caps that bound the expansion driver
    pub limits: Limits,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_comments: 0,
            container_selector: r#"[role="dialog"]"#.to_string(),
            fingerprint_len: 300,
            highlight: true,
            timings: Timings::default(),
            limits: Limits::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration with every settle delay set to zero
    pub fn instant() -> Self {
        Self {
            timings: Timings::zero(),
            ..Self::default()
        }
    }

    /// Builder method: set the collection cap
    pub fn max_comments(mut self, max: usize) -> Self {
        self.max_comments = max;
        self
    }

    /// Builder method: set the container selector
    pub fn container_selector(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = selector.into();
        self
    }

    /// Builder method: toggle in-page highlighting
    pub fn highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("Loaded scrape config from {}", path.display());
        Ok(config)
    }

    /// Reject values the driver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.container_selector.trim().is_empty() {
            return Err(ScrapeError::InvalidConfig("container_selector is empty".to_string()));
        }
        if self.fingerprint_len == 0 {
            return Err(ScrapeError::InvalidConfig("fingerprint_len must be positive".to_string()));
        }
        if self.limits.max_cycles == 0 || self.limits.idle_cycles_to_finish == 0 {
            return Err(ScrapeError::InvalidConfig(
                "max_cycles and idle_cycles_to_finish must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the cap is already exceeded by the load-more headroom factor
    pub fn has_enough(&self, visible: usize) -> bool {
        self.max_comments > 0 && visible as f64 >= self.max_comments as f64 * self.limits.load_more_headroom
    }
}

/// Settle delays, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timings {
    /// After scrolling a reply control into view
    pub reply_scroll_ms: u64,
    /// After activating a reply control
    pub reply_activate_ms: u64,
    /// After the extra scroll that reveals hidden reply controls
    pub hidden_scroll_ms: u64,
    /// Between reply-expansion iterations
    pub reply_iteration_ms: u64,
    /// After scrolling a "more comments" control into view
    pub more_scroll_ms: u64,
    /// After activating a "more comments" control
    pub more_activate_ms: u64,
    /// After each scroll-to-bottom probe
    pub scroll_probe_ms: u64,
    /// After scrolling back to the top
    pub scroll_reset_ms: u64,
    /// Between expansion cycles
    pub cycle_ms: u64,
    /// Once after expansion, before extraction
    pub final_settle_ms: u64,
    /// Upper bound of random jitter added to every settle by a live browser
    pub jitter_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reply_scroll_ms: 600,
            reply_activate_ms: 1000,
            hidden_scroll_ms: 800,
            reply_iteration_ms: 300,
            more_scroll_ms: 300,
            more_activate_ms: 800,
            scroll_probe_ms: 800,
            scroll_reset_ms: 300,
            cycle_ms: 500,
            final_settle_ms: 5000,
            jitter_ms: 0,
        }
    }
}

impl Timings {
    pub fn zero() -> Self {
        Self {
            reply_scroll_ms: 0,
            reply_activate_ms: 0,
            hidden_scroll_ms: 0,
            reply_iteration_ms: 0,
            more_scroll_ms: 0,
            more_activate_ms: 0,
            scroll_probe_ms: 0,
            scroll_reset_ms: 0,
            cycle_ms: 0,
            final_settle_ms: 0,
            jitter_ms: 0,
        }
    }
}

/// Convert a millisecond setting to a [`Duration`]
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Caps bounding worst-case runtime against a host that never stabilizes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    pub max_cycles: usize,
    pub max_reply_iterations: usize,
    /// Consecutive cycles without activity before expansion is done
    pub idle_cycles_to_finish: usize,
    /// Skip loading more once visible comments reach cap × headroom
    pub load_more_headroom: f64,
    /// Scroll-to-bottom probes per cycle
    pub scroll_probes: usize,
    /// Extra scroll applied when reply controls stay hidden
    pub hidden_scroll_step_px: f64,
    /// Margin around the container still counted as visible
    pub viewport_buffer_px: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_cycles: 100,
            max_reply_iterations: 200,
            idle_cycles_to_finish: 3,
            load_more_headroom: 1.5,
            scroll_probes: 3,
            hidden_scroll_step_px: 1000.0,
            viewport_buffer_px: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_driver_constants() {
        let config = ScrapeConfig::default();
        assert_eq!(config.max_comments, 0);
        assert_eq!(config.fingerprint_len, 300);
        assert_eq!(config.limits.max_cycles, 100);
        assert_eq!(config.limits.max_reply_iterations, 200);
        assert_eq!(config.timings.final_settle_ms, 5000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScrapeConfig =
            serde_json::from_str(r#"{"max_comments": 50, "timings": {"cycle_ms": 10}}"#).unwrap();
        assert_eq!(config.max_comments, 50);
        assert_eq!(config.timings.cycle_ms, 10);
        assert_eq!(config.timings.reply_activate_ms, 1000);
        assert_eq!(config.limits.idle_cycles_to_finish, 3);
    }

    #[test]
    fn test_has_enough_uses_headroom() {
        let config = ScrapeConfig::default().max_comments(10);
        assert!(!config.has_enough(14));
        assert!(config.has_enough(15));

        let unlimited = ScrapeConfig::default();
        assert!(!unlimited.has_enough(10_000));
    }

    #[test]
    fn test_validate_rejects_empty_selector() {
        let config = ScrapeConfig::default().container_selector("  ");
        assert!(matches!(config.validate(), Err(ScrapeError::InvalidConfig(_))));
        assert!(ScrapeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_instant_zeroes_timings() {
        let config = ScrapeConfig::instant();
        assert_eq!(config.timings, Timings::zero());
        assert_eq!(ms(config.timings.final_settle_ms), Duration::ZERO);
    }
}
