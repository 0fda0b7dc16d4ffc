use serde::Serialize;
use std::fmt;

/// Phase of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Starting,
    ExpandingReplies,
    LoadingMore,
    Settling,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Starting => "starting",
            Stage::ExpandingReplies => "expanding replies",
            Stage::LoadingMore => "loading more comments",
            Stage::Settling => "settling",
            Stage::Extracting => "extracting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of run progress handed to a [`ProgressSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub status: String,
    pub stage: Stage,
    pub main_comments: usize,
    pub replies: usize,
    pub controls_activated: usize,
    pub scraped: usize,
    /// Collection cap (0 = unlimited)
    pub cap: usize,
}

impl Progress {
    pub fn new(stage: Stage, status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            stage,
            main_comments: 0,
            replies: 0,
            controls_activated: 0,
            scraped: 0,
            cap: 0,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.status)?;
        if self.scraped > 0 || self.controls_activated > 0 {
            let cap = if self.cap == 0 { "∞".to_string() } else { self.cap.to_string() };
            write!(
                f,
                " (main {}, replies {}, scraped {}/{}, controls {})",
                self.main_comments, self.replies, self.scraped, cap, self.controls_activated
            )?;
        }
        Ok(())
    }
}

/// Receives progress updates during a run
pub trait ProgressSink {
    fn update(&mut self, progress: &Progress);
}

/// Reports progress through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&mut self, progress: &Progress) {
        match progress.stage {
            Stage::Failed => log::warn!("{}", progress),
            Stage::Extracting => log::debug!("{}", progress),
            _ => log::info!("{}", progress),
        }
    }
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _progress: &Progress) {}
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn update(&mut self, progress: &Progress) {
        self(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: &Progress| seen.push(p.stage);
            sink.update(&Progress::new(Stage::Starting, "go"));
            sink.update(&Progress::new(Stage::Done, "done"));
        }
        assert_eq!(seen, vec![Stage::Starting, Stage::Done]);
    }

    #[test]
    fn test_display() {
        let mut progress = Progress::new(Stage::Extracting, "Extracting");
        progress.scraped = 3;
        progress.main_comments = 2;
        progress.replies = 1;
        assert_eq!(progress.to_string(), "[extracting] Extracting (main 2, replies 1, scraped 3/∞, controls 0)");
    }
}
