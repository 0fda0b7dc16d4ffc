use crate::dom::NodeRef;
use thiserror::Error;

/// Errors produced while driving the browser or scraping a comment thread
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// No thread view with comment nodes is open on the page
    #[error("No comment container found for selector '{0}'")]
    ContainerNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Failed to snapshot document: {0}")]
    SnapshotFailed(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Failed to activate control {node}: {reason}")]
    ActivationFailed { node: NodeRef, reason: String },

    #[error("Failed to extract comment: {0}")]
    ExtractionFailed(String),

    /// A scrape session is already in flight
    #[error("A scrape is already in progress")]
    AlreadyRunning,

    #[error("No comments found")]
    NoComments,

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result type alias for scraping operations
pub type Result<T> = std::result::Result<T, ScrapeError>;
