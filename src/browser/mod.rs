//! Chrome session management and the live-document adapter for a tab

pub mod config;
pub mod document;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use document::ChromeDocument;
pub use session::{normalize_url, BrowserSession};
