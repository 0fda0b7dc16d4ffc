//! [`LiveDocument`] over a Chrome tab
//!
//! Every operation is one `Runtime.evaluate` call. Elements are addressed by
//! the `data-ce-ref` stamps the snapshot script leaves on the page, so a
//! reference stays valid for as long as the element stays attached.

use crate::document::{LiveDocument, ScrollMetrics};
use crate::dom::{DomTree, NodeRef, SNAPSHOT_SCRIPT};
use crate::error::{Result, ScrapeError};
use headless_chrome::Tab;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const LOCATE_SCRIPT: &str = r#"
(function (selector, attr) {
    if (typeof window.__ceNextRef !== 'number') {
        window.__ceNextRef = 1;
    }
    for (const el of document.querySelectorAll(selector)) {
        if (el.querySelector('[role="article"]')) {
            let ref = el.getAttribute(attr);
            if (ref === null) {
                ref = String(window.__ceNextRef++);
                el.setAttribute(attr, ref);
            }
            return JSON.stringify(Number(ref));
        }
    }
    return JSON.stringify(null);
})"#;

/// Resolves the container's scrollable element
const SCROLLER_JS: &str = r#"
function scroller(container) {
    return container.querySelector('[style*="overflow"]') || container.querySelector('.xb57i2i') || container;
}"#;

const HIGHLIGHT_COLORS: [&str; 5] = ["#ff0000", "#ff6b00", "#ff9500", "#ffbb00", "#00ff00"];

/// A live Chrome tab
pub struct ChromeDocument {
    tab: Arc<Tab>,
    viewport_buffer_px: f64,
    jitter_ms: u64,
}

impl ChromeDocument {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self {
            tab,
            viewport_buffer_px: 1000.0,
            jitter_ms: 0,
        }
    }

    /// Builder method: margin around the container still counted as visible
    pub fn viewport_buffer(mut self, px: f64) -> Self {
        self.viewport_buffer_px = px;
        self
    }

    /// Builder method: random extra delay added to every settle
    pub fn jitter(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Evaluate a script that returns a JSON string and decode it
    fn call<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| ScrapeError::EvaluationFailed(e.to_string()))?;

        let json = remote
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::EvaluationFailed("Script did not return a JSON string".to_string()))?;

        Ok(serde_json::from_str(json)?)
    }

    /// Run `body` with `el` bound to the referenced element. The body returns
    /// a JSON-serializable value; a missing element yields "missing".
    fn with_element<T: DeserializeOwned>(&self, node: NodeRef, body: &str) -> Result<T> {
        let script = format!(
            r#"(function () {{
    const el = document.querySelector('{selector}');
    if (!el) {{
        return JSON.stringify("missing");
    }}
    {scroller}
    return JSON.stringify((function () {{ {body} }})());
}})()"#,
            selector = node.selector(),
            scroller = SCROLLER_JS,
            body = body,
        );

        let value: serde_json::Value = self.call(&script)?;
        if value.as_str() == Some("missing") {
            return Err(ScrapeError::ElementNotFound(format!("no element {}", node)));
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl LiveDocument for ChromeDocument {
    fn locate_container(&mut self, selector: &str) -> Result<Option<NodeRef>> {
        let script = format!(
            "({})({}, {})",
            LOCATE_SCRIPT,
            serde_json::to_string(selector)?,
            serde_json::to_string(NodeRef::ATTRIBUTE)?
        );
        let found: Option<u64> = self.call(&script)?;
        Ok(found.map(NodeRef))
    }

    fn snapshot(&mut self, container: NodeRef) -> Result<DomTree> {
        let script = format!("({})({})", SNAPSHOT_SCRIPT, container.0);
        let remote = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| ScrapeError::SnapshotFailed(e.to_string()))?;

        let json = remote
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::SnapshotFailed("Snapshot script returned no data".to_string()))?;
        if json == "null" {
            return Err(ScrapeError::SnapshotFailed(format!("container {} is gone", container)));
        }

        let tree = DomTree::from_json(json)?;
        log::debug!("Snapshot of {}: {} elements", container, tree.count_elements());
        Ok(tree)
    }

    fn scroll_into_view(&mut self, node: NodeRef) -> Result<()> {
        self.with_element::<bool>(node, "el.scrollIntoView({ behavior: 'smooth', block: 'center' }); return true;")?;
        Ok(())
    }

    fn is_in_viewport(&mut self, node: NodeRef, container: NodeRef) -> Result<bool> {
        let body = format!(
            r#"const box = document.querySelector('{container}');
    if (!box || !box.contains(el)) {{
        return false;
    }}
    const rect = el.getBoundingClientRect();
    const bounds = box.getBoundingClientRect();
    return rect.top < bounds.bottom + {buffer} && rect.bottom > bounds.top - {buffer};"#,
            container = container.selector(),
            buffer = self.viewport_buffer_px,
        );
        self.with_element(node, &body)
    }

    fn activate(&mut self, node: NodeRef) -> Result<()> {
        // Links would navigate away from the thread.
        let body = r#"if (el.tagName === 'A') {
        el.addEventListener('click', (e) => e.preventDefault(), { once: true });
    }
    el.click();
    return true;"#;
        self.with_element::<bool>(node, body)
            .map(|_| ())
            .map_err(|e| match e {
                ScrapeError::ElementNotFound(_) => e,
                other => ScrapeError::ActivationFailed {
                    node,
                    reason: other.to_string(),
                },
            })
    }

    fn scroll_metrics(&mut self, container: NodeRef) -> Result<ScrollMetrics> {
        let (scroll_top, scroll_height): (f64, f64) = self.with_element(
            container,
            "const s = scroller(el); return [s.scrollTop, s.scrollHeight];",
        )?;
        Ok(ScrollMetrics { scroll_top, scroll_height })
    }

    fn scroll_to(&mut self, container: NodeRef, top: f64) -> Result<()> {
        self.with_element::<bool>(container, &format!("scroller(el).scrollTop = {}; return true;", top))?;
        Ok(())
    }

    fn highlight(&mut self, node: NodeRef, depth: u32) -> Result<()> {
        let color = HIGHLIGHT_COLORS[(depth as usize).min(HIGHLIGHT_COLORS.len() - 1)];
        let badge = if depth == 0 { "MAIN".to_string() } else { format!("REPLY-{}", depth) };
        let body = format!(
            r#"el.style.cssText = 'border: 3px solid {color} !important; box-shadow: 0 0 10px {color} !important; border-radius: 8px !important; background: rgba(255, 0, 0, 0.05) !important; position: relative !important;';
    const label = document.createElement('div');
    label.style.cssText = 'position: absolute; top: -12px; left: 10px; background: {color}; color: white; padding: 2px 8px; border-radius: 4px; font-size: 10px; font-weight: bold; z-index: 10;';
    label.textContent = '{badge}';
    el.appendChild(label);
    return true;"#
        );
        self.with_element::<bool>(node, &body)?;
        Ok(())
    }

    fn page_url(&mut self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    fn settle(&mut self, duration: Duration) {
        let jitter = if self.jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
        } else {
            Duration::ZERO
        };
        std::thread::sleep(duration + jitter);
    }
}
