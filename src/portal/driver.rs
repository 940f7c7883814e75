//! Browser seam. Retrieval logic only sees these traits, so every strategy
//! can run against Chrome in production and a scripted fake in tests.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Chrome/Chromium not found; set PAYDESK_CHROME_PATH")]
    ChromeNotFound,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Cdp(String),

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How to find one element on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// First visible element matching a CSS selector.
    Css { selector: String },
    /// First visible element matching `selector` whose text contains `text`
    /// (case-insensitive).
    Text { selector: String, text: String },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Self::Css {
            selector: selector.to_string(),
        }
    }

    pub fn text(selector: &str, text: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
            text: text.to_string(),
        }
    }

    /// JS expression evaluating to the matched element (or `null`), searching under `root`.
    pub fn find_js(&self, root: &str) -> String {
        let (selector, text) = match self {
            Self::Css { selector } => (selector.as_str(), None),
            Self::Text { selector, text } => (selector.as_str(), Some(text.as_str())),
        };
        let selector = serde_json::Value::from(selector);
        let text = text.map_or(serde_json::Value::Null, serde_json::Value::from);
        format!(
            r#"(function(root) {{
  if (!root) return null;
  const q = {selector};
  const t = {text};
  const visible = e => !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length);
  let els = [];
  try {{ els = Array.from(root.querySelectorAll(q)); }} catch (_) {{ return null; }}
  if (t !== null) {{
    const needle = t.toLowerCase();
    els = els.filter(e => String(e.innerText || e.textContent || e.value || '').toLowerCase().includes(needle));
  }}
  return els.find(visible) || null;
}})({root})"#
        )
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "{selector}"),
            Self::Text { selector, text } => write!(f, "{selector}[text~\"{text}\"]"),
        }
    }
}

/// One browser page (the main portal tab or a popup).
#[async_trait]
pub trait PortalPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool, DriverError>;

    /// Click the element. `Ok(false)` when it is not on the page.
    async fn click(&self, locator: &Locator) -> Result<bool, DriverError>;

    /// Clear the input and type `text` into it. `Ok(false)` when it is not on the page.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<bool, DriverError>;

    /// Current `value` of an input, `None` when the element is missing.
    async fn read_value(&self, locator: &Locator) -> Result<Option<String>, DriverError>;

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Visible text of every row matching `row_selector`, in document order.
    async fn row_texts(&self, row_selector: &str) -> Result<Vec<String>, DriverError>;

    /// Click `target` inside the `index`-th row, or the row itself when `target` is `None`.
    async fn click_in_row(
        &self,
        row_selector: &str,
        index: usize,
        target: Option<&Locator>,
    ) -> Result<bool, DriverError>;

    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// An authenticated (or about to be) browsing context owning one or more pages.
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// The main portal page.
    fn page(&self) -> &dyn PortalPage;

    /// Number of pages currently open.
    async fn page_count(&self) -> Result<usize, DriverError>;

    /// The most recently opened page, if more than `known` pages are open.
    async fn newest_page_beyond(
        &self,
        known: usize,
    ) -> Result<Option<Box<dyn PortalPage>>, DriverError>;

    /// GET `url` with the session's cookies attached.
    async fn fetch_with_cookies(&self, url: &str) -> Result<Vec<u8>, DriverError>;

    /// Where browser-initiated downloads land.
    fn download_dir(&self) -> &Path;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens a fresh session for one run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, DriverError>;
}

/// Poll `check` until it yields `Some` or `timeout` elapses. Errors count as "not yet".
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DriverError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match check().await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => tracing::trace!(error = %e, "poll check failed"),
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Wait for `locator` to become visible within `timeout`.
pub async fn wait_visible(
    page: &dyn PortalPage,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> bool {
    poll_until(timeout, interval, move || async move {
        Ok(page.is_visible(locator).await?.then_some(()))
    })
    .await
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn find_js_escapes_selector_and_text() {
        let js = Locator::text("a", "Cedolino \"2025\"").find_js("document");
        assert!(js.contains(r#"const q = "a";"#));
        assert!(js.contains(r#"const t = "Cedolino \"2025\"";"#));
        assert!(js.ends_with("(document)"));
    }

    #[test]
    fn css_locator_has_null_text() {
        let js = Locator::css("#login").find_js("row");
        assert!(js.contains("const t = null;"));
    }

    #[test]
    fn locator_deserializes_from_tagged_json() {
        let locator: Locator =
            serde_json::from_str(r#"{"by":"text","selector":"a","text":"Documenti"}"#).unwrap();
        assert_eq!(locator, Locator::text("a", "Documenti"));
    }

    #[tokio::test]
    async fn poll_until_returns_first_value() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let found = poll_until(Duration::from_secs(1), Duration::from_millis(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(DriverError::Script("navigating".into()))
            } else if n < 3 {
                Ok(None)
            } else {
                Ok(Some(n))
            }
        })
        .await;
        assert_eq!(found, Some(3));
    }

    #[tokio::test]
    async fn poll_until_gives_up_after_timeout() {
        let found: Option<()> =
            poll_until(Duration::from_millis(20), Duration::from_millis(5), || async {
                Ok(None)
            })
            .await;
        assert!(found.is_none());
    }
}
