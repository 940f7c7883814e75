//! Headless Chrome implementation of the portal seam (CDP via chromiumoxide).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures_util::StreamExt;
use tempfile::TempDir;

use super::driver::{DriverError, Locator, PortalPage, PortalSession, SessionLauncher};

const MARK_ATTR: &str = "data-paydesk-target";

fn cdp(e: impl std::fmt::Display) -> DriverError {
    DriverError::Cdp(e.to_string())
}

/// Launch parameters shared by every run.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub http_timeout: Duration,
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, DriverError> {
        let chrome = match &self.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome().ok_or(DriverError::ChromeNotFound)?,
        };
        let profile = scratch_dir("paydesk-profile-")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(profile.path())
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let downloads = scratch_dir("paydesk-dl-")?;
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(downloads.path().to_string_lossy().to_string())
            .build()
            .map_err(DriverError::Launch)?;
        browser.execute(behavior).await.map_err(cdp)?;

        let page = browser.new_page("about:blank").await.map_err(cdp)?;
        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| DriverError::Http(e.to_string()))?;

        tracing::debug!(downloads = %downloads.path().display(), "browser session started");

        Ok(Box::new(ChromeSession {
            browser,
            handler_task,
            main: ChromePage { page },
            downloads,
            http,
            _profile: profile,
        }))
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    main: ChromePage,
    downloads: TempDir,
    http: reqwest::Client,
    /// Fresh per session so no cookies or login state survive a run.
    /// Declared last: removed only after the browser handle is gone.
    _profile: TempDir,
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl PortalSession for ChromeSession {
    fn page(&self) -> &dyn PortalPage {
        &self.main
    }

    async fn page_count(&self) -> Result<usize, DriverError> {
        Ok(self.browser.pages().await.map_err(cdp)?.len())
    }

    async fn newest_page_beyond(
        &self,
        known: usize,
    ) -> Result<Option<Box<dyn PortalPage>>, DriverError> {
        let pages = self.browser.pages().await.map_err(cdp)?;
        if pages.len() <= known {
            return Ok(None);
        }
        let main_id = self.main.page.target_id().clone();
        Ok(pages
            .into_iter()
            .rev()
            .find(|p| *p.target_id() != main_id)
            .map(|page| Box::new(ChromePage { page }) as Box<dyn PortalPage>))
    }

    async fn fetch_with_cookies(&self, url: &str) -> Result<Vec<u8>, DriverError> {
        let cookies = self.main.page.get_cookies().await.map_err(cdp)?;
        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::COOKIE, header)
            .send()
            .await
            .map_err(|e| DriverError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Http(format!("GET {url} returned {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DriverError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn download_dir(&self) -> &Path {
        self.downloads.path()
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.browser.close().await.map_err(cdp)?;
        // Reap the child before the profile directory is removed.
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "failed to reap browser process");
        }
        self.handler_task.abort();
        Ok(())
    }
}

pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn eval(&self, script: String) -> Result<serde_json::Value, DriverError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    /// Tag the element found by `find_expr` so CDP can address it by selector.
    async fn mark(&self, find_expr: &str) -> Result<Option<Element>, DriverError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let script = format!(
            r#"(function() {{
  const el = {find_expr};
  if (!el) return false;
  el.scrollIntoView({{block: 'center'}});
  el.setAttribute('{MARK_ATTR}', '{token}');
  return true;
}})()"#
        );
        if !self.eval(script).await?.as_bool().unwrap_or(false) {
            return Ok(None);
        }
        let element = self
            .page
            .find_element(format!("[{MARK_ATTR}='{token}']"))
            .await
            .map_err(cdp)?;
        Ok(Some(element))
    }

    async fn click_expr(&self, find_expr: &str) -> Result<bool, DriverError> {
        let Some(element) = self.mark(find_expr).await? else {
            return Ok(false);
        };
        if let Err(e) = element.click().await {
            // Obscured elements still respond to a DOM click.
            tracing::debug!(error = %e, "CDP click failed, using DOM click");
            self.eval(format!("(function() {{ const el = {find_expr}; if (el) el.click(); return !!el; }})()"))
                .await?;
        }
        Ok(true)
    }
}

fn row_expr(row_selector: &str, index: usize) -> String {
    let selector = serde_json::Value::from(row_selector);
    format!("(document.querySelectorAll({selector})[{index}] || null)")
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(cdp)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, DriverError> {
        let script = format!("!!({})", locator.find_js("document"));
        Ok(self.eval(script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> Result<bool, DriverError> {
        self.click_expr(&locator.find_js("document")).await
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<bool, DriverError> {
        let find = locator.find_js("document");
        let Some(element) = self.mark(&find).await? else {
            return Ok(false);
        };
        self.eval(format!(
            r#"(function() {{
  const el = {find};
  if (!el) return false;
  el.value = '';
  el.dispatchEvent(new Event('input', {{bubbles: true}}));
  return true;
}})()"#
        ))
        .await?;
        element.click().await.map_err(cdp)?;
        element.type_str(text).await.map_err(cdp)?;
        self.eval(format!(
            r#"(function() {{
  const el = {find};
  if (!el) return false;
  el.dispatchEvent(new Event('change', {{bubbles: true}}));
  el.blur();
  return true;
}})()"#
        ))
        .await?;
        Ok(true)
    }

    async fn read_value(&self, locator: &Locator) -> Result<Option<String>, DriverError> {
        let script = format!(
            "(function() {{ const el = {}; return el ? String(el.value == null ? '' : el.value) : null; }})()",
            locator.find_js("document")
        );
        Ok(self.eval(script).await?.as_str().map(str::to_string))
    }

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.eval(script.to_string()).await
    }

    async fn row_texts(&self, row_selector: &str) -> Result<Vec<String>, DriverError> {
        let selector = serde_json::Value::from(row_selector);
        let script = format!(
            r#"Array.from(document.querySelectorAll({selector}))
  .map(r => String(r.innerText || r.textContent || '').replace(/\s+/g, ' ').trim())"#
        );
        let value = self.eval(script).await?;
        serde_json::from_value(value).map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn click_in_row(
        &self,
        row_selector: &str,
        index: usize,
        target: Option<&Locator>,
    ) -> Result<bool, DriverError> {
        let row = row_expr(row_selector, index);
        let find = match target {
            Some(locator) => locator.find_js(&row),
            None => row,
        };
        self.click_expr(&find).await
    }

    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            ..Default::default()
        };
        self.page.pdf(params).await.map_err(cdp)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page.clone().close().await.map_err(cdp)
    }
}

/// Locate a Chrome or Chromium executable on PATH or in the usual install locations.
pub fn find_chrome() -> Option<PathBuf> {
    const NAMES: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];
    if let Some(path) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path) {
            for name in NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    [
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// Per-session directory, removed when the session is dropped.
fn scratch_dir(prefix: &str) -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix(prefix).tempdir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_expression_indexes_selector() {
        assert_eq!(
            row_expr("table tbody tr", 2),
            r#"(document.querySelectorAll("table tbody tr")[2] || null)"#
        );
    }

    #[test]
    fn every_session_gets_an_empty_profile() {
        let first = scratch_dir("paydesk-profile-").unwrap();
        std::fs::write(first.path().join("Cookies"), b"session=abc").unwrap();
        let second = scratch_dir("paydesk-profile-").unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read_dir(second.path()).unwrap().count(), 0);

        let kept = first.path().to_path_buf();
        drop(first);
        assert!(!kept.exists());
    }
}
