//! Scripted in-memory portal used by unit tests.
//!
//! Elements are "on the page" when their locator is in the visible set.
//! Clicks, navigations and scripts trigger configured effects.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::TempDir;

use super::driver::{DriverError, Locator, PortalPage, PortalSession, SessionLauncher};

#[derive(Debug, Clone)]
pub enum Effect {
    Show(Locator),
    SetUrl(String),
    /// Open a popup page at `url` whose printed PDF is `pdf`.
    OpenPage { url: String, pdf: Vec<u8> },
    /// Drop a finished file into the download directory.
    Download { file_name: String, bytes: Vec<u8> },
    /// Make the triggering call return an error.
    Fail(String),
}

#[derive(Default)]
struct FakeState {
    visible: HashSet<Locator>,
    url: String,
    values: HashMap<Locator, String>,
    ignores_typing: HashSet<Locator>,
    on_click: HashMap<String, Vec<Effect>>,
    on_goto: HashMap<String, Vec<Effect>>,
    scripts: Vec<(String, serde_json::Value, Vec<Effect>)>,
    rows: Vec<String>,
    pdf: Vec<u8>,
    popups: Vec<(String, Vec<u8>)>,
    remote_files: HashMap<String, Vec<u8>>,
    clicks: Vec<String>,
    download_dir: PathBuf,
}

impl FakeState {
    fn apply(&mut self, effects: &[Effect]) -> Result<(), DriverError> {
        for effect in effects {
            match effect {
                Effect::Show(l) => {
                    self.visible.insert(l.clone());
                }
                Effect::SetUrl(url) => self.url = url.clone(),
                Effect::OpenPage { url, pdf } => self.popups.push((url.clone(), pdf.clone())),
                Effect::Download { file_name, bytes } => {
                    std::fs::write(self.download_dir.join(file_name), bytes)?;
                }
                Effect::Fail(reason) => return Err(DriverError::Script(reason.clone())),
            }
        }
        Ok(())
    }
}

fn row_key(index: usize, target: Option<&Locator>) -> String {
    match target {
        Some(l) => format!("row[{index}] {l}"),
        None => format!("row[{index}]"),
    }
}

#[derive(Clone)]
struct Shared(Arc<Mutex<FakeState>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct FakePage {
    shared: Shared,
    popup: Option<usize>,
}

#[async_trait]
impl PortalPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.shared.lock();
        state.url = url.to_string();
        let effects = state.on_goto.get(url).cloned().unwrap_or_default();
        state.apply(&effects)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let state = self.shared.lock();
        Ok(match self.popup {
            Some(i) => state.popups[i].0.clone(),
            None => state.url.clone(),
        })
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, DriverError> {
        Ok(self.popup.is_none() && self.shared.lock().visible.contains(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<bool, DriverError> {
        let mut state = self.shared.lock();
        if !state.visible.contains(locator) {
            return Ok(false);
        }
        let key = locator.to_string();
        state.clicks.push(key.clone());
        let effects = state.on_click.get(&key).cloned().unwrap_or_default();
        state.apply(&effects)?;
        Ok(true)
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<bool, DriverError> {
        let mut state = self.shared.lock();
        if !state.visible.contains(locator) {
            return Ok(false);
        }
        if !state.ignores_typing.contains(locator) {
            state.values.insert(locator.clone(), text.to_string());
        }
        Ok(true)
    }

    async fn read_value(&self, locator: &Locator) -> Result<Option<String>, DriverError> {
        let state = self.shared.lock();
        if !state.visible.contains(locator) {
            return Ok(None);
        }
        Ok(Some(state.values.get(locator).cloned().unwrap_or_default()))
    }

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let mut state = self.shared.lock();
        let matched = state
            .scripts
            .iter()
            .find(|(needle, _, _)| script.contains(needle.as_str()))
            .map(|(_, value, effects)| (value.clone(), effects.clone()));
        match matched {
            Some((value, effects)) => {
                state.apply(&effects)?;
                Ok(value)
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn row_texts(&self, _row_selector: &str) -> Result<Vec<String>, DriverError> {
        Ok(self.shared.lock().rows.clone())
    }

    async fn click_in_row(
        &self,
        _row_selector: &str,
        index: usize,
        target: Option<&Locator>,
    ) -> Result<bool, DriverError> {
        let mut state = self.shared.lock();
        let key = row_key(index, target);
        state.clicks.push(key.clone());
        let Some(effects) = state.on_click.get(&key).cloned() else {
            return Ok(false);
        };
        state.apply(&effects)?;
        Ok(true)
    }

    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError> {
        let state = self.shared.lock();
        Ok(match self.popup {
            Some(i) => state.popups[i].1.clone(),
            None => state.pdf.clone(),
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

pub struct FakeSession {
    main: FakePage,
    downloads: TempDir,
    closes: Arc<AtomicUsize>,
}

impl FakeSession {
    pub fn new() -> Self {
        let downloads = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let state = FakeState {
            url: "about:blank".into(),
            download_dir: downloads.path().to_path_buf(),
            ..Default::default()
        };
        Self {
            main: FakePage {
                shared: Shared(Arc::new(Mutex::new(state))),
                popup: None,
            },
            downloads,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.main.shared.lock()
    }

    pub fn show(self, locator: &Locator) -> Self {
        self.state().visible.insert(locator.clone());
        self
    }

    pub fn ignores_typing(self, locator: &Locator) -> Self {
        self.state().ignores_typing.insert(locator.clone());
        self
    }

    pub fn on_click(self, locator: &Locator, effects: Vec<Effect>) -> Self {
        self.state().on_click.insert(locator.to_string(), effects);
        self
    }

    pub fn on_row_click(self, index: usize, target: Option<&Locator>, effects: Vec<Effect>) -> Self {
        self.state().on_click.insert(row_key(index, target), effects);
        self
    }

    pub fn on_goto(self, url: &str, effects: Vec<Effect>) -> Self {
        self.state().on_goto.insert(url.to_string(), effects);
        self
    }

    /// Scripts containing `needle` return `value` after applying `effects`.
    pub fn on_script(self, needle: &str, value: serde_json::Value, effects: Vec<Effect>) -> Self {
        self.state().scripts.push((needle.to_string(), value, effects));
        self
    }

    pub fn rows(self, rows: &[&str]) -> Self {
        self.state().rows = rows.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn pdf(self, bytes: &[u8]) -> Self {
        self.state().pdf = bytes.to_vec();
        self
    }

    pub fn remote_file(self, url: &str, bytes: &[u8]) -> Self {
        self.state().remote_files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state().clicks.clone()
    }

    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        self.state().values.get(locator).cloned()
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl PortalSession for FakeSession {
    fn page(&self) -> &dyn PortalPage {
        &self.main
    }

    async fn page_count(&self) -> Result<usize, DriverError> {
        Ok(1 + self.state().popups.len())
    }

    async fn newest_page_beyond(
        &self,
        known: usize,
    ) -> Result<Option<Box<dyn PortalPage>>, DriverError> {
        let count = self.state().popups.len();
        if 1 + count <= known || count == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(FakePage {
            shared: self.main.shared.clone(),
            popup: Some(count - 1),
        })))
    }

    async fn fetch_with_cookies(&self, url: &str) -> Result<Vec<u8>, DriverError> {
        self.state()
            .remote_files
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Http(format!("GET {url} returned 404 Not Found")))
    }

    fn download_dir(&self) -> &Path {
        self.downloads.path()
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one prepared `FakeSession`.
pub struct FakeLauncher {
    session: Mutex<Option<FakeSession>>,
}

impl FakeLauncher {
    pub fn new(session: FakeSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    pub fn failing() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, DriverError> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| DriverError::Launch("no browser available".into()))?;
        Ok(Box::new(session))
    }
}
