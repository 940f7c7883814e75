//! Document locator & downloader.
//!
//! Picks the listing row for the target period, then tries three ways of
//! getting its file onto disk: a browser download, a new tab, or an
//! in-place navigation printed to PDF.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::driver::{poll_until, DriverError, PortalPage, PortalSession};
use super::layout::ListingLayout;
use super::strategy::{run_chain, Strategy};
use super::PortalError;
use crate::config::Timeouts;
use crate::period::{DocumentKind, RetrievalTarget};
use crate::progress::{ProgressSink, RunEvent};

/// Addresses that serve the file itself rather than a viewer page.
static DIRECT_FILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.pdf($|[?#])|/download|getfile|attachment").unwrap()
});

/// Suffixes of files the browser is still writing.
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".part", ".tmp"];

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `key` occurs in `row` as a whole token, so `06/2025` does not
/// match inside a full date such as `10/06/2025`.
fn contains_key(row: &str, key: &str) -> bool {
    row.match_indices(key).any(|(start, _)| {
        let before = row[..start].chars().next_back();
        let after = row[start + key.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric() || c == '/')
            && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

/// Index of the row for the period, skipping rows with an exclusion marker.
///
/// Keys are tried in order across the whole listing; a later key is only
/// used when no row carries an earlier one.
pub fn find_matching_row(rows: &[String], keys: &[String], exclude: &[String]) -> Option<usize> {
    let exclude: Vec<String> = exclude.iter().map(|m| normalize(m)).collect();
    let rows: Vec<String> = rows.iter().map(|r| normalize(r)).collect();
    keys.iter().map(|k| normalize(k)).find_map(|key| {
        rows.iter().position(|row| {
            contains_key(row, &key) && !exclude.iter().any(|m| row.contains(m.as_str()))
        })
    })
}

pub fn is_direct_file_url(url: &str) -> bool {
    DIRECT_FILE_URL.is_match(url)
}

/// Atomically write `bytes` to `dest`, replacing any previous file.
/// `None` when there is nothing to write.
pub fn write_document(dest: &Path, bytes: &[u8]) -> std::io::Result<Option<PathBuf>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;

    if std::fs::metadata(dest)?.len() == 0 {
        return Ok(None);
    }
    Ok(Some(dest.to_path_buf()))
}

/// Where the listing row and its file end up.
struct Job<'a> {
    listing: &'a ListingLayout,
    row: usize,
    dest: &'a Path,
    timeouts: &'a Timeouts,
}

// ---------------------------------------------------------------------------
// Strategy 1: browser download
// ---------------------------------------------------------------------------

struct DownloadEvent<'a>(&'a Job<'a>);

fn completed_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        if entry.metadata()?.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[async_trait]
impl Strategy<PathBuf> for DownloadEvent<'_> {
    fn name(&self) -> &str {
        "download event"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<PathBuf>, DriverError> {
        let job = self.0;
        let dir = session.download_dir();
        let before: HashSet<PathBuf> = completed_files(dir)?.into_iter().collect();

        let clicked = session
            .page()
            .click_in_row(&job.listing.row_selector, job.row, Some(&job.listing.download_icon))
            .await?;
        if !clicked {
            return Ok(None);
        }

        let before = &before;
        let fresh = poll_until(job.timeouts.download, job.timeouts.poll, move || async move {
            let found = completed_files(dir)?.into_iter().find(|p| {
                !before.contains(p) && std::fs::metadata(p).map(|m| m.len() > 0).unwrap_or(false)
            });
            Ok::<_, DriverError>(found)
        })
        .await;
        let Some(fresh) = fresh else {
            return Ok(None);
        };

        tracing::debug!(file = %fresh.display(), "browser download finished");
        let bytes = std::fs::read(&fresh)?;
        let written = write_document(job.dest, &bytes)?;
        if let Err(e) = std::fs::remove_file(&fresh) {
            tracing::debug!(error = %e, "failed to remove browser download");
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Strategy 2: new tab
// ---------------------------------------------------------------------------

struct NewTab<'a>(&'a Job<'a>);

impl NewTab<'_> {
    /// `None` when the popup never leaves `about:blank`.
    async fn fetch_from(
        &self,
        session: &dyn PortalSession,
        popup: &dyn PortalPage,
    ) -> Result<Option<Vec<u8>>, DriverError> {
        let timeouts = self.0.timeouts;
        let url = poll_until(timeouts.step, timeouts.poll, move || async move {
            let url = popup.current_url().await?;
            Ok((!url.is_empty() && url != "about:blank").then_some(url))
        })
        .await;
        let Some(url) = url else {
            tracing::debug!("new tab never left about:blank");
            return Ok(None);
        };

        if is_direct_file_url(&url) {
            tracing::debug!(url = %url, "new tab is a direct file, fetching with session cookies");
            session.fetch_with_cookies(&url).await.map(Some)
        } else {
            tokio::time::sleep(timeouts.settle).await;
            popup.print_pdf().await.map(Some)
        }
    }
}

#[async_trait]
impl Strategy<PathBuf> for NewTab<'_> {
    fn name(&self) -> &str {
        "new tab"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<PathBuf>, DriverError> {
        let job = self.0;
        let Some(open) = &job.listing.open_target else {
            return Ok(None);
        };

        let known = session.page_count().await?;
        let clicked = session
            .page()
            .click_in_row(&job.listing.row_selector, job.row, Some(open))
            .await?;
        if !clicked {
            return Ok(None);
        }

        let popup = poll_until(job.timeouts.download, job.timeouts.poll, move || async move {
            session.newest_page_beyond(known).await
        })
        .await;
        let Some(popup) = popup else {
            return Ok(None);
        };

        let bytes = self.fetch_from(session, popup.as_ref()).await;
        if let Err(e) = popup.close().await {
            tracing::debug!(error = %e, "failed to close popup");
        }
        match bytes? {
            Some(bytes) => Ok(write_document(job.dest, &bytes)?),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy 3: same-tab navigation
// ---------------------------------------------------------------------------

struct SameTab<'a>(&'a Job<'a>);

#[async_trait]
impl Strategy<PathBuf> for SameTab<'_> {
    fn name(&self) -> &str {
        "same-tab navigation"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<PathBuf>, DriverError> {
        let job = self.0;
        let page = session.page();
        let listing_url = page.current_url().await?;

        if !page.click_in_row(&job.listing.row_selector, job.row, None).await? {
            return Ok(None);
        }

        let listing = listing_url.as_str();
        let moved = poll_until(job.timeouts.download, job.timeouts.poll, move || async move {
            Ok((page.current_url().await? != listing).then_some(()))
        })
        .await;
        if moved.is_none() {
            return Ok(None);
        }

        tokio::time::sleep(job.timeouts.settle).await;
        let bytes = page.print_pdf().await;
        if let Err(e) = page.goto(&listing_url).await {
            tracing::debug!(error = %e, "failed to return to listing");
        }
        Ok(write_document(job.dest, &bytes?)?)
    }
}

/// Find the row for `target` in the current listing and save its file as
/// `<output_dir>/<kind>_<MM>_<YYYY>.pdf`.
pub async fn retrieve_document(
    session: &dyn PortalSession,
    kind: DocumentKind,
    target: &RetrievalTarget,
    listing: &ListingLayout,
    output_dir: &Path,
    timeouts: &Timeouts,
    progress: &dyn ProgressSink,
) -> Result<PathBuf, PortalError> {
    let keys = target.period_keys();
    progress.report(RunEvent::step(format!(
        "Looking for the {kind} of {}",
        target.named_period_key()
    )));

    let page = session.page();
    let selector = listing.row_selector.as_str();
    let rows = poll_until(timeouts.step, timeouts.poll, move || async move {
        let rows = page.row_texts(selector).await?;
        Ok((!rows.is_empty()).then_some(rows))
    })
    .await
    .unwrap_or_default();

    let row = find_matching_row(&rows, &keys, &listing.exclude_markers).ok_or_else(|| {
        PortalError::DocumentNotRetrieved(format!(
            "no {kind} row for {} among {} rows",
            keys.join(" / "),
            rows.len()
        ))
    })?;
    tracing::debug!(kind = %kind, row, text = %rows[row], "matched listing row");

    std::fs::create_dir_all(output_dir)?;
    let dest = output_dir.join(target.file_name(kind));
    let job = Job {
        listing,
        row,
        dest: &dest,
        timeouts,
    };
    let strategies: Vec<Box<dyn Strategy<PathBuf> + '_>> = vec![
        Box::new(DownloadEvent(&job)),
        Box::new(NewTab(&job)),
        Box::new(SameTab(&job)),
    ];

    let step = format!("download {kind}");
    run_chain(&step, session, &strategies, progress)
        .await
        .map(|success| success.value)
        .ok_or_else(|| {
            PortalError::DocumentNotRetrieved(format!("every download strategy failed for {kind}"))
        })
}
