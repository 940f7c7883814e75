//! Portal markup as data. Every selector the retrieval code touches lives
//! here, so a layout change on the portal is a JSON override, not a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::driver::Locator;
use crate::config::ConfigError;
use crate::period::DocumentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalLayout {
    pub login: LoginLayout,
    /// Element present on the landing page after login.
    pub landing_marker: Locator,
    /// Click targets that return to the landing page ("Home", logo).
    pub home_targets: Vec<Locator>,
    /// Close buttons of modal dialogs and overlays.
    pub overlay_close: Vec<Locator>,
    pub payslip_route: Vec<NavStep>,
    pub attendance_route: Vec<NavStep>,
    pub date_range: DateRangeLayout,
    pub payslip_listing: ListingLayout,
    pub attendance_listing: ListingLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLayout {
    pub username: Locator,
    pub password: Locator,
    /// Submit controls, tried in order.
    pub submit: Vec<Locator>,
}

/// One logical navigation step: click any candidate, then `expect` must show up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavStep {
    pub name: String,
    pub candidates: Vec<Locator>,
    pub expect: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRangeLayout {
    pub from: Locator,
    pub to: Locator,
    /// "Search"/"Apply" control pressed after the range is set.
    pub apply: Option<Locator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingLayout {
    /// CSS selector matching one row per document.
    pub row_selector: String,
    /// Row-scoped control that triggers a file download.
    pub download_icon: Locator,
    /// Row-scoped control that opens the document in a new tab or in place.
    pub open_target: Option<Locator>,
    /// Rows containing any of these (case-insensitive) are never selected.
    pub exclude_markers: Vec<String>,
}

impl PortalLayout {
    /// Load a layout override from a JSON file. Missing sections keep the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Layout {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Layout {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn route(&self, kind: DocumentKind) -> &[NavStep] {
        match kind {
            DocumentKind::Payslip => &self.payslip_route,
            DocumentKind::Attendance => &self.attendance_route,
        }
    }

    pub fn listing(&self, kind: DocumentKind) -> &ListingLayout {
        match kind {
            DocumentKind::Payslip => &self.payslip_listing,
            DocumentKind::Attendance => &self.attendance_listing,
        }
    }
}

fn documents_step() -> NavStep {
    NavStep {
        name: "open Documents menu".into(),
        candidates: vec![
            Locator::text("a, span, div[role='menuitem']", "Documenti"),
            Locator::css("#menu-documenti, [data-menu='documenti']"),
            Locator::text("button, a", "Documents"),
        ],
        expect: Locator::text("a, span, li, div[role='tab']", "Cedolino"),
    }
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            login: LoginLayout {
                username: Locator::css(
                    "input[name='username'], input[name='m_cUserName'], input#username, input[type='email']",
                ),
                password: Locator::css("input[type='password']"),
                submit: vec![
                    Locator::css("button[type='submit'], input[type='submit']"),
                    Locator::text("button, a, input[type='button']", "Accedi"),
                    Locator::text("button, a, input[type='button']", "Login"),
                ],
            },
            landing_marker: Locator::css(
                "#logout, a[href*='logout'], .user-menu, [data-role='user-profile']",
            ),
            home_targets: vec![
                Locator::text("a, span, div[role='menuitem']", "Home"),
                Locator::css("a.navbar-brand, .logo a, #home"),
            ],
            overlay_close: vec![
                Locator::css(".modal.show .close, .modal.show [data-dismiss='modal']"),
                Locator::css(".ui-dialog .ui-dialog-titlebar-close"),
                Locator::css(".x-tool-close, .k-window-action .k-i-close"),
            ],
            payslip_route: vec![
                documents_step(),
                NavStep {
                    name: "open Cedolino tab".into(),
                    candidates: vec![
                        Locator::text("a, span, li, div[role='tab']", "Cedolino"),
                        Locator::text("a, span", "Busta paga"),
                    ],
                    expect: Locator::css("table tbody tr, .document-list .row"),
                },
            ],
            attendance_route: vec![
                documents_step(),
                NavStep {
                    name: "open Cartellino tab".into(),
                    candidates: vec![
                        Locator::text("a, span, li, div[role='tab']", "Cartellino"),
                        Locator::text("a, span", "Presenze"),
                    ],
                    expect: Locator::css(
                        "input[name='dataDa'], input[name='dateFrom'], input.date-from",
                    ),
                },
            ],
            date_range: DateRangeLayout {
                from: Locator::css("input[name='dataDa'], input[name='dateFrom'], input.date-from"),
                to: Locator::css("input[name='dataA'], input[name='dateTo'], input.date-to"),
                apply: Some(Locator::text("button, a, input[type='button']", "Cerca")),
            },
            payslip_listing: ListingLayout {
                row_selector: "table tbody tr".into(),
                download_icon: Locator::css(
                    "a[download], a[href$='.pdf'], .fa-download, .icon-download, [title*='Scarica']",
                ),
                open_target: Some(Locator::css("a, .fa-eye, [title*='Visualizza']")),
                exclude_markers: vec![
                    "tredicesima".into(),
                    "13ma".into(),
                    "13esima".into(),
                    "13^".into(),
                ],
            },
            attendance_listing: ListingLayout {
                row_selector: "table tbody tr".into(),
                download_icon: Locator::css(
                    "a[download], a[href$='.pdf'], .fa-download, .icon-download, [title*='Scarica']",
                ),
                open_target: Some(Locator::css("a, .fa-eye, [title*='Visualizza']")),
                exclude_markers: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_routes_end_at_listing_views() {
        let layout = PortalLayout::default();
        assert_eq!(layout.route(DocumentKind::Payslip).len(), 2);
        assert_eq!(
            layout.route(DocumentKind::Attendance).last().unwrap().name,
            "open Cartellino tab"
        );
        assert!(layout
            .listing(DocumentKind::Payslip)
            .exclude_markers
            .contains(&"tredicesima".to_string()));
        assert!(layout.listing(DocumentKind::Attendance).exclude_markers.is_empty());
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{"landing_marker": {{"by": "css", "selector": "#welcome"}}}}"##
        )
        .unwrap();

        let layout = PortalLayout::load(file.path()).unwrap();
        assert_eq!(layout.landing_marker, Locator::css("#welcome"));
        assert_eq!(layout.payslip_listing.row_selector, "table tbody tr");
    }

    #[test]
    fn unreadable_layout_is_a_config_error() {
        let err = PortalLayout::load(Path::new("/nonexistent/layout.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Layout { .. }));
    }
}
