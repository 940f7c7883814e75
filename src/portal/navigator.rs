//! Navigator: walk the session from the landing page to a listing view,
//! one strategy chain per step, and recover to the landing page on demand.

use async_trait::async_trait;

use super::driver::{wait_visible, DriverError, Locator, PortalSession};
use super::layout::{NavStep, PortalLayout};
use super::strategy::{run_chain, Strategy};
use super::PortalError;
use crate::config::Timeouts;
use crate::progress::{ProgressSink, RunEvent};

const SCROLL_TOP_SCRIPT: &str = r#"(function() {
  window.scrollTo(0, 0);
  const init = {key: 'Escape', code: 'Escape', keyCode: 27, which: 27, bubbles: true};
  document.dispatchEvent(new KeyboardEvent('keydown', init));
  document.dispatchEvent(new KeyboardEvent('keyup', init));
  return true;
})()"#;

/// Click one candidate, then wait for the step's follow-on element.
struct ClickThenExpect<'a> {
    label: String,
    candidate: &'a Locator,
    expect: &'a Locator,
    timeouts: &'a Timeouts,
}

#[async_trait]
impl Strategy<()> for ClickThenExpect<'_> {
    fn name(&self) -> &str {
        &self.label
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<()>, DriverError> {
        let page = session.page();
        if !page.click(self.candidate).await? {
            return Ok(None);
        }
        let shown = wait_visible(page, self.expect, self.timeouts.step, self.timeouts.poll).await;
        Ok(shown.then_some(()))
    }
}

/// Follow `route` step by step. A step whose candidates all fail ends the route.
pub async fn navigate(
    session: &dyn PortalSession,
    route: &[NavStep],
    timeouts: &Timeouts,
    progress: &dyn ProgressSink,
) -> Result<(), PortalError> {
    for step in route {
        progress.report(RunEvent::step(format!("Navigating: {}", step.name)));
        let strategies: Vec<Box<dyn Strategy<()> + '_>> = step
            .candidates
            .iter()
            .map(|candidate| {
                Box::new(ClickThenExpect {
                    label: format!("click {candidate}"),
                    candidate,
                    expect: &step.expect,
                    timeouts,
                }) as Box<dyn Strategy<()> + '_>
            })
            .collect();

        if run_chain(&step.name, session, &strategies, progress).await.is_none() {
            return Err(PortalError::Navigation {
                step: step.name.clone(),
            });
        }
    }
    Ok(())
}

/// Scroll up, dismiss overlays, then click a home target.
struct DismissAndGoHome<'a> {
    layout: &'a PortalLayout,
    timeouts: &'a Timeouts,
}

#[async_trait]
impl Strategy<()> for DismissAndGoHome<'_> {
    fn name(&self) -> &str {
        "dismiss overlays and click home"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<()>, DriverError> {
        let page = session.page();
        page.run_script(SCROLL_TOP_SCRIPT).await?;
        for close in &self.layout.overlay_close {
            if page.click(close).await.unwrap_or(false) {
                tracing::debug!(overlay = %close, "dismissed overlay");
            }
        }
        tokio::time::sleep(self.timeouts.settle).await;

        for home in &self.layout.home_targets {
            if page.click(home).await? {
                let back = wait_visible(
                    page,
                    &self.layout.landing_marker,
                    self.timeouts.step,
                    self.timeouts.poll,
                )
                .await;
                if back {
                    return Ok(Some(()));
                }
            }
        }
        Ok(None)
    }
}

/// Load the landing URL recorded at login.
struct ReloadLanding<'a> {
    landing_url: &'a str,
    layout: &'a PortalLayout,
    timeouts: &'a Timeouts,
}

#[async_trait]
impl Strategy<()> for ReloadLanding<'_> {
    fn name(&self) -> &str {
        "reload landing page"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<()>, DriverError> {
        let page = session.page();
        page.goto(self.landing_url).await?;
        let back = wait_visible(
            page,
            &self.layout.landing_marker,
            self.timeouts.step,
            self.timeouts.poll,
        )
        .await;
        Ok(back.then_some(()))
    }
}

/// Return the session to the landing page before a new route.
pub async fn reset_to_baseline(
    session: &dyn PortalSession,
    layout: &PortalLayout,
    landing_url: &str,
    timeouts: &Timeouts,
    progress: &dyn ProgressSink,
) -> Result<(), PortalError> {
    const STEP: &str = "reset to baseline";
    progress.report(RunEvent::step("Returning to the landing page"));
    let strategies: Vec<Box<dyn Strategy<()> + '_>> = vec![
        Box::new(DismissAndGoHome { layout, timeouts }),
        Box::new(ReloadLanding {
            landing_url,
            layout,
            timeouts,
        }),
    ];
    run_chain(STEP, session, &strategies, progress)
        .await
        .map(|_| ())
        .ok_or_else(|| PortalError::Navigation { step: STEP.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::testing::{Effect, FakeSession};
    use crate::progress::CollectingProgress;
    use std::time::Duration;

    fn fast() -> Timeouts {
        Timeouts {
            step: Duration::from_millis(30),
            login: Duration::from_millis(30),
            download: Duration::from_millis(30),
            poll: Duration::from_millis(5),
            settle: Duration::from_millis(1),
        }
    }

    fn route() -> Vec<NavStep> {
        vec![
            NavStep {
                name: "open Documents menu".into(),
                candidates: vec![Locator::css("#docs-old"), Locator::css("#docs-new")],
                expect: Locator::css("#tab-cedolino"),
            },
            NavStep {
                name: "open Cedolino tab".into(),
                candidates: vec![Locator::css("#tab-cedolino")],
                expect: Locator::css("table"),
            },
        ]
    }

    #[tokio::test]
    async fn later_candidate_rescues_a_step() {
        let session = FakeSession::new()
            .show(&Locator::css("#docs-new"))
            .on_click(&Locator::css("#docs-new"), vec![Effect::Show(Locator::css("#tab-cedolino"))])
            .on_click(&Locator::css("#tab-cedolino"), vec![Effect::Show(Locator::css("table"))]);
        let progress = CollectingProgress::new();

        navigate(&session, &route(), &fast(), &progress).await.unwrap();

        let messages = progress.messages();
        assert!(messages.iter().any(|m| m.contains("click #docs-old failed")));
        assert!(messages
            .iter()
            .any(|m| m == "open Documents menu: succeeded via click #docs-new"));
    }

    #[tokio::test]
    async fn click_without_follow_on_element_fails_the_step() {
        let session = FakeSession::new()
            .show(&Locator::css("#docs-new"))
            .on_click(&Locator::css("#docs-new"), vec![Effect::Show(Locator::css("#tab-cedolino"))])
            .on_click(&Locator::css("#tab-cedolino"), vec![]);

        let err = navigate(&session, &route(), &fast(), &CollectingProgress::new())
            .await
            .unwrap_err();
        match err {
            PortalError::Navigation { step } => assert_eq!(step, "open Cedolino tab"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reset_uses_home_click_when_available() {
        let layout = PortalLayout::default();
        let home = layout.home_targets[0].clone();
        let session = FakeSession::new()
            .show(&home)
            .on_click(&home, vec![Effect::Show(layout.landing_marker.clone())]);

        reset_to_baseline(&session, &layout, "https://hr.example.com/home", &fast(), &CollectingProgress::new())
            .await
            .unwrap();
        assert!(session.clicks().contains(&home.to_string()));
    }

    #[tokio::test]
    async fn reset_falls_back_to_landing_url() {
        let layout = PortalLayout::default();
        let session = FakeSession::new().on_goto(
            "https://hr.example.com/home",
            vec![Effect::Show(layout.landing_marker.clone())],
        );
        let progress = CollectingProgress::new();

        reset_to_baseline(&session, &layout, "https://hr.example.com/home", &fast(), &progress)
            .await
            .unwrap();
        assert!(progress
            .messages()
            .iter()
            .any(|m| m.ends_with("succeeded via reload landing page")));
    }

    #[tokio::test]
    async fn reset_fails_when_landing_never_returns() {
        let layout = PortalLayout::default();
        let session = FakeSession::new();

        let err = reset_to_baseline(&session, &layout, "https://hr.example.com/home", &fast(), &CollectingProgress::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Navigation { .. }));
    }
}
