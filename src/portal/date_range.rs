//! Date-range setter for the attendance listing.
//!
//! Two strategies: type into the inputs and read the value back, or drive
//! the date widget through its own API. An unconfirmed filter is a warning,
//! never a failure: the listing may still contain the target row.

use async_trait::async_trait;

use super::driver::{DriverError, Locator, PortalSession};
use super::layout::DateRangeLayout;
use super::strategy::{run_chain, Strategy};
use crate::config::Timeouts;
use crate::period::{DocumentKind, RetrievalTarget};
use crate::progress::{ProgressSink, RunEvent};

const STEP: &str = "set date range";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilterOutcome {
    Confirmed { strategy: String },
    Unconfirmed,
}

/// Type each date literally, then require the field to echo it back exactly.
struct DirectFields<'a> {
    layout: &'a DateRangeLayout,
    from: &'a str,
    to: &'a str,
}

#[async_trait]
impl Strategy<()> for DirectFields<'_> {
    fn name(&self) -> &str {
        "type into date fields"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<()>, DriverError> {
        let page = session.page();
        for (field, value) in [(&self.layout.from, self.from), (&self.layout.to, self.to)] {
            if !page.fill(field, value).await? {
                return Ok(None);
            }
            let echoed = page.read_value(field).await?;
            if echoed.as_deref() != Some(value) {
                tracing::debug!(field = %field, expected = value, got = ?echoed, "date field rejected typed value");
                return Ok(None);
            }
        }
        Ok(Some(()))
    }
}

/// Set the value through whichever widget owns the input.
struct WidgetApi<'a> {
    layout: &'a DateRangeLayout,
    from: &'a str,
    to: &'a str,
}

#[async_trait]
impl Strategy<()> for WidgetApi<'_> {
    fn name(&self) -> &str {
        "date widget API"
    }

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<()>, DriverError> {
        let page = session.page();
        for (field, value) in [(&self.layout.from, self.from), (&self.layout.to, self.to)] {
            let result = page.run_script(&widget_setter_script(field, value)).await?;
            if result.as_str() != Some(value) {
                return Ok(None);
            }
        }
        Ok(Some(()))
    }
}

/// Script returning the input's displayed value after setting `value`, or null.
fn widget_setter_script(field: &Locator, value: &str) -> String {
    let literal = serde_json::Value::from(value);
    format!(
        r#"/* paydesk:set-date */ (function() {{
  const el = {find};
  if (!el) return null;
  const value = {literal};
  const parts = value.split('/');
  const date = new Date(Number(parts[2]), Number(parts[1]) - 1, Number(parts[0]));
  const $ = window.jQuery;
  if ($ && $(el).hasClass('hasDatepicker')) {{
    $(el).datepicker('setDate', date);
  }} else if ($ && $(el).data('kendoDatePicker')) {{
    const picker = $(el).data('kendoDatePicker');
    picker.value(date);
    picker.trigger('change');
  }} else if (window.Ext && el.id && Ext.getCmp(el.id.replace(/-inputEl$/, ''))) {{
    Ext.getCmp(el.id.replace(/-inputEl$/, '')).setValue(date);
  }} else {{
    const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
    setter.call(el, value);
  }}
  el.dispatchEvent(new Event('input', {{bubbles: true}}));
  el.dispatchEvent(new Event('change', {{bubbles: true}}));
  return String(el.value);
}})()"#,
        find = field.find_js("document"),
    )
}

/// Fill the range for `target` and press the apply control.
pub async fn set_date_range(
    session: &dyn PortalSession,
    layout: &DateRangeLayout,
    target: &RetrievalTarget,
    timeouts: &Timeouts,
    progress: &dyn ProgressSink,
) -> DateFilterOutcome {
    let from = target.from_date_string();
    let to = target.to_date_string();
    progress.report(RunEvent::step(format!("Setting date range {from} - {to}")));

    let strategies: Vec<Box<dyn Strategy<()> + '_>> = vec![
        Box::new(DirectFields {
            layout,
            from: &from,
            to: &to,
        }),
        Box::new(WidgetApi {
            layout,
            from: &from,
            to: &to,
        }),
    ];

    let outcome = match run_chain(STEP, session, &strategies, progress).await {
        Some(success) => DateFilterOutcome::Confirmed {
            strategy: success.strategy,
        },
        None => {
            progress.report(RunEvent::warning(
                Some(DocumentKind::Attendance),
                format!("DateFilterUnconfirmed: could not confirm {from} - {to}, continuing"),
            ));
            DateFilterOutcome::Unconfirmed
        }
    };

    if let Some(apply) = &layout.apply {
        match session.page().click(apply).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(control = %apply, "apply control not found"),
            Err(e) => tracing::warn!(control = %apply, error = %e, "apply control click failed"),
        }
    }
    tokio::time::sleep(timeouts.settle).await;
    outcome
}
