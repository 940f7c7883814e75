use chrono::Datelike;

use crate::period::MONTHS_IT;

/// Render the dashboard page with the current year and the two before it.
pub fn render_index(today: chrono::NaiveDate) -> String {
    let year = today.year();
    let years: String = (0..3)
        .map(|back| format!(r#"<option value="{0}">{0}</option>"#, year - back))
        .collect();
    let months: String = MONTHS_IT
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let number = i as u32 + 1;
            let selected = if number == today.month() { " selected" } else { "" };
            format!(r#"<option value="{number}"{selected}>{name}</option>"#)
        })
        .collect();

    INDEX_TEMPLATE
        .replace("{{YEARS}}", &years)
        .replace("{{MONTHS}}", &months)
        .replace("{{VERSION}}", crate::config::APP_VERSION)
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="it">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Paydesk</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917; padding: 32px;
      max-width: 960px; margin: 0 auto;
    }
    h1 { font-size: 24px; margin-bottom: 4px; }
    .sub { color: #78716c; font-size: 13px; margin-bottom: 24px; }
    form { display: flex; gap: 12px; align-items: center; margin-bottom: 24px; }
    select, button { font-size: 15px; padding: 8px 12px; border-radius: 10px; border: 1px solid #d6d3d1; }
    button { background: #4a7c59; color: white; border: none; cursor: pointer; font-weight: 600; }
    button:disabled { background: #a8a29e; cursor: wait; }
    .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; }
    .card { background: white; border: 1px solid #e7e5e4; border-radius: 14px; padding: 18px; }
    .card h2 { font-size: 16px; margin-bottom: 12px; }
    .metric { display: flex; justify-content: space-between; padding: 4px 0; font-size: 14px; }
    .metric b { font-variant-numeric: tabular-nums; }
    .empty { color: #a8a29e; font-style: italic; font-size: 14px; }
    details { margin-top: 12px; font-size: 12px; }
    pre { white-space: pre-wrap; background: #f5f5f4; padding: 8px; border-radius: 8px; }
    #log { margin-top: 16px; font-size: 13px; color: #44403c; }
    #log li { margin-left: 18px; }
    #log li.warn { color: #b45309; }
    #error { color: #b91c1c; margin-bottom: 16px; font-size: 14px; }
  </style>
</head>
<body>
  <h1>Paydesk</h1>
  <div class="sub">Cedolino e cartellino dal portale HR &middot; v{{VERSION}}</div>
  <form id="run-form">
    <select id="month" name="month">{{MONTHS}}</select>
    <select id="year" name="year">{{YEARS}}</select>
    <button id="run" type="submit">Recupera documenti</button>
  </form>
  <div id="error"></div>
  <div class="grid">
    <div class="card" id="payslip"><h2>Cedolino</h2><div class="empty">Nessun dato</div></div>
    <div class="card" id="attendance"><h2>Cartellino</h2><div class="empty">Nessun dato</div></div>
  </div>
  <ul id="log"></ul>
<script>
const euro = v => v == null ? '—' : Number(v).toLocaleString('it-IT', {style: 'currency', currency: 'EUR'});
const esc = s => String(s).replace(/[&<>"]/g, c => ({'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;'}[c]));
function metric(label, value) {
  return `<div class="metric"><span>${label}</span><b>${esc(value)}</b></div>`;
}
function raw(fields) {
  return `<details><summary>Tutti i campi</summary><pre>${esc(JSON.stringify(fields, null, 2))}</pre></details>`;
}
function render(report) {
  const p = report.payslip;
  document.getElementById('payslip').innerHTML = '<h2>Cedolino ' + esc(report.period) + '</h2>' + (p
    ? metric('Netto a pagare', euro(p.net_pay)) + metric('Totale competenze', euro(p.gross)) +
      metric('Totale trattenute', euro(p.deductions)) + raw(p.fields)
    : '<div class="empty">' + (report.payslip_file ? 'Nessun dato estratto' : 'Nessun documento') + '</div>');
  const a = report.attendance;
  document.getElementById('attendance').innerHTML = '<h2>Cartellino ' + esc(report.period) + '</h2>' + (a
    ? metric('Giorni lavorati', a.worked_days == null ? '—' : a.worked_days) + metric('Note', a.note || '—') + raw(a.fields)
    : '<div class="empty">' + (report.attendance_file ? 'Nessun dato estratto' : 'Nessun documento') + '</div>');
  const warnings = new Set(report.warnings);
  document.getElementById('log').innerHTML = report.messages
    .map(m => `<li class="${warnings.has(m) ? 'warn' : ''}">${esc(m)}</li>`).join('');
}
document.getElementById('run-form').addEventListener('submit', async ev => {
  ev.preventDefault();
  const button = document.getElementById('run');
  const error = document.getElementById('error');
  button.disabled = true; button.textContent = 'In corso...'; error.textContent = '';
  try {
    const res = await fetch('/api/run', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({
        month: Number(document.getElementById('month').value),
        year: Number(document.getElementById('year').value)
      })
    });
    const body = await res.json();
    if (!res.ok) { error.textContent = body.error ? body.error.message : res.statusText; return; }
    render(body);
  } catch (e) {
    error.textContent = String(e);
  } finally {
    button.disabled = false; button.textContent = 'Recupera documenti';
  }
});
</script>
</body>
</html>
"#;
