//! HTML for the page and its panels. Plain string templates; views decide
//! the content, this module only lays it out.

use crate::session::{ResultsPanel, Session};
use crate::views::{
    self, DemoPanelView, DetailedView, EventTile, MatchView, SummaryView, TileStyle,
};

const WIDGET_FILL: &str = "#AA4488";

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn tile(out: &mut String, tile: &EventTile, style: TileStyle) {
    match style {
        TileStyle::Thumbnail => {
            let t = &tile.thumbnail;
            out.push_str(&format!(
                r#"<div id="event-panel-{id}" class="event-panel" title="{identifier}" style="border-color:{color}"><svg class="thumb-canvas" width="{w:.1}" height="{h:.1}" viewBox="0 0 {w:.1} {h:.1}"><rect x="{x:.1}" y="{y:.1}" width="{ww:.1}" height="{wh:.1}" fill="{fill}"/></svg><div class="event-mainlabel">{title}</div><div class="event-sublabel">{detail}</div></div><span class="arrow-icon-panel">&#10148;</span>"#,
                id = html_escape(&tile.dom_id),
                identifier = html_escape(&tile.identifier),
                color = tile.color,
                w = t.width,
                h = t.height,
                x = t.widget_x,
                y = t.widget_y,
                ww = t.widget_width,
                wh = t.widget_height,
                fill = WIDGET_FILL,
                title = html_escape(&tile.title),
                detail = html_escape(&tile.detail),
            ));
        }
        TileStyle::Mini => {
            out.push_str(&format!(
                r#"<div id="event-panel-{id}" class="mini-event-panel" title="{tooltip}" style="border-color:{color}"></div>"#,
                id = html_escape(&tile.dom_id),
                tooltip = html_escape(&tile.tooltip()),
                color = tile.color,
            ));
        }
    }
}

pub fn demo_panel(view: &DemoPanelView, style: TileStyle) -> String {
    let mut out = String::new();
    if view.tiles.is_empty() {
        return out;
    }
    let header = match &view.duration {
        Some(duration) => format!("{} events, {}", view.tiles.len(), duration),
        None => format!("{} events", view.tiles.len()),
    };
    out.push_str(&format!(
        r#"<div class="demo-snippet-header">{}</div><div class="demo-snippet-events">"#,
        html_escape(&header)
    ));
    for t in &view.tiles {
        tile(&mut out, t, style);
    }
    out.push_str("</div>");
    out
}

pub fn summary_panel(view: &SummaryView) -> String {
    let mut out = String::new();
    for bucket in &view.buckets {
        out.push_str(&format!(
            r#"<div id="result-summary-label-{i}" class="result-summary-label">{label}</div>"#,
            i = bucket.index,
            label = html_escape(&bucket.label),
        ));
        if !bucket.has_results {
            continue;
        }
        out.push_str(&format!(
            r#"<div id="result-summary-chart-container-{}" class="result-summary-chart-container">"#,
            bucket.index
        ));
        for chart in &bucket.charts {
            let max = chart.max_count();
            out.push_str(&format!(
                r#"<div class="attr-summary-chart"><div class="chart-title">{}</div>"#,
                html_escape(&chart.attribute)
            ));
            for (bin, bar) in chart.bars.iter().enumerate() {
                let width = if max == 0 { 0.0 } else { bar.count as f64 * 100.0 / max as f64 };
                out.push_str(&format!(
                    r#"<div class="chart-row"><span class="chart-label">{label}</span><button class="chart-bar" data-bucket="{bucket}" data-attribute="{attribute}" data-bin="{bin}" title="{label}: {count}" style="width:{width:.1}%;background-color:{color}"></button><span class="chart-count">{count}</span></div>"#,
                    label = html_escape(&bar.label),
                    bucket = bucket.index,
                    attribute = html_escape(&chart.attribute),
                    bin = bin,
                    count = bar.count,
                    width = width,
                    color = chart.color,
                ));
            }
            out.push_str("</div>");
        }
        out.push_str("</div>");
    }
    out
}

fn timeline(out: &mut String, kind: &str, caption: &str, i: usize, tiles: &[EventTile], style: TileStyle) {
    out.push_str(&format!(
        r#"<div id="dr-{kind}-result-container-{i}" class="dr-snippet-container"><div class="dr-snippet-label dr-{kind}-label">{caption}</div><div id="dr-{kind}-snip-panel-{i}" class="dr-snippet-panel">"#
    ));
    for t in tiles {
        tile(out, t, style);
    }
    out.push_str("</div></div>");
}

fn match_row(out: &mut String, row: &MatchView, show_before: bool, style: TileStyle) {
    let i = row.index;
    let summary: Vec<String> = row.summary.iter().map(|line| html_escape(line)).collect();
    out.push_str(&format!(
        r#"<div id="dr-row-{i}" class="dr-row"><div id="dr-summary-panel-{i}" class="dr-summary-panel">{}</div><div id="dr-result-container-{i}" class="dr-result-container">"#,
        summary.join("<br/>")
    ));
    if show_before {
        timeline(out, "before", "Before", i, &row.before, style);
    }
    timeline(out, "matched", "Matching", i, &row.matching, style);
    out.push_str("</div></div>");
}

pub fn detailed_panel(view: &DetailedView, style: TileStyle) -> String {
    let mut out = String::new();
    for row in &view.rows {
        match_row(&mut out, row, view.show_before, style);
    }
    out
}

pub fn results_panel(results: &ResultsPanel, style: TileStyle) -> String {
    match results {
        ResultsPanel::Empty => String::new(),
        ResultsPanel::Summary { view, .. } => summary_panel(view),
        ResultsPanel::Detailed(view) => detailed_panel(view, style),
    }
}

/// Demo panel for the session's current demo
pub fn session_demo_panel(session: &Session, style: TileStyle) -> String {
    demo_panel(&views::render_demo(session.demo(), session.colors()), style)
}

fn demo_options(names: &[String]) -> String {
    names
        .iter()
        .map(|name| {
            let name = html_escape(name);
            format!(r#"<option value="{name}">{name}</option>"#)
        })
        .collect()
}

/// The whole page, drawn from the current session
pub fn page(session: &Session, style: TileStyle) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Ferret</title>
    <style>{css}</style>
</head>
<body>
    <div class="toolbar">
        <select id="demo-list"><option value="">Choose a demo</option>{options}</select>
        <button id="recordAndSearchButton" data-mode="{mode}">{mode}</button>
        <span id="status">{status}</span>
    </div>
    <div id="demo-snippet-panel" data-revision="{revision}">{demo}</div>
    <div id="results-container-panel">{results}</div>
    <script>{script}</script>
</body>
</html>"#,
        css = CSS,
        options = demo_options(&session.demo_names()),
        mode = session.mode().label(),
        status = html_escape(session.status()),
        revision = session.revision(),
        demo = session_demo_panel(session, style),
        results = results_panel(session.results(), style),
        script = SCRIPT,
    )
}

const CSS: &str = r#"
body { font-family: Verdana, sans-serif; font-size: 12px; margin: 12px; }
.toolbar { display: flex; gap: 8px; align-items: center; margin-bottom: 8px; }
#demo-snippet-panel { display: flex; overflow-x: auto; min-height: 110px; border: 1px solid #ddd; padding: 4px; }
.demo-snippet-header { writing-mode: vertical-rl; color: #666; margin-right: 6px; }
.demo-snippet-events, .dr-snippet-panel { display: flex; align-items: center; }
.event-panel { border: 3px solid #9e9e9e; border-radius: 4px; padding: 2px; margin: 2px; width: 90px; text-align: center; flex: none; }
.mini-event-panel { border: 6px solid #9e9e9e; width: 6px; height: 24px; margin: 1px; flex: none; }
.thumb-canvas { background: #eee; }
.event-mainlabel { font-weight: bold; font-size: 10px; }
.event-sublabel { font-size: 9px; color: #555; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
.arrow-icon-panel { color: #bbb; margin: 0 2px; }
.result-summary-label { font-weight: bold; margin: 10px 0 4px; }
.result-summary-chart-container { display: flex; flex-wrap: wrap; gap: 12px; }
.attr-summary-chart { width: 300px; }
.chart-title { font-size: 10px; margin-bottom: 2px; }
.chart-row { display: flex; align-items: center; gap: 4px; height: 14px; }
.chart-label { width: 100px; text-align: right; font-size: 10px; overflow: hidden; white-space: nowrap; }
.chart-bar { height: 10px; border: none; padding: 0; cursor: pointer; min-width: 2px; }
.chart-count { font-size: 9px; color: #666; }
.dr-row { display: flex; border-top: 1px solid #ddd; padding: 6px 0; }
.dr-summary-panel { width: 220px; flex: none; }
.dr-result-container { display: flex; overflow-x: auto; }
.dr-snippet-label { font-weight: bold; }
"#;

const SCRIPT: &str = r#"
let mode = document.getElementById('recordAndSearchButton').dataset.mode;
let recording = false;
let revision = -1;

function apply(panels) {
  document.getElementById('status').textContent = panels.status;
  const button = document.getElementById('recordAndSearchButton');
  mode = panels.mode;
  button.textContent = mode;
  recording = panels.recording;
  const list = document.getElementById('demo-list');
  const known = Array.from(list.options).slice(1).map(o => o.value);
  if (known.join('\n') !== panels.demos.join('\n')) {
    list.length = 1;
    panels.demos.forEach(name => list.add(new Option(name, name)));
  }
  if (panels.revision !== revision) {
    const demoPanel = document.getElementById('demo-snippet-panel');
    demoPanel.innerHTML = panels.demoPanel;
    demoPanel.scrollLeft = demoPanel.scrollWidth;
    document.getElementById('results-container-panel').innerHTML = panels.resultsPanel;
    revision = panels.revision;
  }
  panels.alerts.forEach(message => alert(message));
}

async function call(method, url, body) {
  const init = { method, headers: { 'Content-Type': 'application/json' } };
  if (body !== undefined) init.body = JSON.stringify(body);
  const response = await fetch(url, init);
  const payload = await response.json();
  if (!response.ok) {
    alert(payload.message);
    if (url !== '/api/panels') call('GET', '/api/panels');
    return;
  }
  apply(payload);
}

document.getElementById('recordAndSearchButton').addEventListener('click', () => {
  call('POST', mode === 'Record' ? '/api/record' : '/api/search');
});
document.getElementById('demo-list').addEventListener('change', event => {
  if (event.target.value) call('POST', '/api/demos/select', { name: event.target.value });
});
document.getElementById('results-container-panel').addEventListener('click', event => {
  const bar = event.target.closest('.chart-bar');
  if (!bar) return;
  call('POST', '/api/filter', {
    bucket: Number(bar.dataset.bucket),
    attribute: bar.dataset.attribute,
    bin: Number(bar.dataset.bin),
  });
});
setInterval(() => { if (recording) call('GET', '/api/panels'); }, 1000);
call('GET', '/api/demos');
"#;
