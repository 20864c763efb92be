//! Typed views of the demo panel and of both result panels.
//!
//! Renderers here decide *what* is shown (labels, colors, windows, filter
//! values); `html` only turns the views into markup.

use std::ops::Range;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::colors::{ChartPalette, Color, ColorRegistry};
use crate::models::{DetailedResult, Demo, Event, FilterParams, ResultSummary};

/// Thumbnail canvas height in pixels; width follows the screen aspect ratio
pub const THUMBNAIL_HEIGHT: f64 = 60.0;
/// Portrait phone, used when the logger sent no usable geometry
const FALLBACK_ASPECT: f64 = 9.0 / 16.0;

/// How a non-empty result bucket is labeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// `Strong matches (12)`
    #[default]
    DisplayName,
    /// `Results with distance 0-1.5`
    DistanceRange,
}

/// How a single event is drawn in a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStyle {
    #[default]
    Thumbnail,
    Mini,
}

/// Caption for an empty bucket at `position`
pub fn empty_caption(position: usize) -> &'static str {
    match position {
        0 => "No strong matches",
        1 => "No elongations",
        2 => "No alternate endings",
        3 => "No weak matches",
        _ => "No results",
    }
}

/// Numbers the way the browser printed them: no trailing `.0`
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => format_number(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => other.to_string(),
    }
}

/// `M/D/YY H:mm:ss`, UTC
pub fn format_timestamp(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%-m/%-d/%y %-H:%M:%S").to_string())
}

pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    if millis < 60_000 {
        format!("{:.1}s", millis as f64 / 1000.0)
    } else {
        let secs = millis / 1000;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Logger event names are terse; a couple read better rephrased
pub fn display_event_name(raw: &str) -> &str {
    match raw {
        "POPUP" => "NEW SCREEN",
        "TEXT CHANGE" => "TEXT CHANGED",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Event tiles

/// Widget position on a scaled-down screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thumbnail {
    pub width: f64,
    pub height: f64,
    pub widget_x: f64,
    pub widget_y: f64,
    pub widget_width: f64,
    pub widget_height: f64,
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite() && *v > 0.0)
}

impl Thumbnail {
    pub fn for_event(event: &Event) -> Self {
        let rel_w = positive(event.w_relative_width);
        let rel_h = positive(event.w_relative_height);

        let screen = match (positive(event.w_width), rel_w, positive(event.w_height), rel_h) {
            (Some(w), Some(rw), Some(h), Some(rh)) => Some((w / rw, h / rh)),
            _ => None,
        };
        let aspect = screen
            .map(|(w, h)| w / h)
            .filter(|a| a.is_finite() && *a > 0.0)
            .unwrap_or(FALLBACK_ASPECT);

        let height = THUMBNAIL_HEIGHT;
        let width = height * aspect;
        let unit = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0);

        Self {
            width,
            height,
            widget_x: width * unit(event.w_relative_x_pos),
            widget_y: height * unit(event.w_relative_y_pos),
            widget_width: width * unit(rel_w),
            widget_height: height * unit(rel_h),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventTile {
    pub dom_id: String,
    pub identifier: String,
    pub title: String,
    pub detail: String,
    pub module: String,
    pub color: Color,
    pub thumbnail: Thumbnail,
}

impl EventTile {
    pub fn new(event: &Event, colors: &ColorRegistry) -> Self {
        let dom_id = format!(
            "{}-{}-{}",
            event.user_id.as_deref().unwrap_or("anon"),
            event.time_stamp.unwrap_or_default(),
            Uuid::new_v4().simple()
        );
        Self {
            dom_id,
            identifier: event.key().to_string(),
            title: display_event_name(event.display_event.as_deref().unwrap_or("")).to_string(),
            detail: event.display_extra.clone().unwrap_or_default(),
            module: event.display_title.clone().unwrap_or_default(),
            color: colors.lookup(event.key()),
            thumbnail: Thumbnail::for_event(event),
        }
    }

    /// `title::event::extra(identifier)`, shown on mini tiles
    pub fn tooltip(&self) -> String {
        format!(
            "{}::{}::{}({})",
            self.module, self.title, self.detail, self.identifier
        )
    }
}

fn tiles(events: &[Event], colors: &ColorRegistry) -> Vec<EventTile> {
    events.iter().map(|e| EventTile::new(e, colors)).collect()
}

// ---------------------------------------------------------------------------
// Demo panel

#[derive(Debug, Clone, PartialEq)]
pub struct DemoPanelView {
    pub tiles: Vec<EventTile>,
    pub duration: Option<String>,
}

pub fn render_demo(demo: &Demo, colors: &ColorRegistry) -> DemoPanelView {
    DemoPanelView {
        tiles: tiles(&demo.events, colors),
        duration: demo.duration_ms().map(format_duration),
    }
}

// ---------------------------------------------------------------------------
// Summary results

#[derive(Debug, Clone, PartialEq)]
pub struct BarView {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub attribute: String,
    pub color: Color,
    pub bars: Vec<BarView>,
}

impl ChartView {
    pub fn max_count(&self) -> u64 {
        self.bars.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketView {
    pub index: usize,
    pub label: String,
    pub has_results: bool,
    pub charts: Vec<ChartView>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryView {
    pub buckets: Vec<BucketView>,
}

fn bucket_label(summary: &ResultSummary, style: LabelStyle) -> String {
    match style {
        LabelStyle::DisplayName => format!(
            "{} ({})",
            summary.display_name.as_deref().unwrap_or("Results"),
            summary.size
        ),
        LabelStyle::DistanceRange => format!(
            "Results with distance {}-{}",
            format_number(summary.min_dist.unwrap_or_default()),
            format_number(summary.max_dist.unwrap_or_default())
        ),
    }
}

/// One label per bucket, in backend order; non-empty buckets get a bar chart
/// per attribute summary, each in the next chart color.
pub fn render_summaries(summaries: &[Option<ResultSummary>], style: LabelStyle) -> SummaryView {
    let mut palette = ChartPalette::default();
    let buckets = summaries
        .iter()
        .enumerate()
        .map(|(index, summary)| match summary {
            Some(summary) if summary.size > 0 => BucketView {
                index,
                label: bucket_label(summary, style),
                has_results: true,
                charts: summary
                    .attr_summaries
                    .iter()
                    .map(|(attribute, bins)| ChartView {
                        attribute: attribute.clone(),
                        color: palette.next_color(),
                        bars: bins
                            .iter()
                            .map(|bin| BarView {
                                label: bin.bin_name.clone(),
                                count: bin.count,
                            })
                            .collect(),
                    })
                    .collect(),
            },
            _ => BucketView {
                index,
                label: empty_caption(index).to_string(),
                has_results: false,
                charts: Vec::new(),
            },
        })
        .collect();
    SummaryView { buckets }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no chart for attribute {0}")]
    UnknownAttribute(String),
    #[error("chart {attribute} has no bar {bin}")]
    UnknownBin { attribute: String, bin: usize },
}

/// Filter for the clicked bar: ranged kinds send `min-max`, everything else
/// the bin label.
pub fn filter_for_bin(
    summary: &ResultSummary,
    attribute: &str,
    bin: usize,
) -> Result<FilterParams, SelectionError> {
    let bins = summary
        .attr_summaries
        .get(attribute)
        .ok_or_else(|| SelectionError::UnknownAttribute(attribute.to_string()))?;
    let chosen = bins.get(bin).ok_or_else(|| SelectionError::UnknownBin {
        attribute: attribute.to_string(),
        bin,
    })?;

    let values = match (&chosen.bin_min, &chosen.bin_max) {
        (Some(min), Some(max)) if summary.attribute_kind(attribute).is_ranged() => {
            format!("{}-{}", value_text(min), value_text(max))
        }
        _ => chosen.bin_name.clone(),
    };

    Ok(FilterParams {
        summary: summary.clone(),
        attribute: attribute.to_string(),
        values,
    })
}

// ---------------------------------------------------------------------------
// Detailed results

#[derive(Debug, Clone, PartialEq)]
pub struct MatchView {
    pub index: usize,
    pub summary: Vec<String>,
    pub before: Vec<EventTile>,
    pub matching: Vec<EventTile>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedView {
    pub rows: Vec<MatchView>,
    /// False when the before window is zero; rows then have no Before timeline
    pub show_before: bool,
}

/// `(before, matching)` index ranges, clamped into a snippet of `len` events
pub fn match_windows(
    len: usize,
    start: usize,
    end: usize,
    before_window: usize,
) -> (Range<usize>, Range<usize>) {
    let start = start.min(len);
    let end = end.clamp(start, len);
    (start.saturating_sub(before_window)..start, start..end)
}

pub fn render_detailed(
    result: &DetailedResult,
    colors: &ColorRegistry,
    before_window: usize,
) -> DetailedView {
    let rows = result
        .results
        .iter()
        .enumerate()
        .map(|(index, sub)| {
            let events = &sub.snippet.events;
            let (before, matching) =
                match_windows(events.len(), sub.start_index, sub.end_index, before_window);

            let mut summary: Vec<String> = sub
                .snippet
                .attribute_pairs()
                .iter()
                .map(|(key, value)| format!("{key}: {}", value_text(value)))
                .collect();
            summary.push(format!("distance: {}", format_number(sub.distance)));
            if let Some(start_time) = events
                .get(matching.start)
                .filter(|_| !matching.is_empty())
                .and_then(|e| e.time_stamp)
                .and_then(format_timestamp)
            {
                summary.push(format!("start time: {start_time}"));
            }

            MatchView {
                index,
                summary,
                before: tiles(&events[before], colors),
                matching: tiles(&events[matching], colors),
            }
        })
        .collect();
    DetailedView {
        rows,
        show_before: before_window > 0,
    }
}
