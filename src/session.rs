use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::colors::ColorRegistry;
use crate::models::{Demo, Event, PollPayload, ResultSummary};
use crate::views::{DetailedView, SummaryView};

pub type SharedSession = Arc<Mutex<Session>>;

/// What the record/search button does next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UiMode {
    Record,
    Search,
}

impl UiMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Record => "Record",
            Self::Search => "Search",
        }
    }
}

#[derive(Debug, Default)]
pub enum ResultsPanel {
    #[default]
    Empty,
    Summary {
        summaries: Vec<Option<ResultSummary>>,
        view: SummaryView,
    },
    Detailed(DetailedView),
}

/// Result of applying one poll response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    Stopped,
    /// The response belongs to a recording that is no longer active
    Stale,
}

/// Front-end session: the current demo, its coloring and what the panels show.
/// Every mutation bumps `revision` so the page knows when to redraw.
#[derive(Debug)]
pub struct Session {
    demo: Demo,
    recording: bool,
    recording_id: Option<Uuid>,
    mode: UiMode,
    colors: ColorRegistry,
    canned: Vec<(String, Demo)>,
    results: ResultsPanel,
    status: String,
    alerts: Vec<String>,
    revision: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            demo: Demo::default(),
            recording: false,
            recording_id: None,
            mode: UiMode::Record,
            colors: ColorRegistry::new(),
            canned: Vec::new(),
            results: ResultsPanel::Empty,
            status: String::new(),
            alerts: Vec::new(),
            revision: 0,
        }
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn demo(&self) -> &Demo {
        &self.demo
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }

    pub fn results(&self) -> &ResultsPanel {
        &self.results
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn demo_names(&self) -> Vec<String> {
        self.canned.iter().map(|(name, _)| name.clone()).collect()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.touch();
    }

    /// Queue a message the page shows as a blocking alert
    pub fn alert(&mut self, message: impl Into<String>) {
        self.alerts.push(message.into());
        self.touch();
    }

    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    /// Empty the demo and forget its colors
    pub fn clear(&mut self) {
        self.demo = Demo::default();
        self.colors.reset();
        self.touch();
    }

    pub fn clear_results(&mut self) {
        self.results = ResultsPanel::Empty;
        self.touch();
    }

    /// Store canned demos under `demo{i}({len})`; returns the names in order
    pub fn load_canned_demos(&mut self, demos: Vec<Demo>) -> Vec<String> {
        self.canned = demos
            .into_iter()
            .enumerate()
            .map(|(i, demo)| (format!("demo{i}({})", demo.len()), demo))
            .collect();
        self.touch();
        self.demo_names()
    }

    /// Load a stored canned demo; false if no demo has that name
    pub fn select_demo(&mut self, name: &str) -> bool {
        let Some(demo) = self
            .canned
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, demo)| demo.clone())
        else {
            return false;
        };
        self.load_canned_demo(demo);
        true
    }

    /// Replace the demo wholesale; the next button press searches
    pub fn load_canned_demo(&mut self, demo: Demo) {
        self.stop_recording();
        self.clear_results();
        self.replace_demo(demo);
        self.mode = UiMode::Search;
    }

    fn replace_demo(&mut self, demo: Demo) {
        self.clear();
        let Demo { events, extra } = demo;
        self.demo.extra = extra;
        self.append_events(events);
    }

    pub fn append_events(&mut self, events: Vec<Event>) {
        for event in events {
            self.colors.color_for(event.key());
            self.demo.events.push(event);
        }
        self.touch();
    }

    /// Start a fresh recording; returns the id poll results must carry
    pub fn begin_recording(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.recording = true;
        self.recording_id = Some(id);
        self.mode = UiMode::Search;
        self.clear();
        self.clear_results();
        id
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        self.recording_id = None;
        self.touch();
    }

    pub fn is_current(&self, recording_id: Uuid) -> bool {
        self.recording && self.recording_id == Some(recording_id)
    }

    pub fn apply_poll(&mut self, recording_id: Uuid, payload: PollPayload) -> PollOutcome {
        if !self.is_current(recording_id) {
            return PollOutcome::Stale;
        }
        match payload {
            PollPayload::Stopped => {
                self.stop_recording();
                PollOutcome::Stopped
            }
            PollPayload::Idle => PollOutcome::Continue,
            PollPayload::Events(events) => {
                self.append_events(events);
                PollOutcome::Continue
            }
            PollPayload::Snippet(demo) => {
                self.replace_demo(demo);
                PollOutcome::Continue
            }
        }
    }

    /// Show summary charts; the button goes back to recording
    pub fn show_summary(&mut self, summaries: Vec<Option<ResultSummary>>, view: SummaryView) {
        self.results = ResultsPanel::Summary { summaries, view };
        self.mode = UiMode::Record;
        self.touch();
    }

    pub fn show_detailed(&mut self, view: DetailedView) {
        self.results = ResultsPanel::Detailed(view);
        self.touch();
    }

    /// Bucket of the summary currently on screen
    pub fn summary_bucket(&self, index: usize) -> Option<&ResultSummary> {
        match &self.results {
            ResultsPanel::Summary { summaries, .. } => summaries.get(index)?.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::PALETTE;
    use serde_json::json;

    fn event(id: &str) -> Event {
        Event {
            identifier: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn demo(ids: &[&str]) -> Demo {
        Demo {
            events: ids.iter().map(|id| event(id)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_canned_demo_resets_colors() {
        let mut session = Session::new();
        session.append_events(vec![event("old-1"), event("old-2")]);

        session.load_canned_demo(demo(&["b", "a", "b"]));

        assert_eq!(session.mode(), UiMode::Search);
        assert_eq!(session.demo().len(), 3);
        assert_eq!(session.colors().len(), 2);
        assert_eq!(session.colors().lookup("b"), PALETTE[0]);
        assert_eq!(session.colors().lookup("a"), PALETTE[1]);
    }

    #[test]
    fn test_canned_demo_keeps_snippet_fields() {
        let mut session = Session::new();
        let mut canned = demo(&["a"]);
        canned.extra.insert("sourceFilename".into(), json!("log-7.txt"));

        session.load_canned_demo(canned);
        assert_eq!(session.demo().extra.get("sourceFilename"), Some(&json!("log-7.txt")));
    }

    #[test]
    fn test_demo_names_and_selection() {
        let mut session = Session::new();
        let names = session.load_canned_demos(vec![demo(&["a", "b"]), demo(&["c"])]);
        assert_eq!(names, vec!["demo0(2)", "demo1(1)"]);

        assert!(session.select_demo("demo1(1)"));
        assert_eq!(session.demo().events[0].key(), "c");
        assert!(!session.select_demo("demo9(0)"));
    }

    #[test]
    fn test_clear() {
        let mut session = Session::new();
        session.append_events(vec![event("a")]);
        let before = session.revision();

        session.clear();
        assert!(session.demo().is_empty());
        assert!(session.colors().is_empty());
        assert!(session.revision() > before);
    }

    #[test]
    fn test_recording_lifecycle() {
        let mut session = Session::new();
        session.load_canned_demo(demo(&["x"]));

        let id = session.begin_recording();
        assert!(session.recording());
        assert!(session.is_current(id));
        assert!(session.demo().is_empty());
        assert_eq!(session.mode(), UiMode::Search);

        assert_eq!(
            session.apply_poll(id, PollPayload::Events(vec![event("a"), event("b")])),
            PollOutcome::Continue
        );
        assert_eq!(session.apply_poll(id, PollPayload::Idle), PollOutcome::Continue);
        assert_eq!(session.demo().len(), 2);

        session.stop_recording();
        assert_eq!(
            session.apply_poll(id, PollPayload::Events(vec![event("late")])),
            PollOutcome::Stale
        );
        assert_eq!(session.demo().len(), 2);
    }

    #[test]
    fn test_new_recording_invalidates_old_id() {
        let mut session = Session::new();
        let first = session.begin_recording();
        let second = session.begin_recording();

        assert_eq!(session.apply_poll(first, PollPayload::Idle), PollOutcome::Stale);
        assert_eq!(session.apply_poll(second, PollPayload::Stopped), PollOutcome::Stopped);
        assert!(!session.recording());
        assert_eq!(session.mode(), UiMode::Search);
    }

    #[test]
    fn test_snippet_poll_replaces_demo() {
        let mut session = Session::new();
        let id = session.begin_recording();
        session.apply_poll(id, PollPayload::Events(vec![event("a")]));

        session.apply_poll(id, PollPayload::Snippet(demo(&["z", "y"])));
        let keys: Vec<_> = session.demo().events.iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec!["z", "y"]);
        assert_eq!(session.colors().lookup("z"), PALETTE[0]);
    }

    #[test]
    fn test_summary_switches_to_record_mode() {
        let mut session = Session::new();
        session.load_canned_demo(demo(&["a"]));
        let summaries = vec![Some(ResultSummary { size: 3, ..Default::default() }), None];

        session.show_summary(summaries, SummaryView::default());
        assert_eq!(session.mode(), UiMode::Record);
        assert_eq!(session.summary_bucket(0).map(|s| s.size), Some(3));
        assert!(session.summary_bucket(1).is_none());
        assert!(session.summary_bucket(5).is_none());

        session.show_detailed(DetailedView::default());
        assert!(session.summary_bucket(0).is_none());
    }

    #[test]
    fn test_alerts_drain() {
        let mut session = Session::new();
        session.alert("Error: boom");
        assert_eq!(session.take_alerts(), vec!["Error: boom"]);
        assert!(session.take_alerts().is_empty());
    }
}
