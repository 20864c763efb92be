//! Scripted in-memory backend for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{BackendError, SearchBackend};
use crate::models::{DetailedResult, Demo, Event, FilterParams, PollPayload, ResultSummary};

#[derive(Default)]
pub struct ScriptedBackend {
    pub polls: Mutex<VecDeque<Result<PollPayload, BackendError>>>,
    pub poll_calls: AtomicUsize,
    pub resets: AtomicUsize,
    pub fail_reset: bool,
    pub demos: Vec<Demo>,
    pub summaries: Option<Vec<Option<ResultSummary>>>,
    pub detailed: DetailedResult,
    pub queries: Mutex<Vec<Demo>>,
    pub filters: Mutex<Vec<FilterParams>>,
}

impl ScriptedBackend {
    pub fn with_polls(polls: Vec<Result<PollPayload, BackendError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Default::default()
        }
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

pub fn event(id: &str, ts: i64) -> Event {
    Event {
        identifier: Some(id.to_string()),
        time_stamp: Some(ts),
        display_event: Some("CLICK".to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn demo_snippets(&self) -> Result<Vec<Demo>, BackendError> {
        Ok(self.demos.clone())
    }

    async fn poll_events(&self, reset: bool) -> Result<PollPayload, BackendError> {
        if reset {
            self.resets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reset {
                return Err(BackendError::Empty("pollForEvents"));
            }
            return Ok(PollPayload::Idle);
        }
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PollPayload::Idle))
    }

    async fn summary_results(
        &self,
        demo: &Demo,
        _limit: u32,
    ) -> Result<Vec<Option<ResultSummary>>, BackendError> {
        self.queries.lock().unwrap().push(demo.clone());
        self.summaries
            .clone()
            .ok_or(BackendError::Empty("getSummaryResultsForQuery"))
    }

    async fn filtered_results(
        &self,
        filter: &FilterParams,
        _limit: u32,
    ) -> Result<DetailedResult, BackendError> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(self.detailed.clone())
    }

    async fn detailed_results_current(&self) -> Result<DetailedResult, BackendError> {
        Ok(self.detailed.clone())
    }

    async fn detailed_results_for_query(&self, demo: &Demo) -> Result<DetailedResult, BackendError> {
        self.queries.lock().unwrap().push(demo.clone());
        Ok(self.detailed.clone())
    }
}
