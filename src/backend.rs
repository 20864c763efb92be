//! Client for the search backend's `entry-point` REST API.
//!
//! Query payloads are double encoded: the demo (or filter) is serialized to
//! JSON text and sent as a form field, which is what the backend parses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{DetailedResult, Demo, FilterParams, PollPayload, ResultSummary};

pub const GET_DEMO_SNIPPETS: &str = "getDemoSnippets";
pub const POLL_FOR_EVENTS: &str = "pollForEvents";
pub const GET_SUMMARY_RESULTS: &str = "getSummaryResultsForQuery";
pub const GET_FILTERED_RESULTS: &str = "getFilteredResults";
pub const GET_DETAILED_RESULTS: &str = "getDetailedResults";
pub const GET_DETAILED_RESULTS_FOR_QUERY: &str = "getDetailedResultsForQuery";

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode {endpoint} request: {source}")]
    Encode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} returned no data")]
    Empty(&'static str),

    #[error("backend reported an error: {0}")]
    Signaled(String),
}

/// Operations the front-end needs from the search backend
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Canned demos for the selector
    async fn demo_snippets(&self) -> Result<Vec<Demo>, BackendError>;

    /// New events since the last poll; `reset` starts a new recording
    async fn poll_events(&self, reset: bool) -> Result<PollPayload, BackendError>;

    async fn summary_results(
        &self,
        demo: &Demo,
        limit: u32,
    ) -> Result<Vec<Option<ResultSummary>>, BackendError>;

    async fn filtered_results(
        &self,
        filter: &FilterParams,
        limit: u32,
    ) -> Result<DetailedResult, BackendError>;

    /// Detailed matches for the query the backend is currently recording
    async fn detailed_results_current(&self) -> Result<DetailedResult, BackendError>;

    async fn detailed_results_for_query(&self, demo: &Demo) -> Result<DetailedResult, BackendError>;
}

/// reqwest-backed client
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Send and return the body as JSON; an empty body reads as `null`
    async fn fetch(&self, endpoint: &'static str, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(BackendError::Status { endpoint, status, body });
        }

        debug!(endpoint, bytes = body.len(), "backend responded");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value =
            serde_json::from_str(&body).map_err(|source| BackendError::Decode { endpoint, source })?;

        if let Some(message) = value.get("error") {
            let message = message.as_str().map(str::to_string).unwrap_or_else(|| message.to_string());
            return Err(BackendError::Signaled(message));
        }
        Ok(value)
    }

    /// Decode a payload that must be present
    fn required<T: DeserializeOwned>(endpoint: &'static str, value: Value) -> Result<T, BackendError> {
        if value.is_null() {
            return Err(BackendError::Empty(endpoint));
        }
        serde_json::from_value(value).map_err(|source| BackendError::Decode { endpoint, source })
    }

    fn encode<T: serde::Serialize>(endpoint: &'static str, payload: &T) -> Result<String, BackendError> {
        serde_json::to_string(payload).map_err(|source| BackendError::Encode { endpoint, source })
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn demo_snippets(&self) -> Result<Vec<Demo>, BackendError> {
        let request = self.client.get(self.url(GET_DEMO_SNIPPETS));
        let value = self.fetch(GET_DEMO_SNIPPETS, request).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Self::required(GET_DEMO_SNIPPETS, value)
    }

    async fn poll_events(&self, reset: bool) -> Result<PollPayload, BackendError> {
        let mut request = self.client.get(self.url(POLL_FOR_EVENTS));
        if reset {
            request = request.query(&[("reset", "true")]);
        }
        let value = self.fetch(POLL_FOR_EVENTS, request).await?;
        PollPayload::from_value(value).map_err(|source| BackendError::Decode {
            endpoint: POLL_FOR_EVENTS,
            source,
        })
    }

    async fn summary_results(
        &self,
        demo: &Demo,
        limit: u32,
    ) -> Result<Vec<Option<ResultSummary>>, BackendError> {
        let q = Self::encode(GET_SUMMARY_RESULTS, demo)?;
        let limit = limit.to_string();
        let request = self
            .client
            .post(self.url(GET_SUMMARY_RESULTS))
            .form(&[("q", q.as_str()), ("limit", limit.as_str())]);
        let value = self.fetch(GET_SUMMARY_RESULTS, request).await?;
        Self::required(GET_SUMMARY_RESULTS, value)
    }

    async fn filtered_results(
        &self,
        filter: &FilterParams,
        limit: u32,
    ) -> Result<DetailedResult, BackendError> {
        let params = Self::encode(GET_FILTERED_RESULTS, filter)?;
        let limit = limit.to_string();
        let request = self
            .client
            .post(self.url(GET_FILTERED_RESULTS))
            .form(&[("filterParams", params.as_str()), ("limit", limit.as_str())]);
        let value = self.fetch(GET_FILTERED_RESULTS, request).await?;
        Self::required(GET_FILTERED_RESULTS, value)
    }

    async fn detailed_results_current(&self) -> Result<DetailedResult, BackendError> {
        let request = self
            .client
            .get(self.url(GET_DETAILED_RESULTS))
            .query(&[("q", "current")]);
        let value = self.fetch(GET_DETAILED_RESULTS, request).await?;
        Self::required(GET_DETAILED_RESULTS, value)
    }

    async fn detailed_results_for_query(&self, demo: &Demo) -> Result<DetailedResult, BackendError> {
        let q = Self::encode(GET_DETAILED_RESULTS_FOR_QUERY, demo)?;
        let request = self
            .client
            .post(self.url(GET_DETAILED_RESULTS_FOR_QUERY))
            .form(&[("q", q.as_str())]);
        let value = self.fetch(GET_DETAILED_RESULTS_FOR_QUERY, request).await?;
        Self::required(GET_DETAILED_RESULTS_FOR_QUERY, value)
    }
}
