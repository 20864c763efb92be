use anyhow::Context;
use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod colors;
mod config;
mod error;
mod html;
mod models;
mod polling;
mod session;
mod views;

#[cfg(test)]
mod fake_backend;

use backend::{HttpBackend, SearchBackend};
use config::{ConfigFile, Overrides, UiConfig};
use error::AppError;
use models::{FilterRequest, Panels, SelectDemoRequest};
use polling::{PollHandle, POLL_FAILED_STATUS};
use session::{Session, SharedSession};

const QUERY_FAILED_STATUS: &str = "Failed Ajax query...";
const POLLING_STATUS: &str = "Polling ...";
const DEMOS_STATUS: &str = "Retrieved demo ...";
const RETRIEVED_STATUS: &str = "Retrieved result set ...";

/// Front-end for the ferret event-sequence search backend
#[derive(Parser, Debug)]
#[command(name = "ferret-ui", version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "FERRET_UI_CONFIG")]
    config: Option<PathBuf>,

    /// Log at info level instead of warn
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Shared between handlers. The session is the single source of truth for
/// what the page shows; at most one polling loop runs at a time.
#[derive(Clone)]
struct AppState {
    backend: Arc<dyn SearchBackend>,
    session: SharedSession,
    poller: Arc<Mutex<Option<PollHandle>>>,
    config: Arc<UiConfig>,
}

impl AppState {
    fn new(backend: Arc<dyn SearchBackend>, config: UiConfig) -> Self {
        Self {
            backend,
            session: Session::shared(),
            poller: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
        }
    }

    /// Cancel the running polling loop, if any
    async fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            if !handle.is_finished() {
                info!(recording_id = %handle.recording_id(), "polling cancelled");
            }
            handle.cancel();
        }
    }

    /// Snapshot of every panel; hands pending alerts to the page
    async fn panels(&self) -> Panels {
        let mut session = self.session.lock().await;
        Panels {
            status: session.status().to_string(),
            mode: session.mode().label().to_string(),
            recording: session.recording(),
            revision: session.revision(),
            demos: session.demo_names(),
            demo_panel: html::session_demo_panel(&session, self.config.tiles),
            results_panel: html::results_panel(session.results(), self.config.tiles),
            alerts: session.take_alerts(),
        }
    }

    /// Record a failed backend query on the status line and pass it on
    async fn query_failed(&self, err: AppError) -> AppError {
        warn!(error = %err, "backend query failed");
        self.session.lock().await.set_status(QUERY_FAILED_STATUS);
        err
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/health", get(health_check))
        .route("/api/panels", get(panels))
        .route("/api/demos", get(list_demos))
        .route("/api/demos/select", post(select_demo))
        .route("/api/record", post(start_recording))
        .route("/api/search", post(search))
        .route("/api/search/detailed", post(detailed_search))
        .route("/api/filter", post(filter))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = UiConfig::resolve(file, &cli.overrides)?;

    let backend = HttpBackend::new(config.backend_url.clone(), config.request_timeout)
        .context("failed to build backend client")?;
    let addr = config.bind;
    info!(backend = %backend.base_url(), "using search backend");

    let app = router(AppState::new(Arc::new(backend), config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("ferret-ui listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn page(state: State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(html::page(&session, state.config.tiles))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn panels(state: State<AppState>) -> Json<Panels> {
    Json(state.panels().await)
}

/// Fetch the canned demos and fill the selector
async fn list_demos(state: State<AppState>) -> Result<Json<Panels>, AppError> {
    let demos = match state.backend.demo_snippets().await {
        Ok(demos) => demos,
        Err(err) => return Err(state.query_failed(err.into()).await),
    };
    {
        let mut session = state.session.lock().await;
        let names = session.load_canned_demos(demos);
        info!(demos = names.len(), "canned demos loaded");
        session.set_status(DEMOS_STATUS);
    }
    Ok(Json(state.panels().await))
}

async fn select_demo(
    state: State<AppState>,
    Json(request): Json<SelectDemoRequest>,
) -> Result<Json<Panels>, AppError> {
    state.stop_polling().await;
    {
        let mut session = state.session.lock().await;
        if !session.select_demo(&request.name) {
            return Err(AppError::UnknownDemo(request.name));
        }
        session.set_status(format!("Loaded {}", request.name));
    }
    Ok(Json(state.panels().await))
}

/// Reset the backend's recording and start polling it
async fn start_recording(state: State<AppState>) -> Result<Json<Panels>, AppError> {
    let mut poller = state.poller.lock().await;
    if let Some(old) = poller.take() {
        old.cancel();
    }

    let recording_id = state.session.lock().await.begin_recording();
    if let Err(err) = state.backend.poll_events(true).await {
        warn!(%recording_id, error = %err, "recording reset failed");
        let mut session = state.session.lock().await;
        session.stop_recording();
        session.set_status(POLL_FAILED_STATUS);
        return Err(err.into());
    }

    state.session.lock().await.set_status(POLLING_STATUS);
    info!(%recording_id, "recording started");
    *poller = Some(polling::spawn(
        state.backend.clone(),
        state.session.clone(),
        recording_id,
        state.config.poll_settings(),
    ));
    drop(poller);

    Ok(Json(state.panels().await))
}

/// Stop recording and ask for summary results on the current demo
async fn search(state: State<AppState>) -> Result<Json<Panels>, AppError> {
    state.stop_polling().await;
    let demo = {
        let mut session = state.session.lock().await;
        session.stop_recording();
        session.demo().clone()
    };

    let summaries = match state.backend.summary_results(&demo, state.config.result_limit).await {
        Ok(summaries) => summaries,
        Err(err) => return Err(state.query_failed(err.into()).await),
    };
    info!(buckets = summaries.len(), events = demo.len(), "summary results");

    let view = views::render_summaries(&summaries, state.config.labels);
    {
        let mut session = state.session.lock().await;
        session.show_summary(summaries, view);
        session.set_status(RETRIEVED_STATUS);
    }
    Ok(Json(state.panels().await))
}

/// Detailed matches for the current demo; with no demo loaded, for whatever
/// the backend recorded last
async fn detailed_search(state: State<AppState>) -> Result<Json<Panels>, AppError> {
    state.stop_polling().await;
    let demo = {
        let mut session = state.session.lock().await;
        session.stop_recording();
        session.demo().clone()
    };

    let result = if demo.is_empty() {
        state.backend.detailed_results_current().await
    } else {
        state.backend.detailed_results_for_query(&demo).await
    };
    let result = match result {
        Ok(result) => result,
        Err(err) => return Err(state.query_failed(err.into()).await),
    };

    {
        let mut session = state.session.lock().await;
        let view = views::render_detailed(&result, session.colors(), state.config.before_window);
        session.show_detailed(view);
        session.set_status(RETRIEVED_STATUS);
    }
    Ok(Json(state.panels().await))
}

/// Chart bar click: detailed results for one bin of one bucket
async fn filter(
    state: State<AppState>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<Panels>, AppError> {
    let params = {
        let session = state.session.lock().await;
        let summary = session
            .summary_bucket(request.bucket)
            .ok_or(AppError::NoSummary(request.bucket))?;
        views::filter_for_bin(summary, &request.attribute, request.bin)?
    };

    let result = match state.backend.filtered_results(&params, state.config.result_limit).await {
        Ok(result) => result,
        Err(err) => return Err(state.query_failed(err.into()).await),
    };
    info!(attribute = %params.attribute, values = %params.values, matches = result.results.len(), "filtered results");

    {
        let mut session = state.session.lock().await;
        let view = views::render_detailed(&result, session.colors(), state.config.before_window);
        session.show_detailed(view);
        session.set_status(RETRIEVED_STATUS);
    }
    Ok(Json(state.panels().await))
}
