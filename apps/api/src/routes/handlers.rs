use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity_log::LogEntry;
use crate::classifier::prompts::{DEFAULT_PERSONAS, UNKNOWN_PERSONA};
use crate::errors::AppError;
use crate::orchestrator::{RunRecord, RunTrigger};
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../public/index.html");
const APP_JS: &str = include_str!("../../public/app.js");

/// GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /app.js
pub async fn handle_app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        APP_JS,
    )
}

#[derive(Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<String>,
    /// "crm" when read from the CRM enumeration, "default" otherwise.
    pub source: &'static str,
}

/// GET /api/personas
pub async fn handle_personas(State(state): State<AppState>) -> Json<PersonaListResponse> {
    let response = match state.personas.get_or_fetch(state.crm.as_ref(), &state.log).await {
        Some(options) => PersonaListResponse {
            personas: options.into_iter().map(|o| o.label).collect(),
            source: "crm",
        },
        None => PersonaListResponse {
            personas: DEFAULT_PERSONAS
                .iter()
                .chain(std::iter::once(&UNKNOWN_PERSONA))
                .map(|p| p.to_string())
                .collect(),
            source: "default",
        },
    };
    Json(response)
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub entries: Vec<LogEntry>,
    pub capacity: usize,
}

/// GET /logs
pub async fn handle_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, AppError> {
    let Query(params) = query?;
    Ok(Json(LogsResponse {
        entries: state.log.tail(params.limit),
        capacity: state.log.capacity(),
    }))
}

#[derive(Serialize)]
pub struct RunAccepted {
    pub run_id: Uuid,
    pub status: &'static str,
}

/// POST /run
/// Starts a run in the background; poll `/api/runs/:id` for the outcome.
pub async fn handle_trigger_run(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunAccepted>), AppError> {
    match state.orchestrator.spawn_run(RunTrigger::Manual) {
        Ok(run_id) => {
            state.log.info(format!("Manual run {run_id} started"));
            Ok((
                StatusCode::ACCEPTED,
                Json(RunAccepted {
                    run_id,
                    status: "running",
                }),
            ))
        }
        Err(active) => Err(AppError::Conflict(format!(
            "A classification run is already in progress (run {active})"
        ))),
    }
}

#[derive(Serialize)]
pub struct RunListResponse {
    pub active: Option<Uuid>,
    pub runs: Vec<RunRecord>,
}

/// GET /api/runs
pub async fn handle_list_runs(State(state): State<AppState>) -> Json<RunListResponse> {
    let runs = state.orchestrator.runs();
    Json(RunListResponse {
        active: runs.active(),
        runs: runs.recent(),
    })
}

/// GET /api/runs/:id
pub async fn handle_get_run(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RunRecord>, AppError> {
    let Path(id) = path?;
    state
        .orchestrator
        .runs()
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Run {id} not found")))
}
