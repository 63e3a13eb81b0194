//! Migration status, start, and cancel routes.
//!
//! `start` runs one pipeline invocation inline and returns its outcome; the
//! dashboard polls the status routes for counters and the capped error list,
//! and re-triggers `start` while the migration reports `paused`.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeforge_core::{MigrationConfig, MigrationCounters, MigrationErrorEntry, MigrationStatus};
use storeforge_db::StoreMigrationRow;
use storeforge_migrate::{run_for_migration, Outcome, PipelineOptions, RunnerError};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct MigrationView {
    pub id: i64,
    pub platform: String,
    pub source_shop_id: String,
    pub source_shop_name: Option<String>,
    pub status: String,
    pub counters: MigrationCounters,
    pub errors: Vec<MigrationErrorEntry>,
    pub last_phase: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MigrationView {
    fn from_row(row: StoreMigrationRow) -> Self {
        Self {
            id: row.id,
            counters: row.counters(),
            errors: row.error_entries(),
            platform: row.platform,
            source_shop_id: row.source_shop_id,
            source_shop_name: row.source_shop_name,
            status: row.status,
            last_phase: row.last_phase,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn get_migration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MigrationView>>, ApiError> {
    let row = storeforge_db::get_migration(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: MigrationView::from_row(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct LatestQuery {
    pub store_id: i64,
}

pub(super) async fn latest_migration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<ApiResponse<Option<MigrationView>>>, ApiError> {
    let row = storeforge_db::latest_migration_for_store(&state.pool, query.store_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: row.map(MigrationView::from_row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn cancel_migration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MigrationView>>, ApiError> {
    storeforge_db::set_status(&state.pool, id, MigrationStatus::Cancelled)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let row = storeforge_db::get_migration(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(migration_id = id, "migration cancelled by user");
    Ok(Json(ApiResponse {
        data: MigrationView::from_row(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct StartResult {
    /// `completed`, `paused`, `cancelled`, or `failed`. A `paused` result
    /// means the caller should invoke start again to continue.
    pub outcome: String,
    pub migration: MigrationView,
}

pub(super) async fn start_migration(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    config: Option<Json<MigrationConfig>>,
) -> Result<Json<ApiResponse<StartResult>>, ApiError> {
    // A fresh config only applies when (re)starting, never mid-run.
    if let Some(Json(new_config)) = config {
        storeforge_db::set_config(&state.pool, id, &new_config)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    }

    let options = PipelineOptions {
        time_budget: std::time::Duration::from_secs(state.config.pipeline_budget_secs),
        ..PipelineOptions::default()
    };

    let outcome = run_for_migration(&state.pool, &state.config, id, &options)
        .await
        .map_err(|e| map_runner_error(req_id.0.clone(), &e))?;

    let outcome_label = match outcome {
        Outcome::Completed => "completed",
        Outcome::Paused { .. } => "paused",
        Outcome::Cancelled => "cancelled",
        Outcome::Failed { .. } => "failed",
    };

    let row = storeforge_db::get_migration(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StartResult {
            outcome: outcome_label.to_string(),
            migration: MigrationView::from_row(row),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn map_runner_error(request_id: String, error: &RunnerError) -> ApiError {
    match error {
        RunnerError::Db(db) => map_db_error(request_id, db),
        RunnerError::Etsy(storeforge_etsy::EtsyError::OAuthExchange { .. })
        | RunnerError::MissingRefreshToken => {
            ApiError::new(request_id, "unauthorized", error.to_string())
        }
        other => {
            tracing::error!(error = %other, "pipeline invocation could not start");
            ApiError::new(request_id, "internal_error", other.to_string())
        }
    }
}
