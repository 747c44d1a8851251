use axum::Json;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::*;
use crate::services::Outcome;
use crate::state::AppState;
use crate::store::ConflictScope;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The calling user, identified by the `x-actor-id` header.
pub struct Actor(pub User);

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Permission(format!("missing {} header", ACTOR_HEADER)))?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Permission(format!("malformed {} header", ACTOR_HEADER)))?;

        state
            .directory
            .find_user(id)
            .await?
            .map(Actor)
            .ok_or_else(|| AppError::Permission(format!("unknown actor {}", id)))
    }
}

/// A committed record plus any notification failure that followed it.
#[derive(Debug, Serialize)]
pub struct Committed<T> {
    pub record: T,
    pub notification_error: Option<String>,
}

impl<T> From<Outcome<T>> for Committed<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            record: outcome.value,
            notification_error: outcome.notification_error.map(|e| e.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

#[derive(Deserialize)]
struct ResolveRequest {
    notes: String,
}

#[derive(Deserialize)]
struct ExamQueryParams {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Deserialize)]
struct ConflictQueryParams {
    status: Option<ConflictStatus>,
    timetable: Option<Uuid>,
    department: Option<Uuid>,
    lecturer: Option<Uuid>,
}

impl ConflictQueryParams {
    fn scope(&self) -> Result<ConflictScope, AppError> {
        match (self.timetable, self.department, self.lecturer) {
            (None, None, None) => Ok(ConflictScope::All),
            (Some(id), None, None) => Ok(ConflictScope::Timetable(id)),
            (None, Some(id), None) => Ok(ConflictScope::Department(id)),
            (None, None, Some(id)) => Ok(ConflictScope::Lecturer(id)),
            _ => Err(AppError::Validation(
                "filter by at most one of timetable, department or lecturer".to_string(),
            )),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/timetables", get(list_timetables).post(create_timetable))
        .route("/timetables/pending", get(pending_timetables))
        .route(
            "/timetables/{id}",
            get(get_timetable).put(update_timetable).delete(delete_timetable),
        )
        .route("/timetables/{id}/approve", post(approve_timetable))
        .route("/timetables/{id}/reject", post(reject_timetable))
        .route("/timetables/{id}/revalidate", post(revalidate_timetable))
        .route("/departments", get(list_departments))
        .route("/departments/{id}/timetables", get(department_timetables))
        .route("/departments/{id}/exams", get(department_exams))
        .route("/conflicts", get(list_conflicts))
        .route("/conflicts/stats", get(conflict_stats))
        .route("/conflicts/by-type/{conflict_type}", get(conflicts_by_type))
        .route("/conflicts/{id}", get(get_conflict))
        .route("/conflicts/{id}/resolve", post(resolve_conflict))
        .route("/conflicts/{id}/appeal", post(appeal_conflict))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_timetables(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Timetable>>, AppError> {
    let timetables = state.timetables.timetables_for(&actor).await?;
    Ok(Json(timetables))
}

async fn create_timetable(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<TimetableRequest>,
) -> Result<(StatusCode, Json<Committed<Timetable>>), AppError> {
    let outcome = state.timetables.create(req, &actor).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

async fn pending_timetables(State(state): State<AppState>) -> Result<Json<Vec<Timetable>>, AppError> {
    let timetables = state.timetables.pending_approvals().await?;
    Ok(Json(timetables))
}

async fn get_timetable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Timetable>, AppError> {
    let timetable = state.timetables.get(id).await?;
    Ok(Json(timetable))
}

async fn update_timetable(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<TimetableRequest>,
) -> Result<Json<Committed<Timetable>>, AppError> {
    let outcome = state.timetables.update(id, req, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn delete_timetable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.timetables.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_timetable(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Committed<Timetable>>, AppError> {
    let outcome = state.timetables.approve(id, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn reject_timetable(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Committed<Timetable>>, AppError> {
    let outcome = state.timetables.reject(id, req.reason, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn revalidate_timetable(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Committed<Timetable>>, AppError> {
    let outcome = state.timetables.revalidate(id, &actor).await?;
    Ok(Json(outcome.into()))
}

async fn list_departments(State(state): State<AppState>) -> Result<Json<Vec<Department>>, AppError> {
    let departments = state.directory.list_departments().await?;
    Ok(Json(departments))
}

async fn department_timetables(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Timetable>>, AppError> {
    let timetables = state.timetables.department_timetables(id).await?;
    Ok(Json(timetables))
}

async fn department_exams(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExamQueryParams>,
) -> Result<Json<Vec<Timetable>>, AppError> {
    let exams = state.timetables.exams_between(id, params.from, params.to).await?;
    Ok(Json(exams))
}

async fn list_conflicts(
    State(state): State<AppState>,
    Query(params): Query<ConflictQueryParams>,
) -> Result<Json<Vec<Conflict>>, AppError> {
    let scope = params.scope()?;
    let conflicts = match (params.status, scope) {
        (None, scope) => state.conflicts.list_unresolved(scope).await?,
        (Some(status), ConflictScope::All) => state.conflicts.list_by_status(status).await?,
        (Some(_), _) => {
            return Err(AppError::Validation(
                "status cannot be combined with a scope filter".to_string(),
            ));
        }
    };
    Ok(Json(conflicts))
}

async fn conflict_stats(State(state): State<AppState>) -> Result<Json<Vec<ConflictStat>>, AppError> {
    let stats = state.conflicts.statistics().await?;
    Ok(Json(stats))
}

async fn conflicts_by_type(
    State(state): State<AppState>,
    Path(conflict_type): Path<ConflictType>,
) -> Result<Json<Vec<Conflict>>, AppError> {
    let conflicts = state.conflicts.list_by_type(conflict_type).await?;
    Ok(Json(conflicts))
}

async fn get_conflict(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Conflict>, AppError> {
    let conflict = state.conflicts.get(id).await?;
    Ok(Json(conflict))
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Conflict>, AppError> {
    let conflict = state.conflicts.resolve(id, req.notes, &actor).await?;
    Ok(Json(conflict))
}

async fn appeal_conflict(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Conflict>, AppError> {
    let conflict = state.conflicts.appeal(id, &actor).await?;
    Ok(Json(conflict))
}
