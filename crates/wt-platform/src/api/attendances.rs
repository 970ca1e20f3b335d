//! Attendance API
//!
//! Check-in/check-out for the caller, the caller's history and report, and
//! an admin view of any user's records.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::api::common::{format_time, ApiResponse, JsonBody};
use crate::api::middleware::Authenticated;
use crate::domain::{AttendanceRecord, AttendanceStatus};
use crate::error::PlatformError;
use crate::service::{checks, AttendanceService, ReportService, WorkReport};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Epoch milliseconds or an RFC 3339 / `YYYY-MM-DD[THH:MM:SS]` string
    #[schema(value_type = Option<String>, example = "2024-03-04T09:00:00Z")]
    pub check_in_time: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    /// Epoch milliseconds or an RFC 3339 / `YYYY-MM-DD[THH:MM:SS]` string
    #[schema(value_type = Option<String>, example = "2024-03-04T17:30:00Z")]
    pub check_out_time: Option<serde_json::Value>,
}

/// Report window, inclusive. Either bound may be omitted.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// First day, `YYYY-MM-DD`. Defaults to the first day of the month.
    pub from: Option<String>,
    /// Last day, `YYYY-MM-DD`. Defaults to today.
    pub to: Option<String>,
}

/// Attendance record as shown to its owner
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    pub id: String,
    pub check_in_time: String,
    pub check_out_time: Option<String>,
    pub status: AttendanceStatus,
    pub work_duration: Option<String>,
    pub work_minutes: Option<i64>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            check_in_time: format_time(r.check_in_time),
            check_out_time: r.check_out_time.map(format_time),
            status: r.status,
            work_duration: r.work_duration,
            work_minutes: r.work_minutes,
        }
    }
}

/// Full attendance record for the admin view
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDetailResponse {
    pub id: String,
    pub user_id: String,
    pub status: AttendanceStatus,
    pub check_in_time: String,
    pub check_in_date: String,
    pub check_out_time: Option<String>,
    pub check_out_date: Option<String>,
    pub work_duration: Option<String>,
    pub work_minutes: Option<i64>,
    /// Seconds since epoch
    pub created_at: i64,
    /// Seconds since epoch
    pub updated_at: i64,
}

impl From<AttendanceRecord> for AttendanceDetailResponse {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            status: r.status,
            check_in_time: format_time(r.check_in_time),
            check_in_date: format_time(r.check_in_date),
            check_out_time: r.check_out_time.map(format_time),
            check_out_date: r.check_out_date.map(format_time),
            work_duration: r.work_duration,
            work_minutes: r.work_minutes,
            created_at: r.created_at.timestamp(),
            updated_at: r.updated_at.timestamp(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub list: Vec<AttendanceResponse>,
    pub total_work_minutes: i64,
    pub total_work_duration: String,
    /// `YYYY-MM-DD`
    pub from: String,
    /// `YYYY-MM-DD`
    pub to: String,
}

impl From<WorkReport> for ReportResponse {
    fn from(r: WorkReport) -> Self {
        Self {
            list: r.list.into_iter().map(Into::into).collect(),
            total_work_minutes: r.total_work_minutes,
            total_work_duration: r.total_work_duration,
            from: r.from.format("%Y-%m-%d").to_string(),
            to: r.to.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AttendancesState {
    pub attendance_service: Arc<AttendanceService>,
    pub report_service: Arc<ReportService>,
}

/// List the caller's attendance, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "attendances",
    responses(
        (status = 200, description = "Caller attendance", body = Vec<AttendanceResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_attendances(
    State(state): State<AttendancesState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<AttendanceResponse>>>, PlatformError> {
    let records = state.attendance_service.list_for_user(&auth.0.user_id).await?;
    Ok(ApiResponse::ok(records.into_iter().map(Into::into).collect()))
}

/// Work-time report for the caller
#[utoipa::path(
    get,
    path = "/reports",
    tag = "attendances",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report for the window", body = ReportResponse),
        (status = 400, description = "Malformed or inverted bounds")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_report(
    State(state): State<AttendancesState>,
    auth: Authenticated,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<ReportResponse>>, PlatformError> {
    let report = state.report_service
        .my_report(&auth.0.user_id, query.from.as_deref(), query.to.as_deref())
        .await?;
    Ok(ApiResponse::ok(report.into()))
}

/// Check in for the day
#[utoipa::path(
    post,
    path = "",
    tag = "attendances",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = AttendanceResponse),
        (status = 400, description = "Missing or malformed checkInTime"),
        (status = 409, description = "Already checked in for the day")
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_in(
    State(state): State<AttendancesState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<CheckInRequest>,
) -> Result<Json<ApiResponse<AttendanceResponse>>, PlatformError> {
    let record = state.attendance_service
        .check_in(&auth.0.user_id, req.check_in_time.as_ref())
        .await?;
    Ok(ApiResponse::ok(record.into()))
}

/// Check out of an open record
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "attendances",
    params(
        ("id" = String, Path, description = "Attendance record ID")
    ),
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out", body = AttendanceResponse),
        (status = 400, description = "Missing, malformed or early checkOutTime"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Already checked out")
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_out(
    State(state): State<AttendancesState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CheckOutRequest>,
) -> Result<Json<ApiResponse<AttendanceResponse>>, PlatformError> {
    let record = state.attendance_service
        .check_out(&id, req.check_out_time.as_ref())
        .await?;
    Ok(ApiResponse::ok(record.into()))
}

/// List a user's attendance (admin)
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "attendances",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User attendance", body = Vec<AttendanceDetailResponse>),
        (status = 400, description = "Malformed user id"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_user_attendances(
    State(state): State<AttendancesState>,
    auth: Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AttendanceDetailResponse>>>, PlatformError> {
    checks::require_admin(&auth.0)?;

    let records = state.attendance_service.list_by_user(&user_id).await?;
    Ok(ApiResponse::ok(records.into_iter().map(Into::into).collect()))
}

pub fn attendances_router(state: AttendancesState) -> Router {
    Router::new()
        .route("/", get(list_my_attendances).post(check_in))
        .route("/reports", get(my_report))
        // GET takes a user id, PUT an attendance id
        .route("/:id", get(list_user_attendances).put(check_out))
        .with_state(state)
}
