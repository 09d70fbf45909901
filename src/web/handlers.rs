//! HTTP request handlers module
//!
//! Handlers for the scheduling API: schedule one job, batch recompute,
//! reorder a day, recompute tentative due dates, manually move a stage,
//! and read capacity/dashboard snapshots.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::sync::Arc;
use tracing::error;

use crate::application::services::{StageLockRegistry, WorkingCalendar};
use crate::application::use_cases::{
    ManualRescheduleStage, RecalcTentativeDueDates, RecalculateAll, ReorderRequest, ReorderShift,
    ScheduleJob,
};
use crate::domain::error::SchedulingError;
use crate::domain::repositories::SchedulerRepository;
use crate::web::models::*;

/// Shared application state injected into every handler
pub struct AppState {
    pub repo: Arc<dyn SchedulerRepository>,
    pub locks: Arc<StageLockRegistry>,
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success("OK"))
}

/// Schedules one job end to end
pub async fn schedule_job(
    state: web::Data<AppState>,
    request: web::Json<ScheduleJobRequest>,
) -> HttpResponse {
    let schedule = ScheduleJob::new(state.repo.as_ref(), &state.locks);
    match schedule.execute(&request.job_id, Utc::now()) {
        Ok(result) => HttpResponse::Ok().json(ApiResponse::success(result)),
        Err(e) => scheduling_error_response(e),
    }
}

/// Recomputes schedules for the given jobs, or all active jobs
pub async fn recalculate(
    state: web::Data<AppState>,
    request: web::Json<RecalculateRequest>,
) -> HttpResponse {
    let recalculate = RecalculateAll::new(state.repo.as_ref(), &state.locks);
    match recalculate.execute(request.job_ids.as_deref(), Utc::now()) {
        Ok(summary) => HttpResponse::Ok().json(ApiResponse::success(RecalculateResponse {
            successful: summary.successful,
            failed: summary.failed,
            results: summary.results,
        })),
        Err(e) => scheduling_error_response(e),
    }
}

/// Applies an operator-supplied ordering to one day's stages
///
/// Returns 400 when a listed instance has no slot on the date, 500 on
/// persistence failure, 200 with the rewritten stages otherwise.
pub async fn reorder_day(
    state: web::Data<AppState>,
    request: web::Json<ReorderDayRequest>,
) -> HttpResponse {
    let request = request.into_inner();
    let reorder = ReorderShift::new(state.repo.as_ref());
    let outcome = reorder.execute(&ReorderRequest {
        date: request.date,
        stage_instance_ids: request.stage_instance_ids,
        shift_start: request.shift_start,
        shift_end: request.shift_end,
        day_wide: request.day_wide_reorder.unwrap_or(false),
        grouping_type: request.grouping_type,
    });
    match outcome {
        Ok(outcome) => HttpResponse::Ok().json(ApiResponse::success(ReorderDayResponse {
            updated_stages: outcome.updated_stages,
            fits_within_shift: outcome.fits_within_shift,
        })),
        Err(e) => scheduling_error_response(e),
    }
}

/// Recomputes tentative due dates for proof-waiting jobs
pub async fn tentative_due_dates(state: web::Data<AppState>) -> HttpResponse {
    let recalc = RecalcTentativeDueDates::new(state.repo.as_ref());
    match recalc.execute(Utc::now()) {
        Ok(results) => HttpResponse::Ok().json(ApiResponse::success(TentativeDueDatesResponse {
            count: results.len(),
            results,
        })),
        Err(e) => scheduling_error_response(e),
    }
}

/// Moves one stage instance to a target date
pub async fn manual_reschedule(
    state: web::Data<AppState>,
    request: web::Json<ManualRescheduleRequest>,
) -> HttpResponse {
    let reschedule = ManualRescheduleStage::new(state.repo.as_ref(), &state.locks);
    match reschedule.execute(&request.stage_instance_id, request.target_date) {
        Ok((start, end)) => HttpResponse::Ok().json(ApiResponse::success(
            ManualRescheduleResponse {
                scheduled_start: start,
                scheduled_end: end,
            },
        )),
        Err(e) => scheduling_error_response(e),
    }
}

/// Reads the capacity record for a stage on a date (today by default)
pub async fn stage_capacity(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CapacityQuery>,
) -> HttpResponse {
    let stage_id = path.into_inner();
    let calendar = WorkingCalendar::load(state.repo.as_ref());
    let date = query.date.unwrap_or_else(|| calendar.local_date(Utc::now()));

    match state.repo.capacity_record(&stage_id, date) {
        Ok(record) => HttpResponse::Ok().json(ApiResponse::success(CapacityResponse {
            stage_id,
            date,
            record,
        })),
        Err(e) => {
            error!(error = %e, "capacity read failed");
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string()))
        }
    }
}

/// Aggregate dashboard snapshot: job counts and today's stage load
pub async fn dashboard_stats(state: web::Data<AppState>) -> HttpResponse {
    let calendar = WorkingCalendar::load(state.repo.as_ref());
    let today = calendar.local_date(Utc::now());

    let stats = state.repo.active_jobs().and_then(|active| {
        let awaiting = state.repo.jobs_awaiting_proof()?;
        let load = state.repo.capacity_records_on(today)?;
        Ok(DashboardStats {
            active_jobs: active.len(),
            jobs_awaiting_proof: awaiting.len(),
            todays_stage_load: load,
        })
    });

    match stats {
        Ok(stats) => HttpResponse::Ok().json(ApiResponse::success(stats)),
        Err(e) => {
            error!(error = %e, "dashboard stats failed");
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string()))
        }
    }
}

/// Maps scheduling errors onto HTTP statuses: request problems are 400,
/// missing workflows 404, everything else 500
fn scheduling_error_response(e: SchedulingError) -> HttpResponse {
    error!(error = %e, "scheduling request failed");
    let body = ApiResponse::<()>::error(e.to_string());
    match e {
        SchedulingError::StagesNotAllOnDate { .. } => HttpResponse::BadRequest().json(body),
        SchedulingError::WorkflowNotFound { .. } => HttpResponse::NotFound().json(body),
        SchedulingError::Cancelled => HttpResponse::Conflict().json(body),
        SchedulingError::NoWorkingDayFound { .. }
        | SchedulingError::ConfigUnavailable { .. }
        | SchedulingError::Persistence { .. }
        | SchedulingError::Inconsistency { .. } => HttpResponse::InternalServerError().json(body),
    }
}
