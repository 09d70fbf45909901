//! Web API request/response models module

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::use_cases::{JobRecalcResult, TentativeDueDate, UpdatedStage};
use crate::domain::entities::StageCapacityRecord;

/// Uniform response envelope: `{ok: true, data}` or `{ok: false, error}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleJobRequest {
    pub job_id: String,
    /// Product-line partition hint; informational, jobs are keyed by id
    pub job_table: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecalculateRequest {
    pub job_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderDayRequest {
    pub date: NaiveDate,
    pub stage_instance_ids: Vec<String>,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub day_wide_reorder: Option<bool>,
    pub grouping_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualRescheduleRequest {
    pub stage_instance_id: String,
    pub target_date: NaiveDate,
    /// Optional stage hint; the instance row is authoritative
    pub stage_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<JobRecalcResult>,
}

#[derive(Debug, Serialize)]
pub struct ReorderDayResponse {
    pub updated_stages: Vec<UpdatedStage>,
    pub fits_within_shift: bool,
}

#[derive(Debug, Serialize)]
pub struct TentativeDueDatesResponse {
    pub count: usize,
    pub results: Vec<TentativeDueDate>,
}

#[derive(Debug, Serialize)]
pub struct ManualRescheduleResponse {
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CapacityQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    pub stage_id: String,
    pub date: NaiveDate,
    pub record: Option<StageCapacityRecord>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub active_jobs: usize,
    pub jobs_awaiting_proof: usize,
    pub todays_stage_load: Vec<StageCapacityRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["data"], 1);
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(ApiResponse::<()>::error("boom")).unwrap();
        assert_eq!(err["ok"], false);
        assert_eq!(err["error"], "boom");
    }
}
