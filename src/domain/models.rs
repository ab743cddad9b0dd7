use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LINKED_EXPERIMENT_PREFIX: &str = "EntityRef:";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Once,
    Interval,
    Daily,
    Weekly,
}

impl ScheduleType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "once" | "one_time" | "one-time" => Some(Self::Once),
            "interval" | "hourly" => Some(Self::Interval),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Interval => "interval",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Linear,
    Exponential,
}

impl BackoffStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_minutes: u32,
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_minutes: 2,
            backoff_strategy: BackoffStrategy::Linear,
        }
    }
}

impl RetryConfig {
    pub fn delay_minutes_for(&self, attempt: u32) -> u32 {
        let attempt = attempt.max(1);
        match self.backoff_strategy {
            BackoffStrategy::Linear => self.retry_delay_minutes.saturating_mul(attempt),
            BackoffStrategy::Exponential => self
                .retry_delay_minutes
                .saturating_mul(2u32.saturating_pow(attempt - 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrerequisiteToken {
    Flag(String),
    LinkedExperiment { experiment_id: String, action: String },
}

impl PrerequisiteToken {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix(LINKED_EXPERIMENT_PREFIX) {
            if let Some((experiment_id, action)) = rest.split_once('|') {
                let experiment_id = experiment_id.trim();
                let action = action.trim();
                if !experiment_id.is_empty() && !action.is_empty() {
                    return Self::LinkedExperiment {
                        experiment_id: experiment_id.to_string(),
                        action: action.to_string(),
                    };
                }
            }
        }
        Self::Flag(token.to_string())
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Flag(name) => name.clone(),
            Self::LinkedExperiment {
                experiment_id,
                action,
            } => format!("{LINKED_EXPERIMENT_PREFIX}{experiment_id}|{action}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledExperiment {
    pub schedule_id: String,
    pub experiment_name: String,
    pub experiment_path: String,
    pub schedule_type: ScheduleType,
    pub interval_hours: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_duration: u32,
    pub is_active: bool,
    pub retry_config: RetryConfig,
    pub prerequisites: Vec<String>,
    pub notification_contacts: Vec<String>,
    pub consecutive_failure_count: u32,
    pub failed_execution_count: u32,
    pub recovery_required: bool,
    pub recovery_note: Option<String>,
    pub recovery_marked_at: Option<DateTime<Utc>>,
    pub recovery_marked_by: Option<String>,
    pub recovery_resolved_at: Option<DateTime<Utc>>,
    pub recovery_resolved_by: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    /// Opaque concurrency token, echoed back as `expected_updated_at`.
    pub updated_at: Option<String>,
}

impl ScheduledExperiment {
    pub fn prerequisite_tokens(&self) -> Vec<PrerequisiteToken> {
        self.prerequisites
            .iter()
            .map(|token| PrerequisiteToken::parse(token))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManualRecoveryState {
    pub active: bool,
    pub note: Option<String>,
    pub schedule_id: Option<String>,
    pub experiment_name: Option<String>,
    pub triggered_by: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QueueStatus {
    pub queued: u32,
    pub running: u32,
    pub completed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RobotAvailability {
    Available,
    Busy,
    Offline,
    #[default]
    Unknown,
}

impl RobotAvailability {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" | "idle" | "ready" => Some(Self::Available),
            "busy" | "running" | "in_use" => Some(Self::Busy),
            "offline" | "unavailable" | "error" => Some(Self::Offline),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HamiltonStatus {
    pub is_running: bool,
    pub process_count: u32,
    pub availability: RobotAvailability,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub active_schedules: u32,
    pub next_run: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueStatusReport {
    pub queue: QueueStatus,
    pub hamilton: HamiltonStatus,
    pub manual_recovery: Option<ManualRecoveryState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulerStatusReport {
    pub scheduler: SchedulerStatus,
    pub manual_recovery: Option<ManualRecoveryState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub schedule_id: String,
    pub experiment_name: String,
    pub schedule_type: ScheduleType,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub recovery_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpcomingRun {
    pub schedule_id: String,
    pub experiment_name: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub estimated_duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictInfo {
    pub schedule_id: String,
    pub experiment_name: String,
    pub overlap_start: Option<DateTime<Utc>>,
    pub overlap_end: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

pub type ConflictMap = BTreeMap<String, Vec<ConflictInfo>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConflictCandidate {
    pub experiment_id: String,
    pub start_time: DateTime<Utc>,
    pub estimated_duration: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConflictCheckRequest {
    pub experiments: Vec<ConflictCandidate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[default]
    Unknown,
}

impl ExecutionStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "scheduled" => Self::Pending,
            "running" | "in_progress" => Self::Running,
            "completed" | "success" | "succeeded" => Self::Completed,
            "failed" | "error" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub schedule_id: Option<String>,
    pub experiment_name: String,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<f64>,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub schedule_id: String,
    pub total_executions: u32,
    pub successful_executions: u32,
    pub failed_executions: u32,
    pub success_rate: f64,
    pub average_duration_minutes: Option<f64>,
    pub last_status: ExecutionStatus,
    pub last_execution_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionHistoryQuery {
    pub schedule_id: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub days: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentOption {
    pub name: String,
    pub path: String,
    pub estimated_duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrerequisiteOption {
    pub token: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedExperimentOption {
    pub experiment_id: String,
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportItemError {
    pub item: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImportResult {
    pub imported: u32,
    pub skipped: u32,
    pub errors: Vec<ImportItemError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    Idle,
    Loading,
    Creating,
    Updating,
    Deleting,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleFormData {
    pub experiment_name: String,
    pub experiment_path: String,
    pub schedule_type: ScheduleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_duration: u32,
    pub is_active: bool,
    pub retry_config: RetryConfig,
    pub prerequisites: Vec<String>,
    pub notification_contacts: Vec<String>,
}

impl ScheduleFormData {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.experiment_name, "experiment_name")?;
        validate_non_empty(&self.experiment_path, "experiment_path")?;
        if self.schedule_type == ScheduleType::Interval {
            match self.interval_hours {
                Some(hours) if hours.is_finite() && hours > 0.0 => {}
                _ => {
                    return Err("interval_hours must be > 0 for interval schedules".to_string());
                }
            }
        }
        if self.estimated_duration == 0 {
            return Err("estimated_duration must be > 0".to_string());
        }
        for token in &self.prerequisites {
            validate_non_empty(token, "prerequisites[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ScheduleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<ScheduleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_contacts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_updated_at: Option<String>,
}

impl ScheduleUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.experiment_name {
            validate_non_empty(name, "experiment_name")?;
        }
        if let Some(path) = &self.experiment_path {
            validate_non_empty(path, "experiment_path")?;
        }
        if let Some(hours) = self.interval_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err("interval_hours must be > 0".to_string());
            }
        }
        if self.estimated_duration == Some(0) {
            return Err("estimated_duration must be > 0".to_string());
        }
        Ok(())
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
