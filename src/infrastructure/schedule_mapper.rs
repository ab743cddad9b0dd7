use crate::domain::models::{
    BackoffStrategy, CalendarEvent, ConflictInfo, ConflictMap, ExecutionRecord, ExecutionStatus,
    ExecutionSummary, ExperimentOption, HamiltonStatus, ImportItemError, ImportResult,
    LinkedExperimentOption, ManualRecoveryState, PrerequisiteOption, QueueStatus,
    QueueStatusReport, RetryConfig, RobotAvailability, ScheduleType, ScheduledExperiment,
    SchedulerStatus, SchedulerStatusReport, UpcomingRun,
};
use crate::infrastructure::payload::{
    coerce_bool, coerce_f64, coerce_id, coerce_optional_f64, coerce_optional_string,
    coerce_string, coerce_string_list, coerce_timestamp, coerce_u32, field, first_field,
    list_items, normalize_list,
};
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULT_DURATION_MINUTES: u32 = 60;
const SCHEDULE_LIST_KEYS: [&str; 3] = ["schedules", "items", "results"];
const MANUAL_RECOVERY_KEYS: [&str; 2] = ["manual_recovery", "manualRecovery"];
const MANUAL_RECOVERY_FLAG_KEYS: [&str; 2] = ["active", "required"];

pub fn normalize_retry_config(raw: &Value) -> RetryConfig {
    let defaults = RetryConfig::default();
    RetryConfig {
        max_retries: coerce_u32(field(raw, "max_retries"), defaults.max_retries),
        retry_delay_minutes: coerce_u32(
            field(raw, "retry_delay_minutes"),
            defaults.retry_delay_minutes,
        ),
        backoff_strategy: coerce_optional_string(field(raw, "backoff_strategy"))
            .and_then(|value| BackoffStrategy::parse(&value))
            .unwrap_or(defaults.backoff_strategy),
    }
}

pub fn normalize_schedule(raw: &Value) -> ScheduledExperiment {
    let schedule_type = coerce_optional_string(field(raw, "schedule_type"))
        .and_then(|value| ScheduleType::parse(&value))
        .unwrap_or_default();
    let experiment_path = coerce_string(field(raw, "experiment_path"), "");
    let experiment_name = coerce_optional_string(field(raw, "experiment_name"))
        .unwrap_or_else(|| experiment_name_from_path(&experiment_path));

    ScheduledExperiment {
        schedule_id: coerce_id(first_field(raw, &["schedule_id", "id"])).unwrap_or_default(),
        experiment_name,
        experiment_path,
        schedule_type,
        interval_hours: coerce_optional_f64(field(raw, "interval_hours"))
            .filter(|hours| *hours > 0.0),
        start_time: coerce_timestamp(field(raw, "start_time")),
        estimated_duration: coerce_u32(
            first_field(raw, &["estimated_duration", "expected_duration"]),
            DEFAULT_DURATION_MINUTES,
        ),
        is_active: coerce_bool(field(raw, "is_active"), true),
        retry_config: normalize_retry_config(field(raw, "retry_config")),
        prerequisites: coerce_string_list(field(raw, "prerequisites")),
        notification_contacts: coerce_string_list(field(raw, "notification_contacts")),
        consecutive_failure_count: coerce_u32(field(raw, "consecutive_failure_count"), 0),
        failed_execution_count: coerce_u32(field(raw, "failed_execution_count"), 0),
        recovery_required: coerce_bool(field(raw, "recovery_required"), false),
        recovery_note: coerce_optional_string(field(raw, "recovery_note")),
        recovery_marked_at: coerce_timestamp(field(raw, "recovery_marked_at")),
        recovery_marked_by: coerce_id(field(raw, "recovery_marked_by")),
        recovery_resolved_at: coerce_timestamp(field(raw, "recovery_resolved_at")),
        recovery_resolved_by: coerce_id(field(raw, "recovery_resolved_by")),
        next_run: coerce_timestamp(field(raw, "next_run")),
        last_run: coerce_timestamp(field(raw, "last_run")),
        created_at: coerce_timestamp(field(raw, "created_at")),
        created_by: coerce_id(field(raw, "created_by")),
        updated_at: coerce_optional_string(field(raw, "updated_at")),
    }
}

/// Drops entries without an id; later duplicates replace earlier ones in place.
pub fn normalize_schedule_list(raw: &Value) -> Vec<ScheduledExperiment> {
    let mut schedules: Vec<ScheduledExperiment> = Vec::new();
    for schedule in list_items(raw, &SCHEDULE_LIST_KEYS)
        .iter()
        .map(normalize_schedule)
        .filter(|schedule| !schedule.schedule_id.is_empty())
    {
        match schedules
            .iter_mut()
            .find(|existing| existing.schedule_id == schedule.schedule_id)
        {
            Some(existing) => *existing = schedule,
            None => schedules.push(schedule),
        }
    }
    schedules
}

pub fn created_schedule_id(raw: &Value) -> Option<String> {
    coerce_id(first_field(raw, &["schedule_id", "id"]))
        .or_else(|| coerce_id(first_field(field(raw, "schedule"), &["schedule_id", "id"])))
        .or_else(|| match raw {
            Value::String(_) | Value::Number(_) => coerce_id(raw),
            _ => None,
        })
}

pub fn normalize_manual_recovery(raw: &Value) -> ManualRecoveryState {
    ManualRecoveryState {
        active: coerce_bool(first_field(raw, &MANUAL_RECOVERY_FLAG_KEYS), false),
        note: coerce_optional_string(field(raw, "note")),
        schedule_id: coerce_id(field(raw, "schedule_id")),
        experiment_name: coerce_optional_string(field(raw, "experiment_name")),
        triggered_by: coerce_id(field(raw, "triggered_by")),
        triggered_at: coerce_timestamp(field(raw, "triggered_at")),
        resolved_by: coerce_id(field(raw, "resolved_by")),
        resolved_at: coerce_timestamp(field(raw, "resolved_at")),
    }
}

pub fn embedded_manual_recovery(raw: &Value) -> Option<ManualRecoveryState> {
    let snapshot = first_field(raw, &MANUAL_RECOVERY_KEYS);
    match snapshot {
        Value::Object(_) => Some(normalize_manual_recovery(snapshot)),
        Value::Bool(active) => Some(ManualRecoveryState {
            active: *active,
            ..ManualRecoveryState::default()
        }),
        _ => None,
    }
}

/// Snapshot carried by a require/resolve response, wrapped or bare. A bare object only counts
/// when it has an alarm flag; an echoed schedule is not a snapshot.
pub fn recovery_response_snapshot(raw: &Value) -> Option<ManualRecoveryState> {
    embedded_manual_recovery(raw).or_else(|| {
        let flagged = !first_field(raw, &MANUAL_RECOVERY_FLAG_KEYS).is_null();
        flagged.then(|| normalize_manual_recovery(raw))
    })
}

pub fn normalize_queue_status(raw: &Value) -> QueueStatus {
    QueueStatus {
        queued: coerce_u32(first_field(raw, &["queued", "queue_size", "pending"]), 0),
        running: coerce_u32(field(raw, "running"), 0),
        completed: coerce_u32(field(raw, "completed"), 0),
        failed: coerce_u32(field(raw, "failed"), 0),
    }
}

pub fn normalize_hamilton_status(raw: &Value) -> HamiltonStatus {
    let process_count = coerce_u32(first_field(raw, &["process_count", "processes"]), 0);
    let is_running = coerce_bool(field(raw, "is_running"), process_count > 0);
    let availability = coerce_optional_string(first_field(raw, &["availability", "status"]))
        .and_then(|value| RobotAvailability::parse(&value))
        .unwrap_or_else(|| classify_availability(raw, is_running));

    HamiltonStatus {
        is_running,
        process_count,
        availability,
        message: coerce_optional_string(field(raw, "message")),
    }
}

fn classify_availability(raw: &Value, is_running: bool) -> RobotAvailability {
    match raw.get("available").or_else(|| raw.get("is_available")) {
        Some(flag @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => {
            if coerce_bool(flag, false) {
                RobotAvailability::Available
            } else {
                RobotAvailability::Busy
            }
        }
        _ if !raw.is_object() => RobotAvailability::Unknown,
        _ if is_running => RobotAvailability::Busy,
        _ => RobotAvailability::Available,
    }
}

pub fn normalize_queue_report(raw: &Value) -> QueueStatusReport {
    let queue = match field(raw, "queue") {
        Value::Object(_) => normalize_queue_status(field(raw, "queue")),
        _ => normalize_queue_status(raw),
    };
    QueueStatusReport {
        queue,
        hamilton: normalize_hamilton_status(first_field(raw, &["hamilton", "hamilton_status"])),
        manual_recovery: embedded_manual_recovery(raw),
    }
}

pub fn normalize_scheduler_status(raw: &Value) -> SchedulerStatus {
    SchedulerStatus {
        is_running: coerce_bool(first_field(raw, &["is_running", "running"]), false),
        active_schedules: coerce_u32(
            first_field(raw, &["active_schedules", "active_schedule_count"]),
            0,
        ),
        next_run: coerce_timestamp(field(raw, "next_run")),
        last_heartbeat: coerce_timestamp(first_field(raw, &["last_heartbeat", "last_check"])),
        message: coerce_optional_string(field(raw, "message")),
    }
}

pub fn normalize_scheduler_report(raw: &Value) -> SchedulerStatusReport {
    let scheduler = match field(raw, "scheduler") {
        Value::Object(_) => normalize_scheduler_status(field(raw, "scheduler")),
        _ => normalize_scheduler_status(raw),
    };
    SchedulerStatusReport {
        scheduler,
        manual_recovery: embedded_manual_recovery(raw),
    }
}

pub fn normalize_calendar_event(raw: &Value) -> CalendarEvent {
    CalendarEvent {
        schedule_id: coerce_id(first_field(raw, &["schedule_id", "id"])).unwrap_or_default(),
        experiment_name: coerce_string(first_field(raw, &["experiment_name", "title"]), ""),
        schedule_type: coerce_optional_string(field(raw, "schedule_type"))
            .and_then(|value| ScheduleType::parse(&value))
            .unwrap_or_default(),
        start: coerce_timestamp(first_field(raw, &["start", "start_time"])),
        end: coerce_timestamp(first_field(raw, &["end", "end_time"])),
        is_active: coerce_bool(field(raw, "is_active"), true),
        recovery_required: coerce_bool(field(raw, "recovery_required"), false),
    }
}

pub fn normalize_calendar_events(raw: &Value) -> Vec<CalendarEvent> {
    normalize_list(raw, &["events", "items"], normalize_calendar_event)
}

pub fn normalize_upcoming_runs(raw: &Value) -> Vec<UpcomingRun> {
    normalize_list(raw, &["upcoming", "schedules", "items"], |item| UpcomingRun {
        schedule_id: coerce_id(first_field(item, &["schedule_id", "id"])).unwrap_or_default(),
        experiment_name: coerce_string(field(item, "experiment_name"), ""),
        scheduled_time: coerce_timestamp(first_field(item, &["scheduled_time", "next_run"])),
        estimated_duration: coerce_u32(field(item, "estimated_duration"), DEFAULT_DURATION_MINUTES),
    })
}

pub fn normalize_conflict(raw: &Value) -> ConflictInfo {
    ConflictInfo {
        schedule_id: coerce_id(first_field(raw, &["schedule_id", "conflicting_schedule_id", "id"]))
            .unwrap_or_default(),
        experiment_name: coerce_string(field(raw, "experiment_name"), ""),
        overlap_start: coerce_timestamp(first_field(raw, &["overlap_start", "start_time"])),
        overlap_end: coerce_timestamp(first_field(raw, &["overlap_end", "end_time"])),
        message: coerce_optional_string(first_field(raw, &["message", "reason"])),
    }
}

pub fn normalize_conflicts(raw: &Value) -> ConflictMap {
    let source = match field(raw, "conflicts") {
        Value::Object(_) => field(raw, "conflicts"),
        _ => raw,
    };
    let Value::Object(entries) = source else {
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(|(candidate_id, conflicts)| {
            let conflicts = normalize_list(conflicts, &[], normalize_conflict);
            (!conflicts.is_empty()).then(|| (candidate_id.trim().to_string(), conflicts))
        })
        .filter(|(candidate_id, _)| !candidate_id.is_empty())
        .collect()
}

pub fn normalize_execution(raw: &Value) -> ExecutionRecord {
    ExecutionRecord {
        execution_id: coerce_id(first_field(raw, &["execution_id", "id"])).unwrap_or_default(),
        schedule_id: coerce_id(field(raw, "schedule_id")),
        experiment_name: coerce_string(field(raw, "experiment_name"), ""),
        status: coerce_optional_string(field(raw, "status"))
            .map(|value| ExecutionStatus::parse(&value))
            .unwrap_or_default(),
        started_at: coerce_timestamp(first_field(raw, &["started_at", "start_time"])),
        completed_at: coerce_timestamp(first_field(raw, &["completed_at", "end_time"])),
        duration_minutes: coerce_optional_f64(field(raw, "duration_minutes"))
            .filter(|minutes| *minutes >= 0.0),
        retry_count: coerce_u32(field(raw, "retry_count"), 0),
        error_message: coerce_optional_string(field(raw, "error_message")),
    }
}

pub fn normalize_execution_history(raw: &Value) -> Vec<ExecutionRecord> {
    normalize_list(raw, &["executions", "history", "items"], normalize_execution)
}

pub fn normalize_execution_summary(raw: &Value, schedule_id: &str) -> ExecutionSummary {
    let total = coerce_u32(first_field(raw, &["total_executions", "total"]), 0);
    let successful = coerce_u32(first_field(raw, &["successful_executions", "successful"]), 0);
    let failed = coerce_u32(first_field(raw, &["failed_executions", "failed"]), 0);
    let computed_rate = if total == 0 {
        0.0
    } else {
        f64::from(successful) / f64::from(total) * 100.0
    };

    ExecutionSummary {
        schedule_id: coerce_id(field(raw, "schedule_id")).unwrap_or_else(|| schedule_id.to_string()),
        total_executions: total,
        successful_executions: successful,
        failed_executions: failed,
        success_rate: coerce_f64(field(raw, "success_rate"), computed_rate).clamp(0.0, 100.0),
        average_duration_minutes: coerce_optional_f64(field(raw, "average_duration_minutes"))
            .filter(|minutes| *minutes >= 0.0),
        last_status: coerce_optional_string(field(raw, "last_status"))
            .map(|value| ExecutionStatus::parse(&value))
            .unwrap_or_default(),
        last_execution_at: coerce_timestamp(field(raw, "last_execution_at")),
    }
}

pub fn normalize_experiment_options(raw: &Value) -> Vec<ExperimentOption> {
    list_items(raw, &["experiments", "items"])
        .iter()
        .filter_map(|item| {
            let path = coerce_optional_string(first_field(item, &["path", "experiment_path"]))
                .or_else(|| item.as_str().map(str::trim).map(ToOwned::to_owned))
                .filter(|value| !value.is_empty())?;
            let name = coerce_optional_string(first_field(item, &["name", "experiment_name"]))
                .unwrap_or_else(|| experiment_name_from_path(&path));
            Some(ExperimentOption {
                name,
                path,
                estimated_duration: match first_field(item, &["estimated_duration"]) {
                    Value::Null => None,
                    value => Some(coerce_u32(value, DEFAULT_DURATION_MINUTES)),
                },
            })
        })
        .collect()
}

pub fn normalize_prerequisite_options(raw: &Value) -> Vec<PrerequisiteOption> {
    list_items(raw, &["prerequisites", "options", "items"])
        .iter()
        .filter_map(|item| {
            let token = coerce_id(first_field(item, &["token", "value", "key"]))
                .or_else(|| coerce_optional_string(item))?;
            let label = coerce_optional_string(first_field(item, &["label", "name"]))
                .unwrap_or_else(|| token.clone());
            Some(PrerequisiteOption { token, label })
        })
        .collect()
}

pub fn normalize_linked_experiment_options(raw: &Value) -> Vec<LinkedExperimentOption> {
    list_items(raw, &["experiments", "options", "items"])
        .iter()
        .filter_map(|item| {
            let experiment_id = coerce_id(first_field(item, &["experiment_id", "id"]))?;
            Some(LinkedExperimentOption {
                name: coerce_string(first_field(item, &["name", "experiment_name"]), &experiment_id),
                status: coerce_optional_string(field(item, "status")),
                experiment_id,
            })
        })
        .collect()
}

pub fn normalize_import_result(raw: &Value) -> ImportResult {
    let errors = list_items(field(raw, "errors"), &[])
        .iter()
        .filter_map(|item| match item {
            Value::String(message) => Some(ImportItemError {
                item: String::new(),
                message: message.trim().to_string(),
            }),
            Value::Object(_) => Some(ImportItemError {
                item: coerce_string(first_field(item, &["item", "file", "path"]), ""),
                message: coerce_string(first_field(item, &["message", "error"]), "unknown error"),
            }),
            _ => None,
        })
        .filter(|error| !error.message.is_empty())
        .collect();

    ImportResult {
        imported: coerce_u32(first_field(raw, &["imported", "imported_count"]), 0),
        skipped: coerce_u32(first_field(raw, &["skipped", "skipped_count"]), 0),
        errors,
    }
}

fn experiment_name_from_path(path: &str) -> String {
    let file_name = path
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or(file_name)
        .trim()
        .to_string()
}
