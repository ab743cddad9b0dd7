use crate::domain::models::{
    CalendarRange, ConflictCheckRequest, ExecutionHistoryQuery, ScheduleFormData, ScheduleUpdate,
};
use crate::domain::notifications::{ContactDraft, NotificationLogQuery};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notification_client::NotificationApi;
use crate::infrastructure::scheduling_client::SchedulingApi;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub enum Reply {
    Data(Value),
    Transport(&'static str),
    Rejected(&'static str),
}

impl Reply {
    fn into_result(self) -> Result<Value, InfraError> {
        match self {
            Self::Data(value) => Ok(value),
            Self::Transport(message) => Err(InfraError::Transport(message.to_string())),
            Self::Rejected(message) => Err(InfraError::Rejected {
                status: Some(409),
                message: message.to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeConsoleApi {
    scripts: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<&'static str, Reply>>,
    calls: Mutex<Vec<(&'static str, Value)>>,
    call_count: AtomicUsize,
}

impl FakeConsoleApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, operation: &'static str, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .expect("script lock poisoned")
            .entry(operation)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn fallback(&self, operation: &'static str, reply: Reply) -> &Self {
        self.fallbacks
            .lock()
            .expect("fallback lock poisoned")
            .insert(operation, reply);
        self
    }

    pub fn calls_to(&self, operation: &str) -> Vec<Value> {
        self.calls
            .lock()
            .expect("call lock poisoned")
            .iter()
            .filter(|(name, _)| *name == operation)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn respond(&self, operation: &'static str, args: Value) -> Result<Value, InfraError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .expect("call lock poisoned")
            .push((operation, args));
        let scripted = self
            .scripts
            .lock()
            .expect("script lock poisoned")
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        let reply = scripted
            .or_else(|| {
                self.fallbacks
                    .lock()
                    .expect("fallback lock poisoned")
                    .get(operation)
                    .cloned()
            })
            .unwrap_or(Reply::Data(Value::Null));
        reply.into_result()
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn schedule_json(id: &str, name: &str, updated_at: &str) -> Value {
    json!({
        "schedule_id": id,
        "experiment_name": name,
        "experiment_path": format!("C:/Methods/{name}.med"),
        "schedule_type": "daily",
        "estimated_duration": 45,
        "is_active": true,
        "updated_at": updated_at
    })
}

#[async_trait]
impl SchedulingApi for FakeConsoleApi {
    async fn list_schedules(&self, active_only: bool) -> Result<Value, InfraError> {
        self.respond("list_schedules", json!({ "active_only": active_only }))
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Value, InfraError> {
        self.respond("get_schedule", json!(schedule_id))
    }

    async fn create_schedule(&self, form: &ScheduleFormData) -> Result<Value, InfraError> {
        self.respond("create_schedule", serde_json::to_value(form)?)
    }

    async fn update_schedule(
        &self,
        schedule_id: &str,
        patch: &ScheduleUpdate,
    ) -> Result<Value, InfraError> {
        self.respond(
            "update_schedule",
            json!({ "schedule_id": schedule_id, "patch": serde_json::to_value(patch)? }),
        )
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<Value, InfraError> {
        self.respond("delete_schedule", json!(schedule_id))
    }

    async fn require_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError> {
        self.respond(
            "require_recovery",
            json!({ "schedule_id": schedule_id, "note": note }),
        )
    }

    async fn resolve_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError> {
        self.respond(
            "resolve_recovery",
            json!({ "schedule_id": schedule_id, "note": note }),
        )
    }

    async fn upcoming(&self, hours: u32) -> Result<Value, InfraError> {
        self.respond("upcoming", json!(hours))
    }

    async fn calendar(&self, range: CalendarRange) -> Result<Value, InfraError> {
        self.respond(
            "calendar",
            json!({ "start": range.start.to_rfc3339(), "end": range.end.to_rfc3339() }),
        )
    }

    async fn queue_status(&self) -> Result<Value, InfraError> {
        self.respond("queue_status", Value::Null)
    }

    async fn scheduler_status(&self) -> Result<Value, InfraError> {
        self.respond("scheduler_status", Value::Null)
    }

    async fn start_scheduler(&self) -> Result<Value, InfraError> {
        self.respond("start_scheduler", Value::Null)
    }

    async fn stop_scheduler(&self) -> Result<Value, InfraError> {
        self.respond("stop_scheduler", Value::Null)
    }

    async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<Value, InfraError> {
        self.respond("check_conflicts", serde_json::to_value(request)?)
    }

    async fn discover_experiments(&self, rescan: bool) -> Result<Value, InfraError> {
        self.respond("discover_experiments", json!(rescan))
    }

    async fn prerequisite_options(&self) -> Result<Value, InfraError> {
        self.respond("prerequisite_options", Value::Null)
    }

    async fn linked_experiment_options(&self, rescan: bool) -> Result<Value, InfraError> {
        self.respond("linked_experiment_options", json!(rescan))
    }

    async fn import_files(&self, paths: &[String]) -> Result<Value, InfraError> {
        self.respond("import_files", json!(paths))
    }

    async fn import_folder(&self, path: &str) -> Result<Value, InfraError> {
        self.respond("import_folder", json!(path))
    }

    async fn execution_history(&self, query: &ExecutionHistoryQuery) -> Result<Value, InfraError> {
        self.respond(
            "execution_history",
            json!({ "schedule_id": query.schedule_id, "limit": query.limit }),
        )
    }

    async fn execution_summary(&self, schedule_id: &str) -> Result<Value, InfraError> {
        self.respond("execution_summary", json!(schedule_id))
    }

    async fn recent_executions(&self, limit: u32) -> Result<Value, InfraError> {
        self.respond("recent_executions", json!(limit))
    }
}

#[async_trait]
impl NotificationApi for FakeConsoleApi {
    async fn get_settings(&self) -> Result<Value, InfraError> {
        self.respond("get_settings", Value::Null)
    }

    async fn update_settings(&self, payload: &Value) -> Result<Value, InfraError> {
        self.respond("update_settings", payload.clone())
    }

    async fn list_contacts(&self, include_inactive: bool) -> Result<Value, InfraError> {
        self.respond("list_contacts", json!({ "include_inactive": include_inactive }))
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Value, InfraError> {
        self.respond("create_contact", serde_json::to_value(draft)?)
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        draft: &ContactDraft,
    ) -> Result<Value, InfraError> {
        self.respond(
            "update_contact",
            json!({ "contact_id": contact_id, "draft": serde_json::to_value(draft)? }),
        )
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<Value, InfraError> {
        self.respond("delete_contact", json!(contact_id))
    }

    async fn list_logs(&self, query: &NotificationLogQuery) -> Result<Value, InfraError> {
        self.respond(
            "list_logs",
            json!({
                "schedule_id": query.schedule_id,
                "status": query.status.map(|status| status.as_str()),
                "limit": query.effective_limit()
            }),
        )
    }
}
