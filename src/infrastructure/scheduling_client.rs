use crate::domain::models::{
    CalendarRange, ConflictCheckRequest, ExecutionHistoryQuery, ExecutionStatus, ScheduleFormData,
    ScheduleUpdate,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::http::{HttpSettings, RestTransport};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{Value, json};
use url::Url;

#[async_trait]
pub trait SchedulingApi: Send + Sync {
    async fn list_schedules(&self, active_only: bool) -> Result<Value, InfraError>;

    async fn get_schedule(&self, schedule_id: &str) -> Result<Value, InfraError>;

    async fn create_schedule(&self, form: &ScheduleFormData) -> Result<Value, InfraError>;

    async fn update_schedule(
        &self,
        schedule_id: &str,
        patch: &ScheduleUpdate,
    ) -> Result<Value, InfraError>;

    async fn delete_schedule(&self, schedule_id: &str) -> Result<Value, InfraError>;

    async fn require_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError>;

    async fn resolve_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError>;

    async fn upcoming(&self, hours: u32) -> Result<Value, InfraError>;

    async fn calendar(&self, range: CalendarRange) -> Result<Value, InfraError>;

    async fn queue_status(&self) -> Result<Value, InfraError>;

    async fn scheduler_status(&self) -> Result<Value, InfraError>;

    async fn start_scheduler(&self) -> Result<Value, InfraError>;

    async fn stop_scheduler(&self) -> Result<Value, InfraError>;

    async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<Value, InfraError>;

    async fn discover_experiments(&self, rescan: bool) -> Result<Value, InfraError>;

    async fn prerequisite_options(&self) -> Result<Value, InfraError>;

    async fn linked_experiment_options(&self, rescan: bool) -> Result<Value, InfraError>;

    async fn import_files(&self, paths: &[String]) -> Result<Value, InfraError>;

    async fn import_folder(&self, path: &str) -> Result<Value, InfraError>;

    async fn execution_history(&self, query: &ExecutionHistoryQuery) -> Result<Value, InfraError>;

    async fn execution_summary(&self, schedule_id: &str) -> Result<Value, InfraError>;

    async fn recent_executions(&self, limit: u32) -> Result<Value, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestConsoleClient {
    transport: RestTransport,
}

impl ReqwestConsoleClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, InfraError> {
        Ok(Self {
            transport: RestTransport::new(settings)?,
        })
    }

    pub(crate) fn transport(&self) -> &RestTransport {
        &self.transport
    }

    pub(crate) fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Validation(format!("{field} must not be empty")));
        }
        Ok(())
    }

    pub(crate) async fn get(&self, url: Url, action: &str) -> Result<Value, InfraError> {
        let request = self.transport.client().get(url);
        self.transport.send(request, action).await?.into_data()
    }

    pub(crate) async fn post(&self, url: Url, body: &Value, action: &str) -> Result<Value, InfraError> {
        let request = self.transport.client().post(url).json(body);
        self.transport.send(request, action).await?.into_data()
    }
}

fn schedules_url(transport: &RestTransport, active_only: bool) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(&["schedules"])?;
    if active_only {
        url.query_pairs_mut().append_pair("active_only", "true");
    }
    Ok(url)
}

fn calendar_url(transport: &RestTransport, range: CalendarRange) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(&["calendar"])?;
    url.query_pairs_mut()
        .append_pair(
            "start_date",
            &range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .append_pair(
            "end_date",
            &range.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    Ok(url)
}

fn history_url(transport: &RestTransport, query: &ExecutionHistoryQuery) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(&["executions", "history"])?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(schedule_id) = query.schedule_id.as_deref().map(str::trim) {
            if !schedule_id.is_empty() {
                pairs.append_pair("schedule_id", schedule_id);
            }
        }
        if let Some(status) = query.status.filter(|status| *status != ExecutionStatus::Unknown) {
            pairs.append_pair("status", execution_status_param(status));
        }
        if let Some(days) = query.days {
            pairs.append_pair("days", &days.to_string());
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
    strip_empty_query(&mut url);
    Ok(url)
}

fn flag_url(transport: &RestTransport, segments: &[&str], key: &str, value: bool) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(segments)?;
    url.query_pairs_mut().append_pair(key, if value { "true" } else { "false" });
    Ok(url)
}

fn execution_status_param(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
        ExecutionStatus::Unknown => "unknown",
    }
}

/// `query_pairs_mut` leaves a bare `?` behind when nothing was appended.
pub(crate) fn strip_empty_query(url: &mut Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}

fn note_body(note: Option<&str>) -> Value {
    let note = note.map(str::trim).filter(|value| !value.is_empty());
    json!({ "note": note })
}

#[async_trait]
impl SchedulingApi for ReqwestConsoleClient {
    async fn list_schedules(&self, active_only: bool) -> Result<Value, InfraError> {
        let url = schedules_url(&self.transport, active_only)?;
        self.get(url, "listing schedules").await
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self.transport.endpoint(&["schedules", schedule_id])?;
        self.get(url, "loading schedule").await
    }

    async fn create_schedule(&self, form: &ScheduleFormData) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["schedules"])?;
        let body = serde_json::to_value(form)?;
        self.post(url, &body, "creating schedule").await
    }

    async fn update_schedule(
        &self,
        schedule_id: &str,
        patch: &ScheduleUpdate,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self.transport.endpoint(&["schedules", schedule_id])?;
        let request = self.transport.client().put(url).json(patch);
        self.transport
            .send(request, "updating schedule")
            .await?
            .into_data()
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self.transport.endpoint(&["schedules", schedule_id])?;
        let request = self.transport.client().delete(url);
        self.transport
            .send(request, "deleting schedule")
            .await?
            .into_data()
    }

    async fn require_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self
            .transport
            .endpoint(&["schedules", schedule_id, "recovery", "require"])?;
        self.post(url, &note_body(note), "requiring manual recovery")
            .await
    }

    async fn resolve_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self
            .transport
            .endpoint(&["schedules", schedule_id, "recovery", "resolve"])?;
        self.post(url, &note_body(note), "resolving manual recovery")
            .await
    }

    async fn upcoming(&self, hours: u32) -> Result<Value, InfraError> {
        let mut url = self.transport.endpoint(&["upcoming"])?;
        url.query_pairs_mut()
            .append_pair("hours", &hours.to_string());
        self.get(url, "loading upcoming schedules").await
    }

    async fn calendar(&self, range: CalendarRange) -> Result<Value, InfraError> {
        if range.end < range.start {
            return Err(InfraError::Validation(
                "calendar range end must not precede start".to_string(),
            ));
        }
        let url = calendar_url(&self.transport, range)?;
        self.get(url, "loading calendar").await
    }

    async fn queue_status(&self) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["queue", "status"])?;
        self.get(url, "loading queue status").await
    }

    async fn scheduler_status(&self) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["status"])?;
        self.get(url, "loading scheduler status").await
    }

    async fn start_scheduler(&self) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["start"])?;
        self.post(url, &json!({}), "starting scheduler").await
    }

    async fn stop_scheduler(&self) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["stop"])?;
        self.post(url, &json!({}), "stopping scheduler").await
    }

    async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["conflicts", "check"])?;
        let body = serde_json::to_value(request)?;
        self.post(url, &body, "checking conflicts").await
    }

    async fn discover_experiments(&self, rescan: bool) -> Result<Value, InfraError> {
        let url = flag_url(&self.transport, &["experiments", "discover"], "rescan", rescan)?;
        self.get(url, "discovering experiments").await
    }

    async fn prerequisite_options(&self) -> Result<Value, InfraError> {
        let url = self.transport.endpoint(&["experiments", "prerequisites"])?;
        self.get(url, "loading prerequisite options").await
    }

    async fn linked_experiment_options(&self, rescan: bool) -> Result<Value, InfraError> {
        let url = flag_url(&self.transport, &["experiments", "linked"], "rescan", rescan)?;
        self.get(url, "loading linked experiments").await
    }

    async fn import_files(&self, paths: &[String]) -> Result<Value, InfraError> {
        let paths: Vec<&str> = paths
            .iter()
            .map(|path| path.trim())
            .filter(|path| !path.is_empty())
            .collect();
        if paths.is_empty() {
            return Err(InfraError::Validation(
                "at least one file path is required".to_string(),
            ));
        }
        let url = self.transport.endpoint(&["import", "files"])?;
        self.post(url, &json!({ "file_paths": paths }), "importing files")
            .await
    }

    async fn import_folder(&self, path: &str) -> Result<Value, InfraError> {
        Self::ensure_non_empty(path, "folder_path")?;
        let url = self.transport.endpoint(&["import", "folder"])?;
        self.post(url, &json!({ "folder_path": path.trim() }), "importing folder")
            .await
    }

    async fn execution_history(&self, query: &ExecutionHistoryQuery) -> Result<Value, InfraError> {
        let url = history_url(&self.transport, query)?;
        self.get(url, "loading execution history").await
    }

    async fn execution_summary(&self, schedule_id: &str) -> Result<Value, InfraError> {
        Self::ensure_non_empty(schedule_id, "schedule_id")?;
        let url = self
            .transport
            .endpoint(&["schedules", schedule_id, "executions", "summary"])?;
        self.get(url, "loading execution summary").await
    }

    async fn recent_executions(&self, limit: u32) -> Result<Value, InfraError> {
        let mut url = self.transport.endpoint(&["executions", "recent"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.max(1).to_string());
        self.get(url, "loading recent executions").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use std::time::Duration;

    fn transport() -> RestTransport {
        RestTransport::new(&HttpSettings {
            base_url: "http://lab.local:8000/api/scheduling".to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        })
        .expect("transport")
    }

    #[test]
    fn schedules_url_only_adds_active_filter_when_set() {
        let transport = transport();
        assert_eq!(
            schedules_url(&transport, false).expect("url").as_str(),
            "http://lab.local:8000/api/scheduling/schedules"
        );
        assert_eq!(
            schedules_url(&transport, true).expect("url").as_str(),
            "http://lab.local:8000/api/scheduling/schedules?active_only=true"
        );
    }

    #[test]
    fn calendar_url_carries_utc_bounds() {
        let range = CalendarRange {
            start: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        };
        let url = calendar_url(&transport(), range).expect("url");
        assert_eq!(
            url.query(),
            Some("start_date=2026-03-01T00%3A00%3A00Z&end_date=2026-03-08T00%3A00%3A00Z")
        );
    }

    #[test]
    fn history_url_skips_unset_filters() {
        let transport = transport();
        let url = history_url(&transport, &ExecutionHistoryQuery::default()).expect("url");
        assert_eq!(url.as_str(), "http://lab.local:8000/api/scheduling/executions/history");

        let url = history_url(
            &transport,
            &ExecutionHistoryQuery {
                schedule_id: Some("s-1".to_string()),
                status: Some(ExecutionStatus::Failed),
                days: Some(7),
                limit: Some(20),
            },
        )
        .expect("url");
        assert_eq!(url.query(), Some("schedule_id=s-1&status=failed&days=7&limit=20"));
    }

    #[test]
    fn rescan_flag_is_explicit() {
        let url = flag_url(&transport(), &["experiments", "linked"], "rescan", false).expect("url");
        assert_eq!(
            url.as_str(),
            "http://lab.local:8000/api/scheduling/experiments/linked?rescan=false"
        );
    }

    #[test]
    fn blank_note_is_sent_as_null() {
        assert_eq!(note_body(Some("  ")), json!({"note": null}));
        assert_eq!(note_body(Some(" tip rack jammed ")), json!({"note": "tip rack jammed"}));
    }

    #[tokio::test]
    async fn blank_ids_fail_before_any_request() {
        let client = ReqwestConsoleClient {
            transport: transport(),
        };
        let error = client.delete_schedule("  ").await.expect_err("blank id");
        assert!(matches!(error, InfraError::Validation(_)));
        let error = client.import_files(&[" ".to_string()]).await.expect_err("no paths");
        assert!(matches!(error, InfraError::Validation(_)));
    }
}
