use crate::application::retry::RetryPolicy;
use crate::application::store::Store;
use crate::domain::models::{
    CalendarEvent, CalendarRange, ConflictCheckRequest, ConflictMap, ExecutionHistoryQuery,
    ExecutionRecord, ExecutionSummary, ExperimentOption, HamiltonStatus, ImportResult,
    LinkedExperimentOption, ManualRecoveryState, OperationStatus, PrerequisiteOption,
    QueueStatus, QueueStatusReport, ScheduleFormData, ScheduleUpdate, ScheduledExperiment,
    SchedulerStatus, SchedulerStatusReport, UpcomingRun,
};
use crate::infrastructure::error::{InfraError, extract_error_message};
use crate::infrastructure::payload::{field, stable_fingerprint};
use crate::infrastructure::schedule_mapper::{
    created_schedule_id, embedded_manual_recovery, normalize_calendar_events, normalize_conflicts,
    normalize_execution_history, normalize_execution_summary, normalize_experiment_options,
    normalize_import_result, normalize_linked_experiment_options, normalize_prerequisite_options,
    normalize_queue_report, normalize_schedule_list, normalize_scheduler_report,
    normalize_schedule, normalize_upcoming_runs, recovery_response_snapshot,
};
use crate::infrastructure::scheduling_client::SchedulingApi;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const DEFAULT_RECENT_LIMIT: u32 = 20;
const DEFAULT_UPCOMING_HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Keep,
    Clear,
    Select(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryState {
    pub queue: Option<QueueStatus>,
    pub hamilton: Option<HamiltonStatus>,
    pub scheduler: Option<SchedulerStatus>,
    pub loading: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchedulingState {
    pub schedules: Vec<ScheduledExperiment>,
    pub selected_id: Option<String>,
    pub status: OperationStatus,
    pub error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub active_only: bool,
    pub manual_recovery: Option<ManualRecoveryState>,
    pub telemetry: TelemetryState,
}

impl SchedulingState {
    pub fn schedule(&self, schedule_id: &str) -> Option<&ScheduledExperiment> {
        self.schedules
            .iter()
            .find(|schedule| schedule.schedule_id == schedule_id)
    }

    pub fn selected(&self) -> Option<&ScheduledExperiment> {
        self.selected_id
            .as_deref()
            .and_then(|schedule_id| self.schedule(schedule_id))
    }

    pub fn schedules_requiring_recovery(&self) -> Vec<&ScheduledExperiment> {
        self.schedules
            .iter()
            .filter(|schedule| schedule.recovery_required)
            .collect()
    }
}

pub fn rebase_selection(
    schedules: &[ScheduledExperiment],
    previous: Option<&str>,
    focus: &Focus,
) -> Option<String> {
    let contains = |schedule_id: &str| {
        schedules
            .iter()
            .any(|schedule| schedule.schedule_id == schedule_id)
    };
    match focus {
        Focus::Clear => None,
        Focus::Select(schedule_id) => contains(schedule_id).then(|| schedule_id.clone()),
        Focus::Keep => previous
            .filter(|schedule_id| contains(schedule_id))
            .map(ToOwned::to_owned),
    }
}

fn begin(state: &mut SchedulingState, status: OperationStatus) {
    state.status = status;
}

fn apply_reload(
    state: &mut SchedulingState,
    schedules: Vec<ScheduledExperiment>,
    manual_recovery: Option<ManualRecoveryState>,
    focus: &Focus,
    now: DateTime<Utc>,
) {
    state.selected_id = rebase_selection(&schedules, state.selected_id.as_deref(), focus);
    state.schedules = schedules;
    if let Some(manual_recovery) = manual_recovery {
        state.manual_recovery = Some(manual_recovery);
    }
    state.status = OperationStatus::Idle;
    state.error = None;
    state.last_refresh = Some(now);
}

fn apply_failure(state: &mut SchedulingState, message: String) {
    state.status = OperationStatus::Error;
    state.error = Some(message);
}

pub(crate) fn replace_if_changed<T: Serialize>(slot: &mut Option<T>, next: T) -> bool {
    let differs = slot
        .as_ref()
        .map(|current| stable_fingerprint(current) != stable_fingerprint(&next))
        .unwrap_or(true);
    if differs {
        *slot = Some(next);
    }
    differs
}

pub(crate) fn apply_queue_report(
    state: &mut SchedulingState,
    report: QueueStatusReport,
    now: DateTime<Utc>,
) -> bool {
    let mut changed = replace_if_changed(&mut state.telemetry.queue, report.queue);
    changed |= replace_if_changed(&mut state.telemetry.hamilton, report.hamilton);
    if let Some(manual_recovery) = report.manual_recovery {
        changed |= replace_if_changed(&mut state.manual_recovery, manual_recovery);
    }
    if changed {
        state.telemetry.last_update = Some(now);
    }
    changed
}

pub(crate) fn apply_scheduler_report(
    state: &mut SchedulingState,
    report: SchedulerStatusReport,
    now: DateTime<Utc>,
) -> bool {
    let mut changed = replace_if_changed(&mut state.telemetry.scheduler, report.scheduler);
    if let Some(manual_recovery) = report.manual_recovery {
        changed |= replace_if_changed(&mut state.manual_recovery, manual_recovery);
    }
    if changed {
        state.telemetry.last_update = Some(now);
    }
    changed
}

pub struct SchedulingController<A>
where
    A: SchedulingApi,
{
    api: Arc<A>,
    store: Arc<Store<SchedulingState>>,
    retry_policy: RetryPolicy,
    now_provider: NowProvider,
}

impl<A> SchedulingController<A>
where
    A: SchedulingApi,
{
    pub fn new(api: Arc<A>, store: Arc<Store<SchedulingState>>) -> Self {
        Self {
            api,
            store,
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn store(&self) -> Arc<Store<SchedulingState>> {
        Arc::clone(&self.store)
    }

    pub fn snapshot(&self) -> SchedulingState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulingState> {
        self.store.subscribe()
    }

    pub async fn load_schedules(&self, active_only: bool, focus: Focus) -> Result<(), InfraError> {
        self.store.update(|state| {
            begin(state, OperationStatus::Loading);
            state.active_only = active_only;
        });
        self.reload(focus, "Failed to load schedules").await
    }

    pub async fn refresh(&self) -> Result<(), InfraError> {
        let active_only = self.store.read(|state| state.active_only);
        self.load_schedules(active_only, Focus::Keep).await
    }

    /// Creates a schedule and selects it; returns the id the service assigned even when the
    /// follow-up reload fails.
    pub async fn create_schedule(&self, form: ScheduleFormData) -> Result<Option<String>, InfraError> {
        self.validated(form.validate())?;
        self.store
            .update(|state| begin(state, OperationStatus::Creating));

        let data = self
            .mutate(self.api.create_schedule(&form), "Failed to create schedule")
            .await?;
        let schedule_id = created_schedule_id(&data);
        info!(
            "created schedule for '{}' (id: {})",
            form.experiment_name,
            schedule_id.as_deref().unwrap_or("unknown")
        );

        let focus = schedule_id.clone().map(Focus::Select).unwrap_or_default();
        if let Err(error) = self.reload(focus, "Failed to load schedules").await {
            // The create already landed remotely; the reload error stays in state.
            warn!(
                "schedule {} was created but the reload failed: {error}",
                schedule_id.as_deref().unwrap_or("unknown")
            );
        }
        Ok(schedule_id)
    }

    /// Sends `patch`; the stored `updated_at` is used as the concurrency token when the patch
    /// carries none.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        mut patch: ScheduleUpdate,
    ) -> Result<(), InfraError> {
        self.validated(patch.validate())?;
        if patch.expected_updated_at.is_none() {
            patch.expected_updated_at = self.store.read(|state| {
                state
                    .schedule(schedule_id)
                    .and_then(|schedule| schedule.updated_at.clone())
            });
        }
        self.store
            .update(|state| begin(state, OperationStatus::Updating));

        self.mutate(
            self.api.update_schedule(schedule_id, &patch),
            "Failed to update schedule",
        )
        .await?;
        info!("updated schedule {schedule_id}");
        self.reload(Focus::Select(schedule_id.to_string()), "Failed to load schedules")
            .await
    }

    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<(), InfraError> {
        self.store
            .update(|state| begin(state, OperationStatus::Deleting));
        self.mutate(
            self.api.delete_schedule(schedule_id),
            "Failed to delete schedule",
        )
        .await?;
        info!("deleted schedule {schedule_id}");
        self.reload(Focus::Clear, "Failed to load schedules").await
    }

    pub async fn require_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Option<ManualRecoveryState>, InfraError> {
        self.store
            .update(|state| begin(state, OperationStatus::Updating));
        let data = self
            .mutate(
                self.api.require_recovery(schedule_id, note),
                "Failed to mark manual recovery",
            )
            .await?;
        info!("manual recovery required for schedule {schedule_id}");
        self.finish_recovery(schedule_id, &data).await
    }

    pub async fn resolve_recovery(
        &self,
        schedule_id: &str,
        note: Option<&str>,
    ) -> Result<Option<ManualRecoveryState>, InfraError> {
        self.store
            .update(|state| begin(state, OperationStatus::Updating));
        let data = self
            .mutate(
                self.api.resolve_recovery(schedule_id, note),
                "Failed to resolve manual recovery",
            )
            .await?;
        info!("manual recovery resolved for schedule {schedule_id}");
        self.finish_recovery(schedule_id, &data).await
    }

    async fn finish_recovery(
        &self,
        schedule_id: &str,
        data: &Value,
    ) -> Result<Option<ManualRecoveryState>, InfraError> {
        let snapshot = recovery_response_snapshot(data);
        if let Some(manual_recovery) = snapshot.clone() {
            self.store
                .update(|state| state.manual_recovery = Some(manual_recovery));
        }
        self.reload(Focus::Select(schedule_id.to_string()), "Failed to load schedules")
            .await?;
        Ok(snapshot)
    }

    pub async fn get_queue_status(&self) -> Result<QueueStatusReport, InfraError> {
        let data = self
            .telemetry_read(
                self.retry_policy
                    .run("loading queue status", move || self.api.queue_status()),
                "Failed to load queue status",
            )
            .await?;
        let report = normalize_queue_report(&data);
        let now = (self.now_provider)();
        self.store
            .update_if(|state| apply_queue_report(state, report.clone(), now));
        Ok(report)
    }

    pub async fn get_scheduler_status(&self) -> Result<SchedulerStatusReport, InfraError> {
        let data = self
            .telemetry_read(
                self.retry_policy
                    .run("loading scheduler status", move || self.api.scheduler_status()),
                "Failed to load scheduler status",
            )
            .await?;
        Ok(self.commit_scheduler_report(&data))
    }

    pub async fn start_scheduler(&self) -> Result<SchedulerStatusReport, InfraError> {
        let data = self
            .telemetry_read(self.api.start_scheduler(), "Failed to start scheduler")
            .await?;
        info!("scheduler start requested");
        Ok(self.commit_scheduler_report(&data))
    }

    pub async fn stop_scheduler(&self) -> Result<SchedulerStatusReport, InfraError> {
        let data = self
            .telemetry_read(self.api.stop_scheduler(), "Failed to stop scheduler")
            .await?;
        info!("scheduler stop requested");
        Ok(self.commit_scheduler_report(&data))
    }

    fn commit_scheduler_report(&self, data: &Value) -> SchedulerStatusReport {
        let report = normalize_scheduler_report(data);
        let now = (self.now_provider)();
        self.store
            .update_if(|state| apply_scheduler_report(state, report.clone(), now));
        report
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> Result<ScheduledExperiment, InfraError> {
        let data = self
            .retry_policy
            .run("loading schedule", move || self.api.get_schedule(schedule_id))
            .await?;
        let raw = match field(&data, "schedule") {
            Value::Object(_) => field(&data, "schedule"),
            _ => &data,
        };
        Ok(normalize_schedule(raw))
    }

    pub async fn get_calendar_data(&self, range: CalendarRange) -> Result<Vec<CalendarEvent>, InfraError> {
        let data = self
            .retry_policy
            .run("loading calendar", move || self.api.calendar(range))
            .await?;
        Ok(normalize_calendar_events(&data))
    }

    pub async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<ConflictMap, InfraError> {
        let data = self.api.check_conflicts(request).await?;
        Ok(normalize_conflicts(&data))
    }

    pub async fn get_execution_history(
        &self,
        query: &ExecutionHistoryQuery,
    ) -> Result<Vec<ExecutionRecord>, InfraError> {
        let data = self
            .retry_policy
            .run("loading execution history", move || self.api.execution_history(query))
            .await?;
        Ok(normalize_execution_history(&data))
    }

    pub async fn get_schedule_execution_summary(
        &self,
        schedule_id: &str,
    ) -> Result<ExecutionSummary, InfraError> {
        let data = self
            .retry_policy
            .run("loading execution summary", move || {
                self.api.execution_summary(schedule_id)
            })
            .await?;
        Ok(normalize_execution_summary(&data, schedule_id))
    }

    pub async fn get_recent_executions(&self, limit: Option<u32>) -> Result<Vec<ExecutionRecord>, InfraError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        let data = self
            .retry_policy
            .run("loading recent executions", move || self.api.recent_executions(limit))
            .await?;
        Ok(normalize_execution_history(&data))
    }

    pub async fn get_upcoming_schedules(&self, hours: Option<u32>) -> Result<Vec<UpcomingRun>, InfraError> {
        let hours = hours.unwrap_or(DEFAULT_UPCOMING_HOURS);
        let data = self
            .retry_policy
            .run("loading upcoming schedules", move || self.api.upcoming(hours))
            .await?;
        Ok(normalize_upcoming_runs(&data))
    }

    pub async fn discover_experiments(&self, rescan: bool) -> Result<Vec<ExperimentOption>, InfraError> {
        let data = self
            .retry_policy
            .run("discovering experiments", move || self.api.discover_experiments(rescan))
            .await?;
        Ok(normalize_experiment_options(&data))
    }

    pub async fn get_prerequisite_options(&self) -> Result<Vec<PrerequisiteOption>, InfraError> {
        let data = self
            .retry_policy
            .run("loading prerequisite options", move || self.api.prerequisite_options())
            .await?;
        Ok(normalize_prerequisite_options(&data))
    }

    pub async fn get_linked_experiment_options(
        &self,
        rescan: bool,
    ) -> Result<Vec<LinkedExperimentOption>, InfraError> {
        let data = self
            .retry_policy
            .run("loading linked experiments", move || {
                self.api.linked_experiment_options(rescan)
            })
            .await?;
        Ok(normalize_linked_experiment_options(&data))
    }

    pub async fn import_files(&self, paths: &[String]) -> Result<ImportResult, InfraError> {
        let data = self.api.import_files(paths).await?;
        let result = normalize_import_result(&data);
        info!(
            "imported {} file(s), skipped {}, {} error(s)",
            result.imported,
            result.skipped,
            result.errors.len()
        );
        Ok(result)
    }

    pub async fn import_folder(&self, path: &str) -> Result<ImportResult, InfraError> {
        let data = self.api.import_folder(path).await?;
        let result = normalize_import_result(&data);
        info!(
            "imported folder {path}: {} imported, {} skipped, {} error(s)",
            result.imported,
            result.skipped,
            result.errors.len()
        );
        Ok(result)
    }

    pub fn select_schedule(&self, schedule_id: Option<&str>) -> bool {
        self.store.update_if(|state| {
            let next = match schedule_id {
                None => None,
                Some(schedule_id) => match state.schedule(schedule_id) {
                    Some(schedule) => Some(schedule.schedule_id.clone()),
                    None => return false,
                },
            };
            if state.selected_id == next {
                return false;
            }
            state.selected_id = next;
            true
        })
    }

    pub fn clear_error(&self) {
        self.store.update_if(|state| {
            let had_error = state.error.is_some() || state.status == OperationStatus::Error;
            state.error = None;
            if state.status == OperationStatus::Error {
                state.status = OperationStatus::Idle;
            }
            had_error
        });
    }

    async fn reload(&self, focus: Focus, fallback: &str) -> Result<(), InfraError> {
        let active_only = self.store.read(|state| state.active_only);
        match self
            .retry_policy
            .run("listing schedules", move || self.api.list_schedules(active_only))
            .await
        {
            Ok(data) => {
                let schedules = normalize_schedule_list(&data);
                let manual_recovery = embedded_manual_recovery(&data);
                let now = (self.now_provider)();
                self.store.update(|state| {
                    apply_reload(state, schedules, manual_recovery, &focus, now);
                });
                Ok(())
            }
            Err(error) => Err(self.fail(error, fallback)),
        }
    }

    async fn mutate<F>(&self, call: F, fallback: &str) -> Result<Value, InfraError>
    where
        F: std::future::Future<Output = Result<Value, InfraError>>,
    {
        call.await.map_err(|error| self.fail(error, fallback))
    }

    async fn telemetry_read<F>(&self, call: F, fallback: &str) -> Result<Value, InfraError>
    where
        F: std::future::Future<Output = Result<Value, InfraError>>,
    {
        call.await.map_err(|error| {
            let message = extract_error_message(&error, fallback);
            warn!("{fallback}: {message}");
            self.store.update(|state| state.error = Some(message));
            error
        })
    }

    fn validated(&self, outcome: Result<(), String>) -> Result<(), InfraError> {
        outcome.map_err(|message| self.fail(InfraError::Validation(message), "Invalid input"))
    }

    fn fail(&self, error: InfraError, fallback: &str) -> InfraError {
        let message = extract_error_message(&error, fallback);
        error!("{fallback}: {message}");
        self.store.update(|state| apply_failure(state, message));
        error
    }
}
