use crate::application::retry::RetryPolicy;
use crate::application::store::Store;
use crate::domain::models::OperationStatus;
use crate::domain::notifications::{
    ContactDraft, NotificationContact, NotificationLogEntry, NotificationLogQuery,
    NotificationSettings, NotificationSettingsUpdate,
};
use crate::infrastructure::error::{InfraError, extract_error_message};
use crate::infrastructure::notification_client::NotificationApi;
use crate::infrastructure::notification_mapper::{
    normalize_contacts, normalize_log_entries, normalize_settings,
};
use log::{error, info};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationState {
    pub settings: Option<NotificationSettings>,
    pub contacts: Vec<NotificationContact>,
    pub include_inactive: bool,
    pub logs: Vec<NotificationLogEntry>,
    pub log_query: NotificationLogQuery,
    pub status: OperationStatus,
    pub error: Option<String>,
}

fn settle(state: &mut NotificationState) {
    state.status = OperationStatus::Idle;
    state.error = None;
}

pub struct NotificationCenter<N>
where
    N: NotificationApi,
{
    api: Arc<N>,
    store: Arc<Store<NotificationState>>,
    retry_policy: RetryPolicy,
}

impl<N> NotificationCenter<N>
where
    N: NotificationApi,
{
    pub fn new(api: Arc<N>) -> Self {
        Self {
            api,
            store: Arc::new(Store::default()),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn snapshot(&self) -> NotificationState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.store.subscribe()
    }

    pub async fn load_settings(&self) -> Result<NotificationSettings, InfraError> {
        self.store
            .update(|state| state.status = OperationStatus::Loading);
        let data = self
            .retry_policy
            .run("loading notification settings", move || self.api.get_settings())
            .await
            .map_err(|err| self.fail(err, "Failed to load notification settings"))?;
        let settings = normalize_settings(&data);
        let stored = settings.clone();
        self.store.update(|state| {
            state.settings = Some(stored);
            settle(state);
        });
        Ok(settings)
    }

    pub async fn update_settings(
        &self,
        update: NotificationSettingsUpdate,
    ) -> Result<NotificationSettings, InfraError> {
        update
            .validate()
            .map_err(|message| self.fail(InfraError::Validation(message), "Invalid settings"))?;
        self.store
            .update(|state| state.status = OperationStatus::Updating);

        let data = self
            .api
            .update_settings(&update.to_payload())
            .await
            .map_err(|err| self.fail(err, "Failed to save notification settings"))?;
        info!("notification settings saved for {}", update.host.trim());

        if is_empty_payload(&data) {
            return self.load_settings().await;
        }
        let settings = normalize_settings(&data);
        let stored = settings.clone();
        self.store.update(|state| {
            state.settings = Some(stored);
            settle(state);
        });
        Ok(settings)
    }

    pub async fn load_contacts(&self, include_inactive: bool) -> Result<(), InfraError> {
        self.store.update(|state| {
            state.status = OperationStatus::Loading;
            state.include_inactive = include_inactive;
        });
        self.reload_contacts().await
    }

    pub async fn create_contact(&self, draft: ContactDraft) -> Result<(), InfraError> {
        self.validate_draft(&draft)?;
        self.store
            .update(|state| state.status = OperationStatus::Creating);
        self.api
            .create_contact(&draft)
            .await
            .map_err(|err| self.fail(err, "Failed to create contact"))?;
        info!("created notification contact {}", draft.email.trim());
        self.reload_contacts().await
    }

    pub async fn update_contact(&self, contact_id: &str, draft: ContactDraft) -> Result<(), InfraError> {
        self.validate_draft(&draft)?;
        self.store
            .update(|state| state.status = OperationStatus::Updating);
        self.api
            .update_contact(contact_id, &draft)
            .await
            .map_err(|err| self.fail(err, "Failed to update contact"))?;
        info!("updated notification contact {contact_id}");
        self.reload_contacts().await
    }

    pub async fn delete_contact(&self, contact_id: &str) -> Result<(), InfraError> {
        self.store
            .update(|state| state.status = OperationStatus::Deleting);
        self.api
            .delete_contact(contact_id)
            .await
            .map_err(|err| self.fail(err, "Failed to delete contact"))?;
        info!("deleted notification contact {contact_id}");
        self.reload_contacts().await
    }

    pub async fn load_logs(&self, query: NotificationLogQuery) -> Result<Vec<NotificationLogEntry>, InfraError> {
        self.store
            .update(|state| state.status = OperationStatus::Loading);
        let data = self
            .retry_policy
            .run("loading notification logs", || self.api.list_logs(&query))
            .await
            .map_err(|err| self.fail(err, "Failed to load notification logs"))?;
        let mut logs = normalize_log_entries(&data);
        logs.truncate(query.effective_limit() as usize);
        let page = logs.clone();
        self.store.update(|state| {
            state.logs = page;
            state.log_query = query;
            settle(state);
        });
        Ok(logs)
    }

    pub fn clear_error(&self) {
        self.store.update_if(|state| {
            let had_error = state.error.is_some();
            state.error = None;
            if state.status == OperationStatus::Error {
                state.status = OperationStatus::Idle;
            }
            had_error
        });
    }

    async fn reload_contacts(&self) -> Result<(), InfraError> {
        let include_inactive = self.store.read(|state| state.include_inactive);
        let data = self
            .retry_policy
            .run("listing notification contacts", move || {
                self.api.list_contacts(include_inactive)
            })
            .await
            .map_err(|err| self.fail(err, "Failed to load contacts"))?;
        let contacts = normalize_contacts(&data);
        self.store.update(|state| {
            state.contacts = contacts;
            settle(state);
        });
        Ok(())
    }

    fn validate_draft(&self, draft: &ContactDraft) -> Result<(), InfraError> {
        draft
            .validate()
            .map_err(|message| self.fail(InfraError::Validation(message), "Invalid contact"))
    }

    fn fail(&self, err: InfraError, fallback: &str) -> InfraError {
        let message = extract_error_message(&err, fallback);
        error!("{fallback}: {message}");
        self.store.update(|state| {
            state.status = OperationStatus::Error;
            state.error = Some(message);
        });
        err
    }
}

fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(object) => object.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeConsoleApi, Reply};
    use crate::domain::notifications::{DeliveryStatus, PasswordAction};
    use serde_json::json;

    fn center(api: &Arc<FakeConsoleApi>) -> NotificationCenter<FakeConsoleApi> {
        NotificationCenter::new(Arc::clone(api)).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            delay_ms: 1,
        })
    }

    fn draft(name: &str, email: &str) -> ContactDraft {
        ContactDraft {
            display_name: name.to_string(),
            email: email.to_string(),
            is_active: true,
        }
    }

    fn settings_update(password: PasswordAction) -> NotificationSettingsUpdate {
        NotificationSettingsUpdate {
            host: "smtp.lab.local".to_string(),
            port: 587,
            sender: "robot@lab.local".to_string(),
            username: Some("robot".to_string()),
            use_tls: true,
            use_ssl: false,
            password,
        }
    }

    #[tokio::test]
    async fn contact_writes_reload_in_display_order() {
        let api = Arc::new(FakeConsoleApi::new());
        api.script("create_contact", Reply::Data(json!({"contact_id": 3})))
            .script(
                "list_contacts",
                Reply::Data(json!([
                    {"contact_id": 2, "display_name": "bob", "email": "b@lab.local", "is_active": false},
                    {"contact_id": 3, "display_name": "Carla", "email": "c@lab.local"},
                    {"contact_id": 1, "display_name": "Alice", "email": "a@lab.local"}
                ])),
            );
        let center = center(&api);

        center
            .create_contact(draft("Carla", "c@lab.local"))
            .await
            .expect("create");

        let names: Vec<String> = center
            .snapshot()
            .contacts
            .into_iter()
            .map(|contact| contact.display_name)
            .collect();
        assert_eq!(names, vec!["Alice", "Carla", "bob"]);
        assert_eq!(center.snapshot().status, OperationStatus::Idle);
    }

    #[tokio::test]
    async fn invalid_contact_is_rejected_locally() {
        let api = Arc::new(FakeConsoleApi::new());
        let center = center(&api);

        let error = center
            .create_contact(draft("Nobody", "not-an-address"))
            .await
            .expect_err("invalid email");
        assert!(matches!(error, InfraError::Validation(_)));
        assert_eq!(api.total_calls(), 0);
        assert_eq!(center.snapshot().status, OperationStatus::Error);
    }

    #[tokio::test]
    async fn include_inactive_filter_is_remembered_across_writes() {
        let api = Arc::new(FakeConsoleApi::new());
        let center = center(&api);

        center.load_contacts(true).await.expect("load");
        center.delete_contact("7").await.expect("delete");

        assert_eq!(
            api.calls_to("list_contacts"),
            vec![
                json!({"include_inactive": true}),
                json!({"include_inactive": true})
            ]
        );
    }

    #[tokio::test]
    async fn password_actions_reach_the_service_as_three_payloads() {
        let api = Arc::new(FakeConsoleApi::new());
        api.fallback(
            "update_settings",
            Reply::Data(json!({"host": "smtp.lab.local", "sender": "robot@lab.local", "has_password": true})),
        );
        let center = center(&api);

        for action in [
            PasswordAction::Keep,
            PasswordAction::Rotate("s3cret".to_string()),
            PasswordAction::Clear,
        ] {
            center
                .update_settings(settings_update(action))
                .await
                .expect("update");
        }

        let sent = api.calls_to("update_settings");
        assert_eq!(sent[0].get("password"), None);
        assert_eq!(sent[1]["password"], json!("s3cret"));
        assert_eq!(sent[2]["password"], json!(""));
        let stored = center.snapshot().settings.expect("settings cached");
        assert!(stored.has_password);
    }

    #[tokio::test]
    async fn tls_and_ssl_together_are_rejected() {
        let api = Arc::new(FakeConsoleApi::new());
        let center = center(&api);
        let mut update = settings_update(PasswordAction::Keep);
        update.use_ssl = true;

        center.update_settings(update).await.expect_err("exclusive");
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn empty_settings_response_triggers_reload() {
        let api = Arc::new(FakeConsoleApi::new());
        api.script("update_settings", Reply::Data(json!({})))
            .script(
                "get_settings",
                Reply::Data(json!({"host": "smtp.lab.local", "port": 2525, "sender": "robot@lab.local"})),
            );
        let center = center(&api);

        let settings = center
            .update_settings(settings_update(PasswordAction::Keep))
            .await
            .expect("update");
        assert_eq!(settings.port, 2525);
        assert_eq!(api.calls_to("get_settings").len(), 1);
    }

    #[tokio::test]
    async fn logs_cache_only_the_last_page() {
        let api = Arc::new(FakeConsoleApi::new());
        api.script(
            "list_logs",
            Reply::Data(json!({"logs": [{"id": 1, "status": "sent"}, {"id": 2, "status": "failed"}]})),
        )
        .script("list_logs", Reply::Data(json!([{"id": 3, "status": "sent"}])));
        let center = center(&api);

        center
            .load_logs(NotificationLogQuery::default())
            .await
            .expect("first page");
        let query = NotificationLogQuery {
            schedule_id: Some("s-1".to_string()),
            status: Some(DeliveryStatus::Sent),
            limit: Some(1),
        };
        center.load_logs(query.clone()).await.expect("second page");

        let state = center.snapshot();
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].log_id, "3");
        assert_eq!(state.log_query, query);
        assert_eq!(
            api.calls_to("list_logs")[1],
            json!({"schedule_id": "s-1", "status": "sent", "limit": 1})
        );
    }

    #[tokio::test]
    async fn failed_reload_keeps_contacts_and_reports_message() {
        let api = Arc::new(FakeConsoleApi::new());
        api.script(
            "list_contacts",
            Reply::Data(json!([{"contact_id": 1, "display_name": "Alice", "email": "a@lab.local"}])),
        )
        .script("list_contacts", Reply::Rejected("contacts table locked"));
        let center = center(&api);
        center.load_contacts(false).await.expect("load");

        center.load_contacts(false).await.expect_err("locked");
        let state = center.snapshot();
        assert_eq!(state.contacts.len(), 1);
        assert_eq!(state.error.as_deref(), Some("contacts table locked"));

        center.clear_error();
        assert_eq!(center.snapshot().status, OperationStatus::Idle);
    }
}
