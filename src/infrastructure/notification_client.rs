use crate::domain::notifications::{ContactDraft, NotificationLogQuery};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::http::RestTransport;
use crate::infrastructure::scheduling_client::{ReqwestConsoleClient, strip_empty_query};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn get_settings(&self) -> Result<Value, InfraError>;

    /// `payload` is sent as-is; password handling is encoded by the caller.
    async fn update_settings(&self, payload: &Value) -> Result<Value, InfraError>;

    async fn list_contacts(&self, include_inactive: bool) -> Result<Value, InfraError>;

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Value, InfraError>;

    async fn update_contact(
        &self,
        contact_id: &str,
        draft: &ContactDraft,
    ) -> Result<Value, InfraError>;

    async fn delete_contact(&self, contact_id: &str) -> Result<Value, InfraError>;

    async fn list_logs(&self, query: &NotificationLogQuery) -> Result<Value, InfraError>;
}

fn contacts_url(transport: &RestTransport, include_inactive: bool) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(&["notifications", "contacts"])?;
    if include_inactive {
        url.query_pairs_mut().append_pair("include_inactive", "true");
    }
    Ok(url)
}

fn logs_url(transport: &RestTransport, query: &NotificationLogQuery) -> Result<Url, InfraError> {
    let mut url = transport.endpoint(&["notifications", "logs"])?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(schedule_id) = query
            .schedule_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            pairs.append_pair("schedule_id", schedule_id);
        }
        if let Some(status) = query.status {
            pairs.append_pair("status", status.as_str());
        }
        pairs.append_pair("limit", &query.effective_limit().to_string());
    }
    strip_empty_query(&mut url);
    Ok(url)
}

#[async_trait]
impl NotificationApi for ReqwestConsoleClient {
    async fn get_settings(&self) -> Result<Value, InfraError> {
        let url = self.transport().endpoint(&["notifications", "settings"])?;
        self.get(url, "loading notification settings").await
    }

    async fn update_settings(&self, payload: &Value) -> Result<Value, InfraError> {
        let url = self.transport().endpoint(&["notifications", "settings"])?;
        let request = self.transport().client().put(url).json(payload);
        self.transport()
            .send(request, "saving notification settings")
            .await?
            .into_data()
    }

    async fn list_contacts(&self, include_inactive: bool) -> Result<Value, InfraError> {
        let url = contacts_url(self.transport(), include_inactive)?;
        self.get(url, "listing notification contacts").await
    }

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Value, InfraError> {
        let url = self.transport().endpoint(&["notifications", "contacts"])?;
        let body = serde_json::to_value(draft)?;
        self.post(url, &body, "creating notification contact").await
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        draft: &ContactDraft,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(contact_id, "contact_id")?;
        let url = self
            .transport()
            .endpoint(&["notifications", "contacts", contact_id])?;
        let request = self.transport().client().put(url).json(draft);
        self.transport()
            .send(request, "updating notification contact")
            .await?
            .into_data()
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<Value, InfraError> {
        Self::ensure_non_empty(contact_id, "contact_id")?;
        let url = self
            .transport()
            .endpoint(&["notifications", "contacts", contact_id])?;
        let request = self.transport().client().delete(url);
        self.transport()
            .send(request, "deleting notification contact")
            .await?
            .into_data()
    }

    async fn list_logs(&self, query: &NotificationLogQuery) -> Result<Value, InfraError> {
        let url = logs_url(self.transport(), query)?;
        self.get(url, "loading notification logs").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notifications::DeliveryStatus;
    use crate::infrastructure::http::HttpSettings;
    use std::time::Duration;

    fn transport() -> RestTransport {
        RestTransport::new(&HttpSettings {
            base_url: "http://lab.local/api/scheduling/".to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        })
        .expect("transport")
    }

    #[test]
    fn logs_url_clamps_limit_and_encodes_filters() {
        let url = logs_url(
            &transport(),
            &NotificationLogQuery {
                schedule_id: Some(" s 1 ".to_string()),
                status: Some(DeliveryStatus::Error),
                limit: Some(10_000),
            },
        )
        .expect("url");
        assert_eq!(url.query(), Some("schedule_id=s+1&status=error&limit=500"));

        let url = logs_url(&transport(), &NotificationLogQuery::default()).expect("url");
        assert_eq!(url.query(), Some("limit=50"));
    }

    #[test]
    fn contacts_url_includes_inactive_on_request() {
        let url = contacts_url(&transport(), true).expect("url");
        assert_eq!(
            url.as_str(),
            "http://lab.local/api/scheduling/notifications/contacts?include_inactive=true"
        );
        assert_eq!(contacts_url(&transport(), false).expect("url").query(), None);
    }
}
