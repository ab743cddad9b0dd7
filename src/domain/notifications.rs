use crate::domain::models::validate_non_empty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub const DEFAULT_LOG_LIMIT: u32 = 50;
pub const MAX_LOG_LIMIT: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContact {
    pub contact_id: String,
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn compare_contacts(left: &NotificationContact, right: &NotificationContact) -> Ordering {
    right
        .is_active
        .cmp(&left.is_active)
        .then_with(|| {
            left.display_name
                .to_lowercase()
                .cmp(&right.display_name.to_lowercase())
        })
        .then_with(|| left.contact_id.cmp(&right.contact_id))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContactDraft {
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
}

impl ContactDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.display_name, "display_name")?;
        validate_non_empty(&self.email, "email")?;
        if !self.email.contains('@') {
            return Err("email must contain '@'".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub username: Option<String>,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub has_password: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            sender: String::new(),
            username: None,
            use_tls: true,
            use_ssl: false,
            has_password: false,
            updated_at: None,
            updated_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PasswordAction {
    #[default]
    Keep,
    Rotate(String),
    Clear,
}

impl PasswordAction {
    /// `None` keeps the stored secret, blank input clears it, anything else rotates it.
    pub fn from_input(input: Option<&str>) -> Self {
        match input {
            None => Self::Keep,
            Some(secret) if secret.trim().is_empty() => Self::Clear,
            Some(secret) => Self::Rotate(secret.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettingsUpdate {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub username: Option<String>,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub password: PasswordAction,
}

impl NotificationSettingsUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.host, "host")?;
        validate_non_empty(&self.sender, "sender")?;
        if self.port == 0 {
            return Err("port must be > 0".to_string());
        }
        if self.use_tls && self.use_ssl {
            return Err("use_tls and use_ssl are mutually exclusive".to_string());
        }
        if let PasswordAction::Rotate(secret) = &self.password {
            validate_non_empty(secret, "password")?;
        }
        Ok(())
    }

    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("host".to_string(), Value::from(self.host.trim()));
        payload.insert("port".to_string(), Value::from(self.port));
        payload.insert("sender".to_string(), Value::from(self.sender.trim()));
        payload.insert(
            "username".to_string(),
            self.username
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        payload.insert("use_tls".to_string(), Value::from(self.use_tls));
        payload.insert("use_ssl".to_string(), Value::from(self.use_ssl));
        match &self.password {
            PasswordAction::Keep => {}
            PasswordAction::Rotate(secret) => {
                payload.insert("password".to_string(), Value::from(secret.as_str()));
            }
            PasswordAction::Clear => {
                payload.insert("password".to_string(), Value::from(""));
            }
        }
        Value::Object(payload)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    #[default]
    Pending,
    Error,
}

impl DeliveryStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sent" | "delivered" => Some(Self::Sent),
            "pending" | "queued" => Some(Self::Pending),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationLogEntry {
    pub log_id: String,
    pub schedule_id: Option<String>,
    pub execution_id: Option<String>,
    pub event_type: String,
    pub status: DeliveryStatus,
    pub recipients: Vec<String>,
    pub attachments: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationLogQuery {
    pub schedule_id: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub limit: Option<u32>,
}

impl NotificationLogQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT)
    }
}
