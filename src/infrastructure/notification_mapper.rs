use crate::domain::notifications::{
    DeliveryStatus, NotificationContact, NotificationLogEntry, NotificationSettings,
    compare_contacts,
};
use crate::infrastructure::payload::{
    coerce_bool, coerce_id, coerce_optional_string, coerce_string, coerce_string_list,
    coerce_timestamp, coerce_u32, field, first_field, list_items,
};
use serde_json::Value;

pub fn normalize_contact(raw: &Value) -> NotificationContact {
    let email = coerce_string(field(raw, "email"), "");
    NotificationContact {
        contact_id: coerce_id(first_field(raw, &["contact_id", "id"])).unwrap_or_default(),
        display_name: coerce_optional_string(first_field(raw, &["display_name", "name"]))
            .unwrap_or_else(|| email.clone()),
        email,
        is_active: coerce_bool(field(raw, "is_active"), true),
        created_at: coerce_timestamp(field(raw, "created_at")),
        updated_at: coerce_timestamp(field(raw, "updated_at")),
    }
}

pub fn normalize_contacts(raw: &Value) -> Vec<NotificationContact> {
    let mut contacts: Vec<NotificationContact> = list_items(raw, &["contacts", "items"])
        .iter()
        .map(normalize_contact)
        .filter(|contact| !contact.contact_id.is_empty())
        .collect();
    contacts.sort_by(compare_contacts);
    contacts
}

pub fn normalize_settings(raw: &Value) -> NotificationSettings {
    let defaults = NotificationSettings::default();
    let port = coerce_u32(field(raw, "port"), u32::from(defaults.port));
    NotificationSettings {
        host: coerce_string(first_field(raw, &["host", "smtp_host"]), ""),
        port: u16::try_from(port)
            .ok()
            .filter(|port| *port > 0)
            .unwrap_or(defaults.port),
        sender: coerce_string(first_field(raw, &["sender", "from_address"]), ""),
        username: coerce_optional_string(field(raw, "username")),
        use_tls: coerce_bool(field(raw, "use_tls"), defaults.use_tls),
        use_ssl: coerce_bool(field(raw, "use_ssl"), defaults.use_ssl),
        has_password: coerce_bool(field(raw, "has_password"), false),
        updated_at: coerce_timestamp(field(raw, "updated_at")),
        updated_by: coerce_id(field(raw, "updated_by")),
    }
}

pub fn normalize_log_entry(raw: &Value) -> NotificationLogEntry {
    NotificationLogEntry {
        log_id: coerce_id(first_field(raw, &["log_id", "id"])).unwrap_or_default(),
        schedule_id: coerce_id(field(raw, "schedule_id")),
        execution_id: coerce_id(field(raw, "execution_id")),
        event_type: coerce_string(field(raw, "event_type"), "unknown"),
        status: coerce_optional_string(field(raw, "status"))
            .and_then(|value| DeliveryStatus::parse(&value))
            .unwrap_or_default(),
        recipients: recipients(field(raw, "recipients")),
        attachments: coerce_string_list(field(raw, "attachments")),
        error_message: coerce_optional_string(field(raw, "error_message")),
        created_at: coerce_timestamp(field(raw, "created_at")),
        processed_at: coerce_timestamp(field(raw, "processed_at")),
    }
}

pub fn normalize_log_entries(raw: &Value) -> Vec<NotificationLogEntry> {
    list_items(raw, &["logs", "items"])
        .iter()
        .map(normalize_log_entry)
        .collect()
}

fn recipients(raw: &Value) -> Vec<String> {
    match raw {
        Value::String(joined) => joined
            .split(|c: char| c == ',' || c == ';')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        other => coerce_string_list(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_never_echo_a_secret_and_default_port() {
        let settings = normalize_settings(&json!({
            "host": "smtp.lab.local",
            "port": "70000",
            "password": "leaked",
            "has_password": 1
        }));
        assert_eq!(settings.port, 587);
        assert!(settings.has_password);
        assert_eq!(settings.username, None);
        assert!(settings.use_tls);

        assert_eq!(normalize_settings(&Value::Null), NotificationSettings::default());
    }

    #[test]
    fn contacts_are_sorted_and_id_less_rows_dropped() {
        let contacts = normalize_contacts(&json!({
            "contacts": [
                {"id": 2, "name": "Zed", "email": "z@lab.local", "is_active": false},
                {"id": 1, "name": "amy", "email": "a@lab.local"},
                {"name": "ghost"}
            ]
        }));
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].contact_id, "1");
        assert!(!contacts[1].is_active);
    }

    #[test]
    fn log_entries_split_recipient_strings_and_map_status() {
        let entries = normalize_log_entries(&json!([
            {"id": 1, "event_type": "failure", "status": "failed", "recipients": "a@x, b@x"},
            {"id": 2, "status": "???", "recipients": ["c@x"], "attachments": "nope"}
        ]));
        assert_eq!(entries[0].status, DeliveryStatus::Error);
        assert_eq!(entries[0].recipients, vec!["a@x", "b@x"]);
        assert_eq!(entries[1].status, DeliveryStatus::Pending);
        assert_eq!(entries[1].event_type, "unknown");
        assert!(entries[1].attachments.is_empty());
    }
}
