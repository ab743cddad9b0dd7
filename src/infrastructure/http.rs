use crate::infrastructure::error::InfraError;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub message: Option<String>,
    pub data: Value,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn from_value(body: Value) -> Self {
        let success = body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        let data = match body {
            Value::Object(mut object) => object.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Self {
            success,
            message,
            data,
        }
    }

    pub fn into_data(self) -> Result<Value, InfraError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(InfraError::rejected(self.message))
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
    base_url: Url,
}

impl RestTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, InfraError> {
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid base_url '{base}': {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "base_url '{base}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|error| InfraError::InvalidConfig(format!("failed to create HTTP client: {error}")))?;
        Ok(Self { client, base_url })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        endpoint_from(&self.base_url, segments)
    }

    pub async fn send(&self, request: RequestBuilder, action: &str) -> Result<Envelope, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Transport(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Transport(format!("failed reading response while {action}: {error}")))?;
        debug!("{action}: http {}", status.as_u16());

        decode_response(status.as_u16(), &body, action)
    }
}

fn endpoint_from(base_url: &Url, segments: &[&str]) -> Result<Url, InfraError> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| InfraError::InvalidConfig("base_url cannot be a base".to_string()))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn decode_response(status: u16, body: &str, action: &str) -> Result<Envelope, InfraError> {
    let parsed = if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(body)
    };

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .map(Envelope::from_value)
            .and_then(|envelope| envelope.message)
            .or_else(|| {
                Some(body_excerpt(body))
                    .filter(|value| !value.is_empty() && !value.starts_with('<'))
                    .map(|value| format!("http {status}: {value}"))
            });
        return Err(match message {
            Some(message) => InfraError::Rejected {
                status: Some(status),
                message,
            },
            None => InfraError::Transport(format!("http {status} while {action}")),
        });
    }

    let body = parsed.map_err(|error| {
        InfraError::Transport(format!("invalid response payload while {action}: {error}"))
    })?;
    Ok(Envelope::from_value(body))
}

fn body_excerpt(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(BODY_EXCERPT_CHARS)
        .map(|(index, _)| index)
        .unwrap_or(body.len());
    body[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_without_success_flag_is_success() {
        let envelope = Envelope::from_value(json!({"data": [1, 2]}));
        assert!(envelope.success);
        assert_eq!(envelope.into_data().expect("data"), json!([1, 2]));
    }

    #[test]
    fn rejected_envelope_carries_message() {
        let envelope = Envelope::from_value(json!({"success": false, "message": " stale write "}));
        let error = envelope.into_data().expect_err("rejected");
        assert_eq!(error.server_message(), Some("stale write"));
    }

    #[test]
    fn non_success_status_prefers_envelope_message() {
        let error = decode_response(
            409,
            r#"{"success": false, "message": "Schedule was modified"}"#,
            "updating schedule",
        )
        .expect_err("conflict");
        assert!(matches!(
            error,
            InfraError::Rejected { status: Some(409), ref message } if message == "Schedule was modified"
        ));

        let error = decode_response(502, "<html>bad gateway</html>", "listing schedules")
            .expect_err("gateway");
        assert!(error.is_transport());
    }

    #[test]
    fn plain_text_error_is_cut_on_a_char_boundary() {
        let body = format!("a{}", "é".repeat(300));
        let error = decode_response(500, &body, "loading queue status").expect_err("server error");
        let (status, message) = match error {
            InfraError::Rejected { status, message } => (status, message),
            other => panic!("expected rejected error, got {other:?}"),
        };
        assert_eq!(status, Some(500));
        let excerpt = message.strip_prefix("http 500: ").expect("status prefix");
        assert_eq!(excerpt.chars().count(), BODY_EXCERPT_CHARS);
        assert!(excerpt.ends_with('é'));
    }

    #[test]
    fn empty_success_body_yields_null_data() {
        let envelope = decode_response(204, "", "deleting schedule").expect("empty body");
        assert_eq!(envelope, Envelope::ok(Value::Null));
    }

    #[test]
    fn endpoint_percent_encodes_segments() {
        let base = Url::parse("http://lab.local:8000/api/scheduling/").expect("url");
        let url = endpoint_from(&base, &["schedules", "a b/c"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://lab.local:8000/api/scheduling/schedules/a%20b%2Fc");
    }
}
