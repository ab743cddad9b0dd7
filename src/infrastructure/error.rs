use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },
    #[error("{0}")]
    Validation(String),
}

impl InfraError {
    pub fn rejected(message: Option<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.unwrap_or_default(),
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => Some(message.trim()).filter(|value| !value.is_empty()),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub fn extract_error_message(error: &InfraError, fallback: &str) -> String {
    if let Some(message) = error.server_message() {
        return message.to_string();
    }
    let display = error.to_string();
    let display = display.trim();
    if !display.is_empty() {
        return display.to_string();
    }
    fallback.to_string()
}
