use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tripdesk_shared::Masked;

/// Template ids registered with the email provider, one per lifecycle message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplates {
    pub approval: String,
    pub reactivation: String,
    pub suspension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

/// A templated transactional email. Variable values may carry credentials, so they stay masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<Recipient>,
    pub template_id: String,
    pub variables: BTreeMap<String, Masked<String>>,
}

impl EmailMessage {
    pub fn new(to: Recipient, template_id: impl Into<String>) -> Self {
        Self {
            to: vec![to],
            template_id: template_id.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, key: &str, value: impl Into<String>) -> Self {
        self.variables.insert(key.to_string(), Masked(value.into()));
        self
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|v| v.expose().as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("email provider unreachable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_are_masked_in_debug() {
        let message = EmailMessage::new(
            Recipient { email: "x@y.com".to_string(), name: "Asha".to_string() },
            "11122025_3",
        )
        .with_variable("contact_person", "Asha")
        .with_variable("password", "Qw3!rtyuPASS");

        assert_eq!(message.variable("password"), Some("Qw3!rtyuPASS"));
        assert!(!format!("{:?}", message).contains("Qw3!rtyuPASS"));
    }
}
