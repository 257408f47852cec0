// Transactional email adapter (MSG91 v5 email API)

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use tripdesk_core::notification::{EmailMessage, NotificationDispatcher, NotificationError, Recipient};
use tripdesk_shared::Masked;

/// The verified sending identity configured with the provider
#[derive(Debug, Clone)]
pub struct EmailSender {
    pub email: String,
    pub name: String,
    pub domain: String,
}

pub struct HttpEmailDispatcher {
    client: reqwest::Client,
    endpoint: String,
    auth_key: Masked<String>,
    sender: EmailSender,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: Vec<Address<'a>>,
    from: Address<'a>,
    domain: &'a str,
    template_id: &'a str,
    variables: &'a BTreeMap<String, Masked<String>>,
}

impl HttpEmailDispatcher {
    pub fn new(
        base_url: &str,
        auth_key: Masked<String>,
        sender: EmailSender,
        request_timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/v5/email/send", base_url.trim_end_matches('/')),
            auth_key,
            sender,
        })
    }
}

fn address(recipient: &Recipient) -> Address<'_> {
    Address {
        email: &recipient.email,
        name: &recipient.name,
    }
}

#[async_trait]
impl NotificationDispatcher for HttpEmailDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let request = SendRequest {
            to: message.to.iter().map(address).collect(),
            from: Address {
                email: &self.sender.email,
                name: &self.sender.name,
            },
            domain: &self.sender.domain,
            template_id: &message.template_id,
            variables: &message.variables,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("authkey", self.auth_key.expose().as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), template_id = %message.template_id, "Email provider rejected message");
            return Err(NotificationError::Rejected { status: status.as_u16(), body });
        }

        info!(template_id = %message.template_id, recipients = message.to.len(), "Email dispatched");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them. Variables are not logged.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let recipients: Vec<&str> = message.to.iter().map(|r| r.email.as_str()).collect();
        info!(
            template_id = %message.template_id,
            recipients = ?recipients,
            variables = ?message.variables.keys().collect::<Vec<_>>(),
            "Email suppressed (log dispatcher)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn sender() -> EmailSender {
        EmailSender {
            email: "no-reply@phoenixtravelopedia.com".to_string(),
            name: "Noreply Phoenix Travelopedia".to_string(),
            domain: "phoenixtravelopedia.com".to_string(),
        }
    }

    fn approval_message() -> EmailMessage {
        EmailMessage::new(
            Recipient { email: "x@y.com".to_string(), name: "Asha Rao".to_string() },
            "11122025_3",
        )
        .with_variable("contact_person", "Asha Rao")
        .with_variable("agent_code", "AGT-123456")
        .with_variable("password", "Xy7!abcdEFGH")
    }

    #[tokio::test]
    async fn test_send_posts_template_with_variables() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v5/email/send")
            .match_header("authkey", "msg91-key")
            .match_body(Matcher::Json(json!({
                "to": [{ "email": "x@y.com", "name": "Asha Rao" }],
                "from": {
                    "email": "no-reply@phoenixtravelopedia.com",
                    "name": "Noreply Phoenix Travelopedia"
                },
                "domain": "phoenixtravelopedia.com",
                "template_id": "11122025_3",
                "variables": {
                    "agent_code": "AGT-123456",
                    "contact_person": "Asha Rao",
                    "password": "Xy7!abcdEFGH"
                }
            })))
            .with_status(200)
            .with_body(json!({ "status": "success" }).to_string())
            .create_async()
            .await;

        let dispatcher = HttpEmailDispatcher::new(
            &server.url(),
            Masked("msg91-key".to_string()),
            sender(),
            Duration::from_secs(5),
        )
        .unwrap();

        dispatcher.send(&approval_message()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v5/email/send")
            .with_status(401)
            .with_body(json!({ "status": "fail", "message": "Invalid authkey" }).to_string())
            .create_async()
            .await;

        let dispatcher = HttpEmailDispatcher::new(
            &server.url(),
            Masked("wrong".to_string()),
            sender(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = dispatcher.send(&approval_message()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 401, ref body } if body.contains("Invalid authkey")));
    }

    #[tokio::test]
    async fn test_log_dispatcher_always_succeeds() {
        assert!(LogDispatcher.send(&approval_message()).await.is_ok());
    }
}
