//! In-process stand-ins for the external services, with failure injection.
//! Used by workflow and router tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tripdesk_core::identity::{IdentityAccount, IdentityError, IdentityProvider};
use tripdesk_core::notification::{EmailMessage, NotificationDispatcher, NotificationError};
use tripdesk_shared::Masked;
use uuid::Uuid;

#[derive(Default)]
struct IdentityState {
    accounts: HashMap<String, (Uuid, Masked<String>)>,
    create_calls: usize,
    password_resets: usize,
    reject_next_create: Option<u16>,
    create_delay: Option<Duration>,
}

/// Identity provider keeping accounts in memory. Emails are unique, case-insensitively.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, as if created outside this service.
    pub async fn seed(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .await
            .accounts
            .insert(email.to_ascii_lowercase(), (id, Masked(password.to_string())));
        id
    }

    /// The next `create_account` fails with this HTTP status.
    pub async fn reject_next_create(&self, status: u16) {
        self.state.lock().await.reject_next_create = Some(status);
    }

    /// Every `create_account` waits this long before answering.
    pub async fn delay_create(&self, delay: Duration) {
        self.state.lock().await.create_delay = Some(delay);
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn password_resets(&self) -> usize {
        self.state.lock().await.password_resets
    }

    pub async fn password_of(&self, email: &str) -> Option<String> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&email.to_ascii_lowercase())
            .map(|(_, password)| password.expose().clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &Masked<String>,
        _pre_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        let delay = {
            let mut state = self.state.lock().await;
            state.create_calls += 1;
            state.create_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(status) = state.reject_next_create.take() {
            return Err(IdentityError::Rejected {
                status,
                message: "scripted failure".to_string(),
            });
        }

        let key = email.to_ascii_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(IdentityError::AlreadyExists(email.to_string()));
        }

        let id = Uuid::new_v4();
        state.accounts.insert(key, (id, password.clone()));
        Ok(IdentityAccount { id, email: email.to_string() })
    }

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<IdentityAccount>, IdentityError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&email.to_ascii_lowercase())
            .map(|(id, _)| IdentityAccount { id: *id, email: email.to_string() }))
    }

    async fn set_password(
        &self,
        account_id: Uuid,
        password: &Masked<String>,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;
        state.password_resets += 1;
        let entry = state
            .accounts
            .values_mut()
            .find(|(id, _)| *id == account_id)
            .ok_or_else(|| IdentityError::NotFound(account_id.to_string()))?;
        entry.1 = password.clone();
        Ok(())
    }
}

#[derive(Default)]
struct DispatchState {
    sent: Vec<EmailMessage>,
    attempts: usize,
    reject_with: Option<u16>,
    delay: Option<Duration>,
}

/// Dispatcher that records every message it accepts.
#[derive(Default)]
pub struct RecordingDispatcher {
    state: Mutex<DispatchState>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message with this status until cleared with `None`.
    pub async fn reject_with(&self, status: Option<u16>) {
        self.state.lock().await.reject_with = status;
    }

    pub async fn delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.state.lock().await.sent.clone()
    }

    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let delay = {
            let mut state = self.state.lock().await;
            state.attempts += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(status) = state.reject_with {
            return Err(NotificationError::Rejected {
                status,
                body: "scripted failure".to_string(),
            });
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_emails_are_unique() {
        let provider = InMemoryIdentityProvider::new();
        let password = Masked("Xy7!abcdEFGH".to_string());

        provider.create_account("x@y.com", &password, true).await.unwrap();
        let err = provider.create_account("X@y.com", &password, true).await.unwrap_err();

        assert!(matches!(err, IdentityError::AlreadyExists(_)));
        assert_eq!(provider.account_count().await, 1);
        assert_eq!(provider.create_calls().await, 2);
    }

    #[tokio::test]
    async fn test_scripted_rejection_is_one_shot() {
        let provider = InMemoryIdentityProvider::new();
        let password = Masked("Xy7!abcdEFGH".to_string());
        provider.reject_next_create(503).await;

        assert!(provider.create_account("x@y.com", &password, true).await.is_err());
        assert!(provider.create_account("x@y.com", &password, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_dispatcher() {
        let dispatcher = RecordingDispatcher::new();
        let message = EmailMessage::new(
            tripdesk_core::notification::Recipient {
                email: "x@y.com".to_string(),
                name: "Asha".to_string(),
            },
            "26122025",
        );

        dispatcher.reject_with(Some(500)).await;
        assert!(dispatcher.send(&message).await.is_err());
        dispatcher.reject_with(None).await;
        dispatcher.send(&message).await.unwrap();

        assert_eq!(dispatcher.attempts().await, 2);
        assert_eq!(dispatcher.sent().await, vec![message]);
    }
}
