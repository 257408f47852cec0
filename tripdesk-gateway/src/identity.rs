// Identity provider admin API adapter (GoTrue-compatible)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tripdesk_core::identity::{IdentityAccount, IdentityError, IdentityProvider};
use tripdesk_shared::Masked;
use uuid::Uuid;

const ALREADY_REGISTERED: &str = "already been registered";
/// Users requested per page when searching by email.
const LOOKUP_PAGE_SIZE: u32 = 50;
/// Upper bound on pages walked for one lookup.
const MAX_LOOKUP_PAGES: u32 = 200;

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    service_key: Masked<String>,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    email: &'a str,
    password: &'a str,
    email_confirm: bool,
}

#[derive(Serialize)]
struct UpdateUserRequest<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct UserListResponse {
    #[serde(default)]
    users: Vec<UserResponse>,
}

/// The provider reports failures under different keys depending on the endpoint.
#[derive(Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorResponse {
    fn text(&self, raw: &str) -> String {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
            .unwrap_or_else(|| raw.to_string())
    }
}

impl HttpIdentityProvider {
    pub fn new(
        base_url: impl Into<String>,
        service_key: Masked<String>,
        request_timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.service_key.expose();
        request
            .header("apikey", key.as_str())
            .header("Authorization", format!("Bearer {}", key))
    }

    async fn rejection(response: reqwest::Response) -> (u16, ErrorResponse, String) {
        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorResponse>(&raw).unwrap_or_default();
        (status, parsed, raw)
    }
}

fn transport(err: reqwest::Error) -> IdentityError {
    if err.is_timeout() {
        IdentityError::Transport(format!("request timed out: {}", err))
    } else {
        IdentityError::Transport(err.to_string())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &Masked<String>,
        pre_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        debug!(email = %email, "Creating identity account");

        let body = CreateUserRequest {
            email,
            password: password.expose(),
            email_confirm: pre_verified,
        };
        let response = self
            .authorized(self.client.post(self.users_url()))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let (status, error, raw) = Self::rejection(response).await;
            let message = error.text(&raw);

            let email_taken = error.error_code.as_deref() == Some("email_exists")
                || message.contains(ALREADY_REGISTERED);
            if email_taken {
                return Err(IdentityError::AlreadyExists(email.to_string()));
            }

            warn!(status, "Identity provider refused account creation");
            return Err(IdentityError::Rejected { status, message });
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Transport(format!("invalid response body: {}", e)))?;

        Ok(IdentityAccount {
            id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<IdentityAccount>, IdentityError> {
        let per_page = LOOKUP_PAGE_SIZE.to_string();

        for page in 1..=MAX_LOOKUP_PAGES {
            let page_number = page.to_string();
            let response = self
                .authorized(self.client.get(self.users_url()))
                .query(&[
                    ("filter", email),
                    ("page", page_number.as_str()),
                    ("per_page", per_page.as_str()),
                ])
                .send()
                .await
                .map_err(transport)?;

            if !response.status().is_success() {
                let (status, error, raw) = Self::rejection(response).await;
                return Err(IdentityError::Rejected { status, message: error.text(&raw) });
            }

            let list: UserListResponse = response
                .json()
                .await
                .map_err(|e| IdentityError::Transport(format!("invalid response body: {}", e)))?;
            if list.users.is_empty() {
                return Ok(None);
            }

            // The filter is a substring match; only an exact address counts
            let found = list
                .users
                .into_iter()
                .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)));
            if let Some(user) = found {
                return Ok(Some(IdentityAccount {
                    id: user.id,
                    email: email.to_string(),
                }));
            }
        }

        warn!(email = %email, pages = MAX_LOOKUP_PAGES, "Gave up searching identity accounts");
        Ok(None)
    }

    async fn set_password(
        &self,
        account_id: Uuid,
        password: &Masked<String>,
    ) -> Result<(), IdentityError> {
        let url = format!("{}/{}", self.users_url(), account_id);
        let body = UpdateUserRequest { password: password.expose() };

        let response = self
            .authorized(self.client.put(url))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IdentityError::NotFound(account_id.to_string()));
        }
        if !response.status().is_success() {
            let (status, error, raw) = Self::rejection(response).await;
            return Err(IdentityError::Rejected { status, message: error.text(&raw) });
        }
        Ok(())
    }
}
