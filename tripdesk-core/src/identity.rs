use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tripdesk_shared::Masked;
use uuid::Uuid;

/// A login account held by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAccount {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The email is already registered. This is the only failure callers may recover from.
    #[error("an account is already registered for {0}")]
    AlreadyExists(String),
    #[error("identity account not found: {0}")]
    NotFound(String),
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity provider unreachable: {0}")]
    Transport(String),
}

/// Admin-side access to the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a login account. `pre_verified` skips the provider's email confirmation.
    async fn create_account(
        &self,
        email: &str,
        password: &Masked<String>,
        pre_verified: bool,
    ) -> Result<IdentityAccount, IdentityError>;

    async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<IdentityAccount>, IdentityError>;

    async fn set_password(
        &self,
        account_id: Uuid,
        password: &Masked<String>,
    ) -> Result<(), IdentityError>;
}
