use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
        }
    }
}

/// The authenticated principal behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Identity-provider account id (JWT `sub`)
    pub user_id: Uuid,
    pub email: Option<String>,
    /// Resolved application role; `None` for signed-in users with no access
    pub role: Option<Role>,
}

/// Request-scoped context handed explicitly to every operation.
///
/// Built once per request by the session middleware; there is no process-wide
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub caller: Option<Caller>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: None,
        }
    }

    pub fn for_caller(caller: Caller) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: Some(caller),
        }
    }

    /// Fails closed: no credential or a non-admin credential is rejected.
    pub fn require_admin(&self) -> CoreResult<&Caller> {
        match &self.caller {
            Some(caller) if caller.role == Some(Role::Admin) => Ok(caller),
            Some(_) => Err(CoreError::Unauthorized("administrator access required".to_string())),
            None => Err(CoreError::Unauthorized("missing authorization".to_string())),
        }
    }

    pub fn require_agent(&self) -> CoreResult<&Caller> {
        match &self.caller {
            Some(caller) if caller.role == Some(Role::Agent) => Ok(caller),
            Some(_) => Err(CoreError::Unauthorized("agent access required".to_string())),
            None => Err(CoreError::Unauthorized("missing authorization".to_string())),
        }
    }

    /// Stable actor label for logs and events.
    pub fn actor_id(&self) -> String {
        match &self.caller {
            Some(caller) => format!("user:{}", caller.user_id),
            None => "anonymous".to_string(),
        }
    }
}
