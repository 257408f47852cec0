use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tripdesk_shared::Masked;
use uuid::Uuid;

use crate::validate;
use crate::{CoreError, CoreResult};

pub const DEFAULT_COMMISSION_RATE: f64 = 5.0;

/// Lifecycle state of an agent account
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Active => "active",
            AgentStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AgentStatus::Pending),
            "active" => Ok(AgentStatus::Active),
            "suspended" => Ok(AgentStatus::Suspended),
            other => Err(CoreError::ValidationError(format!("unknown agent status '{}'", other))),
        }
    }
}

// ============================================================================
// Compliance documents
// ============================================================================

/// Trade licence registration number as issued by the local authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeLicence(String);

impl TryFrom<String> for TradeLicence {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() || value.len() > 64 {
            return Err(CoreError::ValidationError(
                "trade licence number must be between 1 and 64 characters".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }
}

impl From<TradeLicence> for String {
    fn from(value: TradeLicence) -> Self {
        value.0
    }
}

impl TradeLicence {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Permanent Account Number: five letters, four digits, one letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PanNumber(String);

impl TryFrom<String> for PanNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let bytes = value.as_bytes();
        let valid = bytes.len() == 10
            && bytes[..5].iter().all(u8::is_ascii_uppercase)
            && bytes[5..9].iter().all(u8::is_ascii_digit)
            && bytes[9].is_ascii_uppercase();

        if !valid {
            return Err(CoreError::ValidationError(format!("'{}' is not a valid PAN", value)));
        }
        Ok(Self(value))
    }
}

impl From<PanNumber> for String {
    fn from(value: PanNumber) -> Self {
        value.0
    }
}

impl PanNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Aadhaar number, always held as its canonical 12-digit string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AadhaarInput", into = "String")]
pub struct AadhaarNumber(String);

/// Clients send Aadhaar either as a string (possibly grouped "1234 5678 9012") or as a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum AadhaarInput {
    Text(String),
    Number(u64),
}

impl TryFrom<AadhaarInput> for AadhaarNumber {
    type Error = CoreError;

    fn try_from(value: AadhaarInput) -> Result<Self, Self::Error> {
        match value {
            AadhaarInput::Text(text) => AadhaarNumber::try_from(text),
            AadhaarInput::Number(number) => AadhaarNumber::try_from(number.to_string()),
        }
    }
}

impl TryFrom<String> for AadhaarNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits: String = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

        // UIDAI never issues numbers starting with 0 or 1
        let valid = digits.len() == 12
            && digits.chars().all(|c| c.is_ascii_digit())
            && !digits.starts_with(['0', '1']);

        if !valid {
            return Err(CoreError::ValidationError("Aadhaar must be a 12-digit number".to_string()));
        }
        Ok(Self(digits))
    }
}

impl From<AadhaarNumber> for String {
    fn from(value: AadhaarNumber) -> Self {
        value.0
    }
}

impl AadhaarNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A compliance document: its registration number plus the uploaded scan, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceDocument<N> {
    pub number: N,
    #[serde(default)]
    pub file_url: Option<String>,
}

impl<N> ComplianceDocument<N> {
    pub fn new(number: N, file_url: Option<String>) -> Self {
        Self {
            number,
            file_url: validate::optional(file_url),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

impl PostalAddress {
    fn normalized(self) -> Self {
        Self {
            address: validate::optional(self.address),
            city: validate::optional(self.city),
            state: validate::optional(self.state),
            country: validate::optional(self.country),
            pincode: validate::optional(self.pincode),
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

/// A travel-agent business account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub agent_code: Option<String>,
    pub user_id: Option<Uuid>,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub address: PostalAddress,
    pub trade_licence: Option<ComplianceDocument<TradeLicence>>,
    pub pan: Option<ComplianceDocument<PanNumber>>,
    pub aadhaar: Option<ComplianceDocument<AadhaarNumber>>,
    pub commission_rate: f64,
    pub status: AgentStatus,
    /// Temporary credential minted at approval, kept only for one-time display to admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Masked<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Build a new pending agent from an admin submission.
    pub fn new_pending(cmd: CreateAgent) -> CoreResult<Self> {
        let now = Utc::now();
        let agent = Self {
            id: Uuid::new_v4(),
            agent_code: None,
            user_id: None,
            company_name: cmd.company_name.trim().to_string(),
            contact_person: cmd.contact_person.trim().to_string(),
            email: normalize_email(&cmd.email),
            phone: cmd.phone.trim().to_string(),
            address: cmd.address.normalized(),
            trade_licence: cmd.trade_licence,
            pan: cmd.pan,
            aadhaar: cmd.aadhaar,
            commission_rate: cmd.commission_rate,
            status: AgentStatus::Pending,
            password: None,
            created_at: now,
            updated_at: now,
        };

        agent.check()?;
        Ok(agent)
    }

    /// Apply a profile edit. Lifecycle fields are never touched here.
    pub fn apply(&mut self, update: UpdateAgent) -> CoreResult<()> {
        let mut next = self.clone();

        if let Some(v) = update.company_name {
            next.company_name = v.trim().to_string();
        }
        if let Some(v) = update.contact_person {
            next.contact_person = v.trim().to_string();
        }
        if let Some(v) = update.email {
            let email = normalize_email(&v);
            if self.user_id.is_some() && email != self.email {
                return Err(CoreError::ValidationError(
                    "email cannot be changed once the agent has a login account".to_string(),
                ));
            }
            next.email = email;
        }
        if let Some(v) = update.phone {
            next.phone = v.trim().to_string();
        }
        if let Some(v) = update.address {
            next.address.address = validate::optional(Some(v));
        }
        if let Some(v) = update.city {
            next.address.city = validate::optional(Some(v));
        }
        if let Some(v) = update.state {
            next.address.state = validate::optional(Some(v));
        }
        if let Some(v) = update.country {
            next.address.country = validate::optional(Some(v));
        }
        if let Some(v) = update.pincode {
            next.address.pincode = validate::optional(Some(v));
        }
        if let Some(doc) = update.trade_licence {
            next.trade_licence = Some(doc);
        }
        if let Some(doc) = update.pan {
            next.pan = Some(doc);
        }
        if let Some(doc) = update.aadhaar {
            next.aadhaar = Some(doc);
        }
        if let Some(rate) = update.commission_rate {
            next.commission_rate = rate;
        }

        next.check()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Record a successful first approval.
    pub fn apply_activation(&mut self, activation: &Activation) {
        self.status = AgentStatus::Active;
        self.agent_code = Some(activation.agent_code.clone());
        self.password = Some(activation.password.clone());
        self.user_id = Some(activation.user_id);
        self.updated_at = Utc::now();
    }

    /// Copy of the agent safe to hand to the agent themself.
    pub fn without_secret(mut self) -> Self {
        self.password = None;
        self
    }

    fn check(&self) -> CoreResult<()> {
        validate::required("company_name", &self.company_name)?;
        validate::required("contact_person", &self.contact_person)?;
        validate::email("email", &self.email)?;
        validate::phone("phone", &self.phone)?;

        if !self.commission_rate.is_finite() || !(0.0..=100.0).contains(&self.commission_rate) {
            return Err(CoreError::ValidationError(
                "commission_rate must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn default_commission_rate() -> f64 {
    DEFAULT_COMMISSION_RATE
}

/// Credentials minted on first approval, persisted in one update.
#[derive(Debug, Clone)]
pub struct Activation {
    pub agent_code: String,
    pub password: Masked<String>,
    pub user_id: Uuid,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgent {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub address: PostalAddress,
    #[serde(default)]
    pub trade_licence: Option<ComplianceDocument<TradeLicence>>,
    #[serde(default)]
    pub pan: Option<ComplianceDocument<PanNumber>>,
    #[serde(default)]
    pub aadhaar: Option<ComplianceDocument<AadhaarNumber>>,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAgent {
    pub company_name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub trade_licence: Option<ComplianceDocument<TradeLicence>>,
    pub pan: Option<ComplianceDocument<PanNumber>>,
    pub aadhaar: Option<ComplianceDocument<AadhaarNumber>>,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetAgentStatus {
    pub agent_id: Uuid,
    pub target_status: AgentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_cmd() -> CreateAgent {
        serde_json::from_value(serde_json::json!({
            "company_name": "Skyline Tours",
            "contact_person": "Asha Rao",
            "email": " Asha@Skyline.IN ",
            "phone": "+91 98765 43210",
            "city": "Pune",
            "pincode": "",
            "pan": { "number": "abcde1234f" },
            "aadhaar": { "number": 234567890123u64, "file_url": "docs/aadhaar.pdf" }
        }))
        .unwrap()
    }

    #[test]
    fn test_new_agent_is_pending_without_credentials() {
        let agent = Agent::new_pending(create_cmd()).unwrap();

        assert_eq!(agent.status, AgentStatus::Pending);
        assert!(agent.agent_code.is_none());
        assert!(agent.user_id.is_none());
        assert!(agent.password.is_none());
        assert_eq!(agent.email, "asha@skyline.in");
        assert_eq!(agent.commission_rate, DEFAULT_COMMISSION_RATE);
        assert_eq!(agent.address.city.as_deref(), Some("Pune"));
        assert_eq!(agent.address.pincode, None);
        assert_eq!(agent.pan.as_ref().unwrap().number.as_str(), "ABCDE1234F");
        assert_eq!(agent.aadhaar.as_ref().unwrap().number.as_str(), "234567890123");
    }

    #[test]
    fn test_aadhaar_accepts_grouped_string_and_rejects_bad_input() {
        let grouped: AadhaarNumber = serde_json::from_str("\"2345 6789 0123\"").unwrap();
        assert_eq!(grouped.as_str(), "234567890123");

        assert!(serde_json::from_str::<AadhaarNumber>("\"12345\"").is_err());
        assert!(serde_json::from_str::<AadhaarNumber>("123456789012").is_err());

        let json = serde_json::to_string(&grouped).unwrap();
        assert_eq!(json, "\"234567890123\"");
    }

    #[test]
    fn test_pan_format() {
        assert!(PanNumber::try_from("ABCDE1234F".to_string()).is_ok());
        assert!(PanNumber::try_from("ABCD12345F".to_string()).is_err());
        assert!(PanNumber::try_from("ABCDE1234".to_string()).is_err());
    }

    #[test]
    fn test_commission_rate_bounds() {
        let mut cmd = create_cmd();
        cmd.commission_rate = 100.5;
        assert!(Agent::new_pending(cmd).is_err());

        let mut cmd = create_cmd();
        cmd.commission_rate = 0.0;
        assert!(Agent::new_pending(cmd).is_ok());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut agent = Agent::new_pending(create_cmd()).unwrap();
        let before = agent.clone();

        let result = agent.apply(UpdateAgent {
            company_name: Some("Skyline Holidays".to_string()),
            commission_rate: Some(-1.0),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(agent, before);
    }

    #[test]
    fn test_email_locked_after_account_creation() {
        let mut agent = Agent::new_pending(create_cmd()).unwrap();
        agent.apply_activation(&Activation {
            agent_code: "AGT-123456".to_string(),
            password: Masked("Xy7!abcdEFGH".to_string()),
            user_id: Uuid::new_v4(),
        });

        let result = agent.apply(UpdateAgent {
            email: Some("other@skyline.in".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(CoreError::ValidationError(_))));

        // Same address in different case is not a change
        agent
            .apply(UpdateAgent {
                email: Some("ASHA@skyline.in".to_string()),
                ..Default::default()
            })
            .unwrap();
    }

    #[test]
    fn test_password_hidden_from_debug_and_portal_view() {
        let mut agent = Agent::new_pending(create_cmd()).unwrap();
        agent.apply_activation(&Activation {
            agent_code: "AGT-654321".to_string(),
            password: Masked("Xy7!abcdEFGH".to_string()),
            user_id: Uuid::new_v4(),
        });

        assert!(!format!("{:?}", agent).contains("Xy7!abcdEFGH"));

        let view = serde_json::to_value(agent.without_secret()).unwrap();
        assert!(view.get("password").is_none());
        assert_eq!(view["status"], "active");
    }

    #[test]
    fn test_set_status_command_wire_format() {
        let cmd: SetAgentStatus = serde_json::from_value(serde_json::json!({
            "agentId": "6f1c0a47-5a7b-4c0e-9e3e-1d2f3a4b5c6d",
            "targetStatus": "suspended"
        }))
        .unwrap();
        assert_eq!(cmd.target_status, AgentStatus::Suspended);

        assert!(serde_json::from_value::<SetAgentStatus>(serde_json::json!({
            "agentId": "6f1c0a47-5a7b-4c0e-9e3e-1d2f3a4b5c6d",
            "targetStatus": "archived"
        }))
        .is_err());
    }
}
