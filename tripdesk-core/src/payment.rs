use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Upi,
    Cheque,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cheque => "cheque",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "upi" => Ok(PaymentMethod::Upi),
            "cheque" => Ok(PaymentMethod::Cheque),
            other => Err(CoreError::ValidationError(format!("unknown payment method '{}'", other))),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::ValidationError(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Money received against a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub agent_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(cmd: CreatePayment) -> CoreResult<Self> {
        let now = Utc::now();
        let payment = Self {
            id: Uuid::new_v4(),
            booking_id: cmd.booking_id,
            agent_id: cmd.agent_id,
            amount: cmd.amount,
            payment_method: cmd.payment_method,
            payment_status: cmd.payment_status,
            transaction_id: validate::optional(cmd.transaction_id),
            payment_date: cmd.payment_date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
            updated_at: now,
        };

        payment.check()?;
        Ok(payment)
    }

    pub fn apply(&mut self, update: UpdatePayment) -> CoreResult<()> {
        let mut next = self.clone();

        if let Some(v) = update.booking_id {
            next.booking_id = v;
        }
        if let Some(v) = update.agent_id {
            next.agent_id = v;
        }
        if let Some(v) = update.amount {
            next.amount = v;
        }
        if let Some(v) = update.payment_method {
            next.payment_method = v;
        }
        if let Some(v) = update.payment_status {
            next.payment_status = v;
        }
        if let Some(v) = update.transaction_id {
            next.transaction_id = validate::optional(Some(v));
        }
        if let Some(v) = update.payment_date {
            next.payment_date = v;
        }

        next.check()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    fn check(&self) -> CoreResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(CoreError::ValidationError("amount must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub booking_id: Uuid,
    pub agent_id: Uuid,
    pub amount: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePayment {
    pub booking_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

/// Narrowing for payment listings
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaymentFilter {
    pub agent_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.agent_id.map_or(true, |id| id == payment.agent_id)
            && self.booking_id.map_or(true, |id| id == payment.booking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payment_defaults() {
        let cmd: CreatePayment = serde_json::from_value(serde_json::json!({
            "booking_id": Uuid::new_v4(),
            "agent_id": Uuid::new_v4(),
            "amount": 4999.5,
            "transaction_id": "  "
        }))
        .unwrap();

        let payment = Payment::new(cmd).unwrap();
        assert_eq!(payment.payment_method, PaymentMethod::Cash);
        assert_eq!(payment.payment_status, PaymentStatus::Pending);
        assert_eq!(payment.transaction_id, None);
        assert_eq!(payment.payment_date, payment.created_at.date_naive());
    }

    #[test]
    fn test_method_wire_names() {
        let method: PaymentMethod = serde_json::from_str("\"bank_transfer\"").unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer);
        assert_eq!("upi".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let cmd = CreatePayment {
            booking_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            amount: 0.0,
            payment_method: PaymentMethod::Card,
            payment_status: PaymentStatus::Completed,
            transaction_id: Some("txn_1".to_string()),
            payment_date: None,
        };
        assert!(Payment::new(cmd).is_err());
    }

    #[test]
    fn test_filter() {
        let agent_id = Uuid::new_v4();
        let payment = Payment::new(CreatePayment {
            booking_id: Uuid::new_v4(),
            agent_id,
            amount: 10.0,
            payment_method: PaymentMethod::Upi,
            payment_status: PaymentStatus::Completed,
            transaction_id: None,
            payment_date: None,
        })
        .unwrap();

        assert!(PaymentFilter::default().matches(&payment));
        assert!(PaymentFilter { agent_id: Some(agent_id), booking_id: None }.matches(&payment));
        assert!(!PaymentFilter { agent_id: Some(Uuid::new_v4()), booking_id: None }.matches(&payment));
    }
}
