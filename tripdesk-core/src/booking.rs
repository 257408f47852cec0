use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    Flight,
    Bus,
    Hotel,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "flight",
            BookingType::Bus => "bus",
            BookingType::Hotel => "hotel",
        }
    }
}

impl FromStr for BookingType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flight" => Ok(BookingType::Flight),
            "bus" => Ok(BookingType::Bus),
            "hotel" => Ok(BookingType::Hotel),
            other => Err(CoreError::ValidationError(format!("unknown booking type '{}'", other))),
        }
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(CoreError::ValidationError(format!("unknown booking status '{}'", other))),
        }
    }
}

/// A reservation made by an agent on behalf of a passenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub agent_id: Uuid,
    pub booking_type: BookingType,
    pub passenger_name: String,
    pub passenger_email: String,
    pub passenger_phone: String,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub adult_count: i32,
    pub child_count: i32,
    pub total_amount: f64,
    pub commission_amount: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(booking_reference: String, cmd: CreateBooking) -> CoreResult<Self> {
        let now = Utc::now();
        let booking = Self {
            id: Uuid::new_v4(),
            booking_reference,
            agent_id: cmd.agent_id,
            booking_type: cmd.booking_type,
            passenger_name: cmd.passenger_name.trim().to_string(),
            passenger_email: cmd.passenger_email.trim().to_ascii_lowercase(),
            passenger_phone: cmd.passenger_phone.trim().to_string(),
            from_location: validate::optional(cmd.from_location),
            to_location: validate::optional(cmd.to_location),
            departure_date: cmd.departure_date,
            return_date: cmd.return_date,
            adult_count: cmd.adult_count,
            child_count: cmd.child_count,
            total_amount: cmd.total_amount,
            commission_amount: cmd.commission_amount,
            status: cmd.status,
            created_at: now,
            updated_at: now,
        };

        booking.check()?;
        Ok(booking)
    }

    /// Apply an edit; the reference and creation time never change.
    pub fn apply(&mut self, update: UpdateBooking) -> CoreResult<()> {
        let mut next = self.clone();

        if let Some(v) = update.agent_id {
            next.agent_id = v;
        }
        if let Some(v) = update.booking_type {
            next.booking_type = v;
        }
        if let Some(v) = update.passenger_name {
            next.passenger_name = v.trim().to_string();
        }
        if let Some(v) = update.passenger_email {
            next.passenger_email = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = update.passenger_phone {
            next.passenger_phone = v.trim().to_string();
        }
        if let Some(v) = update.from_location {
            next.from_location = validate::optional(Some(v));
        }
        if let Some(v) = update.to_location {
            next.to_location = validate::optional(Some(v));
        }
        if let Some(v) = update.departure_date {
            next.departure_date = Some(v);
        }
        if let Some(v) = update.return_date {
            next.return_date = Some(v);
        }
        if let Some(v) = update.adult_count {
            next.adult_count = v;
        }
        if let Some(v) = update.child_count {
            next.child_count = v;
        }
        if let Some(v) = update.total_amount {
            next.total_amount = v;
        }
        if let Some(v) = update.commission_amount {
            next.commission_amount = v;
        }
        if let Some(v) = update.status {
            next.status = v;
        }

        next.check()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    fn check(&self) -> CoreResult<()> {
        validate::required("passenger_name", &self.passenger_name)?;
        validate::email("passenger_email", &self.passenger_email)?;
        validate::phone("passenger_phone", &self.passenger_phone)?;

        if self.adult_count < 1 {
            return Err(CoreError::ValidationError("adult_count must be at least 1".to_string()));
        }
        if self.child_count < 0 {
            return Err(CoreError::ValidationError("child_count cannot be negative".to_string()));
        }

        validate::non_negative("total_amount", self.total_amount)?;
        validate::non_negative("commission_amount", self.commission_amount)?;
        if self.commission_amount > self.total_amount {
            return Err(CoreError::ValidationError(
                "commission_amount cannot exceed total_amount".to_string(),
            ));
        }

        if let (Some(departure), Some(ret)) = (self.departure_date, self.return_date) {
            if ret < departure {
                return Err(CoreError::ValidationError(
                    "return_date cannot be before departure_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn default_adult_count() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub agent_id: Uuid,
    pub booking_type: BookingType,
    pub passenger_name: String,
    pub passenger_email: String,
    pub passenger_phone: String,
    #[serde(default)]
    pub from_location: Option<String>,
    #[serde(default)]
    pub to_location: Option<String>,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    #[serde(default = "default_adult_count")]
    pub adult_count: i32,
    #[serde(default)]
    pub child_count: i32,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub commission_amount: f64,
    #[serde(default)]
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBooking {
    pub agent_id: Option<Uuid>,
    pub booking_type: Option<BookingType>,
    pub passenger_name: Option<String>,
    pub passenger_email: Option<String>,
    pub passenger_phone: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub adult_count: Option<i32>,
    pub child_count: Option<i32>,
    pub total_amount: Option<f64>,
    pub commission_amount: Option<f64>,
    pub status: Option<BookingStatus>,
}
