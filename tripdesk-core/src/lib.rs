pub mod agent;
pub mod booking;
pub mod payment;
pub mod context;
pub mod credentials;
pub mod identity;
pub mod notification;
pub mod policy;
pub mod repository;
mod validate;

pub use agent::{Agent, AgentStatus, Activation, CreateAgent, UpdateAgent, SetAgentStatus};
pub use booking::{Booking, BookingStatus, BookingType, CreateBooking, UpdateBooking};
pub use payment::{Payment, PaymentMethod, PaymentStatus, CreatePayment, UpdatePayment};
pub use context::{Caller, RequestContext, Role};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
