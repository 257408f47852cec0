//! Adapters for the services agent onboarding talks to: the hosted identity
//! provider's admin API and the transactional email provider.

pub mod identity;
pub mod email;
#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use identity::HttpIdentityProvider;
pub use email::{EmailSender, HttpEmailDispatcher, LogDispatcher};
