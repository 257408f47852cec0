pub mod events;

pub use events::{AgentStatusChangedEvent, AgentStatusRevertedEvent};
