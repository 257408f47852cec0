pub mod error;
pub mod transition;
pub mod workflow;

pub use error::{StatusOutcome, WorkflowError};
pub use transition::plan;
pub use workflow::{AgentStatusWorkflow, WorkflowSettings};
