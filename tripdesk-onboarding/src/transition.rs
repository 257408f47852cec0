use tripdesk_core::policy::TransitionKind;
use tripdesk_core::{AgentStatus, CoreError, CoreResult};

/// Decide which transition moves an agent from `from` to `to`.
///
/// `Ok(None)` means the agent is already in the target state. Pending is only
/// re-entered by compensation, never on request.
pub fn plan(from: AgentStatus, to: AgentStatus) -> CoreResult<Option<TransitionKind>> {
    use AgentStatus::*;

    match (from, to) {
        (a, b) if a == b => Ok(None),
        (Pending, Active) => Ok(Some(TransitionKind::Approval)),
        (Suspended, Active) => Ok(Some(TransitionKind::Reactivation)),
        (Active, Suspended) | (Pending, Suspended) => Ok(Some(TransitionKind::Suspension)),
        (from, Pending) => Err(CoreError::ValidationError(format!(
            "an agent cannot be moved from {} back to pending",
            from
        ))),
        // Every remaining pair has equal states and was handled above
        (from, to) => Err(CoreError::ValidationError(format!(
            "unsupported transition from {} to {}",
            from, to
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permitted_transitions() {
        assert_eq!(plan(AgentStatus::Pending, AgentStatus::Active), Ok(Some(TransitionKind::Approval)));
        assert_eq!(plan(AgentStatus::Suspended, AgentStatus::Active), Ok(Some(TransitionKind::Reactivation)));
        assert_eq!(plan(AgentStatus::Active, AgentStatus::Suspended), Ok(Some(TransitionKind::Suspension)));
        assert_eq!(plan(AgentStatus::Pending, AgentStatus::Suspended), Ok(Some(TransitionKind::Suspension)));
    }

    #[test]
    fn test_same_state_is_noop() {
        for status in [AgentStatus::Pending, AgentStatus::Active, AgentStatus::Suspended] {
            assert_eq!(plan(status, status), Ok(None));
        }
    }

    #[test]
    fn test_back_to_pending_rejected() {
        assert!(matches!(
            plan(AgentStatus::Active, AgentStatus::Pending),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            plan(AgentStatus::Suspended, AgentStatus::Pending),
            Err(CoreError::ValidationError(_))
        ));
    }
}
