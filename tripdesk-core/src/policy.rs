use serde::{Deserialize, Serialize};

/// The three status transitions that have side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Approval,
    Reactivation,
    Suspension,
}

/// Which transitions get their persisted status reverted when the closing email fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// Revert every transition whose notification failed.
    #[default]
    AllTransitions,
    /// Revert only first-time approvals; reactivation and suspension stand.
    FirstApprovalOnly,
}

impl CompensationPolicy {
    pub fn compensates(&self, kind: TransitionKind) -> bool {
        match self {
            CompensationPolicy::AllTransitions => true,
            CompensationPolicy::FirstApprovalOnly => kind == TransitionKind::Approval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        let all = CompensationPolicy::AllTransitions;
        assert!(all.compensates(TransitionKind::Approval));
        assert!(all.compensates(TransitionKind::Reactivation));
        assert!(all.compensates(TransitionKind::Suspension));

        let legacy = CompensationPolicy::FirstApprovalOnly;
        assert!(legacy.compensates(TransitionKind::Approval));
        assert!(!legacy.compensates(TransitionKind::Reactivation));
        assert!(!legacy.compensates(TransitionKind::Suspension));
    }

    #[test]
    fn test_config_names() {
        let p: CompensationPolicy = serde_json::from_str("\"first_approval_only\"").unwrap();
        assert_eq!(p, CompensationPolicy::FirstApprovalOnly);
        assert_eq!(CompensationPolicy::default(), CompensationPolicy::AllTransitions);
    }
}
