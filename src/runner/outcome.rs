use std::fmt;

use serde::Serialize;

/// Terminal classification of one finished scenario. Assigned exactly once,
/// after the loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    Crashed,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Failed => write!(f, "failed"),
            Status::Crashed => write!(f, "crashed"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// Transport-death phrases: the subprocess or its connection went away.
const CRASH_MARKERS: &[&str] = &[
    "connection closed",
    "connection reset",
    "connection refused",
    "timed out",
    "transport closed",
    "process exited",
];

/// Setup problems: the session never became usable, or a call could not be
/// executed at all.
const SETUP_MARKERS: &[&str] = &[
    "tool execution failed",
    "not initialized",
    "no tools",
];

/// Maps a scenario's terminal error text (when present) and goal outcome to
/// its status. Rules are ordered: crash markers take precedence over setup
/// markers, which take precedence over a generic failure.
pub fn classify_outcome(goal_met: bool, error: &str) -> Status {
    if !error.is_empty() {
        let error = error.to_lowercase();
        if CRASH_MARKERS.iter().any(|marker| error.contains(marker)) {
            return Status::Crashed;
        }
        if SETUP_MARKERS.iter().any(|marker| error.contains(marker)) {
            return Status::Error;
        }
        return Status::Failed;
    }
    if goal_met {
        Status::Success
    } else {
        Status::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_loss_is_a_crash() {
        assert_eq!(
            classify_outcome(false, "McpError: Connection closed unexpectedly"),
            Status::Crashed
        );
        assert_eq!(
            classify_outcome(false, "request timed out after 5000ms"),
            Status::Crashed
        );
    }

    #[test]
    fn setup_problems_are_errors() {
        assert_eq!(
            classify_outcome(false, "Tool execution failed"),
            Status::Error
        );
        assert_eq!(
            classify_outcome(false, "Client not initialized"),
            Status::Error
        );
        assert_eq!(
            classify_outcome(false, "Provider 'X' discovered no tools"),
            Status::Error
        );
    }

    #[test]
    fn crash_markers_win_over_setup_markers() {
        assert_eq!(
            classify_outcome(false, "Tool execution failed: connection closed"),
            Status::Crashed
        );
    }

    #[test]
    fn other_errors_and_unmet_goals_are_failures() {
        assert_eq!(
            classify_outcome(false, "element #submit not found"),
            Status::Failed
        );
        assert_eq!(classify_outcome(false, ""), Status::Failed);
    }

    #[test]
    fn clean_run_with_goal_met_is_a_success() {
        assert_eq!(classify_outcome(true, ""), Status::Success);
    }
}
