use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-delivery progress of the dispatcher (LDA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    /// Envelope decoded and task parsed
    Received,
    /// Task merged into the store
    Persisted,
    /// Task published to the delegation topic
    Delegated,
    /// Task marked IN_PROGRESS and assigned
    Confirmed,
}

impl DispatcherState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// The state a successful step leads to
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Persisted),
            Self::Persisted => Some(Self::Delegated),
            Self::Delegated => Some(Self::Confirmed),
            Self::Confirmed => None,
        }
    }
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Persisted => write!(f, "persisted"),
            Self::Delegated => write!(f, "delegated"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for DispatcherState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "persisted" => Ok(Self::Persisted),
            "delegated" => Ok(Self::Delegated),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(format!("Invalid dispatcher state: {s}")),
        }
    }
}

/// Per-delivery progress of the worker (SDA-BE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Envelope decoded and task parsed
    Received,
    /// No final report exists yet for the task
    Checked,
    /// Work is executing
    InProgress,
    /// Final report persisted and published
    Reported,
    /// Task marked COMPLETED
    Terminal,
}

impl WorkerState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Once past the idempotency gate, a failure marks the task FAILED
    pub fn is_past_gate(&self) -> bool {
        !matches!(self, Self::Received)
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Checked),
            Self::Checked => Some(Self::InProgress),
            Self::InProgress => Some(Self::Reported),
            Self::Reported => Some(Self::Terminal),
            Self::Terminal => None,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Checked => write!(f, "checked"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Reported => write!(f, "reported"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

impl std::str::FromStr for WorkerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "checked" => Ok(Self::Checked),
            "in_progress" => Ok(Self::InProgress),
            "reported" => Ok(Self::Reported),
            "terminal" => Ok(Self::Terminal),
            _ => Err(format!("Invalid worker state: {s}")),
        }
    }
}

impl Default for DispatcherState {
    fn default() -> Self {
        Self::Received
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_states_advance_in_order() {
        let mut state = DispatcherState::default();
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            state = next;
            visited.push(state);
        }

        assert_eq!(
            visited,
            vec![
                DispatcherState::Received,
                DispatcherState::Persisted,
                DispatcherState::Delegated,
                DispatcherState::Confirmed,
            ]
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn test_worker_terminal_and_gate() {
        assert!(WorkerState::Terminal.is_terminal());
        assert!(!WorkerState::Reported.is_terminal());
        assert!(WorkerState::Terminal.next().is_none());

        assert!(!WorkerState::Received.is_past_gate());
        assert!(WorkerState::Checked.is_past_gate());
        assert!(WorkerState::InProgress.is_past_gate());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(WorkerState::InProgress.to_string(), "in_progress");
        assert_eq!(
            "reported".parse::<WorkerState>().unwrap(),
            WorkerState::Reported
        );
        assert_eq!(DispatcherState::Delegated.to_string(), "delegated");
        assert!("done".parse::<DispatcherState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&WorkerState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let state: DispatcherState = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(state, DispatcherState::Confirmed);
    }
}
