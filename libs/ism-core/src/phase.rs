//! The closed set of execution phases (spec §3, §4.4).

use ism_errors::IsmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPhase {
    Starting,
    Running,
    NormalShutdown,
    EmergencyShutdown,
    Stopped,
}

impl ExecutionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::Starting => "STARTING",
            ExecutionPhase::Running => "RUNNING",
            ExecutionPhase::NormalShutdown => "NORMAL_SHUTDOWN",
            ExecutionPhase::EmergencyShutdown => "EMERGENCY_SHUTDOWN",
            ExecutionPhase::Stopped => "STOPPED",
        }
    }

    /// All phases, in the order `phases` is seeded (spec §3).
    pub fn all() -> [ExecutionPhase; 5] {
        [
            ExecutionPhase::Starting,
            ExecutionPhase::Running,
            ExecutionPhase::NormalShutdown,
            ExecutionPhase::EmergencyShutdown,
            ExecutionPhase::Stopped,
        ]
    }

    /// Parses a phase name, rejecting anything outside the closed set with
    /// `ExecutionPhaseUnrecognised` (spec §4.3, §7). Note: `"ALL"` is not a phase value
    /// here — it is only meaningful as an action's eligibility marker; see
    /// [`ActionPhase`].
    pub fn parse(s: &str) -> Result<Self, IsmError> {
        match s {
            "STARTING" => Ok(ExecutionPhase::Starting),
            "RUNNING" => Ok(ExecutionPhase::Running),
            "NORMAL_SHUTDOWN" => Ok(ExecutionPhase::NormalShutdown),
            "EMERGENCY_SHUTDOWN" => Ok(ExecutionPhase::EmergencyShutdown),
            "STOPPED" => Ok(ExecutionPhase::Stopped),
            other => Err(IsmError::ExecutionPhaseUnrecognised(other.to_string())),
        }
    }
}

/// An action's eligibility: either a specific phase, or `"ALL"` meaning every phase
/// (spec §3's `actions.execution_phase` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Specific(ExecutionPhase),
    All,
}

impl ActionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPhase::Specific(p) => p.as_str(),
            ActionPhase::All => "ALL",
        }
    }

    pub fn matches(&self, current: ExecutionPhase) -> bool {
        match self {
            ActionPhase::Specific(p) => *p == current,
            ActionPhase::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_phase() {
        for p in ExecutionPhase::all() {
            assert_eq!(ExecutionPhase::parse(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = ExecutionPhase::parse("SLEEPING").unwrap_err();
        assert!(matches!(err, IsmError::ExecutionPhaseUnrecognised(_)));
    }

    #[test]
    fn all_matches_every_phase() {
        for p in ExecutionPhase::all() {
            assert!(ActionPhase::All.matches(p));
        }
    }

    #[test]
    fn specific_matches_only_itself() {
        let eligible = ActionPhase::Specific(ExecutionPhase::Running);
        assert!(eligible.matches(ExecutionPhase::Running));
        assert!(!eligible.matches(ExecutionPhase::Starting));
    }
}
