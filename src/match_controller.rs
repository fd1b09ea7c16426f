//! Match state machine: `Pending -> Running -> Ended`, monotonic, terminal
//! once `Ended`. A small enum-plus-transition type rather than a generic
//! FSM crate — there are exactly three states and four end reasons,
//! nothing justifies more machinery.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::sim::player::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    KillTarget,
    TimeLimit,
    Manual,
    Disconnect,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::KillTarget => "kill_target",
            EndReason::TimeLimit => "time_limit",
            EndReason::Manual => "manual",
            EndReason::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchState {
    Pending,
    Running { started_at: Instant },
    Ended { reason: EndReason },
}

pub struct MatchController {
    state: MatchState,
    kill_target: u32,
    duration: Duration,
}

impl MatchController {
    pub fn new(kill_target: u32, duration: Duration) -> Self {
        Self { state: MatchState::Pending, kill_target, duration }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, MatchState::Running { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, MatchState::Ended { .. })
    }

    /// Quorum reached in the owning room: Pending -> Running. A no-op once
    /// the match has moved past Pending (monotonic transition).
    pub fn start(&mut self, now: Instant) {
        if matches!(self.state, MatchState::Pending) {
            self.state = MatchState::Running { started_at: now };
        }
    }

    /// Checked while running, both right after a kill lands and on the
    /// match-timer cadence: kill target or time limit reached ends the
    /// match. Returns the reason if it just ended this call.
    pub fn check_end_conditions(
        &mut self,
        now: Instant,
        kills: &HashMap<PlayerId, u32>,
    ) -> Option<EndReason> {
        let MatchState::Running { started_at } = self.state else {
            return None;
        };

        if kills.values().any(|&k| k >= self.kill_target) {
            self.state = MatchState::Ended { reason: EndReason::KillTarget };
            return Some(EndReason::KillTarget);
        }

        if now.saturating_duration_since(started_at) >= self.duration {
            self.state = MatchState::Ended { reason: EndReason::TimeLimit };
            return Some(EndReason::TimeLimit);
        }

        None
    }

    /// A disconnect or an administrative action ends the match out of
    /// band. Idempotent once already ended.
    pub fn end(&mut self, reason: EndReason) {
        if !self.is_ended() {
            self.state = MatchState::Ended { reason };
        }
    }

    pub fn remaining_seconds(&self, now: Instant) -> u64 {
        match self.state {
            MatchState::Running { started_at } => {
                let elapsed = now.saturating_duration_since(started_at);
                self.duration.saturating_sub(elapsed).as_secs()
            }
            MatchState::Pending => self.duration.as_secs(),
            MatchState::Ended { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_running_is_one_way() {
        let mut ctl = MatchController::new(5, Duration::from_secs(60));
        let now = Instant::now();
        ctl.start(now);
        assert!(ctl.is_running());
        ctl.start(now + Duration::from_secs(1));
        assert!(matches!(ctl.state(), MatchState::Running { started_at } if *started_at == now));
    }

    #[test]
    fn kill_target_ends_match() {
        let mut ctl = MatchController::new(3, Duration::from_secs(300));
        let now = Instant::now();
        ctl.start(now);
        let mut kills = HashMap::new();
        kills.insert(1u64, 3);
        let reason = ctl.check_end_conditions(now, &kills);
        assert_eq!(reason, Some(EndReason::KillTarget));
        assert!(ctl.is_ended());
    }

    #[test]
    fn time_limit_ends_match_when_kills_short() {
        let mut ctl = MatchController::new(20, Duration::from_secs(10));
        let now = Instant::now();
        ctl.start(now);
        let kills = HashMap::new();
        assert_eq!(ctl.check_end_conditions(now + Duration::from_secs(5), &kills), None);
        let reason = ctl.check_end_conditions(now + Duration::from_secs(11), &kills);
        assert_eq!(reason, Some(EndReason::TimeLimit));
    }

    #[test]
    fn ended_state_is_terminal() {
        let mut ctl = MatchController::new(3, Duration::from_secs(300));
        ctl.end(EndReason::Disconnect);
        ctl.start(Instant::now());
        assert!(ctl.is_ended());
        ctl.end(EndReason::Manual);
        assert!(matches!(ctl.state(), MatchState::Ended { reason: EndReason::Disconnect }));
    }
}
