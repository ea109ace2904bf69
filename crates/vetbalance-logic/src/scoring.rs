//! Session scoring and the summary record every statistic is built from.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::constants::{CaseId, StudentId};
use crate::simulation::{Decision, SimulationState};
use crate::status::SessionStatus;

/// Persisted outcome of one play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: u64,
    pub student_id: StudentId,
    pub case_id: CaseId,
    pub status: SessionStatus,
    pub elapsed_seconds: u32,
    pub final_hp: u8,
    pub score: u32,
    pub correct_decisions: u32,
    pub incorrect_decisions: u32,
    /// Microseconds since the Unix epoch.
    pub finished_at_micros: i64,
}

impl SessionSummary {
    /// Summarize a finished state and its decision log, computing the score.
    pub fn from_state(
        session_id: u64,
        student_id: StudentId,
        case_id: CaseId,
        state: &SimulationState,
        decisions: &[Decision],
        finished_at_micros: i64,
        config: &SimulationConfig,
    ) -> Self {
        let correct = decisions.iter().filter(|d| d.is_correct()).count() as u32;
        let incorrect = decisions.len() as u32 - correct;
        let mut summary = Self {
            session_id,
            student_id,
            case_id,
            status: state.status,
            elapsed_seconds: state.elapsed_seconds,
            final_hp: state.hp,
            score: 0,
            correct_decisions: correct,
            incorrect_decisions: incorrect,
            finished_at_micros,
        };
        summary.score = score_session(&summary, config);
        summary
    }

    pub fn is_win(&self) -> bool {
        self.status == SessionStatus::Won
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }
}

/// Score a session. Winning earns a base plus a bonus for time left;
/// every decision adds or subtracts regardless of outcome. Never negative.
pub fn score_session(summary: &SessionSummary, config: &SimulationConfig) -> u32 {
    let mut score: i64 = 0;
    if summary.is_win() {
        let remaining = config.time_limit_secs.saturating_sub(summary.elapsed_seconds);
        score += i64::from(config.score_win_base);
        score += i64::from(remaining) * i64::from(config.score_time_bonus_per_sec);
    }
    score += i64::from(summary.correct_decisions) * i64::from(config.score_per_correct);
    score -= i64::from(summary.incorrect_decisions) * i64::from(config.score_per_incorrect);
    score.clamp(0, i64::from(u32::MAX)) as u32
}
