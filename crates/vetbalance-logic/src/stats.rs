//! Performance statistics over finished sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::CaseId;
use crate::scoring::SessionSummary;

/// Per-case slice of a student's (or class's) performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStats {
    pub played: u32,
    pub wins: u32,
    pub best_score: u32,
    pub fastest_win_secs: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    /// Wins over total, in [0.0, 1.0]. Zero when nothing has been played.
    pub win_rate: f64,
    pub average_duration_secs: f64,
    pub best_score: u32,
    pub total_score: u64,
    pub fastest_win_secs: Option<u32>,
    pub per_case: BTreeMap<CaseId, CaseStats>,
}

impl PerformanceStats {
    /// Aggregate the finished sessions in `sessions`; in-progress ones are skipped.
    pub fn from_sessions(sessions: &[SessionSummary]) -> Self {
        let mut stats = Self::default();
        let mut duration_sum: u64 = 0;

        for s in sessions.iter().filter(|s| s.is_finished()) {
            stats.total += 1;
            duration_sum += u64::from(s.elapsed_seconds);
            stats.total_score += u64::from(s.score);
            stats.best_score = stats.best_score.max(s.score);

            let case = stats.per_case.entry(s.case_id).or_default();
            case.played += 1;
            case.best_score = case.best_score.max(s.score);

            if s.is_win() {
                stats.wins += 1;
                case.wins += 1;
                stats.fastest_win_secs = min_some(stats.fastest_win_secs, s.elapsed_seconds);
                case.fastest_win_secs = min_some(case.fastest_win_secs, s.elapsed_seconds);
            } else {
                stats.losses += 1;
            }
        }

        if stats.total > 0 {
            stats.win_rate = f64::from(stats.wins) / f64::from(stats.total);
            stats.average_duration_secs = duration_sum as f64 / f64::from(stats.total);
        }
        stats
    }

    /// Number of distinct cases played.
    pub fn distinct_cases(&self) -> usize {
        self.per_case.len()
    }
}

fn min_some(current: Option<u32>, candidate: u32) -> Option<u32> {
    Some(current.map_or(candidate, |c| c.min(candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SessionStatus;

    fn session(case_id: CaseId, status: SessionStatus, secs: u32, score: u32) -> SessionSummary {
        SessionSummary {
            session_id: 0,
            student_id: 1,
            case_id,
            status,
            elapsed_seconds: secs,
            final_hp: 0,
            score,
            correct_decisions: 0,
            incorrect_decisions: 0,
            finished_at_micros: 0,
        }
    }

    #[test]
    fn test_empty() {
        let s = PerformanceStats::from_sessions(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.fastest_win_secs, None);
    }

    #[test]
    fn test_aggregates() {
        let s = PerformanceStats::from_sessions(&[
            session(1, SessionStatus::Won, 120, 800),
            session(1, SessionStatus::Won, 90, 900),
            session(2, SessionStatus::Lost, 300, 50),
            session(3, SessionStatus::Lost, 30, 0),
        ]);
        assert_eq!(s.total, 4);
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 2);
        assert!((s.win_rate - 0.5).abs() < 1e-9);
        assert!((s.average_duration_secs - 135.0).abs() < 1e-9);
        assert_eq!(s.best_score, 900);
        assert_eq!(s.total_score, 1750);
        assert_eq!(s.fastest_win_secs, Some(90));
        assert_eq!(s.distinct_cases(), 3);
        assert_eq!(s.per_case[&1].wins, 2);
        assert_eq!(s.per_case[&1].fastest_win_secs, Some(90));
        assert_eq!(s.per_case[&2].fastest_win_secs, None);
    }

    #[test]
    fn test_in_progress_sessions_ignored() {
        let s = PerformanceStats::from_sessions(&[
            session(1, SessionStatus::Playing, 60, 0),
            session(1, SessionStatus::Lost, 300, 0),
        ]);
        assert_eq!(s.total, 1);
        assert_eq!(s.losses, 1);
    }
}
