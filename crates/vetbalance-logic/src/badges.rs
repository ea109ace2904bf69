//! Achievement badges earned from session history.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scoring::SessionSummary;

/// Wins at or under this many seconds earn `SpeedRunner`.
pub const SPEED_RUN_SECS: u32 = 60;
/// Consecutive wins needed for `WinStreak`.
pub const STREAK_LENGTH: usize = 3;
/// Total wins needed for `FiveWins`.
pub const VETERAN_WINS: usize = 5;
/// Distinct cases needed for `CaseExplorer`.
pub const EXPLORER_CASES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BadgeKind {
    FirstWin = 0,
    FiveWins = 1,
    SpeedRunner = 2,
    FlawlessTreatment = 3,
    WinStreak = 4,
    CaseExplorer = 5,
}

impl BadgeKind {
    pub const ALL: [BadgeKind; 6] = [
        Self::FirstWin,
        Self::FiveWins,
        Self::SpeedRunner,
        Self::FlawlessTreatment,
        Self::WinStreak,
        Self::CaseExplorer,
    ];

    pub fn from_u8(val: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| *b as u8 == val)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::FirstWin => "First Stabilization",
            Self::FiveWins => "Seasoned Clinician",
            Self::SpeedRunner => "Rapid Response",
            Self::FlawlessTreatment => "Flawless Treatment",
            Self::WinStreak => "Hot Streak",
            Self::CaseExplorer => "Case Explorer",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FirstWin => "Stabilize a patient for the first time",
            Self::FiveWins => "Stabilize five patients",
            Self::SpeedRunner => "Stabilize a patient within one minute",
            Self::FlawlessTreatment => "Win without a single contraindicated treatment",
            Self::WinStreak => "Win three sessions in a row",
            Self::CaseExplorer => "Play five different clinical cases",
        }
    }

    fn earned(self, history: &[&SessionSummary]) -> bool {
        let wins = || history.iter().filter(|s| s.is_win());
        match self {
            Self::FirstWin => wins().next().is_some(),
            Self::FiveWins => wins().count() >= VETERAN_WINS,
            Self::SpeedRunner => wins().any(|s| s.elapsed_seconds <= SPEED_RUN_SECS),
            Self::FlawlessTreatment => wins().any(|s| s.incorrect_decisions == 0),
            Self::WinStreak => {
                history.len() >= STREAK_LENGTH
                    && history[history.len() - STREAK_LENGTH..]
                        .iter()
                        .all(|s| s.is_win())
            }
            Self::CaseExplorer => {
                history
                    .iter()
                    .map(|s| s.case_id)
                    .collect::<BTreeSet<_>>()
                    .len()
                    >= EXPLORER_CASES
            }
        }
    }
}

/// Badges earned by a student's finished sessions that are not yet awarded.
///
/// `history` may be in any order; sessions are sorted by finish time so the
/// streak check looks at the most recent ones.
pub fn evaluate_badges(history: &[SessionSummary], already_awarded: &[BadgeKind]) -> Vec<BadgeKind> {
    let mut finished: Vec<&SessionSummary> = history.iter().filter(|s| s.is_finished()).collect();
    finished.sort_by_key(|s| (s.finished_at_micros, s.session_id));

    BadgeKind::ALL
        .into_iter()
        .filter(|b| !already_awarded.contains(b))
        .filter(|b| b.earned(&finished))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CaseId;
    use crate::status::SessionStatus;

    fn s(id: u64, case_id: CaseId, won: bool, secs: u32, incorrect: u32) -> SessionSummary {
        SessionSummary {
            session_id: id,
            student_id: 1,
            case_id,
            status: if won { SessionStatus::Won } else { SessionStatus::Lost },
            elapsed_seconds: secs,
            final_hp: if won { 100 } else { 0 },
            score: 0,
            correct_decisions: 3,
            incorrect_decisions: incorrect,
            finished_at_micros: id as i64 * 1_000,
        }
    }

    #[test]
    fn test_no_history_no_badges() {
        assert!(evaluate_badges(&[], &[]).is_empty());
    }

    #[test]
    fn test_first_win_and_flawless() {
        let earned = evaluate_badges(&[s(1, 1, true, 200, 0)], &[]);
        assert_eq!(earned, vec![BadgeKind::FirstWin, BadgeKind::FlawlessTreatment]);
    }

    #[test]
    fn test_already_awarded_not_repeated() {
        let earned = evaluate_badges(
            &[s(1, 1, true, 200, 1)],
            &[BadgeKind::FirstWin],
        );
        assert!(earned.is_empty());
    }

    #[test]
    fn test_speed_runner() {
        let earned = evaluate_badges(&[s(1, 1, true, 60, 2)], &[BadgeKind::FirstWin]);
        assert_eq!(earned, vec![BadgeKind::SpeedRunner]);
    }

    #[test]
    fn test_streak_uses_most_recent() {
        // Given out of order: the latest three by finish time are wins.
        let history = [
            s(4, 1, true, 200, 1),
            s(1, 1, false, 300, 1),
            s(3, 1, true, 200, 1),
            s(2, 1, true, 200, 1),
        ];
        assert!(evaluate_badges(&history, &[]).contains(&BadgeKind::WinStreak));

        let broken = [
            s(1, 1, true, 200, 1),
            s(2, 1, true, 200, 1),
            s(3, 1, false, 300, 1),
        ];
        assert!(!evaluate_badges(&broken, &[]).contains(&BadgeKind::WinStreak));
    }

    #[test]
    fn test_explorer_and_veteran() {
        let history: Vec<_> = (1..=5).map(|i| s(i, i, true, 200, 1)).collect();
        let earned = evaluate_badges(&history, &[]);
        assert!(earned.contains(&BadgeKind::CaseExplorer));
        assert!(earned.contains(&BadgeKind::FiveWins));
    }

    #[test]
    fn test_u8_codes() {
        for b in BadgeKind::ALL {
            assert_eq!(BadgeKind::from_u8(b as u8), Some(b));
        }
        assert_eq!(BadgeKind::from_u8(42), None);
    }
}
