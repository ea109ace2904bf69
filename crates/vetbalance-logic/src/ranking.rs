//! Leaderboards (all-time and weekly) and rank-change notifications.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::StudentId;
use crate::scoring::SessionSummary;

const MICROS_PER_WEEK: i64 = 7 * 24 * 60 * 60 * 1_000_000;

/// Which sessions a leaderboard counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderboardWindow {
    AllTime,
    /// The Monday-to-Monday UTC week containing this instant (µs since epoch).
    Week(i64),
}

impl LeaderboardWindow {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::AllTime => 0,
            Self::Week(_) => 1,
        }
    }

    fn contains(self, micros: i64) -> bool {
        match self {
            Self::AllTime => true,
            Self::Week(at) => match week_bounds(at) {
                Some((start, end)) => micros >= start && micros < end,
                None => false,
            },
        }
    }
}

/// Start (inclusive) and end (exclusive) of the UTC week containing `micros`,
/// with weeks starting Monday 00:00.
pub fn week_bounds(micros: i64) -> Option<(i64, i64)> {
    let at = DateTime::<Utc>::from_timestamp_micros(micros)?;
    let date = at.date_naive();
    let monday = date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()));
    let start = monday.and_time(NaiveTime::MIN).and_utc().timestamp_micros();
    Some((start, start + MICROS_PER_WEEK))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub position: u32,
    pub student_id: StudentId,
    pub sessions: u32,
    pub wins: u32,
    pub total_score: u64,
    pub fastest_win_secs: Option<u32>,
}

/// Rank students over finished sessions in `window`.
///
/// Order: most wins, then highest total score, then fastest win, then
/// lowest student id so ties are stable.
pub fn build_leaderboard(
    sessions: &[SessionSummary],
    window: LeaderboardWindow,
) -> Vec<LeaderboardEntry> {
    let mut by_student: BTreeMap<StudentId, LeaderboardEntry> = BTreeMap::new();

    for s in sessions
        .iter()
        .filter(|s| s.is_finished() && window.contains(s.finished_at_micros))
    {
        let entry = by_student
            .entry(s.student_id)
            .or_insert_with(|| LeaderboardEntry {
                position: 0,
                student_id: s.student_id,
                sessions: 0,
                wins: 0,
                total_score: 0,
                fastest_win_secs: None,
            });
        entry.sessions += 1;
        entry.total_score += u64::from(s.score);
        if s.is_win() {
            entry.wins += 1;
            entry.fastest_win_secs = Some(
                entry
                    .fastest_win_secs
                    .map_or(s.elapsed_seconds, |f| f.min(s.elapsed_seconds)),
            );
        }
    }

    let mut entries: Vec<LeaderboardEntry> = by_student.into_values().collect();
    entries.sort_by(compare_entries);
    for (i, e) in entries.iter_mut().enumerate() {
        e.position = i as u32 + 1;
    }
    entries
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then(b.total_score.cmp(&a.total_score))
        .then_with(|| match (a.fastest_win_secs, b.fastest_win_secs) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then(a.student_id.cmp(&b.student_id))
}

/// A student's movement between two leaderboard snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub student_id: StudentId,
    /// `None` if the student was not on the previous board.
    pub from: Option<u32>,
    pub to: u32,
}

impl RankChange {
    pub fn moved_up(&self) -> bool {
        self.from.is_some_and(|f| self.to < f)
    }

    pub fn message(&self) -> String {
        match self.from {
            None => format!("You entered the leaderboard at #{}", self.to),
            Some(f) if self.to < f => format!("You climbed from #{} to #{}!", f, self.to),
            Some(f) => format!("You dropped from #{} to #{}", f, self.to),
        }
    }
}

/// Students whose position changed (or who newly appear) in `current`.
pub fn rank_changes(previous: &[LeaderboardEntry], current: &[LeaderboardEntry]) -> Vec<RankChange> {
    let before: BTreeMap<StudentId, u32> = previous
        .iter()
        .map(|e| (e.student_id, e.position))
        .collect();
    current
        .iter()
        .filter_map(|e| {
            let from = before.get(&e.student_id).copied();
            (from != Some(e.position)).then_some(RankChange {
                student_id: e.student_id,
                from,
                to: e.position,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SessionStatus;

    // 2024-01-03 12:00:00 UTC, a Wednesday.
    const WED: i64 = 1_704_283_200_000_000;
    const DAY: i64 = 24 * 60 * 60 * 1_000_000;

    fn session(student_id: StudentId, won: bool, secs: u32, score: u32, at: i64) -> SessionSummary {
        SessionSummary {
            session_id: 0,
            student_id,
            case_id: 1,
            status: if won { SessionStatus::Won } else { SessionStatus::Lost },
            elapsed_seconds: secs,
            final_hp: 0,
            score,
            correct_decisions: 0,
            incorrect_decisions: 0,
            finished_at_micros: at,
        }
    }

    #[test]
    fn test_week_bounds_monday_start() {
        let (start, end) = week_bounds(WED).unwrap();
        // Monday 2024-01-01 00:00 UTC
        assert_eq!(start, 1_704_067_200_000_000);
        assert_eq!(end - start, 7 * DAY);
        // Monday midnight belongs to its own week.
        assert_eq!(week_bounds(start).unwrap().0, start);
        // One microsecond earlier is the previous week.
        assert_eq!(week_bounds(start - 1).unwrap().1, start);
    }

    #[test]
    fn test_ordering() {
        let board = build_leaderboard(
            &[
                session(1, true, 200, 700, WED),
                session(2, true, 100, 900, WED),
                session(2, true, 150, 800, WED),
                session(3, true, 100, 700, WED),
                session(4, false, 300, 50, WED),
            ],
            LeaderboardWindow::AllTime,
        );
        let ids: Vec<_> = board.iter().map(|e| e.student_id).collect();
        // 2 has most wins; 1 and 3 tie on wins and score, 3 won faster.
        assert_eq!(ids, vec![2, 3, 1, 4]);
        assert_eq!(board[0].position, 1);
        assert_eq!(board[0].wins, 2);
        assert_eq!(board[0].fastest_win_secs, Some(100));
        assert_eq!(board[3].fastest_win_secs, None);
    }

    #[test]
    fn test_weekly_window_filters() {
        let sessions = [
            session(1, true, 100, 900, WED),
            session(2, true, 100, 900, WED - 7 * DAY),
            session(2, true, 100, 900, WED - 8 * DAY),
        ];
        let weekly = build_leaderboard(&sessions, LeaderboardWindow::Week(WED));
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].student_id, 1);
        let all = build_leaderboard(&sessions, LeaderboardWindow::AllTime);
        assert_eq!(all[0].student_id, 2);
    }

    #[test]
    fn test_rank_changes() {
        let before = build_leaderboard(
            &[session(1, true, 100, 900, WED), session(2, false, 300, 0, WED)],
            LeaderboardWindow::AllTime,
        );
        let after = build_leaderboard(
            &[
                session(1, true, 100, 900, WED),
                session(2, true, 90, 900, WED),
                session(2, true, 90, 900, WED),
                session(3, false, 300, 0, WED),
            ],
            LeaderboardWindow::AllTime,
        );
        let changes = rank_changes(&before, &after);
        assert_eq!(changes.len(), 3);
        let c2 = changes.iter().find(|c| c.student_id == 2).unwrap();
        assert!(c2.moved_up());
        assert_eq!(c2.message(), "You climbed from #2 to #1!");
        let c1 = changes.iter().find(|c| c.student_id == 1).unwrap();
        assert_eq!(c1.message(), "You dropped from #1 to #2");
        let c3 = changes.iter().find(|c| c.student_id == 3).unwrap();
        assert_eq!(c3.from, None);
        assert_eq!(c3.message(), "You entered the leaderboard at #3");
    }

    #[test]
    fn test_unchanged_positions_are_silent() {
        let board = build_leaderboard(&[session(1, true, 100, 900, WED)], LeaderboardWindow::AllTime);
        assert!(rank_changes(&board, &board).is_empty());
    }
}
