//! Class reports for the professor dashboard, with CSV and JSON export.

use serde::{Deserialize, Serialize};

use crate::constants::StudentId;
use crate::scoring::SessionSummary;
use crate::stats::PerformanceStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReportRow {
    pub student_id: StudentId,
    pub student_name: String,
    pub sessions: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub best_score: u32,
    pub average_duration_secs: f64,
}

/// One row per roster student (in roster order), including students who
/// have not played yet.
pub fn class_report(roster: &[(StudentId, String)], sessions: &[SessionSummary]) -> Vec<ClassReportRow> {
    roster
        .iter()
        .map(|(student_id, name)| {
            let own: Vec<SessionSummary> = sessions
                .iter()
                .filter(|s| s.student_id == *student_id)
                .cloned()
                .collect();
            let stats = PerformanceStats::from_sessions(&own);
            ClassReportRow {
                student_id: *student_id,
                student_name: name.clone(),
                sessions: stats.total,
                wins: stats.wins,
                losses: stats.losses,
                win_rate: stats.win_rate,
                best_score: stats.best_score,
                average_duration_secs: stats.average_duration_secs,
            }
        })
        .collect()
}

const CSV_HEADER: &str =
    "student_id,student_name,sessions,wins,losses,win_rate,best_score,average_duration_secs";

/// RFC 4180 field quoting.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(rows: &[ClassReportRow]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{:.3},{},{:.1}\n",
            r.student_id,
            csv_field(&r.student_name),
            r.sessions,
            r.wins,
            r.losses,
            r.win_rate,
            r.best_score,
            r.average_duration_secs
        ));
    }
    out
}

pub fn to_json(rows: &[ClassReportRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SessionStatus;

    fn session(student_id: StudentId, won: bool, secs: u32, score: u32) -> SessionSummary {
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
            finished_at_micros: 0,
        }
    }

    fn roster() -> Vec<(StudentId, String)> {
        vec![(1, "Ana Souza".into()), (2, "Silva, João".into()), (3, "Idle".into())]
    }

    #[test]
    fn test_report_rows() {
        let rows = class_report(
            &roster(),
            &[
                session(1, true, 100, 900),
                session(1, false, 300, 40),
                session(2, true, 200, 700),
            ],
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sessions, 2);
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[0].best_score, 900);
        assert!((rows[0].average_duration_secs - 200.0).abs() < 1e-9);
        assert_eq!(rows[2].sessions, 0);
        assert_eq!(rows[2].win_rate, 0.0);
    }

    #[test]
    fn test_csv_quotes_names() {
        let rows = class_report(&roster(), &[session(2, true, 200, 700)]);
        let csv = to_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,Ana Souza,0,0,0,0.000,0,0.0");
        assert_eq!(lines[2], "2,\"Silva, João\",1,1,0,1.000,700,200.0");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_csv_escapes_quotes() {
        assert_eq!(csv_field("Dr \"Vet\""), "\"Dr \"\"Vet\"\"\"");
    }

    #[test]
    fn test_json_export() {
        let rows = class_report(&roster(), &[]);
        let json = to_json(&rows).unwrap();
        let back: Vec<ClassReportRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rows);
    }
}
