//! Canonical session status vocabulary.
//!
//! Sessions are stored as `u8` codes. Older exports used several spellings
//! for the same outcome ("won", "vitoria", "concluida"); `parse_label`
//! folds all of them into the three canonical states.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionStatus {
    Playing = 0,
    Won = 1,
    Lost = 2,
}

impl SessionStatus {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Playing),
            1 => Some(Self::Won),
            2 => Some(Self::Lost),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    /// Accepts canonical and legacy labels, case-insensitively.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "playing" | "em_andamento" | "in_progress" => Some(Self::Playing),
            "won" | "vitoria" | "vitória" | "concluida" | "concluída" => Some(Self::Won),
            "lost" | "derrota" => Some(Self::Lost),
            _ => None,
        }
    }

    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Playing)
    }
}

/// Why a session ended in `Lost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LossReason {
    HpDepleted = 0,
    TimeExpired = 1,
    Abandoned = 2,
}

impl LossReason {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::HpDepleted),
            1 => Some(Self::TimeExpired),
            2 => Some(Self::Abandoned),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::HpDepleted => "the patient's condition collapsed",
            Self::TimeExpired => "time ran out",
            Self::Abandoned => "the session was abandoned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_roundtrip() {
        for s in [SessionStatus::Playing, SessionStatus::Won, SessionStatus::Lost] {
            assert_eq!(SessionStatus::from_u8(s.as_u8()), Some(s));
        }
        assert_eq!(SessionStatus::from_u8(3), None);
    }

    #[test]
    fn test_legacy_labels_fold() {
        assert_eq!(SessionStatus::parse_label("vitoria"), Some(SessionStatus::Won));
        assert_eq!(SessionStatus::parse_label("Concluida"), Some(SessionStatus::Won));
        assert_eq!(SessionStatus::parse_label("derrota"), Some(SessionStatus::Lost));
        assert_eq!(SessionStatus::parse_label(" lost "), Some(SessionStatus::Lost));
        assert_eq!(SessionStatus::parse_label("em_andamento"), Some(SessionStatus::Playing));
        assert_eq!(SessionStatus::parse_label("paused"), None);
    }

    #[test]
    fn test_canonical_label_output() {
        assert_eq!(SessionStatus::Won.as_str(), "won");
        assert_eq!(
            serde_json::to_string(&SessionStatus::Lost).unwrap(),
            "\"lost\""
        );
    }

    #[test]
    fn test_is_finished() {
        assert!(!SessionStatus::Playing.is_finished());
        assert!(SessionStatus::Won.is_finished());
        assert!(SessionStatus::Lost.is_finished());
    }
}
