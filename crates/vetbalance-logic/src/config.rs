//! Simulation configuration: timer rates, HP deltas, scoring weights.
//!
//! Every constant the engine uses lives here so that a deployment can tune
//! difficulty without code changes. Missing JSON fields fall back to the
//! defaults, so a config file only needs the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// HP ceiling. Reaching it wins the session.
pub const MAX_HP: u8 = 100;

/// Longest allowed session. The engine steps the clock one second at a
/// time, so this also bounds the work of a single clock tick.
pub const MAX_TIME_LIMIT_SECS: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// HP at session start.
    pub initial_hp: u8,
    /// Simulated seconds between HP decay steps.
    pub hp_decay_interval_secs: u32,
    /// HP lost per decay step.
    pub hp_decay_amount: u8,
    /// Session time limit in simulated seconds.
    pub time_limit_secs: u32,
    /// HP gained for the first-choice treatment of the case's condition.
    pub hp_bonus_primary: u8,
    /// HP gained for the second-choice treatment.
    pub hp_bonus_secondary: u8,
    /// HP gained for any lower-ranked correct treatment.
    pub hp_bonus_supportive: u8,
    /// HP lost for a treatment not indicated for the condition.
    pub hp_penalty_incorrect: u8,
    /// Largest clock advance a client may submit in one call.
    pub max_advance_secs: u32,
    /// Score awarded for winning.
    pub score_win_base: u32,
    /// Score per simulated second left on the clock at a win.
    pub score_time_bonus_per_sec: u32,
    /// Score per correct treatment.
    pub score_per_correct: u32,
    /// Score deducted per incorrect treatment.
    pub score_per_incorrect: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_hp: 50,
            hp_decay_interval_secs: 5,
            hp_decay_amount: 1,
            time_limit_secs: 300,
            hp_bonus_primary: 15,
            hp_bonus_secondary: 10,
            hp_bonus_supportive: 5,
            hp_penalty_incorrect: 10,
            max_advance_secs: 10,
            score_win_base: 500,
            score_time_bonus_per_sec: 2,
            score_per_correct: 50,
            score_per_incorrect: 20,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_hp == 0 || self.initial_hp >= MAX_HP {
            return Err(ConfigError::InitialHpOutOfRange(self.initial_hp));
        }
        let positive = [
            ("hp_decay_interval_secs", self.hp_decay_interval_secs),
            ("hp_decay_amount", u32::from(self.hp_decay_amount)),
            ("time_limit_secs", self.time_limit_secs),
            ("max_advance_secs", self.max_advance_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }

        if self.time_limit_secs > MAX_TIME_LIMIT_SECS {
            return Err(ConfigError::OutOfRange {
                field: "time_limit_secs",
                max: MAX_TIME_LIMIT_SECS,
            });
        }
        let within_limit = [
            ("hp_decay_interval_secs", self.hp_decay_interval_secs),
            ("max_advance_secs", self.max_advance_secs),
        ];
        for (field, value) in within_limit {
            if value > self.time_limit_secs {
                return Err(ConfigError::OutOfRange {
                    field,
                    max: self.time_limit_secs,
                });
            }
        }
        Ok(())
    }

    /// HP delta for a treatment with the given correctness rank
    /// (`None` = not indicated).
    pub fn treatment_hp_delta(&self, rank: Option<u8>) -> i16 {
        match rank {
            Some(1) => i16::from(self.hp_bonus_primary),
            Some(2) => i16::from(self.hp_bonus_secondary),
            Some(_) => i16::from(self.hp_bonus_supportive),
            None => -i16::from(self.hp_penalty_incorrect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_contract() {
        let c = SimulationConfig::default();
        assert_eq!(c.hp_decay_interval_secs, 5);
        assert_eq!(c.hp_decay_amount, 1);
        assert_eq!(c.time_limit_secs, 300);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let c = SimulationConfig::from_json(r#"{"time_limit_secs": 120}"#).unwrap();
        assert_eq!(c.time_limit_secs, 120);
        assert_eq!(c.initial_hp, 50);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = SimulationConfig::from_json(r#"{"hp_decay_interval_secs": 0}"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotPositive {
                field: "hp_decay_interval_secs"
            }
        );
    }

    #[test]
    fn test_rejects_initial_hp_at_ceiling() {
        let c = SimulationConfig {
            initial_hp: 100,
            ..SimulationConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::InitialHpOutOfRange(100)));
    }

    #[test]
    fn test_rejects_unbounded_clock_settings() {
        let err = SimulationConfig::from_json(
            r#"{"time_limit_secs": 4294967295, "hp_decay_interval_secs": 4294967295, "max_advance_secs": 4294967295}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                field: "time_limit_secs",
                max: MAX_TIME_LIMIT_SECS
            }
        );
    }

    #[test]
    fn test_intervals_must_fit_in_time_limit() {
        let err = SimulationConfig::from_json(r#"{"time_limit_secs": 60, "hp_decay_interval_secs": 61}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                field: "hp_decay_interval_secs",
                max: 60
            }
        );

        let err = SimulationConfig::from_json(r#"{"time_limit_secs": 60, "max_advance_secs": 120}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                field: "max_advance_secs",
                max: 60
            }
        );

        let at_edges = SimulationConfig::from_json(
            r#"{"time_limit_secs": 3600, "hp_decay_interval_secs": 3600, "max_advance_secs": 3600}"#,
        );
        assert!(at_edges.is_ok());
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            SimulationConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_treatment_hp_delta_by_rank() {
        let c = SimulationConfig::default();
        assert_eq!(c.treatment_hp_delta(Some(1)), 15);
        assert_eq!(c.treatment_hp_delta(Some(2)), 10);
        assert_eq!(c.treatment_hp_delta(Some(3)), 5);
        assert_eq!(c.treatment_hp_delta(Some(7)), 5);
        assert_eq!(c.treatment_hp_delta(None), -10);
    }
}
