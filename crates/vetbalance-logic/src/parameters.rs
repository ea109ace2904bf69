//! Physiological parameters: normal ranges, classification, and
//! acid-base interpretation.

use serde::{Deserialize, Serialize};

use crate::constants::ParamId;

/// A monitored physiological value with its reference band and hard limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub id: ParamId,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    /// Lowest value the simulation allows (physiological floor).
    pub min_value: f64,
    /// Highest value the simulation allows (physiological ceiling).
    pub max_value: f64,
}

/// Where a reading falls relative to the normal band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterStatus {
    Low,
    Normal,
    High,
}

impl ParameterStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl ParameterDef {
    /// Bounds must nest: `min_value <= normal_min < normal_max <= max_value`.
    pub fn bounds_consistent(&self) -> bool {
        self.min_value <= self.normal_min
            && self.normal_min < self.normal_max
            && self.normal_max <= self.max_value
            && self.min_value.is_finite()
            && self.max_value.is_finite()
    }

    pub fn classify(&self, value: f64) -> ParameterStatus {
        if value < self.normal_min {
            ParameterStatus::Low
        } else if value > self.normal_max {
            ParameterStatus::High
        } else {
            ParameterStatus::Normal
        }
    }

    pub fn is_normal(&self, value: f64) -> bool {
        self.classify(value) == ParameterStatus::Normal
    }

    /// Distance outside the normal band, in units of band width.
    /// Zero inside the band.
    pub fn deviation(&self, value: f64) -> f64 {
        let width = self.normal_max - self.normal_min;
        if width <= 0.0 {
            return 0.0;
        }
        if value < self.normal_min {
            (self.normal_min - value) / width
        } else if value > self.normal_max {
            (value - self.normal_max) / width
        } else {
            0.0
        }
    }

    /// Clamp to the physiological limits.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    /// Whether a value lies within the physiological limits.
    pub fn within_limits(&self, value: f64) -> bool {
        value >= self.min_value && value <= self.max_value
    }

    /// Midpoint of the normal band.
    pub fn normal_midpoint(&self) -> f64 {
        (self.normal_min + self.normal_max) / 2.0
    }
}

/// Primary acid-base disturbance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcidBaseDisorder {
    Normal,
    MetabolicAcidosis,
    MetabolicAlkalosis,
    RespiratoryAcidosis,
    RespiratoryAlkalosis,
    /// Both components abnormal and pulling the same way, or a normal pH
    /// masking opposing disturbances.
    Mixed,
}

impl AcidBaseDisorder {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal acid-base status",
            Self::MetabolicAcidosis => "metabolic acidosis",
            Self::MetabolicAlkalosis => "metabolic alkalosis",
            Self::RespiratoryAcidosis => "respiratory acidosis",
            Self::RespiratoryAlkalosis => "respiratory alkalosis",
            Self::Mixed => "mixed acid-base disorder",
        }
    }
}

/// A single blood-gas reading paired with its definition.
#[derive(Debug, Clone, Copy)]
pub struct Reading<'a> {
    pub def: &'a ParameterDef,
    pub value: f64,
}

impl Reading<'_> {
    fn status(&self) -> ParameterStatus {
        self.def.classify(self.value)
    }
}

/// Interpret a blood gas.
///
/// pH decides acidemia vs alkalemia; the primary cause is whichever of
/// HCO3 (metabolic) or PaCO2 (respiratory) moved in the matching direction.
/// Low HCO3 and high PaCO2 both acidify.
pub fn interpret_acid_base(ph: Reading, paco2: Reading, hco3: Reading) -> AcidBaseDisorder {
    let metabolic_acid = hco3.status() == ParameterStatus::Low;
    let metabolic_base = hco3.status() == ParameterStatus::High;
    let resp_acid = paco2.status() == ParameterStatus::High;
    let resp_base = paco2.status() == ParameterStatus::Low;

    match ph.status() {
        ParameterStatus::Low => match (metabolic_acid, resp_acid) {
            (true, true) => AcidBaseDisorder::Mixed,
            (true, false) => AcidBaseDisorder::MetabolicAcidosis,
            (false, true) => AcidBaseDisorder::RespiratoryAcidosis,
            // Acidemia with no matching driver reads as mixed.
            (false, false) => AcidBaseDisorder::Mixed,
        },
        ParameterStatus::High => match (metabolic_base, resp_base) {
            (true, true) => AcidBaseDisorder::Mixed,
            (true, false) => AcidBaseDisorder::MetabolicAlkalosis,
            (false, true) => AcidBaseDisorder::RespiratoryAlkalosis,
            (false, false) => AcidBaseDisorder::Mixed,
        },
        ParameterStatus::Normal => {
            let metabolic_abnormal = metabolic_acid || metabolic_base;
            let resp_abnormal = resp_acid || resp_base;
            if metabolic_abnormal && resp_abnormal {
                AcidBaseDisorder::Mixed
            } else {
                AcidBaseDisorder::Normal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::params;

    fn def(id: ParamId, lo: f64, hi: f64, min: f64, max: f64) -> ParameterDef {
        ParameterDef {
            id,
            name: format!("p{}", id),
            unit: String::new(),
            normal_min: lo,
            normal_max: hi,
            min_value: min,
            max_value: max,
        }
    }

    fn gas_defs() -> (ParameterDef, ParameterDef, ParameterDef) {
        (
            def(params::PH, 7.35, 7.45, 6.8, 7.8),
            def(params::PACO2, 35.0, 45.0, 10.0, 120.0),
            def(params::HCO3, 18.0, 24.0, 2.0, 50.0),
        )
    }

    fn interpret(ph: f64, paco2: f64, hco3: f64) -> AcidBaseDisorder {
        let (d_ph, d_co2, d_hco3) = gas_defs();
        interpret_acid_base(
            Reading { def: &d_ph, value: ph },
            Reading { def: &d_co2, value: paco2 },
            Reading { def: &d_hco3, value: hco3 },
        )
    }

    #[test]
    fn test_classify() {
        let ph = def(params::PH, 7.35, 7.45, 6.8, 7.8);
        assert_eq!(ph.classify(7.2), ParameterStatus::Low);
        assert_eq!(ph.classify(7.35), ParameterStatus::Normal);
        assert_eq!(ph.classify(7.45), ParameterStatus::Normal);
        assert_eq!(ph.classify(7.5), ParameterStatus::High);
    }

    #[test]
    fn test_deviation_scaled_by_band() {
        let hco3 = def(params::HCO3, 18.0, 24.0, 2.0, 50.0);
        assert_eq!(hco3.deviation(20.0), 0.0);
        assert!((hco3.deviation(12.0) - 1.0).abs() < 1e-9);
        assert!((hco3.deviation(27.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_to_limits() {
        let ph = def(params::PH, 7.35, 7.45, 6.8, 7.8);
        assert_eq!(ph.clamp(6.5), 6.8);
        assert_eq!(ph.clamp(8.0), 7.8);
        assert_eq!(ph.clamp(7.4), 7.4);
    }

    #[test]
    fn test_bounds_consistent() {
        assert!(def(1, 7.35, 7.45, 6.8, 7.8).bounds_consistent());
        assert!(!def(1, 7.45, 7.35, 6.8, 7.8).bounds_consistent());
        assert!(!def(1, 7.35, 7.45, 7.4, 7.8).bounds_consistent());
    }

    #[test]
    fn test_metabolic_acidosis() {
        assert_eq!(interpret(7.15, 32.0, 9.0), AcidBaseDisorder::MetabolicAcidosis);
    }

    #[test]
    fn test_metabolic_alkalosis() {
        assert_eq!(interpret(7.55, 48.0, 36.0), AcidBaseDisorder::MetabolicAlkalosis);
    }

    #[test]
    fn test_respiratory_acidosis() {
        assert_eq!(interpret(7.22, 68.0, 23.0), AcidBaseDisorder::RespiratoryAcidosis);
    }

    #[test]
    fn test_respiratory_alkalosis() {
        assert_eq!(interpret(7.56, 22.0, 20.0), AcidBaseDisorder::RespiratoryAlkalosis);
    }

    #[test]
    fn test_mixed_acidosis() {
        assert_eq!(interpret(7.05, 60.0, 12.0), AcidBaseDisorder::Mixed);
    }

    #[test]
    fn test_compensated_is_mixed() {
        assert_eq!(interpret(7.40, 25.0, 14.0), AcidBaseDisorder::Mixed);
    }

    #[test]
    fn test_all_normal() {
        assert_eq!(interpret(7.40, 40.0, 21.0), AcidBaseDisorder::Normal);
    }
}
