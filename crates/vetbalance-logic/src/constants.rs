//! Game constants: species, conditions, parameter ids, roles, difficulty, notice kinds.
//!
//! These are simple integer constants with no database dependency.
//! Both the SpacetimeDB server and the native simtest use these.

/// Physiological parameter id.
pub type ParamId = u32;
/// Treatment id.
pub type TreatmentId = u32;
/// Clinical case id.
pub type CaseId = u64;
/// Student (account) id.
pub type StudentId = u64;

pub mod species {
    pub const DOG: u8 = 0;
    pub const CAT: u8 = 1;
    pub const HORSE: u8 = 2;
    pub const CATTLE: u8 = 3;
    pub const SHEEP: u8 = 4;

    pub fn name(species: u8) -> &'static str {
        match species {
            DOG => "Dog",
            CAT => "Cat",
            HORSE => "Horse",
            CATTLE => "Cattle",
            SHEEP => "Sheep",
            _ => "Unknown species",
        }
    }

    pub fn is_valid(species: u8) -> bool {
        species <= SHEEP
    }
}

pub mod conditions {
    pub const DIABETIC_KETOACIDOSIS: u8 = 0;
    pub const URETHRAL_OBSTRUCTION: u8 = 1;
    pub const ABOMASAL_DISPLACEMENT: u8 = 2;
    pub const BRACHYCEPHALIC_AIRWAY: u8 = 3;
    pub const HEATSTROKE: u8 = 4;
    pub const ENDOTOXEMIA: u8 = 5;
    pub const NEONATAL_DIARRHEA: u8 = 6;
    pub const GASTRIC_DILATATION_VOLVULUS: u8 = 7;

    pub fn name(condition: u8) -> &'static str {
        match condition {
            DIABETIC_KETOACIDOSIS => "Diabetic ketoacidosis",
            URETHRAL_OBSTRUCTION => "Urethral obstruction",
            ABOMASAL_DISPLACEMENT => "Left abomasal displacement",
            BRACHYCEPHALIC_AIRWAY => "Brachycephalic airway obstruction",
            HEATSTROKE => "Heatstroke",
            ENDOTOXEMIA => "Endotoxemia",
            NEONATAL_DIARRHEA => "Neonatal diarrhea",
            GASTRIC_DILATATION_VOLVULUS => "Gastric dilatation-volvulus",
            _ => "Unknown condition",
        }
    }

    pub fn is_valid(condition: u8) -> bool {
        condition <= GASTRIC_DILATATION_VOLVULUS
    }
}

/// Well-known parameter ids used by the acid-base interpreter.
pub mod params {
    use super::ParamId;

    pub const PH: ParamId = 1;
    pub const PACO2: ParamId = 2;
    pub const HCO3: ParamId = 3;
    pub const BASE_EXCESS: ParamId = 4;
    pub const POTASSIUM: ParamId = 5;
    pub const SODIUM: ParamId = 6;
    pub const CHLORIDE: ParamId = 7;
    pub const LACTATE: ParamId = 8;
    pub const GLUCOSE: ParamId = 9;
    pub const PAO2: ParamId = 10;
}

pub mod roles {
    pub const STUDENT: u8 = 0;
    pub const PROFESSOR: u8 = 1;

    pub fn is_valid(role: u8) -> bool {
        matches!(role, STUDENT | PROFESSOR)
    }
}

/// Case difficulty tiers.
pub mod difficulty {
    pub const EASY: u8 = 1;
    pub const MEDIUM: u8 = 2;
    pub const HARD: u8 = 3;

    pub fn is_valid(level: u8) -> bool {
        (EASY..=HARD).contains(&level)
    }
}

/// Notification kinds stored alongside toast text.
pub mod notice_kinds {
    pub const INFO: u8 = 0;
    pub const SUCCESS: u8 = 1;
    pub const WARNING: u8 = 2;
    pub const ERROR: u8 = 3;
}
