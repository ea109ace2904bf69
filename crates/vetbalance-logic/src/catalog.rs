//! Case catalog: parameter definitions, treatments, correct-treatment
//! rankings, and clinical cases.
//!
//! The built-in catalog is loaded from `data/case_catalog.json` at compile
//! time via `include_str!()`. To add cases or treatments, edit the JSON file;
//! no code changes required.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::{conditions, difficulty, species, CaseId, ParamId, TreatmentId};
use crate::error::{CaseError, CatalogError};
use crate::parameters::ParameterDef;
use crate::simulation::CaseRules;

const BUILTIN_CATALOG_JSON: &str = include_str!("../../../data/case_catalog.json");

/// A clinical scenario: species, condition, and the parameter values the
/// patient presents with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCase {
    pub id: CaseId,
    pub title: String,
    pub species: u8,
    pub condition: u8,
    #[serde(default)]
    pub description: String,
    pub difficulty: u8,
    /// Visible to every student, not only to classes it is assigned to.
    #[serde(default)]
    pub public: bool,
    pub initial_values: BTreeMap<ParamId, f64>,
}

impl ClinicalCase {
    /// Check the case against the known parameter definitions.
    pub fn validate(&self, parameters: &BTreeMap<ParamId, ParameterDef>) -> Result<(), CaseError> {
        if self.title.trim().is_empty() {
            return Err(CaseError::EmptyTitle);
        }
        if !species::is_valid(self.species) {
            return Err(CaseError::UnknownSpecies(self.species));
        }
        if !conditions::is_valid(self.condition) {
            return Err(CaseError::UnknownCondition(self.condition));
        }
        if !difficulty::is_valid(self.difficulty) {
            return Err(CaseError::InvalidDifficulty(self.difficulty));
        }
        if self.initial_values.is_empty() {
            return Err(CaseError::NoParameters);
        }
        for (&param, &value) in &self.initial_values {
            let def = parameters
                .get(&param)
                .ok_or(CaseError::UnknownParameter(param))?;
            if !def.within_limits(value) {
                return Err(CaseError::ValueOutOfLimits {
                    param,
                    value,
                    min: def.min_value,
                    max: def.max_value,
                });
            }
        }
        Ok(())
    }
}

/// An action a student can apply, with per-parameter signed effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: TreatmentId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effects: BTreeMap<ParamId, f64>,
}

/// Ranking of a treatment for a condition. Rank 1 is the first choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectTreatment {
    pub condition: u8,
    pub treatment_id: TreatmentId,
    pub rank: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub parameters: Vec<ParameterDef>,
    pub treatments: Vec<Treatment>,
    pub correct_treatments: Vec<CorrectTreatment>,
    pub cases: Vec<ClinicalCase>,
}

impl Catalog {
    /// Parse and validate a catalog.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog shipped in `data/case_catalog.json`.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG_JSON)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut param_ids = BTreeSet::new();
        for def in &self.parameters {
            if !param_ids.insert(def.id) {
                return Err(CatalogError::DuplicateParameter(def.id));
            }
            if !def.bounds_consistent() {
                return Err(CatalogError::InconsistentBounds(def.id));
            }
        }

        let mut treatment_ids = BTreeSet::new();
        for t in &self.treatments {
            if !treatment_ids.insert(t.id) {
                return Err(CatalogError::DuplicateTreatment(t.id));
            }
            if let Some(&param) = t.effects.keys().find(|p| !param_ids.contains(p)) {
                return Err(CatalogError::UnknownEffectParameter {
                    treatment: t.id,
                    param,
                });
            }
        }

        let mut ranks_seen = BTreeSet::new();
        for ct in &self.correct_treatments {
            if !treatment_ids.contains(&ct.treatment_id) {
                return Err(CatalogError::UnknownTreatment(ct.treatment_id));
            }
            if ct.rank == 0 {
                return Err(CatalogError::ZeroRank {
                    condition: ct.condition,
                    treatment: ct.treatment_id,
                });
            }
            if !ranks_seen.insert((ct.condition, ct.rank)) {
                return Err(CatalogError::DuplicateRank {
                    condition: ct.condition,
                    rank: ct.rank,
                });
            }
        }

        let defs = self.parameter_map();
        let mut case_ids = BTreeSet::new();
        for case in &self.cases {
            if !case_ids.insert(case.id) {
                return Err(CatalogError::DuplicateCase(case.id));
            }
            case.validate(&defs)
                .map_err(|source| CatalogError::InvalidCase {
                    case: case.id,
                    source,
                })?;
        }
        Ok(())
    }

    pub fn parameter_map(&self) -> BTreeMap<ParamId, ParameterDef> {
        self.parameters.iter().map(|d| (d.id, d.clone())).collect()
    }

    pub fn parameter(&self, id: ParamId) -> Option<&ParameterDef> {
        self.parameters.iter().find(|d| d.id == id)
    }

    pub fn treatment(&self, id: TreatmentId) -> Option<&Treatment> {
        self.treatments.iter().find(|t| t.id == id)
    }

    pub fn case(&self, id: CaseId) -> Option<&ClinicalCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Treatment ranks for a condition, keyed by treatment id.
    pub fn ranks_for_condition(&self, condition: u8) -> BTreeMap<TreatmentId, u8> {
        self.correct_treatments
            .iter()
            .filter(|ct| ct.condition == condition)
            .map(|ct| (ct.treatment_id, ct.rank))
            .collect()
    }

    /// Build the reducer lookup tables for a case in this catalog.
    pub fn rules_for_case(&self, case_id: CaseId) -> Result<CaseRules, CatalogError> {
        let case = self
            .case(case_id)
            .ok_or(CatalogError::CaseNotFound(case_id))?;
        Ok(self.rules_for(case))
    }

    /// Build the reducer lookup tables for any case, including ones edited
    /// outside the catalog.
    pub fn rules_for(&self, case: &ClinicalCase) -> CaseRules {
        let mut rules = CaseRules::default();
        for def in &self.parameters {
            if case.initial_values.contains_key(&def.id) {
                rules.add_parameter(def.clone());
            }
        }
        for t in &self.treatments {
            rules.add_treatment(t.id, t.effects.clone());
            rules.name_treatment(t.id, t.name.clone());
        }
        for (treatment, rank) in self.ranks_for_condition(case.condition) {
            rules.set_rank(treatment, rank);
        }
        rules
    }
}
