//! Catalog seeding and professor case management.
//!
//! `seed_catalog` copies the built-in catalog (`data/case_catalog.json`,
//! embedded in `vetbalance-logic`) into the catalog tables. Professors then
//! author their own cases on top of it.

use std::collections::BTreeMap;

use crate::reducers::require_professor;
use crate::simulation;
use crate::tables::*;
use spacetimedb::{reducer, ReducerContext, Table};
use vetbalance_logic::catalog::{self as logic, Catalog};
use vetbalance_logic::config::SimulationConfig;
use vetbalance_logic::status::SessionStatus;

// ============================================================================
// SEEDING
// ============================================================================

/// Load the built-in catalog. Rows that already exist are left alone, so
/// calling this again after an upgrade only adds what is new.
#[reducer]
pub fn seed_catalog(ctx: &ReducerContext) -> Result<(), String> {
    require_professor(ctx)?;
    let catalog = Catalog::builtin().map_err(|e| e.to_string())?;

    if ctx.db.sim_config().id().find(0).is_none() {
        ctx.db
            .sim_config()
            .insert(simulation::config_row(&SimulationConfig::default()));
    }

    let mut added = (0, 0, 0, 0);

    for def in &catalog.parameters {
        if ctx.db.parameter_def().id().find(def.id).is_none() {
            ctx.db.parameter_def().insert(Parameter {
                id: def.id,
                name: def.name.clone(),
                unit: def.unit.clone(),
                normal_min: def.normal_min,
                normal_max: def.normal_max,
                min_value: def.min_value,
                max_value: def.max_value,
            });
            added.0 += 1;
        }
    }

    for t in &catalog.treatments {
        if ctx.db.treatment().id().find(t.id).is_some() {
            continue;
        }
        ctx.db.treatment().insert(Treatment {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
        });
        for (&param_id, &delta) in &t.effects {
            ctx.db.treatment_effect().insert(TreatmentEffect {
                id: 0,
                treatment_id: t.id,
                param_id,
                delta,
            });
        }
        added.1 += 1;
    }

    for ct in &catalog.correct_treatments {
        let exists = ctx
            .db
            .correct_treatment()
            .iter()
            .any(|r| r.condition == ct.condition && r.treatment_id == ct.treatment_id);
        if !exists {
            ctx.db.correct_treatment().insert(CorrectTreatment {
                id: 0,
                condition: ct.condition,
                treatment_id: ct.treatment_id,
                rank: ct.rank,
            });
            added.2 += 1;
        }
    }

    // Built-in cases get fresh ids; they are matched by title.
    for case in &catalog.cases {
        let exists = ctx
            .db
            .clinical_case()
            .iter()
            .any(|c| c.author.is_none() && c.title == case.title);
        if exists {
            continue;
        }
        let row = ctx.db.clinical_case().insert(ClinicalCase {
            id: 0,
            title: case.title.clone(),
            species: case.species,
            condition: case.condition,
            description: case.description.clone(),
            difficulty: case.difficulty,
            public: case.public,
            author: None,
            created_at: ctx.timestamp,
        });
        insert_case_values(ctx, row.id, &case.initial_values);
        added.3 += 1;
    }

    log::info!(
        "Catalog seeded: {} parameters, {} treatments, {} rankings, {} cases added",
        added.0,
        added.1,
        added.2,
        added.3
    );
    Ok(())
}

fn insert_case_values(ctx: &ReducerContext, case_id: u64, values: &BTreeMap<u32, f64>) {
    for (&param_id, &initial_value) in values {
        ctx.db.case_parameter().insert(CaseParameter {
            id: 0,
            case_id,
            param_id,
            initial_value,
        });
    }
}

// ============================================================================
// CASE MANAGEMENT
// ============================================================================

/// Check a case draft with the same rules the built-in catalog obeys.
fn validate_case(
    ctx: &ReducerContext,
    title: &str,
    species: u8,
    condition: u8,
    difficulty: u8,
    public: bool,
    initial_values: BTreeMap<u32, f64>,
) -> Result<(), String> {
    let draft = logic::ClinicalCase {
        id: 0,
        title: title.to_string(),
        species,
        condition,
        description: String::new(),
        difficulty,
        public,
        initial_values,
    };
    draft
        .validate(&simulation::parameter_defs(ctx))
        .map_err(|e| e.to_string())
}

/// A case the caller may edit: their own, or a built-in one.
fn editable_case(ctx: &ReducerContext, case_id: u64) -> Result<ClinicalCase, String> {
    let professor = require_professor(ctx)?;
    let case = ctx
        .db
        .clinical_case()
        .id()
        .find(case_id)
        .ok_or_else(|| format!("Case {} not found", case_id))?;
    match case.author {
        Some(author) if author != professor.identity => {
            Err("Only the author can edit this case".into())
        }
        _ => Ok(case),
    }
}

fn has_active_sessions(ctx: &ReducerContext, case_id: u64) -> bool {
    let playing = SessionStatus::Playing.as_u8();
    ctx.db
        .game_session()
        .iter()
        .any(|s| s.case_id == case_id && s.status == playing)
}

/// Create a case. `initial_values_json` maps parameter ids to starting
/// values, e.g. `{"1": 7.12, "2": 34.0}`.
#[allow(clippy::too_many_arguments)]
#[reducer]
pub fn create_case(
    ctx: &ReducerContext,
    title: String,
    species: u8,
    condition: u8,
    description: String,
    difficulty: u8,
    public: bool,
    initial_values_json: String,
) -> Result<(), String> {
    let professor = require_professor(ctx)?;
    let initial_values: BTreeMap<u32, f64> = serde_json::from_str(&initial_values_json)
        .map_err(|e| format!("Invalid initial values: {}", e))?;
    let title = title.trim().to_string();
    validate_case(ctx, &title, species, condition, difficulty, public, initial_values.clone())?;

    let case = ctx.db.clinical_case().insert(ClinicalCase {
        id: 0,
        title,
        species,
        condition,
        description: description.trim().to_string(),
        difficulty,
        public,
        author: Some(professor.identity),
        created_at: ctx.timestamp,
    });
    insert_case_values(ctx, case.id, &initial_values);
    log::info!("Professor {} created case {} '{}'", professor.id, case.id, case.title);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[reducer]
pub fn update_case(
    ctx: &ReducerContext,
    case_id: u64,
    title: String,
    species: u8,
    condition: u8,
    description: String,
    difficulty: u8,
    public: bool,
) -> Result<(), String> {
    let mut case = editable_case(ctx, case_id)?;
    let title = title.trim().to_string();
    validate_case(
        ctx,
        &title,
        species,
        condition,
        difficulty,
        public,
        simulation::case_values(ctx, case_id),
    )?;

    case.title = title;
    case.species = species;
    case.condition = condition;
    case.description = description.trim().to_string();
    case.difficulty = difficulty;
    case.public = public;
    ctx.db.clinical_case().id().update(case);
    log::info!("Case {} updated", case_id);
    Ok(())
}

/// Delete a case and its parameters and class assignments. Finished
/// sessions keep their history.
#[reducer]
pub fn delete_case(ctx: &ReducerContext, case_id: u64) -> Result<(), String> {
    editable_case(ctx, case_id)?;
    if has_active_sessions(ctx, case_id) {
        return Err("Students are playing this case right now".into());
    }

    let params: Vec<u64> = ctx
        .db
        .case_parameter()
        .iter()
        .filter(|cp| cp.case_id == case_id)
        .map(|cp| cp.id)
        .collect();
    for id in params {
        ctx.db.case_parameter().id().delete(id);
    }
    let assignments: Vec<u64> = ctx
        .db
        .class_case()
        .iter()
        .filter(|cc| cc.case_id == case_id)
        .map(|cc| cc.id)
        .collect();
    for id in assignments {
        ctx.db.class_case().id().delete(id);
    }
    ctx.db.clinical_case().id().delete(case_id);
    log::info!("Case {} deleted", case_id);
    Ok(())
}

/// Set (or add) one parameter's initial value in a case.
#[reducer]
pub fn set_case_parameter(
    ctx: &ReducerContext,
    case_id: u64,
    param_id: u32,
    initial_value: f64,
) -> Result<(), String> {
    editable_case(ctx, case_id)?;
    let def = ctx
        .db
        .parameter_def()
        .id()
        .find(param_id)
        .ok_or_else(|| format!("Unknown parameter {}", param_id))?;
    if !simulation::parameter_def(&def).within_limits(initial_value) {
        return Err(format!(
            "{} must be between {} and {}",
            def.name, def.min_value, def.max_value
        ));
    }

    match ctx
        .db
        .case_parameter()
        .iter()
        .find(|cp| cp.case_id == case_id && cp.param_id == param_id)
    {
        Some(mut row) => {
            row.initial_value = initial_value;
            ctx.db.case_parameter().id().update(row);
        }
        None => {
            ctx.db.case_parameter().insert(CaseParameter {
                id: 0,
                case_id,
                param_id,
                initial_value,
            });
        }
    }
    Ok(())
}
