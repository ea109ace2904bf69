//! Classes: professor management, student roster, and class reports.

use crate::reducers::{require_professor, require_student};
use crate::simulation;
use crate::tables::*;
use spacetimedb::{reducer, ReducerContext, Table};
use vetbalance_logic::constants::notice_kinds;
use vetbalance_logic::report::class_report;
use vetbalance_logic::roster::{join_code, normalize_join_code, validate_name};
use vetbalance_logic::scoring::SessionSummary;

const JOIN_CODE_ATTEMPTS: u64 = 32;

/// Class owned by the calling professor.
fn owned_class(ctx: &ReducerContext, class_id: u64) -> Result<Class, String> {
    let professor = require_professor(ctx)?;
    let class = ctx
        .db
        .class()
        .id()
        .find(class_id)
        .ok_or_else(|| format!("Class {} not found", class_id))?;
    if class.professor != professor.identity {
        return Err("You do not teach this class".into());
    }
    Ok(class)
}

fn is_enrolled(ctx: &ReducerContext, class_id: u64, student_id: u64) -> bool {
    ctx.db
        .class_enrollment()
        .iter()
        .any(|e| e.class_id == class_id && e.student_id == student_id)
}

fn unenroll(ctx: &ReducerContext, class_id: u64, student_id: u64) -> bool {
    let rows: Vec<u64> = ctx
        .db
        .class_enrollment()
        .iter()
        .filter(|e| e.class_id == class_id && e.student_id == student_id)
        .map(|e| e.id)
        .collect();
    for id in &rows {
        ctx.db.class_enrollment().id().delete(*id);
    }
    !rows.is_empty()
}

// ============================================================================
// PROFESSOR
// ============================================================================

#[reducer]
pub fn create_class(ctx: &ReducerContext, name: String) -> Result<(), String> {
    let professor = require_professor(ctx)?;
    let name = validate_name("Class name", &name)?;

    let base = ctx.timestamp.to_micros_since_unix_epoch() as u64 ^ professor.id.rotate_left(32);
    let code = (0..JOIN_CODE_ATTEMPTS)
        .map(|attempt| join_code(base.wrapping_add(attempt)))
        .find(|code| ctx.db.class().join_code().find(code).is_none())
        .ok_or_else(|| "Could not allocate a join code, try again".to_string())?;

    let class = ctx.db.class().insert(Class {
        id: 0,
        name,
        join_code: code,
        professor: professor.identity,
        created_at: ctx.timestamp,
    });
    log::info!(
        "Professor {} created class {} '{}' (code {})",
        professor.id,
        class.id,
        class.name,
        class.join_code
    );
    Ok(())
}

#[reducer]
pub fn rename_class(ctx: &ReducerContext, class_id: u64, name: String) -> Result<(), String> {
    let mut class = owned_class(ctx, class_id)?;
    class.name = validate_name("Class name", &name)?;
    ctx.db.class().id().update(class);
    Ok(())
}

/// Delete a class with its roster, assignments, and report rows.
#[reducer]
pub fn delete_class(ctx: &ReducerContext, class_id: u64) -> Result<(), String> {
    owned_class(ctx, class_id)?;

    let enrollments: Vec<u64> = ctx
        .db
        .class_enrollment()
        .iter()
        .filter(|e| e.class_id == class_id)
        .map(|e| e.id)
        .collect();
    for id in enrollments {
        ctx.db.class_enrollment().id().delete(id);
    }
    let assignments: Vec<u64> = ctx
        .db
        .class_case()
        .iter()
        .filter(|cc| cc.class_id == class_id)
        .map(|cc| cc.id)
        .collect();
    for id in assignments {
        ctx.db.class_case().id().delete(id);
    }
    clear_report(ctx, class_id);
    ctx.db.class().id().delete(class_id);
    log::info!("Class {} deleted", class_id);
    Ok(())
}

#[reducer]
pub fn assign_case(ctx: &ReducerContext, class_id: u64, case_id: u64) -> Result<(), String> {
    owned_class(ctx, class_id)?;
    let case = ctx
        .db
        .clinical_case()
        .id()
        .find(case_id)
        .ok_or_else(|| format!("Case {} not found", case_id))?;
    if ctx
        .db
        .class_case()
        .iter()
        .any(|cc| cc.class_id == class_id && cc.case_id == case_id)
    {
        return Err(format!("'{}' is already assigned to this class", case.title));
    }
    ctx.db.class_case().insert(ClassCase {
        id: 0,
        class_id,
        case_id,
    });

    let students: Vec<u64> = ctx
        .db
        .class_enrollment()
        .iter()
        .filter(|e| e.class_id == class_id)
        .map(|e| e.student_id)
        .collect();
    for student_id in students {
        if let Some(student) = ctx.db.user_account().id().find(student_id) {
            simulation::notify(
                ctx,
                student.identity,
                notice_kinds::INFO,
                format!("New case assigned: {}", case.title),
                None,
            );
        }
    }
    Ok(())
}

#[reducer]
pub fn unassign_case(ctx: &ReducerContext, class_id: u64, case_id: u64) -> Result<(), String> {
    owned_class(ctx, class_id)?;
    let row = ctx
        .db
        .class_case()
        .iter()
        .find(|cc| cc.class_id == class_id && cc.case_id == case_id)
        .ok_or_else(|| format!("Case {} is not assigned to this class", case_id))?;
    ctx.db.class_case().id().delete(row.id);
    Ok(())
}

#[reducer]
pub fn remove_student(ctx: &ReducerContext, class_id: u64, student_id: u64) -> Result<(), String> {
    let class = owned_class(ctx, class_id)?;
    if !unenroll(ctx, class_id, student_id) {
        return Err(format!("Student {} is not in this class", student_id));
    }
    if let Some(student) = ctx.db.user_account().id().find(student_id) {
        simulation::notify(
            ctx,
            student.identity,
            notice_kinds::WARNING,
            format!("You were removed from {}", class.name),
            None,
        );
    }
    log::info!("Student {} removed from class {}", student_id, class_id);
    Ok(())
}

// ============================================================================
// STUDENT
// ============================================================================

#[reducer]
pub fn join_class(ctx: &ReducerContext, code: String) -> Result<(), String> {
    let student = require_student(ctx)?;
    let code = normalize_join_code(&code).ok_or_else(|| "That is not a valid join code".to_string())?;
    let class = ctx
        .db
        .class()
        .join_code()
        .find(&code)
        .ok_or_else(|| "No class uses that join code".to_string())?;
    if is_enrolled(ctx, class.id, student.id) {
        return Err(format!("You are already in {}", class.name));
    }

    ctx.db.class_enrollment().insert(ClassEnrollment {
        id: 0,
        class_id: class.id,
        student_id: student.id,
        joined_at: ctx.timestamp,
    });
    simulation::notify(
        ctx,
        class.professor,
        notice_kinds::INFO,
        format!("{} joined {}", student.name, class.name),
        None,
    );
    log::info!("Student {} joined class {}", student.id, class.id);
    Ok(())
}

#[reducer]
pub fn leave_class(ctx: &ReducerContext, class_id: u64) -> Result<(), String> {
    let student = require_student(ctx)?;
    if !unenroll(ctx, class_id, student.id) {
        return Err("You are not in that class".into());
    }
    Ok(())
}

// ============================================================================
// REPORTS
// ============================================================================

fn clear_report(ctx: &ReducerContext, class_id: u64) {
    let rows: Vec<u64> = ctx
        .db
        .class_report_row()
        .iter()
        .filter(|r| r.class_id == class_id)
        .map(|r| r.id)
        .collect();
    for id in rows {
        ctx.db.class_report_row().id().delete(id);
    }
}

/// Rebuild the class report. Only sessions on cases assigned to the class
/// count; with no assignments yet, every session of the roster counts.
#[reducer]
pub fn refresh_class_report(ctx: &ReducerContext, class_id: u64) -> Result<(), String> {
    owned_class(ctx, class_id)?;

    let mut enrollments: Vec<ClassEnrollment> = ctx
        .db
        .class_enrollment()
        .iter()
        .filter(|e| e.class_id == class_id)
        .collect();
    enrollments.sort_by_key(|e| e.id);
    let roster: Vec<(u64, String)> = enrollments
        .iter()
        .map(|e| {
            let name = ctx
                .db
                .user_account()
                .id()
                .find(e.student_id)
                .map(|u| u.name)
                .unwrap_or_default();
            (e.student_id, name)
        })
        .collect();

    let assigned: Vec<u64> = ctx
        .db
        .class_case()
        .iter()
        .filter(|cc| cc.class_id == class_id)
        .map(|cc| cc.case_id)
        .collect();
    let sessions: Vec<SessionSummary> = simulation::finished_summaries(ctx)
        .into_iter()
        .filter(|s| assigned.is_empty() || assigned.contains(&s.case_id))
        .collect();

    clear_report(ctx, class_id);
    for row in class_report(&roster, &sessions) {
        ctx.db.class_report_row().insert(ClassReportLine {
            id: 0,
            class_id,
            student_id: row.student_id,
            student_name: row.student_name,
            sessions: row.sessions,
            wins: row.wins,
            losses: row.losses,
            win_rate: row.win_rate,
            best_score: row.best_score,
            average_duration_secs: row.average_duration_secs,
            generated_at: ctx.timestamp,
        });
    }
    log::info!("Class report refreshed for class {} ({} students)", class_id, roster.len());
    Ok(())
}
