//! Client-facing reducers for accounts, configuration, and gameplay.
//!
//! Every reducer returns `Result<(), String>`; an `Err` rolls back the
//! transaction and is shown to the caller.

use crate::simulation;
use crate::tables::*;
use spacetimedb::{reducer, ReducerContext, Table};
use vetbalance_logic::constants::{notice_kinds, roles};
use vetbalance_logic::feedback::hint;
use vetbalance_logic::roster::validate_name;
use vetbalance_logic::simulation::SimEvent;
use vetbalance_logic::status::SessionStatus;

// ============================================================================
// ACCESS HELPERS
// ============================================================================

/// Account of the caller.
pub(crate) fn current_user(ctx: &ReducerContext) -> Result<UserAccount, String> {
    ctx.db
        .user_account()
        .identity()
        .find(ctx.sender)
        .ok_or_else(|| "Register before using VetBalance".to_string())
}

pub(crate) fn require_professor(ctx: &ReducerContext) -> Result<UserAccount, String> {
    let user = current_user(ctx)?;
    if user.role != roles::PROFESSOR {
        return Err("Only professors can do that".into());
    }
    Ok(user)
}

pub(crate) fn require_student(ctx: &ReducerContext) -> Result<UserAccount, String> {
    let user = current_user(ctx)?;
    if user.role != roles::STUDENT {
        return Err("Only students can do that".into());
    }
    Ok(user)
}

/// Session owned by the calling student.
fn owned_session(ctx: &ReducerContext, session_id: u64) -> Result<GameSession, String> {
    let user = require_student(ctx)?;
    let session = ctx
        .db
        .game_session()
        .id()
        .find(session_id)
        .ok_or_else(|| format!("Session {} not found", session_id))?;
    if session.student_id != user.id {
        return Err("That session belongs to another student".into());
    }
    Ok(session)
}

// ============================================================================
// CONNECTIONS & ACCOUNTS
// ============================================================================

/// Called when a client connects
#[reducer(client_connected)]
pub fn client_connected(ctx: &ReducerContext) {
    log::info!("Client connected: {:?}", ctx.sender);
    let user_id = ctx.db.user_account().identity().find(ctx.sender).map(|u| u.id);
    ctx.db.connected_user().identity().delete(ctx.sender);
    ctx.db.connected_user().insert(ConnectedUser {
        identity: ctx.sender,
        user_id,
        connected_at: ctx.timestamp,
    });
}

/// Called when a client disconnects
#[reducer(client_disconnected)]
pub fn client_disconnected(ctx: &ReducerContext) {
    log::info!("Client disconnected: {:?}", ctx.sender);
    ctx.db.connected_user().identity().delete(ctx.sender);
}

/// Create the caller's account, or rename it if it already exists.
/// The role is fixed at registration.
#[reducer]
pub fn register_user(ctx: &ReducerContext, name: String, role: u8) -> Result<(), String> {
    let name = validate_name("Name", &name)?;

    if let Some(mut existing) = ctx.db.user_account().identity().find(ctx.sender) {
        if existing.role != role {
            return Err("An account's role cannot be changed".into());
        }
        log::info!("User {} renamed to '{}'", existing.id, name);
        existing.name = name;
        ctx.db.user_account().id().update(existing);
        return Ok(());
    }

    if !roles::is_valid(role) {
        return Err(format!("Unknown role {}", role));
    }
    let user = ctx.db.user_account().insert(UserAccount {
        id: 0,
        identity: ctx.sender,
        name,
        role,
        created_at: ctx.timestamp,
    });

    if let Some(mut conn) = ctx.db.connected_user().identity().find(ctx.sender) {
        conn.user_id = Some(user.id);
        ctx.db.connected_user().identity().update(conn);
    }

    log::info!(
        "Registered {} '{}' (id {})",
        if role == roles::PROFESSOR { "professor" } else { "student" },
        user.name,
        user.id
    );
    Ok(())
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Merge a JSON object of overrides into the engine config.
/// Fields left out keep their current values.
#[reducer]
pub fn update_sim_config(ctx: &ReducerContext, overrides_json: String) -> Result<(), String> {
    require_professor(ctx)?;

    let config = simulation::merge_config(&simulation::load_config(ctx), &overrides_json)?;
    let row = simulation::config_row(&config);
    if ctx.db.sim_config().id().find(0).is_some() {
        ctx.db.sim_config().id().update(row);
    } else {
        ctx.db.sim_config().insert(row);
    }
    log::info!("Simulation config updated: {}", overrides_json);
    Ok(())
}

// ============================================================================
// GAMEPLAY
// ============================================================================

/// Whether `student_id` may play `case_id` through a class assignment.
fn case_assigned_to_student(ctx: &ReducerContext, student_id: u64, case_id: u64) -> bool {
    ctx.db
        .class_enrollment()
        .iter()
        .filter(|e| e.student_id == student_id)
        .any(|e| {
            ctx.db
                .class_case()
                .iter()
                .any(|cc| cc.class_id == e.class_id && cc.case_id == case_id)
        })
}

#[reducer]
pub fn start_session(ctx: &ReducerContext, case_id: u64) -> Result<(), String> {
    let student = require_student(ctx)?;
    let case = ctx
        .db
        .clinical_case()
        .id()
        .find(case_id)
        .ok_or_else(|| format!("Case {} not found", case_id))?;

    if !case.public && !case_assigned_to_student(ctx, student.id, case_id) {
        return Err("This case has not been assigned to any of your classes".into());
    }
    let playing = SessionStatus::Playing.as_u8();
    if ctx
        .db
        .game_session()
        .iter()
        .any(|s| s.student_id == student.id && s.status == playing)
    {
        return Err("Finish or abandon your current session first".into());
    }

    let initial = simulation::case_values(ctx, case_id);
    if initial.is_empty() {
        return Err(format!("Case '{}' has no parameters yet", case.title));
    }

    let config = simulation::load_config(ctx);
    let session = simulation::insert_session(ctx, student.id, case_id, initial, &config);
    simulation::notify(
        ctx,
        ctx.sender,
        notice_kinds::INFO,
        format!(
            "Case started: {}. Stabilize the patient within {} seconds.",
            case.title, config.time_limit_secs
        ),
        Some(session.id),
    );
    log::info!(
        "Student {} started session {} on case {}",
        student.id,
        session.id,
        case_id
    );
    Ok(())
}

/// Advance a session's clock. The client calls this once per wall-clock
/// interval. Each call moves at most `max_advance_secs` and never past the
/// real time since the session started. A client that stops calling
/// freezes its session until it resumes.
#[reducer]
pub fn advance_session(ctx: &ReducerContext, session_id: u64, seconds: u32) -> Result<(), String> {
    let session = owned_session(ctx, session_id)?;
    let config = simulation::load_config(ctx);
    let wall_micros = ctx.timestamp.to_micros_since_unix_epoch() - session.started_at.to_micros_since_unix_epoch();
    let wall_secs = (wall_micros.max(0) / 1_000_000) as u64;
    let seconds = simulation::clock_allowance(seconds, config.max_advance_secs, wall_secs, session.elapsed_seconds);
    if seconds == 0 {
        return Ok(());
    }
    simulation::step_session(ctx, session, SimEvent::ClockTick { seconds })
}

#[reducer]
pub fn apply_treatment(ctx: &ReducerContext, session_id: u64, treatment_id: u32) -> Result<(), String> {
    let session = owned_session(ctx, session_id)?;
    simulation::step_session(ctx, session, SimEvent::ApplyTreatment { treatment_id })
}

#[reducer]
pub fn abandon_session(ctx: &ReducerContext, session_id: u64) -> Result<(), String> {
    let session = owned_session(ctx, session_id)?;
    simulation::step_session(ctx, session, SimEvent::Abandon)
}

/// Post a hint for the session as a notification.
#[reducer]
pub fn request_hint(ctx: &ReducerContext, session_id: u64) -> Result<(), String> {
    let session = owned_session(ctx, session_id)?;
    let case = ctx
        .db
        .clinical_case()
        .id()
        .find(session.case_id)
        .ok_or_else(|| format!("Case {} no longer exists", session.case_id))?;
    let state = simulation::load_state(ctx, &session)?;
    if !state.is_playing() {
        return Err(format!("Session {} has already ended", session.id));
    }

    let rules = simulation::case_rules(ctx, &case);
    let decisions = simulation::load_decisions(ctx, session.id);
    let h = hint(&state, &rules, &decisions);
    simulation::notify(ctx, ctx.sender, notice_kinds::INFO, h.message, Some(session.id));
    Ok(())
}

#[reducer]
pub fn dismiss_notification(ctx: &ReducerContext, notification_id: u64) -> Result<(), String> {
    let n = ctx
        .db
        .notification()
        .id()
        .find(notification_id)
        .ok_or_else(|| format!("Notification {} not found", notification_id))?;
    if n.recipient != ctx.sender {
        return Err("That notification is not yours".into());
    }
    ctx.db.notification().id().delete(notification_id);
    Ok(())
}
