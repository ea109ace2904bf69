//! Bridge between session tables and the pure reducer in `vetbalance-logic`.
//!
//! Reducers load a session's rows into a `SimulationState`, run one
//! `SimEvent` through `vetbalance_logic::simulation::reduce`, and write the
//! result back. When a step ends the session, `finish_session` runs the
//! scoring, badge, leaderboard, and feedback pipeline in the same
//! transaction.

use std::collections::BTreeMap;

use crate::tables::*;
use spacetimedb::{Identity, ReducerContext, Table};
use vetbalance_logic::badges::{evaluate_badges, BadgeKind};
use vetbalance_logic::config::SimulationConfig;
use vetbalance_logic::constants::{notice_kinds, StudentId};
use vetbalance_logic::feedback::session_feedback;
use vetbalance_logic::parameters::ParameterDef;
use vetbalance_logic::ranking::{build_leaderboard, rank_changes, week_bounds, LeaderboardEntry, LeaderboardWindow};
use vetbalance_logic::scoring::SessionSummary;
use vetbalance_logic::simulation::{reduce, CaseRules, Decision, Notice, SimEvent, SimulationState};
use vetbalance_logic::status::{LossReason, SessionStatus};

// ============================================================================
// CONFIG
// ============================================================================

/// Current engine config, or the defaults if the singleton is missing.
pub fn load_config(ctx: &ReducerContext) -> SimulationConfig {
    match ctx.db.sim_config().id().find(0) {
        Some(row) => SimulationConfig {
            initial_hp: row.initial_hp,
            hp_decay_interval_secs: row.hp_decay_interval_secs,
            hp_decay_amount: row.hp_decay_amount,
            time_limit_secs: row.time_limit_secs,
            hp_bonus_primary: row.hp_bonus_primary,
            hp_bonus_secondary: row.hp_bonus_secondary,
            hp_bonus_supportive: row.hp_bonus_supportive,
            hp_penalty_incorrect: row.hp_penalty_incorrect,
            max_advance_secs: row.max_advance_secs,
            score_win_base: row.score_win_base,
            score_time_bonus_per_sec: row.score_time_bonus_per_sec,
            score_per_correct: row.score_per_correct,
            score_per_incorrect: row.score_per_incorrect,
        },
        None => SimulationConfig::default(),
    }
}

pub fn config_row(config: &SimulationConfig) -> SimConfig {
    SimConfig {
        id: 0,
        initial_hp: config.initial_hp,
        hp_decay_interval_secs: config.hp_decay_interval_secs,
        hp_decay_amount: config.hp_decay_amount,
        time_limit_secs: config.time_limit_secs,
        hp_bonus_primary: config.hp_bonus_primary,
        hp_bonus_secondary: config.hp_bonus_secondary,
        hp_bonus_supportive: config.hp_bonus_supportive,
        hp_penalty_incorrect: config.hp_penalty_incorrect,
        max_advance_secs: config.max_advance_secs,
        score_win_base: config.score_win_base,
        score_time_bonus_per_sec: config.score_time_bonus_per_sec,
        score_per_correct: config.score_per_correct,
        score_per_incorrect: config.score_per_incorrect,
    }
}

/// Apply a JSON object of overrides to `current`. Fields left out keep
/// their current values; unknown fields and invalid results are rejected.
pub fn merge_config(current: &SimulationConfig, overrides_json: &str) -> Result<SimulationConfig, String> {
    let mut merged = serde_json::to_value(current).map_err(|e| e.to_string())?;
    let overrides: serde_json::Value =
        serde_json::from_str(overrides_json).map_err(|e| format!("Invalid config JSON: {}", e))?;
    let (Some(target), Some(patch)) = (merged.as_object_mut(), overrides.as_object()) else {
        return Err("Config overrides must be a JSON object".into());
    };
    for (key, value) in patch {
        if !target.contains_key(key) {
            return Err(format!("Unknown config field '{}'", key));
        }
        target.insert(key.clone(), value.clone());
    }
    SimulationConfig::from_json(&merged.to_string()).map_err(|e| e.to_string())
}

/// Seconds a clock advance may actually move a session: at most
/// `max_advance` per call, and never past the wall-clock time since the
/// session started.
pub fn clock_allowance(requested: u32, max_advance: u32, wall_secs: u64, elapsed: u32) -> u32 {
    let behind_wall = wall_secs.saturating_sub(u64::from(elapsed));
    let behind_wall = u32::try_from(behind_wall).unwrap_or(u32::MAX);
    requested.min(max_advance).min(behind_wall)
}

// ============================================================================
// LOADING
// ============================================================================

pub fn parameter_def(row: &Parameter) -> ParameterDef {
    ParameterDef {
        id: row.id,
        name: row.name.clone(),
        unit: row.unit.clone(),
        normal_min: row.normal_min,
        normal_max: row.normal_max,
        min_value: row.min_value,
        max_value: row.max_value,
    }
}

pub fn parameter_defs(ctx: &ReducerContext) -> BTreeMap<u32, ParameterDef> {
    ctx.db
        .parameter_def()
        .iter()
        .map(|p| (p.id, parameter_def(&p)))
        .collect()
}

/// Initial values of a case, keyed by parameter id.
pub fn case_values(ctx: &ReducerContext, case_id: u64) -> BTreeMap<u32, f64> {
    ctx.db
        .case_parameter()
        .iter()
        .filter(|cp| cp.case_id == case_id)
        .map(|cp| (cp.param_id, cp.initial_value))
        .collect()
}

/// Reducer lookup tables for a case, built from the catalog tables.
pub fn case_rules(ctx: &ReducerContext, case: &ClinicalCase) -> CaseRules {
    let mut rules = CaseRules::default();
    let tracked = case_values(ctx, case.id);

    for p in ctx.db.parameter_def().iter() {
        if tracked.contains_key(&p.id) {
            rules.add_parameter(parameter_def(&p));
        }
    }

    let mut effects: BTreeMap<u32, BTreeMap<u32, f64>> = BTreeMap::new();
    for t in ctx.db.treatment().iter() {
        effects.entry(t.id).or_default();
        rules.name_treatment(t.id, t.name);
    }
    for e in ctx.db.treatment_effect().iter() {
        if let Some(map) = effects.get_mut(&e.treatment_id) {
            map.insert(e.param_id, e.delta);
        }
    }
    for (id, map) in effects {
        rules.add_treatment(id, map);
    }

    for ct in ctx
        .db
        .correct_treatment()
        .iter()
        .filter(|ct| ct.condition == case.condition)
    {
        rules.set_rank(ct.treatment_id, ct.rank);
    }
    rules
}

pub fn load_state(ctx: &ReducerContext, session: &GameSession) -> Result<SimulationState, String> {
    let status = SessionStatus::from_u8(session.status)
        .ok_or_else(|| format!("Session {} has invalid status {}", session.id, session.status))?;
    let parameters = ctx
        .db
        .session_parameter()
        .iter()
        .filter(|sp| sp.session_id == session.id)
        .map(|sp| (sp.param_id, sp.value))
        .collect();
    Ok(SimulationState {
        parameters,
        hp: session.hp,
        elapsed_seconds: session.elapsed_seconds,
        seconds_since_decay: session.seconds_since_decay,
        status,
        loss_reason: session.loss_reason.and_then(LossReason::from_u8),
    })
}

pub fn load_decisions(ctx: &ReducerContext, session_id: u64) -> Vec<Decision> {
    let mut rows: Vec<SessionDecision> = ctx
        .db
        .session_decision()
        .iter()
        .filter(|d| d.session_id == session_id)
        .collect();
    rows.sort_by_key(|d| d.id);
    rows.into_iter()
        .map(|d| Decision {
            at_seconds: d.at_seconds,
            treatment_id: d.treatment_id,
            rank: d.rank,
            hp_delta: d.hp_delta,
        })
        .collect()
}

/// Summary of a finished session row. `None` while it is still playing.
pub fn summary_of(session: &GameSession) -> Option<SessionSummary> {
    let status = SessionStatus::from_u8(session.status)?;
    let finished_at = session.finished_at?;
    if !status.is_finished() {
        return None;
    }
    Some(SessionSummary {
        session_id: session.id,
        student_id: session.student_id,
        case_id: session.case_id,
        status,
        elapsed_seconds: session.elapsed_seconds,
        final_hp: session.hp,
        score: session.score,
        correct_decisions: session.correct_decisions,
        incorrect_decisions: session.incorrect_decisions,
        finished_at_micros: finished_at.to_micros_since_unix_epoch(),
    })
}

pub fn finished_summaries(ctx: &ReducerContext) -> Vec<SessionSummary> {
    ctx.db.game_session().iter().filter_map(|s| summary_of(&s)).collect()
}

// ============================================================================
// WRITING
// ============================================================================

/// Create a session row and its parameter rows from a case's initial values.
pub fn insert_session(
    ctx: &ReducerContext,
    student_id: StudentId,
    case_id: u64,
    initial: BTreeMap<u32, f64>,
    config: &SimulationConfig,
) -> GameSession {
    let state = SimulationState::new(initial, config);
    let session = ctx.db.game_session().insert(GameSession {
        id: 0,
        student_id,
        case_id,
        status: state.status.as_u8(),
        loss_reason: None,
        hp: state.hp,
        elapsed_seconds: 0,
        seconds_since_decay: 0,
        score: 0,
        correct_decisions: 0,
        incorrect_decisions: 0,
        started_at: ctx.timestamp,
        finished_at: None,
    });
    for (param_id, value) in state.parameters {
        ctx.db.session_parameter().insert(SessionParameter {
            id: 0,
            session_id: session.id,
            param_id,
            value,
        });
    }
    session
}

fn save_state(ctx: &ReducerContext, mut session: GameSession, state: &SimulationState) -> GameSession {
    for mut sp in ctx
        .db
        .session_parameter()
        .iter()
        .filter(|sp| sp.session_id == session.id)
    {
        if let Some(&value) = state.parameters.get(&sp.param_id) {
            if value != sp.value {
                sp.value = value;
                ctx.db.session_parameter().id().update(sp);
            }
        }
    }

    session.status = state.status.as_u8();
    session.loss_reason = state.loss_reason.map(|r| r as u8);
    session.hp = state.hp;
    session.elapsed_seconds = state.elapsed_seconds;
    session.seconds_since_decay = state.seconds_since_decay;
    if state.status.is_finished() && session.finished_at.is_none() {
        session.finished_at = Some(ctx.timestamp);
    }
    ctx.db.game_session().id().update(session)
}

pub fn notify(ctx: &ReducerContext, recipient: Identity, kind: u8, message: String, session_id: Option<u64>) {
    ctx.db.notification().insert(Notification {
        id: 0,
        recipient,
        kind,
        message,
        session_id,
        created_at: ctx.timestamp,
    });
}

fn identity_of(ctx: &ReducerContext, student_id: StudentId) -> Option<Identity> {
    ctx.db.user_account().id().find(student_id).map(|u| u.identity)
}

/// Notices worth a toast. Parameter and HP moves are visible in the
/// session tables already.
fn is_toast(notice: &Notice) -> bool {
    !matches!(notice, Notice::HpChanged { .. } | Notice::ParameterChanged { .. })
}

// ============================================================================
// STEP
// ============================================================================

/// Run one event through the reducer for `session` and persist the result.
pub fn step_session(ctx: &ReducerContext, mut session: GameSession, event: SimEvent) -> Result<(), String> {
    let case = ctx
        .db
        .clinical_case()
        .id()
        .find(session.case_id)
        .ok_or_else(|| format!("Case {} no longer exists", session.case_id))?;
    let config = load_config(ctx);
    let rules = case_rules(ctx, &case);
    let state = load_state(ctx, &session)?;

    if !state.is_playing() {
        return Err(format!("Session {} has already ended", session.id));
    }
    if let SimEvent::ApplyTreatment { treatment_id } = event {
        if !rules.effects.contains_key(&treatment_id) {
            return Err(format!("Unknown treatment {}", treatment_id));
        }
    }

    let step = reduce(&state, &event, &rules, &config);

    let recipient = ctx.sender;
    for notice in step.notices.iter().filter(|n| is_toast(n)) {
        notify(ctx, recipient, notice.kind(), notice.message(&rules), Some(session.id));
    }

    if let Some(d) = step.decision {
        ctx.db.session_decision().insert(SessionDecision {
            id: 0,
            session_id: session.id,
            at_seconds: d.at_seconds,
            treatment_id: d.treatment_id,
            rank: d.rank,
            hp_delta: d.hp_delta,
        });
        if d.is_correct() {
            session.correct_decisions += 1;
        } else {
            session.incorrect_decisions += 1;
        }
    }

    let session = save_state(ctx, session, &step.state);
    if step.state.status.is_finished() {
        finish_session(ctx, session, &step.state, &rules, &case, &config);
    }
    Ok(())
}

// ============================================================================
// FINISH PIPELINE
// ============================================================================

/// Score, badges, leaderboards, and feedback for a session that just ended.
fn finish_session(
    ctx: &ReducerContext,
    mut session: GameSession,
    state: &SimulationState,
    rules: &CaseRules,
    case: &ClinicalCase,
    config: &SimulationConfig,
) {
    let decisions = load_decisions(ctx, session.id);
    let summary = SessionSummary::from_state(
        session.id,
        session.student_id,
        session.case_id,
        state,
        &decisions,
        ctx.timestamp.to_micros_since_unix_epoch(),
        config,
    );
    session.score = summary.score;
    session.correct_decisions = summary.correct_decisions;
    session.incorrect_decisions = summary.incorrect_decisions;
    let session = ctx.db.game_session().id().update(session);

    log::info!(
        "Session {} finished: {} after {}s, score {}",
        session.id,
        summary.status.as_str(),
        summary.elapsed_seconds,
        summary.score
    );

    let student = identity_of(ctx, session.student_id);

    award_badges(ctx, session.student_id, session.id, student);
    rebuild_leaderboards(ctx);

    let feedback = session_feedback(&summary, state, &decisions, rules, case.condition);
    let detail_json = match serde_json::to_string(&feedback) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Could not serialize feedback for session {}: {}", session.id, e);
            String::new()
        }
    };
    ctx.db.session_feedback().insert(SessionFeedback {
        session_id: session.id,
        headline: feedback.headline.clone(),
        detail_json,
        created_at: ctx.timestamp,
    });
    if let Some(identity) = student {
        notify(ctx, identity, notice_kinds::INFO, feedback.render(), Some(session.id));
    }
}

fn award_badges(ctx: &ReducerContext, student_id: StudentId, session_id: u64, student: Option<Identity>) {
    let history: Vec<SessionSummary> = ctx
        .db
        .game_session()
        .iter()
        .filter(|s| s.student_id == student_id)
        .filter_map(|s| summary_of(&s))
        .collect();
    let awarded: Vec<BadgeKind> = ctx
        .db
        .badge_award()
        .iter()
        .filter(|b| b.student_id == student_id)
        .filter_map(|b| BadgeKind::from_u8(b.badge))
        .collect();

    for badge in evaluate_badges(&history, &awarded) {
        ctx.db.badge_award().insert(BadgeAward {
            id: 0,
            student_id,
            badge: badge as u8,
            session_id,
            awarded_at: ctx.timestamp,
        });
        log::info!("Student {} earned badge '{}'", student_id, badge.title());
        if let Some(identity) = student {
            notify(
                ctx,
                identity,
                notice_kinds::SUCCESS,
                format!("Badge earned: {} ({})", badge.title(), badge.description()),
                Some(session_id),
            );
        }
    }
}

fn entry_of(row: &LeaderboardRow) -> LeaderboardEntry {
    LeaderboardEntry {
        position: row.position,
        student_id: row.student_id,
        sessions: row.sessions,
        wins: row.wins,
        total_score: row.total_score,
        fastest_win_secs: row.fastest_win_secs,
    }
}

/// Replace the rows of one window and return the entries they held before.
fn replace_window(
    ctx: &ReducerContext,
    window: LeaderboardWindow,
    week_start_micros: i64,
    entries: &[LeaderboardEntry],
) -> Vec<LeaderboardEntry> {
    let old: Vec<LeaderboardRow> = ctx
        .db
        .leaderboard_entry()
        .iter()
        .filter(|r| r.window == window.as_u8())
        .collect();
    let mut previous: Vec<LeaderboardEntry> = old
        .iter()
        .filter(|r| r.week_start_micros == week_start_micros)
        .map(entry_of)
        .collect();
    previous.sort_by_key(|e| e.position);
    for row in old {
        ctx.db.leaderboard_entry().id().delete(row.id);
    }

    for e in entries {
        let student_name = ctx
            .db
            .user_account()
            .id()
            .find(e.student_id)
            .map(|u| u.name)
            .unwrap_or_default();
        ctx.db.leaderboard_entry().insert(LeaderboardRow {
            id: 0,
            window: window.as_u8(),
            week_start_micros,
            position: e.position,
            student_id: e.student_id,
            student_name,
            sessions: e.sessions,
            wins: e.wins,
            total_score: e.total_score,
            fastest_win_secs: e.fastest_win_secs,
        });
    }
    previous
}

/// Rebuild the all-time and current-week boards; notify students whose
/// all-time position changed.
pub fn rebuild_leaderboards(ctx: &ReducerContext) {
    let summaries = finished_summaries(ctx);
    let now = ctx.timestamp.to_micros_since_unix_epoch();

    let all_time = build_leaderboard(&summaries, LeaderboardWindow::AllTime);
    let previous = replace_window(ctx, LeaderboardWindow::AllTime, 0, &all_time);

    let weekly_window = LeaderboardWindow::Week(now);
    let week_start = week_bounds(now).map_or(0, |(start, _)| start);
    let weekly = build_leaderboard(&summaries, weekly_window);
    replace_window(ctx, weekly_window, week_start, &weekly);

    for change in rank_changes(&previous, &all_time) {
        if let Some(identity) = identity_of(ctx, change.student_id) {
            let kind = if change.from.is_none() || change.moved_up() {
                notice_kinds::SUCCESS
            } else {
                notice_kinds::INFO
            };
            notify(ctx, identity, kind, change.message(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb::Timestamp;

    #[test]
    fn test_merge_config_keeps_fields_left_out() {
        let current = SimulationConfig {
            hp_penalty_incorrect: 25,
            ..SimulationConfig::default()
        };
        let merged = merge_config(&current, r#"{"time_limit_secs": 120}"#).unwrap();
        assert_eq!(merged.time_limit_secs, 120);
        assert_eq!(merged.hp_penalty_incorrect, 25);
        assert_eq!(merged.initial_hp, current.initial_hp);
    }

    #[test]
    fn test_merge_config_rejects_unknown_field() {
        let err = merge_config(&SimulationConfig::default(), r#"{"time_limit": 120}"#).unwrap_err();
        assert!(err.contains("Unknown config field 'time_limit'"), "{}", err);
    }

    #[test]
    fn test_merge_config_rejects_non_object() {
        for patch in ["[1, 2]", "42", "\"fast\""] {
            let err = merge_config(&SimulationConfig::default(), patch).unwrap_err();
            assert_eq!(err, "Config overrides must be a JSON object");
        }
        let err = merge_config(&SimulationConfig::default(), "{oops").unwrap_err();
        assert!(err.starts_with("Invalid config JSON"), "{}", err);
    }

    #[test]
    fn test_merge_config_rejects_invalid_values() {
        let current = SimulationConfig::default();
        assert!(merge_config(&current, r#"{"hp_decay_interval_secs": 0}"#).is_err());
        assert!(merge_config(&current, r#"{"initial_hp": 100}"#).is_err());
        assert!(merge_config(
            &current,
            r#"{"time_limit_secs": 4294967295, "hp_decay_interval_secs": 4294967295, "max_advance_secs": 4294967295}"#
        )
        .is_err());
        assert!(merge_config(&current, r#"{"time_limit_secs": -5}"#).is_err());
    }

    #[test]
    fn test_clock_allowance_caps_at_wall_clock() {
        // Normal 1-second ticks pass through.
        assert_eq!(clock_allowance(1, 10, 31, 30), 1);
        // Per-call cap.
        assert_eq!(clock_allowance(60, 10, 500, 30), 10);
        // Cannot run ahead of real time.
        assert_eq!(clock_allowance(10, 10, 33, 30), 3);
        assert_eq!(clock_allowance(5, 10, 30, 30), 0);
        assert_eq!(clock_allowance(5, 10, 10, 30), 0);
        assert_eq!(clock_allowance(u32::MAX, u32::MAX, u64::MAX, 0), u32::MAX);
    }

    #[test]
    fn test_only_outcome_notices_become_toasts() {
        assert!(!is_toast(&Notice::HpChanged { from: 50, to: 49 }));
        assert!(!is_toast(&Notice::ParameterChanged {
            param: 1,
            from: 7.1,
            to: 7.2
        }));
        assert!(is_toast(&Notice::TreatmentCorrect {
            treatment_id: 1,
            rank: 1
        }));
        assert!(is_toast(&Notice::TreatmentIncorrect { treatment_id: 2 }));
        assert!(is_toast(&Notice::Won));
        assert!(is_toast(&Notice::Lost {
            reason: LossReason::TimeExpired
        }));
    }

    fn session(status: SessionStatus, finished_at: Option<Timestamp>) -> GameSession {
        GameSession {
            id: 7,
            student_id: 3,
            case_id: 2,
            status: status.as_u8(),
            loss_reason: None,
            hp: 100,
            elapsed_seconds: 42,
            seconds_since_decay: 2,
            score: 640,
            correct_decisions: 4,
            incorrect_decisions: 1,
            started_at: Timestamp::from_micros_since_unix_epoch(1_000_000),
            finished_at,
        }
    }

    #[test]
    fn test_summary_only_for_finished_sessions() {
        assert_eq!(summary_of(&session(SessionStatus::Playing, None)), None);
        // A finished status without a finish time is not counted yet.
        assert_eq!(summary_of(&session(SessionStatus::Won, None)), None);

        let done = Timestamp::from_micros_since_unix_epoch(43_000_000);
        let summary = summary_of(&session(SessionStatus::Won, Some(done))).unwrap();
        assert_eq!(summary.session_id, 7);
        assert_eq!(summary.student_id, 3);
        assert_eq!(summary.status, SessionStatus::Won);
        assert_eq!(summary.final_hp, 100);
        assert_eq!(summary.score, 640);
        assert_eq!(summary.finished_at_micros, 43_000_000);
    }
}
