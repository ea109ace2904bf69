//! SpacetimeDB table definitions for the training backend.
//!
//! Catalog tables mirror `vetbalance_logic::catalog`; session tables hold
//! the persisted `SimulationState` of every play-through so any client can
//! resume or review it.

use spacetimedb::{table, Identity, Timestamp};

// ============================================================================
// ACCOUNTS
// ============================================================================

/// Registered person, either a professor or a student
#[table(name = user_account, public)]
#[derive(Clone)]
pub struct UserAccount {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[unique]
    pub identity: Identity,
    pub name: String,
    pub role: u8, // roles::*
    pub created_at: Timestamp,
}

/// Currently connected client
#[table(name = connected_user, public)]
pub struct ConnectedUser {
    #[primary_key]
    pub identity: Identity,
    pub user_id: Option<u64>,
    pub connected_at: Timestamp,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine configuration singleton (id always 0)
#[table(name = sim_config, public)]
#[derive(Clone)]
pub struct SimConfig {
    #[primary_key]
    pub id: u32,
    pub initial_hp: u8,
    pub hp_decay_interval_secs: u32,
    pub hp_decay_amount: u8,
    pub time_limit_secs: u32,
    pub hp_bonus_primary: u8,
    pub hp_bonus_secondary: u8,
    pub hp_bonus_supportive: u8,
    pub hp_penalty_incorrect: u8,
    pub max_advance_secs: u32,
    pub score_win_base: u32,
    pub score_time_bonus_per_sec: u32,
    pub score_per_correct: u32,
    pub score_per_incorrect: u32,
}

// ============================================================================
// CATALOG
// ============================================================================

/// Monitored blood-gas or chemistry parameter
#[table(name = parameter_def, public)]
#[derive(Clone)]
pub struct Parameter {
    #[primary_key]
    pub id: u32,
    pub name: String,
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    pub min_value: f64,
    pub max_value: f64,
}

#[table(name = treatment, public)]
#[derive(Clone)]
pub struct Treatment {
    #[primary_key]
    pub id: u32,
    pub name: String,
    pub description: String,
}

/// Signed change a treatment applies to one parameter
#[table(name = treatment_effect, public)]
#[derive(Clone)]
pub struct TreatmentEffect {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub treatment_id: u32,
    pub param_id: u32,
    pub delta: f64,
}

/// Treatment indicated for a condition, ranked (1 = first choice)
#[table(name = correct_treatment, public)]
#[derive(Clone)]
pub struct CorrectTreatment {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub condition: u8, // conditions::*
    pub treatment_id: u32,
    pub rank: u8,
}

#[table(name = clinical_case, public)]
#[derive(Clone)]
pub struct ClinicalCase {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub title: String,
    pub species: u8,   // species::*
    pub condition: u8, // conditions::*
    pub description: String,
    pub difficulty: u8, // difficulty::*
    /// Playable by any student without a class assignment
    pub public: bool,
    /// None for built-in cases
    pub author: Option<Identity>,
    pub created_at: Timestamp,
}

/// Initial value of one parameter in a case
#[table(name = case_parameter, public)]
#[derive(Clone)]
pub struct CaseParameter {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub case_id: u64,
    pub param_id: u32,
    pub initial_value: f64,
}

// ============================================================================
// CLASSES
// ============================================================================

#[table(name = class, public)]
#[derive(Clone)]
pub struct Class {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub name: String,
    #[unique]
    pub join_code: String,
    pub professor: Identity,
    pub created_at: Timestamp,
}

#[table(name = class_enrollment, public)]
pub struct ClassEnrollment {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub class_id: u64,
    pub student_id: u64,
    pub joined_at: Timestamp,
}

/// Case assigned to a class
#[table(name = class_case, public)]
pub struct ClassCase {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub class_id: u64,
    pub case_id: u64,
}

// ============================================================================
// GAMEPLAY
// ============================================================================

/// One play-through of a case by a student
#[table(name = game_session, public)]
#[derive(Clone)]
pub struct GameSession {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub student_id: u64,
    pub case_id: u64,
    pub status: u8,              // SessionStatus as u8
    pub loss_reason: Option<u8>, // LossReason as u8
    pub hp: u8,
    pub elapsed_seconds: u32,
    pub seconds_since_decay: u32,
    pub score: u32,
    pub correct_decisions: u32,
    pub incorrect_decisions: u32,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// Current value of one parameter in a session
#[table(name = session_parameter, public)]
#[derive(Clone)]
pub struct SessionParameter {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub session_id: u64,
    pub param_id: u32,
    pub value: f64,
}

/// Accepted treatment, in the order applied
#[table(name = session_decision, public)]
#[derive(Clone)]
pub struct SessionDecision {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub session_id: u64,
    pub at_seconds: u32,
    pub treatment_id: u32,
    /// None if the treatment was not indicated
    pub rank: Option<u8>,
    pub hp_delta: i16,
}

/// Post-session debrief
#[table(name = session_feedback, public)]
pub struct SessionFeedback {
    #[primary_key]
    pub session_id: u64,
    pub headline: String,
    /// Full `Feedback` serialized as JSON
    pub detail_json: String,
    pub created_at: Timestamp,
}

// ============================================================================
// NOTIFICATIONS, BADGES, RANKINGS, REPORTS
// ============================================================================

/// Toast shown to one user until dismissed
#[table(name = notification, public)]
pub struct Notification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub kind: u8, // notice_kinds::*
    pub message: String,
    pub session_id: Option<u64>,
    pub created_at: Timestamp,
}

#[table(name = badge_award, public)]
pub struct BadgeAward {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub student_id: u64,
    pub badge: u8, // BadgeKind as u8
    /// Session that earned it
    pub session_id: u64,
    pub awarded_at: Timestamp,
}

/// Materialized leaderboard position, rebuilt whenever a session finishes
#[table(name = leaderboard_entry, public)]
#[derive(Clone)]
pub struct LeaderboardRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub window: u8, // LeaderboardWindow as u8
    /// Start of the week for weekly rows, 0 for all-time
    pub week_start_micros: i64,
    pub position: u32,
    pub student_id: u64,
    pub student_name: String,
    pub sessions: u32,
    pub wins: u32,
    pub total_score: u64,
    pub fastest_win_secs: Option<u32>,
}

/// Materialized class report line, rebuilt on request
#[table(name = class_report_row, public)]
pub struct ClassReportLine {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub class_id: u64,
    pub student_id: u64,
    pub student_name: String,
    pub sessions: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub best_score: u32,
    pub average_duration_secs: f64,
    pub generated_at: Timestamp,
}

