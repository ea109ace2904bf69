//! Patient simulation: HP decay, treatment effects, win/loss detection.
//!
//! The engine is a pure reducer: `(state, event) -> state`. The caller owns
//! the clock and feeds elapsed seconds in as `SimEvent::ClockTick`, so the
//! same code drives the SpacetimeDB module and the headless harness.
//!
//! Per simulated second while playing:
//! 1. advance the clock
//! 2. every `hp_decay_interval_secs`, drop `hp_decay_amount` HP (0 HP loses)
//! 3. at `time_limit_secs`, the session is lost
//!
//! Treatments move HP by an amount set by their rank for the case's
//! condition, and shift parameters by their tabulated effects. 100 HP wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{SimulationConfig, MAX_HP};
use crate::constants::{ParamId, TreatmentId};
use crate::parameters::ParameterDef;
use crate::status::{LossReason, SessionStatus};

/// Per-case lookup tables the reducer reads from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRules {
    /// Definitions of the parameters this case tracks.
    pub parameters: BTreeMap<ParamId, ParameterDef>,
    /// Treatment → parameter → signed delta.
    pub effects: BTreeMap<TreatmentId, BTreeMap<ParamId, f64>>,
    /// Treatment → rank for the case's condition (1 = first choice).
    pub ranks: BTreeMap<TreatmentId, u8>,
    pub treatment_names: BTreeMap<TreatmentId, String>,
}

impl CaseRules {
    pub fn add_parameter(&mut self, def: ParameterDef) {
        self.parameters.insert(def.id, def);
    }

    pub fn add_treatment(&mut self, id: TreatmentId, effects: BTreeMap<ParamId, f64>) {
        self.effects.insert(id, effects);
    }

    pub fn name_treatment(&mut self, id: TreatmentId, name: impl Into<String>) {
        self.treatment_names.insert(id, name.into());
    }

    pub fn set_rank(&mut self, id: TreatmentId, rank: u8) {
        self.ranks.insert(id, rank);
    }

    pub fn rank_of(&self, id: TreatmentId) -> Option<u8> {
        self.ranks.get(&id).copied()
    }

    pub fn parameter_name(&self, id: ParamId) -> String {
        self.parameters
            .get(&id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("parameter {}", id))
    }

    pub fn treatment_name(&self, id: TreatmentId) -> String {
        self.treatment_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("treatment {}", id))
    }
}

/// Live state of one play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub parameters: BTreeMap<ParamId, f64>,
    pub hp: u8,
    pub elapsed_seconds: u32,
    /// Seconds accumulated toward the next HP decay step.
    pub seconds_since_decay: u32,
    pub status: SessionStatus,
    pub loss_reason: Option<LossReason>,
}

impl SimulationState {
    pub fn new(initial_parameters: BTreeMap<ParamId, f64>, config: &SimulationConfig) -> Self {
        Self {
            parameters: initial_parameters,
            hp: config.initial_hp.min(MAX_HP),
            elapsed_seconds: 0,
            seconds_since_decay: 0,
            status: SessionStatus::Playing,
            loss_reason: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == SessionStatus::Playing
    }

    pub fn remaining_seconds(&self, config: &SimulationConfig) -> u32 {
        config.time_limit_secs.saturating_sub(self.elapsed_seconds)
    }

    fn lose(&mut self, reason: LossReason) {
        self.status = SessionStatus::Lost;
        self.loss_reason = Some(reason);
    }
}

/// Input to the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Simulated seconds elapsed since the previous tick.
    ClockTick { seconds: u32 },
    ApplyTreatment { treatment_id: TreatmentId },
    Abandon,
}

/// One accepted treatment, as recorded in the session's decision log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub at_seconds: u32,
    pub treatment_id: TreatmentId,
    /// Rank for the case's condition; `None` if not indicated.
    pub rank: Option<u8>,
    pub hp_delta: i16,
}

impl Decision {
    pub fn is_correct(&self) -> bool {
        self.rank.is_some()
    }
}

/// Something the player should be told about (rendered as a toast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    HpChanged { from: u8, to: u8 },
    ParameterChanged { param: ParamId, from: f64, to: f64 },
    TreatmentCorrect { treatment_id: TreatmentId, rank: u8 },
    TreatmentIncorrect { treatment_id: TreatmentId },
    UnknownTreatment { treatment_id: TreatmentId },
    Won,
    Lost { reason: LossReason },
    /// The event arrived after the session ended and was ignored.
    SessionOver,
}

impl Notice {
    /// Severity bucket, one of `constants::notice_kinds`.
    pub fn kind(&self) -> u8 {
        use crate::constants::notice_kinds;
        match self {
            Self::HpChanged { from, to } if to < from => notice_kinds::WARNING,
            Self::HpChanged { .. } | Self::ParameterChanged { .. } => notice_kinds::INFO,
            Self::TreatmentCorrect { .. } | Self::Won => notice_kinds::SUCCESS,
            Self::TreatmentIncorrect { .. } | Self::Lost { .. } => notice_kinds::WARNING,
            Self::UnknownTreatment { .. } | Self::SessionOver => notice_kinds::ERROR,
        }
    }

    pub fn message(&self, rules: &CaseRules) -> String {
        match self {
            Self::HpChanged { from, to } => format!("HP {} → {}", from, to),
            Self::ParameterChanged { param, from, to } => format!(
                "{}: {:.2} → {:.2}",
                rules.parameter_name(*param),
                from,
                to
            ),
            Self::TreatmentCorrect { treatment_id, rank } => format!(
                "{} is indicated (choice #{})",
                rules.treatment_name(*treatment_id),
                rank
            ),
            Self::TreatmentIncorrect { treatment_id } => format!(
                "{} is not indicated for this patient",
                rules.treatment_name(*treatment_id)
            ),
            Self::UnknownTreatment { treatment_id } => {
                format!("Unknown treatment {}", treatment_id)
            }
            Self::Won => "Patient stabilized!".to_string(),
            Self::Lost { reason } => format!("Session lost: {}", reason.describe()),
            Self::SessionOver => "This session has already ended".to_string(),
        }
    }
}

/// Output of one reducer step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: SimulationState,
    pub notices: Vec<Notice>,
    /// Set when a treatment was accepted.
    pub decision: Option<Decision>,
}

/// Apply one event to a state.
pub fn reduce(
    state: &SimulationState,
    event: &SimEvent,
    rules: &CaseRules,
    config: &SimulationConfig,
) -> StepResult {
    let mut next = state.clone();
    let mut notices = Vec::new();

    if !state.is_playing() {
        notices.push(Notice::SessionOver);
        return StepResult {
            state: next,
            notices,
            decision: None,
        };
    }

    let decision = match *event {
        SimEvent::ClockTick { seconds } => {
            advance_clock(&mut next, seconds, config, &mut notices);
            None
        }
        SimEvent::ApplyTreatment { treatment_id } => {
            apply_treatment(&mut next, treatment_id, rules, config, &mut notices)
        }
        SimEvent::Abandon => {
            next.lose(LossReason::Abandoned);
            None
        }
    };

    match next.status {
        SessionStatus::Won => notices.push(Notice::Won),
        SessionStatus::Lost => {
            if let Some(reason) = next.loss_reason {
                notices.push(Notice::Lost { reason });
            }
        }
        SessionStatus::Playing => {}
    }

    StepResult {
        state: next,
        notices,
        decision,
    }
}

fn advance_clock(
    state: &mut SimulationState,
    seconds: u32,
    config: &SimulationConfig,
    notices: &mut Vec<Notice>,
) {
    let hp_before = state.hp;
    for _ in 0..seconds {
        state.elapsed_seconds = state.elapsed_seconds.saturating_add(1);
        state.seconds_since_decay += 1;

        if state.seconds_since_decay >= config.hp_decay_interval_secs {
            state.seconds_since_decay = 0;
            state.hp = state.hp.saturating_sub(config.hp_decay_amount);
            if state.hp == 0 {
                state.lose(LossReason::HpDepleted);
                break;
            }
        }

        if state.elapsed_seconds >= config.time_limit_secs {
            state.lose(LossReason::TimeExpired);
            break;
        }
    }
    if state.hp != hp_before {
        notices.push(Notice::HpChanged {
            from: hp_before,
            to: state.hp,
        });
    }
}

fn apply_treatment(
    state: &mut SimulationState,
    treatment_id: TreatmentId,
    rules: &CaseRules,
    config: &SimulationConfig,
    notices: &mut Vec<Notice>,
) -> Option<Decision> {
    let Some(effects) = rules.effects.get(&treatment_id) else {
        notices.push(Notice::UnknownTreatment { treatment_id });
        return None;
    };

    let rank = rules.rank_of(treatment_id);
    match rank {
        Some(rank) => notices.push(Notice::TreatmentCorrect { treatment_id, rank }),
        None => notices.push(Notice::TreatmentIncorrect { treatment_id }),
    }

    for (param, delta) in effects {
        let Some(value) = state.parameters.get_mut(param) else {
            continue;
        };
        let from = *value;
        let raw = from + delta;
        let to = match rules.parameters.get(param) {
            Some(def) => def.clamp(raw),
            None => raw,
        };
        if to != from {
            *value = to;
            notices.push(Notice::ParameterChanged {
                param: *param,
                from,
                to,
            });
        }
    }

    let hp_delta = config.treatment_hp_delta(rank);
    let hp_before = state.hp;
    state.hp = (i16::from(state.hp) + hp_delta).clamp(0, i16::from(MAX_HP)) as u8;
    if state.hp != hp_before {
        notices.push(Notice::HpChanged {
            from: hp_before,
            to: state.hp,
        });
    }

    if state.hp >= MAX_HP {
        state.status = SessionStatus::Won;
    } else if state.hp == 0 {
        state.lose(LossReason::HpDepleted);
    }

    Some(Decision {
        at_seconds: state.elapsed_seconds,
        treatment_id,
        rank,
        hp_delta: i16::from(state.hp) - i16::from(hp_before),
    })
}
