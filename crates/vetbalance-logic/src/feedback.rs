//! Rule-based hints during play and a debrief after the session ends.

use serde::{Deserialize, Serialize};

use crate::constants::{conditions, params, ParamId, TreatmentId};
use crate::parameters::{interpret_acid_base, AcidBaseDisorder, ParameterStatus, Reading};
use crate::scoring::SessionSummary;
use crate::simulation::{CaseRules, Decision, SimulationState};
use crate::status::SessionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub message: String,
    /// Parameter furthest from its normal band, if any are abnormal.
    pub focus_param: Option<ParamId>,
    pub suggested_treatment: Option<TreatmentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub headline: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub acid_base: Option<AcidBaseDisorder>,
}

impl Feedback {
    /// Flatten into a single text block for storage or display.
    pub fn render(&self) -> String {
        let mut out = self.headline.clone();
        if let Some(ab) = self.acid_base {
            out.push_str(&format!("\nFinal blood gas: {}.", ab.label()));
        }
        for s in &self.strengths {
            out.push_str(&format!("\n+ {}", s));
        }
        for i in &self.improvements {
            out.push_str(&format!("\n- {}", i));
        }
        out
    }
}

/// Interpret the blood gas in `state` if the case tracks pH, PaCO2, and HCO3.
pub fn acid_base_status(state: &SimulationState, rules: &CaseRules) -> Option<AcidBaseDisorder> {
    Some(interpret_acid_base(
        reading(params::PH, state, rules)?,
        reading(params::PACO2, state, rules)?,
        reading(params::HCO3, state, rules)?,
    ))
}

fn reading<'a>(id: ParamId, state: &SimulationState, rules: &'a CaseRules) -> Option<Reading<'a>> {
    Some(Reading {
        def: rules.parameters.get(&id)?,
        value: *state.parameters.get(&id)?,
    })
}

/// The abnormal parameter with the largest normalized deviation.
fn most_deviated(state: &SimulationState, rules: &CaseRules) -> Option<(ParamId, ParameterStatus)> {
    state
        .parameters
        .iter()
        .filter_map(|(&id, &value)| {
            let def = rules.parameters.get(&id)?;
            let dev = def.deviation(value);
            (dev > 0.0).then_some((id, def.classify(value), dev))
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(id, status, _)| (id, status))
}

/// Best-ranked indicated treatment the student has not applied yet, falling
/// back to the first choice once everything has been tried.
fn next_treatment(rules: &CaseRules, decisions: &[Decision]) -> Option<TreatmentId> {
    let mut ranked: Vec<(u8, TreatmentId)> = rules.ranks.iter().map(|(&t, &r)| (r, t)).collect();
    ranked.sort();
    ranked
        .iter()
        .find(|(_, t)| !decisions.iter().any(|d| d.treatment_id == *t))
        .or_else(|| ranked.first())
        .map(|&(_, t)| t)
}

pub fn hint(state: &SimulationState, rules: &CaseRules, decisions: &[Decision]) -> Hint {
    let focus = most_deviated(state, rules);
    let suggested = next_treatment(rules, decisions);

    let mut message = match focus {
        Some((param, status)) => format!(
            "{} is the most abnormal value ({}).",
            rules.parameter_name(param),
            status.label()
        ),
        None => "All monitored parameters are within normal range.".to_string(),
    };
    if let Some(ab) = acid_base_status(state, rules).filter(|ab| *ab != AcidBaseDisorder::Normal) {
        message.push_str(&format!(" The blood gas suggests {}.", ab.label()));
    }
    if let Some(t) = suggested {
        message.push_str(&format!(" Consider {}.", rules.treatment_name(t)));
    }

    Hint {
        message,
        focus_param: focus.map(|(p, _)| p),
        suggested_treatment: suggested,
    }
}

fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Debrief for a finished session.
pub fn session_feedback(
    summary: &SessionSummary,
    state: &SimulationState,
    decisions: &[Decision],
    rules: &CaseRules,
    condition: u8,
) -> Feedback {
    let headline = match (summary.status, state.loss_reason) {
        (SessionStatus::Won, _) => format!(
            "Patient stabilized in {} with a score of {}.",
            format_clock(summary.elapsed_seconds),
            summary.score
        ),
        (_, Some(reason)) => format!(
            "Patient lost after {}: {}.",
            format_clock(summary.elapsed_seconds),
            reason.describe()
        ),
        _ => format!("Session ended after {}.", format_clock(summary.elapsed_seconds)),
    };

    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    let first_choice = rules
        .ranks
        .iter()
        .find(|(_, &r)| r == 1)
        .map(|(&t, _)| t);
    if let Some(t) = first_choice {
        match decisions.iter().find(|d| d.treatment_id == t) {
            Some(d) => strengths.push(format!(
                "Used the first-line treatment ({}) at {}.",
                rules.treatment_name(t),
                format_clock(d.at_seconds)
            )),
            None => improvements.push(format!(
                "The first-line treatment for {} is {}.",
                conditions::name(condition).to_lowercase(),
                rules.treatment_name(t)
            )),
        }
    }

    if summary.correct_decisions > 0 {
        strengths.push(format!(
            "{} indicated treatment(s) applied.",
            summary.correct_decisions
        ));
    }
    if summary.incorrect_decisions == 0 && !decisions.is_empty() {
        strengths.push("No contraindicated treatments.".to_string());
    }

    for d in decisions.iter().filter(|d| !d.is_correct()) {
        improvements.push(format!(
            "{} is not indicated for {} (cost {} HP).",
            rules.treatment_name(d.treatment_id),
            conditions::name(condition).to_lowercase(),
            -d.hp_delta
        ));
    }

    for (&id, &value) in &state.parameters {
        if let Some(def) = rules.parameters.get(&id) {
            let status = def.classify(value);
            if status != ParameterStatus::Normal {
                improvements.push(format!(
                    "{} finished {} ({:.2} {}; normal {:.2}–{:.2}).",
                    def.name,
                    status.label(),
                    value,
                    def.unit,
                    def.normal_min,
                    def.normal_max
                ));
            }
        }
    }

    if decisions.is_empty() {
        improvements.push("No treatment was applied; HP only decays without intervention.".to_string());
    }

    Feedback {
        headline,
        strengths,
        improvements,
        acid_base: acid_base_status(state, rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::SimulationConfig;
    use crate::simulation::{reduce, SimEvent};
    use crate::status::LossReason;

    fn dka_case() -> (Catalog, CaseRules, SimulationState, u8) {
        let catalog = Catalog::builtin().unwrap();
        let case = catalog
            .cases
            .iter()
            .find(|c| c.condition == conditions::DIABETIC_KETOACIDOSIS)
            .unwrap()
            .clone();
        let rules = catalog.rules_for(&case);
        let state = SimulationState::new(case.initial_values.clone(), &SimulationConfig::default());
        (catalog, rules, state, case.condition)
    }

    #[test]
    fn test_hint_points_at_abnormal_value_and_first_choice() {
        let (_, rules, state, _) = dka_case();
        let h = hint(&state, &rules, &[]);
        assert!(h.focus_param.is_some());
        let first = rules.ranks.iter().find(|(_, &r)| r == 1).map(|(&t, _)| t);
        assert_eq!(h.suggested_treatment, first);
        assert!(h.message.contains("metabolic acidosis"), "{}", h.message);
    }

    #[test]
    fn test_hint_skips_tried_treatments() {
        let (_, rules, state, _) = dka_case();
        let first = rules.ranks.iter().find(|(_, &r)| r == 1).map(|(&t, _)| t).unwrap();
        let second = rules.ranks.iter().find(|(_, &r)| r == 2).map(|(&t, _)| t).unwrap();
        let tried = [Decision { at_seconds: 5, treatment_id: first, rank: Some(1), hp_delta: 15 }];
        assert_eq!(hint(&state, &rules, &tried).suggested_treatment, Some(second));
    }

    #[test]
    fn test_hint_when_everything_normal() {
        let (_, rules, mut state, _) = dka_case();
        for (id, v) in state.parameters.iter_mut() {
            *v = rules.parameters[id].normal_midpoint();
        }
        let h = hint(&state, &rules, &[]);
        assert_eq!(h.focus_param, None);
        assert!(h.message.starts_with("All monitored parameters"));
    }

    #[test]
    fn test_feedback_for_timeout_without_treatment() {
        let (_, rules, state, condition) = dka_case();
        let config = SimulationConfig::default();
        let mut s = state;
        s.hp = 99;
        let end = reduce(&s, &SimEvent::ClockTick { seconds: 300 }, &rules, &config).state;
        assert_eq!(end.loss_reason, Some(LossReason::TimeExpired));
        let summary = SessionSummary::from_state(1, 1, 1, &end, &[], 0, &config);
        let fb = session_feedback(&summary, &end, &[], &rules, condition);
        assert!(fb.headline.contains("time ran out"));
        assert!(fb.strengths.is_empty());
        assert!(fb.improvements.iter().any(|i| i.contains("first-line")));
        assert!(fb.improvements.iter().any(|i| i.contains("No treatment")));
        assert!(fb.render().contains("Final blood gas"));
    }

    #[test]
    fn test_feedback_lists_incorrect_decisions() {
        let (catalog, rules, state, condition) = dka_case();
        let wrong = catalog
            .treatments
            .iter()
            .find(|t| rules.rank_of(t.id).is_none())
            .unwrap()
            .id;
        let decisions = [Decision { at_seconds: 12, treatment_id: wrong, rank: None, hp_delta: -10 }];
        let config = SimulationConfig::default();
        let summary = SessionSummary::from_state(1, 1, 1, &state, &decisions, 0, &config);
        let fb = session_feedback(&summary, &state, &decisions, &rules, condition);
        assert!(fb
            .improvements
            .iter()
            .any(|i| i.contains("not indicated") && i.contains("10 HP")));
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(75), "1:15");
        assert_eq!(format_clock(300), "5:00");
    }
}
