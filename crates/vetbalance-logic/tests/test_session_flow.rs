//! Integration tests for a full play-through pipeline.
//!
//! Exercises: Catalog → CaseRules → reduce → SessionSummary → stats,
//! leaderboard, badges, feedback, and class report.
//!
//! All tests are pure logic: no SpacetimeDB, no rendering.

use vetbalance_logic::badges::{evaluate_badges, BadgeKind};
use vetbalance_logic::catalog::{Catalog, ClinicalCase};
use vetbalance_logic::config::SimulationConfig;
use vetbalance_logic::feedback::{hint, session_feedback};
use vetbalance_logic::ranking::{build_leaderboard, rank_changes, LeaderboardWindow};
use vetbalance_logic::report::{class_report, to_csv};
use vetbalance_logic::scoring::SessionSummary;
use vetbalance_logic::simulation::{reduce, CaseRules, Decision, SimEvent, SimulationState};
use vetbalance_logic::stats::PerformanceStats;
use vetbalance_logic::status::{LossReason, SessionStatus};

// ── Helpers ────────────────────────────────────────────────────────────

struct Played {
    state: SimulationState,
    decisions: Vec<Decision>,
}

fn play(rules: &CaseRules, case: &ClinicalCase, events: &[SimEvent], config: &SimulationConfig) -> Played {
    let mut state = SimulationState::new(case.initial_values.clone(), config);
    let mut decisions = Vec::new();
    for event in events {
        let step = reduce(&state, event, rules, config);
        if let Some(d) = step.decision {
            decisions.push(d);
        }
        state = step.state;
    }
    Played { state, decisions }
}

fn first_choice(rules: &CaseRules) -> u32 {
    rules
        .ranks
        .iter()
        .find(|(_, &r)| r == 1)
        .map(|(&t, _)| t)
        .expect("condition has a first-choice treatment")
}

fn wrong_choice(catalog: &Catalog, rules: &CaseRules) -> u32 {
    catalog
        .treatments
        .iter()
        .map(|t| t.id)
        .find(|id| rules.rank_of(*id).is_none())
        .expect("some treatment is not indicated")
}

/// Tick a few seconds between each first-choice treatment until won.
fn winning_script(rules: &CaseRules) -> Vec<SimEvent> {
    let t = first_choice(rules);
    let mut events = Vec::new();
    for _ in 0..5 {
        events.push(SimEvent::ClockTick { seconds: 7 });
        events.push(SimEvent::ApplyTreatment { treatment_id: t });
    }
    events
}

// ── Per-case playability ───────────────────────────────────────────────

#[test]
fn every_builtin_case_is_winnable_with_first_choice() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    for case in &catalog.cases {
        let rules = catalog.rules_for(case);
        let played = play(&rules, case, &winning_script(&rules), &config);
        assert_eq!(
            played.state.status,
            SessionStatus::Won,
            "case {} not winnable",
            case.id
        );
        assert_eq!(played.state.hp, 100);
        assert!(played.decisions.iter().all(|d| d.rank == Some(1)));
    }
}

#[test]
fn treatments_only_touch_tracked_parameters() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    for case in &catalog.cases {
        let rules = catalog.rules_for(case);
        for t in &catalog.treatments {
            let played = play(&rules, case, &[SimEvent::ApplyTreatment { treatment_id: t.id }], &config);
            let keys: Vec<_> = played.state.parameters.keys().collect();
            let expected: Vec<_> = case.initial_values.keys().collect();
            assert_eq!(keys, expected, "case {} treatment {}", case.id, t.id);
            for (id, v) in &played.state.parameters {
                assert!(rules.parameters[id].within_limits(*v));
            }
        }
    }
}

#[test]
fn idle_session_times_out_or_collapses() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    let case = &catalog.cases[0];
    let rules = catalog.rules_for(case);
    // 50 HP decays 1 per 5 s: reaches zero at 250 s, before the 300 s limit.
    let played = play(&rules, case, &[SimEvent::ClockTick { seconds: 400 }], &config);
    assert_eq!(played.state.status, SessionStatus::Lost);
    assert_eq!(played.state.loss_reason, Some(LossReason::HpDepleted));
    assert_eq!(played.state.elapsed_seconds, 250);
}

#[test]
fn repeated_wrong_treatments_lose() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    let case = &catalog.cases[1];
    let rules = catalog.rules_for(case);
    let wrong = wrong_choice(&catalog, &rules);
    let events = vec![SimEvent::ApplyTreatment { treatment_id: wrong }; 5];
    let played = play(&rules, case, &events, &config);
    assert_eq!(played.state.status, SessionStatus::Lost);
    assert_eq!(played.decisions.len(), 5);
    assert!(played.decisions.iter().all(|d| !d.is_correct()));
}

// ── Downstream aggregation ─────────────────────────────────────────────

#[test]
fn summaries_feed_stats_rankings_badges_and_reports() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    let now = 1_704_283_200_000_000i64;

    let mut summaries = Vec::new();
    let mut session_id = 0;
    for (student, wins) in [(1u64, 3usize), (2, 1)] {
        for (i, case) in catalog.cases.iter().take(3).enumerate() {
            let rules = catalog.rules_for(case);
            let events = if i < wins {
                winning_script(&rules)
            } else {
                vec![SimEvent::ClockTick { seconds: 400 }]
            };
            let played = play(&rules, case, &events, &config);
            session_id += 1;
            summaries.push(SessionSummary::from_state(
                session_id,
                student,
                case.id,
                &played.state,
                &played.decisions,
                now + session_id as i64,
                &config,
            ));
        }
    }

    let s1: Vec<_> = summaries.iter().filter(|s| s.student_id == 1).cloned().collect();
    let stats = PerformanceStats::from_sessions(&s1);
    assert_eq!(stats.wins, 3);
    assert_eq!(stats.losses, 0);

    let board = build_leaderboard(&summaries, LeaderboardWindow::Week(now));
    assert_eq!(board[0].student_id, 1);
    assert_eq!(board[1].student_id, 2);
    assert!(rank_changes(&[], &board).iter().all(|c| c.from.is_none()));

    let badges = evaluate_badges(&s1, &[]);
    assert!(badges.contains(&BadgeKind::FirstWin));
    assert!(badges.contains(&BadgeKind::WinStreak));
    assert!(badges.contains(&BadgeKind::FlawlessTreatment));

    let csv = to_csv(&class_report(
        &[(1, "Ana".into()), (2, "Bruno".into())],
        &summaries,
    ));
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("\n1,Ana,3,3,0,1.000,"));
}

#[test]
fn hint_then_feedback_round() {
    let catalog = Catalog::builtin().unwrap();
    let config = SimulationConfig::default();
    let case = &catalog.cases[3];
    let rules = catalog.rules_for(case);

    let start = SimulationState::new(case.initial_values.clone(), &config);
    let h = hint(&start, &rules, &[]);
    let suggested = h.suggested_treatment.expect("a treatment is suggested");
    assert_eq!(rules.rank_of(suggested), Some(1));

    let played = play(&rules, case, &winning_script(&rules), &config);
    let summary = SessionSummary::from_state(1, 1, case.id, &played.state, &played.decisions, 0, &config);
    let fb = session_feedback(&summary, &played.state, &played.decisions, &rules, case.condition);
    assert!(fb.headline.starts_with("Patient stabilized"));
    assert!(fb.strengths.iter().any(|s| s.contains("first-line")));
}
