//! VetBalance Headless Training Harness
//!
//! Validates the built-in catalog and the patient engine without
//! SpacetimeDB, then plays a scripted cohort through scoring, badges,
//! leaderboards, feedback, and the class report.
//! Runs entirely in-process: no DB, no networking, no rendering.
//!
//! Usage:
//!   cargo run -p vetbalance-simtest
//!   cargo run -p vetbalance-simtest -- --verbose
//!   cargo run -p vetbalance-simtest -- --config tuning.json --seed-sessions 12
//!   cargo run -p vetbalance-simtest -- --export csv > report.csv

use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use vetbalance_logic::badges::{evaluate_badges, BadgeKind};
use vetbalance_logic::catalog::{Catalog, ClinicalCase};
use vetbalance_logic::config::SimulationConfig;
use vetbalance_logic::constants::{conditions, params, species, StudentId, TreatmentId};
use vetbalance_logic::feedback::{acid_base_status, hint, session_feedback};
use vetbalance_logic::parameters::AcidBaseDisorder;
use vetbalance_logic::ranking::{build_leaderboard, rank_changes, week_bounds, LeaderboardWindow};
use vetbalance_logic::report::{class_report, to_csv, to_json, ClassReportRow};
use vetbalance_logic::scoring::SessionSummary;
use vetbalance_logic::simulation::{reduce, CaseRules, Decision, SimEvent, SimulationState};
use vetbalance_logic::stats::PerformanceStats;
use vetbalance_logic::status::{LossReason, SessionStatus};

// ── CLI ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print every check, not only failures
    #[arg(short, long)]
    verbose: bool,

    /// Engine config JSON; missing fields use the defaults
    #[arg(short, long)]
    config: Option<String>,

    /// Students in the scripted cohort
    #[arg(short, long, default_value_t = 6)]
    seed_sessions: u32,

    /// Print the cohort's class report after the checks
    #[arg(short, long, value_enum)]
    export: Option<ExportFormat>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let args = Args::parse();
    let verbose = args.verbose;
    // Exports go to stdout, so the progress banner goes to stderr.
    eprintln!("=== VetBalance Training Harness ===\n");

    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {}", e);
            std::process::exit(2);
        }
    };

    let catalog = match Catalog::builtin() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("  ✗ catalog_load: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Catalog consistency
    results.extend(validate_catalog(&catalog, verbose));

    // 2. Engine timing contract
    results.extend(validate_engine(&catalog, &config));

    // 3. Presenting blood gas per condition
    results.extend(validate_acid_base(&catalog, verbose));

    // 4. Scripted play-through of every case
    results.extend(validate_playthroughs(&catalog, &config, verbose));

    // 5. Hints & debriefs
    results.extend(validate_feedback(&catalog, &config));

    // 6. Cohort: stats, badges, leaderboards, report
    let (cohort_results, report) = validate_cohort(&catalog, &config, args.seed_sessions, verbose);
    results.extend(cohort_results);

    // ── Summary ──
    eprintln!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            eprintln!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    eprintln!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    match args.export {
        Some(ExportFormat::Csv) => print!("{}", to_csv(&report)),
        Some(ExportFormat::Json) => match to_json(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("export error: {}", e),
        },
        None => {}
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<SimulationConfig, String> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
    SimulationConfig::from_json(&json).map_err(|e| format!("{}: {}", path, e))
}

// ── Play helpers ────────────────────────────────────────────────────────

struct Outcome {
    state: SimulationState,
    decisions: Vec<Decision>,
}

fn play(rules: &CaseRules, case: &ClinicalCase, events: &[SimEvent], config: &SimulationConfig) -> Outcome {
    let mut state = SimulationState::new(case.initial_values.clone(), config);
    let mut decisions = Vec::new();
    for event in events {
        let step = reduce(&state, event, rules, config);
        decisions.extend(step.decision);
        state = step.state;
        if !state.is_playing() {
            break;
        }
    }
    Outcome { state, decisions }
}

fn ranked(rules: &CaseRules, rank: u8) -> Option<TreatmentId> {
    rules
        .ranks
        .iter()
        .find(|(_, &r)| r == rank)
        .map(|(&t, _)| t)
}

fn not_indicated(rules: &CaseRules) -> Option<TreatmentId> {
    rules.effects.keys().copied().find(|t| rules.rank_of(*t).is_none())
}

/// Apply `treatment` every `gap` seconds until the session ends.
fn repeat_script(treatment: TreatmentId, gap: u32, config: &SimulationConfig) -> Vec<SimEvent> {
    let rounds = config.time_limit_secs / gap.max(1) + 1;
    (0..rounds)
        .flat_map(|_| {
            [
                SimEvent::ClockTick { seconds: gap },
                SimEvent::ApplyTreatment { treatment_id: treatment },
            ]
        })
        .collect()
}

fn idle_script(config: &SimulationConfig) -> Vec<SimEvent> {
    vec![SimEvent::ClockTick {
        seconds: config.time_limit_secs,
    }]
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    eprintln!("--- Catalog ---");
    let mut results = Vec::new();

    results.push(check(
        "catalog_valid",
        catalog.validate().is_ok(),
        format!(
            "{} parameters, {} treatments, {} rankings, {} cases",
            catalog.parameters.len(),
            catalog.treatments.len(),
            catalog.correct_treatments.len(),
            catalog.cases.len()
        ),
    ));

    let gas = [params::PH, params::PACO2, params::HCO3];
    let missing_gas: Vec<_> = catalog
        .cases
        .iter()
        .filter(|c| !gas.iter().all(|p| c.initial_values.contains_key(p)))
        .map(|c| c.id)
        .collect();
    results.push(check(
        "catalog_cases_track_blood_gas",
        missing_gas.is_empty(),
        if missing_gas.is_empty() {
            "every case tracks pH, PaCO2, and HCO3".to_string()
        } else {
            format!("cases without a full blood gas: {:?}", missing_gas)
        },
    ));

    let without_first_choice: Vec<_> = catalog
        .cases
        .iter()
        .map(|c| c.condition)
        .filter(|&cond| !catalog.ranks_for_condition(cond).values().any(|&r| r == 1))
        .collect();
    results.push(check(
        "catalog_first_choice_per_condition",
        without_first_choice.is_empty(),
        format!("conditions without a first choice: {:?}", without_first_choice),
    ));

    let abnormal_start: Vec<_> = catalog
        .cases
        .iter()
        .filter(|c| {
            c.initial_values.iter().any(|(id, &v)| {
                catalog.parameter(*id).is_some_and(|d| !d.is_normal(v))
            })
        })
        .map(|c| c.id)
        .collect();
    results.push(check(
        "catalog_cases_present_sick",
        abnormal_start.len() == catalog.cases.len(),
        format!("{}/{} cases start with an abnormal value", abnormal_start.len(), catalog.cases.len()),
    ));

    if verbose {
        for c in &catalog.cases {
            eprintln!(
                "    #{} {:<48} {:<7} {:<30} difficulty {}",
                c.id,
                c.title,
                species::name(c.species),
                conditions::name(c.condition),
                c.difficulty
            );
        }
    }

    results
}

// ── 2. Engine ───────────────────────────────────────────────────────────

fn validate_engine(catalog: &Catalog, config: &SimulationConfig) -> Vec<TestResult> {
    eprintln!("--- Engine ---");
    let mut results = Vec::new();
    let Some(case) = catalog.cases.first() else {
        results.push(check("engine_case_available", false, "catalog has no cases"));
        return results;
    };
    let rules = catalog.rules_for(case);
    let start = SimulationState::new(case.initial_values.clone(), config);

    // One decay step per interval
    let one_interval = reduce(
        &start,
        &SimEvent::ClockTick {
            seconds: config.hp_decay_interval_secs,
        },
        &rules,
        config,
    )
    .state;
    results.push(check(
        "engine_decay_step",
        one_interval.hp == start.hp.saturating_sub(config.hp_decay_amount),
        format!("hp {} → {} after {}s", start.hp, one_interval.hp, config.hp_decay_interval_secs),
    ));

    // Chunked clock equals one big tick
    let chunked = (0..17).fold(start.clone(), |s, _| {
        reduce(&s, &SimEvent::ClockTick { seconds: 3 }, &rules, config).state
    });
    let single = reduce(&start, &SimEvent::ClockTick { seconds: 51 }, &rules, config).state;
    results.push(check(
        "engine_clock_additive",
        chunked == single,
        format!("17×3s and 51s agree at hp {}", single.hp),
    ));

    // Left alone the patient is lost, by HP or by the clock
    let idle = play(&rules, case, &idle_script(config), config).state;
    let idle_ok = idle.status == SessionStatus::Lost
        && matches!(
            idle.loss_reason,
            Some(LossReason::HpDepleted) | Some(LossReason::TimeExpired)
        );
    results.push(check(
        "engine_idle_loses",
        idle_ok,
        format!(
            "lost after {}s ({})",
            idle.elapsed_seconds,
            idle.loss_reason.map_or("no reason", |r| r.describe())
        ),
    ));

    // Time limit bounds the clock
    results.push(check(
        "engine_clock_bounded",
        idle.elapsed_seconds <= config.time_limit_secs,
        format!("elapsed {} ≤ limit {}", idle.elapsed_seconds, config.time_limit_secs),
    ));

    // Finished sessions absorb events
    let after = reduce(&idle, &SimEvent::ApplyTreatment { treatment_id: 1 }, &rules, config);
    results.push(check(
        "engine_terminal_absorbing",
        after.state == idle && after.decision.is_none(),
        "events after the end leave the state unchanged",
    ));

    // Abandon is an immediate loss
    let abandoned = reduce(&start, &SimEvent::Abandon, &rules, config).state;
    results.push(check(
        "engine_abandon",
        abandoned.loss_reason == Some(LossReason::Abandoned),
        "abandon ends the session as lost",
    ));

    results
}

// ── 3. Acid-base ────────────────────────────────────────────────────────

fn expected_disorder(condition: u8) -> Option<AcidBaseDisorder> {
    match condition {
        conditions::DIABETIC_KETOACIDOSIS
        | conditions::URETHRAL_OBSTRUCTION
        | conditions::ENDOTOXEMIA
        | conditions::NEONATAL_DIARRHEA => Some(AcidBaseDisorder::MetabolicAcidosis),
        conditions::ABOMASAL_DISPLACEMENT => Some(AcidBaseDisorder::MetabolicAlkalosis),
        conditions::BRACHYCEPHALIC_AIRWAY => Some(AcidBaseDisorder::RespiratoryAcidosis),
        conditions::HEATSTROKE => Some(AcidBaseDisorder::RespiratoryAlkalosis),
        conditions::GASTRIC_DILATATION_VOLVULUS => Some(AcidBaseDisorder::Mixed),
        _ => None,
    }
}

fn validate_acid_base(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    eprintln!("--- Acid-base ---");
    let mut results = Vec::new();
    let config = SimulationConfig::default();

    for case in &catalog.cases {
        let rules = catalog.rules_for(case);
        let state = SimulationState::new(case.initial_values.clone(), &config);
        let found = acid_base_status(&state, &rules);
        let expected = expected_disorder(case.condition);
        if verbose {
            eprintln!(
                "    #{} {}: {}",
                case.id,
                conditions::name(case.condition),
                found.map_or("no blood gas", |d| d.label())
            );
        }
        results.push(check(
            &format!("acid_base_case_{}", case.id),
            found.is_some() && found == expected,
            format!(
                "expected {}, found {}",
                expected.map_or("?", |d| d.label()),
                found.map_or("no blood gas", |d| d.label())
            ),
        ));
    }

    results
}

// ── 4. Play-throughs ────────────────────────────────────────────────────

fn validate_playthroughs(catalog: &Catalog, config: &SimulationConfig, verbose: bool) -> Vec<TestResult> {
    eprintln!("--- Play-throughs ---");
    let mut results = Vec::new();

    for case in &catalog.cases {
        let rules = catalog.rules_for(case);

        let Some(first) = ranked(&rules, 1) else {
            results.push(check(
                &format!("play_case_{}_first_choice", case.id),
                false,
                "no first-choice treatment",
            ));
            continue;
        };
        let win = play(&rules, case, &repeat_script(first, 4, config), config);
        let summary = SessionSummary::from_state(0, 0, case.id, &win.state, &win.decisions, 0, config);
        results.push(check(
            &format!("play_case_{}_first_choice_wins", case.id),
            win.state.status == SessionStatus::Won,
            format!(
                "{} in {}s with {} treatments, score {}",
                win.state.status.as_str(),
                win.state.elapsed_seconds,
                win.decisions.len(),
                summary.score
            ),
        ));

        if let Some(wrong) = not_indicated(&rules) {
            let loss = play(&rules, case, &repeat_script(wrong, 4, config), config);
            results.push(check(
                &format!("play_case_{}_wrong_treatment_loses", case.id),
                loss.state.status == SessionStatus::Lost
                    && loss.decisions.iter().all(|d| !d.is_correct()),
                format!(
                    "{} after {}s ({})",
                    loss.state.status.as_str(),
                    loss.state.elapsed_seconds,
                    loss.state.loss_reason.map_or("-", |r| r.describe())
                ),
            ));
        }

        if verbose {
            eprintln!(
                "    #{} {} → {} in {}s",
                case.id,
                rules.treatment_name(first),
                win.state.status.as_str(),
                win.state.elapsed_seconds
            );
        }
    }

    results
}

// ── 5. Feedback ─────────────────────────────────────────────────────────

fn validate_feedback(catalog: &Catalog, config: &SimulationConfig) -> Vec<TestResult> {
    eprintln!("--- Feedback ---");
    let mut results = Vec::new();

    let mut hint_hits = 0;
    let mut debriefs = 0;
    for case in &catalog.cases {
        let rules = catalog.rules_for(case);
        let start = SimulationState::new(case.initial_values.clone(), config);
        let h = hint(&start, &rules, &[]);
        if h.suggested_treatment.is_some() && h.suggested_treatment == ranked(&rules, 1) {
            hint_hits += 1;
        }

        let idle = play(&rules, case, &idle_script(config), config);
        let summary = SessionSummary::from_state(0, 0, case.id, &idle.state, &idle.decisions, 0, config);
        let fb = session_feedback(&summary, &idle.state, &idle.decisions, &rules, case.condition);
        if fb.headline.starts_with("Patient lost") && !fb.improvements.is_empty() {
            debriefs += 1;
        }
    }

    results.push(check(
        "feedback_hint_first_choice",
        hint_hits == catalog.cases.len(),
        format!("{}/{} opening hints suggest the first choice", hint_hits, catalog.cases.len()),
    ));
    results.push(check(
        "feedback_loss_debrief",
        debriefs == catalog.cases.len(),
        format!("{}/{} idle losses produce a debrief", debriefs, catalog.cases.len()),
    ));

    results
}

// ── 6. Cohort ───────────────────────────────────────────────────────────

/// 2024-01-01 09:00 UTC (a Monday), as µs since the epoch.
fn cohort_start_micros() -> i64 {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map_or(0, |dt| dt.and_utc().timestamp_micros())
}

const MINUTE_MICROS: i64 = 60 * 1_000_000;

/// Student `s` plays case `c` well unless `(s + c) % (s + 2) == 0`, so
/// stronger (higher-numbered) students make fewer mistakes.
fn cohort_plays_well(student: StudentId, case_index: usize) -> bool {
    (student + case_index as u64) % (student + 2) != 0
}

fn validate_cohort(
    catalog: &Catalog,
    config: &SimulationConfig,
    students: u32,
    verbose: bool,
) -> (Vec<TestResult>, Vec<ClassReportRow>) {
    eprintln!("--- Cohort ({} students) ---", students);
    let mut results = Vec::new();
    let start = cohort_start_micros();

    let roster: Vec<(StudentId, String)> = (1..=u64::from(students))
        .map(|id| (id, format!("Student {:02}", id)))
        .collect();

    let mut summaries: Vec<SessionSummary> = Vec::new();
    let mut session_id = 0;
    for (student, _) in &roster {
        for (i, case) in catalog.cases.iter().enumerate() {
            let rules = catalog.rules_for(case);
            let script = match (cohort_plays_well(*student, i), ranked(&rules, 1), not_indicated(&rules)) {
                (true, Some(t), _) => repeat_script(t, 3 + (*student % 8) as u32, config),
                (false, _, Some(t)) => repeat_script(t, 6, config),
                _ => idle_script(config),
            };
            let outcome = play(&rules, case, &script, config);
            session_id += 1;
            let finished_at = start + session_id as i64 * 17 * MINUTE_MICROS;
            summaries.push(SessionSummary::from_state(
                session_id,
                *student,
                case.id,
                &outcome.state,
                &outcome.decisions,
                finished_at,
                config,
            ));
        }
    }

    // Stats
    let class_stats = PerformanceStats::from_sessions(&summaries);
    results.push(check(
        "cohort_stats_totals",
        class_stats.total as usize == summaries.len()
            && class_stats.wins + class_stats.losses == class_stats.total,
        format!(
            "{} sessions, {} wins, win rate {:.2}, avg {:.1}s",
            class_stats.total, class_stats.wins, class_stats.win_rate, class_stats.average_duration_secs
        ),
    ));
    results.push(check(
        "cohort_stats_per_case",
        class_stats.distinct_cases() == catalog.cases.len(),
        format!("{} distinct cases played", class_stats.distinct_cases()),
    ));

    // Leaderboards
    let board = build_leaderboard(&summaries, LeaderboardWindow::AllTime);
    let ordered = board.windows(2).all(|w| {
        (w[0].wins, w[0].total_score) >= (w[1].wins, w[1].total_score)
    });
    let positions_ok = board
        .iter()
        .enumerate()
        .all(|(i, e)| e.position as usize == i + 1);
    results.push(check(
        "cohort_leaderboard_order",
        ordered && positions_ok && board.len() == roster.len(),
        format!("{} ranked students", board.len()),
    ));

    let last_at = summaries.last().map_or(start, |s| s.finished_at_micros);
    let weekly = build_leaderboard(&summaries, LeaderboardWindow::Week(last_at));
    let weekly_sessions: u32 = weekly.iter().map(|e| e.sessions).sum();
    let expected_weekly = week_bounds(last_at).map_or(0, |(from, to)| {
        summaries
            .iter()
            .filter(|s| s.finished_at_micros >= from && s.finished_at_micros < to)
            .count()
    });
    results.push(check(
        "cohort_weekly_window",
        weekly_sessions as usize == expected_weekly,
        format!("{} sessions in the latest week", weekly_sessions),
    ));

    let earlier = &summaries[..summaries.len().saturating_sub(catalog.cases.len())];
    let before = build_leaderboard(earlier, LeaderboardWindow::AllTime);
    let changes = rank_changes(&before, &board);
    results.push(check(
        "cohort_rank_changes",
        changes.iter().all(|c| c.from != Some(c.to)),
        format!("{} students moved when the last student played", changes.len()),
    ));

    // Badges
    let mut badge_counts: BTreeMap<BadgeKind, u32> = BTreeMap::new();
    for (student, _) in &roster {
        let history: Vec<SessionSummary> = summaries
            .iter()
            .filter(|s| s.student_id == *student)
            .cloned()
            .collect();
        let earned = evaluate_badges(&history, &[]);
        let again = evaluate_badges(&history, &earned);
        if !again.is_empty() {
            results.push(check(
                &format!("cohort_badges_idempotent_{}", student),
                false,
                format!("{:?} awarded twice", again),
            ));
        }
        for b in earned {
            *badge_counts.entry(b).or_default() += 1;
        }
    }
    results.push(check(
        "cohort_badges_explorer",
        badge_counts.get(&BadgeKind::CaseExplorer).copied().unwrap_or(0) == students,
        format!("{} students explored every case", badge_counts.get(&BadgeKind::CaseExplorer).copied().unwrap_or(0)),
    ));
    if verbose {
        for (b, n) in &badge_counts {
            eprintln!("    {:<20} {}", b.title(), n);
        }
    }

    // Report
    let report = class_report(&roster, &summaries);
    let csv = to_csv(&report);
    results.push(check(
        "cohort_report_csv",
        csv.lines().count() == roster.len() + 1,
        format!("{} CSV lines", csv.lines().count()),
    ));
    let json_ok = to_json(&report)
        .ok()
        .and_then(|j| serde_json::from_str::<Vec<ClassReportRow>>(&j).ok())
        .is_some_and(|back| back == report);
    results.push(check("cohort_report_json", json_ok, "JSON export reads back"));

    (results, report)
}
