//! Pure simulation logic for VetBalance.
//!
//! This crate contains all game logic that is independent of any database,
//! engine, or runtime. Functions take plain data and return results, making
//! them unit-testable and portable across SpacetimeDB (WASM), native CLI
//! tools, and any future front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`badges`] | Achievement rules evaluated over session history |
//! | [`catalog`] | Parameters, treatments, correct-treatment rankings, clinical cases |
//! | [`config`] | Engine timing, HP deltas, and scoring weights |
//! | [`constants`] | Species, conditions, parameter ids, roles (integer codes) |
//! | [`error`] | Typed catalog, case, and config errors |
//! | [`feedback`] | In-session hints and post-session debriefs |
//! | [`parameters`] | Normal ranges, classification, acid-base interpretation |
//! | [`ranking`] | All-time and weekly leaderboards, rank-change notices |
//! | [`report`] | Class report rows with CSV/JSON export |
//! | [`roster`] | Class join codes and name validation |
//! | [`scoring`] | Session summaries and score computation |
//! | [`simulation`] | HP/timer reducer: decay, treatments, win/loss |
//! | [`stats`] | Aggregate performance statistics |
//! | [`status`] | Canonical session status vocabulary |

pub mod badges;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod feedback;
pub mod parameters;
pub mod ranking;
pub mod report;
pub mod roster;
pub mod scoring;
pub mod simulation;
pub mod stats;
pub mod status;
