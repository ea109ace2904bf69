//! VetBalance Server - SpacetimeDB Module
//!
//! Acid-base training backend running as a SpacetimeDB module.
//! Catalog, classes, and every play-through live in tables; the patient
//! engine itself is the pure reducer in `vetbalance-logic`, and clients
//! drive its clock through `advance_session`.

mod catalog;
mod classes;
mod reducers;
mod simulation;
mod tables;

pub use catalog::*;
pub use classes::*;
pub use reducers::*;
pub use tables::*;
