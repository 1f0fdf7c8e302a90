// src/schedule/mod.rs
//! Движок расписания обслуживания приборов.

pub mod evaluator;
pub mod generator;
pub mod reconcile;
pub mod recurrence;
pub mod regeneration;
pub mod service;

pub use evaluator::{CompletionSummary, DisplayStatus};
pub use reconcile::ScheduleEntry;
pub use recurrence::Frequency;
pub use regeneration::{RegenerationController, RegenerationOutcome};
pub use service::{ConfigurationChange, OccurrenceDetail, ScheduleService};
