pub mod report;
pub mod runner;

pub use report::{CycleOutcome, CycleReport};
pub use runner::{CoordinatorError, CoordinatorOptions, CycleCoordinator};
