// =============================================================================
// Scanner Module
// =============================================================================
//
// - engine:    one tick = fetch, classify, gate, emit for every unit
// - scheduler: Idle / Running lifecycle driving ticks on a fixed period

pub mod engine;
pub mod scheduler;

pub use engine::{ScanOptions, Scanner, TickReport, UnitFailure};
pub use scheduler::ScanScheduler;
