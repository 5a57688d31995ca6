//! Commission reporting.
//!
//! A report snapshots a store's commission rate and the orders it fulfilled
//! in a date range. Once finalized it never changes.

pub mod generator;
pub mod period;
pub mod report;

pub use generator::{CommissionCandidate, CommissionReportGenerator, GeneratedReport, GenerationOutcome};
pub use period::ReportPeriod;
pub use report::{CommissionReport, CommissionReportLine, ReportStatus};
