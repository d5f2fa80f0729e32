// lib/src/services/mod.rs

pub mod dashboard;
pub mod drives;
pub mod reports;
pub mod students;
pub mod vaccination;

pub use dashboard::{DashboardService, DashboardStats};
pub use drives::DriveService;
pub use reports::{ClassStat, ReportFilter, ReportRow, ReportService, VaccineStat};
pub use students::{ImportOutcome, ImportRowError, StudentService};
pub use vaccination::VaccinationService;
