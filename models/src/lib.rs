// models/src/lib.rs

pub mod drive;
pub mod errors;
pub mod student;

pub use drive::{Drive, DriveStatus, DriveUpdate, NewDrive};
pub use errors::{PortalError, PortalResult};
pub use student::{
    Gender, NewStudent, RecordStatus, Student, StudentImportRow, StudentUpdate, VaccinationRecord,
};
