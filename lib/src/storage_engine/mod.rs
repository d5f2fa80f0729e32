// lib/src/storage_engine/mod.rs

pub mod memory_storage;
pub mod sled_storage;
#[allow(clippy::module_inception)]
pub mod storage_engine;

pub use storage_engine::{
    DriveFilter, EntityStore, Page, Paged, StudentFilter, TransitionOutcome, VaccinationOutcome,
    VaccinationStatusFilter,
};
