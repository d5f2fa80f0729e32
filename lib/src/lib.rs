// lib/src/lib.rs

pub mod services;
pub mod storage_engine;

pub use storage_engine::{
    DriveFilter, EntityStore, Page, Paged, StudentFilter, TransitionOutcome, VaccinationOutcome,
    VaccinationStatusFilter,
};
pub use storage_engine::memory_storage::MemoryEntityStore;
pub use storage_engine::sled_storage::SledEntityStore;
