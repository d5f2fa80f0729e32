// lib/src/services/vaccination.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use models::{PortalError, PortalResult};

use crate::storage_engine::{EntityStore, VaccinationOutcome};

/// Records a single vaccination event: validates the request against a
/// snapshot, then delegates to the store's atomic apply so a concurrent
/// race can never drive the dose count negative or duplicate a record.
#[derive(Clone)]
pub struct VaccinationService {
    store: Arc<dyn EntityStore>,
}

impl VaccinationService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        VaccinationService { store }
    }

    pub async fn vaccinate(&self, student_pk: Uuid, drive_id: Uuid) -> PortalResult<VaccinationOutcome> {
        let student = self
            .store
            .get_student(student_pk)
            .await?
            .ok_or_else(|| PortalError::NotFound("Student not found".to_string()))?;
        let drive = self
            .store
            .get_drive(drive_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Vaccination drive not found".to_string()))?;

        drive.ensure_open_for_vaccination()?;
        drive.ensure_applicable_to(&student.class_name)?;
        student.ensure_not_vaccinated_for(drive_id)?;
        drive.ensure_doses_available()?;

        // The store re-runs the same checks inside its atomic scope; the
        // snapshot pass above exists to fail fast with the right message.
        let outcome = self.store.apply_vaccination(student_pk, drive_id, Utc::now()).await?;
        info!(
            student_id = %outcome.student.student_id,
            drive_id = %drive_id,
            doses_left = outcome.drive.available_doses,
            "recorded vaccination"
        );
        Ok(outcome)
    }
}
