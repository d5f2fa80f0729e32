// lib/src/services/drives.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use models::{Drive, DriveStatus, DriveUpdate, NewDrive, PortalError, PortalResult, RecordStatus, Student};

use crate::storage_engine::{DriveFilter, EntityStore, Page, Paged, TransitionOutcome};

/// Enforces the drive lifecycle: Scheduled -> {Completed, Cancelled},
/// edits and deletions only while the invariants hold, and the cascade of
/// still-Scheduled student records on terminal transitions.
#[derive(Clone)]
pub struct DriveService {
    store: Arc<dyn EntityStore>,
}

impl DriveService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        DriveService { store }
    }

    pub async fn create(&self, input: NewDrive) -> PortalResult<Drive> {
        let drive = Drive::new(input)?;
        let drive = self.store.insert_drive(drive).await?;
        info!(drive_id = %drive.id, vaccine = %drive.vaccine_name, "created vaccination drive");
        Ok(drive)
    }

    pub async fn get(&self, id: Uuid) -> PortalResult<Drive> {
        self.store
            .get_drive(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Vaccination drive not found".to_string()))
    }

    pub async fn list(&self, filter: &DriveFilter, page: Page) -> PortalResult<Paged<Drive>> {
        self.store.list_drives(filter, page).await
    }

    /// Partial edit; only supplied fields change, and only while the drive
    /// is still Scheduled.
    pub async fn update(&self, id: Uuid, update: DriveUpdate) -> PortalResult<Drive> {
        let mut drive = self.get(id).await?;
        drive.status.ensure_editable()?;
        drive.apply_update(update)?;
        self.store.update_drive(drive).await
    }

    pub async fn cancel(&self, id: Uuid) -> PortalResult<TransitionOutcome> {
        let outcome = self.store.transition_drive(id, DriveStatus::Cancelled).await?;
        info!(drive_id = %id, records_missed = outcome.records_missed, "cancelled vaccination drive");
        Ok(outcome)
    }

    pub async fn complete(&self, id: Uuid) -> PortalResult<TransitionOutcome> {
        let outcome = self.store.transition_drive(id, DriveStatus::Completed).await?;
        info!(drive_id = %id, records_missed = outcome.records_missed, "completed vaccination drive");
        Ok(outcome)
    }

    /// Deletion is blocked for past drives and for drives any student has
    /// already been vaccinated against. Records referencing the deleted
    /// drive are left as-is.
    pub async fn delete(&self, id: Uuid) -> PortalResult<()> {
        let drive = self.get(id).await?;
        if drive.date < Utc::now() {
            return Err(PortalError::InvalidState(
                "Cannot delete past vaccination drives".to_string(),
            ));
        }
        let vaccinated = self.store.count_vaccinated_for_drive(id).await?;
        if vaccinated > 0 {
            return Err(PortalError::Conflict(format!(
                "Cannot delete drive as {} students are already vaccinated",
                vaccinated
            )));
        }
        self.store.delete_drive(id).await?;
        info!(drive_id = %id, "deleted vaccination drive");
        Ok(())
    }

    /// Roster of students holding a record against the drive, optionally
    /// narrowed by record status.
    pub async fn students_for_drive(
        &self,
        id: Uuid,
        status: Option<RecordStatus>,
        page: Page,
    ) -> PortalResult<Paged<Student>> {
        // 404 before an empty roster when the drive itself is missing
        self.get(id).await?;
        self.store.students_for_drive(id, status, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_engine::memory_storage::MemoryEntityStore;
    use chrono::Duration;
    use models::{Gender, NewStudent, VaccinationRecord};

    fn service() -> (DriveService, Arc<MemoryEntityStore>) {
        let store = Arc::new(MemoryEntityStore::new());
        (DriveService::new(store.clone()), store)
    }

    fn new_drive(vaccine: &str, days_ahead: i64) -> NewDrive {
        NewDrive {
            vaccine_name: vaccine.to_string(),
            date: Utc::now() + Duration::days(days_ahead),
            available_doses: 20,
            applicable_classes: vec!["5".to_string()],
            created_by: Some("admin".to_string()),
        }
    }

    fn student(student_id: &str, class_name: &str) -> Student {
        Student::new(NewStudent {
            name: format!("Student {}", student_id),
            student_id: student_id.to_string(),
            class_name: class_name.to_string(),
            section: "A".to_string(),
            age: 10,
            gender: Gender::Other,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_fetch_drive() {
        let (service, _) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        let fetched = service.get(drive.id).await.unwrap();
        assert_eq!(fetched.status, DriveStatus::Scheduled);
    }

    #[tokio::test]
    async fn should_fail_update_after_completion_naming_status() {
        let (service, _) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        service.complete(drive.id).await.unwrap();
        let err = service
            .update(drive.id, DriveUpdate { available_doses: Some(5), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PortalError::InvalidState("Cannot update a completed vaccination drive".to_string())
        );
    }

    #[tokio::test]
    async fn should_fail_operations_on_missing_drive() {
        let (service, _) = service();
        let id = Uuid::new_v4();
        assert!(matches!(service.get(id).await, Err(PortalError::NotFound(_))));
        assert!(matches!(service.cancel(id).await, Err(PortalError::NotFound(_))));
        assert!(matches!(
            service.update(id, DriveUpdate::default()).await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(service.delete(id).await, Err(PortalError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_cascade_scheduled_records_on_complete() {
        let (service, store) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        let mut s = student("S-1", "5");
        s.vaccinations
            .push(VaccinationRecord::scheduled(drive.id, "Polio".to_string()));
        let s = store.insert_student(s).await.unwrap();

        let outcome = service.complete(drive.id).await.unwrap();
        assert_eq!(outcome.records_missed, 1);
        let s = store.get_student(s.id).await.unwrap().unwrap();
        assert_eq!(s.vaccinations[0].status, RecordStatus::Missed);
    }

    #[tokio::test]
    async fn should_not_cancel_twice() {
        let (service, _) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        service.cancel(drive.id).await.unwrap();
        let err = service.cancel(drive.id).await.unwrap_err();
        assert_eq!(
            err,
            PortalError::InvalidState("Cannot cancel a cancelled vaccination drive".to_string())
        );
    }

    #[tokio::test]
    async fn should_block_deleting_past_drive() {
        let (service, store) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        let mut past = store.get_drive(drive.id).await.unwrap().unwrap();
        past.date = Utc::now() - Duration::days(2);
        store.update_drive(past).await.unwrap();

        let err = service.delete(drive.id).await.unwrap_err();
        assert_eq!(
            err,
            PortalError::InvalidState("Cannot delete past vaccination drives".to_string())
        );
    }

    #[tokio::test]
    async fn should_block_deleting_drive_with_vaccinated_students() {
        let (service, store) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        let s = store.insert_student(student("S-1", "5")).await.unwrap();
        store.apply_vaccination(s.id, drive.id, Utc::now()).await.unwrap();

        let err = service.delete(drive.id).await.unwrap_err();
        assert_eq!(
            err,
            PortalError::Conflict("Cannot delete drive as 1 students are already vaccinated".to_string())
        );
    }

    #[tokio::test]
    async fn should_delete_unused_future_drive_permanently() {
        let (service, _) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        service.delete(drive.id).await.unwrap();
        assert!(matches!(service.get(drive.id).await, Err(PortalError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_keep_records_when_drive_is_deleted() {
        let (service, store) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        let mut s = student("S-1", "5");
        s.vaccinations
            .push(VaccinationRecord::scheduled(drive.id, "Polio".to_string()));
        let s = store.insert_student(s).await.unwrap();

        service.delete(drive.id).await.unwrap();
        let s = store.get_student(s.id).await.unwrap().unwrap();
        assert_eq!(s.vaccinations.len(), 1);
        assert_eq!(s.vaccinations[0].drive_id, drive.id);
    }

    #[tokio::test]
    async fn should_page_drive_roster() {
        let (service, store) = service();
        let drive = service.create(new_drive("Polio", 7)).await.unwrap();
        for i in 0..3 {
            let s = store
                .insert_student(student(&format!("S-{}", i), "5"))
                .await
                .unwrap();
            store.apply_vaccination(s.id, drive.id, Utc::now()).await.unwrap();
        }
        let page = service
            .students_for_drive(drive.id, Some(RecordStatus::Completed), Page::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 2);
    }
}
