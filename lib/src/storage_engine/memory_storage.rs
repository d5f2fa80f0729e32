// lib/src/storage_engine/memory_storage.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use models::{Drive, DriveStatus, PortalError, PortalResult, RecordStatus, Student, VaccinationRecord};

use super::storage_engine::{
    drive_matches, paginate, student_matches, DriveFilter, EntityStore, Page, Paged, StudentFilter,
    TransitionOutcome, VaccinationOutcome,
};

#[derive(Debug, Default)]
struct Internal {
    students: BTreeMap<Uuid, Student>,
    // student_id -> primary key, the uniqueness index
    student_ids: BTreeMap<String, Uuid>,
    drives: BTreeMap<Uuid, Drive>,
}

/// In-memory implementation of `EntityStore`. All operations, including
/// the composite ones, run under a single lock and are therefore atomic
/// with respect to every reader and writer.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntityStore {
    internal: Arc<Mutex<Internal>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortalResult<MutexGuard<'_, Internal>> {
        self.internal
            .lock()
            .map_err(|e| PortalError::Lock(e.to_string()))
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn insert_student(&self, student: Student) -> PortalResult<Student> {
        let mut internal = self.lock()?;
        if internal.student_ids.contains_key(&student.student_id) {
            return Err(PortalError::Conflict("Student ID already exists".to_string()));
        }
        internal
            .student_ids
            .insert(student.student_id.clone(), student.id);
        internal.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn get_student(&self, id: Uuid) -> PortalResult<Option<Student>> {
        let internal = self.lock()?;
        Ok(internal.students.get(&id).cloned())
    }

    async fn find_student_by_student_id(&self, student_id: &str) -> PortalResult<Option<Student>> {
        let internal = self.lock()?;
        Ok(internal
            .student_ids
            .get(student_id)
            .and_then(|id| internal.students.get(id))
            .cloned())
    }

    async fn list_students(&self, filter: &StudentFilter, page: Page) -> PortalResult<Paged<Student>> {
        let internal = self.lock()?;
        let mut matches: Vec<Student> = internal
            .students
            .values()
            .filter(|s| student_matches(s, filter))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(matches, page))
    }

    async fn update_student(&self, mut student: Student) -> PortalResult<Student> {
        let mut internal = self.lock()?;
        let previous = internal
            .students
            .get(&student.id)
            .ok_or_else(|| PortalError::NotFound("Student not found".to_string()))?
            .clone();
        if previous.student_id != student.student_id {
            if internal.student_ids.contains_key(&student.student_id) {
                return Err(PortalError::Conflict("Student ID already exists".to_string()));
            }
            internal.student_ids.remove(&previous.student_id);
            internal
                .student_ids
                .insert(student.student_id.clone(), student.id);
        }
        student.updated_at = Utc::now();
        internal.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn delete_student(&self, id: Uuid) -> PortalResult<()> {
        let mut internal = self.lock()?;
        let student = internal
            .students
            .remove(&id)
            .ok_or_else(|| PortalError::NotFound("Student not found".to_string()))?;
        internal.student_ids.remove(&student.student_id);
        Ok(())
    }

    async fn all_students(&self) -> PortalResult<Vec<Student>> {
        let internal = self.lock()?;
        Ok(internal.students.values().cloned().collect())
    }

    async fn insert_drive(&self, drive: Drive) -> PortalResult<Drive> {
        let mut internal = self.lock()?;
        internal.drives.insert(drive.id, drive.clone());
        Ok(drive)
    }

    async fn get_drive(&self, id: Uuid) -> PortalResult<Option<Drive>> {
        let internal = self.lock()?;
        Ok(internal.drives.get(&id).cloned())
    }

    async fn list_drives(&self, filter: &DriveFilter, page: Page) -> PortalResult<Paged<Drive>> {
        let internal = self.lock()?;
        let now = Utc::now();
        let mut matches: Vec<Drive> = internal
            .drives
            .values()
            .filter(|d| drive_matches(d, filter, now))
            .cloned()
            .collect();
        matches.sort_by_key(|d| d.date);
        Ok(paginate(matches, page))
    }

    async fn update_drive(&self, mut drive: Drive) -> PortalResult<Drive> {
        let mut internal = self.lock()?;
        if !internal.drives.contains_key(&drive.id) {
            return Err(PortalError::NotFound("Vaccination drive not found".to_string()));
        }
        drive.updated_at = Utc::now();
        internal.drives.insert(drive.id, drive.clone());
        Ok(drive)
    }

    async fn delete_drive(&self, id: Uuid) -> PortalResult<()> {
        let mut internal = self.lock()?;
        internal
            .drives
            .remove(&id)
            .ok_or_else(|| PortalError::NotFound("Vaccination drive not found".to_string()))?;
        Ok(())
    }

    async fn all_drives(&self) -> PortalResult<Vec<Drive>> {
        let internal = self.lock()?;
        Ok(internal.drives.values().cloned().collect())
    }

    async fn count_vaccinated_for_drive(&self, drive_id: Uuid) -> PortalResult<u64> {
        let internal = self.lock()?;
        Ok(internal
            .students
            .values()
            .filter(|s| s.has_completed_record(drive_id))
            .count() as u64)
    }

    async fn students_for_drive(
        &self,
        drive_id: Uuid,
        status: Option<RecordStatus>,
        page: Page,
    ) -> PortalResult<Paged<Student>> {
        let internal = self.lock()?;
        let mut matches: Vec<Student> = internal
            .students
            .values()
            .filter(|s| {
                s.vaccinations
                    .iter()
                    .any(|v| v.drive_id == drive_id && status.is_none_or(|st| v.status == st))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(matches, page))
    }

    async fn transition_drive(
        &self,
        drive_id: Uuid,
        target: DriveStatus,
    ) -> PortalResult<TransitionOutcome> {
        let mut internal = self.lock()?;
        let now = Utc::now();
        let drive = internal
            .drives
            .get_mut(&drive_id)
            .ok_or_else(|| PortalError::NotFound("Vaccination drive not found".to_string()))?;
        drive.status.validate_transition(target)?;
        drive.status = target;
        drive.updated_at = now;
        let drive = drive.clone();

        let mut records_missed = 0;
        for student in internal.students.values_mut() {
            let changed = student.mark_missed_for_drive(drive_id);
            if changed > 0 {
                records_missed += changed;
                student.updated_at = now;
            }
        }
        Ok(TransitionOutcome { drive, records_missed })
    }

    async fn apply_vaccination(
        &self,
        student_pk: Uuid,
        drive_id: Uuid,
        administered_at: DateTime<Utc>,
    ) -> PortalResult<VaccinationOutcome> {
        let mut internal = self.lock()?;
        let Internal { students, drives, .. } = &mut *internal;
        let student = students
            .get_mut(&student_pk)
            .ok_or_else(|| PortalError::NotFound("Student not found".to_string()))?;
        let drive = drives
            .get_mut(&drive_id)
            .ok_or_else(|| PortalError::NotFound("Vaccination drive not found".to_string()))?;

        drive.ensure_open_for_vaccination()?;
        drive.ensure_applicable_to(&student.class_name)?;
        student.ensure_not_vaccinated_for(drive_id)?;
        drive.ensure_doses_available()?;

        student.vaccinations.push(VaccinationRecord::completed(
            drive_id,
            drive.vaccine_name.clone(),
            administered_at,
        ));
        student.updated_at = administered_at;
        drive.available_doses -= 1;
        drive.updated_at = administered_at;

        Ok(VaccinationOutcome {
            student: student.clone(),
            drive: drive.clone(),
        })
    }
}
