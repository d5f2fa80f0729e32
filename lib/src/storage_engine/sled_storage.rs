// lib/src/storage_engine/sled_storage.rs

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, IVec, Tree};
use tracing::info;
use uuid::Uuid;

use models::{Drive, DriveStatus, PortalError, PortalResult, RecordStatus, Student, VaccinationRecord};

use super::storage_engine::{
    drive_matches, paginate, student_matches, DriveFilter, EntityStore, Page, Paged, StudentFilter,
    TransitionOutcome, VaccinationOutcome,
};

const STUDENTS_TREE: &str = "students";
const DRIVES_TREE: &str = "drives";
const STUDENT_IDS_TREE: &str = "student_ids";

/// Embedded sled implementation of `EntityStore`.
///
/// Documents are MessagePack values keyed by their UUID bytes; the
/// `student_ids` tree is the uniqueness index for the human-assigned id.
/// Composite operations run inside cross-tree transactions.
#[derive(Debug, Clone)]
pub struct SledEntityStore {
    db: Db,
    students: Tree,
    drives: Tree,
    student_ids: Tree,
}

impl SledEntityStore {
    pub fn open<P: AsRef<Path>>(path: P) -> PortalResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            PortalError::Storage(format!("Failed to open sled database at {:?}: {}", path, e))
        })?;
        let students = db.open_tree(STUDENTS_TREE).map_err(storage_err)?;
        let drives = db.open_tree(DRIVES_TREE).map_err(storage_err)?;
        let student_ids = db.open_tree(STUDENT_IDS_TREE).map_err(storage_err)?;
        info!(path = %path.display(), "opened sled entity store");
        Ok(SledEntityStore {
            db,
            students,
            drives,
            student_ids,
        })
    }

    pub async fn flush(&self) -> PortalResult<()> {
        self.db.flush_async().await.map_err(storage_err)?;
        Ok(())
    }

    fn load_students(&self) -> PortalResult<Vec<Student>> {
        self.students
            .iter()
            .map(|kv| {
                let (_, raw) = kv.map_err(storage_err)?;
                decode::<Student>(&raw)
            })
            .collect()
    }

    fn load_drives(&self) -> PortalResult<Vec<Drive>> {
        self.drives
            .iter()
            .map(|kv| {
                let (_, raw) = kv.map_err(storage_err)?;
                decode::<Drive>(&raw)
            })
            .collect()
    }

    fn student_keys(&self) -> PortalResult<Vec<IVec>> {
        self.students
            .iter()
            .keys()
            .map(|k| k.map_err(storage_err))
            .collect()
    }
}

fn storage_err(e: sled::Error) -> PortalError {
    PortalError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> PortalResult<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| PortalError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> PortalResult<T> {
    rmp_serde::from_slice(raw).map_err(|e| PortalError::Serialization(e.to_string()))
}

fn abort(e: PortalError) -> ConflictableTransactionError<PortalError> {
    ConflictableTransactionError::Abort(e)
}

fn unwrap_tx<T>(result: Result<T, TransactionError<PortalError>>) -> PortalResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(storage_err(e)),
    }
}

#[async_trait]
impl EntityStore for SledEntityStore {
    async fn insert_student(&self, student: Student) -> PortalResult<Student> {
        let doc = encode(&student)?;
        let key = student.id.as_bytes().to_vec();
        let sid = student.student_id.clone().into_bytes();
        let result = (&self.students, &self.student_ids).transaction(|(students, ids)| {
            if ids.get(sid.as_slice())?.is_some() {
                return Err(abort(PortalError::Conflict("Student ID already exists".to_string())));
            }
            ids.insert(sid.as_slice(), key.as_slice())?;
            students.insert(key.as_slice(), doc.as_slice())?;
            Ok(())
        });
        unwrap_tx(result)?;
        Ok(student)
    }

    async fn get_student(&self, id: Uuid) -> PortalResult<Option<Student>> {
        match self.students.get(id.as_bytes()).map_err(storage_err)? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn find_student_by_student_id(&self, student_id: &str) -> PortalResult<Option<Student>> {
        let Some(key) = self.student_ids.get(student_id.as_bytes()).map_err(storage_err)? else {
            return Ok(None);
        };
        match self.students.get(&key).map_err(storage_err)? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list_students(&self, filter: &StudentFilter, page: Page) -> PortalResult<Paged<Student>> {
        let mut matches: Vec<Student> = self
            .load_students()?
            .into_iter()
            .filter(|s| student_matches(s, filter))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(matches, page))
    }

    async fn update_student(&self, mut student: Student) -> PortalResult<Student> {
        student.updated_at = Utc::now();
        let doc = encode(&student)?;
        let key = student.id.as_bytes().to_vec();
        let new_sid = student.student_id.clone().into_bytes();
        let result = (&self.students, &self.student_ids).transaction(|(students, ids)| {
            let previous_raw = students
                .get(key.as_slice())?
                .ok_or_else(|| abort(PortalError::NotFound("Student not found".to_string())))?;
            let previous: Student = decode(&previous_raw).map_err(abort)?;
            if previous.student_id.as_bytes() != new_sid.as_slice() {
                if ids.get(new_sid.as_slice())?.is_some() {
                    return Err(abort(PortalError::Conflict("Student ID already exists".to_string())));
                }
                ids.remove(previous.student_id.as_bytes())?;
                ids.insert(new_sid.as_slice(), key.as_slice())?;
            }
            students.insert(key.as_slice(), doc.as_slice())?;
            Ok(())
        });
        unwrap_tx(result)?;
        Ok(student)
    }

    async fn delete_student(&self, id: Uuid) -> PortalResult<()> {
        let key = id.as_bytes().to_vec();
        let result = (&self.students, &self.student_ids).transaction(|(students, ids)| {
            let raw = students
                .remove(key.as_slice())?
                .ok_or_else(|| abort(PortalError::NotFound("Student not found".to_string())))?;
            let student: Student = decode(&raw).map_err(abort)?;
            ids.remove(student.student_id.as_bytes())?;
            Ok(())
        });
        unwrap_tx(result)
    }

    async fn all_students(&self) -> PortalResult<Vec<Student>> {
        self.load_students()
    }

    async fn insert_drive(&self, drive: Drive) -> PortalResult<Drive> {
        let doc = encode(&drive)?;
        self.drives
            .insert(drive.id.as_bytes(), doc)
            .map_err(storage_err)?;
        Ok(drive)
    }

    async fn get_drive(&self, id: Uuid) -> PortalResult<Option<Drive>> {
        match self.drives.get(id.as_bytes()).map_err(storage_err)? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list_drives(&self, filter: &DriveFilter, page: Page) -> PortalResult<Paged<Drive>> {
        let now = Utc::now();
        let mut matches: Vec<Drive> = self
            .load_drives()?
            .into_iter()
            .filter(|d| drive_matches(d, filter, now))
            .collect();
        matches.sort_by_key(|d| d.date);
        Ok(paginate(matches, page))
    }

    async fn update_drive(&self, mut drive: Drive) -> PortalResult<Drive> {
        drive.updated_at = Utc::now();
        let doc = encode(&drive)?;
        let previous = self
            .drives
            .fetch_and_update(drive.id.as_bytes(), move |old| {
                old.map(|_| doc.clone())
            })
            .map_err(storage_err)?;
        if previous.is_none() {
            return Err(PortalError::NotFound("Vaccination drive not found".to_string()));
        }
        Ok(drive)
    }

    async fn delete_drive(&self, id: Uuid) -> PortalResult<()> {
        let removed = self.drives.remove(id.as_bytes()).map_err(storage_err)?;
        if removed.is_none() {
            return Err(PortalError::NotFound("Vaccination drive not found".to_string()));
        }
        Ok(())
    }

    async fn all_drives(&self) -> PortalResult<Vec<Drive>> {
        self.load_drives()
    }

    async fn count_vaccinated_for_drive(&self, drive_id: Uuid) -> PortalResult<u64> {
        Ok(self
            .load_students()?
            .iter()
            .filter(|s| s.has_completed_record(drive_id))
            .count() as u64)
    }

    async fn students_for_drive(
        &self,
        drive_id: Uuid,
        status: Option<RecordStatus>,
        page: Page,
    ) -> PortalResult<Paged<Student>> {
        let mut matches: Vec<Student> = self
            .load_students()?
            .into_iter()
            .filter(|s| {
                s.vaccinations
                    .iter()
                    .any(|v| v.drive_id == drive_id && status.is_none_or(|st| v.status == st))
            })
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(matches, page))
    }

    async fn transition_drive(
        &self,
        drive_id: Uuid,
        target: DriveStatus,
    ) -> PortalResult<TransitionOutcome> {
        // Keys are snapshotted before the transaction; the transaction
        // itself re-reads every document it touches.
        let student_keys = self.student_keys()?;
        let drive_key = drive_id.as_bytes().to_vec();
        let now = Utc::now();

        let result = (&self.students, &self.drives).transaction(|(students, drives)| {
            let raw = drives
                .get(drive_key.as_slice())?
                .ok_or_else(|| abort(PortalError::NotFound("Vaccination drive not found".to_string())))?;
            let mut drive: Drive = decode(&raw).map_err(abort)?;
            drive.status.validate_transition(target).map_err(abort)?;
            drive.status = target;
            drive.updated_at = now;
            drives.insert(drive_key.as_slice(), encode(&drive).map_err(abort)?)?;

            let mut records_missed = 0u64;
            for key in &student_keys {
                let Some(raw) = students.get(key)? else { continue };
                let mut student: Student = decode(&raw).map_err(abort)?;
                let changed = student.mark_missed_for_drive(drive_id);
                if changed > 0 {
                    records_missed += changed;
                    student.updated_at = now;
                    students.insert(key.as_ref(), encode(&student).map_err(abort)?)?;
                }
            }
            Ok((drive, records_missed))
        });
        let (drive, records_missed) = unwrap_tx(result)?;
        Ok(TransitionOutcome { drive, records_missed })
    }

    async fn apply_vaccination(
        &self,
        student_pk: Uuid,
        drive_id: Uuid,
        administered_at: DateTime<Utc>,
    ) -> PortalResult<VaccinationOutcome> {
        let student_key = student_pk.as_bytes().to_vec();
        let drive_key = drive_id.as_bytes().to_vec();

        let result = (&self.students, &self.drives).transaction(|(students, drives)| {
            let student_raw = students
                .get(student_key.as_slice())?
                .ok_or_else(|| abort(PortalError::NotFound("Student not found".to_string())))?;
            let mut student: Student = decode(&student_raw).map_err(abort)?;
            let drive_raw = drives
                .get(drive_key.as_slice())?
                .ok_or_else(|| abort(PortalError::NotFound("Vaccination drive not found".to_string())))?;
            let mut drive: Drive = decode(&drive_raw).map_err(abort)?;

            drive.ensure_open_for_vaccination().map_err(abort)?;
            drive.ensure_applicable_to(&student.class_name).map_err(abort)?;
            student.ensure_not_vaccinated_for(drive_id).map_err(abort)?;
            drive.ensure_doses_available().map_err(abort)?;

            student.vaccinations.push(VaccinationRecord::completed(
                drive_id,
                drive.vaccine_name.clone(),
                administered_at,
            ));
            student.updated_at = administered_at;
            drive.available_doses -= 1;
            drive.updated_at = administered_at;

            students.insert(student_key.as_slice(), encode(&student).map_err(abort)?)?;
            drives.insert(drive_key.as_slice(), encode(&drive).map_err(abort)?)?;
            Ok((student, drive))
        });
        let (student, drive) = unwrap_tx(result)?;
        Ok(VaccinationOutcome { student, drive })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use models::{Gender, NewDrive, NewStudent};

    fn open_store() -> (SledEntityStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledEntityStore::open(dir.path().join("portal-db")).unwrap();
        (store, dir)
    }

    fn student(student_id: &str, name: &str, class_name: &str) -> Student {
        Student::new(NewStudent {
            name: name.to_string(),
            student_id: student_id.to_string(),
            class_name: class_name.to_string(),
            section: "A".to_string(),
            age: 10,
            gender: Gender::Male,
        })
        .unwrap()
    }

    fn drive(vaccine: &str, doses: u32, classes: &[&str]) -> Drive {
        Drive::new(NewDrive {
            vaccine_name: vaccine.to_string(),
            date: Utc::now() + Duration::days(7),
            available_doses: doses,
            applicable_classes: classes.iter().map(|c| c.to_string()).collect(),
            created_by: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn should_round_trip_students_and_drives() {
        let (store, _dir) = open_store();
        let s = store.insert_student(student("S-1", "Asha", "5")).await.unwrap();
        let d = store.insert_drive(drive("Polio", 5, &["5"])).await.unwrap();
        let loaded = store.get_student(s.id).await.unwrap().unwrap();
        assert_eq!(loaded.student_id, "S-1");
        let loaded = store.get_drive(d.id).await.unwrap().unwrap();
        assert_eq!(loaded.vaccine_name, "Polio");
        let by_sid = store.find_student_by_student_id("S-1").await.unwrap().unwrap();
        assert_eq!(by_sid.id, s.id);
    }

    #[tokio::test]
    async fn should_enforce_student_id_uniqueness_in_index_tree() {
        let (store, _dir) = open_store();
        store.insert_student(student("S-1", "Asha", "5")).await.unwrap();
        let err = store.insert_student(student("S-1", "Ravi", "6")).await.unwrap_err();
        assert_eq!(err, PortalError::Conflict("Student ID already exists".to_string()));
    }

    #[tokio::test]
    async fn should_move_index_entry_when_student_id_changes() {
        let (store, _dir) = open_store();
        let mut s = store.insert_student(student("S-1", "Asha", "5")).await.unwrap();
        s.student_id = "S-9".to_string();
        store.update_student(s).await.unwrap();
        assert!(store.find_student_by_student_id("S-1").await.unwrap().is_none());
        assert!(store.find_student_by_student_id("S-9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_transition_and_cascade_in_one_transaction() {
        let (store, _dir) = open_store();
        let d = store.insert_drive(drive("Polio", 5, &["5"])).await.unwrap();
        let mut s = student("S-1", "Asha", "5");
        s.vaccinations
            .push(VaccinationRecord::scheduled(d.id, "Polio".to_string()));
        let s = store.insert_student(s).await.unwrap();

        let outcome = store.transition_drive(d.id, DriveStatus::Cancelled).await.unwrap();
        assert_eq!(outcome.records_missed, 1);
        let s = store.get_student(s.id).await.unwrap().unwrap();
        assert_eq!(s.vaccinations[0].status, RecordStatus::Missed);
        let d = store.get_drive(d.id).await.unwrap().unwrap();
        assert_eq!(d.status, DriveStatus::Cancelled);
    }

    #[tokio::test]
    async fn should_guard_dose_decrement_against_exhaustion() {
        let (store, _dir) = open_store();
        let d = store.insert_drive(drive("Polio", 1, &["5"])).await.unwrap();
        let s1 = store.insert_student(student("S-1", "Asha", "5")).await.unwrap();
        let s2 = store.insert_student(student("S-2", "Ravi", "5")).await.unwrap();
        store.apply_vaccination(s1.id, d.id, Utc::now()).await.unwrap();
        let err = store.apply_vaccination(s2.id, d.id, Utc::now()).await.unwrap_err();
        assert_eq!(err, PortalError::Conflict("No doses available in this drive".to_string()));
        let d = store.get_drive(d.id).await.unwrap().unwrap();
        assert_eq!(d.available_doses, 0);
    }

    #[tokio::test]
    async fn should_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal-db");
        let id;
        {
            let store = SledEntityStore::open(&path).unwrap();
            let s = store.insert_student(student("S-1", "Asha", "5")).await.unwrap();
            id = s.id;
            store.flush().await.unwrap();
        }
        let store = SledEntityStore::open(&path).unwrap();
        let loaded = store.get_student(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Asha");
    }
}
