// lib/src/services/students.rs

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use models::{
    Gender, NewStudent, PortalError, PortalResult, Student, StudentImportRow, StudentUpdate,
};

use crate::storage_engine::{EntityStore, Page, Paged, StudentFilter};

/// One rejected import row, reported alongside the successes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportRowError {
    pub row: u64,
    pub error: String,
}

/// Outcome of a bulk import: a bad row never aborts the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub imported: Vec<Student>,
    pub errors: Vec<ImportRowError>,
}

#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn EntityStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        StudentService { store }
    }

    pub async fn create(&self, input: NewStudent) -> PortalResult<Student> {
        let student = Student::new(input)?;
        let student = self.store.insert_student(student).await?;
        info!(student_id = %student.student_id, "created student");
        Ok(student)
    }

    pub async fn get(&self, id: Uuid) -> PortalResult<Student> {
        self.store
            .get_student(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Student not found".to_string()))
    }

    pub async fn list(&self, filter: &StudentFilter, page: Page) -> PortalResult<Paged<Student>> {
        self.store.list_students(filter, page).await
    }

    pub async fn update(&self, id: Uuid, update: StudentUpdate) -> PortalResult<Student> {
        let mut student = self.get(id).await?;
        student.apply_update(update)?;
        self.store.update_student(student).await
    }

    pub async fn delete(&self, id: Uuid) -> PortalResult<()> {
        self.store.delete_student(id).await?;
        info!(%id, "deleted student");
        Ok(())
    }

    /// Attempts creation for every row; per-row validation failures and
    /// duplicate ids are collected and reported, never aborting the batch.
    pub async fn import(&self, rows: Vec<StudentImportRow>) -> PortalResult<ImportOutcome> {
        let mut imported = Vec::new();
        let mut errors = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index as u64 + 1;
            match self.import_row(row).await {
                Ok(student) => imported.push(student),
                Err(e) => {
                    warn!(row = row_number, error = %e, "skipped import row");
                    errors.push(ImportRowError {
                        row: row_number,
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(imported = imported.len(), rejected = errors.len(), "finished student import");
        Ok(ImportOutcome { imported, errors })
    }

    async fn import_row(&self, row: StudentImportRow) -> PortalResult<Student> {
        let input = parse_import_row(row)?;
        self.create(input).await
    }
}

fn parse_import_row(row: StudentImportRow) -> PortalResult<NewStudent> {
    let name = non_empty(row.name);
    let student_id = non_empty(row.student_id);
    let class_name = non_empty(row.class_name);
    let section = non_empty(row.section);
    let age = non_empty(row.age);
    let gender = non_empty(row.gender);
    let (Some(name), Some(student_id), Some(class_name), Some(section), Some(age), Some(gender)) =
        (name, student_id, class_name, section, age, gender)
    else {
        return Err(PortalError::Validation("Missing required fields".to_string()));
    };
    let age: u8 = age
        .parse()
        .map_err(|_| PortalError::Validation(format!("Invalid age: {}", age)))?;
    let gender = Gender::from_str(&gender)?;
    Ok(NewStudent {
        name,
        student_id,
        class_name,
        section,
        age,
        gender,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
