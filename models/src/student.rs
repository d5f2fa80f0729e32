// models/src/student.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{PortalError, PortalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl std::str::FromStr for Gender {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(PortalError::Validation(format!("Invalid gender: {}", other))),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

/// Status of one per-student, per-drive vaccination entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Scheduled,
    Completed,
    Missed,
}

/// One entry in a student's vaccination history. The vaccine name is a
/// snapshot taken at administration time; `drive_id` is a weak reference
/// kept for historical display even after the drive is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationRecord {
    pub drive_id: Uuid,
    pub vaccine_name: String,
    pub date_administered: Option<DateTime<Utc>>,
    pub status: RecordStatus,
}

impl VaccinationRecord {
    pub fn completed(drive_id: Uuid, vaccine_name: String, at: DateTime<Utc>) -> Self {
        VaccinationRecord {
            drive_id,
            vaccine_name,
            date_administered: Some(at),
            status: RecordStatus::Completed,
        }
    }

    pub fn scheduled(drive_id: Uuid, vaccine_name: String) -> Self {
        VaccinationRecord {
            drive_id,
            vaccine_name,
            date_administered: None,
            status: RecordStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub section: String,
    pub age: u8,
    pub gender: Gender,
    pub vaccinations: Vec<VaccinationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    pub student_id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub section: String,
    pub age: u8,
    pub gender: Gender,
}

/// Partial profile edit; omitted fields keep their value. `student_id`
/// changes are re-checked for uniqueness by the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub student_id: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
}

/// One raw row handed over by the bulk-import collaborator. All fields are
/// optional strings so a bad row is reported instead of aborting the batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentImportRow {
    pub name: Option<String>,
    pub student_id: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
}

impl Student {
    pub fn new(input: NewStudent) -> PortalResult<Self> {
        let name = required(&input.name, "Name")?;
        let student_id = required(&input.student_id, "Student ID")?;
        let class_name = required(&input.class_name, "Class")?;
        let section = required(&input.section, "Section")?;
        if input.age == 0 {
            return Err(PortalError::Validation("Age must be a positive number".to_string()));
        }
        let now = Utc::now();
        Ok(Student {
            id: Uuid::new_v4(),
            student_id,
            name,
            class_name,
            section,
            age: input.age,
            gender: input.gender,
            vaccinations: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_update(&mut self, update: StudentUpdate) -> PortalResult<()> {
        if let Some(name) = update.name {
            self.name = required(&name, "Name")?;
        }
        if let Some(student_id) = update.student_id {
            self.student_id = required(&student_id, "Student ID")?;
        }
        if let Some(class_name) = update.class_name {
            self.class_name = required(&class_name, "Class")?;
        }
        if let Some(section) = update.section {
            self.section = required(&section, "Section")?;
        }
        if let Some(age) = update.age {
            if age == 0 {
                return Err(PortalError::Validation("Age must be a positive number".to_string()));
            }
            self.age = age;
        }
        if let Some(gender) = update.gender {
            self.gender = gender;
        }
        Ok(())
    }

    /// Whether the student holds at least one Completed record.
    pub fn is_vaccinated(&self) -> bool {
        self.vaccinations
            .iter()
            .any(|v| v.status == RecordStatus::Completed)
    }

    pub fn has_completed_record(&self, drive_id: Uuid) -> bool {
        self.vaccinations
            .iter()
            .any(|v| v.drive_id == drive_id && v.status == RecordStatus::Completed)
    }

    pub fn has_record_for_drive(&self, drive_id: Uuid) -> bool {
        self.vaccinations.iter().any(|v| v.drive_id == drive_id)
    }

    /// Duplicate completed vaccination against the same drive is forbidden.
    pub fn ensure_not_vaccinated_for(&self, drive_id: Uuid) -> PortalResult<()> {
        if self.has_completed_record(drive_id) {
            return Err(PortalError::Conflict(
                "Student is already vaccinated in this drive".to_string(),
            ));
        }
        Ok(())
    }

    /// Flips every still-Scheduled record for `drive_id` to Missed and
    /// returns how many were changed. Completed records are untouched.
    pub fn mark_missed_for_drive(&mut self, drive_id: Uuid) -> u64 {
        let mut changed = 0;
        for record in &mut self.vaccinations {
            if record.drive_id == drive_id && record.status == RecordStatus::Scheduled {
                record.status = RecordStatus::Missed;
                changed += 1;
            }
        }
        changed
    }
}

fn required(value: &str, field: &str) -> PortalResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PortalError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
