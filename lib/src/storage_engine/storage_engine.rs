// lib/src/storage_engine/storage_engine.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use models::{Drive, DriveStatus, PortalResult, RecordStatus, Student};

/// Offset/limit pagination, 1-based page numbers.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(page: u64, limit: u64) -> Self {
        Page {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl Default for Page {
    fn default() -> Self {
        Page { page: 1, limit: 10 }
    }
}

/// One page of results plus the totals the list endpoints report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaccinationStatusFilter {
    Vaccinated,
    NotVaccinated,
}

impl VaccinationStatusFilter {
    /// Parses the query-string values; anything else imposes no constraint.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vaccinated" => Some(VaccinationStatusFilter::Vaccinated),
            "not-vaccinated" => Some(VaccinationStatusFilter::NotVaccinated),
            _ => None,
        }
    }
}

/// Conjunctive student list filters; an omitted criterion imposes nothing.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub class_name: Option<String>,
    pub vaccination_status: Option<VaccinationStatusFilter>,
}

/// Drive list filters. `upcoming` restricts to Scheduled drives dated
/// within the next 30 days.
#[derive(Debug, Clone, Default)]
pub struct DriveFilter {
    pub status: Option<DriveStatus>,
    pub upcoming: bool,
}

/// Result of a terminal drive transition: the updated drive and how many
/// still-Scheduled records were cascaded to Missed.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub drive: Drive,
    pub records_missed: u64,
}

/// Result of a successful vaccination: both updated documents.
#[derive(Debug, Clone)]
pub struct VaccinationOutcome {
    pub student: Student,
    pub drive: Drive,
}

/// The entity-store boundary the portal's services depend on.
///
/// Implementations must make single-document writes atomic, enforce
/// `student_id` uniqueness themselves, and run the two composite
/// operations (`transition_drive`, `apply_vaccination`) atomically so the
/// cascade window and dose-decrement race cannot be observed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_student(&self, student: Student) -> PortalResult<Student>;
    async fn get_student(&self, id: Uuid) -> PortalResult<Option<Student>>;
    async fn find_student_by_student_id(&self, student_id: &str) -> PortalResult<Option<Student>>;
    async fn list_students(&self, filter: &StudentFilter, page: Page) -> PortalResult<Paged<Student>>;
    async fn update_student(&self, student: Student) -> PortalResult<Student>;
    async fn delete_student(&self, id: Uuid) -> PortalResult<()>;
    async fn all_students(&self) -> PortalResult<Vec<Student>>;

    async fn insert_drive(&self, drive: Drive) -> PortalResult<Drive>;
    async fn get_drive(&self, id: Uuid) -> PortalResult<Option<Drive>>;
    async fn list_drives(&self, filter: &DriveFilter, page: Page) -> PortalResult<Paged<Drive>>;
    async fn update_drive(&self, drive: Drive) -> PortalResult<Drive>;
    async fn delete_drive(&self, id: Uuid) -> PortalResult<()>;
    async fn all_drives(&self) -> PortalResult<Vec<Drive>>;

    /// Students holding a Completed record against the drive.
    async fn count_vaccinated_for_drive(&self, drive_id: Uuid) -> PortalResult<u64>;

    /// Students holding any record against the drive, optionally narrowed
    /// by record status, sorted by name.
    async fn students_for_drive(
        &self,
        drive_id: Uuid,
        status: Option<RecordStatus>,
        page: Page,
    ) -> PortalResult<Paged<Student>>;

    /// Validates Scheduled -> `target`, writes the status, and cascades
    /// every Scheduled record referencing the drive to Missed, atomically.
    async fn transition_drive(&self, drive_id: Uuid, target: DriveStatus)
        -> PortalResult<TransitionOutcome>;

    /// Atomically re-validates the vaccination invariants, appends the
    /// Completed record, and decrements the dose inventory by exactly one.
    /// A concurrent loser fails instead of driving the count negative.
    async fn apply_vaccination(
        &self,
        student_pk: Uuid,
        drive_id: Uuid,
        administered_at: DateTime<Utc>,
    ) -> PortalResult<VaccinationOutcome>;
}

pub(crate) fn student_matches(student: &Student, filter: &StudentFilter) -> bool {
    if let Some(name) = &filter.name {
        if !student.name.to_lowercase().contains(&name.to_lowercase()) {
            return false;
        }
    }
    if let Some(student_id) = &filter.student_id {
        if !student
            .student_id
            .to_lowercase()
            .contains(&student_id.to_lowercase())
        {
            return false;
        }
    }
    if let Some(class_name) = &filter.class_name {
        if student.class_name != *class_name {
            return false;
        }
    }
    match filter.vaccination_status {
        Some(VaccinationStatusFilter::Vaccinated) => student.is_vaccinated(),
        Some(VaccinationStatusFilter::NotVaccinated) => !student.is_vaccinated(),
        None => true,
    }
}

pub(crate) fn drive_matches(drive: &Drive, filter: &DriveFilter, now: DateTime<Utc>) -> bool {
    if let Some(status) = filter.status {
        if drive.status != status {
            return false;
        }
    }
    if filter.upcoming {
        let window_end = now + Duration::days(30);
        if drive.status != DriveStatus::Scheduled || drive.date < now || drive.date > window_end {
            return false;
        }
    }
    true
}

pub(crate) fn paginate<T>(items: Vec<T>, page: Page) -> Paged<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Paged {
        items,
        total,
        total_pages: total.div_ceil(page.limit),
        current_page: page.page,
    }
}
