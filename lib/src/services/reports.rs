// lib/src/services/reports.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use models::{PortalResult, RecordStatus, Student};

use crate::storage_engine::storage_engine::paginate;
use crate::storage_engine::{EntityStore, Page, Paged};

/// Conjunctive report filters; any omitted criterion imposes no
/// constraint. Date bounds are inclusive; `to_date` covers its whole day.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub vaccine_name: Option<String>,
    pub class_name: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// One flattened row per matching Completed vaccination record, with the
/// owning student's identity denormalized onto it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub section: String,
    pub vaccine_name: String,
    pub date_administered: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaccineStat {
    pub vaccine_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassStat {
    #[serde(rename = "class")]
    pub class_name: String,
    pub total: u64,
    pub vaccinated: u64,
    pub percentage: u32,
}

/// Read-only aggregation over the entity store: explicit
/// flatten-then-filter-then-group over each student's owned record list.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn EntityStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        ReportService { store }
    }

    /// Tabular extract of Completed records matching the filter, newest
    /// administration first.
    pub async fn generate(&self, filter: &ReportFilter, page: Page) -> PortalResult<Paged<ReportRow>> {
        let students = self.store.all_students().await?;
        let mut rows: Vec<ReportRow> = students
            .iter()
            .flat_map(flatten_completed)
            .filter(|row| row_matches(row, filter))
            .collect();
        rows.sort_by(|a, b| b.date_administered.cmp(&a.date_administered));
        Ok(paginate(rows, page))
    }

    /// Completed vaccination counts grouped by vaccine, largest first.
    pub async fn vaccine_stats(&self) -> PortalResult<Vec<VaccineStat>> {
        let students = self.store.all_students().await?;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in students.iter().flat_map(flatten_completed) {
            *counts.entry(row.vaccine_name).or_insert(0) += 1;
        }
        let mut stats: Vec<VaccineStat> = counts
            .into_iter()
            .map(|(vaccine_name, count)| VaccineStat { vaccine_name, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.vaccine_name.cmp(&b.vaccine_name)));
        Ok(stats)
    }

    /// Per-class totals with the vaccinated share as a rounded percentage.
    pub async fn class_stats(&self) -> PortalResult<Vec<ClassStat>> {
        let students = self.store.all_students().await?;
        let mut classes: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for student in &students {
            let entry = classes.entry(student.class_name.clone()).or_insert((0, 0));
            entry.0 += 1;
            if student.is_vaccinated() {
                entry.1 += 1;
            }
        }
        Ok(classes
            .into_iter()
            .map(|(class_name, (total, vaccinated))| ClassStat {
                class_name,
                total,
                vaccinated,
                percentage: percentage(vaccinated, total),
            })
            .collect())
    }

    /// Distinct vaccine names seen on Completed records; when none exist
    /// yet, falls back to the names of the drives themselves.
    pub async fn available_vaccines(&self) -> PortalResult<Vec<String>> {
        let students = self.store.all_students().await?;
        let mut names: Vec<String> = students
            .iter()
            .flat_map(flatten_completed)
            .map(|row| row.vaccine_name)
            .collect();
        names.sort();
        names.dedup();
        if !names.is_empty() {
            return Ok(names);
        }
        let mut names: Vec<String> = self
            .store
            .all_drives()
            .await?
            .into_iter()
            .map(|d| d.vaccine_name)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

pub(crate) fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

fn flatten_completed(student: &Student) -> Vec<ReportRow> {
    student
        .vaccinations
        .iter()
        .filter(|v| v.status == RecordStatus::Completed)
        .filter_map(|v| {
            v.date_administered.map(|date| ReportRow {
                student_id: student.student_id.clone(),
                name: student.name.clone(),
                class_name: student.class_name.clone(),
                section: student.section.clone(),
                vaccine_name: v.vaccine_name.clone(),
                date_administered: date,
            })
        })
        .collect()
}

fn row_matches(row: &ReportRow, filter: &ReportFilter) -> bool {
    if let Some(vaccine) = &filter.vaccine_name {
        if row.vaccine_name != *vaccine {
            return false;
        }
    }
    if let Some(class_name) = &filter.class_name {
        if row.class_name != *class_name {
            return false;
        }
    }
    if let Some(from) = filter.from_date {
        if row.date_administered < from {
            return false;
        }
    }
    if let Some(to) = filter.to_date {
        if row.date_administered > end_of_day(to) {
            return false;
        }
    }
    true
}

// The upper bound covers the entire calendar day it falls on.
fn end_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_engine::memory_storage::MemoryEntityStore;
    use chrono::{Duration, TimeZone};
    use models::{Drive, Gender, NewDrive, NewStudent, VaccinationRecord};
    use uuid::Uuid;

    fn setup() -> (ReportService, Arc<MemoryEntityStore>) {
        let store = Arc::new(MemoryEntityStore::new());
        (ReportService::new(store.clone()), store)
    }

    async fn seeded_student(
        store: &MemoryEntityStore,
        student_id: &str,
        class_name: &str,
        records: Vec<VaccinationRecord>,
    ) -> Student {
        let mut student = Student::new(NewStudent {
            name: format!("Student {}", student_id),
            student_id: student_id.to_string(),
            class_name: class_name.to_string(),
            section: "A".to_string(),
            age: 10,
            gender: Gender::Female,
        })
        .unwrap();
        student.vaccinations = records;
        store.insert_student(student).await.unwrap()
    }

    fn completed(vaccine: &str, at: DateTime<Utc>) -> VaccinationRecord {
        VaccinationRecord::completed(Uuid::new_v4(), vaccine.to_string(), at)
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn should_flatten_one_row_per_completed_record() {
        let (service, store) = setup();
        seeded_student(
            &store,
            "S-1",
            "5",
            vec![
                completed("Polio", at(2025, 3, 1, 10)),
                completed("Measles", at(2025, 3, 2, 10)),
                VaccinationRecord::scheduled(Uuid::new_v4(), "BCG".to_string()),
            ],
        )
        .await;

        let rows = service
            .generate(&ReportFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(rows.total, 2);
        // newest first
        assert_eq!(rows.items[0].vaccine_name, "Measles");
        assert_eq!(rows.items[1].vaccine_name, "Polio");
        assert_eq!(rows.items[0].student_id, "S-1");
    }

    #[tokio::test]
    async fn should_apply_conjunctive_filters() {
        let (service, store) = setup();
        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 10))]).await;
        seeded_student(&store, "S-2", "6", vec![completed("Polio", at(2025, 3, 2, 10))]).await;
        seeded_student(&store, "S-3", "5", vec![completed("Measles", at(2025, 3, 3, 10))]).await;

        let filter = ReportFilter {
            vaccine_name: Some("Polio".to_string()),
            class_name: Some("5".to_string()),
            ..Default::default()
        };
        let rows = service.generate(&filter, Page::default()).await.unwrap();
        assert_eq!(rows.total, 1);
        assert_eq!(rows.items[0].student_id, "S-1");
    }

    #[tokio::test]
    async fn should_include_boundary_dates_on_both_ends() {
        let (service, store) = setup();
        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 0))]).await;
        seeded_student(&store, "S-2", "5", vec![completed("Polio", at(2025, 3, 5, 23))]).await;
        seeded_student(&store, "S-3", "5", vec![completed("Polio", at(2025, 3, 6, 1))]).await;

        let filter = ReportFilter {
            from_date: Some(at(2025, 3, 1, 0)),
            to_date: Some(at(2025, 3, 5, 0)),
            ..Default::default()
        };
        let rows = service.generate(&filter, Page::default()).await.unwrap();
        assert_eq!(rows.total, 2);
        let ids: Vec<&str> = rows.items.iter().map(|r| r.student_id.as_str()).collect();
        assert!(ids.contains(&"S-1"));
        assert!(ids.contains(&"S-2"));
    }

    #[tokio::test]
    async fn should_support_one_sided_date_bounds() {
        let (service, store) = setup();
        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 10))]).await;
        seeded_student(&store, "S-2", "5", vec![completed("Polio", at(2025, 4, 1, 10))]).await;

        let filter = ReportFilter {
            from_date: Some(at(2025, 3, 15, 0)),
            ..Default::default()
        };
        let rows = service.generate(&filter, Page::default()).await.unwrap();
        assert_eq!(rows.total, 1);
        assert_eq!(rows.items[0].student_id, "S-2");
    }

    #[tokio::test]
    async fn should_paginate_report_rows() {
        let (service, store) = setup();
        for i in 0..5 {
            seeded_student(
                &store,
                &format!("S-{}", i),
                "5",
                vec![completed("Polio", at(2025, 3, 1 + i, 10))],
            )
            .await;
        }
        let rows = service
            .generate(&ReportFilter::default(), Page::new(2, 2))
            .await
            .unwrap();
        assert_eq!(rows.total, 5);
        assert_eq!(rows.items.len(), 2);
        assert_eq!(rows.total_pages, 3);
        assert_eq!(rows.current_page, 2);
    }

    #[tokio::test]
    async fn should_count_vaccine_stats_descending() {
        let (service, store) = setup();
        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 10))]).await;
        seeded_student(&store, "S-2", "5", vec![completed("Polio", at(2025, 3, 2, 10))]).await;
        seeded_student(&store, "S-3", "5", vec![completed("Measles", at(2025, 3, 3, 10))]).await;

        let stats = service.vaccine_stats().await.unwrap();
        assert_eq!(
            stats,
            vec![
                VaccineStat { vaccine_name: "Polio".to_string(), count: 2 },
                VaccineStat { vaccine_name: "Measles".to_string(), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn should_compute_class_stats_with_rounded_percentage() {
        let (service, store) = setup();
        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 10))]).await;
        seeded_student(&store, "S-2", "5", vec![]).await;
        seeded_student(&store, "S-3", "6", vec![]).await;

        let stats = service.class_stats().await.unwrap();
        assert_eq!(
            stats,
            vec![
                ClassStat { class_name: "5".to_string(), total: 2, vaccinated: 1, percentage: 50 },
                ClassStat { class_name: "6".to_string(), total: 1, vaccinated: 0, percentage: 0 },
            ]
        );
    }

    #[tokio::test]
    async fn should_fall_back_to_drive_vaccines_when_no_completions() {
        let (service, store) = setup();
        let drive = Drive::new(NewDrive {
            vaccine_name: "BCG".to_string(),
            date: Utc::now() + Duration::days(7),
            available_doses: 10,
            applicable_classes: vec!["5".to_string()],
            created_by: None,
        })
        .unwrap();
        store.insert_drive(drive).await.unwrap();

        assert_eq!(service.available_vaccines().await.unwrap(), vec!["BCG".to_string()]);

        seeded_student(&store, "S-1", "5", vec![completed("Polio", at(2025, 3, 1, 10))]).await;
        assert_eq!(service.available_vaccines().await.unwrap(), vec!["Polio".to_string()]);
    }

    #[test]
    fn should_round_percentages_and_handle_zero_total() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 3), 100);
    }
}
