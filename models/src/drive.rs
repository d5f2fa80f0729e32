// models/src/drive.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{PortalError, PortalResult};

/// Lifecycle state of a vaccination drive.
///
/// The only legal transitions are Scheduled -> Completed and
/// Scheduled -> Cancelled; terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl DriveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DriveStatus::Scheduled)
    }

    /// Validates a transition into `target`, naming the current status on
    /// rejection. This is the single place the transition rule lives.
    pub fn validate_transition(self, target: DriveStatus) -> PortalResult<()> {
        let verb = match target {
            DriveStatus::Completed => "complete",
            DriveStatus::Cancelled => "cancel",
            DriveStatus::Scheduled => "reschedule",
        };
        if self != DriveStatus::Scheduled || target == DriveStatus::Scheduled {
            return Err(PortalError::InvalidState(format!(
                "Cannot {} a {} vaccination drive",
                verb,
                self.to_string().to_lowercase()
            )));
        }
        Ok(())
    }

    /// Editable fields may only change while the drive is still Scheduled.
    pub fn ensure_editable(self) -> PortalResult<()> {
        if self.is_terminal() {
            return Err(PortalError::InvalidState(format!(
                "Cannot update a {} vaccination drive",
                self.to_string().to_lowercase()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DriveStatus::Scheduled => "Scheduled",
            DriveStatus::Completed => "Completed",
            DriveStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A scheduled vaccination event for one vaccine, on one date, open to the
/// listed classes, with a finite dose inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: Uuid,
    pub vaccine_name: String,
    pub date: DateTime<Utc>,
    pub available_doses: u32,
    pub applicable_classes: Vec<String>,
    pub status: DriveStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDrive {
    pub vaccine_name: String,
    pub date: DateTime<Utc>,
    pub available_doses: u32,
    pub applicable_classes: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Partial update of a Scheduled drive; omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUpdate {
    pub vaccine_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub available_doses: Option<u32>,
    pub applicable_classes: Option<Vec<String>>,
}

impl Drive {
    pub fn new(input: NewDrive) -> PortalResult<Self> {
        let vaccine_name = input.vaccine_name.trim().to_string();
        if vaccine_name.is_empty() {
            return Err(PortalError::Validation("Vaccine name is required".to_string()));
        }
        let applicable_classes = normalized_classes(input.applicable_classes)?;
        if input.available_doses < 1 {
            return Err(PortalError::Validation(
                "Available doses must be at least 1".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Drive {
            id: Uuid::new_v4(),
            vaccine_name,
            date: input.date,
            available_doses: input.available_doses,
            applicable_classes,
            status: DriveStatus::Scheduled,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies an edit payload; the caller is responsible for the
    /// status guard (`DriveStatus::ensure_editable`).
    pub fn apply_update(&mut self, update: DriveUpdate) -> PortalResult<()> {
        if let Some(name) = update.vaccine_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(PortalError::Validation("Vaccine name is required".to_string()));
            }
            self.vaccine_name = name;
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(doses) = update.available_doses {
            if doses < 1 {
                return Err(PortalError::Validation(
                    "Available doses must be at least 1".to_string(),
                ));
            }
            self.available_doses = doses;
        }
        if let Some(classes) = update.applicable_classes {
            self.applicable_classes = normalized_classes(classes)?;
        }
        Ok(())
    }

    /// A student may only be vaccinated while the drive is Scheduled.
    pub fn ensure_open_for_vaccination(&self) -> PortalResult<()> {
        if self.status.is_terminal() {
            return Err(PortalError::InvalidState(format!(
                "Drive is {}, cannot vaccinate student",
                self.status.to_string().to_lowercase()
            )));
        }
        Ok(())
    }

    pub fn ensure_applicable_to(&self, class_name: &str) -> PortalResult<()> {
        if !self.applicable_classes.iter().any(|c| c == class_name) {
            return Err(PortalError::Validation(
                "Student's class is not applicable for this drive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_doses_available(&self) -> PortalResult<()> {
        if self.available_doses == 0 {
            return Err(PortalError::Conflict(
                "No doses available in this drive".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalized_classes(classes: Vec<String>) -> PortalResult<Vec<String>> {
    let classes: Vec<String> = classes
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if classes.is_empty() {
        return Err(PortalError::Validation(
            "At least one applicable class is required".to_string(),
        ));
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_drive_input() -> NewDrive {
        NewDrive {
            vaccine_name: "Polio".to_string(),
            date: Utc::now() + Duration::days(7),
            available_doses: 50,
            applicable_classes: vec!["5".to_string(), "6".to_string()],
            created_by: None,
        }
    }

    #[test]
    fn should_create_scheduled_drive() {
        let drive = Drive::new(new_drive_input()).unwrap();
        assert_eq!(drive.status, DriveStatus::Scheduled);
        assert_eq!(drive.available_doses, 50);
    }

    #[test]
    fn should_reject_empty_vaccine_name() {
        let mut input = new_drive_input();
        input.vaccine_name = "  ".to_string();
        let err = Drive::new(input).unwrap_err();
        assert_eq!(err, PortalError::Validation("Vaccine name is required".to_string()));
    }

    #[test]
    fn should_reject_empty_applicable_classes() {
        let mut input = new_drive_input();
        input.applicable_classes = vec!["".to_string()];
        assert!(matches!(Drive::new(input), Err(PortalError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_doses() {
        let mut input = new_drive_input();
        input.available_doses = 0;
        assert!(matches!(Drive::new(input), Err(PortalError::Validation(_))));
    }

    #[test]
    fn should_allow_scheduled_to_terminal_transitions() {
        assert!(DriveStatus::Scheduled.validate_transition(DriveStatus::Completed).is_ok());
        assert!(DriveStatus::Scheduled.validate_transition(DriveStatus::Cancelled).is_ok());
    }

    #[test]
    fn should_reject_transitions_out_of_terminal_states() {
        let err = DriveStatus::Completed
            .validate_transition(DriveStatus::Cancelled)
            .unwrap_err();
        assert_eq!(
            err,
            PortalError::InvalidState("Cannot cancel a completed vaccination drive".to_string())
        );
        assert!(DriveStatus::Cancelled.validate_transition(DriveStatus::Completed).is_err());
        assert!(DriveStatus::Scheduled.validate_transition(DriveStatus::Scheduled).is_err());
    }

    #[test]
    fn should_guard_edits_of_terminal_drives() {
        let err = DriveStatus::Cancelled.ensure_editable().unwrap_err();
        assert_eq!(
            err,
            PortalError::InvalidState("Cannot update a cancelled vaccination drive".to_string())
        );
        assert!(DriveStatus::Scheduled.ensure_editable().is_ok());
    }

    #[test]
    fn should_apply_partial_update_only_to_supplied_fields() {
        let mut drive = Drive::new(new_drive_input()).unwrap();
        let original_date = drive.date;
        drive
            .apply_update(DriveUpdate {
                vaccine_name: Some("Measles".to_string()),
                available_doses: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(drive.vaccine_name, "Measles");
        assert_eq!(drive.available_doses, 10);
        assert_eq!(drive.date, original_date);
        assert_eq!(drive.applicable_classes, vec!["5".to_string(), "6".to_string()]);
    }

    #[test]
    fn should_enforce_vaccination_preconditions() {
        let mut drive = Drive::new(new_drive_input()).unwrap();
        assert!(drive.ensure_open_for_vaccination().is_ok());
        assert!(drive.ensure_applicable_to("5").is_ok());
        assert!(drive.ensure_applicable_to("7").is_err());
        drive.available_doses = 0;
        assert_eq!(
            drive.ensure_doses_available().unwrap_err(),
            PortalError::Conflict("No doses available in this drive".to_string())
        );
        drive.status = DriveStatus::Completed;
        assert_eq!(
            drive.ensure_open_for_vaccination().unwrap_err(),
            PortalError::InvalidState("Drive is completed, cannot vaccinate student".to_string())
        );
    }
}
