// src/models/occurrence.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use super::configuration::ResponsibleParty;

// === ENUMS ===

/// Хранимый жизненный цикл вхождения. Переходы только вперёд.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

impl OccurrenceStatus {
    fn rank(&self) -> u8 {
        match self {
            OccurrenceStatus::Scheduled => 0,
            OccurrenceStatus::InProgress => 1,
            OccurrenceStatus::Completed => 2,
        }
    }
}

// === OCCURRENCE ===

/// Конкретное плановое обслуживание на определённую дату
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceOccurrence {
    pub id: String,
    pub configuration_id: String,
    pub instrument_id: String,
    pub maintenance_type: String,
    pub due_date: DateTime<Utc>,
    pub status: OccurrenceStatus,
    pub completion_date: Option<NaiveDate>,
    pub completion_notes: Option<String>,
    pub is_last_of_window: bool,
    pub template_id: Option<String>,
    pub responsible_party: ResponsibleParty,
    pub vendor_name: Option<String>,
    pub vendor_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceOccurrence {
    /// Календарный день срока (UTC)
    pub fn due_day(&self) -> NaiveDate {
        self.due_date.date_naive()
    }

    pub fn is_completed(&self) -> bool {
        self.status == OccurrenceStatus::Completed
    }

    /// Продвинуть статус. Возвращает `false`, если переход назад или на месте.
    pub fn advance_to(&mut self, next: OccurrenceStatus) -> bool {
        if next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Отметить выполненным. Повторное завершение ничего не меняет.
    pub fn complete(&mut self, completion_date: NaiveDate, notes: Option<String>) -> bool {
        if !self.advance_to(OccurrenceStatus::Completed) {
            return false;
        }
        self.completion_date = Some(completion_date);
        if notes.is_some() {
            self.completion_notes = notes;
        }
        true
    }
}

/// Фильтр выборки вхождений из хранилища
#[derive(Debug, Clone, Default)]
pub struct OccurrenceFilter {
    pub instrument_id: Option<String>,
    pub maintenance_type: Option<String>,
    pub configuration_id: Option<String>,
    pub statuses: Vec<OccurrenceStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
}

impl OccurrenceFilter {
    pub fn for_configuration(configuration_id: &str) -> Self {
        Self {
            configuration_id: Some(configuration_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_instrument(instrument_id: &str) -> Self {
        Self {
            instrument_id: Some(instrument_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, occurrence: &MaintenanceOccurrence) -> bool {
        let day = occurrence.due_day();
        self.instrument_id.as_ref().map_or(true, |v| *v == occurrence.instrument_id)
            && self.maintenance_type.as_ref().map_or(true, |v| *v == occurrence.maintenance_type)
            && self.configuration_id.as_ref().map_or(true, |v| *v == occurrence.configuration_id)
            && (self.statuses.is_empty() || self.statuses.contains(&occurrence.status))
            && self.due_from.map_or(true, |from| day >= from)
            && self.due_to.map_or(true, |to| day <= to)
    }
}

// === REQUESTS ===

/// Ручное завершение без структурированных данных испытаний
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompleteOccurrenceRequest {
    pub completion_date: Option<NaiveDate>,

    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

/// Диапазон дат для выборки расписания
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> MaintenanceOccurrence {
        let now = Utc::now();
        MaintenanceOccurrence {
            id: "occ-1".to_string(),
            configuration_id: "cfg-1".to_string(),
            instrument_id: "inst-1".to_string(),
            maintenance_type: "Calibration".to_string(),
            due_date: Utc.with_ymd_and_hms(2024, 5, 10, 14, 30, 0).unwrap(),
            status: OccurrenceStatus::Scheduled,
            completion_date: None,
            completion_notes: None,
            is_last_of_window: false,
            template_id: None,
            responsible_party: ResponsibleParty::InHouse,
            vendor_name: None,
            vendor_contact: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut occ = sample();
        assert!(occ.advance_to(OccurrenceStatus::InProgress));
        assert!(!occ.advance_to(OccurrenceStatus::Scheduled));
        assert!(occ.advance_to(OccurrenceStatus::Completed));
        assert!(!occ.advance_to(OccurrenceStatus::InProgress));
        assert_eq!(occ.status, OccurrenceStatus::Completed);
    }

    #[test]
    fn test_complete_once() {
        let mut occ = sample();
        let day = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        assert!(occ.complete(day, Some("done".to_string())));
        assert!(!occ.complete(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), None));
        assert_eq!(occ.completion_date, Some(day));
        assert_eq!(occ.completion_notes.as_deref(), Some("done"));
    }

    #[test]
    fn test_filter_by_day_range() {
        let occ = sample();
        let mut filter = OccurrenceFilter::for_instrument("inst-1");
        filter.due_from = NaiveDate::from_ymd_opt(2024, 5, 10);
        filter.due_to = NaiveDate::from_ymd_opt(2024, 5, 10);
        assert!(filter.matches(&occ));

        filter.statuses = vec![OccurrenceStatus::Completed];
        assert!(!filter.matches(&occ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OccurrenceStatus::InProgress.as_ref(), "in_progress");
        assert_eq!(
            "completed".parse::<OccurrenceStatus>().unwrap(),
            OccurrenceStatus::Completed
        );
    }
}
