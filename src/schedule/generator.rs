// src/schedule/generator.rs
//! Развёртывание конфигурации в конкретные вхождения на годовое окно.
//!
//! Дни, на которые уже есть вхождение, пропускаются и не засчитываются в
//! целевое количество. Обход ограничен концом окна и `2 × target` итерациями.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::recurrence::{nth_date, window_end};
use crate::models::{MaintenanceConfiguration, MaintenanceOccurrence, OccurrenceStatus};

/// Результат одного прохода генератора
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub occurrences: Vec<MaintenanceOccurrence>,
    pub iterations: usize,
    pub skipped_existing: usize,
}

impl GenerationPlan {
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Полночь UTC календарного дня
pub fn due_timestamp(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// Окно от якорной даты конфигурации
pub fn generate(
    config: &MaintenanceConfiguration,
    existing: &[MaintenanceOccurrence],
) -> GenerationPlan {
    generate_window(config, config.anchor_date, existing)
}

/// Окно от произвольного якоря (продление горизонта).
///
/// `existing` должен содержать уже сохранённые вхождения этой конфигурации;
/// их дни заняты независимо от статуса.
pub fn generate_window(
    config: &MaintenanceConfiguration,
    window_anchor: NaiveDate,
    existing: &[MaintenanceOccurrence],
) -> GenerationPlan {
    let target = config.frequency.occurrences_per_year();
    let max_iterations = target * 2;
    let end = window_end(window_anchor);
    let taken: HashSet<NaiveDate> = existing.iter().map(|o| o.due_day()).collect();

    let mut occurrences: Vec<MaintenanceOccurrence> = Vec::with_capacity(target);
    let mut iterations = 0;
    let mut skipped_existing = 0;

    while iterations < max_iterations && occurrences.len() < target {
        let day = nth_date(window_anchor, config.frequency, iterations as u32);
        iterations += 1;

        if day >= end {
            break;
        }
        if taken.contains(&day) {
            skipped_existing += 1;
            continue;
        }
        occurrences.push(build_occurrence(config, day));
    }

    if let Some(last) = occurrences.last_mut() {
        last.is_last_of_window = true;
    }

    log::debug!(
        "Generated {} occurrences for configuration {} from {} ({} iterations, {} existing days skipped)",
        occurrences.len(),
        config.id,
        window_anchor,
        iterations,
        skipped_existing
    );

    GenerationPlan {
        occurrences,
        iterations,
        skipped_existing,
    }
}

/// Якорь окна при пересоздании с учётом завершённой истории.
///
/// Если первая дата сетки после последнего завершённого вхождения лежит в
/// окне якоря, окно остаётся на якоре. Если история уже покрыла это окно,
/// новое окно начинается с этой даты, иначе пересоздание ничего не добавит.
pub fn resume_anchor(config: &MaintenanceConfiguration, existing: &[MaintenanceOccurrence]) -> NaiveDate {
    let anchor = config.anchor_date;
    let latest = match existing
        .iter()
        .filter(|o| o.is_completed())
        .map(|o| o.due_day())
        .max()
    {
        Some(day) if day >= anchor => day,
        _ => return anchor,
    };

    let end = window_end(anchor);
    let mut n: u32 = 1;
    loop {
        let day = nth_date(anchor, config.frequency, n);
        if day > latest || day == NaiveDate::MAX {
            return if day < end { anchor } else { day };
        }
        n += 1;
    }
}

fn build_occurrence(config: &MaintenanceConfiguration, day: NaiveDate) -> MaintenanceOccurrence {
    let now = Utc::now();
    MaintenanceOccurrence {
        id: Uuid::new_v4().to_string(),
        configuration_id: config.id.clone(),
        instrument_id: config.instrument_id.clone(),
        maintenance_type: config.maintenance_type.clone(),
        due_date: due_timestamp(day),
        status: OccurrenceStatus::Scheduled,
        completion_date: None,
        completion_notes: None,
        is_last_of_window: false,
        template_id: config.template_id.clone(),
        responsible_party: config.responsible_party,
        vendor_name: config.vendor_name.clone(),
        vendor_contact: config.vendor_contact.clone(),
        created_at: now,
        updated_at: now,
    }
}
