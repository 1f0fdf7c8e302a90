// src/schedule/reconcile.rs
//! Слияние сохранённых и виртуальных вхождений: одно логическое вхождение
//! на (прибор, тип, календарный день UTC).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::evaluator::{evaluate, CompletionSummary, DisplayStatus};
use super::generator::generate;
use crate::models::{MaintenanceConfiguration, MaintenanceOccurrence, MaintenanceResult};

/// Вхождение вместе с вычисленным статусом для отображения
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    #[serde(flatten)]
    pub occurrence: MaintenanceOccurrence,
    pub evaluation: CompletionSummary,
    pub has_result: bool,
    pub is_virtual: bool,
}

impl ScheduleEntry {
    pub fn persisted(
        occurrence: MaintenanceOccurrence,
        result: Option<&MaintenanceResult>,
        now: DateTime<Utc>,
    ) -> Self {
        let evaluation = evaluate(&occurrence, result, now);
        Self {
            occurrence,
            evaluation,
            has_result: result.is_some(),
            is_virtual: false,
        }
    }

    pub fn virtual_entry(occurrence: MaintenanceOccurrence, now: DateTime<Utc>) -> Self {
        let evaluation = evaluate(&occurrence, None, now);
        Self {
            occurrence,
            evaluation,
            has_result: false,
            is_virtual: true,
        }
    }

    fn key(&self) -> (String, String, NaiveDate) {
        (
            self.occurrence.instrument_id.clone(),
            self.occurrence.maintenance_type.clone(),
            self.occurrence.due_day(),
        )
    }

    /// Completed > PartiallyCompleted > есть результат > Pending/Overdue
    fn completion_rank(&self) -> u8 {
        match self.evaluation.status {
            DisplayStatus::Completed => 3,
            DisplayStatus::PartiallyCompleted => 2,
            _ if self.has_result => 1,
            _ => 0,
        }
    }
}

/// Виртуальные вхождения для конфигурации без сохранённых строк.
/// Никогда не сохраняются.
pub fn materialize_virtual(
    config: &MaintenanceConfiguration,
    now: DateTime<Utc>,
) -> Vec<ScheduleEntry> {
    generate(config, &[])
        .occurrences
        .into_iter()
        .map(|occurrence| ScheduleEntry::virtual_entry(occurrence, now))
        .collect()
}

/// Сохранённое всегда побеждает виртуальное; среди сохранённых побеждает
/// более продвинутое, при равенстве остаётся первое.
pub fn reconcile(
    persisted: Vec<ScheduleEntry>,
    virtual_entries: Vec<ScheduleEntry>,
) -> Vec<ScheduleEntry> {
    let mut merged: Vec<ScheduleEntry> = Vec::with_capacity(persisted.len() + virtual_entries.len());
    let mut index: HashMap<(String, String, NaiveDate), usize> = HashMap::new();
    let mut collapsed = 0usize;

    for entry in persisted {
        match index.get(&entry.key()) {
            Some(&pos) => {
                collapsed += 1;
                if entry.completion_rank() > merged[pos].completion_rank() {
                    merged[pos] = entry;
                }
            }
            None => {
                index.insert(entry.key(), merged.len());
                merged.push(entry);
            }
        }
    }

    for entry in virtual_entries {
        if index.contains_key(&entry.key()) {
            continue;
        }
        index.insert(entry.key(), merged.len());
        merged.push(entry);
    }

    if collapsed > 0 {
        log::warn!("Collapsed {} duplicate persisted occurrences", collapsed);
    }

    merged.sort_by(|a, b| {
        a.occurrence
            .due_date
            .cmp(&b.occurrence.due_date)
            .then_with(|| a.occurrence.instrument_id.cmp(&b.occurrence.instrument_id))
            .then_with(|| a.occurrence.maintenance_type.cmp(&b.occurrence.maintenance_type))
    });
    merged
}
