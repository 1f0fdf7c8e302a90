// src/schedule/regeneration.rs
//! Реакция на два события: правка конфигурации и завершение последнего
//! вхождения окна.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use super::generator::{generate_window, resume_anchor};
use super::recurrence::next_date;
use crate::error::ApiResult;
use crate::models::{MaintenanceConfiguration, MaintenanceOccurrence, OccurrenceFilter};
use crate::repositories::MaintenanceStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerationOutcome {
    pub deleted: u64,
    pub created: u64,
    pub window_anchor: NaiveDate,
}

#[derive(Clone)]
pub struct RegenerationController {
    store: Arc<dyn MaintenanceStore>,
}

impl RegenerationController {
    pub fn new(store: Arc<dyn MaintenanceStore>) -> Self {
        Self { store }
    }

    /// Пересоздать расписание, если изменились поля, от которых оно зависит
    pub async fn on_configuration_edited(
        &self,
        previous: &MaintenanceConfiguration,
        current: &MaintenanceConfiguration,
    ) -> ApiResult<Option<RegenerationOutcome>> {
        if !previous.schedule_changed(current) {
            log::debug!(
                "Configuration {} edited without schedule changes, keeping occurrences",
                current.id
            );
            return Ok(None);
        }
        self.regenerate_with(current).await.map(Some)
    }

    /// Удалить незавершённые вхождения и сгенерировать окно заново.
    /// Завершённая история не трогается, её дни остаются занятыми; если она
    /// уже покрыла окно якоря, окно начинается после неё.
    #[tracing::instrument(skip_all, fields(configuration_id = %config.id))]
    pub async fn regenerate_with(&self, config: &MaintenanceConfiguration) -> ApiResult<RegenerationOutcome> {
        let existing = self
            .store
            .list_occurrences(&OccurrenceFilter::for_configuration(&config.id))
            .await?;
        let completed: Vec<MaintenanceOccurrence> =
            existing.into_iter().filter(|o| o.is_completed()).collect();

        let window_anchor = resume_anchor(config, &completed);
        let plan = generate_window(config, window_anchor, &completed);
        let replaced = self.store.replace_pending(&config.id, &plan.occurrences).await?;

        log::info!(
            "Regenerated schedule for configuration {} ({} from {}): {} removed, {} created, {} completed kept",
            config.id,
            config.frequency,
            window_anchor,
            replaced.deleted,
            replaced.inserted,
            completed.len()
        );

        Ok(RegenerationOutcome {
            deleted: replaced.deleted,
            created: replaced.inserted,
            window_anchor,
        })
    }

    /// Продлить горизонт после завершения последнего вхождения окна.
    ///
    /// Вызывать только в момент перехода в Completed. Отсутствующая
    /// конфигурация не считается ошибкой.
    #[tracing::instrument(skip_all, fields(occurrence_id = %occurrence.id))]
    pub async fn on_occurrence_completed(
        &self,
        occurrence: &MaintenanceOccurrence,
    ) -> ApiResult<Option<RegenerationOutcome>> {
        if !occurrence.is_last_of_window {
            return Ok(None);
        }

        let config = match self.store.get_configuration(&occurrence.configuration_id).await? {
            Some(config) => config,
            None => {
                log::warn!(
                    "Occurrence {} closed its window but configuration {} is gone; schedule not extended",
                    occurrence.id,
                    occurrence.configuration_id
                );
                return Ok(None);
            }
        };

        let from = occurrence.completion_date.unwrap_or_else(|| occurrence.due_day());
        let window_anchor = next_date(from, config.frequency);

        let existing = self
            .store
            .list_occurrences(&OccurrenceFilter::for_configuration(&config.id))
            .await?;
        let plan = generate_window(&config, window_anchor, &existing);
        let created = self.store.insert_occurrences(&plan.occurrences).await?;

        log::info!(
            "Extended schedule for configuration {} from {}: {} occurrences",
            config.id,
            window_anchor,
            created
        );

        Ok(Some(RegenerationOutcome {
            deleted: 0,
            created,
            window_anchor,
        }))
    }
}
