// src/schedule/service.rs
//! Операции над расписанием, которые вызывает HTTP-слой.
//!
//! Многошаговые операции не атомарны целиком: при сбое хранилища ошибка
//! возвращается вызывающему, а повторный вызов безопасен (генерация
//! идемпотентна, сохранение результата делает upsert).

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use super::evaluator::{apply_row_outcomes, evaluate, CompletionSummary};
use super::generator::generate;
use super::reconcile::{materialize_virtual, reconcile, ScheduleEntry};
use super::regeneration::{RegenerationController, RegenerationOutcome};
use crate::config::ScheduleConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CompleteOccurrenceRequest, CreateConfigurationRequest, CreateTemplateRequest,
    MaintenanceConfiguration, MaintenanceOccurrence, MaintenanceResult, MaintenanceTemplate,
    OccurrenceFilter, OccurrenceStatus, ResultCategory, SaveResultRequest, SaveSectionRequest,
    ScheduleQuery, UpdateConfigurationRequest,
};
use crate::repositories::MaintenanceStore;

// ==================== RESPONSES ====================

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationChange {
    pub configuration: MaintenanceConfiguration,
    /// Заполнено, если расписание было (пере)создано
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regeneration: Option<RegenerationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceDetail {
    pub occurrence: MaintenanceOccurrence,
    pub result: Option<MaintenanceResult>,
    pub evaluation: CompletionSummary,
    /// Продление горизонта, если это сохранение его вызвало
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<RegenerationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentScheduleDeletion {
    pub instrument_id: String,
    pub configurations_deleted: u64,
}

// ==================== SERVICE ====================

#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn MaintenanceStore>,
    controller: RegenerationController,
    settings: ScheduleConfig,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn MaintenanceStore>, settings: ScheduleConfig) -> Self {
        let controller = RegenerationController::new(store.clone());
        Self {
            store,
            controller,
            settings,
        }
    }

    // ==================== CONFIGURATIONS ====================

    pub async fn create_configuration(
        &self,
        instrument_id: &str,
        request: CreateConfigurationRequest,
    ) -> ApiResult<ConfigurationChange> {
        let config = request.into_configuration(instrument_id)?;
        self.ensure_template(config.template_id.as_deref()).await?;

        self.store.insert_configuration(&config).await?;

        let plan = generate(&config, &[]);
        let created = self.store.insert_occurrences(&plan.occurrences).await?;

        log::info!(
            "Created configuration {} ({} / {}) for instrument {} with {} occurrences",
            config.id,
            config.maintenance_type,
            config.frequency,
            instrument_id,
            created
        );

        Ok(ConfigurationChange {
            regeneration: Some(RegenerationOutcome {
                deleted: 0,
                created,
                window_anchor: config.anchor_date,
            }),
            configuration: config,
        })
    }

    pub async fn update_configuration(
        &self,
        id: &str,
        request: UpdateConfigurationRequest,
    ) -> ApiResult<ConfigurationChange> {
        let current = self.get_configuration(id).await?;
        let updated = request.apply_to(&current)?;
        if updated.template_id != current.template_id {
            self.ensure_template(updated.template_id.as_deref()).await?;
        }

        self.store.update_configuration(&updated).await?;
        let regeneration = self.controller.on_configuration_edited(&current, &updated).await?;

        Ok(ConfigurationChange {
            configuration: updated,
            regeneration,
        })
    }

    /// Явный повторный запуск пересоздания (путь восстановления после сбоя)
    pub async fn regenerate(&self, configuration_id: &str) -> ApiResult<RegenerationOutcome> {
        let config = self.get_configuration(configuration_id).await?;
        self.controller.regenerate_with(&config).await
    }

    pub async fn get_configuration(&self, id: &str) -> ApiResult<MaintenanceConfiguration> {
        self.store
            .get_configuration(id)
            .await?
            .ok_or_else(|| ApiError::configuration_not_found(id))
    }

    pub async fn list_configurations(&self, instrument_id: &str) -> ApiResult<Vec<MaintenanceConfiguration>> {
        self.store.list_configurations(instrument_id).await
    }

    pub async fn delete_configuration(&self, id: &str) -> ApiResult<()> {
        if !self.store.delete_configuration(id).await? {
            return Err(ApiError::configuration_not_found(id));
        }
        log::info!("Deleted configuration {} with its occurrences", id);
        Ok(())
    }

    pub async fn delete_instrument_schedule(&self, instrument_id: &str) -> ApiResult<InstrumentScheduleDeletion> {
        let deleted = self.store.delete_instrument(instrument_id).await?;
        log::info!(
            "Deleted schedule of instrument {} ({} configurations)",
            instrument_id,
            deleted
        );
        Ok(InstrumentScheduleDeletion {
            instrument_id: instrument_id.to_string(),
            configurations_deleted: deleted,
        })
    }

    // ==================== SCHEDULE ====================

    /// Сведённое расписание прибора с вычисленными статусами
    pub async fn schedule_for_instrument(
        &self,
        instrument_id: &str,
        query: &ScheduleQuery,
        now: DateTime<Utc>,
    ) -> ApiResult<Vec<ScheduleEntry>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(ApiError::bad_request("'from' must not be after 'to'"));
            }
        }

        let persisted = self
            .store
            .list_occurrences(&OccurrenceFilter::for_instrument(instrument_id))
            .await?;
        let with_rows: HashSet<String> =
            persisted.iter().map(|o| o.configuration_id.clone()).collect();

        let in_range: Vec<MaintenanceOccurrence> = persisted
            .into_iter()
            .filter(|o| within(o.due_day(), query))
            .collect();

        let ids: Vec<String> = in_range.iter().map(|o| o.id.clone()).collect();
        let results: HashMap<String, MaintenanceResult> = self
            .store
            .list_results(&ids)
            .await?
            .into_iter()
            .map(|r| (r.occurrence_id.clone(), r))
            .collect();

        let persisted_entries: Vec<ScheduleEntry> = in_range
            .into_iter()
            .map(|occ| {
                let result = results.get(&occ.id);
                ScheduleEntry::persisted(occ, result, now)
            })
            .collect();

        let mut virtual_entries = Vec::new();
        if self.settings.materialize_virtual {
            let horizon = now
                .date_naive()
                .checked_add_days(Days::new(self.settings.virtual_horizon_days.max(0) as u64))
                .unwrap_or(NaiveDate::MAX);
            for config in self.store.list_configurations(instrument_id).await? {
                if with_rows.contains(&config.id) {
                    continue;
                }
                virtual_entries.extend(
                    materialize_virtual(&config, now)
                        .into_iter()
                        .filter(|e| e.occurrence.due_day() <= horizon && within(e.occurrence.due_day(), query)),
                );
            }
        }

        Ok(reconcile(persisted_entries, virtual_entries))
    }

    pub async fn occurrence_detail(&self, id: &str, now: DateTime<Utc>) -> ApiResult<OccurrenceDetail> {
        let occurrence = self.get_occurrence(id).await?;
        let result = self.store.get_result(id).await?;
        Ok(detail(occurrence, result, None, now))
    }

    // ==================== RESULTS ====================

    /// Сохранить «шапку» результата; `test_data`, если передан, заменяет секции целиком
    pub async fn save_result(
        &self,
        occurrence_id: &str,
        request: SaveResultRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<OccurrenceDetail> {
        request.validate()?;
        let occurrence = self.get_occurrence(occurrence_id).await?;
        let mut result = match self.store.get_result(occurrence_id).await? {
            Some(result) => result,
            None => MaintenanceResult::new(occurrence_id, occurrence.template_id.clone()),
        };

        if let Some(category) = request.category.as_deref() {
            result.category = ResultCategory::from_str(category.trim()).map_err(|_| {
                ApiError::ValidationError(format!("Unknown result category '{}'", category))
            })?;
        }
        if request.completion_date.is_some() {
            result.completion_date = request.completion_date;
        }
        if request.notes.is_some() {
            result.notes = request.notes;
        }
        if request.document_ref.is_some() {
            result.document_ref = request.document_ref;
        }
        if let Some(mut sections) = request.test_data {
            sections.iter_mut().for_each(apply_row_outcomes);
            result.test_data = Some(sections);
        }

        let stored = self.store.upsert_result(&result).await?;
        let (occurrence, extension) = self.settle(occurrence, &stored, now).await?;
        Ok(detail(occurrence, Some(stored), extension, now))
    }

    /// Сохранить одну секцию по индексу. Индекс, равный числу секций, добавляет новую.
    pub async fn save_section(
        &self,
        occurrence_id: &str,
        index: usize,
        request: SaveSectionRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<OccurrenceDetail> {
        request.validate()?;
        let occurrence = self.get_occurrence(occurrence_id).await?;
        let mut result = match self.store.get_result(occurrence_id).await? {
            Some(result) => result,
            None => self.seed_result(&occurrence).await?,
        };

        let mut sections = result.test_data.take().unwrap_or_default();
        let mut section = request.section;
        apply_row_outcomes(&mut section);
        match index {
            i if i < sections.len() => sections[i] = section,
            i if i == sections.len() => sections.push(section),
            i => return Err(ApiError::section_out_of_range(i, sections.len())),
        }
        result.test_data = Some(sections);

        if request.completion_date.is_some() {
            result.completion_date = request.completion_date;
        }
        if request.notes.is_some() {
            result.notes = request.notes;
        }

        let stored = self.store.upsert_result(&result).await?;
        let (occurrence, extension) = self.settle(occurrence, &stored, now).await?;
        Ok(detail(occurrence, Some(stored), extension, now))
    }

    /// Ручное завершение без данных испытаний
    pub async fn complete_occurrence(
        &self,
        occurrence_id: &str,
        request: CompleteOccurrenceRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<OccurrenceDetail> {
        request.validate()?;
        let mut occurrence = self.get_occurrence(occurrence_id).await?;
        if occurrence.is_completed() {
            return Err(ApiError::occurrence_already_completed(occurrence_id));
        }

        let completion_date = request.completion_date.unwrap_or_else(|| now.date_naive());
        occurrence.complete(completion_date, request.notes.clone());
        self.store.update_occurrence(&occurrence).await?;

        let result = match self.store.get_result(occurrence_id).await? {
            Some(result) => result,
            None => {
                let mut manual = MaintenanceResult::new(occurrence_id, occurrence.template_id.clone());
                manual.completion_date = Some(completion_date);
                manual.notes = request.notes;
                self.store.upsert_result(&manual).await?
            }
        };

        let extension = self.controller.on_occurrence_completed(&occurrence).await?;
        Ok(detail(occurrence, Some(result), extension, now))
    }

    // ==================== TEMPLATES ====================

    pub async fn create_template(&self, request: CreateTemplateRequest) -> ApiResult<MaintenanceTemplate> {
        let template = request.into_template()?;
        self.store.insert_template(&template).await?;
        log::info!("Created maintenance template {} ({})", template.id, template.name);
        Ok(template)
    }

    pub async fn get_template(&self, id: &str) -> ApiResult<MaintenanceTemplate> {
        self.store
            .get_template(id)
            .await?
            .ok_or_else(|| ApiError::template_not_found(id))
    }

    pub async fn list_templates(&self) -> ApiResult<Vec<MaintenanceTemplate>> {
        self.store.list_templates().await
    }

    // ==================== HELPERS ====================

    async fn get_occurrence(&self, id: &str) -> ApiResult<MaintenanceOccurrence> {
        self.store
            .get_occurrence(id)
            .await?
            .ok_or_else(|| ApiError::occurrence_not_found(id))
    }

    async fn ensure_template(&self, template_id: Option<&str>) -> ApiResult<()> {
        if let Some(id) = template_id {
            if self.store.get_template(id).await?.is_none() {
                return Err(ApiError::template_not_found(id));
            }
        }
        Ok(())
    }

    /// Новый результат с заготовкой секций из шаблона вхождения
    async fn seed_result(&self, occurrence: &MaintenanceOccurrence) -> ApiResult<MaintenanceResult> {
        let mut result = MaintenanceResult::new(&occurrence.id, occurrence.template_id.clone());
        if let Some(template_id) = occurrence.template_id.as_deref() {
            match self.store.get_template(template_id).await? {
                Some(template) => result.test_data = Some(template.blank_test_data()),
                None => log::warn!(
                    "Template {} of occurrence {} not found, starting with empty test data",
                    template_id,
                    occurrence.id
                ),
            }
        }
        Ok(result)
    }

    /// Побочный эффект сохранения: полностью заполненный результат завершает
    /// вхождение (и продлевает горизонт ровно один раз), частичный переводит
    /// его в работу.
    async fn settle(
        &self,
        mut occurrence: MaintenanceOccurrence,
        result: &MaintenanceResult,
        now: DateTime<Utc>,
    ) -> ApiResult<(MaintenanceOccurrence, Option<RegenerationOutcome>)> {
        let summary = evaluate(&occurrence, Some(result), now);

        if result.has_test_data() && summary.is_completed() {
            let completion_date: NaiveDate = result.completion_date.unwrap_or_else(|| now.date_naive());
            if occurrence.complete(completion_date, result.notes.clone()) {
                self.store.update_occurrence(&occurrence).await?;
                log::info!(
                    "Occurrence {} completed on {} ({} sections)",
                    occurrence.id,
                    completion_date,
                    summary.total_sections
                );
                let extension = self.controller.on_occurrence_completed(&occurrence).await?;
                return Ok((occurrence, extension));
            }
            return Ok((occurrence, None));
        }

        if occurrence.advance_to(OccurrenceStatus::InProgress) {
            self.store.update_occurrence(&occurrence).await?;
        }
        Ok((occurrence, None))
    }
}

fn within(day: NaiveDate, query: &ScheduleQuery) -> bool {
    query.from.map_or(true, |from| day >= from) && query.to.map_or(true, |to| day <= to)
}

fn detail(
    occurrence: MaintenanceOccurrence,
    result: Option<MaintenanceResult>,
    extension: Option<RegenerationOutcome>,
    now: DateTime<Utc>,
) -> OccurrenceDetail {
    let evaluation = evaluate(&occurrence, result.as_ref(), now);
    OccurrenceDetail {
        occurrence,
        result,
        evaluation,
        extension,
    }
}
