// src/repositories/mod.rs
//! Порты хранилища. Движок расписания работает с данными только через эти
//! trait-ы; адаптеры: SQLite (`sqlite`) и in-memory (`memory`).

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::models::{
    MaintenanceConfiguration, MaintenanceOccurrence, MaintenanceResult, MaintenanceTemplate,
    OccurrenceFilter,
};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Итог атомарной замены незавершённого «хвоста» расписания
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    async fn get_configuration(&self, id: &str) -> ApiResult<Option<MaintenanceConfiguration>>;

    /// Конфигурации прибора в порядке создания
    async fn list_configurations(&self, instrument_id: &str) -> ApiResult<Vec<MaintenanceConfiguration>>;

    async fn insert_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()>;

    async fn update_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()>;

    /// Удаление с каскадом на вхождения и результаты. `false`, если не найдено.
    async fn delete_configuration(&self, id: &str) -> ApiResult<bool>;

    /// Удаление всего расписания прибора; возвращает число удалённых конфигураций
    async fn delete_instrument(&self, instrument_id: &str) -> ApiResult<u64>;
}

#[async_trait]
pub trait OccurrenceRepository: Send + Sync {
    async fn get_occurrence(&self, id: &str) -> ApiResult<Option<MaintenanceOccurrence>>;

    /// Выборка по фильтру, отсортированная по сроку
    async fn list_occurrences(&self, filter: &OccurrenceFilter) -> ApiResult<Vec<MaintenanceOccurrence>>;

    /// Вставка с пропуском уже занятых (конфигурация, день). Возвращает число вставленных.
    async fn insert_occurrences(&self, occurrences: &[MaintenanceOccurrence]) -> ApiResult<u64>;

    async fn update_occurrence(&self, occurrence: &MaintenanceOccurrence) -> ApiResult<()>;

    /// Удалить все незавершённые вхождения конфигурации (с их результатами)
    /// и вставить `replacement` одной операцией.
    async fn replace_pending(
        &self,
        configuration_id: &str,
        replacement: &[MaintenanceOccurrence],
    ) -> ApiResult<ReplaceOutcome>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn get_result(&self, occurrence_id: &str) -> ApiResult<Option<MaintenanceResult>>;

    async fn list_results(&self, occurrence_ids: &[String]) -> ApiResult<Vec<MaintenanceResult>>;

    /// Один результат на вхождение: повторное сохранение обновляет существующий
    async fn upsert_result(&self, result: &MaintenanceResult) -> ApiResult<MaintenanceResult>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get_template(&self, id: &str) -> ApiResult<Option<MaintenanceTemplate>>;

    async fn list_templates(&self) -> ApiResult<Vec<MaintenanceTemplate>>;

    async fn insert_template(&self, template: &MaintenanceTemplate) -> ApiResult<()>;
}

/// Всё хранилище целиком
pub trait MaintenanceStore:
    ConfigurationRepository + OccurrenceRepository + ResultRepository + TemplateRepository
{
}

impl<T> MaintenanceStore for T where
    T: ConfigurationRepository + OccurrenceRepository + ResultRepository + TemplateRepository
{
}
