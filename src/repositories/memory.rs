// src/repositories/memory.rs
//! In-memory хранилище для тестов и встраивания без базы данных.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{
    ConfigurationRepository, OccurrenceRepository, ReplaceOutcome, ResultRepository,
    TemplateRepository,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    MaintenanceConfiguration, MaintenanceOccurrence, MaintenanceResult, MaintenanceTemplate,
    OccurrenceFilter,
};

#[derive(Default)]
struct Tables {
    configurations: Vec<MaintenanceConfiguration>,
    occurrences: Vec<MaintenanceOccurrence>,
    /// По id вхождения
    results: HashMap<String, MaintenanceResult>,
    templates: Vec<MaintenanceTemplate>,
}

impl Tables {
    fn remove_occurrences_where<F>(&mut self, predicate: F) -> u64
    where
        F: Fn(&MaintenanceOccurrence) -> bool,
    {
        let mut removed = 0;
        let results = &mut self.results;
        self.occurrences.retain(|occ| {
            if predicate(occ) {
                results.remove(&occ.id);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    fn insert_unique(&mut self, occurrences: &[MaintenanceOccurrence]) -> u64 {
        let mut inserted = 0;
        for occ in occurrences {
            let taken = self.occurrences.iter().any(|existing| {
                existing.id == occ.id
                    || (existing.configuration_id == occ.configuration_id
                        && existing.due_day() == occ.due_day())
            });
            if !taken {
                self.occurrences.push(occ.clone());
                inserted += 1;
            }
        }
        inserted
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Имитация недоступного хранилища: все записи завершаются ошибкой
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> ApiResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::StoreError("in-memory store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryStore {
    async fn get_configuration(&self, id: &str) -> ApiResult<Option<MaintenanceConfiguration>> {
        let tables = self.tables.read().await;
        Ok(tables.configurations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_configurations(&self, instrument_id: &str) -> ApiResult<Vec<MaintenanceConfiguration>> {
        let tables = self.tables.read().await;
        Ok(tables
            .configurations
            .iter()
            .filter(|c| c.instrument_id == instrument_id)
            .cloned()
            .collect())
    }

    async fn insert_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.configurations.iter().any(|c| c.id == config.id) {
            return Err(ApiError::Conflict(format!("Configuration '{}' already exists", config.id)));
        }
        tables.configurations.push(config.clone());
        Ok(())
    }

    async fn update_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        match tables.configurations.iter_mut().find(|c| c.id == config.id) {
            Some(slot) => {
                *slot = config.clone();
                Ok(())
            }
            None => Err(ApiError::configuration_not_found(&config.id)),
        }
    }

    async fn delete_configuration(&self, id: &str) -> ApiResult<bool> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let before = tables.configurations.len();
        tables.configurations.retain(|c| c.id != id);
        if tables.configurations.len() == before {
            return Ok(false);
        }
        tables.remove_occurrences_where(|occ| occ.configuration_id == id);
        Ok(true)
    }

    async fn delete_instrument(&self, instrument_id: &str) -> ApiResult<u64> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let before = tables.configurations.len();
        tables.configurations.retain(|c| c.instrument_id != instrument_id);
        let removed = (before - tables.configurations.len()) as u64;
        tables.remove_occurrences_where(|occ| occ.instrument_id == instrument_id);
        Ok(removed)
    }
}

#[async_trait]
impl OccurrenceRepository for InMemoryStore {
    async fn get_occurrence(&self, id: &str) -> ApiResult<Option<MaintenanceOccurrence>> {
        let tables = self.tables.read().await;
        Ok(tables.occurrences.iter().find(|o| o.id == id).cloned())
    }

    async fn list_occurrences(&self, filter: &OccurrenceFilter) -> ApiResult<Vec<MaintenanceOccurrence>> {
        let tables = self.tables.read().await;
        let mut found: Vec<MaintenanceOccurrence> = tables
            .occurrences
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(found)
    }

    async fn insert_occurrences(&self, occurrences: &[MaintenanceOccurrence]) -> ApiResult<u64> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        Ok(tables.insert_unique(occurrences))
    }

    async fn update_occurrence(&self, occurrence: &MaintenanceOccurrence) -> ApiResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        match tables.occurrences.iter_mut().find(|o| o.id == occurrence.id) {
            Some(slot) => {
                *slot = occurrence.clone();
                Ok(())
            }
            None => Err(ApiError::occurrence_not_found(&occurrence.id)),
        }
    }

    async fn replace_pending(
        &self,
        configuration_id: &str,
        replacement: &[MaintenanceOccurrence],
    ) -> ApiResult<ReplaceOutcome> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let deleted = tables.remove_occurrences_where(|occ| {
            occ.configuration_id == configuration_id && !occ.is_completed()
        });
        let inserted = tables.insert_unique(replacement);
        Ok(ReplaceOutcome { deleted, inserted })
    }
}

#[async_trait]
impl ResultRepository for InMemoryStore {
    async fn get_result(&self, occurrence_id: &str) -> ApiResult<Option<MaintenanceResult>> {
        let tables = self.tables.read().await;
        Ok(tables.results.get(occurrence_id).cloned())
    }

    async fn list_results(&self, occurrence_ids: &[String]) -> ApiResult<Vec<MaintenanceResult>> {
        let tables = self.tables.read().await;
        Ok(occurrence_ids
            .iter()
            .filter_map(|id| tables.results.get(id).cloned())
            .collect())
    }

    async fn upsert_result(&self, result: &MaintenanceResult) -> ApiResult<MaintenanceResult> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if !tables.occurrences.iter().any(|o| o.id == result.occurrence_id) {
            return Err(ApiError::occurrence_not_found(&result.occurrence_id));
        }
        let stored = match tables.results.get(&result.occurrence_id) {
            Some(existing) => MaintenanceResult {
                id: existing.id.clone(),
                created_at: existing.created_at,
                updated_at: Utc::now(),
                ..result.clone()
            },
            None => result.clone(),
        };
        tables.results.insert(stored.occurrence_id.clone(), stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TemplateRepository for InMemoryStore {
    async fn get_template(&self, id: &str) -> ApiResult<Option<MaintenanceTemplate>> {
        let tables = self.tables.read().await;
        Ok(tables.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn list_templates(&self) -> ApiResult<Vec<MaintenanceTemplate>> {
        let tables = self.tables.read().await;
        Ok(tables.templates.clone())
    }

    async fn insert_template(&self, template: &MaintenanceTemplate) -> ApiResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        tables.templates.push(template.clone());
        Ok(())
    }
}
