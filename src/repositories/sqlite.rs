// src/repositories/sqlite.rs
//! SQLite-адаптер хранилища на sqlx.
//!
//! Перечисления хранятся строками, данные испытаний и секции шаблонов как JSON.
//! Уникальность (конфигурация, день) и «один результат на вхождение»
//! держатся ограничениями схемы, см. `db::run_migrations`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;

use super::{
    ConfigurationRepository, OccurrenceRepository, ReplaceOutcome, ResultRepository,
    TemplateRepository,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    MaintenanceConfiguration, MaintenanceOccurrence, MaintenanceResult, MaintenanceTemplate,
    OccurrenceFilter, OccurrenceStatus, ResponsibleParty, ResultCategory, TestData, TestSection,
};
use crate::schedule::recurrence::Frequency;

/// Лимит параметров в одном IN (...)
const IN_CHUNK: usize = 500;

const CONFIGURATION_COLUMNS: &str = "id, instrument_id, maintenance_type, frequency, anchor_date, template_id, \
     responsible_party, vendor_name, vendor_contact, created_at, updated_at";

const OCCURRENCE_COLUMNS: &str = "id, configuration_id, instrument_id, maintenance_type, due_date, status, \
     completion_date, completion_notes, is_last_of_window, template_id, responsible_party, \
     vendor_name, vendor_contact, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, occurrence_id, completion_date, category, notes, document_ref, test_data, \
     template_id, created_at, updated_at";

// ==================== ROWS ====================

fn parse_column<T: FromStr>(column: &str, value: &str) -> ApiResult<T> {
    T::from_str(value).map_err(|_| {
        ApiError::StoreError(format!("Unexpected value '{}' in column {}", value, column))
    })
}

#[derive(Debug, sqlx::FromRow)]
struct ConfigurationRow {
    id: String,
    instrument_id: String,
    maintenance_type: String,
    frequency: String,
    anchor_date: NaiveDate,
    template_id: Option<String>,
    responsible_party: String,
    vendor_name: Option<String>,
    vendor_contact: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConfigurationRow> for MaintenanceConfiguration {
    type Error = ApiError;

    fn try_from(row: ConfigurationRow) -> ApiResult<Self> {
        Ok(MaintenanceConfiguration {
            responsible_party: parse_column::<ResponsibleParty>("responsible_party", &row.responsible_party)?,
            // Старые строки частоты не должны ломать чтение
            frequency: Frequency::parse_lenient(&row.frequency),
            id: row.id,
            instrument_id: row.instrument_id,
            maintenance_type: row.maintenance_type,
            anchor_date: row.anchor_date,
            template_id: row.template_id,
            vendor_name: row.vendor_name,
            vendor_contact: row.vendor_contact,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OccurrenceRow {
    id: String,
    configuration_id: String,
    instrument_id: String,
    maintenance_type: String,
    due_date: DateTime<Utc>,
    status: String,
    completion_date: Option<NaiveDate>,
    completion_notes: Option<String>,
    is_last_of_window: bool,
    template_id: Option<String>,
    responsible_party: String,
    vendor_name: Option<String>,
    vendor_contact: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OccurrenceRow> for MaintenanceOccurrence {
    type Error = ApiError;

    fn try_from(row: OccurrenceRow) -> ApiResult<Self> {
        Ok(MaintenanceOccurrence {
            status: parse_column::<OccurrenceStatus>("status", &row.status)?,
            responsible_party: parse_column::<ResponsibleParty>("responsible_party", &row.responsible_party)?,
            id: row.id,
            configuration_id: row.configuration_id,
            instrument_id: row.instrument_id,
            maintenance_type: row.maintenance_type,
            due_date: row.due_date,
            completion_date: row.completion_date,
            completion_notes: row.completion_notes,
            is_last_of_window: row.is_last_of_window,
            template_id: row.template_id,
            vendor_name: row.vendor_name,
            vendor_contact: row.vendor_contact,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    id: String,
    occurrence_id: String,
    completion_date: Option<NaiveDate>,
    category: String,
    notes: Option<String>,
    document_ref: Option<String>,
    test_data: Option<String>,
    template_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for MaintenanceResult {
    type Error = ApiError;

    fn try_from(row: ResultRow) -> ApiResult<Self> {
        let test_data = match row.test_data.as_deref() {
            Some(json) => Some(serde_json::from_str::<TestData>(json)?),
            None => None,
        };
        Ok(MaintenanceResult {
            category: parse_column::<ResultCategory>("category", &row.category)?,
            test_data,
            id: row.id,
            occurrence_id: row.occurrence_id,
            completion_date: row.completion_date,
            notes: row.notes,
            document_ref: row.document_ref,
            template_id: row.template_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: String,
    name: String,
    sections: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for MaintenanceTemplate {
    type Error = ApiError;

    fn try_from(row: TemplateRow) -> ApiResult<Self> {
        Ok(MaintenanceTemplate {
            sections: serde_json::from_str::<Vec<TestSection>>(&row.sections)?,
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> ApiResult<Vec<T>>
where
    T: TryFrom<R, Error = ApiError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ==================== STORE ====================

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Вставка с пропуском занятого (configuration_id, due_day)
async fn insert_occurrence(
    conn: &mut SqliteConnection,
    occ: &MaintenanceOccurrence,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO maintenance_occurrences (
            id, configuration_id, instrument_id, maintenance_type, due_date, due_day, status,
            completion_date, completion_notes, is_last_of_window, template_id, responsible_party,
            vendor_name, vendor_contact, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
        .bind(&occ.id)
        .bind(&occ.configuration_id)
        .bind(&occ.instrument_id)
        .bind(&occ.maintenance_type)
        .bind(occ.due_date)
        .bind(occ.due_day())
        .bind(occ.status.as_ref())
        .bind(occ.completion_date)
        .bind(&occ.completion_notes)
        .bind(occ.is_last_of_window)
        .bind(&occ.template_id)
        .bind(occ.responsible_party.as_ref())
        .bind(&occ.vendor_name)
        .bind(&occ.vendor_contact)
        .bind(occ.created_at)
        .bind(occ.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl ConfigurationRepository for SqliteStore {
    async fn get_configuration(&self, id: &str) -> ApiResult<Option<MaintenanceConfiguration>> {
        let sql = format!("SELECT {} FROM maintenance_configurations WHERE id = ?", CONFIGURATION_COLUMNS);
        let row: Option<ConfigurationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MaintenanceConfiguration::try_from).transpose()
    }

    async fn list_configurations(&self, instrument_id: &str) -> ApiResult<Vec<MaintenanceConfiguration>> {
        let sql = format!(
            "SELECT {} FROM maintenance_configurations WHERE instrument_id = ? ORDER BY created_at, id",
            CONFIGURATION_COLUMNS
        );
        let rows: Vec<ConfigurationRow> = sqlx::query_as(&sql)
            .bind(instrument_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO maintenance_configurations (
                id, instrument_id, maintenance_type, frequency, anchor_date, template_id,
                responsible_party, vendor_name, vendor_contact, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(&config.id)
            .bind(&config.instrument_id)
            .bind(&config.maintenance_type)
            .bind(config.frequency.to_string())
            .bind(config.anchor_date)
            .bind(&config.template_id)
            .bind(config.responsible_party.as_ref())
            .bind(&config.vendor_name)
            .bind(&config.vendor_contact)
            .bind(config.created_at)
            .bind(config.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_configuration(&self, config: &MaintenanceConfiguration) -> ApiResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE maintenance_configurations SET
                maintenance_type = ?, frequency = ?, anchor_date = ?, template_id = ?,
                responsible_party = ?, vendor_name = ?, vendor_contact = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
            .bind(&config.maintenance_type)
            .bind(config.frequency.to_string())
            .bind(config.anchor_date)
            .bind(&config.template_id)
            .bind(config.responsible_party.as_ref())
            .bind(&config.vendor_name)
            .bind(&config.vendor_contact)
            .bind(config.updated_at)
            .bind(&config.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::configuration_not_found(&config.id));
        }
        Ok(())
    }

    async fn delete_configuration(&self, id: &str) -> ApiResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM maintenance_results WHERE occurrence_id IN \
             (SELECT id FROM maintenance_occurrences WHERE configuration_id = ?)",
        )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM maintenance_occurrences WHERE configuration_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM maintenance_configurations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_instrument(&self, instrument_id: &str) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM maintenance_results WHERE occurrence_id IN \
             (SELECT id FROM maintenance_occurrences WHERE instrument_id = ?)",
        )
            .bind(instrument_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM maintenance_occurrences WHERE instrument_id = ?")
            .bind(instrument_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM maintenance_configurations WHERE instrument_id = ?")
            .bind(instrument_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OccurrenceRepository for SqliteStore {
    async fn get_occurrence(&self, id: &str) -> ApiResult<Option<MaintenanceOccurrence>> {
        let sql = format!("SELECT {} FROM maintenance_occurrences WHERE id = ?", OCCURRENCE_COLUMNS);
        let row: Option<OccurrenceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MaintenanceOccurrence::try_from).transpose()
    }

    async fn list_occurrences(&self, filter: &OccurrenceFilter) -> ApiResult<Vec<MaintenanceOccurrence>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM maintenance_occurrences WHERE 1=1",
            OCCURRENCE_COLUMNS
        ));

        if let Some(instrument_id) = &filter.instrument_id {
            builder.push(" AND instrument_id = ").push_bind(instrument_id.clone());
        }
        if let Some(maintenance_type) = &filter.maintenance_type {
            builder.push(" AND maintenance_type = ").push_bind(maintenance_type.clone());
        }
        if let Some(configuration_id) = &filter.configuration_id {
            builder.push(" AND configuration_id = ").push_bind(configuration_id.clone());
        }
        if !filter.statuses.is_empty() {
            builder.push(" AND status IN (");
            let mut separated = builder.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(status.as_ref().to_string());
            }
            separated.push_unseparated(")");
        }
        if let Some(from) = filter.due_from {
            builder.push(" AND due_day >= ").push_bind(from);
        }
        if let Some(to) = filter.due_to {
            builder.push(" AND due_day <= ").push_bind(to);
        }
        builder.push(" ORDER BY due_date, id");

        let rows: Vec<OccurrenceRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_occurrences(&self, occurrences: &[MaintenanceOccurrence]) -> ApiResult<u64> {
        if occurrences.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for occ in occurrences {
            inserted += insert_occurrence(&mut tx, occ).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_occurrence(&self, occ: &MaintenanceOccurrence) -> ApiResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE maintenance_occurrences SET
                status = ?, completion_date = ?, completion_notes = ?, is_last_of_window = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
            .bind(occ.status.as_ref())
            .bind(occ.completion_date)
            .bind(&occ.completion_notes)
            .bind(occ.is_last_of_window)
            .bind(occ.updated_at)
            .bind(&occ.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::occurrence_not_found(&occ.id));
        }
        Ok(())
    }

    async fn replace_pending(
        &self,
        configuration_id: &str,
        replacement: &[MaintenanceOccurrence],
    ) -> ApiResult<ReplaceOutcome> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM maintenance_results WHERE occurrence_id IN \
             (SELECT id FROM maintenance_occurrences WHERE configuration_id = ? AND status != 'completed')",
        )
            .bind(configuration_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query(
            "DELETE FROM maintenance_occurrences WHERE configuration_id = ? AND status != 'completed'",
        )
            .bind(configuration_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        for occ in replacement {
            inserted += insert_occurrence(&mut tx, occ).await?;
        }

        tx.commit().await?;
        Ok(ReplaceOutcome { deleted, inserted })
    }
}

#[async_trait]
impl ResultRepository for SqliteStore {
    async fn get_result(&self, occurrence_id: &str) -> ApiResult<Option<MaintenanceResult>> {
        let sql = format!("SELECT {} FROM maintenance_results WHERE occurrence_id = ?", RESULT_COLUMNS);
        let row: Option<ResultRow> = sqlx::query_as(&sql)
            .bind(occurrence_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MaintenanceResult::try_from).transpose()
    }

    async fn list_results(&self, occurrence_ids: &[String]) -> ApiResult<Vec<MaintenanceResult>> {
        let mut results = Vec::new();
        for chunk in occurrence_ids.chunks(IN_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM maintenance_results WHERE occurrence_id IN (",
                RESULT_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows: Vec<ResultRow> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await?;
            results.extend(convert_all::<ResultRow, MaintenanceResult>(rows)?);
        }
        Ok(results)
    }

    async fn upsert_result(&self, result: &MaintenanceResult) -> ApiResult<MaintenanceResult> {
        if self.get_occurrence(&result.occurrence_id).await?.is_none() {
            return Err(ApiError::occurrence_not_found(&result.occurrence_id));
        }

        let test_data = match &result.test_data {
            Some(data) => Some(serde_json::to_string(data)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO maintenance_results (
                id, occurrence_id, completion_date, category, notes, document_ref, test_data,
                template_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(occurrence_id) DO UPDATE SET
                completion_date = excluded.completion_date,
                category = excluded.category,
                notes = excluded.notes,
                document_ref = excluded.document_ref,
                test_data = excluded.test_data,
                template_id = excluded.template_id,
                updated_at = excluded.updated_at
            "#,
        )
            .bind(&result.id)
            .bind(&result.occurrence_id)
            .bind(result.completion_date)
            .bind(result.category.as_ref())
            .bind(&result.notes)
            .bind(&result.document_ref)
            .bind(test_data)
            .bind(&result.template_id)
            .bind(result.created_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.get_result(&result.occurrence_id)
            .await?
            .ok_or_else(|| ApiError::StoreError("Result vanished after upsert".to_string()))
    }
}

#[async_trait]
impl TemplateRepository for SqliteStore {
    async fn get_template(&self, id: &str) -> ApiResult<Option<MaintenanceTemplate>> {
        let row: Option<TemplateRow> = sqlx::query_as(
            "SELECT id, name, sections, created_at FROM maintenance_templates WHERE id = ?",
        )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MaintenanceTemplate::try_from).transpose()
    }

    async fn list_templates(&self) -> ApiResult<Vec<MaintenanceTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            "SELECT id, name, sections, created_at FROM maintenance_templates ORDER BY name",
        )
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_template(&self, template: &MaintenanceTemplate) -> ApiResult<()> {
        sqlx::query("INSERT INTO maintenance_templates (id, name, sections, created_at) VALUES (?, ?, ?, ?)")
            .bind(&template.id)
            .bind(&template.name)
            .bind(serde_json::to_string(&template.sections)?)
            .bind(template.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use crate::models::{SectionType, TestRow};
    use crate::schedule::generator::generate;
    use crate::schedule::generator::tests::{config, d};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn test_configuration_round_trip() {
        let store = store().await;
        let cfg = config(Frequency::ThreeMonths, d(2024, 2, 29));
        store.insert_configuration(&cfg).await.unwrap();

        let loaded = store.get_configuration(&cfg.id).await.unwrap().unwrap();
        assert_eq!(loaded.frequency, Frequency::ThreeMonths);
        assert_eq!(loaded.anchor_date, d(2024, 2, 29));
        assert_eq!(loaded.responsible_party, ResponsibleParty::Vendor);
        assert_eq!(store.list_configurations("inst-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_frequency_reads_as_monthly() {
        let store = store().await;
        let cfg = config(Frequency::Weekly, d(2024, 1, 1));
        store.insert_configuration(&cfg).await.unwrap();
        sqlx::query("UPDATE maintenance_configurations SET frequency = 'Fortnightly' WHERE id = ?")
            .bind(&cfg.id)
            .execute(store.pool())
            .await
            .unwrap();

        let loaded = store.get_configuration(&cfg.id).await.unwrap().unwrap();
        assert_eq!(loaded.frequency, Frequency::Monthly);
    }

    #[tokio::test]
    async fn test_unique_day_per_configuration() {
        let store = store().await;
        let cfg = config(Frequency::Monthly, d(2024, 1, 15));
        store.insert_configuration(&cfg).await.unwrap();

        let plan = generate(&cfg, &[]);
        assert_eq!(store.insert_occurrences(&plan.occurrences).await.unwrap(), 12);
        assert_eq!(store.insert_occurrences(&generate(&cfg, &[]).occurrences).await.unwrap(), 0);

        let all = store
            .list_occurrences(&OccurrenceFilter::for_configuration(&cfg.id))
            .await
            .unwrap();
        assert_eq!(all.len(), 12);
        assert!(all.windows(2).all(|w| w[0].due_date < w[1].due_date));
        assert!(all[11].is_last_of_window);
    }

    #[tokio::test]
    async fn test_filter_by_status_and_range() {
        let store = store().await;
        let cfg = config(Frequency::Monthly, d(2024, 1, 15));
        store.insert_configuration(&cfg).await.unwrap();
        let mut occurrences = generate(&cfg, &[]).occurrences;
        occurrences[1].complete(d(2024, 2, 16), None);
        store.insert_occurrences(&occurrences).await.unwrap();

        let mut filter = OccurrenceFilter::for_instrument("inst-1");
        filter.statuses = vec![OccurrenceStatus::Completed];
        let done = store.list_occurrences(&filter).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].completion_date, Some(d(2024, 2, 16)));

        let mut ranged = OccurrenceFilter::for_instrument("inst-1");
        ranged.due_from = Some(d(2024, 3, 1));
        ranged.due_to = Some(d(2024, 5, 15));
        assert_eq!(store.list_occurrences(&ranged).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_replace_pending_is_scoped() {
        let store = store().await;
        let cfg = config(Frequency::Monthly, d(2024, 1, 15));
        store.insert_configuration(&cfg).await.unwrap();
        let mut occurrences = generate(&cfg, &[]).occurrences;
        occurrences[0].complete(d(2024, 1, 15), None);
        store.insert_occurrences(&occurrences).await.unwrap();
        store
            .upsert_result(&MaintenanceResult::new(&occurrences[3].id, None))
            .await
            .unwrap();

        let mut weekly = cfg.clone();
        weekly.frequency = Frequency::Weekly;
        let completed = vec![occurrences[0].clone()];
        let plan = generate(&weekly, &completed);

        let outcome = store.replace_pending(&cfg.id, &plan.occurrences).await.unwrap();
        assert_eq!(outcome.deleted, 11);
        assert_eq!(outcome.inserted, plan.len() as u64);
        assert!(store.get_result(&occurrences[3].id).await.unwrap().is_none());
        assert!(store.get_occurrence(&occurrences[0].id).await.unwrap().unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_result_upsert_and_json() {
        let store = store().await;
        let cfg = config(Frequency::OneYear, d(2024, 1, 1));
        store.insert_configuration(&cfg).await.unwrap();
        let occurrences = generate(&cfg, &[]).occurrences;
        store.insert_occurrences(&occurrences).await.unwrap();

        let mut result = MaintenanceResult::new(&occurrences[0].id, Some("tpl-1".to_string()));
        result.category = ResultCategory::Calibration;
        result.test_data = Some(vec![TestSection {
            name: "Weights".to_string(),
            section_type: SectionType::Tolerance,
            tolerance: Some(0.1),
            unit: Some("g".to_string()),
            rows: vec![TestRow {
                label: "10 g".to_string(),
                measured: Some(10.2),
                reference: Some(10.0),
                ..Default::default()
            }],
        }]);
        let first = store.upsert_result(&result).await.unwrap();

        let mut again = MaintenanceResult::new(&occurrences[0].id, None);
        again.notes = Some("recheck".to_string());
        let second = store.upsert_result(&again).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.notes.as_deref(), Some("recheck"));
        assert_eq!(first.test_data.unwrap()[0].rows[0].measured, Some(10.2));
        assert_eq!(store.list_results(&[occurrences[0].id.clone()]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_result_requires_occurrence() {
        let store = store().await;
        let err = store
            .upsert_result(&MaintenanceResult::new("missing", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = store().await;
        let cfg = config(Frequency::SixMonths, d(2024, 1, 1));
        store.insert_configuration(&cfg).await.unwrap();
        let occurrences = generate(&cfg, &[]).occurrences;
        store.insert_occurrences(&occurrences).await.unwrap();
        store
            .upsert_result(&MaintenanceResult::new(&occurrences[0].id, None))
            .await
            .unwrap();

        assert!(store.delete_configuration(&cfg.id).await.unwrap());
        assert!(!store.delete_configuration(&cfg.id).await.unwrap());
        assert!(store.get_result(&occurrences[0].id).await.unwrap().is_none());
        assert!(store
            .list_occurrences(&OccurrenceFilter::for_instrument("inst-1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_templates() {
        let store = store().await;
        let template = MaintenanceTemplate {
            id: "tpl-1".to_string(),
            name: "Balance calibration".to_string(),
            sections: vec![TestSection {
                name: "Visual".to_string(),
                section_type: SectionType::Checklist,
                tolerance: None,
                unit: None,
                rows: vec![TestRow::labeled("Level bubble centred")],
            }],
            created_at: Utc::now(),
        };
        store.insert_template(&template).await.unwrap();

        let loaded = store.get_template("tpl-1").await.unwrap().unwrap();
        assert_eq!(loaded.sections, template.sections);
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
    }
}
