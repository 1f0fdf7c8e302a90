// src/db.rs - Database migrations for the maintenance schedule

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Для in-memory базы SQLite молча оставляет режим "memory"
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // ==================== TEMPLATES ====================
    // sections хранится как JSON-массив секций
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maintenance_templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            sections TEXT NOT NULL DEFAULT '[]',
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== CONFIGURATIONS ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maintenance_configurations (
            id TEXT PRIMARY KEY,
            instrument_id TEXT NOT NULL CHECK(length(instrument_id) > 0),
            maintenance_type TEXT NOT NULL CHECK(length(maintenance_type) > 0 AND length(maintenance_type) <= 255),
            frequency TEXT NOT NULL,
            anchor_date TEXT NOT NULL,
            template_id TEXT,
            responsible_party TEXT NOT NULL DEFAULT 'self' CHECK(
                responsible_party IN ('self', 'vendor')
            ),
            vendor_name TEXT CHECK(vendor_name IS NULL OR length(vendor_name) <= 255),
            vendor_contact TEXT CHECK(vendor_contact IS NULL OR length(vendor_contact) <= 255),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== OCCURRENCES ====================
    // due_day дублирует календарный день due_date: на нём держится уникальность
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maintenance_occurrences (
            id TEXT PRIMARY KEY,
            configuration_id TEXT NOT NULL,
            instrument_id TEXT NOT NULL,
            maintenance_type TEXT NOT NULL,
            due_date DATETIME NOT NULL,
            due_day TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled' CHECK(
                status IN ('scheduled', 'in_progress', 'completed')
            ),
            completion_date TEXT,
            completion_notes TEXT CHECK(completion_notes IS NULL OR length(completion_notes) <= 2000),
            is_last_of_window INTEGER NOT NULL DEFAULT 0 CHECK(is_last_of_window IN (0, 1)),
            template_id TEXT,
            responsible_party TEXT NOT NULL DEFAULT 'self' CHECK(
                responsible_party IN ('self', 'vendor')
            ),
            vendor_name TEXT,
            vendor_contact TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (configuration_id) REFERENCES maintenance_configurations (id) ON DELETE CASCADE,
            UNIQUE(configuration_id, due_day)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== RESULTS ====================
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maintenance_results (
            id TEXT PRIMARY KEY,
            occurrence_id TEXT NOT NULL UNIQUE,
            completion_date TEXT,
            category TEXT NOT NULL DEFAULT 'other' CHECK(
                category IN ('calibration', 'service', 'spare_quotation', 'other')
            ),
            notes TEXT CHECK(notes IS NULL OR length(notes) <= 2000),
            document_ref TEXT CHECK(document_ref IS NULL OR length(document_ref) <= 500),
            test_data TEXT,
            template_id TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (occurrence_id) REFERENCES maintenance_occurrences (id) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== INDEXES ====================
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_configurations_instrument ON maintenance_configurations(instrument_id)",
        "CREATE INDEX IF NOT EXISTS idx_occurrences_instrument_type_day ON maintenance_occurrences(instrument_id, maintenance_type, due_day)",
        "CREATE INDEX IF NOT EXISTS idx_occurrences_status ON maintenance_occurrences(status)",
        "CREATE INDEX IF NOT EXISTS idx_occurrences_due_date ON maintenance_occurrences(due_date)",
    ];
    for statement in indexes {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            log::warn!("Failed to create index ({}): {}", statement, e);
        }
    }

    log::info!("Maintenance schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn columns(pool: &SqlitePool, table: &str) -> Vec<String> {
        sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_repeatable() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert!(columns(&pool, "maintenance_occurrences").await.contains(&"due_day".to_string()));
        assert!(columns(&pool, "maintenance_results").await.contains(&"test_data".to_string()));

        let (indexes,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
        )
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(indexes, 4);
    }

    #[tokio::test]
    async fn test_duplicate_day_is_rejected_by_schema() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO maintenance_configurations (id, instrument_id, maintenance_type, frequency, anchor_date, responsible_party, created_at, updated_at) \
             VALUES ('c', 'i', 'Calibration', 'Monthly', '2024-01-15', 'self', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
            .execute(&pool)
            .await
            .unwrap();

        let insert = "INSERT INTO maintenance_occurrences (id, configuration_id, instrument_id, maintenance_type, due_date, due_day, status, is_last_of_window, responsible_party, created_at, updated_at) \
             VALUES (?, 'c', 'i', 'Calibration', '2024-01-15T00:00:00Z', '2024-01-15', 'scheduled', 0, 'self', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')";
        sqlx::query(insert).bind("o1").execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).bind("o2").execute(&pool).await.is_err());
    }
}
