// src/lib.rs - Instrument maintenance schedule service
use actix_web::web;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod maintenance_handlers;
pub mod models;
pub mod monitoring;
pub mod repositories;
pub mod schedule;

use crate::config::Config;
use crate::repositories::SqliteStore;
use crate::schedule::ScheduleService;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub service: ScheduleService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        let store = Arc::new(SqliteStore::new(db_pool.clone()));
        let service = ScheduleService::new(store, config.schedule.clone());
        Self {
            db_pool,
            config,
            service,
            started_at: Utc::now(),
        }
    }
}

/// Все маршруты сервиса; используется и в `main`, и в тестах обработчиков
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    use crate::maintenance_handlers::*;

    cfg
        // Health check (no auth)
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/ready", web::get().to(monitoring::readiness_check))
        )
        .service(
            web::scope("/api/v1")
                // Instruments
                .service(
                    web::scope("/instruments")
                        .route("/{id}/configurations", web::get().to(list_configurations))
                        .route("/{id}/configurations", web::post().to(create_configuration))
                        .route("/{id}/schedule", web::get().to(get_instrument_schedule))
                        .route("/{id}/schedule", web::delete().to(delete_instrument_schedule))
                )
                // Configurations
                .service(
                    web::scope("/configurations")
                        .route("/{id}", web::get().to(get_configuration))
                        .route("/{id}", web::put().to(update_configuration))
                        .route("/{id}", web::delete().to(delete_configuration))
                        .route("/{id}/regenerate", web::post().to(regenerate_configuration))
                )
                // Occurrences
                .service(
                    web::scope("/occurrences")
                        .route("/{id}", web::get().to(get_occurrence))
                        .route("/{id}/result", web::put().to(save_result))
                        .route("/{id}/result/sections/{index}", web::put().to(save_section))
                        .route("/{id}/complete", web::post().to(complete_occurrence))
                )
                // Templates
                .service(
                    web::scope("/templates")
                        .route("", web::get().to(list_templates))
                        .route("", web::post().to(create_template))
                        .route("/{id}", web::get().to(get_template))
                )
        );
}
