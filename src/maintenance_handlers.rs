//! Обработчики HTTP для расписания обслуживания
//!
//! Включает:
//! - Конфигурации обслуживания прибора (CRUD, явное пересоздание)
//! - Сведённое расписание прибора с вычисленными статусами
//! - Результаты: шапка, посекционное сохранение, ручное завершение
//! - Шаблоны данных испытаний

use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::sync::Arc;

use crate::AppState;
use crate::error::ApiResult;
use crate::handlers::ApiResponse;
use crate::models::{
    CompleteOccurrenceRequest, CreateConfigurationRequest, CreateTemplateRequest,
    SaveResultRequest, SaveSectionRequest, ScheduleQuery, UpdateConfigurationRequest,
};

// ==================== CONFIGURATIONS ====================

pub async fn list_configurations(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let instrument_id = path.into_inner();
    let configurations = app_state.service.list_configurations(&instrument_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(configurations)))
}

pub async fn create_configuration(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<CreateConfigurationRequest>,
) -> ApiResult<HttpResponse> {
    let instrument_id = path.into_inner();
    let change = app_state
        .service
        .create_configuration(&instrument_id, body.into_inner())
        .await?;

    let created = change.regeneration.as_ref().map_or(0, |r| r.created);
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        change,
        format!("Configuration created, {} occurrences scheduled", created),
    )))
}

pub async fn get_configuration(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let configuration = app_state.service.get_configuration(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(configuration)))
}

pub async fn update_configuration(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateConfigurationRequest>,
) -> ApiResult<HttpResponse> {
    let change = app_state
        .service
        .update_configuration(&path.into_inner(), body.into_inner())
        .await?;

    let message = match &change.regeneration {
        Some(r) => format!("Schedule regenerated: {} removed, {} created", r.deleted, r.created),
        None => "Configuration updated, schedule unchanged".to_string(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(change, message)))
}

pub async fn delete_configuration(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.service.delete_configuration(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        id,
        "Configuration deleted".to_string(),
    )))
}

pub async fn regenerate_configuration(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let outcome = app_state.service.regenerate(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

// ==================== SCHEDULE ====================

pub async fn get_instrument_schedule(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<ScheduleQuery>,
) -> ApiResult<HttpResponse> {
    let schedule = app_state
        .service
        .schedule_for_instrument(&path.into_inner(), &query, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(schedule)))
}

pub async fn delete_instrument_schedule(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let deleted = app_state
        .service
        .delete_instrument_schedule(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(deleted)))
}

// ==================== OCCURRENCES ====================

pub async fn get_occurrence(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let detail = app_state
        .service
        .occurrence_detail(&path.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(detail)))
}

pub async fn save_result(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<SaveResultRequest>,
) -> ApiResult<HttpResponse> {
    let detail = app_state
        .service
        .save_result(&path.into_inner(), body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(detail)))
}

pub async fn save_section(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, usize)>,
    body: web::Json<SaveSectionRequest>,
) -> ApiResult<HttpResponse> {
    let (occurrence_id, index) = path.into_inner();
    let detail = app_state
        .service
        .save_section(&occurrence_id, index, body.into_inner(), Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(detail)))
}

pub async fn complete_occurrence(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: Option<web::Json<CompleteOccurrenceRequest>>,
) -> ApiResult<HttpResponse> {
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    let detail = app_state
        .service
        .complete_occurrence(&path.into_inner(), request, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        detail,
        "Occurrence completed".to_string(),
    )))
}

// ==================== TEMPLATES ====================

pub async fn list_templates(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let templates = app_state.service.list_templates().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(templates)))
}

pub async fn create_template(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateTemplateRequest>,
) -> ApiResult<HttpResponse> {
    let template = app_state.service.create_template(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(template)))
}

pub async fn get_template(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let template = app_state.service.get_template(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(template)))
}
