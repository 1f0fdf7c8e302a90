// src/models/template.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::result::{TestData, TestSection};
use crate::error::ApiResult;

/// Шаблон ожидаемой структуры испытаний. Движок его только читает.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTemplate {
    pub id: String,
    pub name: String,
    pub sections: Vec<TestSection>,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceTemplate {
    /// Заготовка данных испытаний без измерений
    pub fn blank_test_data(&self) -> TestData {
        self.sections.iter().map(TestSection::blank).collect()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,

    #[serde(default)]
    pub sections: Vec<TestSection>,
}

impl CreateTemplateRequest {
    pub fn into_template(self) -> ApiResult<MaintenanceTemplate> {
        self.validate()?;
        Ok(MaintenanceTemplate {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            sections: self.sections.iter().map(TestSection::blank).collect(),
            created_at: Utc::now(),
        })
    }
}
