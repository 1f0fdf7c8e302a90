// src/models/result.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

// === ENUMS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResultCategory {
    Calibration,
    Service,
    SpareQuotation,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    /// Отклонение от эталона в пределах допуска
    Tolerance,
    /// Значение в границах min/max
    Range,
    /// Отметка «выполнено»
    Checklist,
    /// Только измеренное значение
    Simple,
}

// === TEST DATA ===

/// Строка испытания. Поля `error`, `error_display` и `passed` вычисляются,
/// кроме чек-листа, где `passed` задаёт пользователь.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestRow {
    pub label: String,
    #[serde(default)]
    pub measured: Option<f64>,
    #[serde(default)]
    pub reference: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub error: Option<f64>,
    /// `error` для показа: `+0.200`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_display: Option<String>,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl TestRow {
    pub fn labeled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    /// Копия без измерений: для заготовки из шаблона
    pub fn blank(&self) -> Self {
        Self {
            label: self.label.clone(),
            reference: self.reference,
            min: self.min,
            max: self.max,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSection {
    pub name: String,
    pub section_type: SectionType,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rows: Vec<TestRow>,
}

impl TestSection {
    pub fn blank(&self) -> Self {
        Self {
            name: self.name.clone(),
            section_type: self.section_type,
            tolerance: self.tolerance,
            unit: self.unit.clone(),
            rows: self.rows.iter().map(TestRow::blank).collect(),
        }
    }
}

/// Упорядоченный список секций испытаний
pub type TestData = Vec<TestSection>;

// === RESULT ===

/// Запись о выполненной работе по одному вхождению (не более одной на вхождение)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceResult {
    pub id: String,
    pub occurrence_id: String,
    pub completion_date: Option<NaiveDate>,
    pub category: ResultCategory,
    pub notes: Option<String>,
    pub document_ref: Option<String>,
    pub test_data: Option<TestData>,
    pub template_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceResult {
    pub fn new(occurrence_id: &str, template_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            occurrence_id: occurrence_id.to_string(),
            completion_date: None,
            category: ResultCategory::default(),
            notes: None,
            document_ref: None,
            test_data: None,
            template_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Есть ли структурированные данные (хотя бы одна секция)
    pub fn has_test_data(&self) -> bool {
        self.test_data.as_ref().map_or(false, |sections| !sections.is_empty())
    }
}

// === REQUESTS ===

/// Сохранение «шапки» результата без секций
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SaveResultRequest {
    pub completion_date: Option<NaiveDate>,

    #[validate(length(max = 30, message = "Category cannot exceed 30 characters"))]
    pub category: Option<String>,

    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,

    #[validate(length(max = 500, message = "Document reference cannot exceed 500 characters"))]
    pub document_ref: Option<String>,

    /// Полная замена секций; `None` оставляет существующие
    pub test_data: Option<TestData>,
}

/// Сохранение одной секции; каждая секция фиксируется независимо
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaveSectionRequest {
    pub section: TestSection,

    /// Дата работ, указанная при этом сохранении
    pub completion_date: Option<NaiveDate>,

    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_section_drops_measurements() {
        let section = TestSection {
            name: "Weights".to_string(),
            section_type: SectionType::Tolerance,
            tolerance: Some(0.1),
            unit: Some("g".to_string()),
            rows: vec![TestRow {
                label: "10 g".to_string(),
                measured: Some(10.02),
                reference: Some(10.0),
                error: Some(0.02),
                passed: Some(true),
                ..Default::default()
            }],
        };
        let blank = section.blank();
        assert_eq!(blank.rows[0].reference, Some(10.0));
        assert_eq!(blank.rows[0].measured, None);
        assert_eq!(blank.rows[0].passed, None);
        assert_eq!(blank.tolerance, Some(0.1));
    }

    #[test]
    fn test_has_test_data() {
        let mut result = MaintenanceResult::new("occ-1", None);
        assert!(!result.has_test_data());
        result.test_data = Some(vec![]);
        assert!(!result.has_test_data());
        result.test_data = Some(vec![TestSection {
            name: "Checks".to_string(),
            section_type: SectionType::Checklist,
            tolerance: None,
            unit: None,
            rows: vec![],
        }]);
        assert!(result.has_test_data());
    }

    #[test]
    fn test_section_json_shape() {
        let json = r#"{"name":"Temp","section_type":"range","rows":[{"label":"T1","measured":21.5,"min":20.0}]}"#;
        let section: TestSection = serde_json::from_str(json).unwrap();
        assert_eq!(section.section_type, SectionType::Range);
        assert_eq!(section.rows[0].max, None);
        assert_eq!(section.rows[0].min, Some(20.0));
    }

    #[test]
    fn test_category_strings() {
        assert_eq!(ResultCategory::SpareQuotation.as_ref(), "spare_quotation");
        assert_eq!("service".parse::<ResultCategory>().unwrap(), ResultCategory::Service);
    }
}
