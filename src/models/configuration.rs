// src/models/configuration.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::schedule::recurrence::Frequency;

// === ENUMS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum ResponsibleParty {
    /// Обслуживание силами лаборатории
    #[default]
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    InHouse,
    #[serde(rename = "vendor")]
    #[strum(serialize = "vendor")]
    Vendor,
}

// === CONFIGURATION ===

/// Правило повторяющегося обслуживания для одного прибора
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfiguration {
    pub id: String,
    pub instrument_id: String,
    pub maintenance_type: String,
    pub frequency: Frequency,
    pub anchor_date: NaiveDate,
    pub template_id: Option<String>,
    pub responsible_party: ResponsibleParty,
    pub vendor_name: Option<String>,
    pub vendor_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceConfiguration {
    /// Изменились ли поля, от которых зависит расписание.
    /// Смена названия типа или шаблона расписание не пересоздаёт.
    pub fn schedule_changed(&self, other: &MaintenanceConfiguration) -> bool {
        self.frequency != other.frequency
            || self.anchor_date != other.anchor_date
            || self.responsible_party != other.responsible_party
            || self.vendor_name != other.vendor_name
            || self.vendor_contact != other.vendor_contact
    }
}

// === REQUESTS ===

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateConfigurationRequest {
    #[validate(length(min = 1, max = 100, message = "Maintenance type must be between 1 and 100 characters"))]
    pub maintenance_type: String,

    #[validate(length(min = 1, max = 50, message = "Frequency is required"))]
    pub frequency: String,

    pub anchor_date: NaiveDate,

    #[validate(length(max = 100, message = "Template ID cannot exceed 100 characters"))]
    pub template_id: Option<String>,

    #[validate(length(max = 20, message = "Responsible party cannot exceed 20 characters"))]
    pub responsible_party: Option<String>,

    #[validate(length(max = 255, message = "Vendor name cannot exceed 255 characters"))]
    pub vendor_name: Option<String>,

    #[validate(length(max = 255, message = "Vendor contact cannot exceed 255 characters"))]
    pub vendor_contact: Option<String>,
}

impl CreateConfigurationRequest {
    pub fn into_configuration(self, instrument_id: &str) -> ApiResult<MaintenanceConfiguration> {
        self.validate()?;
        if instrument_id.trim().is_empty() {
            return Err(ApiError::bad_request("Instrument ID cannot be empty"));
        }

        let party = parse_party(self.responsible_party.as_deref())?;
        let now = Utc::now();
        let config = MaintenanceConfiguration {
            id: Uuid::new_v4().to_string(),
            instrument_id: instrument_id.to_string(),
            maintenance_type: self.maintenance_type.trim().to_string(),
            frequency: Frequency::parse_lenient(&self.frequency),
            anchor_date: self.anchor_date,
            template_id: self.template_id,
            responsible_party: party,
            vendor_name: self.vendor_name,
            vendor_contact: self.vendor_contact,
            created_at: now,
            updated_at: now,
        };
        check_vendor(&config)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateConfigurationRequest {
    #[validate(length(min = 1, max = 100, message = "Maintenance type must be between 1 and 100 characters"))]
    pub maintenance_type: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Frequency cannot be empty"))]
    pub frequency: Option<String>,

    pub anchor_date: Option<NaiveDate>,

    #[validate(length(max = 100, message = "Template ID cannot exceed 100 characters"))]
    pub template_id: Option<String>,

    #[validate(length(max = 20, message = "Responsible party cannot exceed 20 characters"))]
    pub responsible_party: Option<String>,

    #[validate(length(max = 255, message = "Vendor name cannot exceed 255 characters"))]
    pub vendor_name: Option<String>,

    #[validate(length(max = 255, message = "Vendor contact cannot exceed 255 characters"))]
    pub vendor_contact: Option<String>,
}

impl UpdateConfigurationRequest {
    /// Применить изменения к копии конфигурации
    pub fn apply_to(&self, current: &MaintenanceConfiguration) -> ApiResult<MaintenanceConfiguration> {
        self.validate()?;
        let mut updated = current.clone();

        if let Some(ref maintenance_type) = self.maintenance_type {
            updated.maintenance_type = maintenance_type.trim().to_string();
        }
        if let Some(ref frequency) = self.frequency {
            updated.frequency = Frequency::parse_lenient(frequency);
        }
        if let Some(anchor_date) = self.anchor_date {
            updated.anchor_date = anchor_date;
        }
        if let Some(ref template_id) = self.template_id {
            updated.template_id = Some(template_id.clone()).filter(|t| !t.is_empty());
        }
        if self.responsible_party.is_some() {
            updated.responsible_party = parse_party(self.responsible_party.as_deref())?;
        }
        if let Some(ref vendor_name) = self.vendor_name {
            updated.vendor_name = Some(vendor_name.clone());
        }
        if let Some(ref vendor_contact) = self.vendor_contact {
            updated.vendor_contact = Some(vendor_contact.clone());
        }
        if updated.responsible_party == ResponsibleParty::InHouse {
            updated.vendor_name = None;
            updated.vendor_contact = None;
        }

        check_vendor(&updated)?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }
}

fn parse_party(value: Option<&str>) -> ApiResult<ResponsibleParty> {
    match value {
        None => Ok(ResponsibleParty::default()),
        Some(s) => ResponsibleParty::from_str(s.trim()).map_err(|_| {
            ApiError::ValidationError(format!(
                "Responsible party must be 'self' or 'vendor', got '{}'",
                s
            ))
        }),
    }
}

fn check_vendor(config: &MaintenanceConfiguration) -> ApiResult<()> {
    if config.responsible_party == ResponsibleParty::Vendor
        && config.vendor_name.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(ApiError::ValidationError(
            "Vendor name is required when the responsible party is 'vendor'".to_string(),
        ));
    }
    Ok(())
}
