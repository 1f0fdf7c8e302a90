// src/schedule/evaluator.rs
//! Вычисление отображаемого статуса вхождения по (возможно частичному) результату.
//!
//! Это чистое чтение: хранимый статус меняет только сервис расписания.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::models::{MaintenanceOccurrence, MaintenanceResult, SectionType, TestRow, TestSection};

/// Погрешность сравнения с допуском, чтобы 10.3 - 10.0 укладывалось в 0.3
const TOLERANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    Overdue,
    PartiallyCompleted,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub status: DisplayStatus,
    pub completed_sections: usize,
    pub total_sections: usize,
}

impl CompletionSummary {
    fn without_sections(status: DisplayStatus) -> Self {
        Self {
            status,
            completed_sections: 0,
            total_sections: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == DisplayStatus::Completed
    }
}

/// Вычисленные поля строки
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowOutcome {
    pub error: Option<f64>,
    pub passed: Option<bool>,
}

// ==================== СТРОКИ ====================

pub fn evaluate_row(section: &TestSection, row: &TestRow) -> RowOutcome {
    match section.section_type {
        SectionType::Checklist => RowOutcome {
            error: None,
            passed: row.passed,
        },
        SectionType::Tolerance => match (row.measured, row.reference) {
            (Some(measured), Some(reference)) => {
                let error = measured - reference;
                let tolerance = section.tolerance.unwrap_or(0.0).abs();
                RowOutcome {
                    error: Some(error),
                    passed: Some(error.abs() <= tolerance + TOLERANCE_EPSILON),
                }
            }
            _ => RowOutcome::default(),
        },
        SectionType::Range => match row.measured {
            Some(measured) => {
                let min = row.min.unwrap_or(f64::NEG_INFINITY);
                let max = row.max.unwrap_or(f64::INFINITY);
                RowOutcome {
                    error: None,
                    passed: Some(measured >= min && measured <= max),
                }
            }
            None => RowOutcome::default(),
        },
        SectionType::Simple => RowOutcome {
            error: None,
            passed: row.measured.map(|_| true),
        },
    }
}

/// Записать вычисленные `error`/`passed` и отформатированное отклонение в строки секции.
/// Для чек-листа `passed` остаётся пользовательским.
pub fn apply_row_outcomes(section: &mut TestSection) {
    if section.section_type == SectionType::Checklist {
        return;
    }
    let computed: Vec<RowOutcome> = section
        .rows
        .iter()
        .map(|row| evaluate_row(section, row))
        .collect();
    for (row, outcome) in section.rows.iter_mut().zip(computed) {
        row.error = outcome.error;
        row.error_display = outcome.error.map(format_error);
        row.passed = outcome.passed;
    }
}

/// Отклонение со знаком и тремя знаками после запятой: `+0.200`
pub fn format_error(error: f64) -> String {
    format!("{:+.3}", error)
}

// ==================== СЕКЦИИ ====================

pub fn is_row_complete(section_type: SectionType, row: &TestRow) -> bool {
    match section_type {
        // Неотмеченная строка чек-листа не заполнена, а не «провалена»
        SectionType::Checklist => row.passed == Some(true),
        _ => row.measured.is_some(),
    }
}

/// Секция без строк считается заполненной
pub fn is_section_complete(section: &TestSection) -> bool {
    section
        .rows
        .iter()
        .all(|row| is_row_complete(section.section_type, row))
}

/// (заполнено, всего)
pub fn section_progress(sections: &[TestSection]) -> (usize, usize) {
    let completed = sections.iter().filter(|s| is_section_complete(s)).count();
    (completed, sections.len())
}

// ==================== СТАТУС ВХОЖДЕНИЯ ====================

pub fn evaluate(
    occurrence: &MaintenanceOccurrence,
    result: Option<&MaintenanceResult>,
    now: DateTime<Utc>,
) -> CompletionSummary {
    let result = match result {
        Some(result) => result,
        None => {
            let status = if occurrence.due_date < now {
                DisplayStatus::Overdue
            } else {
                DisplayStatus::Pending
            };
            return CompletionSummary::without_sections(status);
        }
    };

    let sections = match result.test_data.as_deref() {
        Some(sections) if !sections.is_empty() => sections,
        // Результат без данных испытаний: ручная запись в работе
        _ => {
            let status = if occurrence.is_completed() {
                DisplayStatus::Completed
            } else {
                DisplayStatus::PartiallyCompleted
            };
            return CompletionSummary::without_sections(status);
        }
    };

    let (completed, total) = section_progress(sections);
    let status = if completed == 0 {
        DisplayStatus::Pending
    } else if completed < total {
        DisplayStatus::PartiallyCompleted
    } else {
        DisplayStatus::Completed
    };

    CompletionSummary {
        status,
        completed_sections: completed,
        total_sections: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OccurrenceStatus, ResponsibleParty};
    use chrono::{Duration, TimeZone};

    fn occurrence(due: DateTime<Utc>) -> MaintenanceOccurrence {
        MaintenanceOccurrence {
            id: "occ-1".to_string(),
            configuration_id: "cfg-1".to_string(),
            instrument_id: "inst-1".to_string(),
            maintenance_type: "Calibration".to_string(),
            due_date: due,
            status: OccurrenceStatus::Scheduled,
            completion_date: None,
            completion_notes: None,
            is_last_of_window: false,
            template_id: None,
            responsible_party: ResponsibleParty::InHouse,
            vendor_name: None,
            vendor_contact: None,
            created_at: due,
            updated_at: due,
        }
    }

    fn tolerance_section(tolerance: f64, measured: Option<f64>) -> TestSection {
        TestSection {
            name: "Weights".to_string(),
            section_type: SectionType::Tolerance,
            tolerance: Some(tolerance),
            unit: Some("g".to_string()),
            rows: vec![TestRow {
                label: "10 g".to_string(),
                measured,
                reference: Some(10.0),
                ..Default::default()
            }],
        }
    }

    fn with_sections(sections: Vec<TestSection>) -> MaintenanceResult {
        let mut result = MaintenanceResult::new("occ-1", None);
        result.test_data = Some(sections);
        result
    }

    #[test]
    fn test_tolerance_row() {
        let strict = tolerance_section(0.1, Some(10.2));
        let outcome = evaluate_row(&strict, &strict.rows[0]);
        assert_eq!(format_error(outcome.error.unwrap()), "+0.200");
        assert_eq!(outcome.passed, Some(false));

        let loose = tolerance_section(0.3, Some(10.2));
        assert_eq!(evaluate_row(&loose, &loose.rows[0]).passed, Some(true));
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let section = tolerance_section(0.3, Some(10.3));
        assert_eq!(evaluate_row(&section, &section.rows[0]).passed, Some(true));
        let below = tolerance_section(0.1, Some(9.9));
        assert_eq!(format_error(evaluate_row(&below, &below.rows[0]).error.unwrap()), "-0.100");
    }

    #[test]
    fn test_range_row_open_bounds() {
        let mut section = TestSection {
            name: "Temperature".to_string(),
            section_type: SectionType::Range,
            tolerance: None,
            unit: Some("°C".to_string()),
            rows: vec![
                TestRow { label: "low only".into(), measured: Some(-40.0), max: Some(25.0), ..Default::default() },
                TestRow { label: "both".into(), measured: Some(30.0), min: Some(20.0), max: Some(25.0), ..Default::default() },
                TestRow { label: "none".into(), measured: Some(1e9), ..Default::default() },
            ],
        };
        apply_row_outcomes(&mut section);
        assert_eq!(section.rows[0].passed, Some(true));
        assert_eq!(section.rows[1].passed, Some(false));
        assert_eq!(section.rows[2].passed, Some(true));
    }

    #[test]
    fn test_simple_and_checklist_rows() {
        let simple = TestSection {
            name: "Notes".to_string(),
            section_type: SectionType::Simple,
            tolerance: None,
            unit: None,
            rows: vec![TestRow { label: "Flow".into(), measured: Some(0.0), ..Default::default() }],
        };
        assert_eq!(evaluate_row(&simple, &simple.rows[0]).passed, Some(true));

        let mut checklist = TestSection {
            name: "Visual".to_string(),
            section_type: SectionType::Checklist,
            tolerance: None,
            unit: None,
            rows: vec![TestRow { label: "Seal intact".into(), passed: Some(false), ..Default::default() }],
        };
        apply_row_outcomes(&mut checklist);
        assert_eq!(checklist.rows[0].passed, Some(false));
        assert!(!is_section_complete(&checklist));

        checklist.rows[0].passed = Some(true);
        assert!(is_section_complete(&checklist));
    }

    #[test]
    fn test_completeness_ignores_pass_fail() {
        let failing = tolerance_section(0.1, Some(12.0));
        assert!(is_section_complete(&failing));
        let empty = tolerance_section(0.1, None);
        assert!(!is_section_complete(&empty));
    }

    #[test]
    fn test_no_result_pending_or_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let past = occurrence(now - Duration::days(1));
        let future = occurrence(now + Duration::days(1));
        assert_eq!(evaluate(&past, None, now).status, DisplayStatus::Overdue);
        assert_eq!(evaluate(&future, None, now).status, DisplayStatus::Pending);
    }

    #[test]
    fn test_result_without_test_data() {
        let now = Utc::now();
        let mut occ = occurrence(now);
        let result = MaintenanceResult::new("occ-1", None);
        assert_eq!(evaluate(&occ, Some(&result), now).status, DisplayStatus::PartiallyCompleted);

        occ.status = OccurrenceStatus::Completed;
        assert_eq!(evaluate(&occ, Some(&result), now).status, DisplayStatus::Completed);
    }

    #[test]
    fn test_section_aggregation() {
        let now = Utc::now();
        let occ = occurrence(now);

        let result = with_sections(vec![
            tolerance_section(0.1, Some(10.0)),
            tolerance_section(0.1, None),
            tolerance_section(0.1, None),
        ]);
        let summary = evaluate(&occ, Some(&result), now);
        assert_eq!(summary.status, DisplayStatus::PartiallyCompleted);
        assert_eq!(summary.completed_sections, 1);
        assert_eq!(summary.total_sections, 3);

        let none_done = with_sections(vec![tolerance_section(0.1, None)]);
        assert_eq!(evaluate(&occ, Some(&none_done), now).status, DisplayStatus::Pending);

        let all_done = with_sections(vec![
            tolerance_section(0.1, Some(10.5)),
            TestSection {
                name: "Empty".to_string(),
                section_type: SectionType::Simple,
                tolerance: None,
                unit: None,
                rows: vec![],
            },
        ]);
        let summary = evaluate(&occ, Some(&all_done), now);
        assert_eq!(summary.status, DisplayStatus::Completed);
        assert_eq!(summary.completed_sections, 2);
    }
}
