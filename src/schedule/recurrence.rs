// src/schedule/recurrence.rs
//! Календарная арифметика периодичности обслуживания.
//!
//! Даты здесь календарные (`NaiveDate`), без часовых поясов. Прибавление
//! месяцев прижимается к последнему дню целевого месяца: 31 января + 1 месяц
//! даёт 28 (29) февраля.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
    EnumIter,
)]
#[serde(into = "String", from = "String")]
#[strum(ascii_case_insensitive)]
pub enum Frequency {
    #[strum(to_string = "Daily")]
    Daily,
    #[strum(to_string = "Weekly")]
    Weekly,
    #[strum(to_string = "Monthly", serialize = "1 Month")]
    Monthly,
    #[strum(to_string = "3 Months", serialize = "3-Months", serialize = "Quarterly")]
    ThreeMonths,
    #[strum(to_string = "6 Months", serialize = "6-Months", serialize = "Semi-Annual")]
    SixMonths,
    #[strum(to_string = "1 Year", serialize = "1-Year", serialize = "Annual")]
    OneYear,
}

enum Step {
    Days(u64),
    Months(u32),
}

impl Frequency {
    /// Разбор строки с откатом на ежемесячный интервал для неизвестных значений.
    /// План обслуживания не должен молча перестать продвигаться.
    pub fn parse_lenient(value: &str) -> Self {
        match Frequency::from_str(value.trim()) {
            Ok(frequency) => frequency,
            Err(_) => {
                log::warn!(
                    "Unrecognized maintenance frequency '{}', falling back to Monthly",
                    value
                );
                Frequency::Monthly
            }
        }
    }

    /// Целевое число вхождений в годовом окне
    pub fn occurrences_per_year(&self) -> usize {
        match self {
            Frequency::Daily => 365,
            Frequency::Weekly => 52,
            Frequency::Monthly => 12,
            Frequency::ThreeMonths => 4,
            Frequency::SixMonths => 2,
            Frequency::OneYear => 1,
        }
    }

    fn step(&self) -> Step {
        match self {
            Frequency::Daily => Step::Days(1),
            Frequency::Weekly => Step::Days(7),
            Frequency::Monthly => Step::Months(1),
            Frequency::ThreeMonths => Step::Months(3),
            Frequency::SixMonths => Step::Months(6),
            Frequency::OneYear => Step::Months(12),
        }
    }
}

impl From<String> for Frequency {
    fn from(value: String) -> Self {
        Frequency::parse_lenient(&value)
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.to_string()
    }
}

/// Следующая дата после `date` с периодичностью `frequency`
pub fn next_date(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    nth_date(date, frequency, 1)
}

/// Дата через `n` периодов от `anchor`, вычисленная за один шаг.
///
/// Шаг от якоря, а не цепочка `next_date`, чтобы прижатие к концу месяца
/// не накапливалось: 31 января → 29 февраля → 31 марта, а не 29 марта.
pub fn nth_date(anchor: NaiveDate, frequency: Frequency, n: u32) -> NaiveDate {
    let shifted = match frequency.step() {
        Step::Days(days) => anchor.checked_add_days(Days::new(days * n as u64)),
        Step::Months(months) => anchor.checked_add_months(Months::new(months * n)),
    };
    shifted.unwrap_or(NaiveDate::MAX)
}

/// Первая дата за пределами годового окна, начинающегося в `anchor`
pub fn window_end(anchor: NaiveDate) -> NaiveDate {
    anchor
        .checked_add_months(Months::new(12))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_next_date_rules() {
        let base = d(2024, 1, 15);
        assert_eq!(next_date(base, Frequency::Daily), d(2024, 1, 16));
        assert_eq!(next_date(base, Frequency::Weekly), d(2024, 1, 22));
        assert_eq!(next_date(base, Frequency::Monthly), d(2024, 2, 15));
        assert_eq!(next_date(base, Frequency::ThreeMonths), d(2024, 4, 15));
        assert_eq!(next_date(base, Frequency::SixMonths), d(2024, 7, 15));
        assert_eq!(next_date(base, Frequency::OneYear), d(2025, 1, 15));
    }

    #[test]
    fn test_month_end_clamping() {
        assert_eq!(next_date(d(2024, 1, 31), Frequency::Monthly), d(2024, 2, 29));
        assert_eq!(next_date(d(2023, 1, 31), Frequency::Monthly), d(2023, 2, 28));
        assert_eq!(next_date(d(2024, 2, 29), Frequency::OneYear), d(2025, 2, 28));
        assert_eq!(next_date(d(2024, 8, 31), Frequency::SixMonths), d(2025, 2, 28));
    }

    #[test]
    fn test_nth_date_does_not_drift() {
        let anchor = d(2024, 1, 31);
        assert_eq!(nth_date(anchor, Frequency::Monthly, 1), d(2024, 2, 29));
        assert_eq!(nth_date(anchor, Frequency::Monthly, 2), d(2024, 3, 31));
        assert_eq!(nth_date(anchor, Frequency::Weekly, 0), anchor);
    }

    #[test]
    fn test_two_periods_strictly_increase() {
        let dates = [d(2024, 1, 31), d(2023, 12, 31), d(2024, 2, 29), d(2025, 6, 1)];
        for frequency in Frequency::iter() {
            for date in dates {
                let once = next_date(date, frequency);
                let twice = next_date(once, frequency);
                assert!(once > date, "{} {}", frequency, date);
                assert!(twice > once, "{} {}", frequency, date);
            }
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Frequency::parse_lenient("Quarterly"), Frequency::ThreeMonths);
        assert_eq!(Frequency::parse_lenient("3 Months"), Frequency::ThreeMonths);
        assert_eq!(Frequency::parse_lenient("semi-annual"), Frequency::SixMonths);
        assert_eq!(Frequency::parse_lenient("Annual"), Frequency::OneYear);
        assert_eq!(Frequency::parse_lenient(" weekly "), Frequency::Weekly);
    }

    #[test]
    fn test_unknown_frequency_falls_back_to_monthly() {
        assert_eq!(Frequency::parse_lenient("fortnightly"), Frequency::Monthly);
        assert_eq!(Frequency::parse_lenient(""), Frequency::Monthly);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Frequency::SixMonths).unwrap();
        assert_eq!(json, "\"6 Months\"");
        let parsed: Frequency = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(parsed, Frequency::Monthly);
    }

    #[test]
    fn test_window_end() {
        assert_eq!(window_end(d(2024, 1, 15)), d(2025, 1, 15));
        assert_eq!(window_end(d(2024, 2, 29)), d(2025, 2, 28));
    }
}
