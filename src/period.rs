//! Target month for a retrieval run and everything derived from it:
//! calendar bounds, portal date strings, row-matching keys, output names.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Italian month names, as the portal lists them.
pub const MONTHS_IT: [&str; 12] = [
    "Gennaio", "Febbraio", "Marzo", "Aprile", "Maggio", "Giugno", "Luglio", "Agosto",
    "Settembre", "Ottobre", "Novembre", "Dicembre",
];

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Month out of range: {0}")]
    MonthOutOfRange(u32),

    #[error("Unknown month name: {0}")]
    UnknownMonth(String),

    #[error("Year out of range: {0}")]
    YearOutOfRange(i32),
}

/// Which of the two monthly documents a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Payslip,
    Attendance,
}

impl DocumentKind {
    /// Stem used in output file names.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Payslip => "payslip",
            Self::Attendance => "attendance",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payslip => write!(f, "payslip"),
            Self::Attendance => write!(f, "attendance"),
        }
    }
}

/// A (month, year) pair. Immutable once built; all other values are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetrievalTarget {
    month: u32,
    year: i32,
}

impl RetrievalTarget {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        if !(1970..=9999).contains(&year) {
            return Err(PeriodError::YearOutOfRange(year));
        }
        Ok(Self { month, year })
    }

    /// Build from an Italian or English month name, case-insensitive.
    pub fn from_month_name(name: &str, year: i32) -> Result<Self, PeriodError> {
        let needle = name.trim().to_lowercase();
        let index = MONTHS_IT
            .iter()
            .chain(MONTHS_EN.iter())
            .position(|m| m.to_lowercase() == needle)
            .ok_or_else(|| PeriodError::UnknownMonth(name.to_string()))?;
        Self::new((index % 12) as u32 + 1, year)
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month_name(&self) -> &'static str {
        MONTHS_IT[(self.month - 1) as usize]
    }

    pub fn first_day(&self) -> NaiveDate {
        // Month and year are validated in `new`.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    /// `dd/mm/yyyy` for the first day of the month.
    pub fn from_date_string(&self) -> String {
        self.first_day().format("%d/%m/%Y").to_string()
    }

    /// `dd/mm/yyyy` for the last day of the month.
    pub fn to_date_string(&self) -> String {
        self.last_day().format("%d/%m/%Y").to_string()
    }

    /// `MM/YYYY`, e.g. `06/2025`.
    pub fn numeric_period_key(&self) -> String {
        format!("{:02}/{}", self.month, self.year)
    }

    /// `<Mese> YYYY`, e.g. `Giugno 2025`.
    pub fn named_period_key(&self) -> String {
        format!("{} {}", self.month_name(), self.year)
    }

    /// Keys a listing row may contain for this period, most specific first.
    pub fn period_keys(&self) -> Vec<String> {
        vec![self.named_period_key(), self.numeric_period_key()]
    }

    /// Deterministic output name, e.g. `payslip_06_2025.pdf`. Reruns overwrite.
    pub fn file_name(&self, kind: DocumentKind) -> String {
        format!("{}_{:02}_{}.pdf", kind.file_stem(), self.month, self.year)
    }
}

impl fmt::Display for RetrievalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.named_period_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_month_spans_first_to_last_day() {
        for year in [2023, 2024, 2025, 2100] {
            for month in 1..=12 {
                let t = RetrievalTarget::new(month, year).unwrap();
                assert_eq!(t.first_day().day(), 1);
                assert_eq!(t.first_day().month(), month);
                assert_eq!(t.last_day().month(), month);
                assert_eq!(t.last_day().succ_opt().unwrap().day(), 1);
                let span = (t.last_day() - t.first_day()).num_days() + 1;
                assert_eq!(span as u32, t.days_in_month());
            }
        }
    }

    #[test]
    fn february_respects_leap_years() {
        assert_eq!(RetrievalTarget::new(2, 2024).unwrap().days_in_month(), 29);
        assert_eq!(RetrievalTarget::new(2, 2025).unwrap().days_in_month(), 28);
        assert_eq!(RetrievalTarget::new(2, 2100).unwrap().days_in_month(), 28);
        assert_eq!(RetrievalTarget::new(2, 2000).unwrap().days_in_month(), 29);
    }

    #[test]
    fn date_strings_are_day_month_year() {
        let t = RetrievalTarget::new(2, 2024).unwrap();
        assert_eq!(t.from_date_string(), "01/02/2024");
        assert_eq!(t.to_date_string(), "29/02/2024");

        let dec = RetrievalTarget::new(12, 2025).unwrap();
        assert_eq!(dec.to_date_string(), "31/12/2025");
    }

    #[test]
    fn period_keys() {
        let t = RetrievalTarget::new(6, 2025).unwrap();
        assert_eq!(t.named_period_key(), "Giugno 2025");
        assert_eq!(t.numeric_period_key(), "06/2025");
        assert_eq!(t.period_keys(), vec!["Giugno 2025", "06/2025"]);
    }

    #[test]
    fn month_names_parse_in_both_languages() {
        assert_eq!(RetrievalTarget::from_month_name("giugno", 2025).unwrap().month(), 6);
        assert_eq!(RetrievalTarget::from_month_name(" June ", 2025).unwrap().month(), 6);
        assert_eq!(RetrievalTarget::from_month_name("DICEMBRE", 2025).unwrap().month(), 12);
        assert_eq!(
            RetrievalTarget::from_month_name("Brumaio", 2025),
            Err(PeriodError::UnknownMonth("Brumaio".into()))
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(RetrievalTarget::new(0, 2025), Err(PeriodError::MonthOutOfRange(0)));
        assert_eq!(RetrievalTarget::new(13, 2025), Err(PeriodError::MonthOutOfRange(13)));
        assert_eq!(RetrievalTarget::new(5, 1200), Err(PeriodError::YearOutOfRange(1200)));
    }

    #[test]
    fn file_names_are_deterministic() {
        let t = RetrievalTarget::new(3, 2025).unwrap();
        assert_eq!(t.file_name(DocumentKind::Payslip), "payslip_03_2025.pdf");
        assert_eq!(t.file_name(DocumentKind::Attendance), "attendance_03_2025.pdf");
        assert_eq!(
            t.file_name(DocumentKind::Payslip),
            RetrievalTarget::new(3, 2025).unwrap().file_name(DocumentKind::Payslip)
        );
    }
}
