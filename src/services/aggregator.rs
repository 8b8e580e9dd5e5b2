//! Summering av redan hämtade loggrader till kortstatistik.
//!
//! Arbetar enbart på samlingen i minnet; ingen databasåtkomst.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{ElectricityLog, PettyCashTransaction, TravelLog, WaterLog};

/// Något som hör till ett datum (period)
pub trait PeriodEntry {
    fn period_date(&self) -> NaiveDate;
}

impl PeriodEntry for WaterLog {
    fn period_date(&self) -> NaiveDate {
        self.date
    }
}

impl PeriodEntry for ElectricityLog {
    fn period_date(&self) -> NaiveDate {
        self.start_date
    }
}

impl PeriodEntry for TravelLog {
    fn period_date(&self) -> NaiveDate {
        self.travel_date
    }
}

impl PeriodEntry for PettyCashTransaction {
    fn period_date(&self) -> NaiveDate {
        self.date
    }
}

/// Datumfilter, båda gränserna inkluderade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl PeriodFilter {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Antal rader som matchade filtret
    pub count: usize,
    /// Summa över filtrerade rader
    pub period_total: f64,
    /// Summa över årets rader, oberoende av filtret
    pub ytd_total: f64,
    /// ytd_total / månadsnummer (1-12)
    pub monthly_average: f64,
}

/// Förenklat månadssnitt: hittills i år delat med månadens nummer
pub fn monthly_average(ytd_total: f64, today: NaiveDate) -> f64 {
    ytd_total / today.month() as f64
}

/// Summera `metric` över rader som matchar datumfiltret och `select`.
/// Årets total räknas på alla rader daterade under `today`s kalenderår.
pub fn summarize<T, M, S>(
    entries: &[T],
    filter: &PeriodFilter,
    today: NaiveDate,
    metric: M,
    select: S,
) -> Summary
where
    T: PeriodEntry,
    M: Fn(&T) -> f64,
    S: Fn(&T) -> bool,
{
    let mut summary = Summary::default();

    for entry in entries {
        let date = entry.period_date();
        let value = metric(entry);

        if filter.contains(date) && select(entry) {
            summary.count += 1;
            summary.period_total += value;
        }
        if date.year() == today.year() {
            summary.ytd_total += value;
        }
    }

    summary.monthly_average = monthly_average(summary.ytd_total, today);
    summary
}

/// Som [`summarize`] utan extra urval
pub fn summarize_period<T, M>(entries: &[T], filter: &PeriodFilter, today: NaiveDate, metric: M) -> Summary
where
    T: PeriodEntry,
    M: Fn(&T) -> f64,
{
    summarize(entries, filter, today, metric, |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CashKind, PettyCashTransaction};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense(date: NaiveDate, amount: f64, category: &str) -> PettyCashTransaction {
        PettyCashTransaction::new(date, CashKind::Expense, amount, category)
    }

    #[test]
    fn test_monthly_average_in_march() {
        assert_eq!(monthly_average(1200.0, d(2024, 3, 15)), 400.0);
        assert_eq!(monthly_average(1200.0, d(2024, 1, 2)), 1200.0);
    }

    #[test]
    fn test_filter_contains() {
        let f = PeriodFilter::new(Some(d(2024, 2, 1)), Some(d(2024, 2, 29)));
        assert!(f.contains(d(2024, 2, 1)));
        assert!(f.contains(d(2024, 2, 29)));
        assert!(!f.contains(d(2024, 3, 1)));
        assert!(PeriodFilter::all().contains(d(1999, 1, 1)));
    }

    #[test]
    fn test_ytd_ignores_filter() {
        let txs = vec![
            expense(d(2023, 12, 20), 500.0, "Kontor"),
            expense(d(2024, 1, 10), 300.0, "Kontor"),
            expense(d(2024, 2, 10), 400.0, "Resor"),
            expense(d(2024, 3, 5), 500.0, "Kontor"),
        ];
        let filter = PeriodFilter::new(Some(d(2024, 3, 1)), Some(d(2024, 3, 31)));

        let summary = summarize_period(&txs, &filter, d(2024, 3, 20), |t| t.amount);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.period_total, 500.0);
        assert_eq!(summary.ytd_total, 1200.0);
        assert_eq!(summary.monthly_average, 400.0);
    }

    #[test]
    fn test_category_selection() {
        let txs = vec![
            expense(d(2024, 1, 10), 300.0, "Kontor"),
            expense(d(2024, 1, 11), 400.0, "Resor"),
        ];
        let summary = summarize(
            &txs,
            &PeriodFilter::all(),
            d(2024, 1, 31),
            |t| t.amount,
            |t| t.category == "Resor",
        );
        assert_eq!(summary.count, 1);
        assert_eq!(summary.period_total, 400.0);
        assert_eq!(summary.ytd_total, 700.0);
    }

    #[test]
    fn test_empty_collection() {
        let txs: Vec<PettyCashTransaction> = Vec::new();
        let summary = summarize_period(&txs, &PeriodFilter::all(), d(2024, 6, 1), |t| t.amount);
        assert_eq!(summary, Summary::default());
    }
}
