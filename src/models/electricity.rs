use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Koefficienter för elberäkningen (singleton, id=1 i `electricity_config`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectricityConfig {
    /// Företagets andel av byggnadens förbrukning, 0-100
    pub allocation_percentage: f64,
    /// kg CO2e per kWh
    pub emission_factor_per_kwh: f64,
    pub cost_per_kwh: f64,
}

impl Default for ElectricityConfig {
    fn default() -> Self {
        Self {
            allocation_percentage: 100.0,
            emission_factor_per_kwh: 0.8,
            cost_per_kwh: 0.0,
        }
    }
}

impl ElectricityConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !self.allocation_percentage.is_finite()
            || !(0.0..=100.0).contains(&self.allocation_percentage)
        {
            return Err(AppError::validation(
                "allocation_percentage måste ligga mellan 0 och 100",
            ));
        }
        if !self.emission_factor_per_kwh.is_finite() || self.emission_factor_per_kwh < 0.0 {
            return Err(AppError::validation(
                "emission_factor_per_kwh måste vara ett icke-negativt tal",
            ));
        }
        if !self.cost_per_kwh.is_finite() || self.cost_per_kwh < 0.0 {
            return Err(AppError::validation(
                "cost_per_kwh måste vara ett icke-negativt tal",
            ));
        }
        Ok(())
    }
}

/// Inmatning för en mätperiod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub building_kwh: f64,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
}

impl ElectricityInput {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, building_kwh: f64) -> Self {
        Self {
            start_date,
            end_date,
            building_kwh,
            notes: None,
            evidence_url: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.end_date < self.start_date {
            return Err(AppError::validation("Slutdatum ligger före startdatum"));
        }
        Ok(())
    }
}

/// Sparad elperiod med koefficienterna som gällde vid sparandet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricityLog {
    pub id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub building_kwh: f64,
    pub config: ElectricityConfig,
    pub company_kwh: f64,
    pub carbon_kg: f64,
    pub cost: f64,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ElectricityLog {
    pub fn days(&self) -> i64 {
        crate::utils::date::days_inclusive(self.start_date, self.end_date)
    }
}
