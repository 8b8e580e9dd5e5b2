use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::date::{week_start as week_start_of, weekdays_of};
use crate::utils::error::{AppError, AppResult};

/// Koefficienter för vattenberäkningen (singleton, id=1 i `water_config`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterConfig {
    pub hand_wash_frequency_per_day: f64,
    pub hand_wash_volume_liters: f64,
    pub toilet_flush_frequency_per_day: f64,
    pub toilet_flush_volume_liters: f64,
    /// kg CO2e per m3
    pub emission_factor_per_cubic_meter: f64,
    /// Kostnad per m3
    pub cost_per_cubic_meter: f64,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            hand_wash_frequency_per_day: 5.0,
            hand_wash_volume_liters: 1.5,
            toilet_flush_frequency_per_day: 3.0,
            toilet_flush_volume_liters: 6.0,
            emission_factor_per_cubic_meter: 0.344,
            cost_per_cubic_meter: 0.0,
        }
    }
}

impl WaterConfig {
    /// Liter per person och arbetsdag
    pub fn liters_per_person(&self) -> f64 {
        self.hand_wash_frequency_per_day * self.hand_wash_volume_liters
            + self.toilet_flush_frequency_per_day * self.toilet_flush_volume_liters
    }

    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("hand_wash_frequency_per_day", self.hand_wash_frequency_per_day),
            ("hand_wash_volume_liters", self.hand_wash_volume_liters),
            ("toilet_flush_frequency_per_day", self.toilet_flush_frequency_per_day),
            ("toilet_flush_volume_liters", self.toilet_flush_volume_liters),
            ("emission_factor_per_cubic_meter", self.emission_factor_per_cubic_meter),
            ("cost_per_cubic_meter", self.cost_per_cubic_meter),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{} måste vara ett icke-negativt tal",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Inmatning för en arbetsdag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterDayInput {
    pub date: NaiveDate,
    pub headcount: i64,
    pub is_holiday: bool,
    pub notes: Option<String>,
}

impl WaterDayInput {
    pub fn new(date: NaiveDate, headcount: i64) -> Self {
        Self {
            date,
            headcount,
            is_holiday: false,
            notes: None,
        }
    }

    pub fn holiday(date: NaiveDate) -> Self {
        Self {
            date,
            headcount: 0,
            is_holiday: true,
            notes: None,
        }
    }
}

/// En veckas inmatning (mån-fre)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterWeekInput {
    pub week_start: NaiveDate,
    pub days: Vec<WaterDayInput>,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
}

impl WaterWeekInput {
    pub fn new(week_start: NaiveDate, days: Vec<WaterDayInput>) -> Self {
        Self {
            week_start: week_start_of(week_start),
            days,
            notes: None,
            evidence_url: None,
        }
    }

    /// Dagarna måste vara unika vardagar i veckan
    pub fn validate(&self) -> AppResult<()> {
        let weekdays = weekdays_of(self.week_start);
        let mut seen = Vec::with_capacity(self.days.len());

        for day in &self.days {
            if !weekdays.contains(&day.date) {
                return Err(AppError::validation(format!(
                    "{} är inte en vardag i veckan som börjar {}",
                    day.date, self.week_start
                )));
            }
            if seen.contains(&day.date) {
                return Err(AppError::validation(format!("{} förekommer två gånger", day.date)));
            }
            seen.push(day.date);
        }
        Ok(())
    }
}

/// Veckorapport med koefficienterna som gällde när veckan sparades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub id: Option<i64>,
    /// Måndag
    pub week_start: NaiveDate,
    pub config: WaterConfig,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
    pub total_liters: f64,
    pub total_carbon_kg: f64,
    pub total_cost: f64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// En dags vattenlogg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLog {
    pub id: Option<i64>,
    pub report_id: Option<i64>,
    pub date: NaiveDate,
    pub headcount: i64,
    pub is_holiday: bool,
    pub notes: Option<String>,
    pub water_liters: f64,
    pub carbon_kg: f64,
    pub cost: f64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liters_per_person() {
        let cfg = WaterConfig {
            hand_wash_frequency_per_day: 4.0,
            hand_wash_volume_liters: 2.0,
            toilet_flush_frequency_per_day: 3.0,
            toilet_flush_volume_liters: 6.0,
            ..Default::default()
        };
        assert_eq!(cfg.liters_per_person(), 26.0);
    }

    #[test]
    fn test_week_input_validation() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();

        let ok = WaterWeekInput::new(monday, vec![WaterDayInput::new(monday, 10)]);
        assert!(ok.validate().is_ok());

        let weekend = WaterWeekInput::new(monday, vec![WaterDayInput::new(saturday, 10)]);
        assert!(weekend.validate().is_err());

        let dup = WaterWeekInput::new(
            monday,
            vec![WaterDayInput::new(monday, 10), WaterDayInput::holiday(monday)],
        );
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative() {
        let cfg = WaterConfig {
            toilet_flush_volume_liters: -1.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AppError::Validation(_))));
        assert!(WaterConfig::default().validate().is_ok());
    }
}
