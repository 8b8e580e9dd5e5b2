//! Beräkning av förbrukning och utsläpp för vatten, el och resor.
//!
//! Alla funktioner är deterministiska och utan sidoeffekter. Resultatet är
//! alltid ett ändligt tal; ogiltiga mellanresultat blir 0.

use serde::Serialize;

use crate::models::{
    ElectricityConfig, ElectricityInput, ElectricityLog, TransportMode, TravelEmissionConfig,
    TravelLog, TravelSegmentInput, WaterConfig, WaterDayInput, WaterLog,
};
use crate::utils::numeric::{finite_or_zero, NegativeInputPolicy};

/// Liter vatten för en dag. Helgdag ger 0.
pub fn water_liters(headcount: f64, is_holiday: bool, cfg: &WaterConfig) -> f64 {
    if is_holiday {
        return 0.0;
    }
    finite_or_zero(headcount * cfg.liters_per_person())
}

/// kg CO2e för en vattenvolym i liter
pub fn water_carbon_kg(liters: f64, cfg: &WaterConfig) -> f64 {
    finite_or_zero(liters / 1000.0 * cfg.emission_factor_per_cubic_meter)
}

pub fn water_cost(liters: f64, cfg: &WaterConfig) -> f64 {
    finite_or_zero(liters / 1000.0 * cfg.cost_per_cubic_meter)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaterFigures {
    pub liters: f64,
    pub carbon_kg: f64,
    pub cost: f64,
}

pub fn water(headcount: f64, is_holiday: bool, cfg: &WaterConfig) -> WaterFigures {
    let liters = water_liters(headcount, is_holiday, cfg);
    WaterFigures {
        liters,
        carbon_kg: water_carbon_kg(liters, cfg),
        cost: water_cost(liters, cfg),
    }
}

/// Företagets andel av byggnadens förbrukning
pub fn company_kwh(building_kwh: f64, allocation_percentage: f64) -> f64 {
    finite_or_zero(building_kwh * (allocation_percentage / 100.0))
}

pub fn electricity_carbon_kg(company_kwh: f64, emission_factor_per_kwh: f64) -> f64 {
    finite_or_zero(company_kwh * emission_factor_per_kwh)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ElectricityFigures {
    pub company_kwh: f64,
    pub carbon_kg: f64,
    pub cost: f64,
}

pub fn electricity(building_kwh: f64, cfg: &ElectricityConfig) -> ElectricityFigures {
    let kwh = company_kwh(building_kwh, cfg.allocation_percentage);
    ElectricityFigures {
        company_kwh: kwh,
        carbon_kg: electricity_carbon_kg(kwh, cfg.emission_factor_per_kwh),
        cost: finite_or_zero(kwh * cfg.cost_per_kwh),
    }
}

/// Utsläpp för ett resesegment. Delade fordon fördelas på passagerarna,
/// med minst en passagerare.
pub fn travel_emission_kg(
    distance_km: f64,
    factor_per_km: f64,
    mode: TransportMode,
    passenger_count: i64,
) -> f64 {
    let total = distance_km * factor_per_km;
    let emission = if mode.is_shared_vehicle() {
        total / passenger_count.max(1) as f64
    } else {
        total
    };
    finite_or_zero(emission)
}

/// Beräknar loggrader från råvärden med en vald policy för negativa värden
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator {
    policy: NegativeInputPolicy,
}

impl Calculator {
    pub fn new(policy: NegativeInputPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NegativeInputPolicy {
        self.policy
    }

    /// Vattensiffror för ett heltaligt antal personer, samma väg som vid sparande
    pub fn water_figures(&self, headcount: i64, is_holiday: bool, cfg: &WaterConfig) -> WaterFigures {
        water(self.policy.apply_count(headcount) as f64, is_holiday, cfg)
    }

    pub fn water_log(&self, input: &WaterDayInput, cfg: &WaterConfig) -> WaterLog {
        let headcount = self.policy.apply_count(input.headcount);
        let figures = self.water_figures(input.headcount, input.is_holiday, cfg);

        WaterLog {
            id: None,
            report_id: None,
            date: input.date,
            headcount,
            is_holiday: input.is_holiday,
            notes: input.notes.clone(),
            water_liters: figures.liters,
            carbon_kg: figures.carbon_kg,
            cost: figures.cost,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn electricity_log(&self, input: &ElectricityInput, cfg: &ElectricityConfig) -> ElectricityLog {
        let building_kwh = self.policy.apply(input.building_kwh);
        let figures = electricity(building_kwh, cfg);

        ElectricityLog {
            id: None,
            start_date: input.start_date,
            end_date: input.end_date,
            building_kwh,
            config: *cfg,
            company_kwh: figures.company_kwh,
            carbon_kg: figures.carbon_kg,
            cost: figures.cost,
            notes: input.notes.clone(),
            evidence_url: input.evidence_url.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn travel_log(
        &self,
        activity_id: i64,
        input: &TravelSegmentInput,
        cfg: &TravelEmissionConfig,
    ) -> TravelLog {
        let distance_km = self.policy.apply(input.distance_km);
        let factor = cfg.factor_for(input.transport_mode, input.transport_subtype.as_deref());
        let emission_kg = travel_emission_kg(
            distance_km,
            factor,
            input.transport_mode,
            input.passenger_count,
        );

        TravelLog {
            id: None,
            activity_id,
            travel_date: input.travel_date,
            origin: input.origin.clone(),
            destination: input.destination.clone(),
            transport_mode: input.transport_mode,
            transport_subtype: input.transport_subtype.clone(),
            distance_km,
            passenger_count: input.passenger_count.max(1),
            emission_factor_per_km: factor,
            emission_kg,
            notes: input.notes.clone(),
            evidence_url: input.evidence_url.clone(),
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-9;

    fn water_cfg() -> WaterConfig {
        WaterConfig {
            hand_wash_frequency_per_day: 4.0,
            hand_wash_volume_liters: 1.5,
            toilet_flush_frequency_per_day: 3.0,
            toilet_flush_volume_liters: 6.0,
            emission_factor_per_cubic_meter: 0.344,
            cost_per_cubic_meter: 20.0,
        }
    }

    #[test]
    fn test_water_liters_formula() {
        let cfg = water_cfg();
        for headcount in [0.0, 1.0, 12.0, 57.0] {
            let expected = headcount * (4.0 * 1.5 + 3.0 * 6.0);
            assert!((water_liters(headcount, false, &cfg) - expected).abs() < EPS);
        }
    }

    #[test]
    fn test_water_holiday_is_zero() {
        let figures = water(25.0, true, &water_cfg());
        assert_eq!(figures.liters, 0.0);
        assert_eq!(figures.carbon_kg, 0.0);
        assert_eq!(figures.cost, 0.0);
    }

    #[test]
    fn test_water_carbon_recovers_liters() {
        let cfg = water_cfg();
        let liters = water_liters(30.0, false, &cfg);
        let carbon = water_carbon_kg(liters, &cfg);
        let recovered = carbon / cfg.emission_factor_per_cubic_meter * 1000.0;
        assert!((recovered - liters).abs() < 1e-6);
    }

    #[test]
    fn test_electricity() {
        assert_eq!(company_kwh(1000.0, 25.0), 250.0);
        assert!((electricity_carbon_kg(250.0, 0.8) - 200.0).abs() < EPS);

        let cfg = ElectricityConfig {
            allocation_percentage: 25.0,
            emission_factor_per_kwh: 0.8,
            cost_per_kwh: 1.5,
        };
        let figures = electricity(1000.0, &cfg);
        assert_eq!(figures.company_kwh, 250.0);
        assert!((figures.carbon_kg - 200.0).abs() < EPS);
        assert!((figures.cost - 375.0).abs() < EPS);
    }

    #[test]
    fn test_travel_shared_vehicle() {
        let kg = travel_emission_kg(100.0, 0.1, TransportMode::Car, 4);
        assert!((kg - 2.5).abs() < EPS);
    }

    #[test]
    fn test_travel_zero_passengers_clamped() {
        let kg = travel_emission_kg(100.0, 0.1, TransportMode::Car, 0);
        assert!((kg - 10.0).abs() < EPS);
        assert!(kg.is_finite());

        let kg = travel_emission_kg(100.0, 0.1, TransportMode::Taxi, -3);
        assert!((kg - 10.0).abs() < EPS);
    }

    #[test]
    fn test_travel_public_transport_ignores_passengers() {
        let kg = travel_emission_kg(100.0, 0.1, TransportMode::Train, 4);
        assert!((kg - 10.0).abs() < EPS);
    }

    #[test]
    fn test_non_finite_input_gives_zero() {
        assert_eq!(company_kwh(f64::NAN, 50.0), 0.0);
        assert_eq!(water_liters(f64::INFINITY, false, &water_cfg()), 0.0);
    }

    #[test]
    fn test_negative_policy_on_logs() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let cfg = ElectricityConfig::default();
        let input = ElectricityInput::new(date, date, -100.0);

        let accepted = Calculator::new(NegativeInputPolicy::Accept).electricity_log(&input, &cfg);
        assert_eq!(accepted.building_kwh, -100.0);
        assert!(accepted.carbon_kg < 0.0);

        let clamped =
            Calculator::new(NegativeInputPolicy::ClampToZero).electricity_log(&input, &cfg);
        assert_eq!(clamped.building_kwh, 0.0);
        assert_eq!(clamped.carbon_kg, 0.0);
    }

    #[test]
    fn test_water_figures_match_saved_log() {
        let cfg = water_cfg();
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();

        for policy in [NegativeInputPolicy::Accept, NegativeInputPolicy::ClampToZero] {
            let calc = Calculator::new(policy);
            for headcount in [-3, 0, 12] {
                let figures = calc.water_figures(headcount, false, &cfg);
                let log = calc.water_log(&WaterDayInput::new(date, headcount), &cfg);
                assert_eq!(figures.liters, log.water_liters);
                assert_eq!(figures.cost, log.cost);
            }
        }
    }

    #[test]
    fn test_travel_log_snapshots_factor() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut cfg = TravelEmissionConfig::default();
        cfg.set_factor(TransportMode::Car, Some("diesel"), 0.2);

        let mut input = TravelSegmentInput::new(date, TransportMode::Car, 150.0);
        input.transport_subtype = Some("diesel".into());
        input.passenger_count = 3;

        let log = Calculator::default().travel_log(1, &input, &cfg);
        assert_eq!(log.emission_factor_per_km, 0.2);
        assert!((log.emission_kg - 10.0).abs() < EPS);
    }
}
