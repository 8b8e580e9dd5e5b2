use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::error::{AppError, AppResult};

/// Färdmedel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Car,
    Motorcycle,
    Taxi,
    Bus,
    Train,
    Plane,
    Ferry,
    Other,
}

impl TransportMode {
    pub fn all() -> &'static [Self] {
        &[
            Self::Car,
            Self::Motorcycle,
            Self::Taxi,
            Self::Bus,
            Self::Train,
            Self::Plane,
            Self::Ferry,
            Self::Other,
        ]
    }

    /// Fordon vars utsläpp delas mellan passagerarna.
    /// Kollektivtrafikens faktorer är redan per passagerarkilometer.
    pub fn is_shared_vehicle(&self) -> bool {
        matches!(self, Self::Car | Self::Motorcycle | Self::Taxi)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Car => "Bil",
            Self::Motorcycle => "Motorcykel",
            Self::Taxi => "Taxi",
            Self::Bus => "Buss",
            Self::Train => "Tåg",
            Self::Plane => "Flyg",
            Self::Ferry => "Färja",
            Self::Other => "Övrigt",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "car" => Some(Self::Car),
            "motorcycle" => Some(Self::Motorcycle),
            "taxi" => Some(Self::Taxi),
            "bus" => Some(Self::Bus),
            "train" => Some(Self::Train),
            "plane" => Some(Self::Plane),
            "ferry" => Some(Self::Ferry),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Car => "car",
            Self::Motorcycle => "motorcycle",
            Self::Taxi => "taxi",
            Self::Bus => "bus",
            Self::Train => "train",
            Self::Plane => "plane",
            Self::Ferry => "ferry",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Nyckel i faktortabellen: "mode" eller "mode:subtype"
pub fn factor_key(mode: TransportMode, subtype: Option<&str>) -> String {
    match subtype.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sub) => format!("{}:{}", mode, sub.to_lowercase()),
        None => mode.to_string(),
    }
}

/// Utsläppsfaktorer per färdmedel (kg CO2e per km)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelEmissionConfig {
    pub factors: BTreeMap<String, f64>,
}

impl Default for TravelEmissionConfig {
    fn default() -> Self {
        let defaults = [
            ("car", 0.17),
            ("car:petrol", 0.17),
            ("car:diesel", 0.17),
            ("car:hybrid", 0.12),
            ("car:electric", 0.05),
            ("motorcycle", 0.11),
            ("taxi", 0.15),
            ("bus", 0.10),
            ("train", 0.035),
            ("plane", 0.20),
            ("plane:domestic", 0.25),
            ("plane:short_haul", 0.15),
            ("plane:long_haul", 0.15),
            ("ferry", 0.11),
            ("other", 0.0),
        ];

        Self {
            factors: defaults
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

impl TravelEmissionConfig {
    /// Slå upp faktor: "mode:subtype", sedan "mode", annars 0
    pub fn factor_for(&self, mode: TransportMode, subtype: Option<&str>) -> f64 {
        self.factors
            .get(&factor_key(mode, subtype))
            .or_else(|| self.factors.get(&mode.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_factor(&mut self, mode: TransportMode, subtype: Option<&str>, factor: f64) {
        self.factors.insert(factor_key(mode, subtype), factor);
    }

    /// Tabellen får inte vara tom och varje nyckel måste ha samma form
    /// som `factor_key` ger, annars kan den aldrig matchas vid uppslag.
    pub fn validate(&self) -> AppResult<()> {
        if self.factors.is_empty() {
            return Err(AppError::validation("Faktortabellen får inte vara tom"));
        }

        for (key, value) in &self.factors {
            let (mode, subtype) = match key.split_once(':') {
                Some((mode, subtype)) => (mode, Some(subtype)),
                None => (key.as_str(), None),
            };
            let mode = TransportMode::from_db_str(mode)
                .ok_or_else(|| AppError::validation(format!("Okänt färdmedel: {}", key)))?;

            let normalized = factor_key(mode, subtype);
            if normalized != *key {
                return Err(AppError::validation(format!(
                    "Faktornyckeln \"{}\" ska skrivas \"{}\"",
                    key, normalized
                )));
            }
            if !value.is_finite() || *value < 0.0 {
                return Err(AppError::validation(format!(
                    "Faktorn för {} måste vara ett icke-negativt tal",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// En resa/aktivitet som grupperar ett eller flera resesegment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelActivity {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub activity_date: NaiveDate,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl TravelActivity {
    pub fn new(title: impl Into<String>, activity_date: NaiveDate) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            activity_date,
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("Aktiviteten saknar titel"));
        }
        Ok(())
    }
}

/// Inmatning för ett resesegment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelSegmentInput {
    pub travel_date: NaiveDate,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub transport_mode: TransportMode,
    pub transport_subtype: Option<String>,
    pub distance_km: f64,
    pub passenger_count: i64,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
}

impl TravelSegmentInput {
    pub fn new(travel_date: NaiveDate, mode: TransportMode, distance_km: f64) -> Self {
        Self {
            travel_date,
            origin: None,
            destination: None,
            transport_mode: mode,
            transport_subtype: None,
            distance_km,
            passenger_count: 1,
            notes: None,
            evidence_url: None,
        }
    }
}

/// Sparat resesegment med faktorn som gällde vid sparandet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelLog {
    pub id: Option<i64>,
    pub activity_id: i64,
    pub travel_date: NaiveDate,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub transport_mode: TransportMode,
    pub transport_subtype: Option<String>,
    pub distance_km: f64,
    pub passenger_count: i64,
    pub emission_factor_per_km: f64,
    pub emission_kg: f64,
    pub notes: Option<String>,
    pub evidence_url: Option<String>,
    pub created_at: Option<String>,
}

/// Summor för en aktivitet
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ActivityTotals {
    pub segments: usize,
    pub distance_km: f64,
    pub emission_kg: f64,
}

impl ActivityTotals {
    pub fn from_logs(logs: &[TravelLog]) -> Self {
        logs.iter().fold(Self::default(), |acc, log| Self {
            segments: acc.segments + 1,
            distance_km: acc.distance_km + log.distance_km,
            emission_kg: acc.emission_kg + log.emission_kg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_lookup_falls_back_to_mode() {
        let cfg = TravelEmissionConfig::default();
        assert_eq!(cfg.factor_for(TransportMode::Car, Some("electric")), 0.05);
        assert_eq!(cfg.factor_for(TransportMode::Car, Some("Electric")), 0.05);
        assert_eq!(cfg.factor_for(TransportMode::Car, Some("hydrogen")), 0.17);
        assert_eq!(cfg.factor_for(TransportMode::Train, None), 0.035);
    }

    #[test]
    fn test_factor_lookup_missing_mode_is_zero() {
        let cfg = TravelEmissionConfig {
            factors: BTreeMap::new(),
        };
        assert_eq!(cfg.factor_for(TransportMode::Bus, None), 0.0);
    }

    #[test]
    fn test_validate_unknown_mode() {
        let mut cfg = TravelEmissionConfig::default();
        cfg.factors.insert("rocket".into(), 1.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unmatchable_keys() {
        for key in ["car:Diesel", "car: diesel", "car:", "Car"] {
            let mut config = TravelEmissionConfig::default();
            config.factors.insert(key.to_string(), 0.9);
            assert!(
                matches!(config.validate(), Err(AppError::Validation(_))),
                "{} borde avvisas",
                key
            );
        }

        let mut config = TravelEmissionConfig::default();
        config.set_factor(TransportMode::Car, Some(" Diesel "), 0.9);
        config.validate().unwrap();
        assert_eq!(config.factor_for(TransportMode::Car, Some("Diesel")), 0.9);
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let config = TravelEmissionConfig {
            factors: BTreeMap::new(),
        };
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_shared_vehicle_modes() {
        assert!(TransportMode::Car.is_shared_vehicle());
        assert!(TransportMode::Taxi.is_shared_vehicle());
        assert!(!TransportMode::Train.is_shared_vehicle());
        assert!(!TransportMode::Plane.is_shared_vehicle());
    }

    #[test]
    fn test_mode_db_roundtrip() {
        for mode in TransportMode::all() {
            assert_eq!(TransportMode::from_db_str(&mode.to_string()), Some(*mode));
        }
    }
}
