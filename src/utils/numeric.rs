//! Tolerant tolkning av siffror från formulär och kommandorad.
//!
//! Förhandsvisningen ska alltid visa ett tal: tomt, oläsbart eller
//! icke-ändligt värde blir 0 i stället för ett fel.

use serde::{Deserialize, Serialize};

/// Tolka ett tal, 0 vid saknat/oläsbart värde. Accepterar decimalkomma.
pub fn parse_lenient(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    let normalized = s.replace(' ', "").replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Tolka ett heltal (t.ex. antal personer), 0 vid oläsbart värde
pub fn parse_lenient_count(s: &str) -> i64 {
    let v = parse_lenient(s);
    v.trunc() as i64
}

/// Ersätt NaN/oändligt med 0
pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Hur negativa råvärden ska behandlas innan beräkning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeInputPolicy {
    /// Negativa värden räknas som de är (t.ex. för korrigeringar)
    #[default]
    Accept,
    /// Negativa värden sätts till 0
    ClampToZero,
}

impl NegativeInputPolicy {
    pub fn apply(&self, v: f64) -> f64 {
        let v = finite_or_zero(v);
        match self {
            Self::Accept => v,
            Self::ClampToZero => v.max(0.0),
        }
    }

    pub fn apply_count(&self, v: i64) -> i64 {
        match self {
            Self::Accept => v,
            Self::ClampToZero => v.max(0),
        }
    }
}
