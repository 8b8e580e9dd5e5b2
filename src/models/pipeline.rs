use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, AppResult};

/// Kolumner i affärsutvecklingens pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Prospect,
    Contacted,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl PipelineStage {
    pub fn all() -> &'static [Self] {
        &[
            Self::Prospect,
            Self::Contacted,
            Self::Proposal,
            Self::Negotiation,
            Self::Won,
            Self::Lost,
        ]
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Prospect => "Prospekt",
            Self::Contacted => "Kontaktad",
            Self::Proposal => "Offert",
            Self::Negotiation => "Förhandling",
            Self::Won => "Vunnen",
            Self::Lost => "Förlorad",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "prospect" => Some(Self::Prospect),
            "contacted" => Some(Self::Contacted),
            "proposal" => Some(Self::Proposal),
            "negotiation" => Some(Self::Negotiation),
            "won" => Some(Self::Won),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Prospect => "prospect",
            Self::Contacted => "contacted",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Option<i64>,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub estimated_value: f64,
    pub stage: PipelineStage,
    pub owner_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Lead {
    pub fn new(company_name: impl Into<String>, estimated_value: f64) -> Self {
        Self {
            id: None,
            company_name: company_name.into(),
            contact_name: None,
            estimated_value,
            stage: PipelineStage::default(),
            owner_id: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.company_name.trim().is_empty() {
            return Err(AppError::validation("Företagsnamn saknas"));
        }
        Ok(())
    }
}

/// Granskningsrad för flytt mellan kolumner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadActivity {
    pub id: Option<i64>,
    pub lead_id: i64,
    pub actor_id: Option<i64>,
    pub from_stage: Option<PipelineStage>,
    pub to_stage: PipelineStage,
    pub note: Option<String>,
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_stages() {
        assert!(PipelineStage::Won.is_closed());
        assert!(PipelineStage::Lost.is_closed());
        assert!(!PipelineStage::Proposal.is_closed());
    }

    #[test]
    fn test_validate_company_name() {
        assert!(Lead::new("  ", 100.0).validate().is_err());
        assert!(Lead::new("Acme AB", 100.0).validate().is_ok());
    }
}
