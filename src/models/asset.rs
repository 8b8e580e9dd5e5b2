//! Operativa tillgångar och deras granskningslogg.
//!
//! Statusövergångarna är rena funktioner på [`Asset`]; repositoryt skriver
//! tillgången och loggraden i samma transaktion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    Lost,
    Disposed,
}

impl AssetStatus {
    pub fn all() -> &'static [Self] {
        &[
            Self::Available,
            Self::InUse,
            Self::Maintenance,
            Self::Lost,
            Self::Disposed,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Available => "Tillgänglig",
            Self::InUse => "Används",
            Self::Maintenance => "Service",
            Self::Lost => "Borttappad",
            Self::Disposed => "Avyttrad",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "in_use" => Some(Self::InUse),
            "maintenance" => Some(Self::Maintenance),
            "lost" => Some(Self::Lost),
            "disposed" => Some(Self::Disposed),
            _ => None,
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::Maintenance => "maintenance",
            Self::Lost => "lost",
            Self::Disposed => "disposed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCondition {
    New,
    #[default]
    Good,
    Fair,
    Poor,
    Broken,
}

impl AssetCondition {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::New => "Ny",
            Self::Good => "Bra",
            Self::Fair => "Godtagbar",
            Self::Poor => "Dålig",
            Self::Broken => "Trasig",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "poor" => Some(Self::Poor),
            "broken" => Some(Self::Broken),
            _ => None,
        }
    }
}

impl fmt::Display for AssetCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Broken => "broken",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetLogKind {
    Creation,
    Assignment,
    Return,
    Maintenance,
    Update,
}

impl AssetLogKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "creation" => Some(Self::Creation),
            "assignment" => Some(Self::Assignment),
            "return" => Some(Self::Return),
            "maintenance" => Some(Self::Maintenance),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

impl fmt::Display for AssetLogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creation => "creation",
            Self::Assignment => "assignment",
            Self::Return => "return",
            Self::Maintenance => "maintenance",
            Self::Update => "update",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Option<i64>,
    /// Inventarienummer, unikt
    pub code: String,
    pub name: String,
    pub category: String,
    pub condition: AssetCondition,
    pub status: AssetStatus,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_value: f64,
    pub current_value: f64,
    pub current_holder_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Asset {
    pub fn new(code: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
            category: category.into(),
            condition: AssetCondition::default(),
            status: AssetStatus::default(),
            location: None,
            purchase_date: None,
            purchase_value: 0.0,
            current_value: 0.0,
            current_holder_id: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.code.trim().is_empty() {
            return Err(AppError::validation("Inventarienummer saknas"));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Namn saknas"));
        }
        if self.purchase_value < 0.0 || self.current_value < 0.0 {
            return Err(AppError::validation("Värden kan inte vara negativa"));
        }
        if self.current_holder_id.is_some() != (self.status == AssetStatus::InUse) {
            return Err(AppError::validation(
                "Innehavare måste finnas om och endast om status är in_use",
            ));
        }
        Ok(())
    }

    /// Tillämpa en åtgärd och returnera loggraden som ska skrivas.
    /// Vid fel lämnas tillgången orörd.
    pub fn apply(&mut self, action: &AssetAction) -> AppResult<AssetLogDraft> {
        if self.status == AssetStatus::Disposed {
            return Err(AppError::invalid_transition(format!(
                "{} är avyttrad",
                self.code
            )));
        }

        let previous_holder_id = self.current_holder_id;
        let previous_condition = self.condition;

        let draft = match action {
            AssetAction::Assign { employee_id } => {
                self.current_holder_id = Some(*employee_id);
                self.status = AssetStatus::InUse;
                AssetLogDraft {
                    kind: AssetLogKind::Assignment,
                    previous_holder_id,
                    new_holder_id: Some(*employee_id),
                    previous_condition: None,
                    new_condition: None,
                }
            }
            AssetAction::Return => {
                if previous_holder_id.is_none() {
                    return Err(AppError::invalid_transition(format!(
                        "{} har ingen innehavare",
                        self.code
                    )));
                }
                self.current_holder_id = None;
                self.status = AssetStatus::Available;
                AssetLogDraft {
                    kind: AssetLogKind::Return,
                    previous_holder_id,
                    new_holder_id: None,
                    previous_condition: None,
                    new_condition: None,
                }
            }
            AssetAction::UpdateCondition { condition } => {
                self.condition = *condition;
                AssetLogDraft {
                    kind: AssetLogKind::Maintenance,
                    previous_holder_id,
                    new_holder_id: previous_holder_id,
                    previous_condition: Some(previous_condition),
                    new_condition: Some(*condition),
                }
            }
            AssetAction::UpdateValues {
                purchase_value,
                current_value,
            } => {
                if *purchase_value < 0.0 || *current_value < 0.0 {
                    return Err(AppError::validation("Värden kan inte vara negativa"));
                }
                self.purchase_value = *purchase_value;
                self.current_value = *current_value;
                AssetLogDraft::update(previous_holder_id, previous_holder_id)
            }
            AssetAction::SetStatus { status } => {
                if *status == AssetStatus::InUse {
                    return Err(AppError::invalid_transition(
                        "Status in_use sätts genom tilldelning",
                    ));
                }
                // Innehavaren släpps när tillgången lämnar in_use
                self.current_holder_id = None;
                self.status = *status;
                AssetLogDraft::update(previous_holder_id, None)
            }
        };

        Ok(draft)
    }
}

/// Namngivna åtgärder på en tillgång
#[derive(Debug, Clone, PartialEq)]
pub enum AssetAction {
    Assign { employee_id: i64 },
    Return,
    UpdateCondition { condition: AssetCondition },
    UpdateValues { purchase_value: f64, current_value: f64 },
    SetStatus { status: AssetStatus },
}

/// Loggrad innan den fått aktör, anteckning och id
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLogDraft {
    pub kind: AssetLogKind,
    pub previous_holder_id: Option<i64>,
    pub new_holder_id: Option<i64>,
    pub previous_condition: Option<AssetCondition>,
    pub new_condition: Option<AssetCondition>,
}

impl AssetLogDraft {
    pub fn creation(asset: &Asset) -> Self {
        Self {
            kind: AssetLogKind::Creation,
            previous_holder_id: None,
            new_holder_id: asset.current_holder_id,
            previous_condition: None,
            new_condition: Some(asset.condition),
        }
    }

    fn update(previous_holder_id: Option<i64>, new_holder_id: Option<i64>) -> Self {
        Self {
            kind: AssetLogKind::Update,
            previous_holder_id,
            new_holder_id,
            previous_condition: None,
            new_condition: None,
        }
    }
}

/// Granskningsrad (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetLog {
    pub id: Option<i64>,
    pub asset_id: i64,
    pub kind: AssetLogKind,
    pub actor_id: Option<i64>,
    pub previous_holder_id: Option<i64>,
    pub new_holder_id: Option<i64>,
    pub previous_condition: Option<AssetCondition>,
    pub new_condition: Option<AssetCondition>,
    pub note: Option<String>,
    pub created_at: Option<String>,
}

/// Servicepost för en tillgång
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Option<i64>,
    pub asset_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub cost: f64,
    pub vendor: Option<String>,
    pub next_due: Option<NaiveDate>,
    pub created_at: Option<String>,
}

impl MaintenanceRecord {
    pub fn new(asset_id: i64, date: NaiveDate, description: impl Into<String>, cost: f64) -> Self {
        Self {
            id: None,
            asset_id,
            date,
            description: description.into(),
            cost,
            vendor: None,
            next_due: None,
            created_at: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.description.trim().is_empty() {
            return Err(AppError::validation("Beskrivning saknas"));
        }
        if let Some(next) = self.next_due {
            if next < self.date {
                return Err(AppError::validation("Nästa service ligger före servicedatum"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop() -> Asset {
        Asset::new("IT-001", "Laptop", "IT")
    }

    #[test]
    fn test_assign_then_return() {
        let mut asset = laptop();

        let assign = asset.apply(&AssetAction::Assign { employee_id: 7 }).unwrap();
        assert_eq!(asset.status, AssetStatus::InUse);
        assert_eq!(asset.current_holder_id, Some(7));
        assert_eq!(assign.kind, AssetLogKind::Assignment);
        assert_eq!(assign.previous_holder_id, None);
        assert_eq!(assign.new_holder_id, Some(7));

        let ret = asset.apply(&AssetAction::Return).unwrap();
        assert_eq!(asset.status, AssetStatus::Available);
        assert_eq!(asset.current_holder_id, None);
        assert_eq!(ret.kind, AssetLogKind::Return);
        assert_eq!(ret.previous_holder_id, Some(7));
        assert_eq!(ret.new_holder_id, None);
    }

    #[test]
    fn test_reassign_records_previous_holder() {
        let mut asset = laptop();
        asset.apply(&AssetAction::Assign { employee_id: 1 }).unwrap();
        let draft = asset.apply(&AssetAction::Assign { employee_id: 2 }).unwrap();
        assert_eq!(draft.previous_holder_id, Some(1));
        assert_eq!(draft.new_holder_id, Some(2));
    }

    #[test]
    fn test_return_without_holder_fails() {
        let mut asset = laptop();
        let err = asset.apply(&AssetAction::Return).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(asset.status, AssetStatus::Available);
    }

    #[test]
    fn test_disposed_rejects_actions() {
        let mut asset = laptop();
        asset
            .apply(&AssetAction::SetStatus {
                status: AssetStatus::Disposed,
            })
            .unwrap();
        let err = asset.apply(&AssetAction::Assign { employee_id: 3 }).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(asset.current_holder_id, None);
    }

    #[test]
    fn test_condition_update_keeps_status() {
        let mut asset = laptop();
        asset.apply(&AssetAction::Assign { employee_id: 4 }).unwrap();
        let draft = asset
            .apply(&AssetAction::UpdateCondition {
                condition: AssetCondition::Poor,
            })
            .unwrap();
        assert_eq!(asset.status, AssetStatus::InUse);
        assert_eq!(asset.condition, AssetCondition::Poor);
        assert_eq!(draft.kind, AssetLogKind::Maintenance);
        assert_eq!(draft.previous_condition, Some(AssetCondition::Good));
        assert_eq!(draft.new_condition, Some(AssetCondition::Poor));
    }

    #[test]
    fn test_set_status_releases_holder() {
        let mut asset = laptop();
        asset.apply(&AssetAction::Assign { employee_id: 9 }).unwrap();
        let draft = asset
            .apply(&AssetAction::SetStatus {
                status: AssetStatus::Lost,
            })
            .unwrap();
        assert_eq!(asset.current_holder_id, None);
        assert_eq!(draft.previous_holder_id, Some(9));
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_set_status_in_use_rejected() {
        let mut asset = laptop();
        assert!(asset
            .apply(&AssetAction::SetStatus {
                status: AssetStatus::InUse
            })
            .is_err());
    }

    #[test]
    fn test_validate_holder_invariant() {
        let mut asset = laptop();
        asset.current_holder_id = Some(1);
        assert!(asset.validate().is_err());
        asset.status = AssetStatus::InUse;
        assert!(asset.validate().is_ok());
    }
}
