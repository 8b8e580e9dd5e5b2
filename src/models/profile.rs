use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Staff,
}

/// Behörigheter som kontrolleras i de skrivande operationerna
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ManageUsers,
    ManageAssets,
    ManagePettyCash,
    ManagePipeline,
    EditSustainabilityConfig,
    RecordSustainability,
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        match self {
            Self::Admin => true,
            Self::Manager => !matches!(capability, Capability::ManageUsers),
            Self::Staff => matches!(
                capability,
                Capability::RecordSustainability | Capability::ManagePipeline
            ),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Admin => "Administratör",
            Self::Manager => "Chef",
            Self::Staff => "Medarbetare",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            _ => Self::Staff,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Manager => write!(f, "manager"),
            Self::Staff => write!(f, "staff"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: Option<String>,
}

impl Profile {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            email: email.into(),
            full_name: full_name.into(),
            role,
            department: None,
            is_active: true,
            created_at: None,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.is_active && self.role.allows(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.allows(Capability::ManageUsers));
        assert!(!Role::Manager.allows(Capability::ManageUsers));
        assert!(Role::Manager.allows(Capability::ManageAssets));
        assert!(!Role::Staff.allows(Capability::ManageAssets));
        assert!(Role::Staff.allows(Capability::RecordSustainability));
    }

    #[test]
    fn test_inactive_profile_denied() {
        let mut admin = Profile::new("a@example.com", "A", Role::Admin);
        assert!(admin.can(Capability::ManageUsers));
        admin.is_active = false;
        assert!(!admin.can(Capability::ManageUsers));
    }
}
